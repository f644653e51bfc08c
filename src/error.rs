// Error types for report submission.
//
// `TransportError` classifies what went wrong at the HTTP layer for a
// single attempt; `SubmitError` is the terminal error a caller sees once
// the retry policy has run its course.

use thiserror::Error;

/// Failure of a single HTTP attempt, below the status-code level.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response arrived within the configured deadline.
    #[error("request timed out")]
    Timeout,

    /// The remote host could not be reached.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other transport-level failure (DNS, TLS, invalid response...).
    #[error("transport failure: {0}")]
    Other(String),
}

/// Terminal outcome of a submission, after retries are consumed.
///
/// `InvalidTemplate` and `ClientRejected` are never retried: the first is
/// caught before any network call, the second means the request itself is
/// wrong and retrying would not help. The `*Exhausted` variants carry the
/// number of attempts that were made.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The template id is not in the configured template table.
    #[error("unknown template id {0}: not in the configured template table")]
    InvalidTemplate(u32),

    /// The report service answered with a 4xx status.
    #[error("report service rejected the request ({status}): {body}")]
    ClientRejected { status: u16, body: String },

    /// Every attempt hit the request deadline.
    #[error("request timed out on all {attempts} attempts")]
    TimeoutExhausted { attempts: u32 },

    /// Every attempt failed to reach the report service.
    #[error("could not reach the report service after {attempts} attempts: {detail}")]
    ConnectionExhausted { attempts: u32, detail: String },

    /// Every attempt got a 5xx answer; status and body are from the last one.
    #[error("report service kept failing ({status}) after {attempts} attempts: {body}")]
    ServerErrorExhausted {
        attempts: u32,
        status: u16,
        body: String,
    },
}
