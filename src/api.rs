// API client module: builds the regenerate payload and submits it to the
// report service over HTTP, retrying transient failures a bounded number
// of times. HTTP execution sits behind the `Transport` trait so the
// retry loop can be exercised against scripted responses.

use std::thread;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Config, SftpConfig, UserConfig};
use crate::error::{SubmitError, TransportError};
use crate::schedule::DateRange;
use crate::template::TemplateSpec;

// Fixed payload fields the report service expects for AID transfers.
const GROUP_TYPE: &str = "SINGLE";
const FILE_TYPE: &str = "TXT";
const DELIMITER: &str = "CARET";
const REQUEST_KIND: &str = "DATA_TRANSFER_AID";

/// SFTP delivery target as it appears on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SftpTarget<'a> {
    pub ip_address: &'a str,
    pub port: u16,
    pub username: &'a str,
    pub password: &'a str,
    pub destination: &'a str,
    pub private_key: &'a str,
}

/// Requesting-user descriptor as it appears on the wire.
#[derive(Debug, Serialize)]
pub struct UserPayload<'a> {
    pub id: u64,
    pub name: &'a str,
}

/// JSON body POSTed to the regenerate endpoint. Field names mirror the
/// report service's contract.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateRequest<'a> {
    pub template_id: u32,
    pub group_type: &'static str,
    pub file_type: &'static str,
    pub start_date: String,
    pub end_date: String,
    pub delimiter: &'static str,
    pub sftp: SftpTarget<'a>,
    pub user: UserPayload<'a>,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl<'a> RegenerateRequest<'a> {
    /// Assemble the wire payload for one date range and template. The
    /// SFTP destination comes from the template, everything else from
    /// configuration.
    pub fn new(
        range: &DateRange,
        template: &'a TemplateSpec,
        sftp: &'a SftpConfig,
        user: &'a UserConfig,
    ) -> Self {
        RegenerateRequest {
            template_id: template.id,
            group_type: GROUP_TYPE,
            file_type: FILE_TYPE,
            start_date: range.start_stamp(),
            end_date: range.end_stamp(),
            delimiter: DELIMITER,
            sftp: SftpTarget {
                ip_address: &sftp.host,
                port: sftp.port,
                username: &sftp.username,
                password: &sftp.password,
                destination: &template.destination,
                private_key: &sftp.private_key,
            },
            user: UserPayload {
                id: user.id,
                name: &user.name,
            },
            kind: REQUEST_KIND,
        }
    }
}

/// Status and body of one HTTP answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Executes one HTTP POST of a regenerate payload.
pub trait Transport {
    fn post_json(
        &self,
        url: &str,
        request: &RegenerateRequest<'_>,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;
}

/// Production transport over a blocking reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    fn post_json(
        &self,
        url: &str,
        request: &RegenerateRequest<'_>,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(request)
            .send()
            .map_err(classify_send_error)?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| TransportError::Other(err.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

fn classify_send_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

/// How a single attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Timeout,
    ConnectionFailure(String),
    ClientError(u16),
    ServerError(u16),
}

/// Record of one attempt in a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionAttempt {
    /// 1-based attempt number.
    pub number: u32,
    pub outcome: AttemptOutcome,
    /// Response body, when an HTTP answer arrived at all.
    pub body: Option<String>,
}

/// Full outcome of one submission: the terminal result plus the
/// attempt-by-attempt record the batch driver reports on.
#[derive(Debug)]
pub struct Submission {
    pub attempts: Vec<SubmissionAttempt>,
    pub result: Result<String, SubmitError>,
}

/// Client for the report service's regenerate endpoint.
///
/// Holds the retry policy, delivery target, and template table from
/// configuration; `submit` runs the bounded retry loop.
pub struct ReportClient<T: Transport = HttpTransport> {
    transport: T,
    config: Config,
}

impl ReportClient<HttpTransport> {
    /// Build a client over the production HTTP transport.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        Ok(ReportClient::with_transport(config, HttpTransport::new()?))
    }
}

impl<T: Transport> ReportClient<T> {
    /// Build a client over an explicit transport (used by tests).
    pub fn with_transport(config: Config, transport: T) -> Self {
        ReportClient { transport, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Submit a regenerate request, retrying transient failures.
    ///
    /// Returns the response body of the first 2xx answer. Unknown
    /// template ids fail before any network call. A 4xx answer is
    /// surfaced immediately; timeouts, connection failures, and 5xx
    /// answers are retried with a fixed pause up to the configured
    /// attempt limit.
    pub fn submit(&self, range: &DateRange, template_id: u32) -> Result<String, SubmitError> {
        self.submit_tracked(range, template_id).result
    }

    /// Like [`submit`](Self::submit), but also returns the record of
    /// every attempt made.
    pub fn submit_tracked(&self, range: &DateRange, template_id: u32) -> Submission {
        let mut attempts = Vec::new();

        let template = match self.config.templates.resolve(template_id) {
            Ok(template) => template,
            Err(err) => {
                warn!("refusing to submit: {err}");
                return Submission {
                    attempts,
                    result: Err(err),
                };
            }
        };

        let request = RegenerateRequest::new(range, template, &self.config.sftp, &self.config.user);
        let max_retries = self.config.max_retries.max(1);
        let delay = self.config.retry_delay;

        for attempt in 1..=max_retries {
            info!(
                attempt,
                max_retries,
                template_id,
                url = %self.config.endpoint,
                "submitting regenerate request for {range}",
            );
            if attempt == 1 {
                if let Ok(pretty) = serde_json::to_string_pretty(&request) {
                    debug!(payload = %pretty, "request payload");
                }
            }

            match self
                .transport
                .post_json(&self.config.endpoint, &request, self.config.request_timeout)
            {
                Ok(response) if (200..300).contains(&response.status) => {
                    info!(status = response.status, "report service accepted the request");
                    attempts.push(SubmissionAttempt {
                        number: attempt,
                        outcome: AttemptOutcome::Success,
                        body: Some(response.body.clone()),
                    });
                    return Submission {
                        attempts,
                        result: Ok(response.body),
                    };
                }
                Ok(response) if (400..500).contains(&response.status) => {
                    warn!(
                        status = response.status,
                        "client-side rejection, not retrying"
                    );
                    attempts.push(SubmissionAttempt {
                        number: attempt,
                        outcome: AttemptOutcome::ClientError(response.status),
                        body: Some(response.body.clone()),
                    });
                    return Submission {
                        attempts,
                        result: Err(SubmitError::ClientRejected {
                            status: response.status,
                            body: response.body,
                        }),
                    };
                }
                Ok(response) => {
                    attempts.push(SubmissionAttempt {
                        number: attempt,
                        outcome: AttemptOutcome::ServerError(response.status),
                        body: Some(response.body.clone()),
                    });
                    if attempt < max_retries {
                        warn!(
                            status = response.status,
                            attempt,
                            "server error, retrying in {}s",
                            delay.as_secs()
                        );
                        thread::sleep(delay);
                    } else {
                        warn!(
                            status = response.status,
                            "max retries reached, request failed due to server error"
                        );
                        return Submission {
                            attempts,
                            result: Err(SubmitError::ServerErrorExhausted {
                                attempts: max_retries,
                                status: response.status,
                                body: response.body,
                            }),
                        };
                    }
                }
                Err(TransportError::Timeout) => {
                    attempts.push(SubmissionAttempt {
                        number: attempt,
                        outcome: AttemptOutcome::Timeout,
                        body: None,
                    });
                    if attempt < max_retries {
                        warn!(
                            attempt,
                            "request timed out, retrying in {}s",
                            delay.as_secs()
                        );
                        thread::sleep(delay);
                    } else {
                        warn!("max retries reached, request failed due to timeout");
                        return Submission {
                            attempts,
                            result: Err(SubmitError::TimeoutExhausted {
                                attempts: max_retries,
                            }),
                        };
                    }
                }
                // Connection failures and any other transport-level
                // failure share a retry path and exhaustion error.
                Err(err) => {
                    let detail = err.to_string();
                    attempts.push(SubmissionAttempt {
                        number: attempt,
                        outcome: AttemptOutcome::ConnectionFailure(detail.clone()),
                        body: None,
                    });
                    if attempt < max_retries {
                        warn!(attempt, "{detail}, retrying in {}s", delay.as_secs());
                        thread::sleep(delay);
                    } else {
                        warn!("max retries reached, request failed: {detail}");
                        return Submission {
                            attempts,
                            result: Err(SubmitError::ConnectionExhausted {
                                attempts: max_retries,
                                detail,
                            }),
                        };
                    }
                }
            }
        }

        unreachable!("retry loop always returns on the final attempt")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schedule::BatchMonth;
    use crate::template::{TemplateSpec, TemplateTable};
    use std::sync::Mutex;
    use std::time::Instant;

    /// Transport that plays back a scripted sequence of answers and
    /// counts how many calls were made.
    pub(crate) struct ScriptedTransport {
        script: Mutex<Vec<Result<HttpResponse, TransportError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(script: Vec<Result<HttpResponse, TransportError>>) -> Self {
            ScriptedTransport {
                script: Mutex::new(script),
                calls: Mutex::new(0),
            }
        }

        pub(crate) fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl Transport for &ScriptedTransport {
        fn post_json(
            &self,
            _url: &str,
            _request: &RegenerateRequest<'_>,
            _timeout: Duration,
        ) -> Result<HttpResponse, TransportError> {
            *self.calls.lock().unwrap() += 1;
            let mut script = self.script.lock().unwrap();
            assert!(!script.is_empty(), "transport called more than scripted");
            script.remove(0)
        }
    }

    fn ok(status: u16, body: &str) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status,
            body: body.to_string(),
        })
    }

    pub(crate) fn test_config() -> Config {
        Config {
            endpoint: "http://127.0.0.1:9/report-service/regenerate".into(),
            request_timeout: Duration::from_secs(1),
            max_retries: 3,
            retry_delay: Duration::from_millis(10),
            request_pause: Duration::ZERO,
            sftp: SftpConfig {
                host: "sftp.example.test".into(),
                port: 2225,
                username: "app".into(),
                password: String::new(),
                private_key: "/home/app/.ssh/id_rsa".into(),
            },
            user: UserConfig {
                id: 1,
                name: "tester".into(),
            },
            templates: TemplateTable::new(vec![
                TemplateSpec {
                    id: 19,
                    label: "Master User AID".into(),
                    destination: "/dest/master/".into(),
                },
                TemplateSpec {
                    id: 26,
                    label: "Transaction Astrapay AID".into(),
                    destination: "/dest/transaction/".into(),
                },
            ]),
            batch_months: vec![BatchMonth {
                year: 2025,
                month: 9,
            }],
        }
    }

    fn range() -> DateRange {
        DateRange::parse("2025-09-01 00:00:00", "2025-09-02 00:00:00").unwrap()
    }

    #[test]
    fn success_returns_body_after_one_attempt() {
        let transport = ScriptedTransport::new(vec![ok(200, "OK")]);
        let client = ReportClient::with_transport(test_config(), &transport);
        assert_eq!(client.submit(&range(), 19).unwrap(), "OK");
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn unknown_template_never_touches_the_network() {
        let transport = ScriptedTransport::new(vec![]);
        let client = ReportClient::with_transport(test_config(), &transport);
        match client.submit(&range(), 99) {
            Err(SubmitError::InvalidTemplate(id)) => assert_eq!(id, 99),
            other => panic!("expected InvalidTemplate, got {other:?}"),
        }
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn server_errors_are_retried_until_success() {
        // 5xx on the first two attempts, 2xx on the third.
        let transport =
            ScriptedTransport::new(vec![ok(500, "busy"), ok(503, "busy"), ok(200, "done")]);
        let client = ReportClient::with_transport(test_config(), &transport);
        assert_eq!(client.submit(&range(), 19).unwrap(), "done");
        assert_eq!(transport.calls(), 3);
    }

    #[test]
    fn client_rejection_is_not_retried() {
        let transport = ScriptedTransport::new(vec![ok(404, "no such template")]);
        let client = ReportClient::with_transport(test_config(), &transport);
        match client.submit(&range(), 19) {
            Err(SubmitError::ClientRejected { status, body }) => {
                assert_eq!(status, 404);
                assert_eq!(body, "no such template");
            }
            other => panic!("expected ClientRejected, got {other:?}"),
        }
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn timeouts_exhaust_after_max_retries_with_pauses() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
        ]);
        let config = test_config();
        let delay = config.retry_delay;
        let client = ReportClient::with_transport(config, &transport);

        let started = Instant::now();
        match client.submit(&range(), 19) {
            Err(SubmitError::TimeoutExhausted { attempts }) => assert_eq!(attempts, 3),
            other => panic!("expected TimeoutExhausted, got {other:?}"),
        }
        assert_eq!(transport.calls(), 3);
        // Two pauses between three attempts.
        assert!(started.elapsed() >= delay * 2);
    }

    #[test]
    fn connection_failures_exhaust_like_timeouts() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Connect("refused".into())),
            Err(TransportError::Other("tls handshake".into())),
            Err(TransportError::Connect("refused".into())),
        ]);
        let client = ReportClient::with_transport(test_config(), &transport);
        match client.submit(&range(), 19) {
            Err(SubmitError::ConnectionExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected ConnectionExhausted, got {other:?}"),
        }
        assert_eq!(transport.calls(), 3);
    }

    #[test]
    fn server_error_exhaustion_carries_the_last_answer() {
        let transport = ScriptedTransport::new(vec![ok(500, "a"), ok(502, "b"), ok(503, "c")]);
        let client = ReportClient::with_transport(test_config(), &transport);
        match client.submit(&range(), 19) {
            Err(SubmitError::ServerErrorExhausted {
                attempts,
                status,
                body,
            }) => {
                assert_eq!(attempts, 3);
                assert_eq!(status, 503);
                assert_eq!(body, "c");
            }
            other => panic!("expected ServerErrorExhausted, got {other:?}"),
        }
    }

    #[test]
    fn tracked_submission_records_every_attempt() {
        let transport = ScriptedTransport::new(vec![ok(500, "busy"), ok(200, "done")]);
        let client = ReportClient::with_transport(test_config(), &transport);
        let submission = client.submit_tracked(&range(), 19);
        assert_eq!(submission.result.unwrap(), "done");
        assert_eq!(submission.attempts.len(), 2);
        assert_eq!(submission.attempts[0].number, 1);
        assert_eq!(
            submission.attempts[0].outcome,
            AttemptOutcome::ServerError(500)
        );
        assert_eq!(submission.attempts[1].number, 2);
        assert_eq!(submission.attempts[1].outcome, AttemptOutcome::Success);
        assert_eq!(submission.attempts[1].body.as_deref(), Some("done"));
    }

    #[test]
    fn payload_matches_the_wire_contract() {
        let config = test_config();
        let template = config.templates.resolve(19).unwrap();
        let request = RegenerateRequest::new(&range(), template, &config.sftp, &config.user);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["templateId"], 19);
        assert_eq!(value["groupType"], "SINGLE");
        assert_eq!(value["fileType"], "TXT");
        assert_eq!(value["startDate"], "2025-09-01 00:00:00");
        assert_eq!(value["endDate"], "2025-09-02 00:00:00");
        assert_eq!(value["delimiter"], "CARET");
        assert_eq!(value["type"], "DATA_TRANSFER_AID");
        assert_eq!(value["sftp"]["ipAddress"], "sftp.example.test");
        assert_eq!(value["sftp"]["port"], 2225);
        assert_eq!(value["sftp"]["username"], "app");
        assert_eq!(value["sftp"]["destination"], "/dest/master/");
        assert_eq!(value["sftp"]["privateKey"], "/home/app/.ssh/id_rsa");
        assert_eq!(value["user"]["id"], 1);
        assert_eq!(value["user"]["name"], "tester");
    }

    #[test]
    fn destination_follows_the_selected_template() {
        let config = test_config();
        let template = config.templates.resolve(26).unwrap();
        let request = RegenerateRequest::new(&range(), template, &config.sftp, &config.user);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["sftp"]["destination"], "/dest/transaction/");
    }
}
