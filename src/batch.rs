// Batch driver: runs a plan of date ranges times template ids through
// the submission client, one request at a time. Terminal submission
// errors are recorded and the run continues with the next item. A
// checkpoint file in the home directory remembers the last completed
// request number so an interrupted run can be resumed.

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::api::{ReportClient, Transport};
use crate::error::SubmitError;
use crate::schedule::DateRange;

const CHECKPOINT_FILE: &str = ".aidreport_resume";

/// The requests a batch run will make: every template for every range,
/// range-major (all templates for day 1, then day 2, ...).
#[derive(Debug, Clone)]
pub struct BatchPlan {
    ranges: Vec<DateRange>,
    template_ids: Vec<u32>,
}

impl BatchPlan {
    pub fn new(ranges: Vec<DateRange>, template_ids: Vec<u32>) -> Self {
        BatchPlan {
            ranges,
            template_ids,
        }
    }

    pub fn days(&self) -> usize {
        self.ranges.len()
    }

    pub fn requests_per_day(&self) -> usize {
        self.template_ids.len()
    }

    pub fn template_ids(&self) -> &[u32] {
        &self.template_ids
    }

    pub fn total_requests(&self) -> usize {
        self.ranges.len() * self.template_ids.len()
    }

    /// The planned requests, numbered from 1 in submission order.
    pub fn requests(&self) -> Vec<PlannedRequest> {
        let mut requests = Vec::with_capacity(self.total_requests());
        for (day_index, range) in self.ranges.iter().enumerate() {
            for template_id in &self.template_ids {
                requests.push(PlannedRequest {
                    number: requests.len() + 1,
                    day: day_index + 1,
                    range: range.clone(),
                    template_id: *template_id,
                });
            }
        }
        requests
    }
}

/// One request in a batch plan.
#[derive(Debug, Clone)]
pub struct PlannedRequest {
    /// 1-based position in the overall run.
    pub number: usize,
    /// 1-based day within the plan.
    pub day: usize,
    pub range: DateRange,
    pub template_id: u32,
}

/// Options controlling one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// First request number to actually submit; earlier ones are skipped.
    pub start_from: usize,
    /// Pause between consecutive requests.
    pub pause: Duration,
    /// Whether to persist the resume checkpoint after each request.
    pub record_checkpoint: bool,
}

/// What happened to one processed request.
#[derive(Debug)]
pub struct BatchRecord {
    pub number: usize,
    pub day: usize,
    pub template_id: u32,
    pub range: DateRange,
    /// Attempts the submission client made for this request.
    pub attempts: u32,
    pub result: Result<String, SubmitError>,
}

/// Progress notifications emitted while a batch run is underway.
#[derive(Debug)]
pub enum BatchProgress<'a> {
    Submitting {
        request: &'a PlannedRequest,
        total: usize,
    },
    Completed {
        record: &'a BatchRecord,
    },
    Pausing {
        seconds: u64,
    },
}

/// Totals for a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    fn from_records(total: usize, records: &[BatchRecord]) -> Self {
        let succeeded = records.iter().filter(|r| r.result.is_ok()).count();
        BatchSummary {
            total,
            attempted: records.len(),
            succeeded,
            failed: records.len() - succeeded,
        }
    }

    /// Share of processed requests that succeeded, as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.attempted as f64 * 100.0
        }
    }
}

/// Records and totals for a finished run.
#[derive(Debug)]
pub struct BatchOutcome {
    pub records: Vec<BatchRecord>,
    pub summary: BatchSummary,
}

/// Run a batch plan. Requests below `start_from` are skipped; every
/// other request is submitted in order, its outcome recorded, and the
/// run continues past failures. `observe` is called as each request
/// starts, finishes, and while pausing between requests.
pub fn run_batch<T: Transport>(
    client: &ReportClient<T>,
    plan: &BatchPlan,
    opts: &BatchOptions,
    mut observe: impl FnMut(&BatchProgress<'_>),
) -> BatchOutcome {
    let total = plan.total_requests();
    let mut records = Vec::new();

    for request in &plan.requests() {
        if request.number < opts.start_from {
            continue;
        }

        observe(&BatchProgress::Submitting { request, total });
        let submission = client.submit_tracked(&request.range, request.template_id);
        let record = BatchRecord {
            number: request.number,
            day: request.day,
            template_id: request.template_id,
            range: request.range.clone(),
            attempts: submission.attempts.len() as u32,
            result: submission.result,
        };

        if opts.record_checkpoint {
            if let Err(err) = save_checkpoint(request.number) {
                warn!("could not persist batch checkpoint: {err}");
            }
        }

        observe(&BatchProgress::Completed { record: &record });
        records.push(record);

        if request.number < total {
            observe(&BatchProgress::Pausing {
                seconds: opts.pause.as_secs(),
            });
            thread::sleep(opts.pause);
        }
    }

    // A run that reached the final request leaves nothing to resume.
    let finished = records.last().map_or(false, |r| r.number == total);
    if opts.record_checkpoint && finished {
        if let Err(err) = clear_checkpoint() {
            warn!("could not clear batch checkpoint: {err}");
        }
    }

    let summary = BatchSummary::from_records(total, &records);
    BatchOutcome { records, summary }
}

fn checkpoint_path() -> PathBuf {
    let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.join(CHECKPOINT_FILE)
}

/// Persist the last completed request number.
pub fn save_checkpoint(request_number: usize) -> std::io::Result<()> {
    fs::write(checkpoint_path(), request_number.to_string())
}

/// Last completed request number from a previous run, if any.
pub fn load_checkpoint() -> Option<usize> {
    let raw = fs::read_to_string(checkpoint_path()).ok()?;
    raw.trim().parse().ok()
}

/// Remove the checkpoint once a run has completed.
pub fn clear_checkpoint() -> std::io::Result<()> {
    let path = checkpoint_path();
    if path.exists() {
        fs::remove_file(path)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::{test_config, ScriptedTransport};
    use crate::api::{HttpResponse, ReportClient};
    use crate::error::TransportError;
    use crate::schedule::daily_ranges_for_month;

    fn ok(status: u16, body: &str) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status,
            body: body.to_string(),
        })
    }

    fn two_day_plan() -> BatchPlan {
        let ranges = daily_ranges_for_month(2025, 9)
            .into_iter()
            .take(2)
            .collect();
        BatchPlan::new(ranges, vec![19, 26])
    }

    fn options() -> BatchOptions {
        BatchOptions {
            start_from: 1,
            pause: Duration::ZERO,
            record_checkpoint: false,
        }
    }

    #[test]
    fn plan_covers_every_template_for_every_day() {
        let plan = two_day_plan();
        assert_eq!(plan.total_requests(), 4);
        assert_eq!(plan.days(), 2);
        assert_eq!(plan.requests_per_day(), 2);

        let requests = plan.requests();
        // Range-major order: both templates for day 1 come first.
        assert_eq!(requests[0].template_id, 19);
        assert_eq!(requests[1].template_id, 26);
        assert_eq!(requests[0].range, requests[1].range);
        assert_eq!(requests[2].day, 2);
        assert_eq!(
            requests.iter().map(|r| r.number).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn a_failing_request_does_not_stop_the_run() {
        let transport = ScriptedTransport::new(vec![
            ok(200, "OK"),
            ok(400, "bad request"),
            ok(200, "OK"),
            ok(200, "OK"),
        ]);
        let client = ReportClient::with_transport(test_config(), &transport);
        let outcome = run_batch(&client, &two_day_plan(), &options(), |_| {});

        assert_eq!(outcome.records.len(), 4);
        assert_eq!(outcome.summary.attempted, 4);
        assert_eq!(outcome.summary.succeeded, 3);
        assert_eq!(outcome.summary.failed, 1);
        assert!(outcome.records[1].result.is_err());
        assert_eq!(outcome.summary.success_rate(), 75.0);
    }

    #[test]
    fn start_from_skips_earlier_requests() {
        let transport = ScriptedTransport::new(vec![ok(200, "OK")]);
        let client = ReportClient::with_transport(test_config(), &transport);
        let opts = BatchOptions {
            start_from: 4,
            ..options()
        };
        let outcome = run_batch(&client, &two_day_plan(), &opts, |_| {});

        assert_eq!(transport.calls(), 1);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].number, 4);
        assert_eq!(outcome.summary.total, 4);
        assert_eq!(outcome.summary.attempted, 1);
    }

    #[test]
    fn records_carry_the_attempt_count() {
        // First request needs two attempts, the rest succeed directly.
        let transport = ScriptedTransport::new(vec![
            ok(500, "busy"),
            ok(200, "OK"),
            ok(200, "OK"),
            ok(200, "OK"),
            ok(200, "OK"),
        ]);
        let client = ReportClient::with_transport(test_config(), &transport);
        let outcome = run_batch(&client, &two_day_plan(), &options(), |_| {});

        assert_eq!(outcome.records[0].attempts, 2);
        assert_eq!(outcome.records[1].attempts, 1);
        assert_eq!(outcome.summary.succeeded, 4);
    }

    #[test]
    fn observer_sees_each_request_start_and_finish() {
        let transport = ScriptedTransport::new(vec![
            ok(200, "OK"),
            ok(200, "OK"),
            ok(200, "OK"),
            ok(200, "OK"),
        ]);
        let client = ReportClient::with_transport(test_config(), &transport);
        let mut submitted = 0usize;
        let mut completed = 0usize;
        run_batch(&client, &two_day_plan(), &options(), |progress| {
            match progress {
                BatchProgress::Submitting { .. } => submitted += 1,
                BatchProgress::Completed { .. } => completed += 1,
                BatchProgress::Pausing { .. } => {}
            }
        });
        assert_eq!(submitted, 4);
        assert_eq!(completed, 4);
    }

    #[test]
    fn empty_plan_produces_an_empty_summary() {
        let transport = ScriptedTransport::new(vec![]);
        let client = ReportClient::with_transport(test_config(), &transport);
        let plan = BatchPlan::new(Vec::new(), vec![19, 26]);
        let outcome = run_batch(&client, &plan, &options(), |_| {});
        assert_eq!(outcome.summary.total, 0);
        assert_eq!(outcome.summary.attempted, 0);
        assert_eq!(outcome.summary.success_rate(), 0.0);
    }
}
