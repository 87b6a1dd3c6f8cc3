use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Error, Result};

/// Classification of the broker's free-form status strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Completed,
    Running,
    /// Terminal but not `completed` (e.g. `failed`). Carries the raw string.
    Failed(String),
}

impl JobStatus {
    /// The broker reports progress as a lowercase word. Anything outside the
    /// known in-flight vocabulary is treated as terminal, so a `failed` (or a
    /// status this client has never seen) can never spin a poll loop forever.
    pub fn classify(raw: &str) -> Self {
        let s = raw.trim().to_ascii_lowercase();
        match s.as_str() {
            "completed" => JobStatus::Completed,
            "accepted" | "queued" | "started" | "running" => JobStatus::Running,
            _ => JobStatus::Failed(raw.trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PollBudget {
    pub interval: Duration,
    pub timeout: Duration,
    pub max_attempts: u32,
}

/// Poll `fetch` until the status classifies as completed.
///
/// The first probe fires immediately; later probes are spaced by
/// `budget.interval`. Gives up with [`Error::PollTimeout`] once either the
/// attempt cap or the wall-clock budget is spent, and with
/// [`Error::BrokerFailure`] on any terminal non-completed status.
///
/// Returns the number of probes issued.
pub(crate) fn wait_until_complete<F>(
    what: &'static str,
    id: &str,
    budget: PollBudget,
    mut fetch: F,
) -> Result<u32>
where
    F: FnMut() -> Result<String>,
{
    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let raw = fetch()?;
        debug!(what, id, status = %raw, attempts, "status probe");

        match JobStatus::classify(&raw) {
            JobStatus::Completed => return Ok(attempts),
            JobStatus::Failed(status) => {
                return Err(Error::BrokerFailure {
                    what,
                    id: id.to_string(),
                    status,
                });
            }
            JobStatus::Running => {}
        }

        let waited = started.elapsed();
        if attempts >= budget.max_attempts || waited + budget.interval > budget.timeout {
            return Err(Error::PollTimeout {
                what,
                id: id.to_string(),
                last_status: raw,
                attempts,
                waited,
            });
        }

        thread::sleep(budget.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_budget(max_attempts: u32) -> PollBudget {
        PollBudget {
            interval: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
            max_attempts,
        }
    }

    #[test]
    fn classifies_known_statuses() {
        assert_eq!(JobStatus::classify("completed"), JobStatus::Completed);
        assert_eq!(JobStatus::classify("COMPLETED"), JobStatus::Completed);
        assert_eq!(JobStatus::classify("running"), JobStatus::Running);
        assert_eq!(JobStatus::classify("queued"), JobStatus::Running);
        assert_eq!(
            JobStatus::classify("failed"),
            JobStatus::Failed("failed".into())
        );
        // Unknown strings are terminal, not "still running".
        assert_eq!(
            JobStatus::classify("exploded"),
            JobStatus::Failed("exploded".into())
        );
    }

    #[test]
    fn immediate_completion_probes_exactly_once() {
        let mut calls = 0;
        let attempts = wait_until_complete("job", "j1", tiny_budget(10), || {
            calls += 1;
            Ok("completed".to_string())
        })
        .unwrap();
        assert_eq!(attempts, 1);
        assert_eq!(calls, 1);
    }

    #[test]
    fn failed_status_is_an_error_not_a_loop() {
        let err = wait_until_complete("job", "j1", tiny_budget(10), || {
            Ok("failed".to_string())
        })
        .unwrap_err();
        match err {
            Error::BrokerFailure { what, id, status } => {
                assert_eq!(what, "job");
                assert_eq!(id, "j1");
                assert_eq!(status, "failed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn completes_after_a_few_running_probes() {
        let mut calls = 0;
        let attempts = wait_until_complete("order", "o1", tiny_budget(10), || {
            calls += 1;
            Ok(if calls < 3 { "running" } else { "completed" }.to_string())
        })
        .unwrap();
        assert_eq!(attempts, 3);
    }

    #[test]
    fn attempt_cap_yields_timeout() {
        let mut calls = 0;
        let err = wait_until_complete("job", "j1", tiny_budget(3), || {
            calls += 1;
            Ok("running".to_string())
        })
        .unwrap_err();
        assert_eq!(calls, 3);
        match err {
            Error::PollTimeout {
                attempts,
                last_status,
                ..
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_status, "running");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn fetch_errors_propagate() {
        let err = wait_until_complete("job", "j1", tiny_budget(3), || {
            Err(Error::MissingField("status"))
        })
        .unwrap_err();
        assert!(matches!(err, Error::MissingField("status")));
    }
}
