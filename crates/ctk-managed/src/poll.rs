use std::thread;
use std::time::{Duration, Instant};

use ctk_core::conditions::{observe_managed, Condition};
use ctk_core::{Result, WaitOutcome};
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Default, Deserialize)]
struct Described {
    #[serde(default)]
    conditions: Option<Vec<Condition>>,
    #[serde(default)]
    status: Option<DescribedStatus>,
}

#[derive(Debug, Default, Deserialize)]
struct DescribedStatus {
    #[serde(default)]
    conditions: Vec<Condition>,
}

/// Conditions of a described run, top level first, then under `status`.
pub fn described_conditions(json: &str) -> Result<Vec<Condition>> {
    let described: Described = serde_json::from_str(json)?;
    Ok(match described.conditions {
        Some(conditions) => conditions,
        None => described.status.map(|s| s.conditions).unwrap_or_default(),
    })
}

/// Calls `describe` every `interval` until a terminal verdict or `timeout`.
///
/// `describe` is handed the time left before the deadline and must not block past it.
/// Describe failures are logged and polling continues; only the deadline ends the loop
/// without a verdict.
pub fn poll_until(
    mut describe: impl FnMut(Duration) -> Result<String>,
    interval: Duration,
    timeout: Duration,
) -> WaitOutcome {
    let start = Instant::now();
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match describe(timeout.saturating_sub(start.elapsed())).and_then(|json| described_conditions(&json)) {
            Ok(conditions) => {
                if let Some(outcome) = observe_managed(&conditions) {
                    debug!(attempt, %outcome, "run reached a terminal state");
                    return outcome;
                }
                debug!(attempt, "run still in progress");
            }
            Err(e) => warn!(attempt, error = %e, "describe failed, polling again"),
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return WaitOutcome::TimedOut { after: timeout };
        }
        thread::sleep(interval.min(timeout - elapsed));
    }
}
