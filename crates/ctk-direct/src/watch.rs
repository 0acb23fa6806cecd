//! Decoding of `kubectl get --watch --output-watch-events -o json` streams.

use std::io::Read;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use ctk_core::conditions::{observe_direct, RunStatus, WatchEvent};
use ctk_core::{Result, WaitOutcome};
use ctk_exec::ProcessStream;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    type_: String,
    #[serde(default)]
    object: Value,
}

/// `None` for event types that say nothing about the run (bookmarks).
fn decode(raw: RawEvent) -> Result<Option<WatchEvent>> {
    let status = |object: &Value| -> Result<RunStatus> {
        match object.get("status") {
            Some(s) => Ok(serde_json::from_value(s.clone())?),
            None => Ok(RunStatus::default()),
        }
    };
    Ok(match raw.type_.as_str() {
        "ADDED" => Some(WatchEvent::Added(status(&raw.object)?)),
        "MODIFIED" => Some(WatchEvent::Modified(status(&raw.object)?)),
        "DELETED" => Some(WatchEvent::Deleted),
        "ERROR" => Some(WatchEvent::Error(
            raw.object.get("message").and_then(Value::as_str).unwrap_or("unknown watch error").to_string(),
        )),
        other => {
            debug!(event = other, "ignoring watch event");
            None
        }
    })
}

/// Decodes a concatenated JSON event stream, one `Result` per event.
pub fn decode_events(reader: impl Read) -> impl Iterator<Item = Result<WatchEvent>> {
    serde_json::Deserializer::from_reader(reader)
        .into_iter::<RawEvent>()
        .filter_map(|raw| match raw {
            Ok(raw) => decode(raw).transpose(),
            Err(e) => Some(Err(e.into())),
        })
}

/// Follows the stream until a terminal verdict or `timeout`.
///
/// Decoding happens on a helper thread; this side only waits on the channel, so the
/// deadline holds even when the process goes silent. A stream that ends without a
/// verdict is reported as timed out.
pub fn watch_until(mut stream: ProcessStream, expected: &str, timeout: Duration) -> WaitOutcome {
    let start = Instant::now();
    let Some(stdout) = stream.take_stdout() else {
        return WaitOutcome::TimedOut { after: start.elapsed() };
    };

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for event in decode_events(stdout) {
            let failed = event.is_err();
            if tx.send(event).is_err() || failed {
                break;
            }
        }
    });

    loop {
        let remaining = timeout.saturating_sub(start.elapsed());
        match rx.recv_timeout(remaining) {
            Ok(Ok(event)) => {
                debug!(command = stream.command(), ?event, "watch event");
                if let Some(outcome) = observe_direct(&event, expected) {
                    return outcome;
                }
            }
            Ok(Err(e)) => {
                warn!(command = stream.command(), error = %e, "undecodable watch output");
            }
            Err(RecvTimeoutError::Timeout) => return WaitOutcome::TimedOut { after: timeout },
            Err(RecvTimeoutError::Disconnected) => {
                let command = stream.command().to_string();
                let stderr = stream.finish();
                warn!(command = %command, stderr = %stderr.trim(), "watch ended without a verdict");
                return WaitOutcome::TimedOut { after: start.elapsed() };
            }
        }
    }
}
