use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ctk_core::{Error, Result};
use tracing::{debug, warn};

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::group::{isolate, kill_group};
use crate::stream::ProcessStream;

const POLL: Duration = Duration::from_millis(20);
/// How long a killed command's pipes may stay open before its output is taken as is.
const KILL_GRACE: Duration = Duration::from_millis(250);

/// Output of one pipe, readable while the reader thread is still blocked.
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    reader: JoinHandle<()>,
}

impl Capture {
    fn start(mut r: impl Read + Send + 'static) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = buf.clone();
        let reader = thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            loop {
                match r.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink.lock().unwrap_or_else(|e| e.into_inner()).extend_from_slice(&chunk[..n]),
                }
            }
        });
        Self { buf, reader }
    }

    /// Everything read so far. With a grace period the reader is not waited on past it.
    fn finish(self, grace: Option<Duration>) -> String {
        match grace {
            None => {
                let _ = self.reader.join();
            }
            Some(grace) => {
                let until = Instant::now() + grace;
                while !self.reader.is_finished() && Instant::now() < until {
                    thread::sleep(POLL);
                }
            }
        }
        let buf = self.buf.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn finish_capture(capture: Option<Capture>, grace: Option<Duration>) -> String {
    capture.map(|c| c.finish(grace)).unwrap_or_default()
}

/// Runs real processes on the host.
#[derive(Clone, Debug)]
pub struct SystemRunner {
    pub default_timeout: Duration,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self { default_timeout: Duration::from_secs(300) }
    }
}

impl SystemRunner {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    fn command(cmd: &CommandSpec) -> Command {
        let mut c = Command::new(&cmd.program);
        c.args(&cmd.args);
        for (k, v) in &cmd.env {
            c.env(k, v);
        }
        isolate(&mut c);
        c
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        let command_line = cmd.command_line();
        let timeout = cmd.timeout.unwrap_or(self.default_timeout);
        debug!(command = %command_line, ?timeout, "exec");

        let start = Instant::now();
        let mut child = Self::command(cmd)
            .stdin(if cmd.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn { command: command_line.clone(), source })?;

        let stdin_handle = match (child.stdin.take(), cmd.stdin.clone()) {
            (Some(mut pipe), Some(input)) => Some(thread::spawn(move || {
                let _ = pipe.write_all(input.as_bytes());
            })),
            _ => None,
        };
        let stdout = child.stdout.take().map(Capture::start);
        let stderr = child.stderr.take().map(Capture::start);

        let mut timed_out = false;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break Some(status);
            }
            if start.elapsed() >= timeout {
                timed_out = true;
                kill_group(&mut child);
                break child.wait().ok();
            }
            thread::sleep(POLL);
        };

        if let Some(h) = stdin_handle {
            if !timed_out {
                let _ = h.join();
            }
        }
        let grace = timed_out.then_some(KILL_GRACE);
        let output = CommandOutput {
            success: !timed_out && status.is_some_and(|s| s.success()),
            exit_code: status.and_then(|s| s.code()),
            stdout: finish_capture(stdout, grace),
            stderr: finish_capture(stderr, grace),
        };

        if timed_out {
            warn!(command = %command_line, ?timeout, "command timed out");
            return Err(Error::CommandTimedOut { command: command_line, after: timeout, output: output.combined() });
        }
        debug!(
            command = %command_line,
            exit_code = ?output.exit_code,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "exec finished"
        );
        Ok(output)
    }

    fn stream(&self, cmd: &CommandSpec) -> Result<ProcessStream> {
        let command_line = cmd.command_line();
        debug!(command = %command_line, "stream");
        let child = Self::command(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn { command: command_line.clone(), source })?;
        Ok(ProcessStream::new(command_line, child))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit() {
        let r = SystemRunner::default();
        let out = r.run(&CommandSpec::new("sh").args(["-c", "echo hi; echo oops >&2; exit 3"])).unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout, "hi\n");
        assert_eq!(out.stderr, "oops\n");
    }

    #[test]
    fn feeds_stdin() {
        let r = SystemRunner::default();
        let out = r.run_checked(&CommandSpec::new("cat").stdin("a: 1\n")).unwrap();
        assert_eq!(out.stdout, "a: 1\n");
    }

    #[test]
    fn non_zero_exit_carries_output() {
        let r = SystemRunner::default();
        let err = r.run_checked(&CommandSpec::new("sh").args(["-c", "echo forbidden >&2; exit 1"])).unwrap_err();
        assert_eq!(err.output().map(str::trim), Some("forbidden"));
    }

    #[test]
    fn kills_on_timeout() {
        let r = SystemRunner::default();
        let started = Instant::now();
        let err = r.run(&CommandSpec::new("sleep").arg("5").timeout(Duration::from_millis(200))).unwrap_err();
        assert!(matches!(err, Error::CommandTimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn timeout_reaches_processes_forked_by_a_wrapper() {
        let r = SystemRunner::default();
        let started = Instant::now();
        let err = r
            .run(&CommandSpec::new("sh").args(["-c", "echo started; sleep 4; echo done"]).timeout(Duration::from_millis(200)))
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
        match err {
            Error::CommandTimedOut { output, .. } => {
                assert!(output.contains("started"));
                assert!(!output.contains("done"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let r = SystemRunner::default();
        let err = r.run(&CommandSpec::new("ctk-definitely-not-installed")).unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }
}
