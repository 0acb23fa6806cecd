use std::io::Read;
use std::process::Child;
use std::thread::JoinHandle;

use tracing::debug;

use crate::group::kill_group;

/// A running process whose stdout is consumed incrementally.
///
/// Dropping the stream kills the process, so a reader blocked on stdout sees EOF.
pub struct ProcessStream {
    command: String,
    stdout: Option<Box<dyn Read + Send>>,
    stderr: Option<JoinHandle<String>>,
    child: Option<Child>,
}

impl ProcessStream {
    pub fn new(command: String, mut child: Child) -> Self {
        let stdout = child.stdout.take().map(|s| Box::new(s) as Box<dyn Read + Send>);
        let stderr = child.stderr.take().map(|mut s| {
            std::thread::spawn(move || {
                let mut buf = String::new();
                let _ = s.read_to_string(&mut buf);
                buf
            })
        });
        Self { command, stdout, stderr, child: Some(child) }
    }

    /// A stream backed by an in-memory or synthetic reader with no process behind it.
    pub fn from_reader(command: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        Self { command: command.into(), stdout: Some(Box::new(reader)), stderr: None, child: None }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        self.stdout.take()
    }

    /// Stops the process if it is still running and returns what it wrote to stderr.
    pub fn finish(mut self) -> String {
        self.terminate();
        match self.stderr.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => String::new(),
        }
    }

    fn terminate(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Ok(None) = child.try_wait() {
                debug!(command = %self.command, "killing streaming process");
                kill_group(&mut child);
            }
            let _ = child.wait();
        }
    }
}

impl Drop for ProcessStream {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reader_stream_yields_content_once() {
        let mut s = ProcessStream::from_reader("fake", Cursor::new(b"hello".to_vec()));
        let mut out = String::new();
        s.take_stdout().unwrap().read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello");
        assert!(s.take_stdout().is_none());
        assert_eq!(s.finish(), "");
    }
}
