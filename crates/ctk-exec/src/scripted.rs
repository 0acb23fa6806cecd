//! Canned command runner for tests: replies are matched by program and argument
//! fragments, and every invocation is recorded for later inspection.

use std::collections::VecDeque;
use std::io::{Cursor, Read};
use std::sync::Mutex;
use std::time::Duration;

use ctk_core::{Error, Result};

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::stream::ProcessStream;

#[derive(Clone, Debug)]
pub enum Reply {
    Output(CommandOutput),
    TimedOut,
    /// Stream that produces nothing and closes after the given delay.
    Hang(Duration),
}

impl Reply {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Reply::Output(CommandOutput { success: true, exit_code: Some(0), stdout: stdout.into(), stderr: String::new() })
    }

    pub fn fail(stderr: impl Into<String>) -> Self {
        Reply::Output(CommandOutput { success: false, exit_code: Some(1), stdout: String::new(), stderr: stderr.into() })
    }
}

struct Rule {
    program: String,
    needles: Vec<String>,
    replies: VecDeque<Reply>,
}

impl Rule {
    fn matches(&self, cmd: &CommandSpec) -> bool {
        self.program == cmd.program && self.needles.iter().all(|n| cmd.args.iter().any(|a| a.contains(n.as_str())))
    }
}

#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reply for commands of `program` whose args contain every needle.
    ///
    /// Registering the same matcher again queues another reply; the last queued reply repeats.
    pub fn on(self, program: &str, needles: &[&str], reply: Reply) -> Self {
        {
            let mut rules = self.rules.lock().expect("rules lock");
            let needles: Vec<String> = needles.iter().map(|s| s.to_string()).collect();
            match rules.iter_mut().find(|r| r.program == program && r.needles == needles) {
                Some(rule) => rule.replies.push_back(reply),
                None => rules.push(Rule { program: program.to_string(), needles, replies: VecDeque::from([reply]) }),
            }
        }
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::command_line).collect()
    }

    fn reply_for(&self, cmd: &CommandSpec) -> Result<Reply> {
        self.calls.lock().expect("calls lock").push(cmd.clone());
        let mut rules = self.rules.lock().expect("rules lock");
        let rule = rules.iter_mut().find(|r| r.matches(cmd)).ok_or_else(|| Error::Spawn {
            command: cmd.command_line(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no scripted reply"),
        })?;
        let reply = if rule.replies.len() > 1 { rule.replies.pop_front() } else { rule.replies.front().cloned() };
        reply.ok_or_else(|| Error::Parse(format!("empty reply queue for `{}`", cmd.command_line())))
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        match self.reply_for(cmd)? {
            Reply::Output(out) => Ok(out),
            Reply::TimedOut | Reply::Hang(_) => Err(Error::CommandTimedOut {
                command: cmd.command_line(),
                after: cmd.timeout.unwrap_or_default(),
                output: String::new(),
            }),
        }
    }

    fn stream(&self, cmd: &CommandSpec) -> Result<ProcessStream> {
        match self.reply_for(cmd)? {
            Reply::Output(out) if out.success => {
                Ok(ProcessStream::from_reader(cmd.command_line(), Cursor::new(out.stdout.into_bytes())))
            }
            Reply::Output(out) => Err(Error::CommandFailed { command: cmd.command_line(), output: out.combined() }),
            Reply::TimedOut => Err(Error::CommandTimedOut {
                command: cmd.command_line(),
                after: cmd.timeout.unwrap_or_default(),
                output: String::new(),
            }),
            Reply::Hang(delay) => Ok(ProcessStream::from_reader(cmd.command_line(), Hang(Some(delay)))),
        }
    }
}

struct Hang(Option<Duration>);

impl Read for Hang {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        if let Some(d) = self.0.take() {
            std::thread::sleep(d);
        }
        Ok(0)
    }
}
