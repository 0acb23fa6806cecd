use std::sync::OnceLock;

use regex::Regex;

use crate::{Error, Result, RunKind, TektonRun};

pub const TEKTON_RUN_PATTERN: &str = r"(?m)^(taskrun|pipelinerun)\.tekton\.dev/(\S+)\s+created$";

fn run_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(TEKTON_RUN_PATTERN).expect("run pattern compiles"))
}

/// Every run reported as created in `kubectl apply` output, in output order.
pub fn parse_created_runs(output: &str) -> Vec<TektonRun> {
    run_pattern()
        .captures_iter(output)
        .filter_map(|caps| {
            let kind = caps.get(1)?.as_str().parse::<RunKind>().ok()?;
            let name = caps.get(2)?.as_str();
            Some(TektonRun::new(name, kind))
        })
        .collect()
}

/// The first run reported as created. An apply that creates no run is an error.
pub fn parse_created_run(output: &str) -> Result<TektonRun> {
    parse_created_runs(output)
        .into_iter()
        .next()
        .ok_or_else(|| Error::Parse("no TaskRun or PipelineRun found in the output".into()))
}
