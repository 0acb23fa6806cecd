use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ctk_core::ExecutionMode;
use ctk_exec::SystemRunner;
use ctk_runner::{doctor, setup_cluster, CatalogTest, Config, Overrides};

#[derive(Parser)]
#[command(name = "ctk", version, about = "Integration tests for Tekton catalog StepActions")]
struct Cli {
    /// Execution mode: direct (v1, kubectl) or managed (v2, Cloud Build)
    #[arg(long, global = true, env = "CTK_MODE")]
    mode: Option<ExecutionMode>,

    /// Kubeconfig passed to every kubectl call
    #[arg(long, global = true, env = "CTK_KUBECONFIG")]
    kubeconfig: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the CLIs the selected mode needs are on PATH
    Doctor,

    /// Point gcloud at the test project and fetch cluster credentials
    SetupCluster {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        cluster: Option<String>,
        #[arg(long)]
        region: Option<String>,
    },

    /// Run the tests of one or more StepAction directories
    Run {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
        /// How long to wait for each run, e.g. "10m"
        #[arg(long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,
        /// Condition that must become true for a run to pass
        #[arg(long)]
        condition: Option<String>,
        /// Fixed name suffix instead of a random one
        #[arg(long)]
        suffix: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let root = std::env::current_dir()?;
    let mut cfg = Config::load(&root)?;
    let mut overrides = Overrides { mode: cli.mode, kubeconfig: cli.kubeconfig, ..Default::default() };
    if let Command::Run { timeout, condition, .. } = &cli.cmd {
        overrides.timeout = *timeout;
        overrides.condition = condition.clone();
    }
    cfg.apply(&overrides);

    let runner = Arc::new(SystemRunner::new(cfg.command_timeout()?));

    match cli.cmd {
        Command::Doctor => {
            for status in doctor(runner.as_ref(), cfg.mode)? {
                println!("{:<8} {}", status.tool, status.version.unwrap_or_default());
            }
            println!("OK ({} mode)", cfg.mode);
        }
        Command::SetupCluster { project, cluster, region } => {
            let mut target = cfg.cluster.clone();
            target.project = project.or(target.project);
            target.name = cluster.or(target.name);
            target.region = region.or(target.region);
            setup_cluster(runner.as_ref(), &target, cfg.kubeconfig().as_deref())?;
            println!("Cluster credentials ready");
        }
        Command::Run { dirs, suffix, .. } => {
            let strategy = cfg.strategy(runner.clone())?;
            let wait = cfg.wait_spec()?;
            let mut total = 0;
            let mut failed = 0;
            for dir in dirs {
                let mut test = CatalogTest::new(strategy.as_ref(), runner.as_ref(), wait.clone());
                if let Some(suffix) = &suffix {
                    test = test.with_suffix(suffix.clone());
                }
                let report = test.run(&dir).with_context(|| format!("run tests in {}", dir.display()))?;
                println!("{} ({})", report.step_action, dir.display());
                for case in &report.cases {
                    println!("  {case}");
                    if let (false, Some(logs)) = (case.passed(), &case.logs) {
                        for line in logs.lines() {
                            println!("      | {line}");
                        }
                    }
                }
                total += report.cases.len();
                failed += report.failed_count();
            }
            if failed > 0 {
                bail!("{failed} of {total} tests failed");
            }
            println!("{total} tests passed");
        }
    }

    Ok(())
}
