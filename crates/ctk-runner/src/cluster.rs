use std::path::Path;

use anyhow::{anyhow, Context, Result};
use ctk_exec::{CommandRunner, CommandSpec};
use tracing::info;

use crate::config::ClusterConfig;

/// Points gcloud at the project and writes cluster credentials, into `kubeconfig` when given.
pub fn setup_cluster(runner: &dyn CommandRunner, cluster: &ClusterConfig, kubeconfig: Option<&Path>) -> Result<()> {
    let project = cluster.project.as_deref().ok_or_else(|| anyhow!("cluster.project is required"))?;
    let name = cluster.name.as_deref().ok_or_else(|| anyhow!("cluster.name is required"))?;
    let region = cluster.region.as_deref().ok_or_else(|| anyhow!("cluster.region is required"))?;

    runner
        .run_checked(&CommandSpec::new("gcloud").args(["config", "set", "project", project]))
        .context("failed to set project ID in gcloud config")?;

    let mut cmd = CommandSpec::new("gcloud").args(["container", "clusters", "get-credentials", name, "--region", region]);
    if let Some(path) = kubeconfig {
        cmd = cmd.env("KUBECONFIG", path.display().to_string());
    }
    runner.run_checked(&cmd).with_context(|| format!("failed to get credentials for cluster {name}"))?;
    info!(project, cluster = name, region, "cluster credentials configured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctk_exec::{Reply, ScriptedRunner};

    fn cluster() -> ClusterConfig {
        ClusterConfig { project: Some("ci".into()), name: Some("catalog".into()), region: Some("us-central1".into()) }
    }

    #[test]
    fn sets_project_then_fetches_credentials() {
        let runner = ScriptedRunner::new().on("gcloud", &[], Reply::ok(""));
        setup_cluster(&runner, &cluster(), Some(Path::new("/tmp/kc"))).unwrap();
        let calls = runner.calls();
        assert_eq!(calls[0].command_line(), "gcloud config set project ci");
        assert_eq!(calls[1].command_line(), "gcloud container clusters get-credentials catalog --region us-central1");
        assert_eq!(calls[1].env, vec![("KUBECONFIG".to_string(), "/tmp/kc".to_string())]);
    }

    #[test]
    fn failure_keeps_gcloud_output() {
        let runner = ScriptedRunner::new()
            .on("gcloud", &["config"], Reply::ok(""))
            .on("gcloud", &["get-credentials"], Reply::fail("ERROR: (gcloud.container.clusters.get-credentials) NOT_FOUND"));
        let err = setup_cluster(&runner, &cluster(), None).unwrap_err();
        assert!(format!("{err:#}").contains("NOT_FOUND"));
    }
}
