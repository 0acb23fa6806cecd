use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use ctk_core::conditions::SUCCEEDED;
use ctk_core::ExecutionMode;
use ctk_direct::{DirectStrategy, PullSecret, WaitMethod};
use ctk_exec::CommandRunner;
use ctk_managed::{ManagedSettings, ManagedStrategy};
use ctk_strategy::{RunStrategy, WaitSpec};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const CONFIG_ENV: &str = "CTK_CONFIG";

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub wait: WaitConfig,
    #[serde(default)]
    pub direct: DirectConfig,
    #[serde(default)]
    pub managed: ManagedConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WaitConfig {
    /// humantime duration, e.g. "10m".
    pub timeout: String,
    pub condition: String,
    /// Upper bound for any single CLI call.
    pub command_timeout: String,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self { timeout: "10m".to_string(), condition: SUCCEEDED.to_string(), command_timeout: "5m".to_string() }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct DirectConfig {
    #[serde(default)]
    pub kubeconfig: Option<String>,
    #[serde(default)]
    pub wait_method: WaitMethod,
    #[serde(default)]
    pub pull_secret: Option<PullSecretConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PullSecretConfig {
    pub name: String,
    pub docker_config: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ManagedConfig {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub registry: Option<String>,
    #[serde(default)]
    pub service_account: Option<String>,
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
}

fn default_name_prefix() -> String {
    "ctk-".to_string()
}

fn default_poll_interval() -> String {
    "5s".to_string()
}

impl Default for ManagedConfig {
    fn default() -> Self {
        Self {
            project: None,
            region: None,
            registry: None,
            service_account: None,
            name_prefix: default_name_prefix(),
            poll_interval: default_poll_interval(),
        }
    }
}

/// Target of `ctk setup-cluster`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterConfig {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

/// Values from flags or the environment; each one that is set wins over the file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub mode: Option<ExecutionMode>,
    pub kubeconfig: Option<String>,
    pub timeout: Option<Duration>,
    pub condition: Option<String>,
}

fn duration(field: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value).with_context(|| format!("invalid duration for {field}: {value:?}"))
}

fn required<'a>(field: &str, value: &'a Option<String>) -> Result<&'a str> {
    value.as_deref().filter(|v| !v.is_empty()).ok_or_else(|| anyhow!("{field} is required in managed mode"))
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

impl Config {
    pub fn config_path(root: &Path) -> PathBuf {
        root.join(".ctk").join("ctk.toml")
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// `$CTK_CONFIG` if set, else `<root>/.ctk/ctk.toml`; defaults when neither exists.
    pub fn load(root: &Path) -> Result<Self> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(p) => expand(&p.to_string_lossy()),
            None => Self::config_path(root),
        };
        if path.exists() {
            debug!(path = %path.display(), "loading config");
            Self::load_from(&path)
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(mode) = overrides.mode {
            self.mode = mode;
        }
        if let Some(kubeconfig) = &overrides.kubeconfig {
            self.direct.kubeconfig = Some(kubeconfig.clone());
        }
        if let Some(timeout) = overrides.timeout {
            self.wait.timeout = humantime::format_duration(timeout).to_string();
        }
        if let Some(condition) = &overrides.condition {
            self.wait.condition = condition.clone();
        }
    }

    pub fn wait_spec(&self) -> Result<WaitSpec> {
        Ok(WaitSpec { timeout: duration("wait.timeout", &self.wait.timeout)?, condition: self.wait.condition.clone() })
    }

    pub fn command_timeout(&self) -> Result<Duration> {
        duration("wait.command_timeout", &self.wait.command_timeout)
    }

    pub fn kubeconfig(&self) -> Option<PathBuf> {
        self.direct.kubeconfig.as_deref().filter(|k| !k.is_empty()).map(expand)
    }

    pub fn managed_settings(&self) -> Result<ManagedSettings> {
        let m = &self.managed;
        Ok(ManagedSettings {
            project: required("managed.project", &m.project)?.to_string(),
            region: required("managed.region", &m.region)?.to_string(),
            registry: required("managed.registry", &m.registry)?.to_string(),
            service_account: required("managed.service_account", &m.service_account)?.to_string(),
            name_prefix: m.name_prefix.clone(),
            poll_interval: duration("managed.poll_interval", &m.poll_interval)?,
        })
    }

    /// The strategy for the configured mode; chosen once per process.
    pub fn strategy(&self, runner: Arc<dyn CommandRunner>) -> Result<Box<dyn RunStrategy>> {
        Ok(match self.mode {
            ExecutionMode::Direct => {
                let pull_secret = self
                    .direct
                    .pull_secret
                    .as_ref()
                    .map(|p| PullSecret { name: p.name.clone(), docker_config: expand(&p.docker_config) });
                Box::new(
                    DirectStrategy::new(runner)
                        .with_kubeconfig(self.kubeconfig())
                        .with_pull_secret(pull_secret)
                        .with_wait_method(self.direct.wait_method),
                )
            }
            ExecutionMode::Managed => Box::new(ManagedStrategy::new(runner, self.managed_settings()?)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctk_exec::ScriptedRunner;

    #[test]
    fn defaults_wait_ten_minutes_for_succeeded() {
        let cfg = Config::default();
        assert_eq!(cfg.mode, ExecutionMode::Direct);
        let wait = cfg.wait_spec().unwrap();
        assert_eq!(wait.timeout, Duration::from_secs(600));
        assert_eq!(wait.condition, "Succeeded");
        assert_eq!(cfg.managed.name_prefix, "ctk-");
    }

    #[test]
    fn partial_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = Config::config_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "mode = \"managed\"\n[managed]\nproject = \"p\"\nregion = \"r\"\nregistry = \"reg\"\nservice_account = \"sa\"\npoll_interval = \"2s\"\n",
        )
        .unwrap();

        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.mode, ExecutionMode::Managed);
        assert_eq!(cfg.managed_settings().unwrap().poll_interval, Duration::from_secs(2));
        assert_eq!(cfg.wait, WaitConfig::default());

        cfg.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn overrides_win() {
        let mut cfg = Config::default();
        cfg.apply(&Overrides {
            mode: Some(ExecutionMode::Managed),
            kubeconfig: Some("~/kc".into()),
            timeout: Some(Duration::from_secs(90)),
            condition: None,
        });
        assert_eq!(cfg.mode, ExecutionMode::Managed);
        assert_eq!(cfg.wait_spec().unwrap().timeout, Duration::from_secs(90));
        assert!(!cfg.kubeconfig().unwrap().to_string_lossy().starts_with('~'));
    }

    #[test]
    fn managed_mode_requires_project() {
        let cfg = Config { mode: ExecutionMode::Managed, ..Default::default() };
        let err = cfg.strategy(Arc::new(ScriptedRunner::new())).err().unwrap();
        assert!(err.to_string().contains("managed.project"));
    }

    #[test]
    fn bad_duration_names_the_field() {
        let mut cfg = Config::default();
        cfg.wait.timeout = "soon".into();
        assert!(cfg.wait_spec().unwrap_err().to_string().contains("wait.timeout"));
    }
}
