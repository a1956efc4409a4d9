//! Infrastructure implementation of the `ConfigStore` port.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::ConfigStore;
use crate::domain::config::ProvisionConfig;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "OUTPOST_CONFIG";
/// Looked up in the current directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "outpost.yaml";

/// Production implementation of `ConfigStore` that reads a YAML file.
#[derive(Debug, Clone, Default)]
pub struct YamlConfigStore {
    explicit: Option<PathBuf>,
    environment: Option<String>,
}

impl YamlConfigStore {
    /// `explicit` is the `--config` flag; `environment` is the `--env` override.
    #[must_use]
    pub fn new(explicit: Option<PathBuf>, environment: Option<String>) -> Self {
        Self {
            explicit,
            environment,
        }
    }
}

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> Result<ProvisionConfig> {
        let path = self.path()?;
        if !path.exists() {
            anyhow::bail!(
                "no configuration found at {}; create it or pass --config <path>",
                path.display()
            );
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let mut config: ProvisionConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("cannot parse {}", path.display()))?;

        if let Some(env) = &self.environment {
            config.environment.clone_from(env);
        }
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.identity_file = resolve_against(base, &expand_home(&config.identity_file));
        config.state_dir = resolve_against(base, &expand_home(&config.state_dir));

        config
            .validate()
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    fn path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.explicit {
            return Ok(path.clone());
        }
        if let Ok(val) = std::env::var(CONFIG_ENV)
            && !val.is_empty()
        {
            return Ok(PathBuf::from(val));
        }
        let cwd = std::env::current_dir().context("cannot determine current directory")?;
        Ok(cwd.join(DEFAULT_CONFIG_FILE))
    }
}

/// Replace a leading `~` with the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest)),
        Err(_) => path.to_path_buf(),
    }
}

fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
