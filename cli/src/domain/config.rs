//! Provisioning configuration schema and validation.
//!
//! Pure functions only: no I/O, no async, no filesystem access. Path
//! expansion happens in `infra::config`.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use outpost_common::{InstanceKey, key::validate_segment};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::port::{DEFAULT_BASE_PORT, MIN_BASE_PORT};

// ── Constants ────────────────────────────────────────────────────────────────

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_IMAGE: &str = "mongo:7.0";
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_READINESS_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_STATE_DIR: &str = ".outpost";

static USER_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_-]{0,31}$").ok());
static HOST_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9.-]{0,252}[A-Za-z0-9])?$").ok());
static IMAGE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._/:-]*(@sha256:[a-f0-9]{64})?$").ok());

// ── Config schema ────────────────────────────────────────────────────────────

/// Configuration stored in `outpost.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionConfig {
    pub project: String,
    pub environment: String,
    /// Hostname or IP address of the managed host.
    pub host: String,
    /// Remote login user.
    pub user: String,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    /// Private key used for authentication.
    pub identity_file: PathBuf,
    /// First port tried by the allocator.
    #[serde(default = "default_base_port")]
    pub base_port: u32,
    /// Database image, e.g. `mongo:7.0`.
    #[serde(default = "default_image")]
    pub image: String,
    /// Address the container port is published on.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_readiness_timeout_secs")]
    pub readiness_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Directory holding the local state file and lock files.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_base_port() -> u32 {
    DEFAULT_BASE_PORT
}

fn default_image() -> String {
    DEFAULT_IMAGE.to_string()
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

fn default_readiness_timeout_secs() -> u64 {
    DEFAULT_READINESS_TIMEOUT_SECS
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_DIR)
}

impl ProvisionConfig {
    /// Composite key of the instance this configuration targets.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Key`] if either segment is invalid.
    pub fn key(&self) -> Result<InstanceKey, ConfigError> {
        Ok(InstanceKey::new(&self.project, &self.environment)?)
    }

    #[must_use]
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validate every field.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_segment("project", &self.project)?;
        validate_segment("environment", &self.environment)?;

        if !matches_re(&HOST_RE, &self.host) {
            return Err(invalid("host", format!("'{}' is not a valid hostname or address", self.host)));
        }
        if !matches_re(&USER_RE, &self.user) {
            return Err(invalid("user", format!("'{}' is not a valid login name", self.user)));
        }
        if self.ssh_port == 0 {
            return Err(invalid("ssh_port", "must be between 1 and 65535".to_string()));
        }
        if self.identity_file.as_os_str().is_empty() {
            return Err(invalid("identity_file", "must not be empty".to_string()));
        }
        if !(MIN_BASE_PORT..=u32::from(u16::MAX)).contains(&self.base_port) {
            return Err(invalid("base_port", format!("{} is outside 1024-65535", self.base_port)));
        }
        if !matches_re(&IMAGE_RE, &self.image) {
            return Err(invalid("image", format!("'{}' is not a valid image reference", self.image)));
        }
        if self.bind_address.parse::<IpAddr>().is_err() {
            return Err(invalid(
                "bind_address",
                format!("'{}' is not an IP address", self.bind_address),
            ));
        }
        if self.readiness_timeout_secs == 0 {
            return Err(invalid("readiness_timeout_secs", "must be greater than zero".to_string()));
        }
        if self.connect_timeout_secs == 0 {
            return Err(invalid("connect_timeout_secs", "must be greater than zero".to_string()));
        }
        Ok(())
    }
}

fn matches_re(re: &LazyLock<Option<Regex>>, value: &str) -> bool {
    re.as_ref().is_some_and(|r| r.is_match(value))
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const MINIMAL: &str = "\
project: app
environment: dev
host: db1.example.com
user: deploy
identity_file: ~/.ssh/id_ed25519
";

    fn minimal() -> ProvisionConfig {
        serde_yaml::from_str(MINIMAL).expect("parse")
    }

    #[test]
    fn test_defaults_applied() {
        let c = minimal();
        assert_eq!(c.ssh_port, 22);
        assert_eq!(c.base_port, 27018);
        assert_eq!(c.image, "mongo:7.0");
        assert_eq!(c.bind_address, "127.0.0.1");
        assert_eq!(c.readiness_timeout(), Duration::from_secs(30));
        assert_eq!(c.connect_timeout(), Duration::from_secs(10));
        assert_eq!(c.state_dir, PathBuf::from(".outpost"));
        c.validate().expect("valid");
    }

    #[test]
    fn test_key_from_segments() {
        assert_eq!(minimal().key().expect("key").to_string(), "app/dev");
    }

    #[test]
    fn test_rejects_bad_project() {
        let mut c = minimal();
        c.project = "my app".into();
        assert!(matches!(c.validate(), Err(ConfigError::Key(_))));
    }

    #[test]
    fn test_rejects_bad_host() {
        let mut c = minimal();
        c.host = "db1;rm -rf".into();
        assert!(matches!(
            c.validate(),
            Err(ConfigError::Invalid { field: "host", .. })
        ));
    }

    #[test]
    fn test_rejects_bad_user() {
        let mut c = minimal();
        c.user = "Root User".into();
        assert!(matches!(
            c.validate(),
            Err(ConfigError::Invalid { field: "user", .. })
        ));
    }

    #[test]
    fn test_rejects_base_port_below_range() {
        let mut c = minimal();
        c.base_port = 80;
        assert!(matches!(
            c.validate(),
            Err(ConfigError::Invalid {
                field: "base_port",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_image_with_whitespace() {
        let mut c = minimal();
        c.image = "mongo 7".into();
        assert!(matches!(
            c.validate(),
            Err(ConfigError::Invalid { field: "image", .. })
        ));
    }

    #[test]
    fn test_accepts_registry_image() {
        let mut c = minimal();
        c.image = "registry.example.com:5000/db/mongo:7.0.4".into();
        c.validate().expect("valid");
        c.image = "-mongo".into();
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_bind_address() {
        let mut c = minimal();
        c.bind_address = "localhost".into();
        assert!(matches!(
            c.validate(),
            Err(ConfigError::Invalid {
                field: "bind_address",
                ..
            })
        ));
    }

    #[test]
    fn test_missing_required_field_fails_to_parse() {
        let yaml = "project: app\nenvironment: dev\nhost: db1\n";
        assert!(serde_yaml::from_str::<ProvisionConfig>(yaml).is_err());
    }
}
