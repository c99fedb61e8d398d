use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use gatehouse_audit::DEFAULT_QUERY_LIMIT;
use gatehouse_disclosure::GovernmentDomains;
use gatehouse_policy::CrossGovDepartments;

use crate::error::{RootError, RootResult};

/// Role mapping configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RolesConfig {
    /// Central / oversight departments whose members are elevated to
    /// cross-government roles.
    #[serde(default)]
    pub cross_gov_departments: CrossGovDepartments,
}

/// Profile disclosure configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisclosureConfig {
    /// Government-domain suffix allow-list.
    #[serde(default)]
    pub government_domains: GovernmentDomains,

    /// Bound on the single external identity-resolution attempt.
    #[serde(default = "default_resolve_timeout_ms")]
    pub resolve_timeout_ms: u64,
}

fn default_resolve_timeout_ms() -> u64 {
    3000
}

impl Default for DisclosureConfig {
    fn default() -> Self {
        Self {
            government_domains: GovernmentDomains::default(),
            resolve_timeout_ms: default_resolve_timeout_ms(),
        }
    }
}

/// Audit log configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditConfig {
    /// Query limit used when a caller gives none.
    #[serde(default = "default_query_limit")]
    pub default_query_limit: usize,

    /// JSON-lines file that CLI runs append their entries to and that the
    /// `audit` subcommands read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,

    /// Enables the audit-log clear operation. Never read from or written to
    /// a file; only test code sets it.
    #[serde(skip)]
    pub test_mode: bool,
}

fn default_query_limit() -> usize {
    DEFAULT_QUERY_LIMIT
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            default_query_limit: default_query_limit(),
            log_path: None,
            test_mode: false,
        }
    }
}

/// Top-level configuration, loaded from TOML (typically
/// `~/.gatehouse/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatehouseConfig {
    #[serde(default)]
    pub roles: RolesConfig,

    #[serde(default)]
    pub disclosure: DisclosureConfig,

    #[serde(default)]
    pub audit: AuditConfig,
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl GatehouseConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        let config: GatehouseConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RootError::Io)?;
        }
        std::fs::write(path, contents).map_err(RootError::Io)?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RootResult<()> {
        if self.roles.cross_gov_departments.is_empty() {
            return Err(RootError::Config(
                "roles.cross_gov_departments must not be empty".into(),
            ));
        }
        if self
            .roles
            .cross_gov_departments
            .iter()
            .any(|d| d.as_str().trim().is_empty())
        {
            return Err(RootError::Config(
                "roles.cross_gov_departments contains an empty department".into(),
            ));
        }
        if self.disclosure.government_domains.suffixes().is_empty() {
            return Err(RootError::Config(
                "disclosure.government_domains must not be empty".into(),
            ));
        }
        if let Some(bad) = self
            .disclosure
            .government_domains
            .suffixes()
            .iter()
            .find(|s| !s.contains('.'))
        {
            return Err(RootError::Config(format!(
                "disclosure.government_domains: '{}' is not a domain suffix",
                bad
            )));
        }
        if self.disclosure.resolve_timeout_ms == 0 {
            return Err(RootError::Config(
                "disclosure.resolve_timeout_ms must be > 0".into(),
            ));
        }
        if self.audit.default_query_limit == 0 {
            return Err(RootError::Config(
                "audit.default_query_limit must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn resolve_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.disclosure.resolve_timeout_ms)
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".gatehouse/config.toml")
    }
}
