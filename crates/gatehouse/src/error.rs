use thiserror::Error;

/// Error type for the gatehouse root crate, aggregating errors from the
/// subsystem crates.
///
/// Access refusals never appear here; they are DENY decisions.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("core error: {0}")]
    Core(#[from] gatehouse_core::CoreError),

    #[error("policy error: {0}")]
    Policy(#[from] gatehouse_policy::PolicyError),

    #[error("disclosure error: {0}")]
    Disclosure(#[from] gatehouse_disclosure::DisclosureErrorDetail),

    #[error("audit error: {0}")]
    Audit(#[from] gatehouse_audit::AuditError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RootError {
    fn from(e: serde_json::Error) -> Self {
        RootError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;
