use thiserror::Error;

/// Structural failures of the audit log. Integrity mismatches are not
/// errors; they are reported by `verify_integrity` / `verify_all`.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("export failed: {0}")]
    Export(String),
}

impl From<serde_json::Error> for AuditError {
    fn from(e: serde_json::Error) -> Self {
        AuditError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for AuditError {
    fn from(e: std::io::Error) -> Self {
        AuditError::Export(e.to_string())
    }
}

pub type AuditResult<T> = Result<T, AuditError>;
