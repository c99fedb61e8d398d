use thiserror::Error;

/// Errors raised while parsing the shared vocabulary from external strings.
///
/// These never represent access decisions. A caller holding an unknown role
/// string gets a DENY from the role gate, not one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("unknown agreement status: {0}")]
    UnknownStatus(String),

    #[error("unknown decision: {0}")]
    UnknownDecision(String),

    #[error("unknown identity source: {0}")]
    UnknownSource(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_display() {
        let err = CoreError::UnknownRole("wizard".into());
        assert_eq!(err.to_string(), "unknown role: wizard");
    }

    #[test]
    fn test_core_error_variants_have_messages() {
        let errors = vec![
            CoreError::UnknownRole("a".into()),
            CoreError::UnknownAction("b".into()),
            CoreError::UnknownResourceType("c".into()),
            CoreError::UnknownStatus("d".into()),
            CoreError::UnknownSource("e".into()),
            CoreError::InvalidTimestamp("f".into()),
        ];
        for err in errors {
            assert!(!err.to_string().is_empty());
        }
    }
}
