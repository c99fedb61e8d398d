use std::fmt;
use thiserror::Error;

/// Failures of identity resolution. The evaluator consumes these and
/// degrades to a minimal identity; they never reach a caller of
/// `DisclosureEvaluator::evaluate`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisclosureError {
    #[error("profile document could not be fetched: {0}")]
    FetchFailed(String),

    #[error("profile document could not be parsed: {0}")]
    ParseFailed(String),

    #[error("identity resolution timed out after {0} ms")]
    Timeout(u64),

    #[error("invalid visibility configuration: {0}")]
    InvalidVisibility(String),

    #[error("internal error")]
    Internal,
}

/// Structured error carrying the handle that failed to resolve.
#[derive(Debug, Clone)]
pub struct DisclosureErrorDetail {
    pub kind: DisclosureError,
    pub message: String,
    pub handle: Option<String>,
}

impl fmt::Display for DisclosureErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ref handle) = self.handle {
            write!(f, " (handle: {})", handle)?;
        }
        Ok(())
    }
}

impl std::error::Error for DisclosureErrorDetail {}

impl DisclosureErrorDetail {
    pub fn new(kind: DisclosureError, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            handle: None,
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }
}

impl From<DisclosureError> for DisclosureErrorDetail {
    fn from(kind: DisclosureError) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            message,
            handle: None,
        }
    }
}

impl From<serde_json::Error> for DisclosureErrorDetail {
    fn from(err: serde_json::Error) -> Self {
        Self::new(DisclosureError::ParseFailed(err.to_string()), "malformed profile document")
    }
}

pub type DisclosureResult<T> = Result<T, DisclosureErrorDetail>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_display_includes_handle() {
        let detail = DisclosureErrorDetail::new(
            DisclosureError::FetchFailed("404".into()),
            "no such document",
        )
        .with_handle("https://pod.example/#me");
        assert_eq!(
            detail.to_string(),
            "profile document could not be fetched: 404 (handle: https://pod.example/#me)"
        );
        assert_eq!(detail.message, "no such document");
    }

    #[test]
    fn test_detail_from_kind() {
        let detail: DisclosureErrorDetail = DisclosureError::Timeout(3000).into();
        assert_eq!(detail.kind, DisclosureError::Timeout(3000));
        assert!(detail.message.contains("3000"));
        assert!(detail.handle.is_none());
    }

    #[test]
    fn test_detail_from_serde_json() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let detail: DisclosureErrorDetail = err.into();
        assert!(matches!(detail.kind, DisclosureError::ParseFailed(_)));
    }
}
