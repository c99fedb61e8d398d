use std::fmt;
use thiserror::Error;

/// Single error enum for the policy crate.
///
/// Access refusals are never errors: they are `Decision::Deny` values with a
/// reason. These variants cover structural problems only.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("invalid policy set: {0}")]
    InvalidPolicySet(String),

    #[error("invalid role matrix: {0}")]
    InvalidRoleMatrix(String),
}

/// Discriminator for PolicyError variants, used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyErrorKind {
    InvalidPolicySet,
    InvalidRoleMatrix,
}

impl PolicyError {
    pub fn kind(&self) -> PolicyErrorKind {
        match self {
            PolicyError::InvalidPolicySet(_) => PolicyErrorKind::InvalidPolicySet,
            PolicyError::InvalidRoleMatrix(_) => PolicyErrorKind::InvalidRoleMatrix,
        }
    }
}

impl fmt::Display for PolicyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyErrorKind::InvalidPolicySet => write!(f, "InvalidPolicySet"),
            PolicyErrorKind::InvalidRoleMatrix => write!(f, "InvalidRoleMatrix"),
        }
    }
}

pub type PolicyResult<T> = Result<T, PolicyError>;
