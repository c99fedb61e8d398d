//! Gatehouse Core
//!
//! Shared vocabulary for the access-control and audit engine: canonical
//! identities and roles, actions, resource types, the governed-resource
//! attribute bag and the two-way decision type.

pub mod error;
pub mod resource;
pub mod types;

pub use error::*;
pub use resource::*;
pub use types::*;
