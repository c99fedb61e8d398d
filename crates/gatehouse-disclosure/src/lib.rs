//! Gatehouse Disclosure
//!
//! Graduated disclosure of personal profiles. A requester's trust level
//! relative to the profile owner (public < authenticated < government <
//! same-department < same-team) selects a cumulative set of visible fields.
//!
//! Requester resolution never fails: lookups that error or time out
//! degrade to the least-privileged identity the handle supports.

pub mod error;
pub mod evaluator;
pub mod resolver;
pub mod types;

pub use error::{DisclosureError, DisclosureErrorDetail, DisclosureResult};
pub use evaluator::{filter_profile_by_access, DisclosureEvaluator, DEFAULT_RESOLVE_TIMEOUT};
pub use resolver::{
    handle_domain, GovernmentDomains, IdentityRegistry, ProfileDocumentResolver, RegistryEntry,
    ResolveOptions, StaticIdentityRegistry,
};
pub use types::*;
