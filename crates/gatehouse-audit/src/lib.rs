//! Gatehouse Audit
//!
//! Append-only decision log. Every access decision becomes one flat entry
//! carrying a SHA-256 digest over its decision fields; bulk operations
//! become one aggregate entry. Hashing is pure and independent of the
//! backing store.

pub mod entry;
pub mod error;
pub mod hash;
pub mod recorder;
pub mod store;

pub use entry::{AuditEntry, AuditQuery, AuditStatistics, DecisionEvent, DEFAULT_QUERY_LIMIT};
pub use error::{AuditError, AuditResult};
pub use hash::{canonical_string, compute_entry_hash, digest, HashedFields};
pub use recorder::AuditRecorder;
pub use store::{AuditStore, ClearPermit, InMemoryAuditStore, TracingAuditStore};
