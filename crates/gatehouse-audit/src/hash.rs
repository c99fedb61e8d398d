//! Pure integrity hashing for audit entries.
//!
//! The digest covers the decision fields only (timestamp, subject, action,
//! target, decision, reason) joined into a `|`-delimited canonical string.
//! It detects after-the-fact edits to a stored entry. It is not a
//! signature and does not authenticate the writer.

use sha2::{Digest, Sha256};

use crate::entry::AuditEntry;

/// The hashed subset of an entry, borrowed.
#[derive(Debug, Clone, Copy)]
pub struct HashedFields<'a> {
    pub timestamp: &'a str,
    pub user_id: &'a str,
    pub role: &'a str,
    pub action: &'a str,
    pub resource_type: &'a str,
    pub resource_id: &'a str,
    pub decision: &'a str,
    pub reason: &'a str,
}

fn escape_into(out: &mut String, field: &str) {
    for c in field.chars() {
        if c == '|' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Canonical form. Delimiters inside a field are escaped so that no two
/// distinct field tuples share a canonical string.
pub fn canonical_string(fields: &HashedFields<'_>) -> String {
    let parts = [
        fields.timestamp,
        fields.user_id,
        fields.role,
        fields.action,
        fields.resource_type,
        fields.resource_id,
        fields.decision,
        fields.reason,
    ];
    let mut out = String::with_capacity(parts.iter().map(|p| p.len() + 1).sum());
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push('|');
        }
        escape_into(&mut out, part);
    }
    out
}

/// Hex-encoded SHA-256 of the canonical string.
pub fn digest(fields: &HashedFields<'_>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_string(fields).as_bytes());
    hex::encode(hasher.finalize())
}

/// Digest recomputed from an entry's own fields.
pub fn compute_entry_hash(entry: &AuditEntry) -> String {
    let timestamp = entry.timestamp.to_rfc3339();
    digest(&HashedFields {
        timestamp: &timestamp,
        user_id: entry.user_id.as_str(),
        role: entry.role.as_str(),
        action: entry.action.as_str(),
        resource_type: entry.resource_type.as_str(),
        resource_id: &entry.resource_id,
        decision: entry.decision.as_str(),
        reason: &entry.reason,
    })
}
