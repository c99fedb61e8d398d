use std::io::BufRead;
use std::sync::RwLock;

use tracing::info;

use crate::entry::AuditEntry;
use crate::error::{AuditError, AuditResult};

/// Append-only storage for audit entries.
///
/// Appends from concurrent requests must never be lost or interleaved.
/// Reads take a snapshot and must not block appends for longer than the
/// copy. Deletion requires a [`ClearPermit`], which only a test-mode
/// `AuditRecorder` can issue.
pub trait AuditStore: Send + Sync {
    fn append(&self, entry: AuditEntry) -> AuditResult<()>;
    fn snapshot(&self) -> AuditResult<Vec<AuditEntry>>;
    fn len(&self) -> AuditResult<usize>;
    /// Remove every entry, returning how many were removed.
    fn truncate(&self, permit: ClearPermit) -> AuditResult<usize>;
}

/// Proof that a test-mode recorder authorised a clear. Cannot be built
/// outside this crate, so holders of a shared store cannot delete entries:
///
/// ```compile_fail
/// use gatehouse_audit::{AuditStore, ClearPermit, InMemoryAuditStore};
///
/// let store = InMemoryAuditStore::new();
/// store.truncate(ClearPermit::issue()).unwrap();
/// ```
#[derive(Debug)]
pub struct ClearPermit {
    _private: (),
}

impl ClearPermit {
    pub(crate) fn issue() -> Self {
        Self { _private: () }
    }
}

// ---------------------------------------------------------------------------
// InMemoryAuditStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with previously exported entries, in order.
    pub fn from_entries(entries: Vec<AuditEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Load a JSON-lines export. Blank lines are skipped.
    pub fn from_jsonl<R: BufRead>(reader: R) -> AuditResult<Self> {
        let mut entries = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditEntry = serde_json::from_str(&line).map_err(|e| {
                AuditError::Serialization(format!("line {}: {}", n + 1, e))
            })?;
            entries.push(entry);
        }
        Ok(Self::from_entries(entries))
    }
}

impl AuditStore for InMemoryAuditStore {
    fn append(&self, entry: AuditEntry) -> AuditResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| AuditError::Store(format!("audit lock poisoned: {}", e)))?;
        entries.push(entry);
        Ok(())
    }

    fn snapshot(&self) -> AuditResult<Vec<AuditEntry>> {
        self.entries
            .read()
            .map(|e| e.clone())
            .map_err(|e| AuditError::Store(format!("audit lock poisoned: {}", e)))
    }

    fn len(&self) -> AuditResult<usize> {
        self.entries
            .read()
            .map(|e| e.len())
            .map_err(|e| AuditError::Store(format!("audit lock poisoned: {}", e)))
    }

    fn truncate(&self, _permit: ClearPermit) -> AuditResult<usize> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| AuditError::Store(format!("audit lock poisoned: {}", e)))?;
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// TracingAuditStore: forwards every append to the log pipeline
// ---------------------------------------------------------------------------

/// Decorator that emits each appended entry as a structured event on the
/// `gatehouse::audit` target before handing it to the inner store.
#[derive(Debug, Default)]
pub struct TracingAuditStore<S> {
    inner: S,
}

impl<S: AuditStore> TracingAuditStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: AuditStore> AuditStore for TracingAuditStore<S> {
    fn append(&self, entry: AuditEntry) -> AuditResult<()> {
        info!(
            target: "gatehouse::audit",
            id = %entry.id,
            timestamp = %entry.timestamp,
            user = %entry.user_id,
            role = %entry.role,
            action = %entry.action,
            resource_type = %entry.resource_type,
            resource_id = %entry.resource_id,
            decision = %entry.decision,
            reason = %entry.reason,
            hash = %entry.integrity_hash,
            "access decision"
        );
        self.inner.append(entry)
    }

    fn snapshot(&self) -> AuditResult<Vec<AuditEntry>> {
        self.inner.snapshot()
    }

    fn len(&self) -> AuditResult<usize> {
        self.inner.len()
    }

    fn truncate(&self, permit: ClearPermit) -> AuditResult<usize> {
        self.inner.truncate(permit)
    }
}
