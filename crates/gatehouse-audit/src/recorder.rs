use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::sync::Arc;

use gatehouse_core::{Action, AuditContext, Decision, Identity, ResourceType, Timestamp};
use tracing::{debug, warn};

use crate::entry::{AuditEntry, AuditQuery, AuditStatistics, DecisionEvent};
use crate::error::AuditResult;
use crate::hash::compute_entry_hash;
use crate::store::{AuditStore, ClearPermit, InMemoryAuditStore};

/// Append-only, integrity-hashed decision log.
///
/// Every entry carries a digest over its decision fields, computed once at
/// creation. Entries are never mutated or deleted; the only removal path is
/// `clear`, which does nothing unless the recorder was built in test mode.
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
    test_mode: bool,
}

impl Default for AuditRecorder {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryAuditStore::new()))
    }
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder")
            .field("test_mode", &self.test_mode)
            .finish_non_exhaustive()
    }
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            test_mode: false,
        }
    }

    /// Enable the test-only `clear` operation.
    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    pub fn is_test_mode(&self) -> bool {
        self.test_mode
    }

    pub fn log_decision(&self, identity: &Identity, event: DecisionEvent) -> AuditResult<AuditEntry> {
        self.log_decision_at(identity, event, Timestamp::now())
    }

    pub fn log_decision_at(
        &self,
        identity: &Identity,
        event: DecisionEvent,
        now: Timestamp,
    ) -> AuditResult<AuditEntry> {
        let mut entry = AuditEntry {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now,
            user_id: identity.user_id.clone(),
            user_name: identity.name.clone(),
            role: identity.role,
            department_id: identity.department_id.clone(),
            action: event.action,
            resource_type: event.resource_type,
            resource_id: event.resource_id,
            decision: event.decision,
            reason: event.reason,
            policies_evaluated: event.policies_evaluated,
            ip_address: event.context.ip_address,
            user_agent: event.context.user_agent,
            request_id: event.context.request_id,
            integrity_hash: String::new(),
        };
        entry.integrity_hash = compute_entry_hash(&entry);

        self.store.append(entry.clone())?;
        debug!(
            id = %entry.id,
            user = %entry.user_id,
            decision = %entry.decision,
            resource_type = %entry.resource_type,
            "audit entry appended"
        );
        Ok(entry)
    }

    /// One aggregate entry for a bulk operation. ALLOW when at least one
    /// item was allowed.
    pub fn log_batch_decision(
        &self,
        identity: &Identity,
        action: Action,
        resource_type: ResourceType,
        allowed: usize,
        denied: usize,
        context: AuditContext,
    ) -> AuditResult<AuditEntry> {
        self.log_batch_decision_at(
            identity,
            action,
            resource_type,
            allowed,
            denied,
            context,
            Timestamp::now(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn log_batch_decision_at(
        &self,
        identity: &Identity,
        action: Action,
        resource_type: ResourceType,
        allowed: usize,
        denied: usize,
        context: AuditContext,
        now: Timestamp,
    ) -> AuditResult<AuditEntry> {
        let total = allowed + denied;
        let decision = if allowed > 0 {
            Decision::Allow
        } else {
            Decision::Deny
        };
        let event = DecisionEvent::new(
            action,
            resource_type,
            format!("batch:{}", total),
            decision,
            format!("Batch {}: {} allowed, {} denied", action, allowed, denied),
        )
        .with_context(context);
        self.log_decision_at(identity, event, now)
    }

    /// Recompute the digest from the entry's own fields.
    pub fn verify_integrity(&self, entry: &AuditEntry) -> bool {
        compute_entry_hash(entry) == entry.integrity_hash
    }

    /// Ids of stored entries whose digest no longer matches.
    pub fn verify_all(&self) -> AuditResult<Vec<String>> {
        let mismatched: Vec<String> = self
            .store
            .snapshot()?
            .into_iter()
            .filter(|e| !self.verify_integrity(e))
            .map(|e| e.id)
            .collect();
        if !mismatched.is_empty() {
            warn!(count = mismatched.len(), "audit entries failed integrity check");
        }
        Ok(mismatched)
    }

    /// Matching entries, newest first, truncated to `query.limit`.
    pub fn query(&self, query: &AuditQuery) -> AuditResult<Vec<AuditEntry>> {
        let mut entries: Vec<AuditEntry> = self
            .store
            .snapshot()?
            .into_iter()
            .filter(|e| query.matches(e))
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(query.limit);
        Ok(entries)
    }

    /// Aggregates over `[since, until]`; open bounds are unbounded.
    pub fn statistics(
        &self,
        since: Option<Timestamp>,
        until: Option<Timestamp>,
    ) -> AuditResult<AuditStatistics> {
        let mut stats = AuditStatistics::default();
        let mut users = HashSet::new();
        let mut by_resource_type = BTreeMap::new();
        let mut by_role = BTreeMap::new();

        for entry in self.store.snapshot()? {
            if since.map(|s| entry.timestamp < s).unwrap_or(false) {
                continue;
            }
            if until.map(|u| entry.timestamp > u).unwrap_or(false) {
                continue;
            }
            stats.total += 1;
            match entry.decision {
                Decision::Allow => stats.allowed += 1,
                Decision::Deny => stats.denied += 1,
            }
            *by_resource_type.entry(entry.resource_type).or_insert(0) += 1;
            *by_role.entry(entry.role).or_insert(0) += 1;
            users.insert(entry.user_id);
        }

        stats.by_resource_type = by_resource_type;
        stats.by_role = by_role;
        stats.unique_users = users.len();
        Ok(stats)
    }

    /// Every entry in append order.
    pub fn export_all(&self) -> AuditResult<Vec<AuditEntry>> {
        self.store.snapshot()
    }

    /// Write every entry as one JSON object per line. Returns the number of
    /// lines written.
    pub fn export_jsonl<W: Write>(&self, mut writer: W) -> AuditResult<usize> {
        let entries = self.store.snapshot()?;
        for entry in &entries {
            serde_json::to_writer(&mut writer, entry)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(entries.len())
    }

    pub fn len(&self) -> AuditResult<usize> {
        self.store.len()
    }

    pub fn is_empty(&self) -> AuditResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Remove every entry. Outside test mode this logs a warning and
    /// removes nothing. Returns the number of entries removed.
    pub fn clear(&self) -> AuditResult<usize> {
        if !self.test_mode {
            warn!("refusing to clear the audit log outside test mode");
            return Ok(0);
        }
        let removed = self.store.truncate(ClearPermit::issue())?;
        debug!(removed, "audit log cleared");
        Ok(removed)
    }
}
