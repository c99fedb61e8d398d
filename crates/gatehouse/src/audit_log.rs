use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use gatehouse_audit::{AuditQuery, AuditRecorder, AuditStore, InMemoryAuditStore};
use tracing::debug;

use crate::config::AuditConfig;
use crate::error::{RootError, RootResult};

/// Append every entry held by `recorder` to the JSON-lines file at `path`,
/// creating it and its parent directory if needed.
pub fn append_entries(recorder: &AuditRecorder, path: &Path) -> RootResult<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let written = recorder.export_jsonl(BufWriter::new(file))?;
    debug!(path = %path.display(), written, "audit entries appended");
    Ok(written)
}

/// Load a JSON-lines audit log into a read-only recorder.
pub fn load(path: &Path) -> RootResult<AuditRecorder> {
    let file = File::open(path).map_err(|e| {
        RootError::Config(format!("cannot open audit log {}: {}", path.display(), e))
    })?;
    let store = InMemoryAuditStore::from_jsonl(BufReader::new(file))?;
    debug!(path = %path.display(), entries = store.len()?, "audit log loaded");
    Ok(AuditRecorder::new(Arc::new(store)))
}

/// Query with the configured default limit unless `limit` overrides it.
pub fn query_for(config: &AuditConfig, limit: Option<usize>) -> AuditQuery {
    AuditQuery {
        limit: limit.unwrap_or(config.default_query_limit),
        ..AuditQuery::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_audit::DecisionEvent;
    use gatehouse_core::{
        Action, Decision, DepartmentId, Identity, IdentitySource, ResourceType, Role, Timestamp,
        UserId,
    };

    fn make_identity() -> Identity {
        Identity {
            user_id: UserId::new("rts-member"),
            name: "Member".into(),
            department_id: Some(DepartmentId::new("rts")),
            role: Role::DepartmentMember,
            source: IdentitySource::Session,
            is_government: true,
            is_cross_gov: false,
        }
    }

    fn log_one(recorder: &AuditRecorder, resource: &str, decision: Decision) {
        recorder
            .log_decision_at(
                &make_identity(),
                DecisionEvent::new(
                    Action::Read,
                    ResourceType::Agreement,
                    resource,
                    decision,
                    "test",
                ),
                Timestamp::from_seconds(1_700_000_000),
            )
            .unwrap();
    }

    #[test]
    fn test_append_across_runs_then_load() {
        let dir = std::env::temp_dir().join("gatehouse-test-audit-log");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("nested").join("audit.jsonl");

        let first = AuditRecorder::default();
        log_one(&first, "dsa-1", Decision::Allow);
        assert_eq!(append_entries(&first, &path).unwrap(), 1);

        let second = AuditRecorder::default();
        log_one(&second, "dsa-2", Decision::Deny);
        log_one(&second, "dsa-3", Decision::Allow);
        assert_eq!(append_entries(&second, &path).unwrap(), 2);

        let loaded = load(&path).unwrap();
        let entries = loaded.export_all().unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.resource_id.as_str()).collect();
        assert_eq!(ids, vec!["dsa-1", "dsa-2", "dsa-3"]);
        assert!(loaded.verify_all().unwrap().is_empty());
        assert!(!loaded.is_test_mode());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load(Path::new("/nonexistent/gatehouse/audit.jsonl")).unwrap_err();
        assert!(matches!(err, RootError::Config(_)));
    }

    #[test]
    fn test_query_uses_configured_default_limit() {
        let recorder = AuditRecorder::default();
        for id in ["dsa-1", "dsa-2", "dsa-3"] {
            log_one(&recorder, id, Decision::Allow);
        }
        let config = AuditConfig {
            default_query_limit: 2,
            ..AuditConfig::default()
        };

        let query = query_for(&config, None);
        assert_eq!(query.limit, 2);
        assert_eq!(recorder.query(&query).unwrap().len(), 2);

        let query = query_for(&config, Some(10));
        assert_eq!(recorder.query(&query).unwrap().len(), 3);
    }
}
