use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DisclosureError, DisclosureErrorDetail, DisclosureResult};
use crate::types::ResolvedRequester;

// ---------------------------------------------------------------------------
// Resolver hooks
// ---------------------------------------------------------------------------

/// Options passed to the external document resolver. Disclosure decisions
/// must see the current document, so the cache is always bypassed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub bypass_cache: bool,
    pub timeout: Duration,
}

impl ResolveOptions {
    pub fn fresh(timeout: Duration) -> Self {
        Self {
            bypass_cache: true,
            timeout,
        }
    }
}

/// Fast-path lookup of already-known requesters.
pub trait IdentityRegistry: Send + Sync {
    fn lookup(&self, handle: &str) -> DisclosureResult<Option<ResolvedRequester>>;
}

/// Resolves a requester from their external profile document. A single
/// attempt; implementations should honour `options.timeout`.
pub trait ProfileDocumentResolver: Send + Sync {
    fn resolve(&self, handle: &str, options: ResolveOptions) -> DisclosureResult<ResolvedRequester>;
}

// ---------------------------------------------------------------------------
// StaticIdentityRegistry
// ---------------------------------------------------------------------------

/// In-memory registry keyed by handle.
#[derive(Debug, Default)]
pub struct StaticIdentityRegistry {
    entries: RwLock<HashMap<String, ResolvedRequester>>,
}

/// One registry entry in its file form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub handle: String,
    #[serde(flatten)]
    pub requester: ResolvedRequester,
}

impl StaticIdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = RegistryEntry>) -> Self {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|e| (e.handle, e.requester))
                    .collect(),
            ),
        }
    }

    pub fn insert(&self, handle: impl Into<String>, requester: ResolvedRequester) -> DisclosureResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| DisclosureErrorDetail::from(DisclosureError::Internal))?;
        entries.insert(handle.into(), requester);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IdentityRegistry for StaticIdentityRegistry {
    fn lookup(&self, handle: &str) -> DisclosureResult<Option<ResolvedRequester>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| DisclosureErrorDetail::from(DisclosureError::Internal))?;
        Ok(entries.get(handle).cloned())
    }
}

// ---------------------------------------------------------------------------
// Government domains
// ---------------------------------------------------------------------------

/// Suffix allow-list of government domains. `gov.uk` matches `gov.uk`
/// itself and any subdomain such as `dso.gov.uk`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GovernmentDomains(Vec<String>);

impl GovernmentDomains {
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            suffixes
                .into_iter()
                .map(|s| s.into().trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    pub fn matches(&self, domain: &str) -> bool {
        let domain = domain.trim_end_matches('.').to_ascii_lowercase();
        self.0.iter().any(|suffix| {
            domain == *suffix
                || (domain.len() > suffix.len()
                    && domain.ends_with(suffix.as_str())
                    && domain.as_bytes()[domain.len() - suffix.len() - 1] == b'.')
        })
    }

    pub fn suffixes(&self) -> &[String] {
        &self.0
    }
}

impl Default for GovernmentDomains {
    fn default() -> Self {
        Self::new(["gov.uk", "gov.scot", "gov.wales"])
    }
}

/// Domain of an identity handle: the host of a URL handle (a WebID such as
/// `https://sam.pods.dso.gov.uk/profile/card#me`) or the part after `@`
/// of an address-style handle.
pub fn handle_domain(handle: &str) -> Option<String> {
    let handle = handle.trim();
    if let Ok(parsed) = url::Url::parse(handle) {
        if let Some(host) = parsed.host_str() {
            return Some(host.to_ascii_lowercase());
        }
    }
    let (_, domain) = handle.rsplit_once('@')?;
    let domain = domain.trim();
    if domain.is_empty() || domain.contains(['/', ' ', ':']) {
        return None;
    }
    Some(domain.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::DepartmentId;

    #[test]
    fn test_handle_domain_forms() {
        assert_eq!(
            handle_domain("https://sam.pods.dso.gov.uk/profile/card#me").as_deref(),
            Some("sam.pods.dso.gov.uk")
        );
        assert_eq!(handle_domain("sam@DSO.gov.uk").as_deref(), Some("dso.gov.uk"));
        assert_eq!(handle_domain("mailto:sam@dso.gov.uk").as_deref(), Some("dso.gov.uk"));
        assert_eq!(handle_domain("not a handle"), None);
        assert_eq!(handle_domain("sam@"), None);
    }

    #[test]
    fn test_government_domain_suffix_match() {
        let domains = GovernmentDomains::default();
        assert!(domains.matches("gov.uk"));
        assert!(domains.matches("dso.gov.uk"));
        assert!(domains.matches("pods.digital.gov.scot"));
        assert!(!domains.matches("notgov.uk"));
        assert!(!domains.matches("gov.uk.attacker.com"));
        assert!(!domains.matches("example.com"));
    }

    #[test]
    fn test_government_domains_normalised() {
        let domains = GovernmentDomains::new([" .GOV.UK ", ""]);
        assert_eq!(domains.suffixes(), &["gov.uk".to_string()]);
    }

    #[test]
    fn test_static_registry_lookup() {
        let registry = StaticIdentityRegistry::new();
        assert!(registry.is_empty());
        registry
            .insert(
                "sam@dso.gov.uk",
                ResolvedRequester {
                    name: Some("Sam".into()),
                    department_id: Some(DepartmentId::new("dso")),
                    team_id: None,
                    is_government: true,
                },
            )
            .unwrap();
        assert_eq!(registry.len(), 1);
        let found = registry.lookup("sam@dso.gov.uk").unwrap().unwrap();
        assert_eq!(found.name.as_deref(), Some("Sam"));
        assert!(registry.lookup("someone@else").unwrap().is_none());
    }

    #[test]
    fn test_registry_entries_from_json() {
        let json = r#"[{"handle":"a@dso.gov.uk","name":"A","departmentId":"dso","teamId":"granite-platform","isGovernment":true}]"#;
        let entries: Vec<RegistryEntry> = serde_json::from_str(json).unwrap();
        let registry = StaticIdentityRegistry::from_entries(entries);
        let found = registry.lookup("a@dso.gov.uk").unwrap().unwrap();
        assert_eq!(found.team_id.unwrap().as_str(), "granite-platform");
    }

    #[test]
    fn test_resolve_options_bypass_cache() {
        let opts = ResolveOptions::fresh(Duration::from_millis(50));
        assert!(opts.bypass_cache);
        assert_eq!(opts.timeout, Duration::from_millis(50));
    }
}
