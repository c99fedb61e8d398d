use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{DisclosureError, DisclosureErrorDetail, DisclosureResult};
use crate::resolver::{
    handle_domain, GovernmentDomains, IdentityRegistry, ProfileDocumentResolver, ResolveOptions,
};
use crate::types::{
    AccessEvaluation, AccessLevel, OwnerAttributes, ProfileVisibility, RequesterIdentity,
    ResolvedRequester, Resolution,
};

pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_millis(3000);

/// Decides which profile fields a requester may see.
///
/// Requester resolution tries the registry, then the external document
/// resolver, and on any failure falls back to a minimal identity derived
/// from the handle's domain. It never fails.
pub struct DisclosureEvaluator {
    visibility: ProfileVisibility,
    government_domains: GovernmentDomains,
    registry: Option<Arc<dyn IdentityRegistry>>,
    resolver: Option<Arc<dyn ProfileDocumentResolver>>,
    resolve_timeout: Duration,
}

impl Default for DisclosureEvaluator {
    fn default() -> Self {
        Self {
            visibility: ProfileVisibility::default(),
            government_domains: GovernmentDomains::default(),
            registry: None,
            resolver: None,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for DisclosureEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisclosureEvaluator")
            .field("visibility", &self.visibility)
            .field("government_domains", &self.government_domains)
            .field("has_registry", &self.registry.is_some())
            .field("has_resolver", &self.resolver.is_some())
            .field("resolve_timeout", &self.resolve_timeout)
            .finish()
    }
}

impl DisclosureEvaluator {
    pub fn new(government_domains: GovernmentDomains) -> Self {
        Self {
            government_domains,
            ..Self::default()
        }
    }

    pub fn with_visibility(mut self, visibility: ProfileVisibility) -> DisclosureResult<Self> {
        validate_visibility(&visibility)?;
        self.visibility = visibility;
        Ok(self)
    }

    pub fn with_registry(mut self, registry: Arc<dyn IdentityRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ProfileDocumentResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    pub fn visibility(&self) -> &ProfileVisibility {
        &self.visibility
    }

    pub fn government_domains(&self) -> &GovernmentDomains {
        &self.government_domains
    }

    /// Team is checked before department: same team implies same
    /// department but must win.
    pub fn determine_access_level(
        &self,
        requester: &RequesterIdentity,
        owner: &OwnerAttributes,
    ) -> AccessLevel {
        if let (Some(mine), Some(theirs)) = (&requester.team_id, &owner.team_id) {
            if mine == theirs {
                return AccessLevel::SameTeam;
            }
        }
        if let (Some(mine), Some(theirs)) = (&requester.department_id, &owner.department_id) {
            if mine == theirs {
                return AccessLevel::SameDepartment;
            }
        }
        if requester.is_government {
            return AccessLevel::Government;
        }
        match requester.resolution {
            Resolution::Registry | Resolution::Document | Resolution::DegradedGovernmentDomain => {
                AccessLevel::Authenticated
            }
            Resolution::Degraded | Resolution::Anonymous => AccessLevel::Public,
        }
    }

    /// Resolve a requester handle. Registry first, then the document
    /// resolver with cache bypass and a single attempt.
    ///
    /// The resolver receives the timeout in [`ResolveOptions::timeout`] and
    /// must enforce it itself; this call cannot interrupt a resolver that
    /// ignores it. A result that arrives after the timeout is discarded and
    /// the requester degrades as if the lookup had failed.
    pub fn fetch_requester_identity(&self, handle: &str) -> RequesterIdentity {
        let handle = handle.trim();
        if handle.is_empty() {
            return RequesterIdentity::anonymous();
        }
        let domain = handle_domain(handle);

        match self.lookup_registry(handle) {
            Ok(Some(found)) => {
                debug!(handle, "requester found in registry");
                return self.resolved(handle, domain, found, Resolution::Registry);
            }
            Ok(None) => {}
            Err(err) => warn!(handle, error = %err, "identity registry lookup failed"),
        }

        match self.resolve_document(handle) {
            Ok(Some(found)) => {
                debug!(handle, "requester resolved from profile document");
                self.resolved(handle, domain, found, Resolution::Document)
            }
            Ok(None) => self.degraded(handle, domain),
            Err(err) => {
                warn!(handle, error = %err, "requester resolution failed, degrading");
                self.degraded(handle, domain)
            }
        }
    }

    fn lookup_registry(&self, handle: &str) -> DisclosureResult<Option<ResolvedRequester>> {
        match &self.registry {
            Some(registry) => registry.lookup(handle),
            None => Ok(None),
        }
    }

    fn resolve_document(&self, handle: &str) -> DisclosureResult<Option<ResolvedRequester>> {
        let resolver = match &self.resolver {
            Some(r) => r,
            None => return Ok(None),
        };
        let start = Instant::now();
        let result = resolver.resolve(handle, ResolveOptions::fresh(self.resolve_timeout))?;
        let elapsed = start.elapsed();
        if elapsed > self.resolve_timeout {
            return Err(DisclosureErrorDetail::from(DisclosureError::Timeout(
                self.resolve_timeout.as_millis() as u64,
            ))
            .with_handle(handle));
        }
        Ok(Some(result))
    }

    fn resolved(
        &self,
        handle: &str,
        domain: Option<String>,
        found: ResolvedRequester,
        resolution: Resolution,
    ) -> RequesterIdentity {
        let on_government_domain = domain
            .as_deref()
            .map(|d| self.government_domains.matches(d))
            .unwrap_or(false);
        RequesterIdentity {
            handle: Some(handle.to_string()),
            name: found.name,
            domain,
            is_government: found.is_government || on_government_domain,
            department_id: found.department_id,
            team_id: found.team_id,
            resolution,
        }
    }

    fn degraded(&self, handle: &str, domain: Option<String>) -> RequesterIdentity {
        let on_government_domain = domain
            .as_deref()
            .map(|d| self.government_domains.matches(d))
            .unwrap_or(false);
        RequesterIdentity {
            handle: Some(handle.to_string()),
            name: None,
            domain,
            department_id: None,
            team_id: None,
            is_government: false,
            resolution: if on_government_domain {
                Resolution::DegradedGovernmentDomain
            } else {
                Resolution::Degraded
            },
        }
    }

    pub fn get_visible_fields(&self, level: AccessLevel) -> std::collections::BTreeSet<String> {
        self.visibility.visible_fields(level)
    }

    pub fn get_all_fields(&self) -> std::collections::BTreeSet<String> {
        self.visibility.all_fields()
    }

    /// Evaluate a requester presented by handle. `None` is an anonymous
    /// request.
    pub fn evaluate(&self, handle: Option<&str>, owner: &OwnerAttributes) -> AccessEvaluation {
        let requester = match handle {
            Some(h) => self.fetch_requester_identity(h),
            None => RequesterIdentity::anonymous(),
        };
        self.evaluate_requester(requester, owner)
    }

    /// Evaluate an already-resolved requester.
    pub fn evaluate_requester(
        &self,
        requester: RequesterIdentity,
        owner: &OwnerAttributes,
    ) -> AccessEvaluation {
        let access_level = self.determine_access_level(&requester, owner);
        let reason = access_reason(access_level, requester.resolution).to_string();
        debug!(level = %access_level, resolution = ?requester.resolution, "disclosure evaluated");
        AccessEvaluation {
            visible_fields: self.visibility.visible_fields(access_level),
            hidden_fields: self.visibility.hidden_fields(access_level),
            requester,
            access_level,
            reason,
        }
    }
}

fn access_reason(level: AccessLevel, resolution: Resolution) -> &'static str {
    match (level, resolution) {
        (AccessLevel::SameTeam, _) => "Requester is on the same team as the profile owner",
        (AccessLevel::SameDepartment, _) => {
            "Requester is in the same department as the profile owner"
        }
        (AccessLevel::Government, _) => "Requester is a verified government employee",
        (AccessLevel::Authenticated, Resolution::DegradedGovernmentDomain) => {
            "Requester domain is a government domain but identity could not be verified"
        }
        (AccessLevel::Authenticated, _) => "Requester has a verified identity",
        (AccessLevel::Public, Resolution::Anonymous) => "Anonymous requester",
        (AccessLevel::Public, _) => "Could not verify requester identity",
    }
}

/// Project a profile onto the visible field names. Keys absent from the
/// profile are not invented.
pub fn filter_profile_by_access(
    profile: &Map<String, Value>,
    visible_fields: &std::collections::BTreeSet<String>,
) -> Map<String, Value> {
    profile
        .iter()
        .filter(|(k, _)| visible_fields.contains(k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn validate_visibility(visibility: &ProfileVisibility) -> DisclosureResult<()> {
    let sets = [
        ("public", &visibility.public),
        ("government", &visibility.government),
        ("sameDepartment", &visibility.same_department),
        ("sameTeam", &visibility.same_team),
    ];
    for (i, (name, set)) in sets.iter().enumerate() {
        if set.iter().any(|f| f.trim().is_empty()) {
            return Err(DisclosureErrorDetail::new(
                DisclosureError::InvalidVisibility(format!("{}: empty field name", name)),
                "field names must not be empty",
            ));
        }
        for (other_name, other) in sets.iter().skip(i + 1) {
            if let Some(dup) = set.intersection(other).next() {
                return Err(DisclosureErrorDetail::new(
                    DisclosureError::InvalidVisibility(format!(
                        "field '{}' listed under both {} and {}",
                        dup, name, other_name
                    )),
                    "each field belongs to exactly one level",
                ));
            }
        }
    }
    Ok(())
}
