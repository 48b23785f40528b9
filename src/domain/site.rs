//! Site domain model

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::routes::RouteRegistrar;

/// Arbitrary per-domain parameters, keyed by parameter name
pub type DomainParams = HashMap<String, serde_json::Value>;

/// One backing record of a site: a domain and whether it is live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SiteRecord {
    pub domain: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    #[sqlx(json)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

impl SiteRecord {
    pub fn new(domain: impl Into<String>, enabled: bool) -> Self {
        Self {
            domain: domain.into(),
            enabled,
            extra: HashMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Extra value by name. Names match regardless of ASCII case, since the
    /// catalogue loader lowercases keys and database JSON keeps them as written.
    pub fn extra_data(&self, key: &str) -> Option<&serde_json::Value> {
        self.extra.get(key).or_else(|| {
            self.extra
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(key))
                .map(|(_, value)| value)
        })
    }
}

/// A hostname served by a site
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteDomain {
    pub host: String,
    pub enabled: bool,
}

/// A tenant. Built once by the registry and shared as `Arc<Site>` afterwards.
pub struct Site {
    name: String,
    title: String,
    domains: Vec<SiteDomain>,
    domain_params: HashMap<String, DomainParams>,
    registrars: Vec<Arc<dyn RouteRegistrar>>,
}

impl Site {
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        domains: Vec<SiteDomain>,
        domain_params: HashMap<String, DomainParams>,
        registrars: Vec<Arc<dyn RouteRegistrar>>,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            domains,
            domain_params,
            registrars,
        }
    }

    /// The site slug, unique within a registry
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Every domain in repository order, enabled or not
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(|d| d.host.as_str())
    }

    pub fn enabled_domains(&self) -> impl Iterator<Item = &str> {
        self.domains
            .iter()
            .filter(|d| d.enabled)
            .map(|d| d.host.as_str())
    }

    /// First enabled domain, or the first declared one for a disabled site
    pub fn canonical_domain(&self) -> Option<&str> {
        self.enabled_domains()
            .next()
            .or_else(|| self.domains().next())
    }

    /// A site is live when any of its backing records is enabled.
    pub fn is_enabled(&self) -> bool {
        self.domains.iter().any(|d| d.enabled)
    }

    pub fn has_domain(&self, host: &str) -> bool {
        self.domains
            .iter()
            .any(|d| d.host.eq_ignore_ascii_case(host))
    }

    pub fn domain_params(&self, host: &str) -> Option<&DomainParams> {
        self.domain_params.get(host)
    }

    /// Per-domain parameter; `key` is matched in lowercase.
    pub fn param(&self, host: &str, key: &str) -> Option<&serde_json::Value> {
        self.domain_params
            .get(host)
            .and_then(|p| p.get(&key.to_ascii_lowercase()))
    }

    pub fn registrars(&self) -> &[Arc<dyn RouteRegistrar>] {
        &self.registrars
    }
}

impl std::fmt::Debug for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Site")
            .field("name", &self.name)
            .field("title", &self.title)
            .field("domains", &self.domains)
            .field("registrars", &self.registrars.len())
            .finish()
    }
}

/// Serializable view of a site, for templates and diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct SiteSummary {
    pub name: String,
    pub title: String,
    pub domains: Vec<SiteDomain>,
    pub enabled: bool,
}

impl From<&Site> for SiteSummary {
    fn from(site: &Site) -> Self {
        Self {
            name: site.name.clone(),
            title: site.title.clone(),
            domains: site.domains.clone(),
            enabled: site.is_enabled(),
        }
    }
}
