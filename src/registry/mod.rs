//! Site registry
//!
//! Loaded once at boot from the catalogue and the site repository, then shared
//! read-only across requests. The site a request resolves to is not stored
//! here; it travels with the request as a [`SiteContext`].

pub mod context;
pub mod url;

pub use context::{CurrentSite, MaybeSite, SiteContext};
pub use url::UrlDefaults;

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{SiteDefinition, SitesConfig};
use crate::domain::{DomainParams, Site, SiteDomain, SiteRecord};
use crate::error::{ConfigurationError, Result};
use crate::repository::SiteRepository;
use crate::routes::RegistrarCatalog;

#[derive(Debug)]
pub struct SiteRegistry {
    sites: Vec<Arc<Site>>,
    main_domain: String,
    url_defaults: Arc<UrlDefaults>,
}

impl SiteRegistry {
    /// Build every declared site from its backing records.
    ///
    /// Sites keep declaration order. Fails on the first site whose required
    /// extra parameter or route registrar cannot be satisfied, and when two
    /// enabled sites claim the same domain.
    pub async fn load(
        config: &SitesConfig,
        repository: &dyn SiteRepository,
        catalog: &RegistrarCatalog,
    ) -> Result<Self> {
        let mut sites = Vec::with_capacity(config.sites.len());
        for definition in &config.sites {
            let records = repository.find_by_slug(&definition.name).await?;
            let site = build_site(definition, &records, catalog)?;
            debug!(
                site = site.name(),
                domains = records.len(),
                enabled = site.is_enabled(),
                "Loaded site"
            );
            sites.push(Arc::new(site));
        }

        let registry = Self::from_sites(sites, &config.main_domain, &config.url.default_prefix)?;
        info!(
            sites = registry.sites.len(),
            enabled = registry.enabled_sites().count(),
            "Site registry loaded"
        );
        Ok(registry)
    }

    /// Assemble a registry from already-built sites.
    pub fn from_sites(
        sites: Vec<Arc<Site>>,
        main_domain: &str,
        url_prefix: &str,
    ) -> std::result::Result<Self, ConfigurationError> {
        validate_unique_domains(&sites)?;
        let url_defaults = Arc::new(UrlDefaults::for_sites(url_prefix, &sites));
        Ok(Self {
            sites,
            main_domain: main_domain.to_ascii_lowercase(),
            url_defaults,
        })
    }

    /// First site in registry order serving `host`, disabled sites included.
    pub fn by_domain(&self, host: &str) -> Option<&Arc<Site>> {
        self.sites.iter().find(|s| s.has_domain(host))
    }

    pub fn by_slug(&self, name: &str) -> Option<&Arc<Site>> {
        self.sites.iter().find(|s| s.name() == name)
    }

    pub fn by_id(&self, index: usize) -> Option<&Arc<Site>> {
        self.sites.get(index)
    }

    pub fn all(&self) -> &[Arc<Site>] {
        &self.sites
    }

    pub fn enabled_sites(&self) -> impl Iterator<Item = &Arc<Site>> {
        self.sites.iter().filter(|s| s.is_enabled())
    }

    pub fn main_domain(&self) -> &str {
        &self.main_domain
    }

    /// The site serving the main domain, if any site claims it
    pub fn main_site(&self) -> Option<&Arc<Site>> {
        self.by_domain(&self.main_domain)
    }

    /// Enabled sites other than the main-domain site and `current`, in registry order.
    pub fn siblings(&self, current: Option<&Arc<Site>>) -> Vec<&Arc<Site>> {
        let main = self.main_site();
        self.enabled_sites()
            .filter(|s| !main.is_some_and(|m| Arc::ptr_eq(m, s)))
            .filter(|s| !current.is_some_and(|c| Arc::ptr_eq(c, s)))
            .collect()
    }

    pub fn url_defaults(&self) -> &Arc<UrlDefaults> {
        &self.url_defaults
    }

    /// Resolve `host` into a request binding.
    pub fn bind(&self, host: Option<&str>) -> SiteContext {
        SiteContext::Bound(host.and_then(|h| self.by_domain(h)).cloned())
    }
}

fn build_site(
    definition: &SiteDefinition,
    records: &[SiteRecord],
    catalog: &RegistrarCatalog,
) -> std::result::Result<Site, ConfigurationError> {
    let mut domains = Vec::with_capacity(records.len());
    let mut domain_params: HashMap<String, DomainParams> = HashMap::new();

    for record in records {
        let host = record.domain().trim().to_ascii_lowercase();
        for key in definition.extra_params.keys() {
            if let Some(value) = record.extra_data(key) {
                domain_params
                    .entry(host.clone())
                    .or_default()
                    .insert(key.to_ascii_lowercase(), value.clone());
            }
        }
        domains.push(SiteDomain {
            host,
            enabled: record.is_enabled(),
        });
    }

    // A site with no records at all is simply disabled.
    if !records.is_empty() {
        for (param, spec) in &definition.extra_params {
            if spec.required && !records.iter().any(|r| r.extra_data(param).is_some()) {
                return Err(ConfigurationError::MissingRequiredParam {
                    site: definition.name.clone(),
                    param: param.clone(),
                });
            }
        }
    }

    let registrars = definition
        .routes
        .iter()
        .map(|id| {
            catalog
                .resolve(id)
                .ok_or_else(|| ConfigurationError::UnknownRegistrar {
                    site: definition.name.clone(),
                    registrar: id.clone(),
                })
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Site::new(
        definition.name.clone(),
        definition.title.clone(),
        domains,
        domain_params,
        registrars,
    ))
}

fn validate_unique_domains(sites: &[Arc<Site>]) -> std::result::Result<(), ConfigurationError> {
    let mut owners: HashMap<String, &str> = HashMap::new();
    for site in sites.iter().filter(|s| s.is_enabled()) {
        for domain in site.domains() {
            let key = domain.to_ascii_lowercase();
            if let Some(first) = owners.get(&key) {
                if *first != site.name() {
                    return Err(ConfigurationError::DuplicateDomain {
                        domain: key,
                        first: first.to_string(),
                        second: site.name().to_string(),
                    });
                }
            } else {
                owners.insert(key, site.name());
            }
        }
    }
    Ok(())
}
