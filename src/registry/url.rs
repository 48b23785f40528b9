//! URL generation defaults for cross-site links

use axum::{extract::FromRequestParts, http::request::Parts};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use crate::domain::Site;

/// One default per enabled site: `prefix + site name` → canonical domain.
///
/// Attached to every request, so links to any site can be built whether or
/// not the current host resolved to a site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlDefaults {
    prefix: String,
    defaults: HashMap<String, String>,
}

impl UrlDefaults {
    pub fn for_sites(prefix: &str, sites: &[Arc<Site>]) -> Self {
        let defaults = sites
            .iter()
            .filter(|s| s.is_enabled())
            .filter_map(|s| {
                s.canonical_domain()
                    .map(|d| (format!("{prefix}{}", s.name()), d.to_string()))
            })
            .collect();
        Self {
            prefix: prefix.to_string(),
            defaults,
        }
    }

    /// Raw lookup by full parameter name
    pub fn get(&self, key: &str) -> Option<&str> {
        self.defaults.get(key).map(String::as_str)
    }

    pub fn domain_for(&self, site_name: &str) -> Option<&str> {
        self.get(&format!("{}{}", self.prefix, site_name))
    }

    /// Scheme-relative URL to `path` on the named site
    pub fn site_url(&self, site_name: &str, path: &str) -> Option<String> {
        let domain = self.domain_for(site_name)?;
        let path = path.trim_start_matches('/');
        Some(format!("//{domain}/{path}"))
    }

    pub fn len(&self) -> usize {
        self.defaults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty()
    }
}

impl<S> FromRequestParts<S> for UrlDefaults
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Arc<UrlDefaults>>()
            .map(|d| d.as_ref().clone())
            .unwrap_or_default())
    }
}
