//! Per-request view context
//!
//! Template engines receive this explicitly instead of reading a global
//! shared bag. The resolved site sits under [`SITE_VIEW_KEY`].

use axum::{extract::FromRequestParts, http::request::Parts};
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::sync::Arc;

use crate::domain::{Site, SiteSummary};

pub const SITE_VIEW_KEY: &str = "__nexus_site";

#[derive(Debug, Clone, Default)]
pub struct ViewContext {
    site: Option<Arc<Site>>,
}

impl ViewContext {
    pub fn for_site(site: Arc<Site>) -> Self {
        Self { site: Some(site) }
    }

    pub fn site(&self) -> Option<&Arc<Site>> {
        self.site.as_ref()
    }

    /// Template variables, ready to merge with handler-supplied data
    pub fn to_value(&self) -> Value {
        let mut vars = Map::new();
        if let Some(site) = &self.site {
            let summary = SiteSummary::from(site.as_ref());
            vars.insert(
                SITE_VIEW_KEY.to_string(),
                serde_json::to_value(summary).unwrap_or(Value::Null),
            );
        }
        Value::Object(vars)
    }
}

impl<S> FromRequestParts<S> for ViewContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<ViewContext>()
            .cloned()
            .unwrap_or_default())
    }
}
