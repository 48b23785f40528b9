//! Tenant-scoped storage namespace

use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

/// Root under which the current request's files are kept. Defaults to
/// `shared` when the host resolved to no site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageNamespace(String);

impl StorageNamespace {
    pub const SHARED: &'static str = "shared";

    pub fn new(namespace: impl Into<String>) -> Self {
        Self(namespace.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespaced key for a relative path, e.g. `blog/uploads/a.png`
    pub fn key(&self, relative: &str) -> String {
        format!("{}/{}", self.0, relative.trim_start_matches('/'))
    }
}

impl Default for StorageNamespace {
    fn default() -> Self {
        Self(Self::SHARED.to_string())
    }
}

impl<S> FromRequestParts<S> for StorageNamespace
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<StorageNamespace>()
            .cloned()
            .unwrap_or_default())
    }
}
