//! Request-scoped site binding and its extractors

use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

use crate::domain::Site;
use crate::error::{AppError, StateError};

/// The site a request resolved to. Lives in the request extensions.
#[derive(Debug, Clone, Default)]
pub enum SiteContext {
    /// Resolution middleware has not run for this request
    #[default]
    Unbound,
    /// Resolved; `None` when the host matched no site
    Bound(Option<Arc<Site>>),
}

impl SiteContext {
    pub fn is_bound(&self) -> bool {
        matches!(self, SiteContext::Bound(_))
    }

    pub fn current(&self) -> Result<Option<&Arc<Site>>, StateError> {
        match self {
            SiteContext::Unbound => Err(StateError::Unbound),
            SiteContext::Bound(site) => Ok(site.as_ref()),
        }
    }

    pub(crate) fn from_parts(parts: &Parts) -> SiteContext {
        parts
            .extensions
            .get::<SiteContext>()
            .cloned()
            .unwrap_or_default()
    }
}

/// Extracts the resolved site; 404 when the host matched nothing.
#[derive(Debug, Clone)]
pub struct CurrentSite(pub Arc<Site>);

impl<S> FromRequestParts<S> for CurrentSite
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = SiteContext::from_parts(parts);
        match ctx.current()? {
            Some(site) => Ok(CurrentSite(site.clone())),
            None => Err(AppError::NotFound("No site serves this host".to_string())),
        }
    }
}

/// Extracts the resolved site, if any.
#[derive(Debug, Clone)]
pub struct MaybeSite(pub Option<Arc<Site>>);

impl<S> FromRequestParts<S> for MaybeSite
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = SiteContext::from_parts(parts);
        Ok(MaybeSite(ctx.current()?.cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use std::collections::HashMap;

    fn site() -> Arc<Site> {
        Arc::new(Site::new("foo", "Foo", vec![], HashMap::new(), vec![]))
    }

    #[test]
    fn test_unbound_current_fails() {
        let ctx = SiteContext::default();
        assert!(!ctx.is_bound());
        assert_eq!(ctx.current().unwrap_err(), StateError::Unbound);
    }

    #[test]
    fn test_bound_without_site() {
        let ctx = SiteContext::Bound(None);
        assert!(ctx.is_bound());
        assert!(ctx.current().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_current_site_extractor() {
        let request = Request::builder()
            .extension(SiteContext::Bound(Some(site())))
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let CurrentSite(found) = CurrentSite::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(found.name(), "foo");
    }

    #[tokio::test]
    async fn test_current_site_extractor_rejects_unbound() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();

        let result = CurrentSite::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::State(StateError::Unbound))));
    }

    #[tokio::test]
    async fn test_current_site_extractor_rejects_unknown_host() {
        let (mut parts, _) = Request::builder()
            .extension(SiteContext::Bound(None))
            .body(())
            .unwrap()
            .into_parts();

        let result = CurrentSite::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_maybe_site_extractor() {
        let (mut parts, _) = Request::builder()
            .extension(SiteContext::Bound(None))
            .body(())
            .unwrap()
            .into_parts();

        let MaybeSite(found) = MaybeSite::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
