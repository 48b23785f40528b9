//! Route composition across sites
//!
//! Every site gets its own `Router`, built from:
//! - the routes its registrars add,
//! - the shared resource group (static assets, the SSO receiver), so each
//!   site serves those paths without a per-site prefix,
//! - the global group as a fallback, which answers `404` marked with
//!   [`UnmatchedRoute`] when nothing matched.
//!
//! The main domain gets the central routes, falling back to the router of the
//! site hosting it. [`HostDispatch`] picks the router for each request.

pub mod pages;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::map_response,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Router,
};
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Service, ServiceExt};

use crate::api;
use crate::domain::Site;
use crate::middleware::request_host;
use crate::registry::SiteContext;
use crate::server::AppState;

/// Adds a site's routes to its router.
///
/// Implemented for any `Fn(&Site, Router<AppState>) -> Router<AppState>`.
pub trait RouteRegistrar: Send + Sync {
    fn register(&self, site: &Site, router: Router<AppState>) -> Router<AppState>;
}

impl<F> RouteRegistrar for F
where
    F: Fn(&Site, Router<AppState>) -> Router<AppState> + Send + Sync,
{
    fn register(&self, site: &Site, router: Router<AppState>) -> Router<AppState> {
        self(site, router)
    }
}

/// Registrars available to the catalogue, by identifier
#[derive(Default, Clone)]
pub struct RegistrarCatalog {
    registrars: HashMap<String, Arc<dyn RouteRegistrar>>,
}

impl RegistrarCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, id: impl Into<String>, registrar: impl RouteRegistrar + 'static) -> Self {
        self.registrars.insert(id.into(), Arc::new(registrar));
        self
    }

    pub fn resolve(&self, id: &str) -> Option<Arc<dyn RouteRegistrar>> {
        self.registrars.get(id).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.registrars.keys().map(String::as_str)
    }
}

/// Responses from resource routes carry this marker; the session bridge
/// does not record them as the previous URL.
#[derive(Debug, Clone, Copy)]
pub struct ResourceRoute;

/// Marker on the 404 answered when no route of any group matched.
#[derive(Debug, Clone, Copy)]
pub struct UnmatchedRoute;

async fn unmatched() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Extension(UnmatchedRoute))
}

/// Application-supplied route groups
#[derive(Default)]
pub struct RouteTable {
    main: Router<AppState>,
    resources: Router<AppState>,
    global: Router<AppState>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Central routes, served on the main domain only
    pub fn main(mut self, routes: Router<AppState>) -> Self {
        self.main = self.main.merge(routes);
        self
    }

    /// Resource routes, mounted on every site
    pub fn resources(mut self, routes: Router<AppState>) -> Self {
        self.resources = self.resources.merge(routes);
        self
    }

    /// Routes answered for any host when nothing more specific matches
    pub fn global(mut self, routes: Router<AppState>) -> Self {
        self.global = self.global.merge(routes);
        self
    }
}

async fn mark_resource(mut response: Response) -> Response {
    response.extensions_mut().insert(ResourceRoute);
    response
}

/// Tag a router as a resource group.
pub fn resource_group(routes: Router<AppState>) -> Router<AppState> {
    routes.layer(map_response(mark_resource))
}

/// Build the per-host routers for every site in the registry.
pub fn compose(state: &AppState, table: RouteTable) -> HostDispatch {
    let global: Router = table.global.fallback(unmatched).with_state(state.clone());

    let resources = resource_group(
        table
            .resources
            .route(&state.sites.sso.endpoint, get(api::sso::receive)),
    );

    let mut sites = HashMap::with_capacity(state.registry.all().len());
    for site in state.registry.all() {
        let routes = site
            .registrars()
            .iter()
            .fold(Router::new(), |router, registrar| {
                registrar.register(site, router)
            });
        let router: Router = routes
            .merge(resources.clone())
            .fallback_service(global.clone())
            .with_state(state.clone());
        sites.insert(site.name().to_string(), router);
    }

    let main_fallback = state
        .registry
        .main_site()
        .and_then(|s| sites.get(s.name()))
        .cloned()
        .unwrap_or_else(|| global.clone());
    let main: Router = table
        .main
        .fallback_service(main_fallback)
        .with_state(state.clone());

    HostDispatch {
        main_domain: state.registry.main_domain().to_string(),
        main,
        sites: Arc::new(sites),
        global,
    }
}

/// Routes each request to the router of its host.
#[derive(Clone)]
pub struct HostDispatch {
    main_domain: String,
    main: Router,
    sites: Arc<HashMap<String, Router>>,
    global: Router,
}

impl HostDispatch {
    fn select(&self, request: &Request<Body>) -> Router {
        if request_host(request).as_deref() == Some(self.main_domain.as_str()) {
            return self.main.clone();
        }

        let bound = request
            .extensions()
            .get::<SiteContext>()
            .and_then(|ctx| ctx.current().ok().flatten());

        bound
            .and_then(|site| self.sites.get(site.name()))
            .unwrap_or(&self.global)
            .clone()
    }
}

impl Service<Request<Body>> for HostDispatch {
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let router = self.select(&request);
        Box::pin(async move { router.oneshot(request).await })
    }
}
