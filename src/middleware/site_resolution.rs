//! Site resolution middleware
//!
//! Binds each request to the site serving its host and attaches the
//! site-scoped collaborators (view context, storage namespace) plus the
//! cross-site URL defaults.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use metrics::counter;
use tracing::debug;

use super::request_host;
use crate::events::SiteFound;
use crate::registry::SiteContext;
use crate::server::AppState;
use crate::storage::StorageNamespace;
use crate::view::ViewContext;

pub async fn site_resolution_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let already_bound = request
        .extensions()
        .get::<SiteContext>()
        .is_some_and(SiteContext::is_bound);

    if !already_bound {
        let host = request_host(&request);
        let ctx = state.registry.bind(host.as_deref());

        match ctx.current().ok().flatten() {
            Some(site) => {
                debug!(site = site.name(), host = host.as_deref(), "Resolved site");
                counter!("nexus_site_resolved_total", "site" => site.name().to_string())
                    .increment(1);

                state.events.publish(SiteFound {
                    site: site.clone(),
                    host: host.clone().unwrap_or_default(),
                });

                request
                    .extensions_mut()
                    .insert(ViewContext::for_site(site.clone()));
                request
                    .extensions_mut()
                    .insert(StorageNamespace::new(site.name()));
            }
            None => {
                debug!(host = host.as_deref(), "No site serves this host");
                counter!("nexus_site_unresolved_total").increment(1);
            }
        }

        request.extensions_mut().insert(ctx);
    }

    request
        .extensions_mut()
        .insert(state.registry.url_defaults().clone());

    next.run(request).await
}
