//! Server initialization and routing

use crate::api;
use crate::config::{Config, SitesConfig};
use crate::crypto::EncryptionKey;
use crate::events::SiteEvents;
use crate::middleware::{
    session_bridge_middleware, site_resolution_middleware, SanitizedMakeSpan,
};
use crate::registry::SiteRegistry;
use crate::repository;
use crate::routes::{self, RegistrarCatalog, RouteTable};
use crate::session::{InMemorySessionStore, RedisSessionStore, SessionStore};
use anyhow::{Context, Result};
use axum::{middleware::from_fn_with_state, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SiteRegistry>,
    pub sites: Arc<SitesConfig>,
    pub encryption_key: EncryptionKey,
    pub sessions: Arc<dyn SessionStore>,
    pub events: SiteEvents,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        registry: SiteRegistry,
        sites: SitesConfig,
        encryption_key: EncryptionKey,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            sites: Arc::new(sites),
            encryption_key,
            sessions,
            events: SiteEvents::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }
}

/// Load the catalogue and build the registry from the configured repository.
pub async fn load_registry(
    config: &Config,
    catalog: &RegistrarCatalog,
) -> Result<(SitesConfig, SiteRegistry)> {
    let sites = SitesConfig::load(&config.sites_path)
        .with_context(|| format!("Failed to load site catalogue from {}", config.sites_path))?;
    let repository = repository::connect(&sites, config).await?;
    let registry = SiteRegistry::load(&sites, repository.as_ref(), catalog).await?;
    Ok((sites, registry))
}

pub async fn run(
    config: Config,
    catalog: RegistrarCatalog,
    table: RouteTable,
    metrics: Option<PrometheusHandle>,
) -> Result<()> {
    let (sites, registry) = load_registry(&config, &catalog).await?;

    let sessions = session_store(&config, &sites).await?;
    let encryption_key = match &config.encryption_key {
        Some(encoded) => {
            EncryptionKey::from_base64(encoded).context("Invalid NEXUS_ENCRYPTION_KEY")?
        }
        None => {
            warn!("NEXUS_ENCRYPTION_KEY not set, generated an ephemeral key; bridge tokens will not survive a restart");
            EncryptionKey::generate()
        }
    };

    let state = AppState::new(registry, sites, encryption_key, sessions).with_metrics(metrics);
    let app = build_router(state, table);

    let http_addr = config.http_addr();
    let listener = TcpListener::bind(&http_addr).await?;
    info!("HTTP server started on {}", http_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn session_store(config: &Config, sites: &SitesConfig) -> Result<Arc<dyn SessionStore>> {
    let ttl = Duration::from_secs(sites.session.ttl_secs);
    match &config.redis_url {
        Some(url) => {
            let store = RedisSessionStore::connect(url, ttl).await?;
            info!("Connected to Redis session store");
            Ok(Arc::new(store))
        }
        None => {
            info!("REDIS_URL not set, keeping sessions in memory");
            Ok(Arc::new(InMemorySessionStore::with_ttl(ttl)))
        }
    }
}

/// Build the HTTP router: health checks on every host, the site listing and
/// `/metrics` on the main domain, application routes dispatched by host.
pub fn build_router(state: AppState, table: RouteTable) -> Router {
    let mut central = Router::new().route("/_nexus/sites", get(api::health::sites));
    if state.metrics.is_some() {
        central = central.route("/metrics", get(api::metrics::metrics_handler));
    }

    let table = table
        .main(central)
        .global(routes::resource_group(
            Router::new()
                .route("/health", get(api::health::health))
                .route("/ready", get(api::health::ready)),
        ));

    let dispatch = routes::compose(&state, table);
    let make_span = SanitizedMakeSpan::new(&state.sites.sso.query_param);

    // Layers run bottom-up: resolution binds the site before the bridge reads it.
    Router::new()
        .fallback_service(dispatch)
        .layer(from_fn_with_state(state.clone(), session_bridge_middleware))
        .layer(from_fn_with_state(state, site_resolution_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_span))
}
