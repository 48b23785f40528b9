//! Common test utilities
//!
//! Builds the production router against the static repository and the
//! in-memory session store. No external services are needed.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, Response},
    response::Html,
    routing::get,
    Json, Router,
};
use nexus_sites::config::SitesConfig;
use nexus_sites::crypto::EncryptionKey;
use nexus_sites::registry::{MaybeSite, SiteRegistry, UrlDefaults};
use nexus_sites::repository::StaticSiteRepository;
use nexus_sites::routes::{pages, RegistrarCatalog, RouteTable};
use nexus_sites::server::{build_router, AppState};
use nexus_sites::session::InMemorySessionStore;
use nexus_sites::storage::StorageNamespace;
use nexus_sites::domain::{Site, SiteRecord};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const MAIN_DOMAIN: &str = "accounts.example.com";

const CATALOGUE: &str = r#"
main_domain = "accounts.example.com"

[[sites]]
name = "accounts"
title = "Accounts"
routes = ["pages"]

[[sites]]
name = "foo"
title = "Foo"
routes = ["pages", "snippets"]

[sites.extra_params.theme]
required = true

[[sites]]
name = "bar"
title = "Bar"
routes = ["pages"]

[[sites]]
name = "archive"
title = "Archive"
routes = ["pages"]
"#;

pub fn test_key() -> EncryptionKey {
    EncryptionKey::new([42u8; 32])
}

pub fn sites_config() -> SitesConfig {
    SitesConfig::from_toml(CATALOGUE).unwrap()
}

pub fn repository() -> StaticSiteRepository {
    StaticSiteRepository::default()
        .with_site("accounts", vec![SiteRecord::new(MAIN_DOMAIN, true)])
        .with_site(
            "foo",
            vec![
                SiteRecord::new("foo.example.com", true).with_extra("theme", json!("dark")),
                SiteRecord::new("www.foo.example.com", true),
            ],
        )
        .with_site("bar", vec![SiteRecord::new("bar.example.com", true)])
        .with_site(
            "archive",
            vec![SiteRecord::new("archive.example.com", false)],
        )
}

/// `GET /{site}/snippet` answers JSON whose payload contains `</body>`.
fn snippets(site: &Site, router: Router<AppState>) -> Router<AppState> {
    router.route(
        &format!("/{}/snippet", site.name()),
        get(|| async { Json(json!({ "html": "<p>hello</p></body>" })) }),
    )
}

pub fn catalog() -> RegistrarCatalog {
    RegistrarCatalog::new()
        .register(pages::ID, pages::register)
        .register("snippets", snippets)
}

async fn request_context(
    MaybeSite(site): MaybeSite,
    storage: StorageNamespace,
    urls: UrlDefaults,
) -> Json<Value> {
    Json(json!({
        "site": site.map(|s| s.name().to_string()),
        "storage": storage.as_str(),
        "bar": urls.site_url("bar", "/bar/home"),
    }))
}

pub fn route_table() -> RouteTable {
    RouteTable::new()
        .main(Router::new().route(
            "/",
            get(|| async { Html("<html><body><h1>central</h1></body></html>") }),
        ))
        .resources(Router::new().route(
            "/assets/app.css",
            get(|| async { ([(header::CONTENT_TYPE, "text/css")], "body{}") }),
        ))
        .global(Router::new().route("/_context", get(request_context)))
}

pub struct TestApp {
    pub state: AppState,
    pub sessions: Arc<InMemorySessionStore>,
    pub router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        let config = sites_config();
        let registry = SiteRegistry::load(&config, &repository(), &catalog())
            .await
            .unwrap();
        let sessions = Arc::new(InMemorySessionStore::new());
        let state = AppState::new(registry, config, test_key(), sessions.clone());
        let router = build_router(state.clone(), route_table());
        Self {
            state,
            sessions,
            router,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, host: &str, path: &str) -> Response<Body> {
        self.send(request(Method::GET, host, path).body(Body::empty()).unwrap())
            .await
    }
}

pub fn request(method: Method, host: &str, path: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(path)
        .header(header::HOST, host)
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Session id from the `Set-Cookie` header of a response.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.strip_prefix("nexus_session="))
        .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
}

/// Every `s_code` token found in beacon markup, in order.
pub fn beacon_tokens(html: &str) -> Vec<(String, String)> {
    html.match_indices("<img src=\"//")
        .map(|(at, prefix)| {
            let rest = &html[at + prefix.len()..];
            let domain = rest.split('/').next().unwrap().to_string();
            let start = rest.find("s_code=").unwrap() + "s_code=".len();
            let end = start + rest[start..].find('"').unwrap();
            (domain, rest[start..end].to_string())
        })
        .collect()
}
