//! Cross-domain session bridge
//!
//! Inbound, the session id comes from the SSO query parameter when it carries
//! a valid sealed token, otherwise from the session cookie. A token that fails
//! to open is treated as absent. Outbound, HTML responses get one beacon per
//! sibling site so each sibling can adopt the same session.
//!
//! A fresh session that is still empty once the response is ready is neither
//! stored nor sent as a cookie.

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{
        header::{CONTENT_LENGTH, HOST},
        HeaderMap, Method, Request, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, error, warn};
use url::form_urlencoded;

use super::beacon::{is_html, render_beacons, splice_before_body_close};
use crate::config::{SameSitePolicy, SessionConfig};
use crate::crypto::decrypt;
use crate::domain::Site;
use crate::registry::SiteContext;
use crate::routes::{ResourceRoute, UnmatchedRoute};
use crate::server::AppState;
use crate::session::{Session, SessionHandle};

pub async fn session_bridge_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let sso_param = state.sites.sso.query_param.as_str();
    let cookie_name = state.sites.session.cookie.as_str();

    let bridged_id = query_value(request.uri().query(), sso_param).and_then(|token| {
        match decrypt(&state.encryption_key, &token) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "Rejected SSO token, continuing without it");
                counter!("nexus_sso_token_rejected_total").increment(1);
                None
            }
        }
    });
    let from_sso = bridged_id.is_some();
    let requested_id =
        bridged_id.or_else(|| jar.get(cookie_name).map(|c| c.value().to_string()));

    let (session, stored) = match requested_id {
        Some(id) => match state.sessions.load(&id).await {
            Ok(Some(session)) => {
                if from_sso {
                    debug!("Adopted bridged session");
                }
                (session, true)
            }
            Ok(None) => (Session::fresh(), false),
            Err(e) => return e.into_response(),
        },
        None => (Session::fresh(), false),
    };

    let handle = SessionHandle::new(session);
    request.extensions_mut().insert(handle.clone());

    let is_head = request.method() == Method::HEAD;
    let cross_site = request.uri().path() == state.sites.sso.endpoint;
    let navigation_url = is_navigation(request.method(), request.headers())
        .then(|| full_url(&request, sso_param));
    let current = request
        .extensions()
        .get::<SiteContext>()
        .and_then(|ctx| ctx.current().ok().flatten())
        .cloned();

    let mut response = next.run(request).await;

    if let Some(url) = navigation_url {
        if is_page_response(&response) {
            handle.set_previous_url(url).await;
        }
    }

    let snapshot = handle.snapshot().await;
    if !stored && snapshot.is_empty() {
        return response;
    }

    if let Err(e) = state.sessions.save(&snapshot).await {
        error!(error = %e, "Failed to persist session");
    }

    if !is_head && is_html(response.headers()) {
        response = inject_beacons(&state, current.as_ref(), handle.id(), response).await;
    }

    let cookie = session_cookie(&state.sites.session, handle.id(), cross_site);
    (jar.add(cookie), response).into_response()
}

/// A response from a matched, non-resource route.
fn is_page_response(response: &Response) -> bool {
    let extensions = response.extensions();
    extensions.get::<ResourceRoute>().is_none()
        && extensions.get::<UnmatchedRoute>().is_none()
        && response.status() != StatusCode::METHOD_NOT_ALLOWED
}

/// Cookies set from the SSO endpoint travel on cross-site `<img>` requests and
/// need `SameSite=None`, which browsers only accept together with `Secure`.
fn session_cookie(config: &SessionConfig, id: &str, cross_site: bool) -> Cookie<'static> {
    let same_site = match (cross_site, config.same_site) {
        (true, _) | (false, SameSitePolicy::None) => SameSite::None,
        (false, SameSitePolicy::Lax) => SameSite::Lax,
        (false, SameSitePolicy::Strict) => SameSite::Strict,
    };

    Cookie::build((config.cookie.clone(), id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(same_site)
        .secure(config.secure || same_site == SameSite::None)
        .build()
}

async fn inject_beacons(
    state: &AppState,
    current: Option<&Arc<Site>>,
    session_id: &str,
    response: Response,
) -> Response {
    let siblings = state.registry.siblings(current);
    if siblings.is_empty() {
        return response;
    }

    let markup = match render_beacons(
        &siblings,
        &state.encryption_key,
        session_id,
        &state.sites.sso,
    ) {
        Ok(markup) => markup,
        Err(e) => {
            error!(error = %e, "Failed to seal session id for beacons");
            return response;
        }
    };

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "Failed to buffer HTML response");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match splice_before_body_close(&bytes, markup.as_bytes()) {
        Some(spliced) => {
            counter!("nexus_sso_beacons_injected_total").increment(siblings.len() as u64);
            parts.headers.remove(CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(spliced))
        }
        None => Response::from_parts(parts, Body::from(bytes)),
    }
}

fn query_value(query: Option<&str>, name: &str) -> Option<String> {
    form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Plain top-level navigation: a GET that is neither AJAX nor a prefetch.
fn is_navigation(method: &Method, headers: &HeaderMap) -> bool {
    if method != Method::GET {
        return false;
    }

    let header_is = |name: &str, needle: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.to_ascii_lowercase().contains(needle))
    };

    let ajax = header_is("x-requested-with", "xmlhttprequest");
    let prefetch = header_is("purpose", "prefetch")
        || header_is("sec-purpose", "prefetch")
        || header_is("x-moz", "prefetch");

    !ajax && !prefetch
}

/// Absolute URL of the request, minus the SSO parameter.
fn full_url<B>(request: &Request<B>, sso_param: &str) -> String {
    let scheme = request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().scheme_str())
        .unwrap_or("http");
    let host = request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().authority().map(|a| a.as_str()))
        .unwrap_or("localhost");

    let mut url = format!("{scheme}://{host}{}", request.uri().path());

    if let Some(query) = request.uri().query() {
        let kept: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .filter(|(key, _)| key != sso_param)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if !kept.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(kept)
                .finish();
            url.push('?');
            url.push_str(&encoded);
        }
    }

    url
}
