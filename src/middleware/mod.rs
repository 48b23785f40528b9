//! HTTP middleware for Nexus Sites
//!
//! - Site resolution: binds the request to the site serving its host
//! - Session bridge: restores sessions across sibling domains and injects
//!   SSO beacons into HTML responses
//! - Trace span maker that keeps SSO tokens out of the logs

pub mod beacon;
pub mod session_bridge;
pub mod site_resolution;
pub mod trace;

pub use session_bridge::session_bridge_middleware;
pub use site_resolution::site_resolution_middleware;
pub use trace::SanitizedMakeSpan;

use axum::http::{header::HOST, Request};

/// Lowercased host of a request without the port. Prefers the `Host` header
/// and falls back to the URI authority.
pub fn request_host<B>(request: &Request<B>) -> Option<String> {
    let raw = request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().authority().map(|a| a.as_str()))?;

    let host = raw.rsplit('@').next().unwrap_or(raw);
    let host = if let Some(rest) = host.strip_prefix('[') {
        // IPv6 literal
        rest.split(']').next().unwrap_or(rest)
    } else {
        host.split(':').next().unwrap_or(host)
    };

    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    (!host.is_empty()).then_some(host)
}
