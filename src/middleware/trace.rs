//! Custom TraceLayer span maker that sanitizes sensitive query parameters.
//!
//! SSO tokens travel in the query string of beacon requests; their values are
//! redacted before the URI is recorded on the request span.

use axum::http::{Request, Uri};
use std::sync::Arc;
use tower_http::trace::MakeSpan;
use tracing::Span;

use super::request_host;
use crate::config::SsoConfig;

/// Query parameter names redacted on top of the SSO parameter.
const SENSITIVE_PARAMS: &[&str] = &["token", "session", "password"];

#[derive(Clone, Debug)]
pub struct SanitizedMakeSpan {
    sso_param: Arc<str>,
}

impl SanitizedMakeSpan {
    /// `sso_param` is the configured name of the query parameter carrying bridge tokens.
    pub fn new(sso_param: &str) -> Self {
        Self {
            sso_param: Arc::from(sso_param),
        }
    }
}

impl Default for SanitizedMakeSpan {
    fn default() -> Self {
        Self::new(&SsoConfig::default().query_param)
    }
}

impl<B> MakeSpan<B> for SanitizedMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let host = request_host(request).unwrap_or_default();

        tracing::info_span!(
            "request",
            method = %request.method(),
            host = %host,
            uri = %sanitize_uri(request.uri(), &self.sso_param),
            version = ?request.version(),
        )
    }
}

fn is_sensitive(key: &str, sso_param: &str) -> bool {
    key.eq_ignore_ascii_case(sso_param)
        || SENSITIVE_PARAMS
            .iter()
            .any(|name| key.eq_ignore_ascii_case(name))
}

/// `/_nexus/sso?s_code=AbC...&x=1` becomes `/_nexus/sso?s_code=[REDACTED]&x=1`
fn sanitize_uri(uri: &Uri, sso_param: &str) -> String {
    let Some(query) = uri.query() else {
        return uri.path().to_string();
    };

    let sanitized: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if is_sensitive(key, sso_param) => format!("{key}=[REDACTED]"),
            _ => pair.to_string(),
        })
        .collect();

    format!("{}?{}", uri.path(), sanitized.join("&"))
}
