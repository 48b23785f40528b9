//! SSO beacon rendering and HTML splicing
//!
//! Injection is a plain byte-level insert before the first literal `</body>`.
//! Bodies without one are left untouched. No HTML parsing is attempted.

use axum::http::{header::CONTENT_TYPE, HeaderMap};
use std::sync::Arc;

use crate::config::SsoConfig;
use crate::crypto::{encrypt, EncryptionError, EncryptionKey};
use crate::domain::Site;

const BODY_CLOSE: &[u8] = b"</body>";

pub fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
}

/// One hidden image per sibling, each pointing at the sibling's SSO endpoint
/// with a freshly sealed copy of `session_id`.
pub fn render_beacons(
    siblings: &[&Arc<Site>],
    key: &EncryptionKey,
    session_id: &str,
    sso: &SsoConfig,
) -> Result<String, EncryptionError> {
    let mut markup = String::new();
    for site in siblings {
        let Some(domain) = site.canonical_domain() else {
            continue;
        };
        let token = encrypt(key, session_id)?;
        markup.push_str(&format!(
            r#"<img src="//{domain}{endpoint}?{param}={token}" width="1" height="1" alt="" style="display:none">"#,
            endpoint = sso.endpoint,
            param = sso.query_param,
        ));
    }
    Ok(markup)
}

/// Insert `markup` before the first `</body>`. `None` when there is none.
pub fn splice_before_body_close(body: &[u8], markup: &[u8]) -> Option<Vec<u8>> {
    let at = body
        .windows(BODY_CLOSE.len())
        .position(|window| window == BODY_CLOSE)?;

    let mut spliced = Vec::with_capacity(body.len() + markup.len());
    spliced.extend_from_slice(&body[..at]);
    spliced.extend_from_slice(markup);
    spliced.extend_from_slice(&body[at..]);
    Some(spliced)
}
