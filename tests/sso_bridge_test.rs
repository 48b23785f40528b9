//! Cross-domain session bridge, end to end

use axum::{
    body::Body,
    http::{header, Method, StatusCode},
};
use common::{beacon_tokens, body_string, request, session_cookie, test_key, TestApp, MAIN_DOMAIN};
use nexus_sites::crypto::{decrypt, encrypt};
use nexus_sites::session::{Session, SessionStore};
use pretty_assertions::assert_eq;
use serde_json::json;

mod common;

#[tokio::test]
async fn test_beacons_target_siblings_only() {
    let app = TestApp::new().await;

    let response = app.get("foo.example.com", "/foo/lol").await;
    assert_eq!(response.status(), StatusCode::OK);
    let session_id = session_cookie(&response).unwrap();
    let body = body_string(response).await;

    // accounts is the main site, foo is current, archive is disabled
    let beacons = beacon_tokens(&body);
    assert_eq!(beacons.len(), 1);
    assert_eq!(beacons[0].0, "bar.example.com");
    assert_eq!(decrypt(&test_key(), &beacons[0].1).unwrap(), session_id);

    assert!(body.contains("//bar.example.com/_nexus/sso?s_code="));
    assert!(!body.contains("//accounts.example.com/_nexus/sso"));
    assert!(!body.contains("//archive.example.com/_nexus/sso"));
}

#[tokio::test]
async fn test_beacons_sit_before_body_close() {
    let app = TestApp::new().await;

    let response = app.get("foo.example.com", "/foo/lol").await;
    let body = body_string(response).await;

    let img = body.find("<img src=\"//bar.example.com").unwrap();
    let close = body.find("</body>").unwrap();
    assert!(img < close);
    assert!(body.ends_with("</body></html>"));
}

#[tokio::test]
async fn test_main_site_page_beacons_every_other_enabled_site() {
    let app = TestApp::new().await;

    let response = app.get(MAIN_DOMAIN, "/accounts/home").await;
    let body = body_string(response).await;

    let domains: Vec<String> = beacon_tokens(&body).into_iter().map(|(d, _)| d).collect();
    assert_eq!(domains, vec!["foo.example.com", "bar.example.com"]);
}

#[tokio::test]
async fn test_plain_not_found_left_alone() {
    let app = TestApp::new().await;

    let response = app
        .send(
            request(Method::GET, "nowhere.test", "/")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    // 404 from the router is plain text; nothing to inject into
    assert!(!body_string(response).await.contains("<img"));
}

#[tokio::test]
async fn test_json_never_modified() {
    let app = TestApp::new().await;

    let response = app.get("foo.example.com", "/foo/snippet").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("application/json"));

    let body = body_string(response).await;
    assert_eq!(body, json!({ "html": "<p>hello</p></body>" }).to_string());
}

#[tokio::test]
async fn test_content_length_matches_injected_body() {
    let app = TestApp::new().await;

    let response = app.get("foo.example.com", "/foo/lol").await;
    let declared = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .map(|v| v.to_str().unwrap().parse::<usize>().unwrap());
    let body = body_string(response).await;

    if let Some(len) = declared {
        assert_eq!(len, body.len());
    }
}

#[tokio::test]
async fn test_session_cookie_attributes() {
    let app = TestApp::new().await;

    let response = app.get("foo.example.com", "/foo/lol").await;
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();

    assert!(cookie.starts_with("nexus_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));
    assert!(!cookie.contains("Secure"));

    // The SSO endpoint is reached by cross-site <img> requests
    app.sessions.save(&Session::new("sess123")).await.unwrap();
    let token = encrypt(&test_key(), "sess123").unwrap();
    let response = app
        .get("bar.example.com", &format!("/_nexus/sso?s_code={token}"))
        .await;
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();

    assert!(cookie.starts_with("nexus_session=sess123"));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=None"));
    assert!(cookie.contains("Secure"));
}

#[tokio::test]
async fn test_cookie_restores_session() {
    let app = TestApp::new().await;

    let first = app.get("foo.example.com", "/foo/lol").await;
    let id = session_cookie(&first).unwrap();

    let second = app
        .send(
            request(Method::GET, "foo.example.com", "/foo/asd")
                .header(header::COOKIE, format!("nexus_session={id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(session_cookie(&second).unwrap(), id);
}

#[tokio::test]
async fn test_valid_token_adopts_session() {
    let app = TestApp::new().await;

    let mut session = Session::new("sess123");
    session.insert("user", json!("alice"));
    app.sessions.save(&session).await.unwrap();

    let token = encrypt(&test_key(), "sess123").unwrap();
    let response = app
        .get("bar.example.com", &format!("/_nexus/sso?s_code={token}"))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/gif");
    assert_eq!(session_cookie(&response).unwrap(), "sess123");

    let stored = app.sessions.load("sess123").await.unwrap().unwrap();
    assert_eq!(stored.get("user"), Some(&json!("alice")));
}

#[tokio::test]
async fn test_token_wins_over_cookie() {
    let app = TestApp::new().await;
    app.sessions.save(&Session::new("sess123")).await.unwrap();
    app.sessions.save(&Session::new("other")).await.unwrap();

    let token = encrypt(&test_key(), "sess123").unwrap();
    let response = app
        .send(
            request(Method::GET, "bar.example.com", &format!("/_nexus/sso?s_code={token}"))
                .header(header::COOKIE, "nexus_session=other")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(session_cookie(&response).unwrap(), "sess123");
}

#[tokio::test]
async fn test_corrupted_token_yields_anonymous_session() {
    let app = TestApp::new().await;
    app.sessions.save(&Session::new("sess123")).await.unwrap();

    let mut token = encrypt(&test_key(), "sess123").unwrap();
    token.replace_range(..4, "AAAA");

    let response = app
        .get("bar.example.com", &format!("/_nexus/sso?s_code={token}"))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    // Nothing was stored in the fresh session, so no cookie is issued
    assert_eq!(session_cookie(&response), None);
    assert_eq!(app.sessions.len().await, 1);
}

#[tokio::test]
async fn test_corrupted_token_falls_back_to_cookie() {
    let app = TestApp::new().await;
    app.sessions.save(&Session::new("kept")).await.unwrap();

    let response = app
        .send(
            request(Method::GET, "bar.example.com", "/_nexus/sso?s_code=not-a-token")
                .header(header::COOKIE, "nexus_session=kept")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(session_cookie(&response).unwrap(), "kept");
}

#[tokio::test]
async fn test_token_for_unknown_session_starts_fresh() {
    let app = TestApp::new().await;

    let token = encrypt(&test_key(), "ghost").unwrap();
    let response = app
        .get("bar.example.com", &format!("/_nexus/sso?s_code={token}"))
        .await;

    assert_eq!(session_cookie(&response), None);
    assert!(app.sessions.load("ghost").await.unwrap().is_none());
    assert!(app.sessions.is_empty().await);
}

#[tokio::test]
async fn test_cookieless_requests_store_no_empty_sessions() {
    let app = TestApp::new().await;

    for _ in 0..500 {
        let response = app.get("nowhere.test", "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(session_cookie(&response), None);
    }
    let _ = app.get("foo.example.com", "/ready").await;
    let _ = app.get("nowhere.test", "/").await;
    let _ = app.get("bar.example.com", "/_nexus/sso").await;

    assert!(app.sessions.is_empty().await);

    // A page visit records the previous URL, so that session is kept
    let response = app.get("foo.example.com", "/foo/lol").await;
    assert!(session_cookie(&response).is_some());
    assert_eq!(app.sessions.len().await, 1);
}

async fn previous_url(app: &TestApp, id: &str) -> Option<String> {
    app.sessions
        .load(id)
        .await
        .unwrap()
        .and_then(|s| s.previous_url().map(str::to_string))
}

#[tokio::test]
async fn test_previous_url_recorded_for_navigation_only() {
    let app = TestApp::new().await;

    let first = app.get("foo.example.com", "/foo/lol?page=2").await;
    let id = session_cookie(&first).unwrap();
    assert_eq!(
        previous_url(&app, &id).await.as_deref(),
        Some("http://foo.example.com/foo/lol?page=2")
    );

    let with_cookie = |method: Method, path: &str| {
        request(method, "foo.example.com", path).header(header::COOKIE, format!("nexus_session={id}"))
    };

    // Resource route
    app.send(with_cookie(Method::GET, "/assets/app.css").body(Body::empty()).unwrap())
        .await;
    // SSO receiver is a resource route too
    app.send(with_cookie(Method::GET, "/_nexus/sso").body(Body::empty()).unwrap())
        .await;
    // AJAX
    app.send(
        with_cookie(Method::GET, "/foo/ajax")
            .header("x-requested-with", "XMLHttpRequest")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    // Prefetch
    app.send(
        with_cookie(Method::GET, "/foo/prefetched")
            .header("sec-purpose", "prefetch")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    // Not a GET
    app.send(with_cookie(Method::POST, "/foo/posted").body(Body::empty()).unwrap())
        .await;

    assert_eq!(
        previous_url(&app, &id).await.as_deref(),
        Some("http://foo.example.com/foo/lol?page=2")
    );

    app.send(with_cookie(Method::GET, "/foo/asd").body(Body::empty()).unwrap())
        .await;
    assert_eq!(
        previous_url(&app, &id).await.as_deref(),
        Some("http://foo.example.com/foo/asd")
    );
}

#[tokio::test]
async fn test_previous_url_ignores_unmatched_paths() {
    let app = TestApp::new().await;

    let first = app.get("foo.example.com", "/foo/lol").await;
    let id = session_cookie(&first).unwrap();

    for path in ["/favicon.ico", "/foo/lol/extra", "/nope"] {
        let response = app
            .send(
                request(Method::GET, "foo.example.com", path)
                    .header(header::COOKIE, format!("nexus_session={id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "path {path}");
    }

    assert_eq!(
        previous_url(&app, &id).await.as_deref(),
        Some("http://foo.example.com/foo/lol")
    );
}

#[tokio::test]
async fn test_previous_url_drops_sso_token() {
    let app = TestApp::new().await;
    app.sessions.save(&Session::new("sess123")).await.unwrap();

    let token = encrypt(&test_key(), "sess123").unwrap();
    let _ = app
        .get("foo.example.com", &format!("/foo/lol?s_code={token}&tab=1"))
        .await;

    assert_eq!(
        previous_url(&app, "sess123").await.as_deref(),
        Some("http://foo.example.com/foo/lol?tab=1")
    );
}
