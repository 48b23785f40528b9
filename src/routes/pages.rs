//! `pages` registrar: `GET /{site}/{page}` renders a minimal HTML page for
//! the current site.

use axum::{extract::Path, response::Html, routing::get, Router};

use crate::domain::Site;
use crate::registry::CurrentSite;
use crate::server::AppState;
use crate::view::ViewContext;

pub const ID: &str = "pages";

pub fn register(site: &Site, router: Router<AppState>) -> Router<AppState> {
    router.route(&format!("/{}/{{page}}", site.name()), get(show))
}

async fn show(
    CurrentSite(site): CurrentSite,
    view: ViewContext,
    Path(page): Path<String>,
) -> Html<String> {
    Html(format!(
        "<!doctype html><html><head><title>{title}</title></head>\
         <body data-site=\"{site}\" data-view=\"{context}\"><h1>{page}</h1></body></html>",
        title = escape(site.title()),
        site = escape(site.name()),
        page = escape(&page),
        context = escape(&view.to_value().to_string()),
    ))
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
