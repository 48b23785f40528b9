//! SSO beacon receiver
//!
//! The session itself is adopted by the session bridge before this handler
//! runs; the endpoint only has to answer the `<img>` with a pixel.

use axum::{
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::IntoResponse,
};

/// 1x1 transparent GIF
pub const PIXEL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

/// GET on the configured SSO endpoint of every site
pub async fn receive() -> impl IntoResponse {
    (
        [
            (CONTENT_TYPE, "image/gif"),
            (CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
        ],
        PIXEL_GIF,
    )
}
