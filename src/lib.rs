//! Nexus Sites - multi-site routing layer
//!
//! One process serves several sites, each on its own set of domains. This
//! crate resolves the site for every request, builds per-site routers, and
//! bridges a single session across sibling domains with encrypted beacons.

pub mod api;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod events;
pub mod middleware;
pub mod registry;
pub mod repository;
pub mod routes;
pub mod server;
pub mod session;
pub mod storage;
pub mod telemetry;
pub mod view;

// Re-export commonly used types
pub use config::{Config, SitesConfig};
pub use error::{AppError, Result};
pub use registry::SiteRegistry;
