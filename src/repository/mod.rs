//! Data access layer (Repository pattern)

pub mod site;

pub use site::{connect, MySqlSiteRepository, SiteRepository, StaticSiteRepository};
