//! Domain models

pub mod site;

pub use site::{DomainParams, Site, SiteDomain, SiteRecord, SiteSummary};
