//! HTTP handlers served by the routing layer itself

pub mod health;
pub mod metrics;
pub mod sso;
