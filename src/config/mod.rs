//! Configuration management for Nexus Sites
//!
//! Process settings (listen address, secrets, backend URLs) come from the
//! environment. The site catalogue comes from a TOML/YAML/JSON file loaded
//! with the `config` crate, with `NEXUS__*` environment overrides.

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::env;
use validator::Validate;

use crate::domain::SiteRecord;
use crate::error::ConfigurationError;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// Path to the site catalogue file
    pub sites_path: String,
    /// Base64 AES-256 key for bridge tokens. A random key is generated when unset.
    pub encryption_key: Option<String>,
    /// Required when the catalogue selects the `mysql` repository
    pub database_url: Option<String>,
    /// Sessions are kept in memory when unset
    pub redis_url: Option<String>,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "json" or "pretty"
    pub log_format: String,
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "pretty".to_string(),
            metrics_enabled: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            http_host: env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid HTTP_PORT")?,
            sites_path: env::var("NEXUS_SITES_CONFIG").unwrap_or_else(|_| "sites.toml".to_string()),
            encryption_key: env::var("NEXUS_ENCRYPTION_KEY").ok(),
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty()),
            redis_url: env::var("REDIS_URL").ok().filter(|s| !s.trim().is_empty()),
            telemetry: TelemetryConfig {
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
                metrics_enabled: env::var("METRICS_ENABLED")
                    .map(|s| s.to_lowercase() == "true")
                    .unwrap_or(false),
            },
        })
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

// Regex for site slugs
lazy_static! {
    pub static ref SLUG_REGEX: regex::Regex =
        regex::Regex::new(r"^[a-z0-9]+(?:[-_][a-z0-9]+)*$").unwrap();
}

/// Which backend supplies site domain records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryKind {
    /// Records listed under `records` in the catalogue file
    #[default]
    Static,
    /// Rows of the `site_domains` table
    Mysql,
}

/// Declaration of an extra per-domain parameter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtraParamSpec {
    #[serde(default)]
    pub required: bool,
}

/// One tenant as declared in the catalogue
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SiteDefinition {
    #[validate(regex(path = *SLUG_REGEX))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[serde(default)]
    pub extra_params: BTreeMap<String, ExtraParamSpec>,
    /// Registrar identifiers, resolved through the registrar catalog
    #[serde(default)]
    pub routes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoriesConfig {
    #[serde(default = "default_routes_dir")]
    pub routes: String,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            routes: default_routes_dir(),
        }
    }
}

/// `SameSite` attribute of the session cookie
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    #[default]
    Lax,
    Strict,
    None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_cookie")]
    pub cookie: String,
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
    /// Policy for first-party responses. The SSO endpoint always answers
    /// with `SameSite=None; Secure` so beacons can set the cookie cross-site.
    #[serde(default)]
    pub same_site: SameSitePolicy,
    /// Forced on whenever the cookie is sent with `SameSite=None`
    #[serde(default)]
    pub secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie: default_session_cookie(),
            ttl_secs: default_session_ttl(),
            same_site: SameSitePolicy::default(),
            secure: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SsoConfig {
    /// Query parameter carrying the sealed session id
    #[serde(default = "default_sso_param")]
    pub query_param: String,
    /// Path the beacons point at on each sibling domain
    #[serde(default = "default_sso_endpoint")]
    pub endpoint: String,
}

impl Default for SsoConfig {
    fn default() -> Self {
        Self {
            query_param: default_sso_param(),
            endpoint: default_sso_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UrlConfig {
    /// Prefix of the per-site URL default keys, e.g. `nexus_domain_blog`
    #[serde(default = "default_url_prefix")]
    pub default_prefix: String,
}

impl Default for UrlConfig {
    fn default() -> Self {
        Self {
            default_prefix: default_url_prefix(),
        }
    }
}

/// The site catalogue
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SitesConfig {
    /// Domain hosting the central routes
    #[validate(length(min = 1, max = 253))]
    pub main_domain: String,
    #[serde(default)]
    pub model_repository: RepositoryKind,
    #[serde(default = "default_route_namespace")]
    pub route_namespace: String,
    #[serde(default)]
    pub directories: DirectoriesConfig,
    #[serde(default)]
    #[validate(nested)]
    pub sites: Vec<SiteDefinition>,
    /// Backing records for the static repository, keyed by site slug
    #[serde(default)]
    pub records: HashMap<String, Vec<SiteRecord>>,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub sso: SsoConfig,
    #[serde(default)]
    pub url: UrlConfig,
}

impl SitesConfig {
    /// Load the catalogue from a file; the format follows the extension.
    pub fn load(path: &str) -> std::result::Result<Self, ConfigurationError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("NEXUS")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        Self::finish(settings)
    }

    /// Parse a catalogue from TOML text
    pub fn from_toml(text: &str) -> std::result::Result<Self, ConfigurationError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?;
        Self::finish(settings)
    }

    fn finish(settings: config::Config) -> std::result::Result<Self, ConfigurationError> {
        let parsed: SitesConfig = settings.try_deserialize()?;
        parsed.validate()?;

        let mut seen = std::collections::HashSet::new();
        for site in &parsed.sites {
            if !seen.insert(site.name.as_str()) {
                return Err(ConfigurationError::Invalid(format!(
                    "site `{}` is declared more than once",
                    site.name
                )));
            }
        }

        Ok(parsed)
    }
}

fn default_routes_dir() -> String {
    "routes".to_string()
}

fn default_route_namespace() -> String {
    "sites".to_string()
}

fn default_session_cookie() -> String {
    "nexus_session".to_string()
}

fn default_session_ttl() -> u64 {
    7200
}

fn default_sso_param() -> String {
    "s_code".to_string()
}

fn default_sso_endpoint() -> String {
    "/_nexus/sso".to_string()
}

fn default_url_prefix() -> String {
    "nexus_domain_".to_string()
}
