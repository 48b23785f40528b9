//! Site record repository

use crate::config::{Config, RepositoryKind, SitesConfig};
use crate::domain::SiteRecord;
use crate::error::{ConfigurationError, Result};
use async_trait::async_trait;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use std::collections::HashMap;
use std::sync::Arc;

/// Source of backing records for the sites declared in configuration
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SiteRepository: Send + Sync {
    /// All records for a slug, in a stable order. An unknown slug yields an empty list.
    async fn find_by_slug(&self, slug: &str) -> Result<Vec<SiteRecord>>;
}

/// Records held in memory, usually taken from the `records` section of the catalogue
#[derive(Debug, Default, Clone)]
pub struct StaticSiteRepository {
    records: HashMap<String, Vec<SiteRecord>>,
}

impl StaticSiteRepository {
    pub fn new(records: HashMap<String, Vec<SiteRecord>>) -> Self {
        Self { records }
    }

    pub fn with_site(mut self, slug: impl Into<String>, records: Vec<SiteRecord>) -> Self {
        self.records.insert(slug.into(), records);
        self
    }
}

#[async_trait]
impl SiteRepository for StaticSiteRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Vec<SiteRecord>> {
        Ok(self.records.get(slug).cloned().unwrap_or_default())
    }
}

pub struct MySqlSiteRepository {
    pool: MySqlPool,
}

impl MySqlSiteRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SiteRepository for MySqlSiteRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Vec<SiteRecord>> {
        let records = sqlx::query_as::<_, SiteRecord>(
            r#"
            SELECT domain, enabled, COALESCE(extra_data, JSON_OBJECT()) AS extra
            FROM site_domains
            WHERE slug = ?
            ORDER BY position, domain
            "#,
        )
        .bind(slug)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

/// Build the repository named by `model_repository`.
pub async fn connect(
    sites: &SitesConfig,
    config: &Config,
) -> std::result::Result<Arc<dyn SiteRepository>, ConfigurationError> {
    match sites.model_repository {
        RepositoryKind::Static => Ok(Arc::new(StaticSiteRepository::new(sites.records.clone()))),
        RepositoryKind::Mysql => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                ConfigurationError::Repository(
                    "model_repository = \"mysql\" requires DATABASE_URL".to_string(),
                )
            })?;
            let pool = MySqlPoolOptions::new()
                .max_connections(2)
                .connect(url)
                .await
                .map_err(|e| ConfigurationError::Repository(e.to_string()))?;
            Ok(Arc::new(MySqlSiteRepository::new(pool)))
        }
    }
}
