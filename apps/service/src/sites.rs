//! Registering and removing monitored sites.

use anyhow::{Result, anyhow};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::database::{Database, NewSite, Site, StoreError};
use crate::validation::{validate_site_name, validate_site_url};

pub struct SiteManager {
    database: Arc<dyn Database>,
}

impl SiteManager {
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self { database }
    }

    /// Validate and register a new site
    pub async fn add(&self, name: &str, url: &str) -> Result<Site> {
        validate_site_name(name).to_result()?;
        validate_site_url(url).to_result()?;

        let new = NewSite { name: name.trim().to_string(), url: url.trim().to_string() };
        let site = match self.database.create_site(&new, Utc::now()).await {
            Ok(site) => site,
            Err(StoreError::Conflict(_)) => {
                return Err(anyhow!("A site named '{}' or with URL '{}' already exists", new.name, new.url));
            }
            Err(e) => return Err(e.into()),
        };

        info!(site_id = site.id, name = %site.name, url = %site.url, "Site registered");
        Ok(site)
    }

    /// Find a site by UUID, numeric id, name or URL
    pub async fn find(&self, key: &str) -> Result<Site> {
        let key = key.trim();

        if let Ok(uuid) = Uuid::parse_str(key) {
            if let Some(site) = self.database.get_site_by_uuid(uuid).await? {
                return Ok(site);
            }
        }

        if let Ok(id) = key.parse::<i64>() {
            if let Some(site) = self.database.get_site(id).await? {
                return Ok(site);
            }
        }

        if let Some(site) = self.database.get_site_by_name(key).await? {
            return Ok(site);
        }

        self.database
            .get_site_by_url(key)
            .await?
            .ok_or_else(|| anyhow!("No site matches '{key}'"))
    }

    /// Remove a site together with its outages
    pub async fn remove(&self, name_or_id: &str) -> Result<Site> {
        let site = self.find(name_or_id).await?;
        self.database.delete_site(site.id).await?;
        info!(site_id = site.id, name = %site.name, "Site removed");
        Ok(site)
    }

    pub async fn list(&self) -> Result<Vec<Site>> {
        Ok(self.database.list_sites().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::create_test_database;
    use crate::monitoring::types::OutageType;

    async fn manager() -> Result<(SiteManager, Arc<dyn Database>, tempfile::TempDir)> {
        let (db, dir) = create_test_database().await?;
        let db: Arc<dyn Database> = Arc::new(db);
        Ok((SiteManager::new(db.clone()), db, dir))
    }

    #[tokio::test]
    async fn test_add_validates_input() -> Result<()> {
        let (sites, _db, _dir) = manager().await?;

        assert!(sites.add("", "https://example.com").await.is_err());
        assert!(sites.add("Example", "example.com").await.is_err());
        assert!(sites.add("Example", "ftp://example.com").await.is_err());

        let site = sites.add("  Example ", "https://example.com").await?;
        assert_eq!(site.name, "Example");
        Ok(())
    }

    #[tokio::test]
    async fn test_add_rejects_duplicates() -> Result<()> {
        let (sites, _db, _dir) = manager().await?;
        sites.add("Example", "https://example.com").await?;

        let err = sites.add("Other", "https://example.com").await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
        Ok(())
    }

    #[tokio::test]
    async fn test_find_by_any_identifier() -> Result<()> {
        let (sites, _db, _dir) = manager().await?;
        let site = sites.add("Example", "https://example.com").await?;
        sites.add("Other", "https://other.example.com").await?;

        assert_eq!(sites.find(&site.id.to_string()).await?.id, site.id);
        assert_eq!(sites.find(&site.uuid.to_string()).await?.id, site.id);
        assert_eq!(sites.find(&site.uuid.hyphenated().to_string().to_uppercase()).await?.id, site.id);
        assert_eq!(sites.find("Example").await?.id, site.id);
        assert_eq!(sites.find("https://example.com").await?.id, site.id);
        assert!(sites.find(&Uuid::new_v4().to_string()).await.is_err());
        assert!(sites.find("missing").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_deletes_outages() -> Result<()> {
        let (sites, db, _dir) = manager().await?;
        let site = sites.add("Example", "https://example.com").await?;
        let outage = db.open_outage(site.id, OutageType::Down, Utc::now()).await?.unwrap();

        sites.remove("Example").await?;

        assert!(sites.list().await?.is_empty());
        assert!(db.get_outage(outage.id).await?.is_none());
        Ok(())
    }
}
