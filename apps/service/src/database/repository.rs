use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Row, params};
use uuid::Uuid;

use super::error::StoreError;
use super::models::{NewSite, Outage, Site, millis_to_timestamp, timestamp_to_millis};
use crate::monitoring::aggregator::CheckUpdate;
use crate::monitoring::types::OutageType;
use crate::pool::{LibsqlManager, LibsqlPool};

type StoreResult<T> = Result<T, StoreError>;

const SITE_COLUMNS: &str = "id, uuid, name, url, created_at, total_checks, online_checks, \
                            last_status, last_response_time, last_checked_at";
const OUTAGE_COLUMNS: &str = "id, site_id, type, start_time, end_time";

/// Storage operations consumed by the monitoring core
#[async_trait]
pub trait Database: Send + Sync {
    /// List all registered sites, oldest first
    async fn list_sites(&self) -> StoreResult<Vec<Site>>;

    /// Get a site by its numeric id
    async fn get_site(&self, id: i64) -> StoreResult<Option<Site>>;

    /// Get a site by its public UUID
    async fn get_site_by_uuid(&self, uuid: Uuid) -> StoreResult<Option<Site>>;

    /// Get a site by its unique name
    async fn get_site_by_name(&self, name: &str) -> StoreResult<Option<Site>>;

    /// Get a site by its unique URL
    async fn get_site_by_url(&self, url: &str) -> StoreResult<Option<Site>>;

    /// Register a site; duplicate name or URL is a [`StoreError::Conflict`]
    async fn create_site(&self, site: &NewSite, created_at: DateTime<Utc>) -> StoreResult<Site>;

    /// Delete a site and all of its outages
    async fn delete_site(&self, id: i64) -> StoreResult<()>;

    /// Apply one check to a site's counters in a single statement and
    /// return the updated row
    async fn apply_check(&self, site_id: i64, update: &CheckUpdate) -> StoreResult<Site>;

    /// The open outage of a site, if any
    async fn get_active_outage(&self, site_id: i64) -> StoreResult<Option<Outage>>;

    /// Open an outage unless one is already open for the site.
    ///
    /// Returns `None` when another open outage won; the check and the insert
    /// are a single conditional write.
    async fn open_outage(
        &self,
        site_id: i64,
        outage_type: OutageType,
        start_time: DateTime<Utc>,
    ) -> StoreResult<Option<Outage>>;

    /// Close an open outage. Closing an already closed outage leaves it untouched.
    async fn close_outage(&self, id: i64, end_time: DateTime<Utc>) -> StoreResult<Outage>;

    /// Get an outage by id
    async fn get_outage(&self, id: i64) -> StoreResult<Option<Outage>>;

    /// Outages of a site, most recent first, optionally only those that
    /// started at or after `since`
    async fn list_outages(
        &self,
        site_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<Outage>>;
}

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    pub(crate) async fn get_conn(&self) -> StoreResult<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }

    async fn query_sites(&self, filter: &str, value: libsql::Value) -> StoreResult<Option<Site>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {SITE_COLUMNS} FROM sites WHERE {filter} = ?");
        let mut rows = conn.query(&sql, params![value]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(site_from_row(&row)?)),
            None => Ok(None),
        }
    }
}

fn site_from_row(row: &Row) -> StoreResult<Site> {
    let uuid_str: String = row.get(1)?;
    let status_str: String = row.get(7)?;

    Ok(Site {
        id: row.get(0)?,
        uuid: Uuid::parse_str(&uuid_str).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        name: row.get(2)?,
        url: row.get(3)?,
        created_at: millis_to_timestamp(row.get(4)?)?,
        total_checks: row.get::<i64>(5)? as u64,
        online_checks: row.get::<i64>(6)? as u64,
        last_status: status_str.parse().map_err(StoreError::Corrupt)?,
        last_response_time: row.get(8)?,
        last_checked_at: row.get::<Option<i64>>(9)?.map(millis_to_timestamp).transpose()?,
    })
}

fn outage_from_row(row: &Row) -> StoreResult<Outage> {
    let type_str: String = row.get(2)?;

    Ok(Outage {
        id: row.get(0)?,
        site_id: row.get(1)?,
        outage_type: type_str.parse().map_err(StoreError::Corrupt)?,
        start_time: millis_to_timestamp(row.get(3)?)?,
        end_time: row.get::<Option<i64>>(4)?.map(millis_to_timestamp).transpose()?,
    })
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn list_sites(&self) -> StoreResult<Vec<Site>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {SITE_COLUMNS} FROM sites ORDER BY created_at ASC, id ASC");
        let mut rows = conn.query(&sql, ()).await?;
        let mut sites = Vec::new();

        while let Some(row) = rows.next().await? {
            sites.push(site_from_row(&row)?);
        }

        Ok(sites)
    }

    async fn get_site(&self, id: i64) -> StoreResult<Option<Site>> {
        self.query_sites("id", id.into()).await
    }

    async fn get_site_by_uuid(&self, uuid: Uuid) -> StoreResult<Option<Site>> {
        self.query_sites("uuid", uuid.to_string().into()).await
    }

    async fn get_site_by_name(&self, name: &str) -> StoreResult<Option<Site>> {
        self.query_sites("name", name.into()).await
    }

    async fn get_site_by_url(&self, url: &str) -> StoreResult<Option<Site>> {
        self.query_sites("url", url.into()).await
    }

    async fn create_site(&self, site: &NewSite, created_at: DateTime<Utc>) -> StoreResult<Site> {
        let conn = self.get_conn().await?;
        let uuid = Uuid::new_v4();

        conn.execute(
            "INSERT INTO sites (uuid, name, url, created_at) VALUES (?, ?, ?, ?)",
            params![
                uuid.to_string(),
                site.name.clone(),
                site.url.clone(),
                timestamp_to_millis(created_at)
            ],
        )
        .await
        .map_err(|e| StoreError::from_insert(e, "site name and url must be unique"))?;

        let id = conn.last_insert_rowid();
        drop(conn);

        self.get_site(id).await?.ok_or(StoreError::NotFound)
    }

    async fn delete_site(&self, id: i64) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        let tx = conn.transaction().await?;

        // Explicit so the cascade holds even on connections without foreign keys
        tx.execute("DELETE FROM outages WHERE site_id = ?", params![id]).await?;
        let deleted = tx.execute("DELETE FROM sites WHERE id = ?", params![id]).await?;

        if deleted == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn apply_check(&self, site_id: i64, update: &CheckUpdate) -> StoreResult<Site> {
        let conn = self.get_conn().await?;

        let changed = conn
            .execute(
                "UPDATE sites SET
                    total_checks = total_checks + 1,
                    online_checks = online_checks + ?,
                    last_status = ?,
                    last_response_time = ?,
                    last_checked_at = ?
                 WHERE id = ?",
                params![
                    if update.online { 1i64 } else { 0i64 },
                    update.status.as_str(),
                    update.response_time_ms,
                    timestamp_to_millis(update.checked_at),
                    site_id
                ],
            )
            .await?;

        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        drop(conn);

        self.get_site(site_id).await?.ok_or(StoreError::NotFound)
    }

    async fn get_active_outage(&self, site_id: i64) -> StoreResult<Option<Outage>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {OUTAGE_COLUMNS} FROM outages WHERE site_id = ? AND end_time IS NULL \
             ORDER BY start_time DESC"
        );
        let mut rows = conn.query(&sql, params![site_id]).await?;
        let mut open = Vec::new();

        while let Some(row) = rows.next().await? {
            open.push(outage_from_row(&row)?);
        }

        if open.len() > 1 {
            return Err(StoreError::InvariantViolation { site_id, open: open.len() });
        }

        Ok(open.pop())
    }

    async fn open_outage(
        &self,
        site_id: i64,
        outage_type: OutageType,
        start_time: DateTime<Utc>,
    ) -> StoreResult<Option<Outage>> {
        let conn = self.get_conn().await?;

        // The partial unique index on open outages turns a concurrent second
        // insert into an ignored row instead of a duplicate incident.
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO outages (site_id, type, start_time) VALUES (?, ?, ?)",
                params![site_id, outage_type.as_str(), timestamp_to_millis(start_time)],
            )
            .await?;

        if inserted == 0 {
            return Ok(None);
        }

        let id = conn.last_insert_rowid();
        drop(conn);

        self.get_outage(id).await
    }

    async fn close_outage(&self, id: i64, end_time: DateTime<Utc>) -> StoreResult<Outage> {
        let conn = self.get_conn().await?;

        // MAX keeps end_time >= start_time when the clock stepped backwards
        conn.execute(
            "UPDATE outages SET end_time = MAX(start_time, ?) WHERE id = ? AND end_time IS NULL",
            params![timestamp_to_millis(end_time), id],
        )
        .await?;
        drop(conn);

        self.get_outage(id).await?.ok_or(StoreError::NotFound)
    }

    async fn get_outage(&self, id: i64) -> StoreResult<Option<Outage>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {OUTAGE_COLUMNS} FROM outages WHERE id = ?");
        let mut rows = conn.query(&sql, params![id]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(outage_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_outages(
        &self,
        site_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<Outage>> {
        let conn = self.get_conn().await?;
        let since_millis = since.map(timestamp_to_millis).unwrap_or(i64::MIN);
        let sql = format!(
            "SELECT {OUTAGE_COLUMNS} FROM outages WHERE site_id = ? AND start_time >= ? \
             ORDER BY start_time DESC, id DESC"
        );
        let mut rows = conn.query(&sql, params![site_id, since_millis]).await?;
        let mut outages = Vec::new();

        while let Some(row) = rows.next().await? {
            outages.push(outage_from_row(&row)?);
        }

        Ok(outages)
    }
}
