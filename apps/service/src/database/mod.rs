/// Database abstraction layer
///
/// Sites and outages live in a local libsql database. The monitoring core
/// only talks to the [`Database`] trait.
pub mod error;
pub mod migrations;
pub mod models;
pub mod repository;

pub use error::StoreError;
pub use models::{NewSite, Outage, Site};
pub use repository::{Database, DatabaseImpl};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}

/// Open the pool, run migrations and hand back the storage implementation
pub async fn connect(path: impl AsRef<std::path::Path>, max_connections: usize) -> Result<DatabaseImpl> {
    let pool = crate::pool::open_pool(path, max_connections).await?;
    let conn = pool.get().await?;
    initialize_database(&conn).await?;
    drop(conn);
    Ok(DatabaseImpl::new_from_pool(pool))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::{TempDir, tempdir};

    /// Fresh migrated database in a temporary directory. Keep the `TempDir`
    /// alive for as long as the database is used.
    pub async fn create_test_database() -> Result<(DatabaseImpl, TempDir)> {
        let dir = tempdir()?;
        let db = connect(dir.path().join("test.db"), 8).await?;
        Ok((db, dir))
    }

    /// Simulate a database written without the one-open-outage index by
    /// giving `site_id` two open outages
    pub async fn insert_duplicate_open_outages(db: &DatabaseImpl, site_id: i64) -> Result<()> {
        let conn = db.get_conn().await?;
        conn.execute("DROP INDEX IF EXISTS idx_outages_one_open_per_site", ()).await?;
        for start in [1i64, 2] {
            conn.execute(
                "INSERT INTO outages (site_id, type, start_time) VALUES (?, 'down', ?)",
                libsql::params![site_id, start],
            )
            .await?;
        }
        Ok(())
    }
}
