use anyhow::Result;
use libsql::Connection;

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i32 = 1;

/// Run database migrations
///
/// This is the single source of truth for the database schema.
pub async fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
        (),
    )
    .await?;

    let current_version = get_current_version(conn).await?;

    if current_version >= SCHEMA_VERSION {
        tracing::info!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    tracing::info!("Running migrations from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        run_migration_v1(conn).await?;
        record_migration(conn, 1, "Initial schema").await?;
    }

    tracing::info!("Database migrations completed successfully (now at version {})", SCHEMA_VERSION);
    Ok(())
}

/// Get current schema version from database
async fn get_current_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn.query("SELECT MAX(version) FROM schema_migrations", ()).await?;

    if let Some(row) = rows.next().await? {
        let version: Option<i32> = row.get(0)?;
        Ok(version.unwrap_or(0))
    } else {
        Ok(0)
    }
}

/// Record that a migration was applied
async fn record_migration(conn: &Connection, version: i32, description: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        libsql::params![version, now, description],
    )
    .await?;

    tracing::info!("Applied migration v{}: {}", version, description);
    Ok(())
}

/// Migration v1: sites and outages
async fn run_migration_v1(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sites (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL UNIQUE,
            url TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL,
            total_checks INTEGER NOT NULL DEFAULT 0,
            online_checks INTEGER NOT NULL DEFAULT 0,
            last_status TEXT NOT NULL DEFAULT 'unknown',
            last_response_time INTEGER NOT NULL DEFAULT -1,
            last_checked_at INTEGER,
            CHECK (online_checks >= 0 AND online_checks <= total_checks)
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS outages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL,
            type TEXT NOT NULL CHECK (type IN ('down', 'degraded')),
            start_time INTEGER NOT NULL,
            end_time INTEGER,
            CHECK (end_time IS NULL OR end_time >= start_time),
            FOREIGN KEY (site_id) REFERENCES sites(id) ON DELETE CASCADE
        )",
        (),
    )
    .await?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_sites_created_at ON sites(created_at)", ()).await?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_outages_site_start ON outages(site_id, start_time DESC)",
        (),
    )
    .await?;

    // At most one open outage per site
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_outages_one_open_per_site
         ON outages(site_id) WHERE end_time IS NULL",
        (),
    )
    .await?;

    Ok(())
}
