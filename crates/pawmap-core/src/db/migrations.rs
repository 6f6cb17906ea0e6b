//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }

    tracing::debug!("Database schema at version {}", CURRENT_VERSION);
    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Migration to version 1: incidents table
///
/// The `CHECK` constraints make the store the final authority on record shape.
async fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        "CREATE TABLE IF NOT EXISTS incidents (
            id TEXT PRIMARY KEY NOT NULL,
            location_name TEXT NOT NULL CHECK (length(trim(location_name)) > 0),
            latitude REAL NOT NULL CHECK (latitude BETWEEN -90 AND 90),
            longitude REAL NOT NULL CHECK (longitude BETWEEN -180 AND 180),
            reporter_name TEXT NOT NULL CHECK (length(trim(reporter_name)) > 0),
            description TEXT NOT NULL CHECK (length(trim(description)) > 0),
            category TEXT NOT NULL
                CHECK (category IN ('general-report', 'poisoning-alert', 'abuse-report')),
            contact_info TEXT,
            image_data TEXT,
            created_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_incidents_created ON incidents(created_at DESC, id DESC)",
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version 1");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn connection() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_sets_current_version() {
        let conn = connection().await;
        assert_eq!(get_version(&conn).await.unwrap(), 0);

        run(&conn).await.unwrap();
        assert_eq!(get_version(&conn).await.unwrap(), CURRENT_VERSION);

        // Second run is a no-op
        run(&conn).await.unwrap();
        assert_eq!(get_version(&conn).await.unwrap(), CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_category_check_constraint() {
        let conn = connection().await;
        run(&conn).await.unwrap();

        let result = conn
            .execute(
                "INSERT INTO incidents (id, location_name, latitude, longitude, reporter_name,
                 description, category, created_at) VALUES ('x', 'a', 22.3, 114.1, 'b', 'c', 'lost-pet', 1)",
                (),
            )
            .await;
        assert!(result.is_err());
    }
}
