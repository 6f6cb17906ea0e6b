//! Incident store implementation

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use libsql::{params, Connection, Row, Value};
use tokio::sync::Mutex;

use super::connection::Database;
use crate::error::{Error, Result};
use crate::models::{IncidentId, IncidentRecord, NewIncident, Position};
use crate::util::unix_millis_now;

/// Durable storage for the authoritative incident set.
///
/// Implementations assign `id`/`createdAt` on insert and never notify anyone;
/// fan-out is the sync service's job.
pub trait IncidentStore: Send + Sync + 'static {
    /// All incidents, newest first
    fn list_all(&self) -> impl Future<Output = Result<Vec<IncidentRecord>>> + Send;

    /// Persist a validated incident and return the stored record
    fn insert(&self, incident: NewIncident) -> impl Future<Output = Result<IncidentRecord>> + Send;

    /// Remove every incident, returning how many were removed
    fn clear_all(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Number of stored incidents
    fn count(&self) -> impl Future<Output = Result<u64>> + Send;
}

const SELECT_COLUMNS: &str = "SELECT id, location_name, latitude, longitude, reporter_name, \
     description, category, contact_info, image_data, created_at FROM incidents";

/// libSQL implementation of `IncidentStore`
#[derive(Clone)]
pub struct LibSqlIncidentStore {
    db: Arc<Mutex<Database>>,
}

impl LibSqlIncidentStore {
    /// Wrap an already opened database
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Open (and migrate) the database at `path`; `:memory:` is accepted
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self::new(Database::open(path).await?))
    }

    /// Open an in-memory store (primarily for tests)
    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory().await?))
    }

    /// Insert `seed` only when the store holds no incidents.
    ///
    /// Returns how many seed incidents were written.
    pub async fn seed_if_empty(&self, seed: &[NewIncident]) -> Result<u64> {
        let db = self.db.lock().await;
        let conn = db.connection();
        if count_rows(conn).await? > 0 {
            return Ok(0);
        }

        conn.execute("BEGIN TRANSACTION", ()).await?;
        let mut inserted = 0_u64;
        for incident in seed {
            if let Err(error) = insert_row(conn, incident.clone()).await {
                conn.execute("ROLLBACK", ()).await.ok();
                return Err(error);
            }
            inserted += 1;
        }
        if let Err(error) = conn.execute("COMMIT", ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(error.into());
        }

        tracing::info!("Seeded empty store with {} sample incidents", inserted);
        Ok(inserted)
    }

    fn parse_record(row: &Row) -> Result<IncidentRecord> {
        let id: String = row.get(0)?;
        let category: String = row.get(6)?;
        Ok(IncidentRecord {
            id: id
                .parse()
                .map_err(|_| Error::ValidationRejected(format!("Invalid incident ID: {id}")))?,
            location_name: row.get(1)?,
            position: Position::new(row.get(2)?, row.get(3)?),
            reporter_name: row.get(4)?,
            description: row.get(5)?,
            category: category
                .parse()
                .map_err(|error| Error::ValidationRejected(format!("{error}")))?,
            contact_info: optional_text(row, 7)?,
            image_data: optional_text(row, 8)?,
            created_at: row.get(9)?,
        })
    }
}

impl IncidentStore for LibSqlIncidentStore {
    async fn list_all(&self) -> Result<Vec<IncidentRecord>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                &format!("{SELECT_COLUMNS} ORDER BY created_at DESC, id DESC"),
                (),
            )
            .await?;

        let mut incidents = Vec::new();
        while let Some(row) = rows.next().await? {
            incidents.push(Self::parse_record(&row)?);
        }
        Ok(incidents)
    }

    async fn insert(&self, incident: NewIncident) -> Result<IncidentRecord> {
        let db = self.db.lock().await;
        insert_row(db.connection(), incident).await
    }

    async fn clear_all(&self) -> Result<u64> {
        let db = self.db.lock().await;
        let removed = db.connection().execute("DELETE FROM incidents", ()).await?;
        Ok(removed)
    }

    async fn count(&self) -> Result<u64> {
        let db = self.db.lock().await;
        count_rows(db.connection()).await
    }
}

async fn insert_row(conn: &Connection, incident: NewIncident) -> Result<IncidentRecord> {
    let record = incident.into_record(IncidentId::new(), unix_millis_now());

    conn.execute(
        "INSERT INTO incidents (id, location_name, latitude, longitude, reporter_name,
         description, category, contact_info, image_data, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            record.id.as_str(),
            record.location_name.clone(),
            record.position.latitude,
            record.position.longitude,
            record.reporter_name.clone(),
            record.description.clone(),
            record.category.as_str().to_string(),
            optional_value(record.contact_info.as_deref()),
            optional_value(record.image_data.as_deref()),
            record.created_at
        ],
    )
    .await?;

    Ok(record)
}

async fn count_rows(conn: &Connection) -> Result<u64> {
    let mut rows = conn.query("SELECT COUNT(*) FROM incidents", ()).await?;
    let count: i64 = match rows.next().await? {
        Some(row) => row.get(0)?,
        None => 0,
    };
    Ok(u64::try_from(count).unwrap_or_default())
}

fn optional_value(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

fn optional_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx)? {
        Value::Text(text) => Ok(Some(text)),
        _ => Ok(None),
    }
}
