//! Record store abstraction and its libSQL implementation.
//!
//! [`RecordStore`] is the key-value surface the pipeline consumes: one
//! amendment table per [`Partition`] plus a shared bill table. [`Storage`]
//! backs it with an embedded libSQL database; [`MemoryStore`] is an
//! in-process double with failure injection for tests.
//!
//! **Access rules:**
//! - `amendwatch run`: read-write via [`Storage::open`]
//! - `amendwatch list` / `bills`: read-only via [`Storage::open_readonly`]

mod memory;
mod migrations;

use std::path::Path;

use amendwatch_shared::{AmendWatchError, AmendmentRecord, BillEntry, Partition, Result};
use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database, params};
use tokio::sync::Mutex;

pub use memory::MemoryStore;

/// Largest batch accepted by [`RecordStore::batch_write_amendments`].
pub const MAX_BATCH_WRITE: usize = 25;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Key-value operations used by reconciliation and bill resolution.
///
/// Writes have overwrite semantics: writing an existing key replaces it.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every amendment currently stored for `partition`.
    async fn scan_amendments(&self, partition: Partition) -> Result<Vec<AmendmentRecord>>;

    /// Point lookup of one amendment.
    async fn get_amendment(
        &self,
        partition: Partition,
        lco_number: &str,
    ) -> Result<Option<AmendmentRecord>>;

    /// Write up to [`MAX_BATCH_WRITE`] amendments atomically.
    async fn batch_write_amendments(
        &self,
        partition: Partition,
        records: &[AmendmentRecord],
    ) -> Result<()>;

    /// Point lookup of one bill.
    async fn get_bill(&self, bill_number: &str) -> Result<Option<BillEntry>>;

    /// Write one bill.
    async fn put_bill(&self, entry: &BillEntry) -> Result<()>;

    /// Every stored bill, ordered by bill number.
    async fn list_bills(&self) -> Result<Vec<BillEntry>>;
}

/// Reject batches the store cannot take in one write.
pub(crate) fn check_batch_size(records: &[AmendmentRecord]) -> Result<()> {
    if records.len() > MAX_BATCH_WRITE {
        return Err(AmendWatchError::validation(format!(
            "batch of {} exceeds limit of {MAX_BATCH_WRITE}",
            records.len()
        )));
    }
    Ok(())
}

fn table_name(partition: Partition) -> &'static str {
    match partition {
        Partition::Senate => "senate_amendments",
        Partition::House => "house_amendments",
    }
}

// ---------------------------------------------------------------------------
// libSQL storage
// ---------------------------------------------------------------------------

/// Primary storage handle wrapping a libSQL database.
///
/// All writes share one connection, so they are serialized through
/// `write_lock`: a transaction on the connection must not interleave with
/// another task's statements.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    write_lock: Mutex<()>,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AmendWatchError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AmendWatchError::StoreRead(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| AmendWatchError::StoreRead(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            write_lock: Mutex::new(()),
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AmendWatchError::StoreRead(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AmendWatchError::StoreRead(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| AmendWatchError::StoreRead(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            write_lock: Mutex::new(()),
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    AmendWatchError::StoreWrite(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(AmendWatchError::StoreWrite(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for Storage {
    async fn scan_amendments(&self, partition: Partition) -> Result<Vec<AmendmentRecord>> {
        let sql = format!(
            "SELECT calendar_number, lco_number, lco_document_link, bill_number, bill_link, date
             FROM {} ORDER BY rowid",
            table_name(partition)
        );
        let mut rows = self
            .conn
            .query(&sql, params![])
            .await
            .map_err(|e| AmendWatchError::StoreRead(e.to_string()))?;

        let mut results = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => results.push(row_to_amendment(&row)?),
                Ok(None) => break,
                Err(e) => return Err(AmendWatchError::StoreRead(e.to_string())),
            }
        }
        Ok(results)
    }

    async fn get_amendment(
        &self,
        partition: Partition,
        lco_number: &str,
    ) -> Result<Option<AmendmentRecord>> {
        let sql = format!(
            "SELECT calendar_number, lco_number, lco_document_link, bill_number, bill_link, date
             FROM {} WHERE lco_number = ?1",
            table_name(partition)
        );
        let mut rows = self
            .conn
            .query(&sql, params![lco_number])
            .await
            .map_err(|e| AmendWatchError::StoreRead(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_amendment(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(AmendWatchError::StoreRead(e.to_string())),
        }
    }

    async fn batch_write_amendments(
        &self,
        partition: Partition,
        records: &[AmendmentRecord],
    ) -> Result<()> {
        self.check_writable()?;
        check_batch_size(records)?;
        if records.is_empty() {
            return Ok(());
        }

        let sql = format!(
            "INSERT INTO {} (lco_number, calendar_number, lco_document_link, bill_number, bill_link, date, first_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(lco_number) DO UPDATE SET
               calendar_number = excluded.calendar_number,
               lco_document_link = excluded.lco_document_link,
               bill_number = excluded.bill_number,
               bill_link = excluded.bill_link,
               date = excluded.date",
            table_name(partition)
        );
        let now = Utc::now().to_rfc3339();

        let _guard = self.write_lock.lock().await;
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| AmendWatchError::StoreWrite(e.to_string()))?;

        for record in records {
            tx.execute(
                &sql,
                params![
                    record.lco_number.as_str(),
                    record.calendar_number.as_str(),
                    record.lco_document_link.as_str(),
                    record.bill_number.as_str(),
                    record.bill_document_link.as_str(),
                    record.date.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(|e| AmendWatchError::StoreWrite(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| AmendWatchError::StoreWrite(e.to_string()))?;
        Ok(())
    }

    async fn get_bill(&self, bill_number: &str) -> Result<Option<BillEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT bill_number, bill_link, document_links_json FROM bills WHERE bill_number = ?1",
                params![bill_number],
            )
            .await
            .map_err(|e| AmendWatchError::StoreRead(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_bill(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(AmendWatchError::StoreRead(e.to_string())),
        }
    }

    async fn put_bill(&self, entry: &BillEntry) -> Result<()> {
        self.check_writable()?;
        let links = serde_json::to_string(&entry.document_links)
            .map_err(|e| AmendWatchError::StoreWrite(format!("encode document links: {e}")))?;
        let now = Utc::now().to_rfc3339();

        let _guard = self.write_lock.lock().await;
        self.conn
            .execute(
                "INSERT INTO bills (bill_number, bill_link, document_links_json, resolved_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(bill_number) DO UPDATE SET
                   bill_link = excluded.bill_link,
                   document_links_json = excluded.document_links_json,
                   resolved_at = excluded.resolved_at",
                params![
                    entry.bill_number.as_str(),
                    entry.bill_link.as_str(),
                    links.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| AmendWatchError::StoreWrite(e.to_string()))?;
        Ok(())
    }

    async fn list_bills(&self) -> Result<Vec<BillEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT bill_number, bill_link, document_links_json FROM bills ORDER BY bill_number",
                params![],
            )
            .await
            .map_err(|e| AmendWatchError::StoreRead(e.to_string()))?;

        let mut results = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => results.push(row_to_bill(&row)?),
                Ok(None) => break,
                Err(e) => return Err(AmendWatchError::StoreRead(e.to_string())),
            }
        }
        Ok(results)
    }
}

/// Convert a database row to an [`AmendmentRecord`].
fn row_to_amendment(row: &libsql::Row) -> Result<AmendmentRecord> {
    let col = |idx: i32| {
        row.get::<String>(idx)
            .map_err(|e| AmendWatchError::StoreRead(e.to_string()))
    };
    Ok(AmendmentRecord {
        calendar_number: col(0)?,
        lco_number: col(1)?,
        lco_document_link: col(2)?,
        bill_number: col(3)?,
        bill_document_link: col(4)?,
        date: col(5)?,
    })
}

/// Convert a database row to a [`BillEntry`].
fn row_to_bill(row: &libsql::Row) -> Result<BillEntry> {
    let links: String = row
        .get(2)
        .map_err(|e| AmendWatchError::StoreRead(e.to_string()))?;
    Ok(BillEntry {
        bill_number: row
            .get::<String>(0)
            .map_err(|e| AmendWatchError::StoreRead(e.to_string()))?,
        bill_link: row
            .get::<String>(1)
            .map_err(|e| AmendWatchError::StoreRead(e.to_string()))?,
        document_links: serde_json::from_str(&links)
            .map_err(|e| AmendWatchError::StoreRead(format!("invalid document links: {e}")))?,
    })
}
