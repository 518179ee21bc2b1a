//! File-backed store
//!
//! Records live in a redb database with one table keyed by record key.
//! Every call opens the database, runs one transaction and closes it again,
//! so the exclusive file lock is only held for the length of a call and
//! separate processes can share the file.

use async_trait::async_trait;
use redb::{
    Database, DatabaseError, ReadableDatabase, ReadableTable, TableDefinition, TableError,
};
use resgpu_core::{ResgpuError, ResgpuResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::traits::{KeyValue, Store};

/// Node records keyed by `{prefix}/{nodename}`.
const RECORDS: TableDefinition<&str, &str> = TableDefinition::new("records");

/// How often a locked database is retried before giving up
const OPEN_ATTEMPTS: u32 = 500;
const OPEN_BACKOFF: Duration = Duration::from_millis(10);

/// Convert any `Display` error into a store error
fn store_err(e: impl std::fmt::Display) -> ResgpuError {
    ResgpuError::Store(e.to_string())
}

/// Store persisting records to a redb database file
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store over `path`; the database is created on first use
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing database
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` against the open database.
    ///
    /// A database held open by another handle or process is retried with a
    /// short backoff.
    async fn with_db<T, F>(&self, op: F) -> ResgpuResult<T>
    where
        T: Send + 'static,
        F: Fn(&Database) -> Result<T, redb::Error> + Send + Sync + 'static,
    {
        let op = Arc::new(op);
        for _ in 0..OPEN_ATTEMPTS {
            let path = self.path.clone();
            let op = op.clone();
            let attempt = tokio::task::spawn_blocking(move || -> ResgpuResult<Option<T>> {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                match Database::create(&path) {
                    Ok(db) => op(&db).map(Some).map_err(store_err),
                    Err(DatabaseError::DatabaseAlreadyOpen) => Ok(None),
                    Err(e) => Err(ResgpuError::Store(format!(
                        "Failed to open {}: {}",
                        path.display(),
                        e
                    ))),
                }
            })
            .await
            .map_err(store_err)??;

            if let Some(value) = attempt {
                return Ok(value);
            }
            tokio::time::sleep(OPEN_BACKOFF).await;
        }
        Err(ResgpuError::Store(format!(
            "{} stayed locked by another handle",
            self.path.display()
        )))
    }
}

#[async_trait]
impl Store for FileStore {
    async fn get(&self, key: &str) -> ResgpuResult<Vec<KeyValue>> {
        let key = key.to_string();
        self.with_db(move |db| {
            let txn = db.begin_read()?;
            let table = match txn.open_table(RECORDS) {
                Ok(table) => table,
                Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            };
            Ok(table
                .get(key.as_str())?
                .map(|guard| vec![KeyValue::new(key.as_str(), guard.value())])
                .unwrap_or_default())
        })
        .await
    }

    async fn put(&self, key: &str, value: String) -> ResgpuResult<()> {
        let owned = key.to_string();
        self.with_db(move |db| {
            let txn = db.begin_write()?;
            {
                let mut table = txn.open_table(RECORDS)?;
                table.insert(owned.as_str(), value.as_str())?;
            }
            txn.commit()?;
            Ok(())
        })
        .await?;
        debug!(key = key, path = %self.path.display(), "Stored record");
        Ok(())
    }

    async fn delete(&self, key: &str) -> ResgpuResult<()> {
        let owned = key.to_string();
        let existed = self
            .with_db(move |db| {
                let txn = db.begin_write()?;
                let existed;
                {
                    let mut table = txn.open_table(RECORDS)?;
                    existed = table.remove(owned.as_str())?.is_some();
                }
                txn.commit()?;
                Ok(existed)
            })
            .await?;
        if existed {
            info!(key = key, path = %self.path.display(), "Deleted record");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
