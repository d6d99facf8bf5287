//! StateStore and ObjectStore — redb-backed record persistence.
//!
//! [`StateStore`] opens the database; [`ObjectStore`] provides typed
//! operations over one record table. All values are JSON-serialized into
//! redb's `&[u8]` value columns. The store supports both on-disk and
//! in-memory backends (the latter for testing and standalone runs).
//!
//! Writers are serialized by redb's single write transaction, so every
//! mutating call (including the scan inside [`ObjectStore::insert_if_absent`])
//! is atomic with respect to every other call. Readers see a consistent
//! snapshot and never block writers.

use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::record::Record;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

/// Thread-safe handle to the vmgrid database.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        debug!(?path, "state store opened");
        Ok(Self { db: Arc::new(db) })
    }

    /// Create an ephemeral in-memory store.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        debug!("in-memory state store opened");
        Ok(Self { db: Arc::new(db) })
    }

    /// Typed view over the table for `T`, creating the table if absent.
    pub fn objects<T: Record>(&self) -> StateResult<ObjectStore<T>> {
        let table: Table = TableDefinition::new(T::TABLE);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(table).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(ObjectStore {
            db: self.db.clone(),
            table,
            _record: PhantomData,
        })
    }
}

/// Typed key → record index over one redb table.
pub struct ObjectStore<T> {
    db: Arc<Database>,
    table: Table,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for ObjectStore<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            table: self.table,
            _record: PhantomData,
        }
    }
}

impl<T: Record> ObjectStore<T> {
    /// Insert a new record. Fails with [`StateError::Duplicate`] if the key
    /// is already present; use [`put`](Self::put) to overwrite.
    pub fn add(&self, record: &T) -> StateResult<()> {
        let key = record.key();
        let value = encode(record)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(self.table).map_err(map_err!(Table))?;
            if table.get(key).map_err(map_err!(Read))?.is_some() {
                return Err(StateError::Duplicate(key.to_string()));
            }
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(table = T::TABLE, %key, "record added");
        Ok(())
    }

    /// Insert or overwrite a record.
    pub fn put(&self, record: &T) -> StateResult<()> {
        let key = record.key();
        let value = encode(record)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(self.table).map_err(map_err!(Table))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(table = T::TABLE, %key, "record stored");
        Ok(())
    }

    /// Overwrite `expected` with `record` (same key) only if the stored
    /// value still equals `expected`. Fails with [`StateError::Stale`] when
    /// the record changed or disappeared in between.
    pub fn replace(&self, expected: &T, record: &T) -> StateResult<()> {
        let key = record.key();
        let before = encode(expected)?;
        let value = encode(record)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(self.table).map_err(map_err!(Table))?;
            let current = table
                .get(expected.key())
                .map_err(map_err!(Read))?
                .map(|guard| guard.value().to_vec());
            if expected.key() != key || current.as_deref() != Some(before.as_slice()) {
                return Err(StateError::Stale(key.to_string()));
            }
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(table = T::TABLE, %key, "record replaced");
        Ok(())
    }

    /// Insert `record` unless a live record already carries the same value
    /// in `field`. The scan and the insert share one write transaction.
    pub fn insert_if_absent(&self, field: &str, record: &T) -> StateResult<()> {
        let key = record.key();
        let wanted = record.field(field).unwrap_or_default().to_string();
        let value = encode(record)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(self.table).map_err(map_err!(Table))?;
            let mut taken = table.get(key).map_err(map_err!(Read))?.is_some();
            if !taken {
                for entry in table.iter().map_err(map_err!(Read))? {
                    let (_, value) = entry.map_err(map_err!(Read))?;
                    let existing: T = decode(value.value())?;
                    if existing.field(field) == Some(wanted.as_str()) {
                        taken = true;
                        break;
                    }
                }
            }
            if taken {
                return Err(StateError::Conflict {
                    field: field.to_string(),
                    value: wanted,
                });
            }
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(table = T::TABLE, %key, %field, "record inserted");
        Ok(())
    }

    /// Get a record by key.
    pub fn get(&self, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(self.table).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Delete a record by key. Returns true if it existed.
    pub fn delete(&self, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(self.table).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(table = T::TABLE, %key, existed, "record deleted");
        Ok(existed)
    }

    /// List every record. Order is unspecified.
    pub fn list(&self) -> StateResult<Vec<T>> {
        self.list_where(|_| true)
    }

    /// List records matching a typed predicate.
    pub fn list_where(&self, mut pred: impl FnMut(&T) -> bool) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(self.table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: T = decode(value.value())?;
            if pred(&record) {
                results.push(record);
            }
        }
        Ok(results)
    }

    /// First record whose `field` equals `value` exactly, if any.
    pub fn list_filter(&self, field: &str, value: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(self.table).map_err(map_err!(Table))?;
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, raw) = entry.map_err(map_err!(Read))?;
            let record: T = decode(raw.value())?;
            if record.field(field) == Some(value) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Every record whose `field` equals `value` exactly.
    pub fn list_filter_many(&self, field: &str, value: &str) -> StateResult<Vec<T>> {
        self.list_where(|r| r.field(field) == Some(value))
    }
}

fn encode<T: Record>(record: &T) -> StateResult<Vec<u8>> {
    serde_json::to_vec(record).map_err(map_err!(Serialize))
}

fn decode<T: Record>(raw: &[u8]) -> StateResult<T> {
    serde_json::from_slice(raw).map_err(map_err!(Deserialize))
}
