use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use chrono::{DateTime, Utc};

use crate::{Result, StoreError};

/// A record kept in a [`Table`].
pub trait Record: Clone + Send + Sync + 'static {
    /// Key identifying a record within its table.
    type Key: Clone + Eq + Hash + Debug + Send + Sync;

    /// Table name used in error messages and logs.
    const TABLE: &'static str;

    /// Returns the record's key.
    fn key(&self) -> Self::Key;

    /// Creation time, used to list records in a stable order.
    fn created_at(&self) -> DateTime<Utc>;
}

/// A keyed collection of records of one kind.
#[derive(Debug, Clone)]
pub struct Table<R: Record> {
    rows: HashMap<R::Key, R>,
}

impl<R: Record> Default for Table<R> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }
}

impl<R: Record> Table<R> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new record, failing if its key is already present.
    pub fn insert(&mut self, record: R) -> Result<&R> {
        let key = record.key();
        if self.rows.contains_key(&key) {
            return Err(StoreError::DuplicateKey {
                table: R::TABLE,
                key: format!("{key:?}"),
            });
        }
        Ok(self.rows.entry(key).or_insert(record))
    }

    /// Returns the record for `key`, inserting the one built by `make` if absent.
    ///
    /// The boolean is `true` when a record was created.
    pub fn get_or_insert_with(&mut self, key: R::Key, make: impl FnOnce() -> R) -> (&mut R, bool) {
        let mut created = false;
        let record = self.rows.entry(key).or_insert_with(|| {
            created = true;
            make()
        });
        (record, created)
    }

    pub fn get(&self, key: &R::Key) -> Option<&R> {
        self.rows.get(key)
    }

    pub fn get_mut(&mut self, key: &R::Key) -> Option<&mut R> {
        self.rows.get_mut(key)
    }

    /// Applies `change` to an existing record.
    pub fn update(&mut self, key: &R::Key, change: impl FnOnce(&mut R)) -> Result<&R> {
        let record = self.rows.get_mut(key).ok_or_else(|| StoreError::MissingKey {
            table: R::TABLE,
            key: format!("{key:?}"),
        })?;
        change(record);
        Ok(record)
    }

    pub fn remove(&mut self, key: &R::Key) -> Option<R> {
        self.rows.remove(key)
    }

    pub fn contains(&self, key: &R::Key) -> bool {
        self.rows.contains_key(key)
    }

    /// Returns the first record (in creation order) matching `predicate`.
    pub fn find(&self, predicate: impl Fn(&R) -> bool) -> Option<&R> {
        self.all().into_iter().find(|r| predicate(r))
    }

    /// Returns all records matching `predicate`, in creation order.
    pub fn filter(&self, predicate: impl Fn(&R) -> bool) -> Vec<&R> {
        self.all().into_iter().filter(|r| predicate(r)).collect()
    }

    /// Returns all records in creation order.
    pub fn all(&self) -> Vec<&R> {
        let mut rows: Vec<&R> = self.rows.values().collect();
        rows.sort_by_key(|r| r.created_at());
        rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
