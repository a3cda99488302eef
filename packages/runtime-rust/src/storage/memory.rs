//! In-memory [`StoragePort`] implementation backed by [`DashMap`].
//!
//! Suitable for tests, demos, and client-side caches where all data fits in
//! memory. Each record class is a table; rows are keyed by their primary-key
//! value, compared by value and kind (`Int(1)` and `String("1")` are distinct
//! keys), and kept in insertion order. Raw SQL is not supported.

use async_trait::async_trait;
use dashmap::DashMap;
use scene_core::ids::new_id;
use scene_core::{Fields, Record, RecordClass, Value};

use crate::scene::Scene;
use crate::traits::{SqlHints, StoragePort};

/// Failures reported by [`MemoryStorage`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("`{class}` record with key {key} already exists")]
    Duplicate { class: String, key: String },
    #[error("`{class}` record with key {key} does not exist")]
    Missing { class: String, key: String },
    #[error("`{class}` record has no primary key `{primary_key}`")]
    NoPrimaryKey { class: String, primary_key: String },
    #[error("raw SQL is not supported by the in-memory storage")]
    SqlUnsupported,
}

/// Rows of one record class, in insertion order.
#[derive(Default)]
struct Table {
    rows: Vec<(Value, Record)>,
}

impl Table {
    fn position(&self, key: &Value) -> Option<usize> {
        self.rows.iter().position(|(k, _)| k == key)
    }
}

/// In-memory storage keyed by record class name.
pub struct MemoryStorage {
    tables: DashMap<String, Table>,
}

impl MemoryStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
        }
    }

    /// Number of stored records of `class`.
    #[must_use]
    pub fn len(&self, class: &RecordClass) -> usize {
        self.tables.get(&class.name).map_or(0, |t| t.rows.len())
    }

    /// Returns `true` if no record of any class is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(|t| t.rows.is_empty())
    }

    fn key_of(record: &Record) -> Result<Value, StorageError> {
        record
            .id()
            .cloned()
            .ok_or_else(|| StorageError::NoPrimaryKey {
                class: record.class.name.clone(),
                primary_key: record.class.primary_key.clone(),
            })
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoragePort for MemoryStorage {
    async fn insert(
        &self,
        _scene: &Scene,
        class: &RecordClass,
        mut fields: Fields,
    ) -> anyhow::Result<Record> {
        fields
            .entry(class.primary_key.clone())
            .or_insert_with(|| Value::String(new_id()));
        let record = Record::new(class.clone(), fields);
        let key = Self::key_of(&record)?;

        let mut table = self.tables.entry(class.name.clone()).or_default();
        if table.position(&key).is_some() {
            return Err(StorageError::Duplicate {
                class: class.name.clone(),
                key: key.to_string(),
            }
            .into());
        }
        table.rows.push((key, record.clone()));
        Ok(record)
    }

    async fn update(&self, _scene: &Scene, record: &Record) -> anyhow::Result<()> {
        let key = Self::key_of(record)?;
        let missing = || StorageError::Missing {
            class: record.class.name.clone(),
            key: key.to_string(),
        };
        let mut table = self.tables.get_mut(&record.class.name).ok_or_else(missing)?;
        let index = table.position(&key).ok_or_else(missing)?;
        table.rows[index].1 = record.clone();
        Ok(())
    }

    async fn delete(&self, _scene: &Scene, record: &Record) -> anyhow::Result<()> {
        let key = Self::key_of(record)?;
        let missing = || StorageError::Missing {
            class: record.class.name.clone(),
            key: key.to_string(),
        };
        let mut table = self.tables.get_mut(&record.class.name).ok_or_else(missing)?;
        let index = table.position(&key).ok_or_else(missing)?;
        table.rows.remove(index);
        Ok(())
    }

    async fn query_by_example(
        &self,
        _scene: &Scene,
        class: &RecordClass,
        example: &Fields,
    ) -> anyhow::Result<Vec<Record>> {
        let Some(table) = self.tables.get(&class.name) else {
            return Ok(Vec::new());
        };
        Ok(table
            .rows
            .iter()
            .filter(|(_, record)| record.matches(example))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn execute_sql(
        &self,
        _scene: &Scene,
        _sql: &str,
        _vars: &[Value],
        _hints: &SqlHints,
    ) -> anyhow::Result<Vec<Fields>> {
        Err(StorageError::SqlUnsupported.into())
    }
}
