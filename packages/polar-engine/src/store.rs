//! Storage capability for polar tables.
//!
//! The engine never talks to a database; whoever owns it picks a backend. Calls are
//! blocking, async callers run them on a blocking worker.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use uuid::Uuid;

use crate::error::StoreError;
use crate::table::PolarTable;

pub trait TableStore: Send + Sync {
    fn load(&self, id: Uuid) -> Result<Option<PolarTable>, StoreError>;
    fn save(&self, id: Uuid, table: &PolarTable) -> Result<(), StoreError>;
    fn list_tables(&self) -> Result<Vec<PolarTable>, StoreError>;
    /// Returns whether a table was removed.
    fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Volatile backend, for tests and for running without persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<Uuid, PolarTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TableStore for MemoryStore {
    fn load(&self, id: Uuid) -> Result<Option<PolarTable>, StoreError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.get(&id).cloned())
    }

    fn save(&self, id: Uuid, table: &PolarTable) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables.insert(id, table.clone());
        Ok(())
    }

    fn list_tables(&self) -> Result<Vec<PolarTable>, StoreError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.values().cloned().collect())
    }

    fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.remove(&id).is_some())
    }
}
