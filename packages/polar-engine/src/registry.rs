//! # registry
//!
//! In-memory set of known polar tables plus the two roles a table can play:
//! - **active**: the table performance queries run against
//! - **dynamic**: the one table the updater mutates
//!
//! Tables are held as `Arc`s. Readers clone the `Arc` and query without holding any
//! lock; replacing a table swaps the pointer, and mutating the dynamic table while a
//! reader still holds the old `Arc` copies it first (`Arc::make_mut`).

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::PolarError;
use crate::table::PolarTable;

#[derive(Debug, Default, Clone)]
pub struct TableRegistry {
    tables: HashMap<Uuid, Arc<PolarTable>>,
    active: Option<Uuid>,
    dynamic: Option<Uuid>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace a table. Returns the table it replaced.
    pub fn insert(&mut self, table: PolarTable) -> Option<Arc<PolarTable>> {
        self.tables.insert(table.id, Arc::new(table))
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<PolarTable>> {
        self.tables.get(&id).cloned()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.tables.contains_key(&id)
    }

    /// All tables, ordered by name.
    pub fn list(&self) -> Vec<Arc<PolarTable>> {
        let mut tables: Vec<_> = self.tables.values().cloned().collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        tables
    }

    /// Remove a table; it stops being active/dynamic if it was.
    pub fn remove(&mut self, id: Uuid) -> Option<Arc<PolarTable>> {
        if self.active == Some(id) {
            self.active = None;
        }
        if self.dynamic == Some(id) {
            self.dynamic = None;
        }
        self.tables.remove(&id)
    }

    pub fn active(&self) -> Option<Arc<PolarTable>> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn active_id(&self) -> Option<Uuid> {
        self.active
    }

    pub fn set_active(&mut self, id: Uuid) -> Result<(), PolarError> {
        if !self.contains(id) {
            return Err(PolarError::LookupMiss("polar table"));
        }
        self.active = Some(id);
        Ok(())
    }

    /// Install the table the updater will grow.
    pub fn set_dynamic(&mut self, table: PolarTable) {
        self.dynamic = Some(table.id);
        self.insert(table);
    }

    pub fn dynamic_id(&self) -> Option<Uuid> {
        self.dynamic
    }

    pub fn dynamic_mut(&mut self) -> Option<&mut PolarTable> {
        let id = self.dynamic?;
        self.tables.get_mut(&id).map(Arc::make_mut)
    }
}
