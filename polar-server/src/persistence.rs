//! # persistence
//!
//! One JSON file per table, `<data_dir>/<uuid>.json`, holding `{ "<uuid>": table }`.
//! Writes go to a temp file and are renamed into place so a crash never leaves a
//! half-written table. Unreadable files are skipped with a warning at load time.
//!
//! Dynamic table snapshots go through [`Persister`], a single writer task, so an
//! older snapshot can never land on disk after a newer one.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use polar_engine::{PolarTable, StoreError, TableStore};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (and create if needed) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn read_file(path: &Path) -> Result<PolarTable, StoreError> {
        let text = fs::read_to_string(path)?;
        let mut wrapper: Map<String, Value> = serde_json::from_str(&text)?;
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let id = Uuid::parse_str(stem).map_err(|e| StoreError::Corrupt(Uuid::nil(), e.to_string()))?;
        let value = wrapper
            .remove(stem)
            .ok_or_else(|| StoreError::Corrupt(id, "missing table entry".to_string()))?;
        let table: PolarTable = serde_json::from_value(value)?;
        if table.id != id {
            return Err(StoreError::Corrupt(id, format!("file holds table {}", table.id)));
        }
        Ok(table)
    }
}

impl TableStore for JsonFileStore {
    fn load(&self, id: Uuid) -> Result<Option<PolarTable>, StoreError> {
        match Self::read_file(&self.path_for(id)) {
            Ok(table) => Ok(Some(table)),
            Err(StoreError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, id: Uuid, table: &PolarTable) -> Result<(), StoreError> {
        let mut wrapper = Map::new();
        wrapper.insert(id.to_string(), serde_json::to_value(table)?);
        let json = serde_json::to_string_pretty(&wrapper)?;

        let path = self.path_for(id);
        // unique per write, concurrent saves of one table must not share it
        let tmp = path.with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));
        fs::write(&tmp, json)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!("Saved polar table {id} to {}", path.display());
        Ok(())
    }

    fn list_tables(&self) -> Result<Vec<PolarTable>, StoreError> {
        let mut tables = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_file(&path) {
                Ok(table) => tables.push(table),
                Err(e) => warn!("Skipping unreadable polar file {}: {e}", path.display()),
            }
        }
        Ok(tables)
    }

    fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Background writer for table snapshots.
///
/// Snapshots are written one at a time in the order they were handed in. When the
/// disk falls behind, queued snapshots of the same table collapse to the newest.
/// Failures are logged; the in-memory table stays authoritative and the next
/// improvement retries the write.
#[derive(Clone)]
pub struct Persister {
    tx: mpsc::UnboundedSender<Arc<PolarTable>>,
}

impl Persister {
    /// Start the writer task. Must be called inside a tokio runtime.
    pub fn spawn(store: Arc<dyn TableStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Arc<PolarTable>>();
        tokio::spawn(async move {
            while let Some(first) = rx.recv().await {
                let mut order = vec![first.id];
                let mut pending = HashMap::from([(first.id, first)]);
                while let Ok(next) = rx.try_recv() {
                    if !pending.contains_key(&next.id) {
                        order.push(next.id);
                    }
                    pending.insert(next.id, next);
                }

                for id in order {
                    let Some(table) = pending.remove(&id) else { continue };
                    let store = store.clone();
                    let saved = tokio::task::spawn_blocking(move || {
                        store.save(table.id, &table).map_err(|e| (table, e))
                    })
                    .await;
                    match saved {
                        Ok(Ok(())) => {}
                        Ok(Err((table, e))) => {
                            warn!("Failed to persist polar table {} ({}): {e}", table.name, table.id)
                        }
                        Err(e) => warn!("Persist task for polar table {id} failed: {e}"),
                    }
                }
            }
            debug!("Persister stopped");
        });
        Self { tx }
    }

    /// Queue a snapshot for writing.
    pub fn persist(&self, table: Arc<PolarTable>) {
        if self.tx.send(table).is_err() {
            warn!("Persister is gone, snapshot dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polar_engine::{AngleEntry, WindSpeedBucket};

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("polar-store-{}", Uuid::new_v4()))
    }

    fn table(name: &str) -> PolarTable {
        PolarTable::new(
            Uuid::new_v4(),
            name,
            "test",
            vec![WindSpeedBucket::new(4.0, vec![AngleEntry::with_speed(0.8, 2.5)])],
        )
    }

    #[test]
    fn test_save_load_list_delete() {
        let dir = scratch_dir();
        let store = JsonFileStore::open(&dir).unwrap();
        let t = table("Design");

        store.save(t.id, &t).unwrap();
        let loaded = store.load(t.id).unwrap().unwrap();
        assert_eq!(loaded.id, t.id);
        assert_eq!(loaded.name, "Design");
        assert_eq!(loaded.data_points(), 1);
        assert_eq!(store.list_tables().unwrap().len(), 1);

        assert!(store.delete(t.id).unwrap());
        assert!(!store.delete(t.id).unwrap());
        assert!(store.load(t.id).unwrap().is_none());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_file_is_wrapped_by_uuid() {
        let dir = scratch_dir();
        let store = JsonFileStore::open(&dir).unwrap();
        let t = table("Design");
        store.save(t.id, &t).unwrap();

        let raw: Value =
            serde_json::from_str(&fs::read_to_string(dir.join(format!("{}.json", t.id))).unwrap()).unwrap();
        assert_eq!(raw[t.id.to_string()]["name"], "Design");

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_concurrent_saves_of_one_table() {
        let dir = scratch_dir();
        let store = JsonFileStore::open(&dir).unwrap();
        let t = table("Design");

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..20 {
                        store.save(t.id, &t).unwrap();
                    }
                });
            }
        });

        assert_eq!(store.load(t.id).unwrap().unwrap().name, "Design");
        let leftovers: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());

        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_persister_keeps_the_newest_snapshot() {
        let dir = scratch_dir();
        let store = Arc::new(JsonFileStore::open(&dir).unwrap());
        let persister = Persister::spawn(store.clone());

        let mut t = table("Dynamic");
        for i in 0..10 {
            t.description = format!("v{i}");
            persister.persist(Arc::new(t.clone()));
        }

        let mut latest = None;
        for _ in 0..100 {
            latest = store.load(t.id).unwrap().map(|saved| saved.description);
            if latest.as_deref() == Some("v9") {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(latest.as_deref(), Some("v9"));

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_corrupt_files_are_skipped() {
        let dir = scratch_dir();
        let store = JsonFileStore::open(&dir).unwrap();
        let t = table("Good");
        store.save(t.id, &t).unwrap();
        fs::write(dir.join(format!("{}.json", Uuid::new_v4())), "{ not json").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let tables = store.list_tables().unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "Good");

        fs::remove_dir_all(dir).unwrap();
    }
}
