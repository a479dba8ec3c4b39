//! # bootstrap
//!
//! Assemble the table registry at startup from three sources, in order:
//!
//! 1. tables already in the store
//! 2. `[[static]]` tables from the config (imported when missing, or always with
//!    `update_tables = true`)
//! 3. the dynamic table, reused from the store only if it still has the configured grid
//!
//! A table that fails to load or import is logged and skipped; startup never aborts
//! because of one bad table.

use std::path::Path;

use anyhow::Result;
use polar_engine::{build_table, PolarTable, TableRegistry, TableStore};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{Config, StaticTableConfig};

pub fn load_registry(config: &Config, store: &dyn TableStore, base_dir: &Path) -> Result<TableRegistry> {
    let mut registry = TableRegistry::new();

    for table in store.list_tables()? {
        match table.validate() {
            Ok(()) => {
                registry.insert(table);
            }
            Err(e) => warn!("Ignoring stored polar {} ({}): {e}", table.name, table.id),
        }
    }
    info!("Loaded {} polar table(s) from the store", registry.list().len());

    for table_cfg in &config.static_tables {
        import_static(&mut registry, store, table_cfg, base_dir, config.update_tables);
    }

    if config.dynamic.enabled {
        let grid = config.dynamic.grid()?;
        let id = config.dynamic.table_id();
        let table = match registry.get(id) {
            Some(stored) if grid.matches(&stored) => {
                info!("Resuming dynamic polar {} with {} data points", stored.name, stored.data_points());
                let mut table = PolarTable::clone(&stored);
                table.name = config.dynamic.name.clone();
                table.description = config.dynamic.description.clone();
                table
            }
            stored => {
                if stored.is_some() {
                    warn!("Stored dynamic polar {id} has a different grid, starting a new one");
                }
                let table = grid.empty_table(id, &config.dynamic.name, &config.dynamic.description);
                save(store, &table);
                table
            }
        };
        registry.set_dynamic(table);
    }

    let active = pick_active(config, &registry);
    if let Some(id) = active {
        registry.set_active(id)?;
    }
    match registry.active() {
        Some(t) => info!("Active polar: {} ({})", t.name, t.id),
        None => warn!("No polar table available, performance output disabled"),
    }

    Ok(registry)
}

fn import_static(
    registry: &mut TableRegistry,
    store: &dyn TableStore,
    table_cfg: &StaticTableConfig,
    base_dir: &Path,
    force: bool,
) {
    let id = table_cfg.table_id();
    if registry.contains(id) && !force {
        return;
    }

    let built = table_cfg
        .read_text(base_dir)
        .and_then(|text| {
            build_table(id, &table_cfg.name, &table_cfg.description, &text, &table_cfg.import_options()).map_err(Into::into)
        });
    match built {
        Ok(table) => {
            info!("Imported static polar {} ({} data points)", table.name, table.data_points());
            save(store, &table);
            registry.insert(table);
        }
        Err(e) if registry.contains(id) => {
            warn!("Re-import of static polar {} failed, keeping stored version: {e:#}", table_cfg.name)
        }
        Err(e) => warn!("Import of static polar {} failed: {e:#}", table_cfg.name),
    }
}

fn save(store: &dyn TableStore, table: &PolarTable) {
    if let Err(e) = store.save(table.id, table) {
        warn!("Failed to persist polar table {} ({}): {e}", table.name, table.id);
    }
}

/// Configured table if it exists, else the dynamic one, else the first static table,
/// else whatever sorts first.
fn pick_active(config: &Config, registry: &TableRegistry) -> Option<Uuid> {
    if let Some(id) = config.server.active_table {
        if registry.contains(id) {
            return Some(id);
        }
        warn!("Configured active polar {id} does not exist");
    }
    registry
        .dynamic_id()
        .or_else(|| {
            config
                .static_tables
                .iter()
                .map(StaticTableConfig::table_id)
                .find(|id| registry.contains(*id))
        })
        .or_else(|| registry.list().first().map(|t| t.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polar_engine::{AngleEntry, MemoryStore, WindSpeedBucket};

    const DESIGN: &str = "twa/tws;5;10\n45;4.0;6.0\n90;5.0;7.0\n";

    fn config(text: &str) -> Config {
        Config::parse(text).unwrap()
    }

    #[test]
    fn test_static_import_and_active_fallback() {
        let config = config(&format!(
            "[[static]]\nname = \"Design\"\ncsv = \"\"\"{DESIGN}\"\"\"\n"
        ));
        let store = MemoryStore::new();

        let registry = load_registry(&config, &store, Path::new(".")).unwrap();
        let id = config.static_tables[0].table_id();
        assert_eq!(registry.active_id(), Some(id));
        assert_eq!(registry.get(id).unwrap().data_points(), 8);
        assert!(store.load(id).unwrap().is_some());
    }

    #[test]
    fn test_dynamic_table_is_created_and_preferred() {
        let config = config(&format!(
            "[dynamic]\nenabled = true\n[[static]]\nname = \"Design\"\ncsv = \"\"\"{DESIGN}\"\"\"\n"
        ));
        let store = MemoryStore::new();

        let registry = load_registry(&config, &store, Path::new(".")).unwrap();
        let dynamic = config.dynamic.table_id();
        assert_eq!(registry.dynamic_id(), Some(dynamic));
        assert_eq!(registry.active_id(), Some(dynamic));
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn test_dynamic_table_is_resumed_only_with_same_grid() {
        let config = config("[dynamic]\nenabled = true\n");
        let grid = config.dynamic.grid().unwrap();
        let id = config.dynamic.table_id();
        let store = MemoryStore::new();

        let mut stored = grid.empty_table(id, "dynamicPolar", "");
        stored.wind_data[0].angle_data[200].speed = Some(1.5);
        store.save(id, &stored).unwrap();
        let registry = load_registry(&config, &store, Path::new(".")).unwrap();
        assert_eq!(registry.get(id).unwrap().data_points(), 1);

        let wrong = PolarTable::new(id, "dynamicPolar", "", vec![WindSpeedBucket::new(3.0, vec![])]);
        store.save(id, &wrong).unwrap();
        let registry = load_registry(&config, &store, Path::new(".")).unwrap();
        let table = registry.get(id).unwrap();
        assert!(grid.matches(&table));
        assert_eq!(table.data_points(), 0);
    }

    #[test]
    fn test_failed_reimport_keeps_stored_table() {
        let config = config("update_tables = true\n[[static]]\nname = \"Design\"\ncsv = \"twa/tws;5\\n45;fast\"\n");
        let id = config.static_tables[0].table_id();
        let store = MemoryStore::new();
        let previous = PolarTable::new(
            id,
            "Design",
            "",
            vec![WindSpeedBucket::new(2.5, vec![AngleEntry::with_speed(0.8, 2.0)])],
        );
        store.save(id, &previous).unwrap();

        let registry = load_registry(&config, &store, Path::new(".")).unwrap();
        assert_eq!(registry.get(id).unwrap().data_points(), 1);
    }

    #[test]
    fn test_configured_active_table() {
        let store = MemoryStore::new();
        let other = PolarTable::new(Uuid::new_v4(), "Other", "", vec![]);
        store.save(other.id, &other).unwrap();
        let config = config(&format!("[dynamic]\nenabled = true\n[server]\nactive_table = \"{}\"\n", other.id));

        let registry = load_registry(&config, &store, Path::new(".")).unwrap();
        assert_eq!(registry.active_id(), Some(other.id));
    }
}
