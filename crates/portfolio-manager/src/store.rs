use std::collections::HashMap;
use std::path::{Path, PathBuf};
use trading_core::{atomic_read_json, atomic_write_json, EntryCriteria};

/// Atomic file-backed store for entry criteria keyed by symbol. The broker
/// has no concept of a stop/target/system attached to a position, so this is
/// the one piece of state the agent owns outright.
pub struct EntryCriteriaStore {
    path: PathBuf,
}

impl EntryCriteriaStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> HashMap<String, EntryCriteria> {
        atomic_read_json(&self.path, HashMap::new())
    }

    pub fn save(&self, symbol: &str, criteria: EntryCriteria) -> anyhow::Result<()> {
        let mut all = self.load();
        all.insert(symbol.to_string(), criteria);
        atomic_write_json(&self.path, &all)?;
        Ok(())
    }

    pub fn clear(&self, symbol: &str) -> anyhow::Result<()> {
        let mut all = self.load();
        if all.remove(symbol).is_some() {
            atomic_write_json(&self.path, &all)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use trading_core::TurtleSystem;

    fn criteria(symbol: &str) -> EntryCriteria {
        EntryCriteria {
            symbol: symbol.to_string(),
            stop_price: 100.0,
            exit_ref: 95.0,
            atr_at_entry: 2.0,
            system: TurtleSystem::S2,
            entered_at: Utc::now(),
        }
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntryCriteriaStore::new(dir.path().join("entry_criteria.json"));
        store.save("SPY", criteria("SPY")).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["SPY"].stop_price, 100.0);
    }

    #[test]
    fn clear_removes_only_named_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntryCriteriaStore::new(dir.path().join("entry_criteria.json"));
        store.save("SPY", criteria("SPY")).unwrap();
        store.save("QQQ", criteria("QQQ")).unwrap();

        store.clear("SPY").unwrap();

        let loaded = store.load();
        assert!(!loaded.contains_key("SPY"));
        assert!(loaded.contains_key("QQQ"));
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntryCriteriaStore::new(dir.path().join("missing.json"));
        assert!(store.load().is_empty());
    }
}
