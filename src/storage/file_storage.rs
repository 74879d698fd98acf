//! File-backed storage
//!
//! Keeps the whole registry in memory and rewrites a single JSON document
//! (`ClassName.id` → entity dict) on every commit. Writes go to a temporary
//! sibling first and are renamed over the document, so a failed commit never
//! leaves a truncated file behind. A failed commit also rolls the in-memory
//! registry back to the last committed state.

use super::{EntityMap, Storage};
use crate::entities::Entity;
use crate::errors::{HbnbError, Result};
use serde_json::{Map, Value};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

pub struct FileStorage {
    path: PathBuf,
    objects: EntityMap,
    /// Registry as of the last successful load or commit
    committed: EntityMap,
}

impl FileStorage {
    /// Create a store over `path`; nothing is read until `initialize`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            objects: EntityMap::new(),
            committed: EntityMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<EntityMap> {
        let content = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no document yet, starting empty");
                return Ok(EntityMap::new());
            }
            Err(e) => return Err(HbnbError::backend("read_document", e.to_string())),
        };

        let document: Map<String, Value> = serde_json::from_slice(&content)
            .map_err(|e| HbnbError::backend("parse_document", e.to_string()))?;

        let mut objects = EntityMap::new();
        for (key, value) in &document {
            let dict = value.as_object().ok_or_else(|| {
                HbnbError::backend("parse_document", format!("{} is not an object", key))
            })?;
            objects.insert(Entity::from_dict(dict)?);
        }
        Ok(objects)
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let document: Map<String, Value> = self
            .objects
            .iter()
            .map(|(key, entity)| (key.to_string(), Value::Object(entity.to_dict())))
            .collect();
        Ok(serde_json::to_vec(&document)?)
    }
}

impl Storage for FileStorage {
    fn all(&self, class: Option<&str>) -> Result<EntityMap> {
        Ok(self.objects.filtered(class))
    }

    fn stage(&mut self, entity: &Entity) -> Result<()> {
        debug!(key = %entity.key(), "staging");
        self.objects.insert(entity.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let written = self
            .encode()
            .and_then(|content| atomic_write(&self.path, &content));
        if let Err(e) = written {
            error!(path = %self.path.display(), error = %e, "commit failed, rolling back");
            self.objects = self.committed.clone();
            return Err(e);
        }
        self.committed = self.objects.clone();
        debug!(path = %self.path.display(), objects = self.objects.len(), "committed");
        Ok(())
    }

    fn remove(&mut self, entity: Option<&Entity>) -> Result<()> {
        if let Some(entity) = entity {
            debug!(key = %entity.key(), "removing");
            self.objects.remove(&entity.key());
        }
        Ok(())
    }

    fn initialize(&mut self) -> Result<()> {
        self.objects = self.load()?;
        self.committed = self.objects.clone();
        debug!(path = %self.path.display(), objects = self.objects.len(), "loaded");
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.objects.clear();
        Ok(())
    }
}

/// Write `content` to a temp sibling, then rename it over `target`
pub(crate) fn atomic_write(target: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| HbnbError::backend("create_document_dir", e.to_string()))?;
        }
    }

    let mut temp_name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "document".into());
    temp_name.push(".tmp");
    let temp_path = target.with_file_name(temp_name);

    let written = fs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(content)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(HbnbError::backend("write_document_temp", e.to_string()));
    }

    fs::rename(&temp_path, target)
        .map_err(|e| HbnbError::backend("rename_document_temp", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AttrValue, EntityClass};
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FileStorage {
        let mut store = FileStorage::new(dir.path().join("file.json"));
        store.initialize().unwrap();
        store
    }

    fn named(class: EntityClass, name: &str) -> Entity {
        let mut e = Entity::new(class);
        e.set("name", AttrValue::from(name));
        e
    }

    #[test]
    fn test_missing_document_is_empty_registry() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(store.all(None).unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_persist_survives_reload() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        let mut california = named(EntityClass::State, "California");
        california.set("population", AttrValue::Int(39_000_000));
        california.persist(&mut store).unwrap();

        let mut reloaded = store_in(&dir);
        reloaded.initialize().unwrap();

        let found = reloaded
            .get(EntityClass::State, california.id())
            .unwrap()
            .unwrap();
        assert_eq!(found, california);

        println!("✅ File persistence test PASSED");
    }

    #[test]
    fn test_all_filters_and_keeps_insertion_order() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        let a = named(EntityClass::State, "A");
        let wifi = named(EntityClass::Amenity, "Wifi");
        let b = named(EntityClass::State, "B");
        for e in [&a, &wifi, &b] {
            store.stage(e).unwrap();
        }
        store.commit().unwrap();

        let states: Vec<String> = store
            .all(Some("State"))
            .unwrap()
            .keys()
            .map(str::to_string)
            .collect();
        assert_eq!(states, vec![a.key(), b.key()]);
        assert_eq!(store.count(None).unwrap(), 3);
        assert!(store.all(Some("Spaceship")).unwrap().is_empty());

        store.initialize().unwrap();
        let keys: Vec<String> = store.all(None).unwrap().keys().map(str::to_string).collect();
        assert_eq!(keys, vec![a.key(), wifi.key(), b.key()]);
    }

    #[test]
    fn test_initialize_discards_uncommitted_state() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        named(EntityClass::State, "Kept").persist(&mut store).unwrap();
        store.stage(&named(EntityClass::State, "Dropped")).unwrap();
        assert_eq!(store.count(None).unwrap(), 2);

        store.initialize().unwrap();
        let first = store.all(None).unwrap();
        store.initialize().unwrap();
        let second = store.all(None).unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_remove_none_is_noop_and_delete_commits() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        let mut wifi = named(EntityClass::Amenity, "Wifi");
        wifi.persist(&mut store).unwrap();

        store.remove(None).unwrap();
        assert_eq!(store.count(None).unwrap(), 1);

        wifi.delete(&mut store).unwrap();
        store.initialize().unwrap();
        assert!(store.get(EntityClass::Amenity, wifi.id()).unwrap().is_none());
    }

    #[test]
    fn test_failed_commit_leaves_document_intact() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        named(EntityClass::State, "Before").persist(&mut store).unwrap();
        let before = fs::read(store.path()).unwrap();

        // A directory squatting on the temp path makes the write fail
        fs::create_dir(dir.path().join("file.json.tmp")).unwrap();

        let mut after = named(EntityClass::State, "After");
        let result = after.persist(&mut store);

        assert!(matches!(result, Err(HbnbError::Backend { .. })));
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn test_failed_commit_rolls_back_memory() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        let mut kept = named(EntityClass::State, "Kept");
        kept.persist(&mut store).unwrap();

        let squatter = dir.path().join("file.json.tmp");
        fs::create_dir(&squatter).unwrap();

        let mut failed = named(EntityClass::State, "Failed");
        assert!(failed.persist(&mut store).is_err());
        assert!(kept.delete(&mut store).is_err());

        // Neither the staged create nor the removal survives the failure
        let keys: Vec<String> = store.all(None).unwrap().keys().map(str::to_string).collect();
        assert_eq!(keys, vec![kept.key()]);

        fs::remove_dir(&squatter).unwrap();
        named(EntityClass::State, "Ok").persist(&mut store).unwrap();

        let document = fs::read_to_string(store.path()).unwrap();
        assert!(!document.contains("Failed"));
        assert!(document.contains("Kept"));
        assert!(document.contains("Ok"));
    }

    #[test]
    fn test_corrupt_document_is_backend_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.json");
        fs::write(&path, b"{not json").unwrap();

        let mut store = FileStorage::new(&path);
        assert!(matches!(store.initialize(), Err(HbnbError::Backend { .. })));
    }

    #[test]
    fn test_reset_clears_memory_only() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        named(EntityClass::City, "Austin").persist(&mut store).unwrap();

        store.reset().unwrap();
        assert!(store.all(None).unwrap().is_empty());

        store.initialize().unwrap();
        assert_eq!(store.count(Some("City")).unwrap(), 1);
    }
}
