//! Storage backends
//!
//! One contract, two implementations:
//! - `FileStorage`: whole registry serialized to a JSON document on commit
//! - `DbStorage`: rows in SQLite, one table per entity class
//!
//! The active backend is chosen once from configuration by [`open`]; callers
//! only ever see `Box<dyn Storage>`.

pub mod db_storage;
pub mod file_storage;

pub use db_storage::DbStorage;
pub use file_storage::FileStorage;

use crate::config::{Config, StorageKind};
use crate::entities::{registry_key, Entity, EntityClass};
use crate::errors::Result;
use std::collections::HashMap;
use tracing::info;

// ============================================================================
// STORAGE CONTRACT
// ============================================================================

pub trait Storage: Send {
    /// Every stored entity, or only those whose class name equals `class`
    ///
    /// An unrecognized class name yields an empty map.
    fn all(&self, class: Option<&str>) -> Result<EntityMap>;

    /// Mark an entity as pending persistence; no durable I/O
    fn stage(&mut self, entity: &Entity) -> Result<()>;

    /// Durably apply everything staged; all or nothing
    fn commit(&mut self) -> Result<()>;

    /// Drop an entity from the registry, effective on the next commit
    fn remove(&mut self, entity: Option<&Entity>) -> Result<()>;

    /// Re-derive working state from the source of truth
    fn initialize(&mut self) -> Result<()>;

    /// Clear in-memory state (test teardown)
    fn reset(&mut self) -> Result<()>;

    /// Look up a single entity by class and id
    fn get(&self, class: EntityClass, id: &str) -> Result<Option<Entity>> {
        let key = registry_key(class, id);
        Ok(self.all(Some(class.name()))?.remove(&key))
    }

    fn count(&self, class: Option<&str>) -> Result<usize> {
        Ok(self.all(class)?.len())
    }
}

/// Build the backend selected by configuration and load its state
pub fn open(config: &Config) -> Result<Box<dyn Storage>> {
    let mut storage: Box<dyn Storage> = match config.storage {
        StorageKind::File => {
            info!(path = %config.file_path.display(), "using file storage");
            Box::new(FileStorage::new(&config.file_path))
        }
        StorageKind::Db => {
            info!(database = %config.db_name, test_mode = config.test_mode, "using db storage");
            Box::new(DbStorage::open(&config.db_name, config.test_mode)?)
        }
    };
    storage.initialize()?;
    Ok(storage)
}

// ============================================================================
// ENTITY MAP
// ============================================================================

/// Registry-key → entity mapping that remembers insertion order
#[derive(Debug, Clone, Default)]
pub struct EntityMap {
    entries: Vec<(String, Entity)>,
    index: HashMap<String, usize>,
}

impl EntityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under the entity's own key; replacing keeps the original slot
    pub fn insert(&mut self, entity: Entity) {
        let key = entity.key();
        match self.index.get(&key) {
            Some(&pos) => self.entries[pos].1 = entity,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, entity));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Entity> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Entity> {
        let pos = self.index.remove(key)?;
        let (_, entity) = self.entries.remove(pos);
        for (_, slot) in self.index.iter_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(entity)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Entity> {
        self.entries.iter().map(|(_, entity)| entity)
    }

    pub fn into_values(self) -> impl Iterator<Item = Entity> {
        self.entries.into_iter().map(|(_, entity)| entity)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entity)> {
        self.entries.iter().map(|(key, entity)| (key.as_str(), entity))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of the entities whose class name matches `class`, or all of them
    pub fn filtered(&self, class: Option<&str>) -> EntityMap {
        let mut out = EntityMap::new();
        for entity in self.values() {
            if class.map_or(true, |name| entity.class().name() == name) {
                out.insert(entity.clone());
            }
        }
        out
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Stable sort by `(created_at, id)`
    pub fn sort_by_creation(&mut self) {
        self.entries.sort_by(|(_, a), (_, b)| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, (key, _))| (key.clone(), pos))
            .collect();
    }
}

impl PartialEq for EntityMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl FromIterator<Entity> for EntityMap {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        let mut map = EntityMap::new();
        for entity in iter {
            map.insert(entity);
        }
        map
    }
}
