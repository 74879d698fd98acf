//! Relational storage over SQLite
//!
//! One table per entity class. Declared fields get typed columns; any other
//! attribute goes into the `attributes` JSON column so nothing is lost on a
//! round trip. Staged work is held in a session queue and applied inside a
//! single transaction on commit.

use super::{EntityMap, Storage};
use crate::entities::{format_time, AttrValue, Entity, EntityClass};
use crate::errors::{HbnbError, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use serde_json::{Map, Value};
use tracing::{debug, error, info};

/// Operation waiting in the session until commit
#[derive(Debug, Clone)]
enum Pending {
    Upsert(Entity),
    Delete(Entity),
}

pub struct DbStorage {
    conn: Connection,
    pending: Vec<Pending>,
}

impl DbStorage {
    /// Open the database named by `database` (`:memory:` for a private one)
    ///
    /// In test mode every table is dropped first so each run starts clean.
    pub fn open(database: &str, test_mode: bool) -> Result<Self> {
        let conn = if database == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(database)?
        };
        Self::from_connection(conn, test_mode)
    }

    pub fn from_connection(conn: Connection, test_mode: bool) -> Result<Self> {
        let storage = DbStorage {
            conn,
            pending: Vec::new(),
        };
        if test_mode {
            storage.drop_all()?;
        }
        Ok(storage)
    }

    /// Number of operations staged since the last commit
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn drop_all(&self) -> Result<()> {
        for class in EntityClass::ALL {
            self.conn
                .execute(&format!("DROP TABLE IF EXISTS {}", class.table()), [])?;
        }
        info!("dropped all tables");
        Ok(())
    }

    fn create_schema(&self) -> Result<()> {
        for class in EntityClass::ALL {
            let mut columns = vec![
                "id VARCHAR(60) NOT NULL PRIMARY KEY".to_string(),
                "created_at DATETIME NOT NULL".to_string(),
                "updated_at DATETIME NOT NULL".to_string(),
            ];
            columns.extend(class.fields().iter().map(|f| f.column_sql()));
            columns.push("attributes TEXT".to_string());

            self.conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
                    class.table(),
                    columns.join(",\n    ")
                ),
                [],
            )?;
        }
        Ok(())
    }

    fn select_class(&self, class: EntityClass) -> Result<Vec<Entity>> {
        let field_names: Vec<&str> = class.fields().iter().map(|f| f.name).collect();
        let mut columns = vec!["id", "created_at", "updated_at", "attributes"];
        columns.extend(field_names.iter().copied());

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY created_at, id",
            columns.join(", "),
            class.table()
        ))?;

        let rows = stmt
            .query_map([], |row| {
                let mut values = Vec::with_capacity(columns.len());
                for i in 0..columns.len() {
                    values.push(row.get::<_, SqlValue>(i)?);
                }
                Ok(values)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|values| row_to_entity(class, &columns, values))
            .collect()
    }
}

/// Rebuild an entity from `id, created_at, updated_at, attributes, fields...`
fn row_to_entity(class: EntityClass, columns: &[&str], values: Vec<SqlValue>) -> Result<Entity> {
    let mut dict = Map::new();
    let mut extras = Map::new();

    for (name, value) in columns.iter().zip(values) {
        match (*name, value) {
            ("attributes", SqlValue::Text(json)) => {
                extras = serde_json::from_str(&json)?;
            }
            ("attributes", _) => {}
            (_, SqlValue::Null) | (_, SqlValue::Blob(_)) => {}
            (_, SqlValue::Integer(n)) => {
                dict.insert(name.to_string(), Value::from(n));
            }
            (_, SqlValue::Real(x)) => {
                dict.insert(name.to_string(), Value::from(x));
            }
            (_, SqlValue::Text(s)) => {
                dict.insert(name.to_string(), Value::String(s));
            }
        }
    }
    dict.extend(extras);

    Entity::construct(class, &dict)
}

fn to_sql(value: &AttrValue) -> SqlValue {
    match value {
        AttrValue::Bool(b) => SqlValue::Integer(*b as i64),
        AttrValue::Int(n) => SqlValue::Integer(*n),
        AttrValue::Float(x) => SqlValue::Real(*x),
        AttrValue::Str(s) => SqlValue::Text(s.clone()),
    }
}

fn upsert(conn: &Connection, entity: &Entity) -> Result<()> {
    let class = entity.class();
    let mut columns = vec!["id", "created_at", "updated_at", "attributes"];

    let mut extras = Map::new();
    let mut declared = Vec::new();
    for (name, value) in entity.attributes().iter() {
        match class.field(name) {
            Some(field) => {
                columns.push(field.name);
                declared.push(to_sql(value));
            }
            None => {
                extras.insert(name.to_string(), value.to_json());
            }
        }
    }

    let mut values = vec![
        SqlValue::Text(entity.id().to_string()),
        SqlValue::Text(format_time(&entity.created_at())),
        SqlValue::Text(format_time(&entity.updated_at())),
        if extras.is_empty() {
            SqlValue::Null
        } else {
            SqlValue::Text(serde_json::to_string(&extras)?)
        },
    ];
    values.extend(declared);

    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            class.table(),
            columns.join(", "),
            placeholders.join(", ")
        ),
        params_from_iter(values),
    )?;
    Ok(())
}

fn delete_row(conn: &Connection, entity: &Entity) -> Result<()> {
    conn.execute(
        &format!("DELETE FROM {} WHERE id = ?1", entity.class().table()),
        params![entity.id()],
    )?;
    Ok(())
}

impl Storage for DbStorage {
    fn all(&self, class: Option<&str>) -> Result<EntityMap> {
        let classes: Vec<EntityClass> = match class {
            None => EntityClass::ALL.to_vec(),
            Some(name) => match EntityClass::from_name(name) {
                Some(c) => vec![c],
                None => return Ok(EntityMap::new()),
            },
        };

        let mut objects = EntityMap::new();
        for c in &classes {
            for entity in self.select_class(*c)? {
                objects.insert(entity);
            }
        }

        // Staged work is visible to this session before commit
        for op in &self.pending {
            match op {
                Pending::Upsert(e) if classes.contains(&e.class()) => objects.insert(e.clone()),
                Pending::Delete(e) if classes.contains(&e.class()) => {
                    objects.remove(&e.key());
                }
                _ => {}
            }
        }

        objects.sort_by_creation();
        Ok(objects)
    }

    fn stage(&mut self, entity: &Entity) -> Result<()> {
        debug!(key = %entity.key(), "staging upsert");
        self.pending.push(Pending::Upsert(entity.clone()));
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);

        let applied = (|| -> Result<()> {
            let tx = self.conn.transaction()?;
            for op in &pending {
                match op {
                    Pending::Upsert(e) => upsert(&tx, e)?,
                    Pending::Delete(e) => delete_row(&tx, e)?,
                }
            }
            tx.commit()?;
            Ok(())
        })();

        match applied {
            Ok(()) => {
                debug!(operations = pending.len(), "committed");
                Ok(())
            }
            Err(e) => {
                // The transaction rolled back when dropped; the session starts over
                error!(error = %e, operations = pending.len(), "commit rolled back");
                Err(match e {
                    HbnbError::Backend { message, .. } => HbnbError::backend("commit", message),
                    other => other,
                })
            }
        }
    }

    fn remove(&mut self, entity: Option<&Entity>) -> Result<()> {
        if let Some(entity) = entity {
            debug!(key = %entity.key(), "staging delete");
            self.pending.push(Pending::Delete(entity.clone()));
        }
        Ok(())
    }

    fn initialize(&mut self) -> Result<()> {
        self.pending.clear();
        self.create_schema()
    }

    fn reset(&mut self) -> Result<()> {
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store() -> DbStorage {
        let mut store = DbStorage::open(":memory:", false).unwrap();
        store.initialize().unwrap();
        store
    }

    fn state(name: &str) -> Entity {
        let mut s = Entity::new(EntityClass::State);
        s.set("name", AttrValue::from(name));
        s
    }

    #[test]
    fn test_schema_is_idempotent() {
        let mut store = memory_store();
        store.initialize().unwrap();
        store.initialize().unwrap();

        let tables: i64 = store
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, EntityClass::ALL.len() as i64);
    }

    #[test]
    fn test_persist_and_read_back_typed_columns() {
        let mut store = memory_store();

        let mut place = Entity::new(EntityClass::Place);
        place.set("city_id", AttrValue::from("c1"));
        place.set("user_id", AttrValue::from("u1"));
        place.set("name", AttrValue::from("Loft"));
        place.set("number_rooms", AttrValue::from("3"));
        place.set("latitude", AttrValue::Int(37));
        place.set("wifi", AttrValue::Bool(true));
        place.set("rating", AttrValue::Float(4.5));
        place.persist(&mut store).unwrap();

        let found = store.get(EntityClass::Place, place.id()).unwrap().unwrap();

        assert_eq!(found.id(), place.id());
        assert_eq!(found.created_at(), place.created_at());
        assert_eq!(found.updated_at(), place.updated_at());
        assert_eq!(found.get("number_rooms"), Some(&AttrValue::Int(3)));
        assert_eq!(found.get("latitude"), Some(&AttrValue::Float(37.0)));
        assert_eq!(found.get("wifi"), Some(&AttrValue::Bool(true)));
        assert_eq!(found.get("rating"), Some(&AttrValue::Float(4.5)));
        // Column default fills in undeclared counters
        assert_eq!(found.get("max_guest"), Some(&AttrValue::Int(0)));
        assert_eq!(found.get("description"), None);

        println!("✅ Relational round trip test PASSED");
    }

    #[test]
    fn test_staged_entities_visible_before_commit() {
        let mut store = memory_store();
        let nevada = state("Nevada");

        store.stage(&nevada).unwrap();
        assert_eq!(store.count(Some("State")).unwrap(), 1);
        assert_eq!(store.pending_len(), 1);

        store.initialize().unwrap();
        assert_eq!(store.count(Some("State")).unwrap(), 0);
        assert_eq!(store.pending_len(), 0);
    }

    #[test]
    fn test_failed_commit_rolls_back_everything() {
        let mut store = memory_store();

        let good = state("Oregon");
        let nameless = Entity::new(EntityClass::State);
        store.stage(&good).unwrap();
        store.stage(&nameless).unwrap();

        let result = store.commit();
        assert!(matches!(result, Err(HbnbError::Backend { op: "commit", .. })));

        store.initialize().unwrap();
        assert!(store.all(None).unwrap().is_empty());
    }

    #[test]
    fn test_delete_and_filter() {
        let mut store = memory_store();

        let mut a = state("A");
        a.persist(&mut store).unwrap();
        let mut wifi = Entity::new(EntityClass::Amenity);
        wifi.set("name", AttrValue::from("Wifi"));
        wifi.persist(&mut store).unwrap();

        assert_eq!(store.count(None).unwrap(), 2);
        assert_eq!(store.count(Some("Amenity")).unwrap(), 1);
        assert!(store.all(Some("NotAClass")).unwrap().is_empty());

        store.remove(None).unwrap();
        a.delete(&mut store).unwrap();

        assert!(store.get(EntityClass::State, a.id()).unwrap().is_none());
        assert_eq!(store.count(None).unwrap(), 1);
    }

    #[test]
    fn test_order_is_created_at_then_id() {
        let mut store = memory_store();
        for name in ["x", "y", "z"] {
            state(name).persist(&mut store).unwrap();
        }

        let all = store.all(Some("State")).unwrap();
        let entities: Vec<&Entity> = all.values().collect();
        for pair in entities.windows(2) {
            assert!((pair[0].created_at(), pair[0].id()) <= (pair[1].created_at(), pair[1].id()));
        }
    }

    #[test]
    fn test_test_mode_drops_tables() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("hbnb.db");
        let path = path.to_str().unwrap();

        let mut store = DbStorage::open(path, false).unwrap();
        store.initialize().unwrap();
        state("Utah").persist(&mut store).unwrap();
        drop(store);

        let mut reopened = DbStorage::open(path, false).unwrap();
        reopened.initialize().unwrap();
        assert_eq!(reopened.count(None).unwrap(), 1);
        drop(reopened);

        let mut fresh = DbStorage::open(path, true).unwrap();
        fresh.initialize().unwrap();
        assert_eq!(fresh.count(None).unwrap(), 0);
    }
}
