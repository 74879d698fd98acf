// 🧱 Entity - identity, timestamps, attribute bag
//
// "The id is IDENTITY (never changes), attributes are VALUES (can change)"
//
// Every persisted object is an Entity tagged with its EntityClass. The id is
// assigned once at construction; rehydration adopts the stored id and
// timestamps verbatim.

use super::classes::EntityClass;
use super::value::{quote, AttrValue, Attributes};
use crate::errors::{HbnbError, Result};
use crate::storage::Storage;
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde_json::{Map, Value};
use tracing::debug;

/// Wire format for timestamps (microsecond precision, no offset)
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Discriminator key written by `to_dict`
pub const CLASS_KEY: &str = "__class__";

/// Names that are never assignable through `set`
pub const PROTECTED: [&str; 4] = ["id", "created_at", "updated_at", CLASS_KEY];

/// Current time truncated to what the wire format can carry
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub fn format_time(ts: &DateTime<Utc>) -> String {
    ts.format(TIME_FORMAT).to_string()
}

pub fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)))
        .map(|dt| dt.trunc_subsecs(6))
        .map_err(|e| HbnbError::backend("decode_timestamp", format!("{}: {}", raw, e)))
}

// ============================================================================
// ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    class: EntityClass,
    id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    attributes: Attributes,
}

impl Entity {
    /// Fresh entity with a new UUID and `created_at == updated_at == now`
    pub fn new(class: EntityClass) -> Self {
        let ts = now();
        Entity {
            class,
            id: uuid::Uuid::new_v4().to_string(),
            created_at: ts,
            updated_at: ts,
            attributes: Attributes::new(),
        }
    }

    /// Build an entity from named arguments
    ///
    /// An `id` in the mapping selects the rehydration path: the id and any
    /// supplied timestamps are adopted as-is. Non-scalar values are skipped.
    pub fn construct(class: EntityClass, args: &Map<String, Value>) -> Result<Self> {
        let mut entity = Entity::new(class);

        if let Some(id) = args.get("id").and_then(Value::as_str) {
            entity.id = id.to_string();
            if let Some(raw) = args.get("created_at").and_then(Value::as_str) {
                entity.created_at = parse_time(raw)?;
            }
            match args.get("updated_at").and_then(Value::as_str) {
                Some(raw) => entity.updated_at = parse_time(raw)?,
                None => entity.updated_at = entity.created_at,
            }
        }

        for (name, value) in args {
            if PROTECTED.contains(&name.as_str()) {
                continue;
            }
            match AttrValue::from_json(value) {
                Some(v) => {
                    entity.set(name, v);
                }
                None => debug!(class = %class, attribute = %name, "skipping non-scalar attribute"),
            }
        }

        Ok(entity)
    }

    /// Inverse of `to_dict`: the class comes from the `__class__` key
    pub fn from_dict(dict: &Map<String, Value>) -> Result<Self> {
        let class_name = dict
            .get(CLASS_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| HbnbError::backend("decode_entity", "missing __class__ key"))?;
        let class = EntityClass::from_name(class_name)
            .ok_or_else(|| HbnbError::UnknownClass(class_name.to_string()))?;

        if !dict.contains_key("id") {
            return Err(HbnbError::backend("decode_entity", "missing id"));
        }

        Entity::construct(class, dict)
    }

    pub fn class(&self) -> EntityClass {
        self.class
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    /// Registry key: `ClassName.id`
    pub fn key(&self) -> String {
        registry_key(self.class, &self.id)
    }

    /// Assign an attribute, coercing declared fields to their column type
    ///
    /// Returns false (and changes nothing) for id and timestamps.
    pub fn set(&mut self, name: &str, value: AttrValue) -> bool {
        if PROTECTED.contains(&name) {
            return false;
        }
        let value = match self.class.field(name) {
            Some(field) => field.coerce(value),
            None => value,
        };
        self.attributes.set(name, value);
        true
    }

    pub fn unset(&mut self, name: &str) -> Option<AttrValue> {
        self.attributes.remove(name)
    }

    /// Refresh `updated_at`, always moving strictly forward
    pub fn touch(&mut self) {
        let ts = now();
        self.updated_at = if ts > self.updated_at {
            ts
        } else {
            self.updated_at + chrono::Duration::microseconds(1)
        };
    }

    /// Touch, stage and commit through the active storage
    pub fn persist(&mut self, storage: &mut dyn Storage) -> Result<()> {
        self.touch();
        storage.stage(self)?;
        storage.commit()
    }

    /// Remove from storage and commit
    pub fn delete(&self, storage: &mut dyn Storage) -> Result<()> {
        storage.remove(Some(self))?;
        storage.commit()
    }

    /// Full attribute mapping with class discriminator and ISO timestamps
    pub fn to_dict(&self) -> Map<String, Value> {
        let mut dict = Map::new();
        dict.insert("id".to_string(), Value::String(self.id.clone()));
        dict.insert(
            "created_at".to_string(),
            Value::String(format_time(&self.created_at)),
        );
        dict.insert(
            "updated_at".to_string(),
            Value::String(format_time(&self.updated_at)),
        );
        for (name, value) in self.attributes.iter() {
            dict.insert(name.to_string(), value.to_json());
        }
        dict.insert(
            CLASS_KEY.to_string(),
            Value::String(self.class.name().to_string()),
        );
        dict
    }

    /// `[ClassName] (id) {'id': ..., 'created_at': ..., ...}`
    pub fn render(&self) -> String {
        let mut pairs = vec![
            format!("'id': {}", quote(&self.id)),
            format!("'created_at': {}", quote(&format_time(&self.created_at))),
            format!("'updated_at': {}", quote(&format_time(&self.updated_at))),
        ];
        pairs.extend(
            self.attributes
                .iter()
                .map(|(name, value)| format!("{}: {}", quote(name), value.repr())),
        );
        format!("[{}] ({}) {{{}}}", self.class, self.id, pairs.join(", "))
    }
}

pub fn registry_key(class: EntityClass, id: &str) -> String {
    format!("{}.{}", class.name(), id)
}
