// 🗂️ Class Registry - the closed set of entity classes
//
// Each class maps a name to a table and a list of declared fields. The
// console resolves class names here, never by reflection.

use super::value::AttrValue;
use crate::parser::{parse_float, parse_int};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// FIELD DESCRIPTORS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// VARCHAR(n)
    Text(usize),
    Integer,
    Float,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
    pub default: Option<&'static str>,
}

const fn text(name: &'static str, len: usize, nullable: bool) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Text(len),
        nullable,
        default: None,
    }
}

const fn counter(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Integer,
        nullable: false,
        default: Some("0"),
    }
}

const fn coordinate(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Float,
        nullable: true,
        default: None,
    }
}

/// Whole floats an INTEGER column would store as an integer
fn integral(x: f64) -> Option<i64> {
    if x.is_finite() && x.fract() == 0.0 && x >= i64::MIN as f64 && x < i64::MAX as f64 {
        Some(x as i64)
    } else {
        None
    }
}

impl FieldSpec {
    /// Coerce a value into the type its column hands back
    ///
    /// Matches SQLite affinity so both backends read back the same value.
    pub fn coerce(&self, value: AttrValue) -> AttrValue {
        match (self.kind, value) {
            (FieldKind::Text(_), AttrValue::Str(s)) => AttrValue::Str(s),
            (FieldKind::Text(_), other) => AttrValue::Str(other.to_string()),
            (FieldKind::Integer, AttrValue::Bool(b)) => AttrValue::Int(b as i64),
            (FieldKind::Integer, AttrValue::Float(x)) => match integral(x) {
                Some(n) => AttrValue::Int(n),
                None => AttrValue::Float(x),
            },
            (FieldKind::Integer, AttrValue::Str(s)) => {
                match parse_int(&s).or_else(|| parse_float(&s).and_then(integral)) {
                    Some(n) => AttrValue::Int(n),
                    None => match parse_float(&s) {
                        Some(x) => AttrValue::Float(x),
                        None => AttrValue::Str(s),
                    },
                }
            }
            (FieldKind::Float, AttrValue::Bool(b)) => AttrValue::Float(if b { 1.0 } else { 0.0 }),
            (FieldKind::Float, AttrValue::Int(n)) => AttrValue::Float(n as f64),
            (FieldKind::Float, AttrValue::Str(s)) => {
                match parse_float(&s).or_else(|| parse_int(&s).map(|n| n as f64)) {
                    Some(x) => AttrValue::Float(x),
                    None => AttrValue::Str(s),
                }
            }
            (_, other) => other,
        }
    }

    /// Column definition for CREATE TABLE
    pub fn column_sql(&self) -> String {
        let ty = match self.kind {
            FieldKind::Text(len) => format!("VARCHAR({})", len),
            FieldKind::Integer => "INTEGER".to_string(),
            FieldKind::Float => "REAL".to_string(),
        };
        let mut sql = format!("{} {}", self.name, ty);
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}

const USER_FIELDS: &[FieldSpec] = &[
    text("email", 128, false),
    text("password", 128, false),
    text("first_name", 128, true),
    text("last_name", 128, true),
];

const STATE_FIELDS: &[FieldSpec] = &[text("name", 128, false)];

const CITY_FIELDS: &[FieldSpec] = &[text("state_id", 60, false), text("name", 128, false)];

const AMENITY_FIELDS: &[FieldSpec] = &[text("name", 128, false)];

const PLACE_FIELDS: &[FieldSpec] = &[
    text("city_id", 60, false),
    text("user_id", 60, false),
    text("name", 128, false),
    text("description", 1024, true),
    counter("number_rooms"),
    counter("number_bathrooms"),
    counter("max_guest"),
    counter("price_by_night"),
    coordinate("latitude"),
    coordinate("longitude"),
];

const REVIEW_FIELDS: &[FieldSpec] = &[
    text("place_id", 60, false),
    text("user_id", 60, false),
    text("text", 1024, false),
];

// ============================================================================
// ENTITY CLASS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityClass {
    BaseModel,
    User,
    State,
    City,
    Amenity,
    Place,
    Review,
}

impl EntityClass {
    /// Every recognized class, in the order storage enumerates tables
    pub const ALL: [EntityClass; 7] = [
        EntityClass::BaseModel,
        EntityClass::User,
        EntityClass::State,
        EntityClass::City,
        EntityClass::Amenity,
        EntityClass::Place,
        EntityClass::Review,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EntityClass::BaseModel => "BaseModel",
            EntityClass::User => "User",
            EntityClass::State => "State",
            EntityClass::City => "City",
            EntityClass::Amenity => "Amenity",
            EntityClass::Place => "Place",
            EntityClass::Review => "Review",
        }
    }

    /// Case-sensitive lookup; anything outside the whitelist is None
    pub fn from_name(name: &str) -> Option<EntityClass> {
        EntityClass::ALL.iter().copied().find(|c| c.name() == name)
    }

    pub fn table(&self) -> &'static str {
        match self {
            EntityClass::BaseModel => "base_models",
            EntityClass::User => "users",
            EntityClass::State => "states",
            EntityClass::City => "cities",
            EntityClass::Amenity => "amenities",
            EntityClass::Place => "places",
            EntityClass::Review => "reviews",
        }
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            EntityClass::BaseModel => &[],
            EntityClass::User => USER_FIELDS,
            EntityClass::State => STATE_FIELDS,
            EntityClass::City => CITY_FIELDS,
            EntityClass::Amenity => AMENITY_FIELDS,
            EntityClass::Place => PLACE_FIELDS,
            EntityClass::Review => REVIEW_FIELDS,
        }
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|f| f.name == name)
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
