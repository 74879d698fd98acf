// Entity Models
//
// Every stored object has:
// - Stable identity (UUID) that NEVER changes
// - created_at / updated_at timestamps
// - An ordered bag of typed attributes
//
// The class registry is static: a closed enum with per-class field
// descriptors, built at compile time.

pub mod classes;
pub mod entity;
pub mod value;

pub use classes::{EntityClass, FieldKind, FieldSpec};
pub use entity::{format_time, parse_time, registry_key, Entity, CLASS_KEY, PROTECTED};
pub use value::{AttrValue, Attributes};

use crate::errors::Result;
use crate::storage::Storage;

/// Children of `parent` whose `foreign_key` attribute points at it
///
/// e.g. the cities of a state: `related(storage, &state, EntityClass::City, "state_id")`
pub fn related(
    storage: &dyn Storage,
    parent: &Entity,
    child_class: EntityClass,
    foreign_key: &str,
) -> Result<Vec<Entity>> {
    let children = storage.all(Some(child_class.name()))?;
    Ok(children
        .into_values()
        .filter(|child| child.get(foreign_key).and_then(AttrValue::as_str) == Some(parent.id()))
        .collect())
}
