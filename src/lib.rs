// HBNB - Core Library
// Exposes all modules for use in the console, the API server, and tests

pub mod config;
pub mod console;
pub mod entities;
pub mod errors;
pub mod logging;
pub mod parser;
pub mod storage;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::{Config, StorageKind};
pub use console::{Console, Flow};
pub use entities::{related, AttrValue, Attributes, Entity, EntityClass, FieldKind, FieldSpec};
pub use errors::{HbnbError, Missing, Result};
pub use storage::{DbStorage, EntityMap, FileStorage, Storage};
