//! External collaborators
//!
//! The compiler consumes two interfaces from the embedding system:
//! - `schema` - immutable entity schema snapshots (`SchemaProvider`)
//! - `references` - principal and entity lookups for `@` tokens (`ReferenceResolver`)
//!
//! Both ship with JSON-backed implementations used by the CLI and tests.

pub mod error;
pub mod references;
pub mod schema;

pub use error::DataError;
pub use references::{Anonymous, EntityRef, Principal, ReferenceResolver, StaticReferences};
pub use schema::{Capabilities, EntitySchema, RelationInfo, SchemaProvider, SchemaRegistry};
