pub mod connector_registry;
pub mod database; // Multi-engine connector implementations
pub mod sql_builder;

pub use connector_registry::*;
pub use database::*;
pub use sql_builder::*;
