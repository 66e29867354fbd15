pub mod connection;
pub mod dataset;
pub mod metadata;
pub mod query;

pub use connection::*;
pub use dataset::*;
pub use metadata::*;
pub use query::*;
