//! Persistence layer: the storage seam and its implementations.
//!
//! [`Store`] is the single async trait every service and workflow talks
//! to. [`PostgresStore`] is the production implementation;
//! [`MemoryStore`] backs tests. [`migrate`] creates the schema and the
//! uniqueness/geospatial indexes at startup.

pub mod memory;
pub mod migrate;
pub mod models;
pub mod postgres;
pub mod store;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use store::{Distribution, Store, VersionedRatings};
