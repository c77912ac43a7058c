//! Repository adapters for the url-management and analytics services.

pub mod memory;
pub mod mysql;

pub use beacon_core::error::StorageError;
pub use beacon_core::repository::{
    AccessCounterStore, AccessCounterTx, UrlMappingStore, UrlMappingTx,
};
pub use memory::{InMemoryAccessCounterStore, InMemoryUrlMappingStore};
pub use mysql::{MySqlAccessCounterStore, MySqlUrlMappingStore};
