//! MySQL adapters.
//!
//! Timestamps are stored as `BIGINT` milliseconds since the Unix epoch.
//! Each repository session maps onto one `sqlx` transaction; rolling back
//! on drop is what discards uncommitted writes.

mod counter;
mod mapping;

pub use counter::MySqlAccessCounterStore;
pub use mapping::MySqlUrlMappingStore;

use beacon_core::error::{StorageError, StorageResult};
use jiff::Timestamp;

pub(crate) fn parse_millis(column: &str, millis: i64) -> StorageResult<Timestamp> {
    Timestamp::from_millisecond(millis).map_err(|e| {
        StorageError::InvalidData(format!("invalid {column} timestamp '{millis}': {e}"))
    })
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

pub(crate) fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}
