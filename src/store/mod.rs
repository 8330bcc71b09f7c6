//! Persistence layer.

pub mod libsql;
pub mod traits;

pub use libsql::LibSqlStore;
pub use traits::Store;
