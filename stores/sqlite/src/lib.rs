pub mod pool;
pub mod seed;
pub mod sqlite_store;

pub use sqlite_store::SqliteStore;
