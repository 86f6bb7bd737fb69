//! Database and data-access functionality

pub mod db;
pub mod directory;

pub use db::{create_pool, get_connection, DbConnection, DbPool, SqliteDirectory};
pub use directory::Directory;
