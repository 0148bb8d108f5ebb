//! Accès PostgreSQL (pool, schéma, transaction, registre)

pub mod checksums;
pub mod pool;
pub mod schema;
pub mod transaction;
pub mod units;

pub use pool::{create_pool, test_connection, DatabaseConfig, SslMode};
pub use schema::{create_schema, DEFAULT_SCHEMA};
pub use transaction::ImportTransaction;
