//! Database layer
//!
//! SQLite-backed persistence for the Corten CMS core:
//! - `pool`: connection pool factory
//! - `migrations`: embedded code-based migrations
//! - `repositories`: trait-based data access
//!
//! Repositories expose pool-based read methods plus `_in` variants taking a
//! `&mut SqliteConnection`, so a workflow can hold a single transaction
//! across several repositories and roll back atomically.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, DbPool};
