//! Infrastructure Database Layer
//!
//! This crate provides the PostgreSQL implementation of the settlement
//! ports using SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern: repositories own the SQL and
//! the row mapping, the adapter implements the domain ports on top of them.
//!
//! # Consistency
//!
//! - Every settlement is committed in one transaction
//! - Balances are adjusted in place (`balance = balance + delta`)
//! - `(source_kind, source_id, occurred_on)` is unique in the event log
//! - Obligations and revenues carry an optimistic version
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PgSettlementStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/settlement")).await?;
//! run_migrations(&pool).await?;
//! let store = PgSettlementStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, create_pool, run_migrations, DatabaseConfig};
pub use error::DatabaseError;
pub use adapters::PgSettlementStore;
