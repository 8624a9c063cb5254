//! Domain Adapters
//!
//! This module provides adapter implementations for domain ports,
//! connecting domain interfaces to the PostgreSQL database layer.
//!
//! # Architecture
//!
//! The settlement adapter:
//! - Implements every settlement port trait
//! - Translates between domain models and database row types
//! - Uses the repository layer for database operations
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PgSettlementStore;
//! use domain_settlement::SettlementPorts;
//! use std::sync::Arc;
//!
//! let store = Arc::new(PgSettlementStore::new(pool));
//! let ports = SettlementPorts::from_store(store);
//! ```

pub mod settlement;

pub use settlement::PgSettlementStore;
