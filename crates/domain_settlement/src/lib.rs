//! Settlement Domain
//!
//! This crate turns due obligation periods into ledger events:
//!
//! - **Ports**: the storage traits the engine depends on
//! - **Engine**: the periodic tick, manual settlement, creation paths
//! - **Scheduler**: runs the tick on a fixed interval
//! - **In-memory adapter**: a complete store for tests and local runs
//!
//! # Example
//!
//! ```rust,ignore
//! let store = Arc::new(InMemorySettlementStore::default());
//! let engine = SettlementEngine::new(
//!     SettlementPorts::from_store(store),
//!     Arc::new(SystemClock::default()),
//!     EngineConfig::default(),
//! );
//! let report = engine.run_tick(engine.today()).await?;
//! ```

pub mod engine;
pub mod error;
pub mod locks;
pub mod memory;
pub mod ports;
pub mod report;
pub mod scheduler;

pub use engine::{EngineConfig, SettlementEngine};
pub use error::SettlementError;
pub use locks::KeyedLocks;
pub use memory::InMemorySettlementStore;
pub use ports::{
    BalanceLedger, CommitOutcome, LedgerEventStore, ObligationStore, RevenueStore,
    SettlementCommit, SettlementPorts, SettlementStore, SettlementUnitOfWork,
};
pub use report::{OpenOutcome, PaymentOutcome, ReceiptOutcome, TickIssue, TickReport};
pub use scheduler::TickScheduler;
