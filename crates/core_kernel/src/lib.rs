//! Core Kernel - Foundational types shared by the settlement engine
//!
//! This crate provides the building blocks used across all domain crates:
//! - Money types with precise decimal arithmetic and banker's rounding
//! - Calendar types for monthly periods, due days and "today" resolution
//! - Strongly-typed identifiers
//! - Port abstractions implemented by storage adapters

pub mod money;
pub mod calendar;
pub mod identifiers;
pub mod ports;

pub use money::{Money, Currency, MoneyError};
pub use calendar::{
    BillingPeriod, CalendarError, Clock, DueDay, DueDayPolicy, FixedClock, SystemClock, Timezone,
};
pub use identifiers::{AccountId, LedgerEventId, ObligationId, RevenueId, TickId};
pub use ports::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PortError};
