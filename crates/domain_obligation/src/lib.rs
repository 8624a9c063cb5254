//! Obligation Domain
//!
//! This crate models recurring financial commitments and the state machine
//! that turns each due period into a realized ledger event:
//!
//! - **Installment plans**: a total split into N payments, the last one
//!   absorbing the rounding remainder
//! - **Fixed recurring expenses**: the same amount for N periods
//! - **Single payments**: settled the moment they are opened
//! - **Revenues**: incomes received at registration or on a receipt date
//!
//! Nothing here touches storage. Every transition returns the next state
//! together with the ledger event and balance adjustment to commit.

pub mod obligation;
pub mod creation;
pub mod schedule;
pub mod revenue;
pub mod error;

pub use obligation::{Obligation, ObligationKind, ObligationStatus, Settlement};
pub use creation::{NewObligation, Opened};
pub use schedule::{InstallmentSchedule, InstallmentView};
pub use revenue::{NewRevenue, Receipt, Revenue, RevenueKind, RevenueStatus};
pub use error::ObligationError;
