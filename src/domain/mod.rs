//! Domain layer - Pure business abstractions
//!
//! Trait definitions, domain error types and the copy-counter rules.
//! Nothing here talks to the database directly.

pub mod errors;
pub mod inventory;
pub mod repositories;

pub use errors::DomainError;
pub use inventory::{CounterEffect, LoanSide, counter_effects};
pub use repositories::*;
