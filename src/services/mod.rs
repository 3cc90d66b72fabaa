//! Services Layer
//!
//! Business logic that spans several tables and must run inside a single
//! transaction.

pub mod loan_service;

pub use loan_service::{LoanFilter, LoanWithDetails};
