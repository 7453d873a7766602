//! Shared types and domain logic for the Warehouse Stock Management Platform
//!
//! This crate contains the pure domain layer shared between the backend and
//! its tests: workflow status machines, ledger quantity arithmetic, and the
//! models exposed over the API. Nothing in here talks to a database.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
