//! Shared types and models for the Trade Ledger platform
//!
//! This crate contains the document models, inventory pool types and the
//! pure status-derivation rules shared by the backend and its tests.

pub mod models;
pub mod status;
pub mod types;
pub mod validation;

pub use models::*;
pub use status::*;
pub use types::*;
pub use validation::*;
