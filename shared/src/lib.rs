//! Shared types and models for the Buyer Lead Intake platform
//!
//! This crate contains types shared between the backend, the browser forms
//! (via WASM), and other components of the system.

pub mod csv_row;
pub mod models;
pub mod types;
pub mod validation;

pub use csv_row::*;
pub use models::*;
pub use types::*;
pub use validation::*;
