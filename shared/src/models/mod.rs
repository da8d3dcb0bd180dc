//! Domain models for the Buyer Lead Intake platform

mod buyer;
mod history;
mod user;

pub use buyer::*;
pub use history::*;
pub use user::*;
