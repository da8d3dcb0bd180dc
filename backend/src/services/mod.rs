//! Business logic services for the Buyer Lead Intake service

pub mod auth;
pub mod buyer;
pub mod csv;
pub mod history;
pub mod rate_limit;

pub use auth::AuthService;
pub use buyer::BuyerService;
pub use csv::CsvService;
pub use rate_limit::{ManualClock, RateLimiter};
