//! HTTP request handlers

pub mod auth;
pub mod buyer;
pub mod csv;
pub mod health;

pub use auth::{current_session, demo_login, request_magic_link, verify_magic_link};
pub use buyer::{create_buyer, delete_buyer, get_buyer, list_buyers, update_buyer};
pub use csv::{export_buyers, import_buyers};
pub use health::health_check;
