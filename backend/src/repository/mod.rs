//! Storage traits for buyers, history and users
//!
//! Services only talk to these traits; `PgRepository` backs production and
//! `MemoryStore` backs local development and the integration tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    Buyer, BuyerFilter, BuyerHistory, BuyerListItem, BuyerSort, Pagination, Role, User,
    VerificationToken,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgRepository;

/// Buyer and history persistence
#[async_trait]
pub trait BuyerRepository: Send + Sync {
    /// Buyers matching `filter` in `sort` order, each with its owner summary.
    /// `None` for `page` returns every match.
    async fn list_buyers(
        &self,
        filter: &BuyerFilter,
        sort: BuyerSort,
        page: Option<Pagination>,
    ) -> AppResult<Vec<BuyerListItem>>;

    async fn count_buyers(&self, filter: &BuyerFilter) -> AppResult<u64>;

    async fn find_buyer(&self, id: Uuid) -> AppResult<Option<Buyer>>;

    /// Most recent history entries for a buyer, newest first, with the acting user
    async fn recent_history(&self, buyer_id: Uuid, limit: u32) -> AppResult<Vec<BuyerHistory>>;

    /// Insert a buyer together with its creation entry
    async fn insert_buyer(&self, buyer: &Buyer, history: &BuyerHistory) -> AppResult<()>;

    /// Replace a buyer's fields if its stored `updated_at` still equals
    /// `expected_updated_at`. Returns `false` when the record moved on (or is gone).
    async fn update_buyer(
        &self,
        buyer: &Buyer,
        expected_updated_at: DateTime<Utc>,
        history: Option<&BuyerHistory>,
    ) -> AppResult<bool>;

    /// Delete a buyer and its history. Returns `false` if it did not exist.
    async fn delete_buyer(&self, id: Uuid) -> AppResult<bool>;

    /// Insert a batch atomically: either every buyer and entry lands or none do
    async fn insert_buyers(&self, batch: &[(Buyer, BuyerHistory)]) -> AppResult<()>;

    /// Storage connectivity check
    async fn ping(&self) -> AppResult<()>;
}

/// User accounts and magic-link tokens
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Create the user if missing. Existing users keep their name and role;
    /// `verified_at` is recorded when given.
    async fn upsert_user(
        &self,
        email: &str,
        name: Option<&str>,
        role: Role,
        verified_at: Option<DateTime<Utc>>,
    ) -> AppResult<User>;

    async fn store_verification_token(&self, token: &VerificationToken) -> AppResult<()>;

    /// Remove and return a matching token. Tokens are single use.
    async fn take_verification_token(
        &self,
        identifier: &str,
        token_hash: &str,
    ) -> AppResult<Option<VerificationToken>>;
}
