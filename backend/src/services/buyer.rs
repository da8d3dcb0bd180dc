//! Buyer service: listing, detail, create, update with optimistic
//! concurrency, and delete

use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{
    Buyer, BuyerDetail, BuyerListItem, BuyerPage, BuyerQuery, PaginationMeta,
};
use crate::repository::{BuyerRepository, UserRepository};
use crate::services::history::{self, RECENT_HISTORY_LIMIT};
use crate::services::RateLimiter;
use shared::{validate_buyer_form, BuyerFormInput, ValidatedBuyer};

/// Current time at the precision PostgreSQL stores
pub fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Buyer service
#[derive(Clone)]
pub struct BuyerService {
    buyers: Arc<dyn BuyerRepository>,
    users: Arc<dyn UserRepository>,
    rate_limiter: Arc<RateLimiter>,
}

impl BuyerService {
    pub fn new(
        buyers: Arc<dyn BuyerRepository>,
        users: Arc<dyn UserRepository>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            buyers,
            users,
            rate_limiter,
        }
    }

    /// Filtered, sorted page of buyers
    pub async fn list(&self, query: &BuyerQuery) -> AppResult<BuyerPage<BuyerListItem>> {
        let total_count = self.buyers.count_buyers(&query.filter).await?;
        let buyers = self
            .buyers
            .list_buyers(&query.filter, query.sort, Some(query.pagination))
            .await?;

        Ok(BuyerPage {
            buyers,
            pagination: PaginationMeta::new(query.pagination, total_count),
        })
    }

    async fn load(&self, id: Uuid) -> AppResult<Buyer> {
        self.buyers
            .find_buyer(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Buyer".to_string()))
    }

    /// Buyer with owner summary and most recent history
    pub async fn get(&self, id: Uuid) -> AppResult<BuyerDetail> {
        let buyer = self.load(id).await?;
        let owner = self.users.find_user(buyer.owner_id).await?.map(|u| u.summary());
        let history = self.buyers.recent_history(id, RECENT_HISTORY_LIMIT).await?;

        Ok(BuyerDetail { buyer, owner, history })
    }

    /// Create a buyer owned by the actor
    pub async fn create(&self, actor: &AuthUser, input: &BuyerFormInput) -> AppResult<Buyer> {
        self.rate_limiter.enforce(&RateLimiter::create_key(actor.user_id))?;

        let ValidatedBuyer { fields, .. } = validate_buyer_form(input)?;
        let submitted = fields.clone();
        let now = now_micros();
        let buyer = Buyer {
            id: Uuid::new_v4(),
            status: fields.resolved_status(None),
            full_name: fields.full_name,
            email: fields.email,
            phone: fields.phone,
            city: fields.city,
            property_type: fields.property_type,
            bhk: fields.bhk,
            purpose: fields.purpose,
            budget_min: fields.budget_min,
            budget_max: fields.budget_max,
            timeline: fields.timeline,
            source: fields.source,
            notes: fields.notes,
            tags: fields.tags,
            owner_id: actor.user_id,
            created_at: now,
            updated_at: now,
        };

        let entry = history::created_entry(&buyer, &submitted, actor.user_id)?;
        self.buyers.insert_buyer(&buyer, &entry).await?;

        tracing::info!(buyer_id = %buyer.id, owner_id = %actor.user_id, "Buyer created");
        Ok(buyer)
    }

    /// Update a buyer.
    ///
    /// A stale `updatedAt` in the payload, or a concurrent write between load
    /// and save, yields `Conflict`.
    pub async fn update(
        &self,
        actor: &AuthUser,
        id: Uuid,
        client_addr: Option<&str>,
        input: &BuyerFormInput,
    ) -> AppResult<Buyer> {
        let current = self.load(id).await?;
        actor.ensure_can_modify(current.owner_id)?;
        self.rate_limiter
            .enforce(&RateLimiter::update_key(actor.user_id, client_addr))?;

        let ValidatedBuyer { fields, updated_at } = validate_buyer_form(input)?;

        if let Some(seen) = updated_at {
            if seen != current.updated_at {
                tracing::warn!(buyer_id = %id, %seen, stored = %current.updated_at, "Stale buyer update");
                return Err(AppError::stale_record());
            }
        }

        let changes = history::diff_fields(&current, &fields)?;

        // The token must move even if the clock has not
        let now = now_micros().max(current.updated_at + Duration::microseconds(1));
        let next = Buyer {
            status: fields.resolved_status(Some(current.status)),
            full_name: fields.full_name,
            email: fields.email,
            phone: fields.phone,
            city: fields.city,
            property_type: fields.property_type,
            bhk: fields.bhk,
            purpose: fields.purpose,
            budget_min: fields.budget_min,
            budget_max: fields.budget_max,
            timeline: fields.timeline,
            source: fields.source,
            notes: fields.notes,
            tags: fields.tags,
            updated_at: now,
            ..current.clone()
        };

        let entry = history::updated_entry(id, actor.user_id, now, changes);
        if !self.buyers.update_buyer(&next, current.updated_at, entry.as_ref()).await? {
            tracing::warn!(buyer_id = %id, "Buyer changed during update");
            return Err(AppError::stale_record());
        }

        tracing::info!(
            buyer_id = %id,
            changed = entry.is_some(),
            "Buyer updated"
        );
        Ok(next)
    }

    /// Delete a buyer and its history
    pub async fn delete(&self, actor: &AuthUser, id: Uuid) -> AppResult<()> {
        let current = self.load(id).await?;
        actor.ensure_can_modify(current.owner_id)?;

        if !self.buyers.delete_buyer(id).await? {
            return Err(AppError::NotFound("Buyer".to_string()));
        }
        tracing::info!(buyer_id = %id, actor = %actor.user_id, "Buyer deleted");
        Ok(())
    }
}
