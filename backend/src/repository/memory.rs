//! In-process store implementing both repository traits
//!
//! Same filter, sort and pagination semantics as the PostgreSQL repository.
//! Each mutation runs under one write lock, so batches are all-or-nothing.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BuyerRepository, UserRepository};
use crate::error::{AppError, AppResult};
use crate::models::{
    Buyer, BuyerFilter, BuyerHistory, BuyerListItem, BuyerSort, Pagination, Role, SortField,
    SortOrder, User, VerificationToken,
};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    tokens: Vec<VerificationToken>,
    buyers: HashMap<Uuid, Buyer>,
    /// Append order is preserved so equal timestamps still read newest first
    history: Vec<BuyerHistory>,
}

/// Memory-backed storage
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(buyer: &Buyer, filter: &BuyerFilter) -> bool {
    if let Some(ref search) = filter.search {
        let needle = search.to_lowercase();
        let hit = buyer.full_name.to_lowercase().contains(&needle)
            || buyer.phone.to_lowercase().contains(&needle)
            || buyer
                .email
                .as_deref()
                .map(|e| e.to_lowercase().contains(&needle))
                .unwrap_or(false);
        if !hit {
            return false;
        }
    }
    filter.city.map_or(true, |c| buyer.city == c)
        && filter.property_type.map_or(true, |p| buyer.property_type == p)
        && filter.status.map_or(true, |s| buyer.status == s)
        && filter.timeline.map_or(true, |t| buyer.timeline == t)
}

/// Nulls sort last in either direction
fn directed<T: Ord>(a: Option<T>, b: Option<T>, order: SortOrder) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match order {
            SortOrder::Asc => a.cmp(&b),
            SortOrder::Desc => b.cmp(&a),
        },
    }
}

fn compare(a: &Buyer, b: &Buyer, sort: BuyerSort) -> Ordering {
    let order = sort.order;
    let primary = match sort.field {
        SortField::FullName => directed(Some(&a.full_name), Some(&b.full_name), order),
        SortField::Email => directed(a.email.as_ref(), b.email.as_ref(), order),
        SortField::Phone => directed(Some(&a.phone), Some(&b.phone), order),
        // Enumerations are stored as text, so they order by name
        SortField::City => directed(Some(a.city.as_str()), Some(b.city.as_str()), order),
        SortField::PropertyType => directed(
            Some(a.property_type.as_str()),
            Some(b.property_type.as_str()),
            order,
        ),
        SortField::Status => directed(Some(a.status.as_str()), Some(b.status.as_str()), order),
        SortField::Timeline => directed(Some(a.timeline.as_str()), Some(b.timeline.as_str()), order),
        SortField::BudgetMin => directed(a.budget_min, b.budget_min, order),
        SortField::BudgetMax => directed(a.budget_max, b.budget_max, order),
        SortField::CreatedAt => directed(Some(a.created_at), Some(b.created_at), order),
        SortField::UpdatedAt => directed(Some(a.updated_at), Some(b.updated_at), order),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

fn missing_owner(owner_id: Uuid) -> AppError {
    AppError::BadRequest(format!("Owner {} does not exist", owner_id))
}

#[async_trait]
impl BuyerRepository for MemoryStore {
    async fn list_buyers(
        &self,
        filter: &BuyerFilter,
        sort: BuyerSort,
        page: Option<Pagination>,
    ) -> AppResult<Vec<BuyerListItem>> {
        let state = self.state.read().await;
        let mut buyers: Vec<&Buyer> = state.buyers.values().filter(|b| matches(b, filter)).collect();
        buyers.sort_by(|a, b| compare(a, b, sort));

        let (skip, take) = match page {
            Some(page) => (page.offset() as usize, page.limit as usize),
            None => (0, usize::MAX),
        };

        Ok(buyers
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|buyer| BuyerListItem {
                owner: state.users.get(&buyer.owner_id).map(User::summary),
                buyer: buyer.clone(),
            })
            .collect())
    }

    async fn count_buyers(&self, filter: &BuyerFilter) -> AppResult<u64> {
        let state = self.state.read().await;
        Ok(state.buyers.values().filter(|b| matches(b, filter)).count() as u64)
    }

    async fn find_buyer(&self, id: Uuid) -> AppResult<Option<Buyer>> {
        Ok(self.state.read().await.buyers.get(&id).cloned())
    }

    async fn recent_history(&self, buyer_id: Uuid, limit: u32) -> AppResult<Vec<BuyerHistory>> {
        let state = self.state.read().await;
        let mut entries: Vec<&BuyerHistory> =
            state.history.iter().rev().filter(|h| h.buyer_id == buyer_id).collect();
        // Stable sort keeps reverse append order among equal timestamps
        entries.sort_by(|a, b| b.changed_at.cmp(&a.changed_at));

        Ok(entries
            .into_iter()
            .take(limit as usize)
            .map(|entry| BuyerHistory {
                changed_by: state.users.get(&entry.changed_by_id).map(User::summary),
                ..entry.clone()
            })
            .collect())
    }

    async fn insert_buyer(&self, buyer: &Buyer, history: &BuyerHistory) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&buyer.owner_id) {
            return Err(missing_owner(buyer.owner_id));
        }
        if state.buyers.contains_key(&buyer.id) {
            return Err(AppError::DuplicateEntry(format!("buyer {}", buyer.id)));
        }
        state.buyers.insert(buyer.id, buyer.clone());
        state.history.push(history.clone());
        Ok(())
    }

    async fn update_buyer(
        &self,
        buyer: &Buyer,
        expected_updated_at: DateTime<Utc>,
        history: Option<&BuyerHistory>,
    ) -> AppResult<bool> {
        let mut state = self.state.write().await;
        match state.buyers.get_mut(&buyer.id) {
            Some(stored) if stored.updated_at == expected_updated_at => {
                *stored = buyer.clone();
            }
            _ => return Ok(false),
        }
        if let Some(entry) = history {
            state.history.push(entry.clone());
        }
        Ok(true)
    }

    async fn delete_buyer(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.write().await;
        if state.buyers.remove(&id).is_none() {
            return Ok(false);
        }
        state.history.retain(|h| h.buyer_id != id);
        Ok(true)
    }

    async fn insert_buyers(&self, batch: &[(Buyer, BuyerHistory)]) -> AppResult<()> {
        let mut state = self.state.write().await;

        // Check the whole batch before touching anything
        for (index, (buyer, _)) in batch.iter().enumerate() {
            if !state.users.contains_key(&buyer.owner_id) {
                return Err(missing_owner(buyer.owner_id));
            }
            let repeated = batch[..index].iter().any(|(earlier, _)| earlier.id == buyer.id);
            if repeated || state.buyers.contains_key(&buyer.id) {
                return Err(AppError::DuplicateEntry(format!("buyer {}", buyer.id)));
            }
        }

        for (buyer, history) in batch {
            state.buyers.insert(buyer.id, buyer.clone());
            state.history.push(history.clone());
        }
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn upsert_user(
        &self,
        email: &str,
        name: Option<&str>,
        role: Role,
        verified_at: Option<DateTime<Utc>>,
    ) -> AppResult<User> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.users.values_mut().find(|u| u.email == email) {
            if verified_at.is_some() {
                existing.email_verified = verified_at;
            }
            return Ok(existing.clone());
        }

        let user = User {
            id: Uuid::new_v4(),
            name: name.map(str::to_string),
            email: email.to_string(),
            role,
            email_verified: verified_at,
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn store_verification_token(&self, token: &VerificationToken) -> AppResult<()> {
        self.state.write().await.tokens.push(token.clone());
        Ok(())
    }

    async fn take_verification_token(
        &self,
        identifier: &str,
        token_hash: &str,
    ) -> AppResult<Option<VerificationToken>> {
        let mut state = self.state.write().await;
        let position = state
            .tokens
            .iter()
            .position(|t| t.identifier == identifier && t.token_hash == token_hash);
        Ok(position.map(|index| state.tokens.remove(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{City, HistoryDiff, PropertyType, Purpose, Source, Status, Timeline};
    use chrono::Duration;

    fn buyer(owner_id: Uuid, name: &str, budget_min: Option<i64>, at: DateTime<Utc>) -> Buyer {
        Buyer {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            email: None,
            phone: "9876543210".to_string(),
            city: City::Mohali,
            property_type: PropertyType::Plot,
            bhk: None,
            purpose: Purpose::Buy,
            budget_min,
            budget_max: None,
            timeline: Timeline::Exploring,
            source: Source::Website,
            status: Status::New,
            notes: None,
            tags: String::new(),
            owner_id,
            created_at: at,
            updated_at: at,
        }
    }

    fn created(buyer: &Buyer) -> BuyerHistory {
        BuyerHistory {
            id: Uuid::new_v4(),
            buyer_id: buyer.id,
            changed_by_id: buyer.owner_id,
            changed_by: None,
            changed_at: buyer.created_at,
            diff: HistoryDiff::Created { source: None, fields: serde_json::json!({}) },
        }
    }

    async fn store_with_owner() -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let owner = store.upsert_user("agent@example.com", Some("Agent"), Role::User, None).await.unwrap();
        (store, owner)
    }

    #[tokio::test]
    async fn test_nulls_sort_last_both_directions() {
        let (store, owner) = store_with_owner().await;
        let now = Utc::now();
        for (name, budget) in [("A", Some(300)), ("B", None), ("C", Some(100))] {
            let b = buyer(owner.id, name, budget, now);
            store.insert_buyer(&b, &created(&b)).await.unwrap();
        }

        for order in [SortOrder::Asc, SortOrder::Desc] {
            let sort = BuyerSort { field: SortField::BudgetMin, order };
            let names: Vec<String> = store
                .list_buyers(&BuyerFilter::default(), sort, None)
                .await
                .unwrap()
                .into_iter()
                .map(|item| item.buyer.full_name)
                .collect();
            let expected = match order {
                SortOrder::Asc => ["C", "A", "B"],
                SortOrder::Desc => ["A", "C", "B"],
            };
            assert_eq!(names, expected);
        }
    }

    #[tokio::test]
    async fn test_conditional_update() {
        let (store, owner) = store_with_owner().await;
        let now = Utc::now();
        let original = buyer(owner.id, "Asha", None, now);
        store.insert_buyer(&original, &created(&original)).await.unwrap();

        let mut next = original.clone();
        next.status = Status::Qualified;
        next.updated_at = now + Duration::seconds(1);

        assert!(!store.update_buyer(&next, now - Duration::seconds(5), None).await.unwrap());
        assert!(store.update_buyer(&next, now, None).await.unwrap());
        // The token moved on, so replaying the same write is stale
        assert!(!store.update_buyer(&next, now, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_batch_insert_is_atomic() {
        let (store, owner) = store_with_owner().await;
        let now = Utc::now();
        let good = buyer(owner.id, "Good", None, now);
        let orphan = buyer(Uuid::new_v4(), "Orphan", None, now);
        let batch = vec![(good.clone(), created(&good)), (orphan.clone(), created(&orphan))];

        assert!(store.insert_buyers(&batch).await.is_err());
        assert_eq!(store.count_buyers(&BuyerFilter::default()).await.unwrap(), 0);
        assert!(store.recent_history(good.id, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_cascades_history() {
        let (store, owner) = store_with_owner().await;
        let b = buyer(owner.id, "Ravi", None, Utc::now());
        store.insert_buyer(&b, &created(&b)).await.unwrap();

        assert!(store.delete_buyer(b.id).await.unwrap());
        assert!(store.recent_history(b.id, 5).await.unwrap().is_empty());
        assert!(!store.delete_buyer(b.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_verification_tokens_are_single_use() {
        let (store, _) = store_with_owner().await;
        let token = VerificationToken {
            identifier: "agent@example.com".to_string(),
            token_hash: "abc".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        };
        store.store_verification_token(&token).await.unwrap();

        assert!(store.take_verification_token("agent@example.com", "abc").await.unwrap().is_some());
        assert!(store.take_verification_token("agent@example.com", "abc").await.unwrap().is_none());
    }
}
