//! PostgreSQL repository
//!
//! Enumerations are stored as their canonical names in TEXT columns and
//! history diffs as JSONB.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{BuyerRepository, UserRepository};
use crate::error::{AppError, AppResult};
use crate::models::{
    Bhk, Buyer, BuyerFilter, BuyerHistory, BuyerListItem, BuyerSort, City, HistoryDiff,
    Pagination, PropertyType, Purpose, Role, SortField, SortOrder, Source, Status, Timeline, User,
    UserSummary, VerificationToken,
};

const BUYER_SELECT: &str = r#"
    SELECT b.id, b.full_name, b.email, b.phone, b.city, b.property_type, b.bhk, b.purpose,
           b.budget_min, b.budget_max, b.timeline, b.source, b.status, b.notes, b.tags,
           b.owner_id, b.created_at, b.updated_at,
           u.name AS owner_name, u.email AS owner_email
    FROM buyers b
    LEFT JOIN users u ON u.id = b.owner_id
"#;

/// PostgreSQL-backed storage
#[derive(Clone)]
pub struct PgRepository {
    db: PgPool,
}

impl PgRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Buyer row joined with its owner
#[derive(Debug, sqlx::FromRow)]
struct BuyerRow {
    id: Uuid,
    full_name: String,
    email: Option<String>,
    phone: String,
    city: String,
    property_type: String,
    bhk: Option<String>,
    purpose: String,
    budget_min: Option<i64>,
    budget_max: Option<i64>,
    timeline: String,
    source: String,
    status: String,
    notes: Option<String>,
    tags: String,
    owner_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    owner_name: Option<String>,
    owner_email: Option<String>,
}

fn parse_column<T>(column: &str, value: &str, parse: fn(&str) -> Option<T>) -> AppResult<T> {
    parse(value).ok_or_else(|| AppError::Internal(format!("unexpected {} value '{}'", column, value)))
}

impl BuyerRow {
    fn into_item(self) -> AppResult<BuyerListItem> {
        let owner = self.owner_email.clone().map(|email| UserSummary {
            id: self.owner_id,
            name: self.owner_name.clone(),
            email,
        });
        let bhk = match self.bhk.as_deref() {
            Some(value) => Some(parse_column("bhk", value, Bhk::from_str)?),
            None => None,
        };

        let buyer = Buyer {
            id: self.id,
            city: parse_column("city", &self.city, City::from_str)?,
            property_type: parse_column("property_type", &self.property_type, PropertyType::from_str)?,
            bhk,
            purpose: parse_column("purpose", &self.purpose, Purpose::from_str)?,
            timeline: parse_column("timeline", &self.timeline, Timeline::from_str)?,
            source: parse_column("source", &self.source, Source::from_str)?,
            status: parse_column("status", &self.status, Status::from_str)?,
            full_name: self.full_name,
            email: self.email,
            phone: self.phone,
            budget_min: self.budget_min,
            budget_max: self.budget_max,
            notes: self.notes,
            tags: self.tags,
            owner_id: self.owner_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        Ok(BuyerListItem { buyer, owner })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    id: Uuid,
    buyer_id: Uuid,
    changed_by_id: Uuid,
    changed_at: DateTime<Utc>,
    diff: Json<HistoryDiff>,
    changed_by_name: Option<String>,
    changed_by_email: Option<String>,
}

impl From<HistoryRow> for BuyerHistory {
    fn from(row: HistoryRow) -> Self {
        let changed_by = row.changed_by_email.map(|email| UserSummary {
            id: row.changed_by_id,
            name: row.changed_by_name,
            email,
        });
        Self {
            id: row.id,
            buyer_id: row.buyer_id,
            changed_by_id: row.changed_by_id,
            changed_by,
            changed_at: row.changed_at,
            diff: row.diff.0,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: Option<String>,
    email: String,
    role: String,
    email_verified: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> AppResult<Self> {
        Ok(Self {
            role: parse_column("role", &row.role, Role::from_str)?,
            id: row.id,
            name: row.name,
            email: row.email,
            email_verified: row.email_verified,
            created_at: row.created_at,
        })
    }
}

/// Escape LIKE wildcards so search terms match literally
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &BuyerFilter) {
    qb.push(" WHERE TRUE");
    if let Some(ref search) = filter.search {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (b.full_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR b.email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR b.phone ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(city) = filter.city {
        qb.push(" AND b.city = ").push_bind(city.as_str());
    }
    if let Some(property_type) = filter.property_type {
        qb.push(" AND b.property_type = ").push_bind(property_type.as_str());
    }
    if let Some(status) = filter.status {
        qb.push(" AND b.status = ").push_bind(status.as_str());
    }
    if let Some(timeline) = filter.timeline {
        qb.push(" AND b.timeline = ").push_bind(timeline.as_str());
    }
}

fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::FullName => "b.full_name",
        SortField::Email => "b.email",
        SortField::Phone => "b.phone",
        SortField::City => "b.city",
        SortField::PropertyType => "b.property_type",
        SortField::Status => "b.status",
        SortField::Timeline => "b.timeline",
        SortField::BudgetMin => "b.budget_min",
        SortField::BudgetMax => "b.budget_max",
        SortField::CreatedAt => "b.created_at",
        SortField::UpdatedAt => "b.updated_at",
    }
}

async fn insert_buyer_row(conn: &mut PgConnection, buyer: &Buyer) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO buyers (
            id, full_name, email, phone, city, property_type, bhk, purpose,
            budget_min, budget_max, timeline, source, status, notes, tags,
            owner_id, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#,
    )
    .bind(buyer.id)
    .bind(&buyer.full_name)
    .bind(&buyer.email)
    .bind(&buyer.phone)
    .bind(buyer.city.as_str())
    .bind(buyer.property_type.as_str())
    .bind(buyer.bhk.map(|b| b.as_str()))
    .bind(buyer.purpose.as_str())
    .bind(buyer.budget_min)
    .bind(buyer.budget_max)
    .bind(buyer.timeline.as_str())
    .bind(buyer.source.as_str())
    .bind(buyer.status.as_str())
    .bind(&buyer.notes)
    .bind(&buyer.tags)
    .bind(buyer.owner_id)
    .bind(buyer.created_at)
    .bind(buyer.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_history_row(conn: &mut PgConnection, entry: &BuyerHistory) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO buyer_history (id, buyer_id, changed_by_id, changed_at, diff)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(entry.id)
    .bind(entry.buyer_id)
    .bind(entry.changed_by_id)
    .bind(entry.changed_at)
    .bind(Json(&entry.diff))
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl BuyerRepository for PgRepository {
    async fn list_buyers(
        &self,
        filter: &BuyerFilter,
        sort: BuyerSort,
        page: Option<Pagination>,
    ) -> AppResult<Vec<BuyerListItem>> {
        let mut qb = QueryBuilder::<Postgres>::new(BUYER_SELECT);
        push_filter(&mut qb, filter);

        let direction = match sort.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        qb.push(format!(
            " ORDER BY {} {} NULLS LAST, b.id ASC",
            sort_column(sort.field),
            direction
        ));

        if let Some(page) = page {
            qb.push(" LIMIT ")
                .push_bind(i64::from(page.limit))
                .push(" OFFSET ")
                .push_bind(page.offset() as i64);
        }

        let rows = qb.build_query_as::<BuyerRow>().fetch_all(&self.db).await?;
        rows.into_iter().map(BuyerRow::into_item).collect()
    }

    async fn count_buyers(&self, filter: &BuyerFilter) -> AppResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM buyers b");
        push_filter(&mut qb, filter);
        let count = qb.build_query_scalar::<i64>().fetch_one(&self.db).await?;
        Ok(count.max(0) as u64)
    }

    async fn find_buyer(&self, id: Uuid) -> AppResult<Option<Buyer>> {
        let row = sqlx::query_as::<_, BuyerRow>(&format!("{} WHERE b.id = $1", BUYER_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.map(|r| r.into_item().map(|item| item.buyer)).transpose()
    }

    async fn recent_history(&self, buyer_id: Uuid, limit: u32) -> AppResult<Vec<BuyerHistory>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT h.id, h.buyer_id, h.changed_by_id, h.changed_at, h.diff,
                   u.name AS changed_by_name, u.email AS changed_by_email
            FROM buyer_history h
            LEFT JOIN users u ON u.id = h.changed_by_id
            WHERE h.buyer_id = $1
            ORDER BY h.changed_at DESC, h.seq DESC
            LIMIT $2
            "#,
        )
        .bind(buyer_id)
        .bind(i64::from(limit))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(BuyerHistory::from).collect())
    }

    async fn insert_buyer(&self, buyer: &Buyer, history: &BuyerHistory) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        insert_buyer_row(&mut tx, buyer).await?;
        insert_history_row(&mut tx, history).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_buyer(
        &self,
        buyer: &Buyer,
        expected_updated_at: DateTime<Utc>,
        history: Option<&BuyerHistory>,
    ) -> AppResult<bool> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE buyers
            SET full_name = $2, email = $3, phone = $4, city = $5, property_type = $6,
                bhk = $7, purpose = $8, budget_min = $9, budget_max = $10, timeline = $11,
                source = $12, status = $13, notes = $14, tags = $15, updated_at = $16
            WHERE id = $1 AND updated_at = $17
            "#,
        )
        .bind(buyer.id)
        .bind(&buyer.full_name)
        .bind(&buyer.email)
        .bind(&buyer.phone)
        .bind(buyer.city.as_str())
        .bind(buyer.property_type.as_str())
        .bind(buyer.bhk.map(|b| b.as_str()))
        .bind(buyer.purpose.as_str())
        .bind(buyer.budget_min)
        .bind(buyer.budget_max)
        .bind(buyer.timeline.as_str())
        .bind(buyer.source.as_str())
        .bind(buyer.status.as_str())
        .bind(&buyer.notes)
        .bind(&buyer.tags)
        .bind(buyer.updated_at)
        .bind(expected_updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if let Some(entry) = history {
            insert_history_row(&mut tx, entry).await?;
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn delete_buyer(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM buyers WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_buyers(&self, batch: &[(Buyer, BuyerHistory)]) -> AppResult<()> {
        // Dropping the transaction on error rolls the whole batch back
        let mut tx = self.db.begin().await?;
        for (buyer, history) in batch {
            insert_buyer_row(&mut tx, buyer).await?;
            insert_history_row(&mut tx, history).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PgRepository {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, role, email_verified, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, role, email_verified, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn upsert_user(
        &self,
        email: &str,
        name: Option<&str>,
        role: Role,
        verified_at: Option<DateTime<Utc>>,
    ) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, name, email, role, email_verified)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO UPDATE
                SET email_verified = COALESCE(EXCLUDED.email_verified, users.email_verified)
            RETURNING id, name, email, role, email_verified, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(role.as_str())
        .bind(verified_at)
        .fetch_one(&self.db)
        .await?;

        User::try_from(row)
    }

    async fn store_verification_token(&self, token: &VerificationToken) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO verification_tokens (identifier, token_hash, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&token.identifier)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn take_verification_token(
        &self,
        identifier: &str,
        token_hash: &str,
    ) -> AppResult<Option<VerificationToken>> {
        let row = sqlx::query_as::<_, (String, String, DateTime<Utc>)>(
            r#"
            DELETE FROM verification_tokens
            WHERE identifier = $1 AND token_hash = $2
            RETURNING identifier, token_hash, expires_at
            "#,
        )
        .bind(identifier)
        .bind(token_hash)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|(identifier, token_hash, expires_at)| VerificationToken {
            identifier,
            token_hash,
            expires_at,
        }))
    }
}
