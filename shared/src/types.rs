//! Common types used across the platform: listing queries, sorting and pagination

use serde::{Deserialize, Serialize};

use crate::models::{City, PropertyType, Status, Timeline};
use crate::validation::ValidationErrors;

/// Default page size for buyer listings
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Largest page size a caller may request; larger values are clamped
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

/// Buyer fields a listing may be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    FullName,
    Email,
    Phone,
    City,
    PropertyType,
    Status,
    Timeline,
    BudgetMin,
    BudgetMax,
    CreatedAt,
    #[default]
    UpdatedAt,
}

impl SortField {
    pub const ALL: &'static [SortField] = &[
        SortField::FullName,
        SortField::Email,
        SortField::Phone,
        SortField::City,
        SortField::PropertyType,
        SortField::Status,
        SortField::Timeline,
        SortField::BudgetMin,
        SortField::BudgetMax,
        SortField::CreatedAt,
        SortField::UpdatedAt,
    ];

    /// Query parameter spelling, matching the JSON field name
    pub fn as_param(&self) -> &'static str {
        match self {
            SortField::FullName => "fullName",
            SortField::Email => "email",
            SortField::Phone => "phone",
            SortField::City => "city",
            SortField::PropertyType => "propertyType",
            SortField::Status => "status",
            SortField::Timeline => "timeline",
            SortField::BudgetMin => "budgetMin",
            SortField::BudgetMax => "budgetMax",
            SortField::CreatedAt => "createdAt",
            SortField::UpdatedAt => "updatedAt",
        }
    }

    pub fn from_param(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_param() == s)
    }
}

/// Filter predicates shared by listing and CSV export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuyerFilter {
    /// Case-insensitive substring over full name, email and phone
    pub search: Option<String>,
    pub city: Option<City>,
    pub property_type: Option<PropertyType>,
    pub status: Option<Status>,
    pub timeline: Option<Timeline>,
}

/// Ordering for listing and export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerSort {
    pub field: SortField,
    pub order: SortOrder,
}

/// Page window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Pagination {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// Raw query string parameters as received by the list and export endpoints.
/// Empty values are treated as absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub city: Option<String>,
    pub property_type: Option<String>,
    pub status: Option<String>,
    pub timeline: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Validated listing query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuyerQuery {
    pub filter: BuyerFilter,
    pub sort: BuyerSort,
    pub pagination: Pagination,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_enum<T>(
    errors: &mut ValidationErrors,
    field: &str,
    raw: &Option<String>,
    parse: fn(&str) -> Option<T>,
    expected: fn() -> String,
) -> Option<T> {
    let value = non_empty(raw)?;
    match parse(value) {
        Some(parsed) => Some(parsed),
        None => {
            errors.add(
                field,
                format!("Invalid enum value. Expected {}, received '{}'", expected(), value),
            );
            None
        }
    }
}

fn parse_positive(errors: &mut ValidationErrors, field: &str, raw: &Option<String>, default: u32) -> u32 {
    match non_empty(raw) {
        None => default,
        Some(value) => match value.parse::<u32>() {
            Ok(n) if n > 0 => n,
            _ => {
                errors.add(field, "Number must be a positive integer");
                default
            }
        },
    }
}

impl BuyerListParams {
    /// Validate parameters into a listing query
    pub fn into_query(self) -> Result<BuyerQuery, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let page = parse_positive(&mut errors, "page", &self.page, 1);
        let limit = parse_positive(&mut errors, "limit", &self.limit, DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT);

        let filter = BuyerFilter {
            search: non_empty(&self.search).map(str::to_string),
            city: parse_enum(&mut errors, "city", &self.city, City::from_str, City::expected),
            property_type: parse_enum(
                &mut errors,
                "propertyType",
                &self.property_type,
                PropertyType::from_str,
                PropertyType::expected,
            ),
            status: parse_enum(&mut errors, "status", &self.status, Status::from_str, Status::expected),
            timeline: parse_enum(&mut errors, "timeline", &self.timeline, Timeline::from_str, Timeline::expected),
        };

        let field = match non_empty(&self.sort_by) {
            None => SortField::default(),
            Some(value) => SortField::from_param(value).unwrap_or_else(|| {
                errors.add("sortBy", format!("Cannot sort by '{}'", value));
                SortField::default()
            }),
        };
        let order = match non_empty(&self.sort_order) {
            None => SortOrder::default(),
            Some(value) => SortOrder::from_str(value).unwrap_or_else(|| {
                errors.add("sortOrder", "Invalid enum value. Expected 'asc' | 'desc'");
                SortOrder::default()
            }),
        };

        errors.into_result(BuyerQuery {
            filter,
            sort: BuyerSort { field, order },
            pagination: Pagination { page, limit },
        })
    }
}

/// Pagination metadata returned with listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total_count: u64,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl PaginationMeta {
    pub fn new(pagination: Pagination, total_count: u64) -> Self {
        let limit = u64::from(pagination.limit.max(1));
        let total_pages = total_count.div_ceil(limit);
        Self {
            page: pagination.page,
            limit: pagination.limit,
            total_count,
            total_pages,
            has_next_page: u64::from(pagination.page) < total_pages,
            has_prev_page: pagination.page > 1,
        }
    }
}

/// Paginated buyer listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerPage<T> {
    pub buyers: Vec<T>,
    pub pagination: PaginationMeta,
}
