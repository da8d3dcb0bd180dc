//! Buyer lead models and enumerated domains

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a closed set of canonical values with string conversions.
///
/// Canonical names are the variant names themselves (e.g. `"ZeroToThreeMonths"`),
/// which is also what is stored and serialized.
macro_rules! domain_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every canonical value, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }

            pub fn from_str(s: &str) -> Option<Self> {
                match s {
                    $(stringify!($variant) => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Human readable list of accepted values for error messages
            pub fn expected() -> String {
                Self::ALL
                    .iter()
                    .map(|v| format!("'{}'", v.as_str()))
                    .collect::<Vec<_>>()
                    .join(" | ")
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

domain_enum!(
    /// Cities served by the brokerage
    City { Chandigarh, Mohali, Zirakpur, Panchkula, Other }
);

domain_enum!(
    /// Kind of property the buyer is looking for
    PropertyType { Apartment, Villa, Plot, Office, Retail }
);

domain_enum!(
    /// Bedroom count category
    Bhk { Studio, One, Two, Three, Four }
);

domain_enum!(
    Purpose { Buy, Rent }
);

domain_enum!(
    /// How soon the buyer intends to close
    Timeline { ZeroToThreeMonths, ThreeToSixMonths, MoreThanSixMonths, Exploring }
);

domain_enum!(
    /// Where the lead came from
    Source { Website, Referral, WalkIn, Call, Other }
);

domain_enum!(
    /// Pipeline status. Any status may follow any other.
    Status { New, Qualified, Contacted, Visited, Negotiation, Converted, Dropped }
);

impl PropertyType {
    /// BHK is mandatory for residential units and forbidden otherwise
    pub fn requires_bhk(&self) -> bool {
        matches!(self, PropertyType::Apartment | PropertyType::Villa)
    }
}

impl Bhk {
    pub fn label(&self) -> &'static str {
        match self {
            Bhk::Studio => "Studio",
            Bhk::One => "1 BHK",
            Bhk::Two => "2 BHK",
            Bhk::Three => "3 BHK",
            Bhk::Four => "4 BHK",
        }
    }
}

impl Timeline {
    pub fn label(&self) -> &'static str {
        match self {
            Timeline::ZeroToThreeMonths => "0-3 months",
            Timeline::ThreeToSixMonths => "3-6 months",
            Timeline::MoreThanSixMonths => ">6 months",
            Timeline::Exploring => "Exploring",
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::New
    }
}

/// A prospective buyer's intake record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buyer {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: String,
    pub city: City,
    pub property_type: PropertyType,
    pub bhk: Option<Bhk>,
    pub purpose: Purpose,
    pub budget_min: Option<i64>,
    pub budget_max: Option<i64>,
    pub timeline: Timeline,
    pub source: Source,
    pub status: Status,
    pub notes: Option<String>,
    /// Canonical comma-joined tag set
    pub tags: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency token
    pub updated_at: DateTime<Utc>,
}

/// Validated, editable buyer fields.
///
/// `status` is `None` when the submission omitted it; the caller decides the
/// fallback (default `New` on create, the stored status on update).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerFields {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: String,
    pub city: City,
    pub property_type: PropertyType,
    pub bhk: Option<Bhk>,
    pub purpose: Purpose,
    pub budget_min: Option<i64>,
    pub budget_max: Option<i64>,
    pub timeline: Timeline,
    pub source: Source,
    pub notes: Option<String>,
    pub tags: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl BuyerFields {
    /// Status to persist: incoming, then the stored one, then `New`
    pub fn resolved_status(&self, existing: Option<Status>) -> Status {
        self.status.or(existing).unwrap_or_default()
    }
}

impl From<&Buyer> for BuyerFields {
    fn from(buyer: &Buyer) -> Self {
        Self {
            full_name: buyer.full_name.clone(),
            email: buyer.email.clone(),
            phone: buyer.phone.clone(),
            city: buyer.city,
            property_type: buyer.property_type,
            bhk: buyer.bhk,
            purpose: buyer.purpose,
            budget_min: buyer.budget_min,
            budget_max: buyer.budget_max,
            timeline: buyer.timeline,
            source: buyer.source,
            notes: buyer.notes.clone(),
            tags: buyer.tags.clone(),
            status: Some(buyer.status),
        }
    }
}

/// Minimal public view of a user, attached to buyers and history entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
}

/// Buyer as shown in listings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerListItem {
    #[serde(flatten)]
    pub buyer: Buyer,
    pub owner: Option<UserSummary>,
}

/// Buyer detail with owner and most recent history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerDetail {
    #[serde(flatten)]
    pub buyer: Buyer,
    pub owner: Option<UserSummary>,
    pub history: Vec<super::BuyerHistory>,
}
