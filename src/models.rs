use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Vehicle size tier. Serialized everywhere as the single-letter codes
/// S, M, L, XL; those codes are also what the store persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text")]
pub enum VehicleSize {
    #[serde(rename = "S")]
    #[sqlx(rename = "S")]
    Small,
    #[serde(rename = "M")]
    #[sqlx(rename = "M")]
    Medium,
    #[serde(rename = "L")]
    #[sqlx(rename = "L")]
    Large,
    #[serde(rename = "XL")]
    #[sqlx(rename = "XL")]
    ExtraLarge,
}

impl VehicleSize {
    pub fn code(&self) -> &'static str {
        match self {
            VehicleSize::Small => "S",
            VehicleSize::Medium => "M",
            VehicleSize::Large => "L",
            VehicleSize::ExtraLarge => "XL",
        }
    }

    /// Human-readable tier name for emails and admin views.
    pub fn label(&self) -> &'static str {
        match self {
            VehicleSize::Small => "Small",
            VehicleSize::Medium => "Medium",
            VehicleSize::Large => "Large",
            VehicleSize::ExtraLarge => "Extra Large",
        }
    }

    /// Parse either a letter code or a legacy full name, case-insensitively.
    /// Older clients still send "Medium" or "extra large".
    pub fn from_code(value: &str) -> Option<VehicleSize> {
        match value.trim().to_uppercase().as_str() {
            "S" | "SMALL" => Some(VehicleSize::Small),
            "M" | "MEDIUM" => Some(VehicleSize::Medium),
            "L" | "LARGE" => Some(VehicleSize::Large),
            "XL" | "EXTRA LARGE" | "EXTRA_LARGE" | "EXTRA-LARGE" => Some(VehicleSize::ExtraLarge),
            _ => None,
        }
    }
}

impl std::fmt::Display for VehicleSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A detailing service offered to customers, with one price per vehicle
/// size tier. A missing or non-positive tier price means the service cannot
/// be booked for that size.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct DetailingService {
    pub id: Uuid,
    #[schema(example = "Full Valet")]
    pub name: String,
    pub description: Option<String>,
    /// Appointment length contribution in minutes.
    #[schema(example = 90)]
    pub duration_minutes: Option<i32>,
    pub active: bool,
    pub price_small: Option<Decimal>,
    pub price_medium: Option<Decimal>,
    pub price_large: Option<Decimal>,
    pub price_extra_large: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl DetailingService {
    /// The bookable price for a tier. Returns None when the tier price is
    /// absent or not strictly positive, which callers must treat as
    /// "pricing not configured" rather than free.
    pub fn price_for(&self, size: VehicleSize) -> Option<Decimal> {
        let price = match size {
            VehicleSize::Small => self.price_small,
            VehicleSize::Medium => self.price_medium,
            VehicleSize::Large => self.price_large,
            VehicleSize::ExtraLarge => self.price_extra_large,
        };
        price.filter(|p| p > &Decimal::ZERO)
    }
}

/// Contact details for the person a booking belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CustomerProfile {
    pub id: Uuid,
    #[schema(example = "Jo Bloggs")]
    pub full_name: String,
    #[schema(example = "jo@example.com")]
    pub email: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}
