use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::VehicleSize;

/// Booking status enum representing the lifecycle of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Processing,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    Declined,
    PaymentFailed,
}

impl BookingStatus {
    /// Convert status to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Processing => "processing",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Declined => "declined",
            BookingStatus::PaymentFailed => "payment_failed",
        }
    }

    /// Parse status from string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "processing" => Ok(BookingStatus::Processing),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "in_progress" => Ok(BookingStatus::InProgress),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "declined" => Ok(BookingStatus::Declined),
            "payment_failed" => Ok(BookingStatus::PaymentFailed),
            _ => Err(format!("Invalid booking status: {}", s)),
        }
    }

    /// Terminal statuses have no outgoing transitions in the normal
    /// lifecycle. payment_failed can only be revived by an admin override.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed
                | BookingStatus::Cancelled
                | BookingStatus::Declined
                | BookingStatus::PaymentFailed
        )
    }

    /// A live booking is one that still occupies its time slot.
    pub fn is_live(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled | BookingStatus::Declined)
    }
}

impl Default for BookingStatus {
    fn default() -> Self {
        BookingStatus::Pending
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment status enum representing the payment state of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Unpaid
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Vehicle details captured on the booking. Stored denormalized so later
/// catalogue or profile edits never change what was booked.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct VehicleDetails {
    #[validate(length(min = 1, max = 60, message = "Vehicle make is required"))]
    pub make: String,
    #[validate(length(min = 1, max = 60, message = "Vehicle model is required"))]
    pub model: String,
    #[validate(custom = "crate::validation::validate_vehicle_year")]
    pub year: Option<i32>,
    pub colour: Option<String>,
    pub size: VehicleSize,
}

/// Where the van goes. The postcode drives the distance surcharge.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ServiceAddress {
    #[validate(length(min = 3, max = 120, message = "Address line is required"))]
    pub line1: String,
    pub city: Option<String>,
    #[validate(custom = "crate::validation::validate_uk_postcode")]
    pub postcode: String,
}

/// Price breakdown frozen at booking time. The stored figures are what the
/// customer pays even if tariffs change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PriceBreakdown {
    pub base_subtotal: Decimal,
    pub distance_surcharge: Decimal,
    pub total: Decimal,
    pub distance_km: Option<Decimal>,
}

/// Domain model representing a booking in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub reference: String,
    pub customer_id: Uuid,
    pub time_slot_id: Uuid,
    pub vehicle: VehicleDetails,
    pub address: ServiceAddress,
    pub scheduled_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub pricing: PriceBreakdown,
    pub special_instructions: Option<String>,
    pub cancellation_reason: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub reminder_count: i32,
    pub last_reminder_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Appointment start as a naive timestamp. The business operates in a
    /// single timezone, so policy maths compares this against naive UTC now.
    pub fn scheduled_at(&self) -> NaiveDateTime {
        self.scheduled_date.and_time(self.start_time)
    }
}

/// Timestamp side effects that accompany a status write. Only the fields
/// relevant to the target status are set; the store leaves the rest alone.
#[derive(Debug, Clone, Default)]
pub struct StatusStamp {
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

impl StatusStamp {
    pub fn for_transition(to: BookingStatus, at: DateTime<Utc>, reason: Option<String>) -> Self {
        let mut stamp = StatusStamp::default();
        match to {
            BookingStatus::Confirmed => stamp.confirmed_at = Some(at),
            BookingStatus::Completed => stamp.completed_at = Some(at),
            BookingStatus::Cancelled | BookingStatus::Declined => {
                stamp.cancelled_at = Some(at);
                stamp.cancellation_reason = reason;
            }
            _ => {}
        }
        stamp
    }
}

/// One booked service with its price captured at booking time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookingServiceItem {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub service_id: Uuid,
    pub service_name: String,
    pub price: Decimal,
    pub duration_minutes: i32,
}

/// Audit trail row for a status change. The creation row has no from_status.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub from_status: Option<BookingStatus>,
    pub to_status: BookingStatus,
    pub actor: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for creating a new booking
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBookingRequest {
    pub customer_id: Uuid,
    pub time_slot_id: Uuid,
    #[validate(length(min = 1, message = "Booking must include at least one service"))]
    pub service_ids: Vec<Uuid>,
    #[validate]
    pub vehicle: VehicleDetails,
    #[validate]
    pub address: ServiceAddress,
    #[validate(length(max = 500))]
    pub special_instructions: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Request DTO for updating booking status
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
    pub actor: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    /// Bypass the transition table. Admin escape hatch; always logged loudly.
    #[serde(default)]
    pub force: bool,
    /// Send the customer email for statuses that normally trigger one.
    #[serde(default = "default_true")]
    pub notify: bool,
}

/// Request DTO for a customer-initiated cancellation
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CancelBookingRequest {
    pub customer_id: Uuid,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    /// Must be true when cancelling inside the no-refund window.
    #[serde(default)]
    pub acknowledged_no_refund: bool,
}

/// Request DTO for an admin-initiated cancellation
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AdminCancelRequest {
    #[validate(length(min = 1, max = 500, message = "A cancellation reason is required"))]
    pub reason: String,
    /// Explicit refund decided by the admin; absent means no refund.
    #[validate(custom = "crate::validation::validate_non_negative_amount")]
    pub refund_amount: Option<Decimal>,
    pub actor: Option<String>,
}

/// Response DTO for a booking with its line items
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookingResponse {
    pub id: Uuid,
    pub reference: String,
    pub customer_id: Uuid,
    pub time_slot_id: Uuid,
    pub vehicle: VehicleDetails,
    pub address: ServiceAddress,
    pub scheduled_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub pricing: PriceBreakdown,
    pub services: Vec<BookingServiceItem>,
    pub special_instructions: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingResponse {
    pub fn from_parts(booking: Booking, services: Vec<BookingServiceItem>) -> Self {
        Self {
            id: booking.id,
            reference: booking.reference,
            customer_id: booking.customer_id,
            time_slot_id: booking.time_slot_id,
            vehicle: booking.vehicle,
            address: booking.address,
            scheduled_date: booking.scheduled_date,
            start_time: booking.start_time,
            end_time: booking.end_time,
            status: booking.status,
            payment_status: booking.payment_status,
            pricing: booking.pricing,
            services,
            special_instructions: booking.special_instructions,
            cancellation_reason: booking.cancellation_reason,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
        }
    }
}
