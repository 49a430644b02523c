// Store adapter boundary.
//
// The rest of the crate talks to persistence through these traits. The
// Postgres implementation is the production backend; the in-memory one backs
// tests and local development. Both enforce the same unique constraints and
// report them under the same names, so callers can map conflicts uniformly.
//
// Deliberately no multi-statement transaction surface here: multi-row writes
// are sequenced by the services with explicit compensation.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::bookings::models::{
    Booking, BookingServiceItem, BookingStatus, PaymentStatus, StatusHistoryEntry, StatusStamp,
};
use crate::models::{CustomerProfile, DetailingService};
use crate::slots::models::TimeSlot;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// One live booking per slot. Live means any status other than cancelled
/// or declined.
pub const UQ_BOOKINGS_LIVE_SLOT: &str = "uq_bookings_live_slot";
/// Booking references are globally unique.
pub const UQ_BOOKINGS_REFERENCE: &str = "uq_bookings_reference";
/// At most one slot per (date, start time).
pub const UQ_TIME_SLOTS_DATE_START: &str = "uq_time_slots_date_start";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint {0} violated")]
    UniqueViolation(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_violation_of(&self, constraint: &str) -> bool {
        matches!(self, StoreError::UniqueViolation(c) if c == constraint)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation(
                    db_err.constraint().unwrap_or("unknown").to_string(),
                );
            }
        }
        StoreError::Backend(err.to_string())
    }
}

/// Read access to the service catalogue and its per-tier prices.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn service_by_id(&self, id: Uuid) -> Result<Option<DetailingService>, StoreError>;
    /// Fetch a batch of services by id. Missing ids are simply absent from
    /// the result; callers that need all of them must check.
    async fn services_by_ids(&self, ids: &[Uuid]) -> Result<Vec<DetailingService>, StoreError>;
    async fn active_services(&self) -> Result<Vec<DetailingService>, StoreError>;
}

/// Appointment slot persistence.
#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn slot_by_id(&self, id: Uuid) -> Result<Option<TimeSlot>, StoreError>;
    async fn slot_at(
        &self,
        date: NaiveDate,
        start: NaiveTime,
    ) -> Result<Option<TimeSlot>, StoreError>;
    async fn insert_slot(&self, slot: &TimeSlot) -> Result<(), StoreError>;
    /// Flip the availability flag. Returns false when the slot does not exist.
    async fn set_slot_availability(&self, id: Uuid, available: bool) -> Result<bool, StoreError>;
    async fn available_slots(
        &self,
        from: NaiveDate,
        to: Option<NaiveDate>,
    ) -> Result<Vec<TimeSlot>, StoreError>;
}

/// Booking rows, their line items and their status history.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError>;
    /// Row delete used by create-path compensation. Returns false when the
    /// row was already gone.
    async fn delete_booking(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn booking_by_id(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;
    async fn booking_by_reference(&self, reference: &str) -> Result<Option<Booking>, StoreError>;
    /// Ownership-scoped fetch: only returns the booking when it belongs to
    /// the given customer.
    async fn booking_for_customer(
        &self,
        id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Booking>, StoreError>;
    async fn bookings_for_customer(
        &self,
        customer_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, StoreError>;
    /// The booking currently occupying a slot, if any. Cancelled and
    /// declined bookings do not count.
    async fn live_booking_for_slot(&self, slot_id: Uuid) -> Result<Option<Booking>, StoreError>;
    async fn update_booking_status(
        &self,
        booking_id: Uuid,
        new_status: BookingStatus,
        stamp: &StatusStamp,
    ) -> Result<Option<Booking>, StoreError>;
    async fn set_payment_status(
        &self,
        booking_id: Uuid,
        payment_status: PaymentStatus,
    ) -> Result<Option<Booking>, StoreError>;
    async fn insert_line_items(&self, items: &[BookingServiceItem]) -> Result<(), StoreError>;
    async fn line_items(&self, booking_id: Uuid) -> Result<Vec<BookingServiceItem>, StoreError>;
    async fn append_history(&self, entry: &StatusHistoryEntry) -> Result<(), StoreError>;
    async fn history(&self, booking_id: Uuid) -> Result<Vec<StatusHistoryEntry>, StoreError>;
    /// Bookings still awaiting payment that were created before the cutoff.
    async fn payment_pending_bookings(
        &self,
        statuses: &[BookingStatus],
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError>;
    /// Compare-and-set claim on the reminder counter. Succeeds only when the
    /// stored count still equals `expected_count`; the winner bumps the count
    /// to `new_count` and stamps `last_reminder_at`. This is the at-most-once
    /// gate for reminder sends.
    async fn claim_reminder(
        &self,
        booking_id: Uuid,
        expected_count: i32,
        new_count: i32,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}

/// Customer contact lookups for notifications and booking listings.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn profile(&self, customer_id: Uuid) -> Result<Option<CustomerProfile>, StoreError>;
}
