// Postgres store adapter.
//
// Row-per-call CRUD against the schema in ./migrations. Multi-row writes are
// intentionally not wrapped in transactions; the booking service sequences
// them and compensates on failure, and the partial unique index on live
// bookings is what actually protects slot exclusivity.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::bookings::models::{
    Booking, BookingServiceItem, BookingStatus, PaymentStatus, PriceBreakdown, ServiceAddress,
    StatusHistoryEntry, StatusStamp, VehicleDetails,
};
use crate::models::{CustomerProfile, DetailingService, VehicleSize};
use crate::slots::models::TimeSlot;
use crate::store::{BookingStore, CatalogStore, CustomerStore, SlotStore, StoreError};

const BOOKING_COLUMNS: &str = "id, reference, customer_id, time_slot_id, \
     vehicle_make, vehicle_model, vehicle_year, vehicle_colour, vehicle_size, \
     address_line1, address_city, address_postcode, \
     scheduled_date, start_time, end_time, status, payment_status, \
     base_subtotal, distance_surcharge, total_price, distance_km, \
     special_instructions, cancellation_reason, \
     confirmed_at, cancelled_at, completed_at, \
     reminder_count, last_reminder_at, created_at, updated_at";

// The catalog read model joins the per-tier pricing row onto the service.
const SERVICE_SELECT: &str = "SELECT s.id, s.name, s.description, s.duration_minutes, s.active, \
     p.price_small, p.price_medium, p.price_large, p.price_extra_large, s.created_at \
     FROM services s LEFT JOIN service_pricing p ON p.service_id = s.id";

const SLOT_COLUMNS: &str =
    "id, slot_date, start_time, is_available, created_by, notes, created_at";

/// Flat row shape for the bookings table; converted into the nested domain
/// model after fetching.
#[derive(Debug, FromRow)]
struct BookingRow {
    id: Uuid,
    reference: String,
    customer_id: Uuid,
    time_slot_id: Uuid,
    vehicle_make: String,
    vehicle_model: String,
    vehicle_year: Option<i32>,
    vehicle_colour: Option<String>,
    vehicle_size: VehicleSize,
    address_line1: String,
    address_city: Option<String>,
    address_postcode: String,
    scheduled_date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    status: BookingStatus,
    payment_status: PaymentStatus,
    base_subtotal: Decimal,
    distance_surcharge: Decimal,
    total_price: Decimal,
    distance_km: Option<Decimal>,
    special_instructions: Option<String>,
    cancellation_reason: Option<String>,
    confirmed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    reminder_count: i32,
    last_reminder_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: row.id,
            reference: row.reference,
            customer_id: row.customer_id,
            time_slot_id: row.time_slot_id,
            vehicle: VehicleDetails {
                make: row.vehicle_make,
                model: row.vehicle_model,
                year: row.vehicle_year,
                colour: row.vehicle_colour,
                size: row.vehicle_size,
            },
            address: ServiceAddress {
                line1: row.address_line1,
                city: row.address_city,
                postcode: row.address_postcode,
            },
            scheduled_date: row.scheduled_date,
            start_time: row.start_time,
            end_time: row.end_time,
            status: row.status,
            payment_status: row.payment_status,
            pricing: PriceBreakdown {
                base_subtotal: row.base_subtotal,
                distance_surcharge: row.distance_surcharge,
                total: row.total_price,
                distance_km: row.distance_km,
            },
            special_instructions: row.special_instructions,
            cancellation_reason: row.cancellation_reason,
            confirmed_at: row.confirmed_at,
            cancelled_at: row.cancelled_at,
            completed_at: row.completed_at,
            reminder_count: row.reminder_count,
            last_reminder_at: row.last_reminder_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Production store backed by a PgPool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn service_by_id(&self, id: Uuid) -> Result<Option<DetailingService>, StoreError> {
        let service = sqlx::query_as::<_, DetailingService>(&format!(
            "{} WHERE s.id = $1",
            SERVICE_SELECT
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(service)
    }

    async fn services_by_ids(&self, ids: &[Uuid]) -> Result<Vec<DetailingService>, StoreError> {
        let services = sqlx::query_as::<_, DetailingService>(&format!(
            "{} WHERE s.id = ANY($1)",
            SERVICE_SELECT
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(services)
    }

    async fn active_services(&self) -> Result<Vec<DetailingService>, StoreError> {
        let services = sqlx::query_as::<_, DetailingService>(&format!(
            "{} WHERE s.active = TRUE ORDER BY s.name",
            SERVICE_SELECT
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(services)
    }
}

#[async_trait]
impl SlotStore for PgStore {
    async fn slot_by_id(&self, id: Uuid) -> Result<Option<TimeSlot>, StoreError> {
        let slot = sqlx::query_as::<_, TimeSlot>(&format!(
            "SELECT {} FROM time_slots WHERE id = $1",
            SLOT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(slot)
    }

    async fn slot_at(
        &self,
        date: NaiveDate,
        start: NaiveTime,
    ) -> Result<Option<TimeSlot>, StoreError> {
        let slot = sqlx::query_as::<_, TimeSlot>(&format!(
            "SELECT {} FROM time_slots WHERE slot_date = $1 AND start_time = $2",
            SLOT_COLUMNS
        ))
        .bind(date)
        .bind(start)
        .fetch_optional(&self.pool)
        .await?;

        Ok(slot)
    }

    async fn insert_slot(&self, slot: &TimeSlot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO time_slots (id, slot_date, start_time, is_available, created_by, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(slot.id)
        .bind(slot.slot_date)
        .bind(slot.start_time)
        .bind(slot.is_available)
        .bind(&slot.created_by)
        .bind(&slot.notes)
        .bind(slot.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_slot_availability(&self, id: Uuid, available: bool) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE time_slots SET is_available = $1 WHERE id = $2")
            .bind(available)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn available_slots(
        &self,
        from: NaiveDate,
        to: Option<NaiveDate>,
    ) -> Result<Vec<TimeSlot>, StoreError> {
        let slots = match to {
            Some(to_date) => {
                sqlx::query_as::<_, TimeSlot>(&format!(
                    "SELECT {} FROM time_slots \
                     WHERE is_available = TRUE AND slot_date >= $1 AND slot_date <= $2 \
                     ORDER BY slot_date, start_time",
                    SLOT_COLUMNS
                ))
                .bind(from)
                .bind(to_date)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, TimeSlot>(&format!(
                    "SELECT {} FROM time_slots \
                     WHERE is_available = TRUE AND slot_date >= $1 \
                     ORDER BY slot_date, start_time",
                    SLOT_COLUMNS
                ))
                .bind(from)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(slots)
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, reference, customer_id, time_slot_id,
                vehicle_make, vehicle_model, vehicle_year, vehicle_colour, vehicle_size,
                address_line1, address_city, address_postcode,
                scheduled_date, start_time, end_time, status, payment_status,
                base_subtotal, distance_surcharge, total_price, distance_km,
                special_instructions, cancellation_reason,
                confirmed_at, cancelled_at, completed_at,
                reminder_count, last_reminder_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19, $20,
                    $21, $22, $23, $24, $25, $26, $27, $28, $29, $30)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.reference)
        .bind(booking.customer_id)
        .bind(booking.time_slot_id)
        .bind(&booking.vehicle.make)
        .bind(&booking.vehicle.model)
        .bind(booking.vehicle.year)
        .bind(&booking.vehicle.colour)
        .bind(booking.vehicle.size)
        .bind(&booking.address.line1)
        .bind(&booking.address.city)
        .bind(&booking.address.postcode)
        .bind(booking.scheduled_date)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(booking.status)
        .bind(booking.payment_status)
        .bind(booking.pricing.base_subtotal)
        .bind(booking.pricing.distance_surcharge)
        .bind(booking.pricing.total)
        .bind(booking.pricing.distance_km)
        .bind(&booking.special_instructions)
        .bind(&booking.cancellation_reason)
        .bind(booking.confirmed_at)
        .bind(booking.cancelled_at)
        .bind(booking.completed_at)
        .bind(booking.reminder_count)
        .bind(booking.last_reminder_at)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_booking(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn booking_by_id(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Booking::from))
    }

    async fn booking_by_reference(&self, reference: &str) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE reference = $1",
            BOOKING_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Booking::from))
    }

    async fn booking_for_customer(
        &self,
        id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1 AND customer_id = $2",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Booking::from))
    }

    async fn bookings_for_customer(
        &self,
        customer_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, StoreError> {
        let rows = match status {
            Some(status_filter) => {
                sqlx::query_as::<_, BookingRow>(&format!(
                    "SELECT {} FROM bookings \
                     WHERE customer_id = $1 AND status = $2 \
                     ORDER BY created_at DESC",
                    BOOKING_COLUMNS
                ))
                .bind(customer_id)
                .bind(status_filter)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, BookingRow>(&format!(
                    "SELECT {} FROM bookings WHERE customer_id = $1 ORDER BY created_at DESC",
                    BOOKING_COLUMNS
                ))
                .bind(customer_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(Booking::from).collect())
    }

    async fn live_booking_for_slot(&self, slot_id: Uuid) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings \
             WHERE time_slot_id = $1 AND status NOT IN ('cancelled', 'declined') \
             LIMIT 1",
            BOOKING_COLUMNS
        ))
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Booking::from))
    }

    async fn update_booking_status(
        &self,
        booking_id: Uuid,
        new_status: BookingStatus,
        stamp: &StatusStamp,
    ) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "UPDATE bookings \
             SET status = $1, \
                 confirmed_at = COALESCE($2, confirmed_at), \
                 cancelled_at = COALESCE($3, cancelled_at), \
                 completed_at = COALESCE($4, completed_at), \
                 cancellation_reason = COALESCE($5, cancellation_reason), \
                 updated_at = NOW() \
             WHERE id = $6 \
             RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(new_status)
        .bind(stamp.confirmed_at)
        .bind(stamp.cancelled_at)
        .bind(stamp.completed_at)
        .bind(&stamp.cancellation_reason)
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Booking::from))
    }

    async fn set_payment_status(
        &self,
        booking_id: Uuid,
        payment_status: PaymentStatus,
    ) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "UPDATE bookings SET payment_status = $1, updated_at = NOW() \
             WHERE id = $2 RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(payment_status)
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Booking::from))
    }

    async fn insert_line_items(&self, items: &[BookingServiceItem]) -> Result<(), StoreError> {
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO booking_services (id, booking_id, service_id, service_name, price, duration_minutes)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(item.id)
            .bind(item.booking_id)
            .bind(item.service_id)
            .bind(&item.service_name)
            .bind(item.price)
            .bind(item.duration_minutes)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn line_items(&self, booking_id: Uuid) -> Result<Vec<BookingServiceItem>, StoreError> {
        let items = sqlx::query_as::<_, BookingServiceItem>(
            r#"
            SELECT id, booking_id, service_id, service_name, price, duration_minutes
            FROM booking_services
            WHERE booking_id = $1
            ORDER BY service_name
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn append_history(&self, entry: &StatusHistoryEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO booking_status_history (id, booking_id, from_status, to_status, actor, reason, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(entry.booking_id)
        .bind(entry.from_status)
        .bind(entry.to_status)
        .bind(&entry.actor)
        .bind(&entry.reason)
        .bind(&entry.notes)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn history(&self, booking_id: Uuid) -> Result<Vec<StatusHistoryEntry>, StoreError> {
        let entries = sqlx::query_as::<_, StatusHistoryEntry>(
            r#"
            SELECT id, booking_id, from_status, to_status, actor, reason, notes, created_at
            FROM booking_status_history
            WHERE booking_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn payment_pending_bookings(
        &self,
        statuses: &[BookingStatus],
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError> {
        // Bind as text[] rather than an enum array type.
        let status_strings: Vec<String> =
            statuses.iter().map(|s| s.as_str().to_string()).collect();

        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings \
             WHERE status = ANY($1) AND created_at < $2 \
             ORDER BY created_at",
            BOOKING_COLUMNS
        ))
        .bind(status_strings)
        .bind(created_before)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Booking::from).collect())
    }

    async fn claim_reminder(
        &self,
        booking_id: Uuid,
        expected_count: i32,
        new_count: i32,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET reminder_count = $1, last_reminder_at = $2, updated_at = NOW()
            WHERE id = $3 AND reminder_count = $4
            "#,
        )
        .bind(new_count)
        .bind(at)
        .bind(booking_id)
        .bind(expected_count)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CustomerStore for PgStore {
    async fn profile(&self, customer_id: Uuid) -> Result<Option<CustomerProfile>, StoreError> {
        let profile = sqlx::query_as::<_, CustomerProfile>(
            "SELECT id, full_name, email, phone, created_at FROM user_profiles WHERE id = $1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }
}
