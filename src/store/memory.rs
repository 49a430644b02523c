// In-memory store adapter.
//
// Backs the integration tests and local development. Mirrors the Postgres
// schema's unique constraints under the same names so conflict handling in
// the services behaves identically against either backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::bookings::models::{
    Booking, BookingServiceItem, BookingStatus, PaymentStatus, StatusHistoryEntry, StatusStamp,
};
use crate::models::{CustomerProfile, DetailingService};
use crate::slots::models::TimeSlot;
use crate::store::{
    BookingStore, CatalogStore, CustomerStore, SlotStore, StoreError, UQ_BOOKINGS_LIVE_SLOT,
    UQ_BOOKINGS_REFERENCE, UQ_TIME_SLOTS_DATE_START,
};

#[derive(Default)]
struct MemoryInner {
    services: HashMap<Uuid, DetailingService>,
    slots: HashMap<Uuid, TimeSlot>,
    bookings: HashMap<Uuid, Booking>,
    line_items: HashMap<Uuid, Vec<BookingServiceItem>>,
    history: Vec<StatusHistoryEntry>,
    profiles: HashMap<Uuid, CustomerProfile>,
    fail_next_line_item_insert: bool,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_service(&self, service: DetailingService) {
        self.inner.write().await.services.insert(service.id, service);
    }

    pub async fn seed_slot(&self, slot: TimeSlot) {
        self.inner.write().await.slots.insert(slot.id, slot);
    }

    pub async fn seed_profile(&self, profile: CustomerProfile) {
        self.inner.write().await.profiles.insert(profile.id, profile);
    }

    /// Insert a booking directly, bypassing constraint checks. Lets tests
    /// construct histories such as long-overdue unpaid bookings.
    pub async fn seed_booking(&self, booking: Booking) {
        self.inner.write().await.bookings.insert(booking.id, booking);
    }

    /// Make the next insert_line_items call fail once. Exercises the
    /// create-path compensation logic.
    pub async fn fail_next_line_item_insert(&self) {
        self.inner.write().await.fail_next_line_item_insert = true;
    }
}

fn slot_conflict(inner: &MemoryInner, slot_id: Uuid, exclude: Uuid) -> bool {
    inner
        .bookings
        .values()
        .any(|b| b.id != exclude && b.time_slot_id == slot_id && b.status.is_live())
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn service_by_id(&self, id: Uuid) -> Result<Option<DetailingService>, StoreError> {
        Ok(self.inner.read().await.services.get(&id).cloned())
    }

    async fn services_by_ids(&self, ids: &[Uuid]) -> Result<Vec<DetailingService>, StoreError> {
        let inner = self.inner.read().await;
        Ok(ids.iter().filter_map(|id| inner.services.get(id).cloned()).collect())
    }

    async fn active_services(&self) -> Result<Vec<DetailingService>, StoreError> {
        let inner = self.inner.read().await;
        let mut services: Vec<_> = inner.services.values().filter(|s| s.active).cloned().collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(services)
    }
}

#[async_trait]
impl SlotStore for MemoryStore {
    async fn slot_by_id(&self, id: Uuid) -> Result<Option<TimeSlot>, StoreError> {
        Ok(self.inner.read().await.slots.get(&id).cloned())
    }

    async fn slot_at(
        &self,
        date: NaiveDate,
        start: NaiveTime,
    ) -> Result<Option<TimeSlot>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .slots
            .values()
            .find(|s| s.slot_date == date && s.start_time == start)
            .cloned())
    }

    async fn insert_slot(&self, slot: &TimeSlot) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner
            .slots
            .values()
            .any(|s| s.slot_date == slot.slot_date && s.start_time == slot.start_time)
        {
            return Err(StoreError::UniqueViolation(
                UQ_TIME_SLOTS_DATE_START.to_string(),
            ));
        }
        inner.slots.insert(slot.id, slot.clone());
        Ok(())
    }

    async fn set_slot_availability(&self, id: Uuid, available: bool) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.slots.get_mut(&id) {
            Some(slot) => {
                slot.is_available = available;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn available_slots(
        &self,
        from: NaiveDate,
        to: Option<NaiveDate>,
    ) -> Result<Vec<TimeSlot>, StoreError> {
        let inner = self.inner.read().await;
        let mut slots: Vec<_> = inner
            .slots
            .values()
            .filter(|s| s.is_available && s.slot_date >= from)
            .filter(|s| to.map_or(true, |to_date| s.slot_date <= to_date))
            .cloned()
            .collect();
        slots.sort_by_key(|s| (s.slot_date, s.start_time));
        Ok(slots)
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if booking.status.is_live() && slot_conflict(&inner, booking.time_slot_id, booking.id) {
            return Err(StoreError::UniqueViolation(UQ_BOOKINGS_LIVE_SLOT.to_string()));
        }
        if inner.bookings.values().any(|b| b.reference == booking.reference) {
            return Err(StoreError::UniqueViolation(UQ_BOOKINGS_REFERENCE.to_string()));
        }
        inner.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn delete_booking(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let removed = inner.bookings.remove(&id).is_some();
        if removed {
            // Cascade like the schema does.
            inner.line_items.remove(&id);
            inner.history.retain(|h| h.booking_id != id);
        }
        Ok(removed)
    }

    async fn booking_by_id(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.inner.read().await.bookings.get(&id).cloned())
    }

    async fn booking_by_reference(&self, reference: &str) -> Result<Option<Booking>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.bookings.values().find(|b| b.reference == reference).cloned())
    }

    async fn booking_for_customer(
        &self,
        id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Booking>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .bookings
            .get(&id)
            .filter(|b| b.customer_id == customer_id)
            .cloned())
    }

    async fn bookings_for_customer(
        &self,
        customer_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, StoreError> {
        let inner = self.inner.read().await;
        let mut bookings: Vec<_> = inner
            .bookings
            .values()
            .filter(|b| b.customer_id == customer_id)
            .filter(|b| status.map_or(true, |s| b.status == s))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| std::cmp::Reverse(b.created_at));
        Ok(bookings)
    }

    async fn live_booking_for_slot(&self, slot_id: Uuid) -> Result<Option<Booking>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .bookings
            .values()
            .find(|b| b.time_slot_id == slot_id && b.status.is_live())
            .cloned())
    }

    async fn update_booking_status(
        &self,
        booking_id: Uuid,
        new_status: BookingStatus,
        stamp: &StatusStamp,
    ) -> Result<Option<Booking>, StoreError> {
        let mut inner = self.inner.write().await;

        // Reviving a dead booking may collide with a newer live one on the
        // same slot, exactly as the partial unique index would.
        if let Some(existing) = inner.bookings.get(&booking_id) {
            if new_status.is_live()
                && !existing.status.is_live()
                && slot_conflict(&inner, existing.time_slot_id, booking_id)
            {
                return Err(StoreError::UniqueViolation(UQ_BOOKINGS_LIVE_SLOT.to_string()));
            }
        }

        match inner.bookings.get_mut(&booking_id) {
            Some(booking) => {
                booking.status = new_status;
                if stamp.confirmed_at.is_some() {
                    booking.confirmed_at = stamp.confirmed_at;
                }
                if stamp.cancelled_at.is_some() {
                    booking.cancelled_at = stamp.cancelled_at;
                }
                if stamp.completed_at.is_some() {
                    booking.completed_at = stamp.completed_at;
                }
                if stamp.cancellation_reason.is_some() {
                    booking.cancellation_reason = stamp.cancellation_reason.clone();
                }
                booking.updated_at = Utc::now();
                Ok(Some(booking.clone()))
            }
            None => Ok(None),
        }
    }

    async fn set_payment_status(
        &self,
        booking_id: Uuid,
        payment_status: PaymentStatus,
    ) -> Result<Option<Booking>, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.bookings.get_mut(&booking_id) {
            Some(booking) => {
                booking.payment_status = payment_status;
                booking.updated_at = Utc::now();
                Ok(Some(booking.clone()))
            }
            None => Ok(None),
        }
    }

    async fn insert_line_items(&self, items: &[BookingServiceItem]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.fail_next_line_item_insert {
            inner.fail_next_line_item_insert = false;
            return Err(StoreError::Backend("injected line item failure".to_string()));
        }
        for item in items {
            inner
                .line_items
                .entry(item.booking_id)
                .or_default()
                .push(item.clone());
        }
        Ok(())
    }

    async fn line_items(&self, booking_id: Uuid) -> Result<Vec<BookingServiceItem>, StoreError> {
        let inner = self.inner.read().await;
        let mut items = inner.line_items.get(&booking_id).cloned().unwrap_or_default();
        items.sort_by(|a, b| a.service_name.cmp(&b.service_name));
        Ok(items)
    }

    async fn append_history(&self, entry: &StatusHistoryEntry) -> Result<(), StoreError> {
        self.inner.write().await.history.push(entry.clone());
        Ok(())
    }

    async fn history(&self, booking_id: Uuid) -> Result<Vec<StatusHistoryEntry>, StoreError> {
        let inner = self.inner.read().await;
        let mut entries: Vec<_> = inner
            .history
            .iter()
            .filter(|h| h.booking_id == booking_id)
            .cloned()
            .collect();
        entries.sort_by_key(|h| h.created_at);
        Ok(entries)
    }

    async fn payment_pending_bookings(
        &self,
        statuses: &[BookingStatus],
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError> {
        let inner = self.inner.read().await;
        let mut bookings: Vec<_> = inner
            .bookings
            .values()
            .filter(|b| statuses.contains(&b.status) && b.created_at < created_before)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }

    async fn claim_reminder(
        &self,
        booking_id: Uuid,
        expected_count: i32,
        new_count: i32,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.bookings.get_mut(&booking_id) {
            Some(booking) if booking.reminder_count == expected_count => {
                booking.reminder_count = new_count;
                booking.last_reminder_at = Some(at);
                booking.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl CustomerStore for MemoryStore {
    async fn profile(&self, customer_id: Uuid) -> Result<Option<CustomerProfile>, StoreError> {
        Ok(self.inner.read().await.profiles.get(&customer_id).cloned())
    }
}
