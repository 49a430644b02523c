use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::slots::error::SlotError;
use crate::slots::models::{BulkSlotOutcome, CreateSlotRequest, SkippedSlot, TimeSlot};
use crate::store::{BookingStore, SlotStore, UQ_TIME_SLOTS_DATE_START};

/// Slot administration and the public availability listing.
#[derive(Clone)]
pub struct SlotService {
    slots: Arc<dyn SlotStore>,
    bookings: Arc<dyn BookingStore>,
}

impl SlotService {
    pub fn new(slots: Arc<dyn SlotStore>, bookings: Arc<dyn BookingStore>) -> Self {
        Self { slots, bookings }
    }

    /// Create a single slot. Past datetimes and duplicates of an existing
    /// (date, start) pair are rejected; under a concurrent create of the
    /// same pair the unique constraint decides.
    pub async fn create_slot(&self, request: CreateSlotRequest) -> Result<TimeSlot, SlotError> {
        let starts_at = request.slot_date.and_time(request.start_time);
        if starts_at <= Utc::now().naive_utc() {
            return Err(SlotError::SlotInPast {
                date: request.slot_date,
                start: request.start_time,
            });
        }
        if self
            .slots
            .slot_at(request.slot_date, request.start_time)
            .await?
            .is_some()
        {
            return Err(SlotError::DuplicateSlot {
                date: request.slot_date,
                start: request.start_time,
            });
        }

        let slot = TimeSlot {
            id: Uuid::new_v4(),
            slot_date: request.slot_date,
            start_time: request.start_time,
            is_available: true,
            created_by: request.created_by,
            notes: request.notes,
            created_at: Utc::now(),
        };
        match self.slots.insert_slot(&slot).await {
            Ok(()) => {
                info!(
                    "Created slot {} at {} {}",
                    slot.id, slot.slot_date, slot.start_time
                );
                Ok(slot)
            }
            Err(err) if err.is_violation_of(UQ_TIME_SLOTS_DATE_START) => {
                Err(SlotError::DuplicateSlot {
                    date: slot.slot_date,
                    start: slot.start_time,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Bulk create with partial acceptance: past and duplicate entries are
    /// skipped with a reason each, everything else goes in. Duplicates are
    /// caught both against the store and within the request itself.
    pub async fn create_slots_bulk(
        &self,
        entries: Vec<CreateSlotRequest>,
    ) -> Result<BulkSlotOutcome, SlotError> {
        let mut outcome = BulkSlotOutcome {
            created: Vec::new(),
            skipped: Vec::new(),
        };
        let mut seen: HashSet<(NaiveDate, NaiveTime)> = HashSet::new();

        for entry in entries {
            let (date, start) = (entry.slot_date, entry.start_time);
            if !seen.insert((date, start)) {
                outcome.skipped.push(SkippedSlot {
                    slot_date: date,
                    start_time: start,
                    reason: "duplicate within request".to_string(),
                });
                continue;
            }
            match self.create_slot(entry).await {
                Ok(slot) => outcome.created.push(slot),
                Err(SlotError::SlotInPast { .. }) => outcome.skipped.push(SkippedSlot {
                    slot_date: date,
                    start_time: start,
                    reason: "in the past".to_string(),
                }),
                Err(SlotError::DuplicateSlot { .. }) => outcome.skipped.push(SkippedSlot {
                    slot_date: date,
                    start_time: start,
                    reason: "slot already exists".to_string(),
                }),
                // Store failures abort; a partial result would be misleading.
                Err(other) => return Err(other),
            }
        }

        info!(
            "Bulk slot create: {} created, {} skipped",
            outcome.created.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    /// Available slots from a date (default today), ordered by date and
    /// start. The availability flag is a fast path; each candidate is
    /// double-checked against live bookings before being offered.
    pub async fn list_available(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<TimeSlot>, SlotError> {
        let from = from.unwrap_or_else(|| Utc::now().date_naive());
        let candidates = self.slots.available_slots(from, to).await?;

        let mut open = Vec::with_capacity(candidates.len());
        for slot in candidates {
            if self.bookings.live_booking_for_slot(slot.id).await?.is_none() {
                open.push(slot);
            }
        }
        Ok(open)
    }
}
