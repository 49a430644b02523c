use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// A bookable appointment slot. Availability is a fast-path flag kept in
/// step with bookings; the live-booking unique index is the real guard.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TimeSlot {
    pub id: Uuid,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub is_available: bool,
    pub created_by: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TimeSlot {
    pub fn starts_at(&self) -> chrono::NaiveDateTime {
        self.slot_date.and_time(self.start_time)
    }
}

/// Request DTO for creating a single slot
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSlotRequest {
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

/// Request DTO for creating a batch of slots in one call
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BulkCreateSlotsRequest {
    #[validate(length(min = 1, max = 100, message = "Provide between 1 and 100 slots"))]
    pub slots: Vec<CreateSlotRequest>,
}

/// Per-entry reason a bulk slot was not created
#[derive(Debug, Serialize, ToSchema)]
pub struct SkippedSlot {
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub reason: String,
}

/// Outcome of a bulk create: what went in, what was filtered and why
#[derive(Debug, Serialize, ToSchema)]
pub struct BulkSlotOutcome {
    pub created: Vec<TimeSlot>,
    pub skipped: Vec<SkippedSlot>,
}

/// Query parameters for the public slot listing
#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_joins_date_and_time() {
        let slot = TimeSlot {
            id: Uuid::new_v4(),
            slot_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            is_available: true,
            created_by: None,
            notes: None,
            created_at: Utc::now(),
        };
        assert_eq!(
            slot.starts_at(),
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap().and_hms_opt(10, 30, 0).unwrap()
        );
    }

    #[test]
    fn bulk_request_bounds_enforced() {
        use validator::Validate;
        let request = BulkCreateSlotsRequest { slots: vec![] };
        assert!(request.validate().is_err());
    }
}
