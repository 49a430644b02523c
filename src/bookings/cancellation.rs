// Cancellation policy. The maths is pure so the window tiering can be
// tested without a store or a clock stub.

use chrono::{Duration, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::bookings::models::{Booking, BookingStatus};

/// Outcome of evaluating the cancellation policy for a booking at a point
/// in time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CancellationPolicyCheck {
    pub can_cancel: bool,
    /// Inside the no-refund window. The window length is configurable; the
    /// field keeps its public name.
    pub is_within_24_hours: bool,
    /// Whole hours until the appointment; negative once it has passed.
    pub hours_until_appointment: i64,
    pub refund_eligible: bool,
    pub warning: String,
}

/// What a completed cancellation did.
#[derive(Debug, Serialize, Deserialize)]
pub struct CancellationOutcome {
    pub booking: Booking,
    pub policy: CancellationPolicyCheck,
    pub slot_released: bool,
    pub email_sent: bool,
    pub refund_amount: Decimal,
}

/// Evaluate the policy from the appointment time, the clock and the booking
/// status. Statuses outside pending/confirmed give a soft "cannot cancel"
/// rather than an error so the policy endpoint can always answer.
pub fn evaluate(
    scheduled_at: NaiveDateTime,
    now: NaiveDateTime,
    status: BookingStatus,
    window_hours: i64,
) -> CancellationPolicyCheck {
    let until = scheduled_at.signed_duration_since(now);
    let hours_until_appointment = until.num_hours();
    let is_within_window = until <= Duration::hours(window_hours);

    if until <= Duration::zero() {
        return CancellationPolicyCheck {
            can_cancel: false,
            is_within_24_hours: true,
            hours_until_appointment,
            refund_eligible: false,
            warning: "This appointment has already passed and can no longer be cancelled"
                .to_string(),
        };
    }

    if !matches!(status, BookingStatus::Pending | BookingStatus::Confirmed) {
        return CancellationPolicyCheck {
            can_cancel: false,
            is_within_24_hours: is_within_window,
            hours_until_appointment,
            refund_eligible: false,
            warning: format!("A booking in status {} cannot be cancelled", status),
        };
    }

    let warning = if until <= Duration::hours(2) {
        "The appointment is less than 2 hours away; a cancellation now will not be refunded"
            .to_string()
    } else if is_within_window {
        format!(
            "Cancelling within {} hours of the appointment forfeits the refund",
            window_hours
        )
    } else {
        format!(
            "More than {} hours before the appointment; cancellation is free",
            window_hours
        )
    };

    CancellationPolicyCheck {
        can_cancel: true,
        is_within_24_hours: is_within_window,
        hours_until_appointment,
        refund_eligible: !is_within_window,
        warning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn check_at(minutes_ahead: i64, status: BookingStatus) -> CancellationPolicyCheck {
        let now = Utc::now().naive_utc();
        evaluate(now + Duration::minutes(minutes_ahead), now, status, 24)
    }

    #[test]
    fn just_outside_the_window_is_refundable() {
        // 24h01m ahead
        let check = check_at(24 * 60 + 1, BookingStatus::Confirmed);
        assert!(check.can_cancel);
        assert!(!check.is_within_24_hours);
        assert!(check.refund_eligible);
        assert_eq!(check.hours_until_appointment, 24);
    }

    #[test]
    fn just_inside_the_window_forfeits_the_refund() {
        // 23h59m ahead
        let check = check_at(24 * 60 - 1, BookingStatus::Confirmed);
        assert!(check.can_cancel);
        assert!(check.is_within_24_hours);
        assert!(!check.refund_eligible);
        assert!(check.warning.contains("forfeits the refund"));
    }

    #[test]
    fn exactly_on_the_boundary_counts_as_inside() {
        let check = check_at(24 * 60, BookingStatus::Pending);
        assert!(check.is_within_24_hours);
        assert!(!check.refund_eligible);
    }

    #[test]
    fn past_appointments_cannot_be_cancelled() {
        let check = check_at(-30, BookingStatus::Confirmed);
        assert!(!check.can_cancel);
        assert!(!check.refund_eligible);
        assert!(check.warning.contains("already passed"));
    }

    #[test]
    fn last_two_hours_get_the_sharper_warning() {
        let check = check_at(90, BookingStatus::Pending);
        assert!(check.can_cancel);
        assert!(check.warning.contains("less than 2 hours"));
    }

    #[test]
    fn non_cancellable_statuses_are_a_soft_no() {
        for status in [
            BookingStatus::Processing,
            BookingStatus::InProgress,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
            BookingStatus::Declined,
            BookingStatus::PaymentFailed,
        ] {
            let check = check_at(48 * 60, status);
            assert!(!check.can_cancel, "{} should not be cancellable", status);
            assert!(check.warning.contains("cannot be cancelled"));
        }
    }

    #[test]
    fn window_length_is_configurable() {
        let now = Utc::now().naive_utc();
        let check = evaluate(now + Duration::hours(36), now, BookingStatus::Pending, 48);
        assert!(check.is_within_24_hours);
        assert!(!check.refund_eligible);
    }
}
