use crate::bookings::models::BookingStatus;

/// Transition rules for the booking lifecycle
pub struct StatusMachine;

impl StatusMachine {
    /// Check if a status transition is valid
    ///
    /// # Valid Transitions
    /// - Pending → Processing, Confirmed, Cancelled, Declined
    /// - Processing → Confirmed, PaymentFailed, Cancelled
    /// - Confirmed → InProgress, Cancelled
    /// - InProgress → Completed
    /// - Completed, Cancelled, Declined, PaymentFailed → (terminal; admin
    ///   override only)
    /// - Any status → Same status (idempotent)
    pub fn is_valid_transition(from: BookingStatus, to: BookingStatus) -> bool {
        // Same status is always valid (idempotent)
        if from == to {
            return true;
        }

        match (from, to) {
            // From Pending
            (BookingStatus::Pending, BookingStatus::Processing) => true,
            (BookingStatus::Pending, BookingStatus::Confirmed) => true,
            (BookingStatus::Pending, BookingStatus::Cancelled) => true,
            (BookingStatus::Pending, BookingStatus::Declined) => true,

            // From Processing (awaiting payment)
            (BookingStatus::Processing, BookingStatus::Confirmed) => true,
            (BookingStatus::Processing, BookingStatus::PaymentFailed) => true,
            (BookingStatus::Processing, BookingStatus::Cancelled) => true,

            // From Confirmed
            (BookingStatus::Confirmed, BookingStatus::InProgress) => true,
            (BookingStatus::Confirmed, BookingStatus::Cancelled) => true,

            // From InProgress
            (BookingStatus::InProgress, BookingStatus::Completed) => true,

            // All other transitions are invalid, including everything out of
            // the terminal statuses
            _ => false,
        }
    }

    /// Attempt to transition from one status to another
    ///
    /// # Returns
    /// `Ok(to)` if the transition is valid, `Err(message)` otherwise
    pub fn transition(from: BookingStatus, to: BookingStatus) -> Result<BookingStatus, String> {
        if Self::is_valid_transition(from, to) {
            Ok(to)
        } else {
            Err(format!("Invalid status transition from {} to {}", from, to))
        }
    }
}
