use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::bookings::cancellation::{self, CancellationOutcome, CancellationPolicyCheck};
use crate::bookings::error::BookingError;
use crate::bookings::models::{
    AdminCancelRequest, Booking, BookingResponse, BookingServiceItem, BookingStatus,
    CancelBookingRequest, CreateBookingRequest, PaymentStatus, StatusHistoryEntry, StatusStamp,
    UpdateStatusRequest,
};
use crate::bookings::reference;
use crate::bookings::status_machine::StatusMachine;
use crate::config::BookingConfig;
use crate::metrics::ServiceMetrics;
use crate::models::CustomerProfile;
use crate::notifications::Notifier;
use crate::pricing::PricingEngine;
use crate::store::{
    BookingStore, CustomerStore, SlotStore, UQ_BOOKINGS_LIVE_SLOT, UQ_BOOKINGS_REFERENCE,
};

/// Orchestrates the booking lifecycle: creation, status changes, payment
/// marking and cancellation. Pricing is delegated to the engine and emails
/// to the notifier; email failures never roll back what the store has
/// already recorded.
#[derive(Clone)]
pub struct BookingService {
    slots: Arc<dyn SlotStore>,
    bookings: Arc<dyn BookingStore>,
    customers: Arc<dyn CustomerStore>,
    pricing: Arc<PricingEngine>,
    notifier: Notifier,
    config: Arc<BookingConfig>,
    metrics: ServiceMetrics,
}

impl BookingService {
    pub fn new(
        slots: Arc<dyn SlotStore>,
        bookings: Arc<dyn BookingStore>,
        customers: Arc<dyn CustomerStore>,
        pricing: Arc<PricingEngine>,
        notifier: Notifier,
        config: Arc<BookingConfig>,
        metrics: ServiceMetrics,
    ) -> Self {
        Self {
            slots,
            bookings,
            customers,
            pricing,
            notifier,
            config,
            metrics,
        }
    }

    /// Create a booking against an open time slot.
    ///
    /// Order matters: the slot gates and the quote run before anything is
    /// written, so a pricing failure leaves no trace. After the booking row
    /// is in, a line item failure rolls the row back again.
    pub async fn create_booking(
        &self,
        request: CreateBookingRequest,
    ) -> Result<BookingResponse, BookingError> {
        let slot = self
            .slots
            .slot_by_id(request.time_slot_id)
            .await?
            .ok_or(BookingError::SlotUnavailable(request.time_slot_id))?;
        if !slot.is_available {
            return Err(BookingError::SlotUnavailable(slot.id));
        }
        if self.bookings.live_booking_for_slot(slot.id).await?.is_some() {
            return Err(BookingError::SlotAlreadyBooked(slot.id));
        }

        let booking_reference =
            reference::unique_reference(self.bookings.as_ref(), &self.config.reference_prefix)
                .await?;

        let (calculations, distance) = self
            .pricing
            .quote_for_postcode(
                &request.service_ids,
                request.vehicle.size,
                &request.address.postcode,
            )
            .await?;
        let pricing = self
            .pricing
            .breakdown(&calculations, Some(distance.distance_km));

        let total_minutes: i64 = calculations
            .iter()
            .map(|c| i64::from(c.duration_minutes))
            .sum();
        let end_time = slot.start_time + Duration::minutes(total_minutes);

        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            reference: booking_reference,
            customer_id: request.customer_id,
            time_slot_id: slot.id,
            vehicle: request.vehicle,
            address: request.address,
            scheduled_date: slot.slot_date,
            start_time: slot.start_time,
            end_time,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            pricing,
            special_instructions: request.special_instructions,
            cancellation_reason: None,
            confirmed_at: None,
            cancelled_at: None,
            completed_at: None,
            reminder_count: 0,
            last_reminder_at: None,
            created_at: now,
            updated_at: now,
        };

        match self.bookings.insert_booking(&booking).await {
            Ok(()) => {}
            // Lost the race for the slot between the pre-check and the write.
            Err(err) if err.is_violation_of(UQ_BOOKINGS_LIVE_SLOT) => {
                return Err(BookingError::SlotAlreadyBooked(slot.id));
            }
            Err(err) if err.is_violation_of(UQ_BOOKINGS_REFERENCE) => {
                return Err(BookingError::Internal(
                    "booking reference collided, please retry".to_string(),
                ));
            }
            Err(err) => return Err(err.into()),
        }

        let items: Vec<BookingServiceItem> = calculations
            .iter()
            .map(|c| BookingServiceItem {
                id: Uuid::new_v4(),
                booking_id: booking.id,
                service_id: c.service_id,
                service_name: c.service_name.clone(),
                price: c.base_price,
                duration_minutes: c.duration_minutes,
            })
            .collect();

        if let Err(err) = self.bookings.insert_line_items(&items).await {
            tracing::error!(
                booking_id = %booking.id,
                error = %err,
                "line item insert failed, rolling the booking back"
            );
            return match self.bookings.delete_booking(booking.id).await {
                Ok(_) => Err(err.into()),
                Err(delete_err) => {
                    tracing::error!(
                        booking_id = %booking.id,
                        error = %delete_err,
                        "compensating delete failed, booking left without line items"
                    );
                    Err(BookingError::PartialWriteFailure(booking.id))
                }
            };
        }

        // The availability flag is a fast path; the live-booking index is
        // what actually guards the slot.
        if let Err(err) = self.slots.set_slot_availability(slot.id, false).await {
            tracing::warn!(slot_id = %slot.id, error = %err, "could not flag slot as taken");
        }

        self.record_history(
            booking.id,
            None,
            BookingStatus::Pending,
            "customer",
            None,
            Some(format!("Booking created with {} service(s)", items.len())),
        )
        .await;

        if let Some(customer) = self.customer_for_email(&booking).await {
            self.notifier
                .booking_received(&booking, &customer, &items)
                .await;
        }

        self.metrics.record_booking_created();
        tracing::info!(
            booking_id = %booking.id,
            reference = %booking.reference,
            total = %booking.pricing.total,
            "booking created"
        );
        Ok(BookingResponse::from_parts(booking, items))
    }

    pub async fn get_booking(&self, id: Uuid) -> Result<BookingResponse, BookingError> {
        let booking = self
            .bookings
            .booking_by_id(id)
            .await?
            .ok_or(BookingError::NotFound(id))?;
        let items = self.bookings.line_items(id).await?;
        Ok(BookingResponse::from_parts(booking, items))
    }

    /// Customer-scoped fetch. Someone else's booking reads as access denied,
    /// not as missing.
    pub async fn get_booking_for_customer(
        &self,
        id: Uuid,
        customer_id: Uuid,
    ) -> Result<BookingResponse, BookingError> {
        match self.bookings.booking_for_customer(id, customer_id).await? {
            Some(booking) => {
                let items = self.bookings.line_items(id).await?;
                Ok(BookingResponse::from_parts(booking, items))
            }
            None => {
                if self.bookings.booking_by_id(id).await?.is_some() {
                    Err(BookingError::AccessDenied(id))
                } else {
                    Err(BookingError::NotFound(id))
                }
            }
        }
    }

    /// A customer's bookings, newest first, optionally filtered by status.
    pub async fn bookings_for_customer(
        &self,
        customer_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<BookingResponse>, BookingError> {
        let bookings = self
            .bookings
            .bookings_for_customer(customer_id, status)
            .await?;
        let mut responses = Vec::with_capacity(bookings.len());
        for booking in bookings {
            let items = self.bookings.line_items(booking.id).await?;
            responses.push(BookingResponse::from_parts(booking, items));
        }
        Ok(responses)
    }

    pub async fn booking_history(
        &self,
        id: Uuid,
    ) -> Result<Vec<StatusHistoryEntry>, BookingError> {
        if self.bookings.booking_by_id(id).await?.is_none() {
            return Err(BookingError::NotFound(id));
        }
        Ok(self.bookings.history(id).await?)
    }

    /// Move a booking through the lifecycle table. Same-status updates are
    /// idempotent no-ops; anything off the table needs `force`, which is
    /// honoured but logged loudly and marked in the history.
    pub async fn update_status(
        &self,
        id: Uuid,
        request: UpdateStatusRequest,
    ) -> Result<BookingResponse, BookingError> {
        let booking = self
            .bookings
            .booking_by_id(id)
            .await?
            .ok_or(BookingError::NotFound(id))?;
        let from = booking.status;
        let to = request.status;

        if from == to {
            let items = self.bookings.line_items(id).await?;
            return Ok(BookingResponse::from_parts(booking, items));
        }

        let forced = !StatusMachine::is_valid_transition(from, to);
        if forced {
            if !request.force {
                return Err(BookingError::InvalidTransition { from, to });
            }
            tracing::warn!(
                booking_id = %id,
                from = %from,
                to = %to,
                "forced status override outside the lifecycle table"
            );
        }

        let stamp = StatusStamp::for_transition(to, Utc::now(), request.reason.clone());
        let updated = self
            .bookings
            .update_booking_status(id, to, &stamp)
            .await?
            .ok_or(BookingError::NotFound(id))?;

        let actor = request.actor.as_deref().unwrap_or("admin");
        let notes = match (request.notes.clone(), forced) {
            (Some(notes), true) => Some(format!("{} [forced override]", notes)),
            (None, true) => Some("forced override".to_string()),
            (notes, false) => notes,
        };
        self.record_history(id, Some(from), to, actor, request.reason.clone(), notes)
            .await;

        // Cancelled and declined bookings stop occupying the slot.
        if matches!(to, BookingStatus::Cancelled | BookingStatus::Declined) {
            self.release_slot(&updated).await;
        }

        if request.notify {
            if let Some(customer) = self.customer_for_email(&updated).await {
                match to {
                    BookingStatus::Confirmed
                    | BookingStatus::Cancelled
                    | BookingStatus::Completed => {
                        self.notifier.status_update(&updated, &customer).await;
                    }
                    BookingStatus::PaymentFailed => {
                        self.notifier.payment_failed(&updated, &customer).await;
                    }
                    _ => {}
                }
            }
        }

        let items = self.bookings.line_items(id).await?;
        Ok(BookingResponse::from_parts(updated, items))
    }

    /// Record a PayPal payment against the booking. A processing booking
    /// confirms on payment; other statuses keep their place in the lifecycle.
    pub async fn mark_paid(&self, id: Uuid) -> Result<BookingResponse, BookingError> {
        let booking = self
            .bookings
            .booking_by_id(id)
            .await?
            .ok_or(BookingError::NotFound(id))?;

        let mut updated = self
            .bookings
            .set_payment_status(id, PaymentStatus::Paid)
            .await?
            .ok_or(BookingError::NotFound(id))?;

        if booking.status == BookingStatus::Processing {
            let stamp = StatusStamp::for_transition(BookingStatus::Confirmed, Utc::now(), None);
            if let Some(confirmed) = self
                .bookings
                .update_booking_status(id, BookingStatus::Confirmed, &stamp)
                .await?
            {
                self.record_history(
                    id,
                    Some(BookingStatus::Processing),
                    BookingStatus::Confirmed,
                    "system",
                    Some("payment received".to_string()),
                    None,
                )
                .await;
                updated = confirmed;
            }
        }

        if let Some(customer) = self.customer_for_email(&updated).await {
            self.notifier.payment_confirmation(&updated, &customer).await;
        }

        let items = self.bookings.line_items(id).await?;
        Ok(BookingResponse::from_parts(updated, items))
    }

    /// Policy check without side effects, for the pre-cancellation prompt.
    pub async fn cancellation_policy(
        &self,
        id: Uuid,
    ) -> Result<CancellationPolicyCheck, BookingError> {
        let booking = self
            .bookings
            .booking_by_id(id)
            .await?
            .ok_or(BookingError::NotFound(id))?;
        Ok(cancellation::evaluate(
            booking.scheduled_at(),
            Utc::now().naive_utc(),
            booking.status,
            self.config.cancellation_window_hours,
        ))
    }

    /// Customer cancellation. The policy is re-derived at execution time:
    /// inside the no-refund window the customer must have acknowledged the
    /// forfeit, and once the appointment has passed the request is refused.
    pub async fn cancel_booking(
        &self,
        id: Uuid,
        request: CancelBookingRequest,
    ) -> Result<CancellationOutcome, BookingError> {
        let booking = self
            .bookings
            .booking_by_id(id)
            .await?
            .ok_or(BookingError::NotFound(id))?;
        if booking.customer_id != request.customer_id {
            return Err(BookingError::AccessDenied(id));
        }

        let policy = cancellation::evaluate(
            booking.scheduled_at(),
            Utc::now().naive_utc(),
            booking.status,
            self.config.cancellation_window_hours,
        );
        if !policy.can_cancel {
            return Err(BookingError::CannotCancel(policy.warning));
        }
        if policy.is_within_24_hours && !request.acknowledged_no_refund {
            return Err(BookingError::AcknowledgmentRequired {
                hours_until_appointment: policy.hours_until_appointment,
            });
        }

        let reason = request
            .reason
            .clone()
            .unwrap_or_else(|| "Cancelled by customer".to_string());
        let stamp =
            StatusStamp::for_transition(BookingStatus::Cancelled, Utc::now(), Some(reason.clone()));
        let mut cancelled = self
            .bookings
            .update_booking_status(id, BookingStatus::Cancelled, &stamp)
            .await?
            .ok_or(BookingError::NotFound(id))?;

        let refund_amount = if policy.refund_eligible {
            booking.pricing.total
        } else {
            Decimal::ZERO
        };
        if refund_amount > Decimal::ZERO && booking.payment_status == PaymentStatus::Paid {
            match self
                .bookings
                .set_payment_status(id, PaymentStatus::Refunded)
                .await
            {
                Ok(Some(refunded)) => cancelled = refunded,
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(booking_id = %id, error = %err, "failed to record refund");
                }
            }
        }

        let slot_released = self.release_slot(&cancelled).await;

        let notes = if policy.refund_eligible {
            format!("Refund eligible: £{}", refund_amount)
        } else {
            "No refund due, cancellation inside the window".to_string()
        };
        self.record_history(
            id,
            Some(booking.status),
            BookingStatus::Cancelled,
            "customer",
            Some(reason),
            Some(notes),
        )
        .await;

        let email_sent = match self.customer_for_email(&cancelled).await {
            Some(customer) => {
                self.notifier
                    .cancellation(&cancelled, &customer, refund_amount)
                    .await
            }
            None => false,
        };

        tracing::info!(
            booking_id = %id,
            refund = %refund_amount,
            slot_released,
            "booking cancelled by customer"
        );
        Ok(CancellationOutcome {
            booking: cancelled,
            policy,
            slot_released,
            email_sent,
            refund_amount,
        })
    }

    /// Admin cancellation: skips the acknowledgment and past-appointment
    /// gates and takes an explicit refund figure. Completed, cancelled and
    /// declined bookings stay closed; a payment_failed one may still be
    /// cleaned up this way.
    pub async fn admin_cancel(
        &self,
        id: Uuid,
        request: AdminCancelRequest,
    ) -> Result<CancellationOutcome, BookingError> {
        let booking = self
            .bookings
            .booking_by_id(id)
            .await?
            .ok_or(BookingError::NotFound(id))?;
        if matches!(
            booking.status,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Declined
        ) {
            return Err(BookingError::CannotCancel(format!(
                "booking is already {}",
                booking.status
            )));
        }

        let policy = cancellation::evaluate(
            booking.scheduled_at(),
            Utc::now().naive_utc(),
            booking.status,
            self.config.cancellation_window_hours,
        );

        let stamp = StatusStamp::for_transition(
            BookingStatus::Cancelled,
            Utc::now(),
            Some(request.reason.clone()),
        );
        let mut cancelled = self
            .bookings
            .update_booking_status(id, BookingStatus::Cancelled, &stamp)
            .await?
            .ok_or(BookingError::NotFound(id))?;

        let refund_amount = request.refund_amount.unwrap_or(Decimal::ZERO);
        if refund_amount > Decimal::ZERO && booking.payment_status == PaymentStatus::Paid {
            match self
                .bookings
                .set_payment_status(id, PaymentStatus::Refunded)
                .await
            {
                Ok(Some(refunded)) => cancelled = refunded,
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(booking_id = %id, error = %err, "failed to record refund");
                }
            }
        }

        let slot_released = self.release_slot(&cancelled).await;

        let actor = request.actor.as_deref().unwrap_or("admin");
        self.record_history(
            id,
            Some(booking.status),
            BookingStatus::Cancelled,
            actor,
            Some(request.reason.clone()),
            Some(format!("Admin cancellation, refund £{}", refund_amount)),
        )
        .await;

        let email_sent = match self.customer_for_email(&cancelled).await {
            Some(customer) => {
                self.notifier
                    .cancellation(&cancelled, &customer, refund_amount)
                    .await
            }
            None => false,
        };

        tracing::info!(
            booking_id = %id,
            actor,
            refund = %refund_amount,
            "booking cancelled by admin"
        );
        Ok(CancellationOutcome {
            booking: cancelled,
            policy,
            slot_released,
            email_sent,
            refund_amount,
        })
    }

    async fn customer_for_email(&self, booking: &Booking) -> Option<CustomerProfile> {
        match self.customers.profile(booking.customer_id).await {
            Ok(Some(profile)) => Some(profile),
            Ok(None) => {
                tracing::warn!(
                    customer_id = %booking.customer_id,
                    "no customer profile on record, skipping email"
                );
                None
            }
            Err(err) => {
                tracing::warn!(
                    customer_id = %booking.customer_id,
                    error = %err,
                    "customer profile lookup failed, skipping email"
                );
                None
            }
        }
    }

    async fn release_slot(&self, booking: &Booking) -> bool {
        match self
            .slots
            .set_slot_availability(booking.time_slot_id, true)
            .await
        {
            Ok(existed) => existed,
            Err(err) => {
                tracing::error!(
                    booking_id = %booking.id,
                    slot_id = %booking.time_slot_id,
                    error = %err,
                    "failed to release time slot"
                );
                false
            }
        }
    }

    async fn record_history(
        &self,
        booking_id: Uuid,
        from: Option<BookingStatus>,
        to: BookingStatus,
        actor: &str,
        reason: Option<String>,
        notes: Option<String>,
    ) {
        let entry = StatusHistoryEntry {
            id: Uuid::new_v4(),
            booking_id,
            from_status: from,
            to_status: to,
            actor: actor.to_string(),
            reason,
            notes,
            created_at: Utc::now(),
        };
        if let Err(err) = self.bookings.append_history(&entry).await {
            tracing::error!(
                booking_id = %booking_id,
                error = %err,
                "failed to append status history"
            );
        }
    }
}
