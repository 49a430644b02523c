// Overdue-payment detection and the tiered reminder sweep.
//
// Reminder sends are gated by the durable reminder counter with a
// compare-and-set claim, so concurrent scheduler instances cannot
// double-send. Claim-then-send: losing an email after a successful claim is
// accepted in exchange for at-most-once delivery.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::bookings::models::{Booking, BookingStatus};
use crate::config::BookingConfig;
use crate::metrics::ServiceMetrics;
use crate::models::CustomerProfile;
use crate::notifications::Notifier;
use crate::payments::paypal::{self, PaymentLink};
use crate::store::{BookingStore, CustomerStore, StoreError};

/// Escalation level of a payment chaser. The numeric index doubles as the
/// reminder-counter value a successful send stores, which is what makes a
/// tier send-once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReminderTier {
    Gentle,
    Urgent,
    Final,
}

impl ReminderTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderTier::Gentle => "gentle",
            ReminderTier::Urgent => "urgent",
            ReminderTier::Final => "final",
        }
    }

    /// Reminder count stored once this tier has gone out.
    pub fn index(&self) -> i32 {
        match self {
            ReminderTier::Gentle => 1,
            ReminderTier::Urgent => 2,
            ReminderTier::Final => 3,
        }
    }

    /// The tier due for a payment this many hours past its deadline. Below
    /// the gentle threshold nothing is due yet.
    pub fn for_hours_overdue(hours: i64, config: &BookingConfig) -> Option<ReminderTier> {
        if hours >= config.reminder_final_hours {
            Some(ReminderTier::Final)
        } else if hours >= config.reminder_urgent_hours {
            Some(ReminderTier::Urgent)
        } else if hours >= config.reminder_gentle_hours {
            Some(ReminderTier::Gentle)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ReminderTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A booking past its payment deadline, joined with the customer it belongs
/// to and a fresh payment link. Served as-is to the admin overdue view.
#[derive(Debug, Clone, Serialize)]
pub struct OverduePayment {
    pub booking: Booking,
    pub customer: CustomerProfile,
    pub hours_overdue: i64,
    /// Tier currently due, None while still under the gentle threshold.
    pub tier: Option<ReminderTier>,
    pub payment_link: PaymentLink,
}

/// Outcome of one reminder sweep.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReminderRunSummary {
    /// Overdue bookings examined.
    pub processed: usize,
    /// Reminder emails that went out.
    pub sent: usize,
    /// Per-booking failures; never abort the sweep.
    pub errors: Vec<String>,
}

/// Finds overdue payments and drives the tiered reminder emails.
pub struct ReminderScheduler {
    bookings: Arc<dyn BookingStore>,
    customers: Arc<dyn CustomerStore>,
    notifier: Notifier,
    config: Arc<BookingConfig>,
    metrics: ServiceMetrics,
}

impl ReminderScheduler {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        customers: Arc<dyn CustomerStore>,
        notifier: Notifier,
        config: Arc<BookingConfig>,
        metrics: ServiceMetrics,
    ) -> Self {
        Self {
            bookings,
            customers,
            notifier,
            config,
            metrics,
        }
    }

    /// Bookings awaiting payment whose deadline has passed, oldest debt
    /// first. Bookings whose customer profile is missing are logged and
    /// skipped rather than failing the whole view.
    pub async fn overdue_payments(&self) -> Result<Vec<OverduePayment>, StoreError> {
        let now = Utc::now();
        let cutoff = now - chrono::Duration::hours(self.config.payment_deadline_hours);
        let pending = self
            .bookings
            .payment_pending_bookings(
                &[BookingStatus::Processing, BookingStatus::PaymentFailed],
                cutoff,
            )
            .await?;

        let mut overdue = Vec::with_capacity(pending.len());
        for booking in pending {
            let deadline = self.config.payment_deadline_from(booking.created_at);
            let hours_overdue = (now - deadline).num_hours();

            let customer = match self.customers.profile(booking.customer_id).await? {
                Some(profile) => profile,
                None => {
                    warn!(
                        "Booking {} references missing customer {}; skipping",
                        booking.reference, booking.customer_id
                    );
                    continue;
                }
            };

            let payment_link = paypal::payment_link(
                &self.config.paypal_handle,
                booking.pricing.total,
                &booking.reference,
                self.config.payment_deadline_hours,
            );
            overdue.push(OverduePayment {
                hours_overdue,
                tier: ReminderTier::for_hours_overdue(hours_overdue, &self.config),
                payment_link,
                customer,
                booking,
            });
        }
        overdue.sort_by(|a, b| b.hours_overdue.cmp(&a.hours_overdue));
        Ok(overdue)
    }

    /// One sweep over the overdue list. Each due send is claimed through the
    /// store CAS before the email goes out; a lost claim means another
    /// instance took it.
    pub async fn process_reminders(&self) -> Result<ReminderRunSummary, StoreError> {
        let overdue = self.overdue_payments().await?;
        let mut summary = ReminderRunSummary {
            processed: overdue.len(),
            sent: 0,
            errors: Vec::new(),
        };

        for item in overdue {
            let tier = match item.tier {
                Some(tier) => tier,
                None => continue,
            };
            let booking = &item.booking;

            if booking.reminder_count >= self.config.max_reminders {
                continue;
            }
            // Counter at or past the tier index means this threshold was
            // already chased.
            if booking.reminder_count >= tier.index() {
                continue;
            }

            let claimed = self
                .bookings
                .claim_reminder(booking.id, booking.reminder_count, tier.index(), Utc::now())
                .await?;
            if !claimed {
                debug!(
                    "Reminder for {} claimed by another instance, skipping",
                    booking.reference
                );
                continue;
            }

            let delivered = self
                .notifier
                .payment_reminder(booking, &item.customer, tier.as_str(), item.hours_overdue)
                .await;
            if delivered {
                summary.sent += 1;
                self.metrics.record_reminder_sent();
                info!(
                    "Sent {} payment reminder for {} ({}h overdue)",
                    tier, booking.reference, item.hours_overdue
                );
            } else {
                summary
                    .errors
                    .push(format!("{}: {} reminder email failed", booking.reference, tier));
            }

            tokio::time::sleep(self.config.reminder_send_delay).await;
        }

        Ok(summary)
    }

    /// Periodic sweep loop, spawned at startup. Never returns.
    pub async fn run_forever(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.reminder_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.process_reminders().await {
                Ok(summary) if summary.processed > 0 => {
                    info!(
                        "Reminder sweep: {} overdue, {} sent, {} errors",
                        summary.processed,
                        summary.sent,
                        summary.errors.len()
                    );
                }
                Ok(_) => {}
                Err(err) => warn!("Reminder sweep failed: {}", err),
            }
        }
    }
}
