// Email notifications for the booking lifecycle.
//
// Delivery is behind the Mailer trait; the default implementation logs the
// message and hands delivery to an external transport. Every dispatch is
// fire-and-forget: a failed send is logged and counted but never fails the
// operation that triggered it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::bookings::models::{Booking, BookingServiceItem, BookingStatus};
use crate::config::BookingConfig;
use crate::metrics::ServiceMetrics;
use crate::models::CustomerProfile;
use crate::payments::paypal;

/// Transport seam for outgoing email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str, text: &str)
        -> anyhow::Result<()>;
}

/// Production mailer: writes the message to the log stream, where the
/// deployment's log shipper forwards it to the delivery service.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        _html: &str,
        text: &str,
    ) -> anyhow::Result<()> {
        info!("Email to {}: {}", to, subject);
        debug!("Email body: {}", text);
        Ok(())
    }
}

/// A captured outgoing email.
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Test double that records every send and can be switched to fail.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
    fail: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, html: &str, text: &str)
        -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("mailer configured to fail");
        }
        self.sent.lock().await.push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Composes and dispatches booking emails. Returns whether the customer
/// email went out; admin copies are logged but never surfaced.
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    config: Arc<BookingConfig>,
    metrics: ServiceMetrics,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, config: Arc<BookingConfig>, metrics: ServiceMetrics) -> Self {
        Self {
            mailer,
            config,
            metrics,
        }
    }

    async fn dispatch(&self, kind: &str, to: &str, subject: &str, text: &str) -> bool {
        let html = format!("<p>{}</p>", text.replace('\n', "</p><p>"));
        match self.mailer.send(to, subject, &html, text).await {
            Ok(()) => true,
            Err(err) => {
                warn!("Failed to send {} email to {}: {:#}", kind, to, err);
                self.metrics.record_email_failure();
                false
            }
        }
    }

    /// Booking-received email with payment instructions, plus an alert to
    /// the admin inbox.
    pub async fn booking_received(
        &self,
        booking: &Booking,
        customer: &CustomerProfile,
        services: &[BookingServiceItem],
    ) -> bool {
        let link = paypal::payment_link(
            &self.config.paypal_handle,
            booking.pricing.total,
            &booking.reference,
            self.config.payment_deadline_hours,
        );
        let service_list = services
            .iter()
            .map(|s| format!("- {} (£{})", s.service_name, s.price))
            .collect::<Vec<_>>()
            .join("\n");
        let text = format!(
            "Hi {},\n\
             We have received your booking {}.\n\
             {} at {} on {}\n\
             {}\n\
             Total: £{} (includes £{} travel)\n\
             Please pay {} at {} quoting your reference.",
            customer.full_name,
            booking.reference,
            vehicle_line(booking),
            booking.start_time.format("%H:%M"),
            booking.scheduled_date.format("%d %B %Y"),
            service_list,
            booking.pricing.total,
            booking.pricing.distance_surcharge,
            link.deadline_text,
            link.url,
        );
        let subject = format!("Booking received - {}", booking.reference);
        let sent = self
            .dispatch("booking-received", &customer.email, &subject, &text)
            .await;

        let admin_text = format!(
            "New booking {} from {} ({}) for {} on {}. Total £{}.",
            booking.reference,
            customer.full_name,
            customer.email,
            vehicle_line(booking),
            booking.scheduled_date.format("%d %B %Y"),
            booking.pricing.total,
        );
        let admin_subject = format!("New booking - {}", booking.reference);
        self.dispatch(
            "admin-new-booking",
            &self.config.admin_email,
            &admin_subject,
            &admin_text,
        )
        .await;

        sent
    }

    /// Status-change email for the statuses customers care about.
    pub async fn status_update(&self, booking: &Booking, customer: &CustomerProfile) -> bool {
        let (subject, line) = match booking.status {
            BookingStatus::Confirmed => (
                format!("Booking confirmed - {}", booking.reference),
                "Your booking is confirmed. We look forward to seeing you.",
            ),
            BookingStatus::Completed => (
                format!("Thanks for your booking - {}", booking.reference),
                "Your vehicle has been detailed. Thank you for your business.",
            ),
            BookingStatus::Cancelled => (
                format!("Booking cancelled - {}", booking.reference),
                "Your booking has been cancelled.",
            ),
            _ => (
                format!("Booking update - {}", booking.reference),
                "Your booking status has changed.",
            ),
        };
        let text = format!(
            "Hi {},\n{}\n{} at {} on {}.",
            customer.full_name,
            line,
            vehicle_line(booking),
            booking.start_time.format("%H:%M"),
            booking.scheduled_date.format("%d %B %Y"),
        );
        self.dispatch("status-update", &customer.email, &subject, &text)
            .await
    }

    /// Cancellation confirmation with the refund position spelled out, plus
    /// an admin copy.
    pub async fn cancellation(
        &self,
        booking: &Booking,
        customer: &CustomerProfile,
        refund_amount: Decimal,
    ) -> bool {
        let refund_line = if refund_amount > Decimal::ZERO {
            format!("A refund of £{} will be issued.", refund_amount)
        } else {
            "As the cancellation falls inside the 24-hour window, no refund is due.".to_string()
        };
        let text = format!(
            "Hi {},\nYour booking {} for {} has been cancelled.\n{}",
            customer.full_name,
            booking.reference,
            booking.scheduled_date.format("%d %B %Y"),
            refund_line,
        );
        let subject = format!("Booking cancelled - {}", booking.reference);
        let sent = self
            .dispatch("cancellation", &customer.email, &subject, &text)
            .await;

        let admin_text = format!(
            "Booking {} cancelled by {} ({}). Refund due: £{}.",
            booking.reference, customer.full_name, customer.email, refund_amount,
        );
        self.dispatch(
            "admin-cancellation",
            &self.config.admin_email,
            &subject,
            &admin_text,
        )
        .await;

        sent
    }

    /// Receipt email once payment is confirmed.
    pub async fn payment_confirmation(&self, booking: &Booking, customer: &CustomerProfile) -> bool {
        let text = format!(
            "Hi {},\nWe have received your payment of £{} for booking {}.\nSee you on {} at {}.",
            customer.full_name,
            booking.pricing.total,
            booking.reference,
            booking.scheduled_date.format("%d %B %Y"),
            booking.start_time.format("%H:%M"),
        );
        let subject = format!("Payment received - {}", booking.reference);
        self.dispatch("payment-confirmation", &customer.email, &subject, &text)
            .await
    }

    /// Tiered overdue-payment chaser with a fresh payment link.
    pub async fn payment_reminder(
        &self,
        booking: &Booking,
        customer: &CustomerProfile,
        tier: &str,
        hours_overdue: i64,
    ) -> bool {
        let link = paypal::payment_link(
            &self.config.paypal_handle,
            booking.pricing.total,
            &booking.reference,
            self.config.payment_deadline_hours,
        );
        let urgency = match tier {
            "final" => "This is our final reminder; unpaid bookings may be declined.",
            "urgent" => "Your booking cannot be confirmed until payment arrives.",
            _ => "Just a gentle nudge in case it slipped your mind.",
        };
        let text = format!(
            "Hi {},\n\
             Payment of £{} for booking {} is now {} hours overdue.\n\
             {}\n\
             Pay at {} quoting your reference.",
            customer.full_name,
            booking.pricing.total,
            booking.reference,
            hours_overdue,
            urgency,
            link.url,
        );
        let subject = format!("Payment reminder ({}) - {}", tier, booking.reference);
        self.dispatch("payment-reminder", &customer.email, &subject, &text)
            .await
    }

    /// Payment-failed pair: the customer is told how to retry, the admin is
    /// alerted to follow up.
    pub async fn payment_failed(&self, booking: &Booking, customer: &CustomerProfile) -> bool {
        let link = paypal::payment_link(
            &self.config.paypal_handle,
            booking.pricing.total,
            &booking.reference,
            self.config.payment_deadline_hours,
        );
        let text = format!(
            "Hi {},\n\
             We could not confirm payment for booking {}.\n\
             Please retry at {} or reply to this email for help.",
            customer.full_name, booking.reference, link.url,
        );
        let subject = format!("Payment problem - {}", booking.reference);
        let sent = self
            .dispatch("payment-failed", &customer.email, &subject, &text)
            .await;

        let admin_text = format!(
            "Payment failed for booking {} ({}, £{}). Customer notified.",
            booking.reference, customer.email, booking.pricing.total,
        );
        self.dispatch(
            "admin-payment-failed",
            &self.config.admin_email,
            &subject,
            &admin_text,
        )
        .await;

        sent
    }
}

fn vehicle_line(booking: &Booking) -> String {
    format!(
        "{} {} ({})",
        booking.vehicle.make,
        booking.vehicle.model,
        booking.vehicle.size.label()
    )
}
