// Runtime configuration for the detailing API.
// Values come from the environment with sensible defaults, so tests and
// local runs work without a .env file.

use std::time::Duration;

use rust_decimal::Decimal;

/// Tunable business parameters shared across the pricing, cancellation and
/// reminder components. Constructed once at startup and passed by Arc.
#[derive(Debug, Clone)]
pub struct BookingConfig {
    /// Travel distance covered by every quote before surcharging starts, in km.
    pub free_radius_km: Decimal,
    /// Surcharge applied per chargeable km.
    pub surcharge_per_km: Decimal,
    /// Cancellations closer to the appointment than this forfeit the refund.
    pub cancellation_window_hours: i64,
    /// How long after creation an unpaid booking may stay unpaid.
    pub payment_deadline_hours: i64,
    /// Hours past the payment deadline at which each reminder tier engages.
    pub reminder_gentle_hours: i64,
    pub reminder_urgent_hours: i64,
    pub reminder_final_hours: i64,
    /// Hard cap on reminder emails per booking.
    pub max_reminders: i32,
    /// Fallback appointment length for services without a configured duration.
    pub default_service_duration_min: i64,
    /// Prefix for generated booking references, e.g. "MVD" in MVD-...-X4K9.
    pub reference_prefix: String,
    /// Postcode the van departs from; the origin of every distance lookup.
    pub base_postcode: String,
    pub admin_email: String,
    /// PayPal.me handle used to build payment links.
    pub paypal_handle: String,
    /// Per-call timeout for external distance providers.
    pub provider_timeout: Duration,
    /// How long a resolved distance stays cached for a postcode pair.
    pub distance_cache_ttl: Duration,
    /// Pause between consecutive reminder emails in one run.
    pub reminder_send_delay: Duration,
    /// Cadence of the background reminder sweep.
    pub reminder_interval: Duration,
    /// API key for the distance-matrix provider; without it that provider
    /// is skipped in the fallback chain.
    pub matrix_api_key: Option<String>,
    pub osrm_base_url: String,
    pub postcode_api_url: String,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            free_radius_km: Decimal::new(5, 0),
            surcharge_per_km: Decimal::new(150, 2),
            cancellation_window_hours: 24,
            payment_deadline_hours: 48,
            reminder_gentle_hours: 24,
            reminder_urgent_hours: 48,
            reminder_final_hours: 72,
            max_reminders: 3,
            default_service_duration_min: 60,
            reference_prefix: "MVD".to_string(),
            base_postcode: "BS1 4DJ".to_string(),
            admin_email: "bookings@mobilevaletdetail.co.uk".to_string(),
            paypal_handle: "mobilevaletdetail".to_string(),
            provider_timeout: Duration::from_secs(5),
            distance_cache_ttl: Duration::from_secs(24 * 60 * 60),
            reminder_send_delay: Duration::from_millis(250),
            reminder_interval: Duration::from_secs(60 * 60),
            matrix_api_key: None,
            osrm_base_url: "https://router.project-osrm.org".to_string(),
            postcode_api_url: "https://api.postcodes.io".to_string(),
        }
    }
}

impl BookingConfig {
    /// Build configuration from environment variables, falling back to the
    /// defaults above for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            free_radius_km: env_decimal("FREE_RADIUS_KM", defaults.free_radius_km),
            surcharge_per_km: env_decimal("SURCHARGE_PER_KM", defaults.surcharge_per_km),
            cancellation_window_hours: env_i64(
                "CANCELLATION_WINDOW_HOURS",
                defaults.cancellation_window_hours,
            ),
            payment_deadline_hours: env_i64(
                "PAYMENT_DEADLINE_HOURS",
                defaults.payment_deadline_hours,
            ),
            reminder_gentle_hours: env_i64("REMINDER_GENTLE_HOURS", defaults.reminder_gentle_hours),
            reminder_urgent_hours: env_i64("REMINDER_URGENT_HOURS", defaults.reminder_urgent_hours),
            reminder_final_hours: env_i64("REMINDER_FINAL_HOURS", defaults.reminder_final_hours),
            max_reminders: env_i64("MAX_REMINDERS", defaults.max_reminders as i64) as i32,
            default_service_duration_min: env_i64(
                "DEFAULT_SERVICE_DURATION_MIN",
                defaults.default_service_duration_min,
            ),
            reference_prefix: env_string("BOOKING_REFERENCE_PREFIX", defaults.reference_prefix),
            base_postcode: env_string("BASE_POSTCODE", defaults.base_postcode),
            admin_email: env_string("ADMIN_EMAIL", defaults.admin_email),
            paypal_handle: env_string("PAYPAL_HANDLE", defaults.paypal_handle),
            provider_timeout: Duration::from_secs(env_i64("DISTANCE_PROVIDER_TIMEOUT_SECS", 5) as u64),
            distance_cache_ttl: Duration::from_secs(
                env_i64("DISTANCE_CACHE_TTL_SECS", 24 * 60 * 60) as u64,
            ),
            reminder_send_delay: Duration::from_millis(env_i64("REMINDER_SEND_DELAY_MS", 250) as u64),
            reminder_interval: Duration::from_secs(env_i64("REMINDER_INTERVAL_SECS", 3600) as u64),
            matrix_api_key: std::env::var("DISTANCE_MATRIX_API_KEY").ok().filter(|k| !k.is_empty()),
            osrm_base_url: env_string("OSRM_BASE_URL", defaults.osrm_base_url),
            postcode_api_url: env_string("POSTCODE_API_URL", defaults.postcode_api_url),
        }
    }

    /// Deadline instant for a booking created at `created_at`.
    pub fn payment_deadline_from(&self, created_at: chrono::DateTime<chrono::Utc>) -> chrono::DateTime<chrono::Utc> {
        created_at + chrono::Duration::hours(self.payment_deadline_hours)
    }
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_decimal(key: &str, default: Decimal) -> Decimal {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_match_published_policy() {
        let cfg = BookingConfig::default();
        assert_eq!(cfg.free_radius_km, dec!(5));
        assert_eq!(cfg.surcharge_per_km, dec!(1.50));
        assert_eq!(cfg.cancellation_window_hours, 24);
        assert_eq!(cfg.payment_deadline_hours, 48);
        assert_eq!(cfg.max_reminders, 3);
    }

    #[test]
    fn payment_deadline_is_created_at_plus_window() {
        let cfg = BookingConfig::default();
        let created = chrono::Utc::now();
        assert_eq!(
            cfg.payment_deadline_from(created) - created,
            chrono::Duration::hours(48)
        );
    }
}
