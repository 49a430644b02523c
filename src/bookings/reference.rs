use rand::Rng;
use tracing::warn;

use crate::bookings::error::BookingError;
use crate::store::BookingStore;

const BASE36: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const MAX_ATTEMPTS: u32 = 3;

/// Generate one candidate reference: `PREFIX-<unix millis>-<4 base36 chars>`.
/// Customers read these over the phone, hence the short uppercase suffix.
pub fn generate_reference(prefix: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..4)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}-{}-{}", prefix, millis, suffix)
}

/// Generate a reference not already present in the store. Collisions need
/// the same millisecond and the same 36^4 suffix, but the store check costs
/// one indexed lookup; three misses in a row means something is broken.
pub async fn unique_reference(
    store: &dyn BookingStore,
    prefix: &str,
) -> Result<String, BookingError> {
    for attempt in 1..=MAX_ATTEMPTS {
        let candidate = generate_reference(prefix);
        if store.booking_by_reference(&candidate).await?.is_none() {
            return Ok(candidate);
        }
        warn!(
            "Booking reference collision on attempt {}: {}",
            attempt, candidate
        );
    }
    Err(BookingError::Internal(
        "could not generate a unique booking reference".to_string(),
    ))
}
