use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use utoipa::ToSchema;

/// A ready-to-share PayPal.me payment request for a booking total.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentLink {
    #[schema(example = "https://paypal.me/mobilevaletdetail/75.50GBP")]
    pub url: String,
    pub amount: Decimal,
    pub reference: String,
    /// Human-readable restatement of the payment deadline for email bodies.
    pub deadline_text: String,
}

/// Build the PayPal.me link for a booking. PayPal.me takes the amount in the
/// path with a trailing currency code; amounts are always sent with pennies.
pub fn payment_link(
    handle: &str,
    amount: Decimal,
    reference: &str,
    deadline_hours: i64,
) -> PaymentLink {
    let amount = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    PaymentLink {
        url: format!("https://paypal.me/{}/{}GBP", handle, amount),
        amount,
        reference: reference.to_string(),
        deadline_text: format!("within {} hours of booking", deadline_hours),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn link_embeds_handle_amount_and_currency() {
        let link = payment_link("mobilevaletdetail", dec!(75.50), "MVD-1748736000000-A1B2", 48);
        assert_eq!(link.url, "https://paypal.me/mobilevaletdetail/75.50GBP");
        assert_eq!(link.amount, dec!(75.50));
        assert_eq!(link.reference, "MVD-1748736000000-A1B2");
        assert_eq!(link.deadline_text, "within 48 hours of booking");
    }

    #[test]
    fn amount_is_rounded_to_pennies() {
        let link = payment_link("mobilevaletdetail", dec!(40.005), "MVD-0-XXXX", 48);
        assert_eq!(link.amount, dec!(40.01));
        assert!(link.url.ends_with("/40.01GBP"));
    }
}
