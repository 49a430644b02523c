pub mod paypal;
pub mod reminders;

pub use paypal::*;
pub use reminders::*;
