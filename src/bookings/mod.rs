pub mod cancellation;
pub mod error;
pub mod handlers;
pub mod models;
pub mod reference;
pub mod service;
pub mod status_machine;

pub use cancellation::*;
pub use error::*;
pub use handlers::*;
pub use models::*;
pub use reference::*;
pub use service::*;
pub use status_machine::*;
