pub mod distance;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod providers;

pub use distance::*;
pub use engine::*;
pub use error::*;
pub use handlers::*;
pub use providers::*;
