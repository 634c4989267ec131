pub mod clock;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ValidationError;
