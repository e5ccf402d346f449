//! Utility modules

pub mod logging;
pub mod smoother;

pub use logging::{init_logger, init_logger_with_level};
pub use smoother::{SmoothedParam, DEFAULT_SMOOTH_TIME_MS};
