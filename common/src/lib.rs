pub mod buffer2;
pub mod log_setup;

pub use buffer2::Buffer2;
pub use log_setup::{setup_logging, LogLevel};
