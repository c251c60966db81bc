//! # symdex utilities
//!
//! Shared helpers for the symdex workspace. For now that is the logging
//! setup built on `tracing`.

pub mod logging;

// Re-export commonly used logging items for convenience
pub use logging::{default_log_file, init_logging, LogFormat, LogLevel, LogSettings, LoggingError, LoggingGuard};
pub use tracing::{debug, error, info, trace, warn};
