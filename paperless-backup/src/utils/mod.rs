//! Utility modules for the backup tool.

pub mod clock;
pub mod errors;
pub mod logger;

pub use clock::{Clock, FixedClock, SystemClock};
pub use errors::{BackupError, Result};
