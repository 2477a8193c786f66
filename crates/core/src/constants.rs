/// Constants used throughout the syncphony codebase
use std::time::Duration;

// Environment variable names
pub const SYNCPHONY_LOG_VAR: &str = "SYNCPHONY_LOG";
pub const SYNCPHONY_TIMEOUT_VAR: &str = "SYNCPHONY_TIMEOUT_SECS";
pub const SYNCPHONY_POLL_INTERVAL_VAR: &str = "SYNCPHONY_POLL_INTERVAL_MS";
pub const SYNCPHONY_MUSICIAN_VAR: &str = "SYNCPHONY_MUSICIAN";

// Run loop timing
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

// Reference worker executable
pub const MUSICIAN_BIN_NAME: &str = "syncphony-musician";

// Progress bounds carried by reports
pub const PROGRESS_MIN: u8 = 0;
pub const PROGRESS_MAX: u8 = 100;
