//! Application constants
//!
//! Centralized constants for store sizing, timing, verification and UI dimensions.

/// Transaction store constants
pub mod store {
    /// Maximum number of transactions held by the store (most-recent-first)
    pub const CAPACITY: usize = 100;
}

/// Stream transport constants
pub mod transport {
    /// Keepalive ping cadence while a connection is open (milliseconds)
    pub const KEEPALIVE_MS: u64 = 20_000;

    /// Fixed delay before the single reconnect attempt after a close/error (milliseconds)
    pub const RECONNECT_MS: u64 = 2_000;

    /// Client keepalive frame
    pub const PING_FRAME: &str = r#"{"action":"ping"}"#;
}

/// Step-up verification constants
pub mod verify {
    /// Exact number of digits an OTP must have
    pub const OTP_LEN: usize = 6;

    /// Message shown when the verification request could not reach the backend
    pub const CONNECTIVITY_MSG: &str = "Connection error";

    /// Message shown when the operator blocks from the alert
    pub const USER_BLOCK_MSG: &str = "Transaction blocked by user";

    /// Inline message for a code that is too short
    pub const SHORT_CODE_MSG: &str = "Enter the 6-digit code";
}

/// Backend polling constants
pub mod api {
    /// Aggregate stats poll cadence (milliseconds)
    pub const STATS_POLL_MS: u64 = 5_000;

    /// How many recent transactions to scan when resolving a path by id
    pub const LOOKUP_LIMIT: usize = 200;

    /// Seconds between generated events when the backend stream is (re)started
    pub const STREAM_INTERVAL_SECS: f64 = 3.0;
}

/// UI layout and display constants
pub mod ui {
    /// Minimum terminal width in columns for usable display
    pub const MIN_WIDTH: u16 = 80;

    /// Minimum terminal height in rows for usable display
    pub const MIN_HEIGHT: u16 = 20;

    /// Width threshold for switching to the stacked layout (columns)
    pub const NARROW_THRESHOLD: u16 = 110;
}

/// Application state and behavior constants
pub mod app {
    /// Duration to show toast notifications (seconds)
    pub const TOAST_DURATION_SECS: u64 = 2;

    /// Maximum number of debug log lines to retain in memory
    pub const MAX_DEBUG_LOG_LINES: usize = 50;
}
