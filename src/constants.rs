/// Length of the table code that prefixes every record id (`exa-...`)
pub const TABLE_CODE_LEN: usize = 3;

/// Separator between the table code and the rest of a record id
pub const ID_SEPARATOR: char = '-';

/// Number of id characters shown in select-option labels
pub const ID_DISPLAY_LENGTH: usize = 8;

/// Appended to a label id when it was truncated
pub const ID_TRUNCATION_SENTINEL: &str = "*";

/// Maximum characters in a `name` field
pub const MAX_NAME_LENGTH: usize = 50;

/// Maximum characters in `desc` and `note` fields
pub const MAX_TEXT_LENGTH: usize = 250;

/// Chart window sizes, in calendar months
pub const CHART_SHORT_WINDOW_MONTHS: u32 = 3;
pub const CHART_LONG_WINDOW_MONTHS: u32 = 12;

/// Default capacity of the change feed broadcast channel
pub const DEFAULT_CHANGE_FEED_CAPACITY: usize = 256;

/// Backup payload format version
pub const DATABASE_VERSION: &str = "1";

// =============================================================================
// Settings
// =============================================================================

pub const SETTING_WELCOME_OVERLAY: &str = "welcome-overlay";
pub const SETTING_DARK_MODE: &str = "dark-mode";
pub const SETTING_CONSOLE_LOGS: &str = "console-logs";
pub const SETTING_INFO_MESSAGES: &str = "info-messages";
pub const SETTING_LOG_RETENTION_DURATION: &str = "log-retention-duration";

/// 90 days in milliseconds
pub const DEFAULT_LOG_RETENTION_MS: f64 = 7_776_000_000.0;

// =============================================================================
// Error Messages
// =============================================================================

/// Bulk import error name, reported in place of a thrown error
pub const BULK_WRITE_ERROR_NAME: &str = "BulkWriteError";

/// Error message for a backup produced by another application
pub const ERR_WRONG_APP_NAME: &str = "Backup was not created by this application";
