use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Configuration constants for the bot

/// Telegram uid of the master administrator.
/// The master admin passes every access check unconditionally and is the only
/// user allowed to choose the privilege level of a newly created admin.
pub static MASTER_ADMIN: Lazy<i64> = Lazy::new(|| {
    env::var("MASTER_ADMIN")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
});

/// Group/channel ID for sending appointment/callback/feedback requests
/// to the administrators
pub static REQUESTS_CHAT_ID: Lazy<i64> = Lazy::new(|| {
    env::var("REQUESTS_CHAT_ID")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
});

/// Group/channel ID for the scheduled statistic broadcasts
pub static STATISTIC_CHAT_ID: Lazy<i64> = Lazy::new(|| {
    env::var("STATISTIC_CHAT_ID")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
});

/// SQLite database path
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "doctoria.sqlite".to_string()));

/// Redis URL for the session store and the cache backend.
/// When unset the bot runs with in-memory stores (single-node mode).
pub static REDIS_URL: Lazy<Option<String>> = Lazy::new(|| env::var("REDIS_URL").ok());

/// Log file path
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "doctoria.log".to_string()));

/// Page with the conference-room widget the link provider scrapes
pub static CONFERENCE_PAGE_URL: Lazy<String> =
    Lazy::new(|| env::var("CONFERENCE_PAGE_URL").unwrap_or_else(|_| String::new()));

/// Payment provider token (passed through to Telegram invoices)
pub static PAYMENT_PROVIDER_TOKEN: Lazy<String> =
    Lazy::new(|| env::var("PAYMENT_PROVIDER_TOKEN").unwrap_or_else(|_| String::new()));

/// Cache configuration
pub mod cache {
    use super::Duration;

    /// Default TTL for reference-data cache entries (in seconds),
    /// overridable via CACHE_TTL_SECS
    pub const DEFAULT_TTL_SECS: u64 = 12 * 60 * 60;

    /// Interval of the unconditional full refresh safety net (in hours)
    pub const REFRESH_INTERVAL_HOURS: u64 = 24;

    /// Cache entry TTL
    pub fn ttl() -> Duration {
        let secs = std::env::var("CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TTL_SECS);
        Duration::from_secs(secs)
    }

    /// Full refresh interval duration
    pub fn refresh_interval() -> Duration {
        Duration::from_secs(REFRESH_INTERVAL_HOURS * 60 * 60)
    }
}

/// Session store configuration
pub mod session {
    /// Redis session TTL (in seconds): abandoned conversations expire after
    /// a day of inactivity
    pub const TTL_SECS: u64 = 24 * 60 * 60;
}

/// Pagination configuration
pub mod pagination {
    /// Specialities shown per page in the appointment flow
    pub const SPECIALITIES_PER_PAGE: usize = 10;

    /// Speciality buttons per keyboard row
    pub const SPECIALITIES_PER_ROW: usize = 2;
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for outbound HTTP requests (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Payment configuration
pub mod payment {
    /// Invoice payload marking a paid online appointment
    pub const APPOINTMENT_PAYLOAD: &str = "online_appointment";

    /// Currency of the issued invoices
    pub const CURRENCY: &str = "RUB";
}
