//! Calendar-specific error types.

use eventfeed_core::{NetworkError, StoreError};
use thiserror::Error;

use crate::guard::SsrfViolation;

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Calendar URL blocked: {0}")]
    Blocked(#[from] SsrfViolation),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Calendar source returned an empty body")]
    EmptyBody,

    #[error("Calendar refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Error parsing ICS data: {0}")]
    IcsParse(String),

    #[error("Google API key rejected or calendar not shared")]
    AccessDenied,

    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Settings store error: {0}")]
    Store(#[from] StoreError),
}

impl CalendarError {
    /// User-friendly error message for page display.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingConfig(_) => "The calendar is not configured yet.".to_string(),
            Self::Blocked(_) => "The configured calendar address is not allowed.".to_string(),
            Self::Network(e) => e.user_message().to_string(),
            Self::EmptyBody => "The calendar source returned no data.".to_string(),
            Self::RefreshFailed(_) => "The calendar source could not be reached.".to_string(),
            Self::IcsParse(_) => "The calendar data could not be read.".to_string(),
            Self::AccessDenied => "The calendar could not be accessed.".to_string(),
            Self::CalendarNotFound(_) => "The calendar could not be found.".to_string(),
            Self::RateLimited(secs) => {
                format!("Too many requests. Please wait {} seconds.", secs)
            }
            Self::ApiError(_) => "The calendar service returned an error.".to_string(),
            Self::Store(e) => e.user_message().to_string(),
        }
    }

    /// HTTP status equivalent.
    ///
    /// Configuration problems are 400; everything upstream or internal is 500.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingConfig(_) | Self::Blocked(_) => 400,
            _ => 500,
        }
    }

    /// Stable machine-readable code for JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingConfig(_) => "missing_config",
            Self::Blocked(_) => "blocked_url",
            Self::Network(_) => "upstream_unreachable",
            Self::EmptyBody => "upstream_empty",
            Self::RefreshFailed(_) => "upstream_unreachable",
            Self::IcsParse(_) => "ics_parse_error",
            Self::AccessDenied => "upstream_access_denied",
            Self::CalendarNotFound(_) => "calendar_not_found",
            Self::RateLimited(_) => "upstream_rate_limited",
            Self::ApiError(_) => "upstream_api_error",
            Self::Store(_) => "settings_store_error",
        }
    }
}
