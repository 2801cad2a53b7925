//! Calendar sources for eventfeed.
//!
//! Fetches the ICS feed through a TTL cache or the Google Calendar API and
//! normalizes both into one event shape.

pub mod cache;
pub mod error;
pub mod fetch;
pub mod google;
pub mod guard;
pub mod ics;
pub mod normalize;
pub mod recurrence;
pub mod service;
pub mod types;

pub use cache::{CacheDecision, CachePolicy, CachedCalendar, IcsBody, IcsCache, Provenance};
pub use error::CalendarError;
pub use fetch::{IcsFetcher, RemoteFetcher};
pub use google::GoogleCalendarClient;
pub use guard::{SsrfGuard, SsrfPolicy, SsrfViolation};
pub use ics::{parse_ics, IcsEvent, Recurrence};
pub use normalize::{extract_hashtags, filter_by_tag, filter_tomorrow, next_if_tomorrow, Normalizer};
pub use recurrence::expand_recurrences;
pub use service::CalendarService;
pub use types::{ApiEvent, ApiEventTime, EventList, EventListResponse, EventTime, NormalizedEvent};
