//! Read-through TTL cache for the raw ICS document.
//!
//! The body and its fetch time live in two settings-store slots. A fresh cache
//! is served without touching the network; an expired or missing one triggers a
//! fetch. When the fetch fails the previous body, if any, is served stale and
//! the operator is notified either way.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use eventfeed_core::{Clock, Notifier, SettingKey, SettingsStore};
use tokio::sync::Mutex;

use crate::error::CalendarError;
use crate::fetch::IcsFetcher;

/// Default cache lifetime: one hour.
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// A previously fetched ICS document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedCalendar {
    pub raw_body: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    UseCached,
    Refresh,
}

/// Freshness rule for [`CachedCalendar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    ttl: Duration,
}

impl CachePolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Use the cache iff `0 <= now - fetched_at < ttl`.
    ///
    /// A timestamp in the future is treated as expired.
    pub fn decide(&self, cached: Option<&CachedCalendar>, now: DateTime<Utc>) -> CacheDecision {
        match cached {
            Some(cached) => {
                let age = now - cached.fetched_at;
                if age >= Duration::zero() && age < self.ttl {
                    CacheDecision::UseCached
                } else {
                    CacheDecision::Refresh
                }
            }
            None => CacheDecision::Refresh,
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from_secs(DEFAULT_TTL_SECS)
    }
}

/// Where a served body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Fetched just now.
    Fresh,
    /// Cache still within its TTL.
    Cached,
    /// Fetch failed; expired cache served instead.
    Stale,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Fresh => "fresh",
            Provenance::Cached => "cached",
            Provenance::Stale => "stale",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcsBody {
    pub body: String,
    pub provenance: Provenance,
}

/// Read-through cache in front of an [`IcsFetcher`].
pub struct IcsCache {
    store: Arc<dyn SettingsStore>,
    fetcher: Arc<dyn IcsFetcher>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    policy: CachePolicy,
    // Serializes refreshes so a burst on an expired cache fetches once.
    // Holds the error of the last attempt when it failed.
    refresh_lock: Mutex<Option<String>>,
    // Bumped under `refresh_lock` after every fetch attempt.
    attempts: AtomicU64,
}

impl IcsCache {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        fetcher: Arc<dyn IcsFetcher>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            store,
            fetcher,
            notifier,
            clock,
            policy,
            refresh_lock: Mutex::new(None),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Read the cache slots. Both must be present and the timestamp must parse.
    pub fn load_cached(&self) -> Result<Option<CachedCalendar>, CalendarError> {
        let Some(raw_body) = self.store.get(SettingKey::IcsCache)? else {
            return Ok(None);
        };
        let Some(stamp) = self.store.get(SettingKey::IcsCacheTimestamp)? else {
            return Ok(None);
        };
        if raw_body.is_empty() {
            return Ok(None);
        }

        let fetched_at = stamp
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
        match fetched_at {
            Some(fetched_at) => Ok(Some(CachedCalendar {
                raw_body,
                fetched_at,
            })),
            None => {
                tracing::warn!("Ignoring ICS cache with unreadable timestamp {:?}", stamp);
                Ok(None)
            }
        }
    }

    /// Return the ICS body for `url`, refreshing the cache when it has expired.
    ///
    /// Requests that queue behind a refresh reuse its outcome: a success is
    /// served from the cache, a failure is served stale (or returned) without
    /// fetching again.
    pub async fn get(&self, url: &str) -> Result<IcsBody, CalendarError> {
        if let Some(hit) = self.fresh_hit()? {
            return Ok(hit);
        }

        let seen = self.attempts.load(Ordering::Acquire);
        let mut last_failure = self.refresh_lock.lock().await;

        // Another request may have refreshed while we waited.
        if let Some(hit) = self.fresh_hit()? {
            return Ok(hit);
        }
        let cached = self.load_cached()?;

        if self.attempts.load(Ordering::Acquire) != seen {
            if let Some(reason) = last_failure.as_deref() {
                tracing::debug!("Reusing failed ICS refresh: {}", reason);
                return match cached {
                    Some(cached) => Ok(IcsBody {
                        body: cached.raw_body,
                        provenance: Provenance::Stale,
                    }),
                    None => Err(CalendarError::RefreshFailed(reason.to_string())),
                };
            }
        }

        let now = self.clock.now();
        let fetched = match self.fetcher.fetch(url).await {
            Ok(body) if body.trim().is_empty() => Err(CalendarError::EmptyBody),
            other => other,
        };
        *last_failure = fetched.as_ref().err().map(|e| e.to_string());
        self.attempts.fetch_add(1, Ordering::Release);

        match fetched {
            Ok(body) => {
                if let Err(e) = self.write(&body, now) {
                    tracing::error!("Failed to write ICS cache: {}", e);
                }
                tracing::info!("ICS cache refreshed ({} bytes)", body.len());
                Ok(IcsBody {
                    body,
                    provenance: Provenance::Fresh,
                })
            }
            Err(e) => match cached {
                Some(cached) => {
                    tracing::warn!(
                        "ICS fetch failed, serving cache from {}: {}",
                        cached.fetched_at.to_rfc3339(),
                        e
                    );
                    self.notifier.notify(
                        &format!("Could not fetch ICS data, serving cached data: {}", e),
                        now,
                    );
                    Ok(IcsBody {
                        body: cached.raw_body,
                        provenance: Provenance::Stale,
                    })
                }
                None => {
                    tracing::error!("ICS fetch failed with no cache: {}", e);
                    self.notifier.notify(
                        &format!("Could not fetch ICS data and no cached data available: {}", e),
                        now,
                    );
                    Err(e)
                }
            },
        }
    }

    /// Delete both cache slots.
    pub fn clear(&self) -> Result<(), CalendarError> {
        self.store.delete(SettingKey::IcsCache)?;
        self.store.delete(SettingKey::IcsCacheTimestamp)?;
        tracing::info!("ICS cache cleared");
        Ok(())
    }

    fn fresh_hit(&self) -> Result<Option<IcsBody>, CalendarError> {
        let cached = self.load_cached()?;
        match self.policy.decide(cached.as_ref(), self.clock.now()) {
            CacheDecision::UseCached => Ok(cached.map(|c| IcsBody {
                body: c.raw_body,
                provenance: Provenance::Cached,
            })),
            CacheDecision::Refresh => Ok(None),
        }
    }

    fn write(&self, body: &str, at: DateTime<Utc>) -> Result<(), CalendarError> {
        self.store.set(SettingKey::IcsCache, body)?;
        self.store
            .set(SettingKey::IcsCacheTimestamp, &at.timestamp().to_string())?;
        Ok(())
    }
}
