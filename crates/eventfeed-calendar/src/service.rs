//! Calendar service: picks the source, fetches and normalizes.

use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use eventfeed_core::{Clock, FeatureSwitch, GoogleConfig, Notifier, SettingsStore, SourceSettings};

use crate::cache::{IcsBody, IcsCache};
use crate::error::CalendarError;
use crate::google::GoogleCalendarClient;
use crate::ics::parse_ics;
use crate::normalize::{filter_tomorrow, next_if_tomorrow, Normalizer};
use crate::recurrence::expand_recurrences;
use crate::types::NormalizedEvent;

pub struct CalendarService {
    store: Arc<dyn SettingsStore>,
    cache: Arc<IcsCache>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    normalizer: Normalizer,
    google: GoogleCalendarClient,
    max_results: u32,
}

impl CalendarService {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        cache: Arc<IcsCache>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        tz: Tz,
        google: GoogleConfig,
        timeout: Duration,
    ) -> Result<Self, CalendarError> {
        Ok(Self {
            store,
            cache,
            notifier,
            clock,
            normalizer: Normalizer::new(tz),
            google: GoogleCalendarClient::new_with_base_url(&google.api_base_url, timeout)?,
            max_results: google.max_results,
        })
    }

    pub fn cache(&self) -> &IcsCache {
        &self.cache
    }

    pub fn timezone(&self) -> Tz {
        self.normalizer.timezone()
    }

    pub fn settings(&self) -> Result<SourceSettings, CalendarError> {
        Ok(SourceSettings::load(self.store.as_ref())?)
    }

    pub fn feature(&self) -> Result<FeatureSwitch, CalendarError> {
        Ok(self.settings()?.feature)
    }

    /// Upcoming events from whichever source the feature switch selects.
    pub async fn events(&self) -> Result<Vec<NormalizedEvent>, CalendarError> {
        match self.feature()? {
            FeatureSwitch::Nextcloud => self.ics_events().await,
            FeatureSwitch::Google => self.google_events().await,
        }
    }

    /// The raw ICS document through the cache.
    pub async fn raw_ics(&self) -> Result<IcsBody, CalendarError> {
        let Some(url) = self.settings()?.ics_url else {
            return Err(self.report(CalendarError::MissingConfig(
                "ICS URL is not set".to_string(),
            )));
        };
        self.cache.get(&url).await
    }

    /// Events from the ICS feed that have not ended yet, sorted by start.
    pub async fn ics_events(&self) -> Result<Vec<NormalizedEvent>, CalendarError> {
        let ics = self.raw_ics().await?;
        tracing::debug!("Serving ICS events from {} data", ics.provenance.as_str());

        let now = self.clock.now();
        let parsed = parse_ics(&ics.body, self.timezone()).map_err(|e| self.report(e))?;
        let expanded = expand_recurrences(parsed, now);
        Ok(self.normalizer.ics_events(&expanded, now))
    }

    /// Upcoming events from the Google Calendar API. Not cached.
    pub async fn google_events(&self) -> Result<Vec<NormalizedEvent>, CalendarError> {
        let settings = self.settings()?;
        let (Some(api_key), Some(calendar_id)) = (settings.google_api_key, settings.google_calendar_id)
        else {
            return Err(self.report(CalendarError::MissingConfig(
                "Google API key or Calendar ID is not set".to_string(),
            )));
        };

        let response = self
            .google
            .list_upcoming(&api_key, &calendar_id, self.clock.now(), self.max_results)
            .await
            .map_err(|e| self.report(e))?;

        Ok(self.normalizer.google_events(response.items))
    }

    /// Events starting tomorrow in the display time zone.
    pub async fn tomorrow_events(&self) -> Result<Vec<NormalizedEvent>, CalendarError> {
        let events = self.events().await?;
        Ok(filter_tomorrow(events, self.clock.now(), self.timezone()))
    }

    /// The next upcoming event, if it starts tomorrow.
    pub async fn next_event(&self) -> Result<Option<NormalizedEvent>, CalendarError> {
        let events = self.events().await?;
        Ok(next_if_tomorrow(events, self.clock.now(), self.timezone()))
    }

    /// Log and notify, then hand the error back.
    fn report(&self, error: CalendarError) -> CalendarError {
        tracing::error!("Calendar request failed: {}", error);
        self.notifier.notify(&error.to_string(), self.clock.now());
        error
    }
}
