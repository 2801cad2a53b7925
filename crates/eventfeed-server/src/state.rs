use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use eventfeed_calendar::{CachePolicy, CalendarService, IcsCache, RemoteFetcher, SsrfPolicy};
use eventfeed_core::{Clock, Config, Notifier, SettingsStore};
use eventfeed_render::{EventListRenderer, TagEnrichment};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CalendarService>,
    pub store: Arc<dyn SettingsStore>,
    pub renderer: Arc<EventListRenderer>,
    pub admin_token: Option<String>,
    pub default_max_events: u32,
}

impl AppState {
    /// Wire the fetcher, cache, calendar service and renderer from `config`.
    pub fn build(
        config: &Config,
        store: Arc<dyn SettingsStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let tz = config.timezone()?;
        let timeout = Duration::from_secs(config.fetch.timeout_secs);

        let fetcher = RemoteFetcher::new(
            timeout,
            SsrfPolicy {
                allow_private_network: config.fetch.allow_private_network,
            },
        )
        .context("Failed to build ICS fetcher")?;

        let cache = Arc::new(IcsCache::new(
            store.clone(),
            Arc::new(fetcher),
            notifier.clone(),
            clock.clone(),
            CachePolicy::from_secs(config.cache.ttl_secs),
        ));

        let service = CalendarService::new(
            store.clone(),
            cache,
            notifier,
            clock,
            tz,
            config.google.clone(),
            timeout,
        )
        .context("Failed to build calendar service")?;

        let enrichment = TagEnrichment::from_config(&config.tags)?;

        Ok(Self {
            service: Arc::new(service),
            store,
            renderer: Arc::new(EventListRenderer::new(enrichment)),
            admin_token: config
                .server
                .admin_token
                .clone()
                .filter(|t| !t.trim().is_empty()),
            default_max_events: config.display.default_max_events,
        })
    }
}
