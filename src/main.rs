use std::sync::Arc;

use anyhow::{Context, Result};
use eventfeed_core::{
    Config, FileSettingsStore, Notifier, SourceSettings, SystemClock, TracingNotifier,
    WebhookNotifier,
};
use eventfeed_server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize core
    eventfeed_core::init()?;

    let (config, _validation) = Config::load_validated()?;

    let store = Arc::new(
        FileSettingsStore::open(&config.settings_path).context("Failed to open settings store")?,
    );
    SourceSettings::seed_missing(store.as_ref(), &config.source)?;

    let notifier: Arc<dyn Notifier> = match config
        .notify
        .webhook_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
    {
        Some(url) => Arc::new(WebhookNotifier::new(
            url,
            config.notify.subject.clone(),
            config.server.site_url.clone(),
        )?),
        None => Arc::new(TracingNotifier::new(
            config.notify.subject.clone(),
            config.server.site_url.clone(),
        )),
    };

    let state = AppState::build(&config, store, notifier, Arc::new(SystemClock))?;
    if state.admin_token.is_none() {
        tracing::warn!("No admin token configured; admin endpoints are disabled");
    }

    let app = eventfeed_server::router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    tracing::info!("eventfeed listening on http://{}", config.server.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("Server error")
}
