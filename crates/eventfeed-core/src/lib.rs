pub mod clock;
pub mod config;
pub mod error;
pub mod notify;
pub mod settings;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    CacheConfig, Config, DisplayConfig, FetchConfig, GoogleConfig, NotifyConfig, ServerConfig,
    SourceSeed, TagRuleConfig, ValidationResult,
};
pub use error::{ConfigError, NetworkError, ReqwestErrorExt, StoreError};
pub use notify::{
    Notifier, OperatorNotice, RecordingNotifier, TracingNotifier, WebhookNotifier,
};
pub use settings::{
    FeatureSwitch, FileSettingsStore, MemorySettingsStore, SettingKey, SettingsStore,
    SourceSettings,
};

use anyhow::Result;

/// Initialize tracing/logging for the process.
///
/// Honours `RUST_LOG`; falls back to `info`.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    tracing::info!("eventfeed core initialized");
    Ok(())
}
