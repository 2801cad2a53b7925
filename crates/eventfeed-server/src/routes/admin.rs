//! Admin endpoints for the source settings and the ICS cache.
//!
//! Every request needs `Authorization: Bearer <admin_token>`. Without a
//! configured token the whole surface answers 403.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::{delete, get},
    Json, Router,
};
use chrono::{DateTime, Utc};
use eventfeed_calendar::{guard::parse_url, CalendarError};
use eventfeed_core::{FeatureSwitch, SettingKey, SourceSettings};
use serde::{Deserialize, Serialize};

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/settings", get(get_settings).put(update_settings))
        .route("/admin/cache", delete(clear_cache))
}

#[derive(Serialize)]
pub struct SettingsView {
    pub ics_url: Option<String>,
    pub google_api_key: Option<String>,
    pub google_calendar_id: Option<String>,
    pub feature: &'static str,
    pub cache: CacheView,
}

#[derive(Serialize)]
pub struct CacheView {
    pub present: bool,
    pub fetched_at: Option<DateTime<Utc>>,
    pub ttl_secs: i64,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct SettingsUpdate {
    pub ics_url: Option<String>,
    pub google_api_key: Option<String>,
    pub google_calendar_id: Option<String>,
    pub feature: Option<String>,
    pub clear_cache: bool,
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(AppError::AdminDisabled);
    };

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match presented {
        Some(token) if timing_safe_equal(token.as_bytes(), expected.as_bytes()) => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

/// Compare without an early exit on the first differing byte.
fn timing_safe_equal(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut diff = 0u8;
    for (lhs, rhs) in left.iter().zip(right) {
        diff |= lhs ^ rhs;
    }
    diff == 0
}

/// Show only the last four characters of a secret.
fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("****{}", tail)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn view(state: &AppState) -> Result<SettingsView, AppError> {
    let settings = SourceSettings::load(state.store.as_ref())?;
    let cache = state.service.cache();
    let cached = cache.load_cached()?;

    Ok(SettingsView {
        ics_url: settings.ics_url,
        google_api_key: settings.google_api_key.as_deref().map(mask),
        google_calendar_id: settings.google_calendar_id,
        feature: settings.feature.as_str(),
        cache: CacheView {
            present: cached.is_some(),
            fetched_at: cached.map(|c| c.fetched_at),
            ttl_secs: cache.policy().ttl().num_seconds(),
        },
    })
}

/// GET /admin/settings
async fn get_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SettingsView>, AppError> {
    authorize(&state, &headers)?;
    Ok(Json(view(&state)?))
}

/// PUT /admin/settings - Blank fields are left untouched.
async fn update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<SettingsView>, AppError> {
    authorize(&state, &headers)?;

    let feature = match non_empty(update.feature) {
        Some(value) => match value.as_str() {
            "google" => Some(FeatureSwitch::Google),
            "nextcloud" => Some(FeatureSwitch::Nextcloud),
            other => {
                return Err(AppError::BadRequest(format!(
                    "feature must be 'google' or 'nextcloud', got '{}'",
                    other
                )))
            }
        },
        None => None,
    };

    // Validated, but stored as entered.
    let ics_url = match non_empty(update.ics_url) {
        Some(url) => {
            parse_url(&url).map_err(CalendarError::from)?;
            Some(url)
        }
        None => None,
    };

    let store = state.store.as_ref();
    let mut clear = update.clear_cache;

    if let Some(url) = ics_url {
        let previous = store.get(SettingKey::IcsUrl)?;
        if previous.as_deref().map(str::trim) != Some(url.as_str()) {
            clear = true;
        }
        store.set(SettingKey::IcsUrl, &url)?;
    }
    if let Some(key) = non_empty(update.google_api_key) {
        store.set(SettingKey::GoogleApiKey, &key)?;
    }
    if let Some(id) = non_empty(update.google_calendar_id) {
        store.set(SettingKey::GoogleCalendarId, &id)?;
    }
    if let Some(feature) = feature {
        store.set(SettingKey::FeatureSwitch, feature.as_str())?;
    }
    if clear {
        state.service.cache().clear()?;
    }

    tracing::info!("Source settings updated (cache cleared: {})", clear);
    Ok(Json(view(&state)?))
}

/// DELETE /admin/cache
async fn clear_cache(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    authorize(&state, &headers)?;
    state.service.cache().clear()?;
    tracing::info!("ICS cache cleared by admin");
    Ok(StatusCode::NO_CONTENT)
}
