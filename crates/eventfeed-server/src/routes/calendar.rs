//! Public calendar endpoints

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use eventfeed_calendar::EventList;
use serde::Serialize;

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", get(events))
        .route("/ics", get(ics))
        .route("/tomorrow", get(tomorrow))
        .route("/nextEvent", get(next_event))
        .route("/nextevent", get(next_event))
        .route("/feature", get(feature))
        .route("/gcalendar", get(gcalendar))
}

#[derive(Serialize)]
pub struct FeatureResponse {
    pub feature: &'static str,
}

/// GET /events - Upcoming events from the selected source
async fn events(State(state): State<AppState>) -> Result<Json<EventList>, AppError> {
    let items = state.service.events().await?;
    Ok(Json(EventList { items }))
}

/// GET /ics - The raw ICS document through the cache
async fn ics(State(state): State<AppState>) -> Result<Response, AppError> {
    let ics = state.service.raw_ics().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8"),
            (header::HeaderName::from_static("x-cache"), ics.provenance.as_str()),
        ],
        ics.body,
    )
        .into_response())
}

/// GET /tomorrow - Events starting tomorrow
async fn tomorrow(State(state): State<AppState>) -> Result<Json<EventList>, AppError> {
    let items = state.service.tomorrow_events().await?;
    Ok(Json(EventList { items }))
}

/// GET /nextEvent - The next event if it starts tomorrow, else 304
async fn next_event(State(state): State<AppState>) -> Result<Response, AppError> {
    match state.service.next_event().await? {
        Some(event) => Ok(Json(event).into_response()),
        None => Ok(StatusCode::NOT_MODIFIED.into_response()),
    }
}

/// GET /feature - Which source `/events` uses
async fn feature(State(state): State<AppState>) -> Result<Json<FeatureResponse>, AppError> {
    let feature = state.service.feature()?;
    Ok(Json(FeatureResponse {
        feature: feature.as_str(),
    }))
}

/// GET /gcalendar - Google events regardless of the feature switch
async fn gcalendar(State(state): State<AppState>) -> Result<Json<EventList>, AppError> {
    let items = state.service.google_events().await?;
    Ok(Json(EventList { items }))
}
