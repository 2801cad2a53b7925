//! Server-rendered event list

use axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Router,
};
use eventfeed_render::{RawShortcodeAttrs, ShortcodeAttrs};

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/render", get(render))
}

/// GET /render?max_events=&view=&tag_filter= - HTML list of upcoming events
async fn render(
    State(state): State<AppState>,
    Query(raw): Query<RawShortcodeAttrs>,
) -> Result<Html<String>, AppError> {
    // Reject bad attributes before touching any upstream.
    let attrs = ShortcodeAttrs::parse(&raw, state.default_max_events)?;
    let events = state.service.events().await?;
    Ok(Html(state.renderer.render(events, &attrs)))
}
