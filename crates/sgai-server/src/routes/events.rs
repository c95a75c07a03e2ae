use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::Json;
use serde::Deserialize;
use sgai_core::event::{self, Event, RECONNECTED};
use std::convert::Infallible;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/v1/events/stream: one SSE frame per published event, named
/// after the event and carrying its JSON envelope.
pub async fn stream_events(State(app): State<AppState>) -> impl axum::response::IntoResponse {
    let rx = app.events.subscribe();
    tracing::debug!(subscribers = app.subscriber_count(), "event stream opened");
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(ev) => Some(Ok::<SseEvent, Infallible>(frame(&ev))),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "event stream lagged, events dropped");
            None
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(app.keep_alive))
}

fn frame(ev: &Event) -> SseEvent {
    SseEvent::default()
        .event(ev.name.as_str())
        .data(ev.to_sse_data().to_string())
}

#[derive(Debug, Deserialize)]
pub struct PublishBody {
    pub name: String,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// POST /api/v1/events: publish one event to every open stream.
pub async fn publish_event(
    State(app): State<AppState>,
    Json(body): Json<PublishBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    event::validate_name(&body.name)?;
    if body.name == RECONNECTED {
        return Err(AppError::bad_request(format!(
            "'{RECONNECTED}' is reserved for client reconnect notices"
        )));
    }
    let workspace = body.workspace.filter(|w| !w.is_empty());
    let ev = Event::new(body.name, workspace, body.payload);
    tracing::info!(event = %ev, "publish");
    let delivered = app.publish(ev);
    Ok(Json(serde_json::json!({ "delivered": delivered })))
}
