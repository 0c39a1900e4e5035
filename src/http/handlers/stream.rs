use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::http::state::AppState;

/// GET /api/events - Live SSE feed of emitted swarm events.
///
/// The SSE `event:` field carries the event kind and `data:` the JSON
/// payload. A subscriber that falls behind the broadcast buffer loses the
/// lagged events, consistent with the at-most-once delivery contract.
pub async fn event_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|item| async move {
        match item {
            Ok(event) => {
                let data = event.payload().to_string();
                Some(Ok(Event::default().event(event.kind()).data(data)))
            }
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!("Event stream subscriber lagged, {} events dropped", skipped);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
