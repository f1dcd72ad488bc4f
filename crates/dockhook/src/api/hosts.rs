//! Host and container endpoints

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use dockhook_api::{Container, ContainerEvent, ErrorResponse, HostSummary};
use dockhook_core::Subscription;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::DropGuard;
use tracing::{debug, warn};

use crate::api::error::AppError;
use crate::state::AppState;

/// Events buffered per SSE client
const SSE_BUFFER: usize = 32;

/// List connected engine hosts
#[utoipa::path(
    get,
    path = "/api/hosts",
    responses((status = 200, description = "Connected hosts", body = [HostSummary])),
    tag = "hosts"
)]
pub async fn list_hosts(State(state): State<Arc<AppState>>) -> Json<Vec<HostSummary>> {
    Json(
        state
            .registry
            .iter()
            .map(|client| client.host().summary())
            .collect(),
    )
}

/// List the cached containers of a host
///
/// # Errors
/// 404 for an unknown host, 500 if the engine cannot be listed
#[utoipa::path(
    get,
    path = "/api/hosts/{host}/containers",
    params(("host" = String, Path, description = "Host ID")),
    responses(
        (status = 200, description = "Containers sorted by name", body = [Container]),
        (status = 404, description = "Unknown host", body = ErrorResponse),
        (status = 500, description = "Engine unavailable", body = ErrorResponse),
    ),
    tag = "hosts"
)]
pub async fn list_containers(
    State(state): State<Arc<AppState>>,
    Path(host): Path<String>,
) -> Result<Json<Vec<Container>>, AppError> {
    let containers = state.store(&host)?.list().await?;
    Ok(Json(containers))
}

/// Unsubscribes from the store when the SSE response is dropped
struct EventFeed {
    state: Arc<AppState>,
    host: String,
    subscription: Subscription,
    _cancel: DropGuard,
}

impl Drop for EventFeed {
    fn drop(&mut self) {
        debug!(host = %self.host, "event stream closed");
        if let Ok(store) = self.state.store(&self.host) {
            store.unsubscribe(&self.subscription);
        }
    }
}

/// Stream container events of a host as server-sent events
///
/// # Errors
/// 404 for an unknown host
#[utoipa::path(
    get,
    path = "/api/hosts/{host}/events",
    params(("host" = String, Path, description = "Host ID")),
    responses(
        (status = 200, description = "`container-event` stream of ContainerEvent JSON", content_type = "text/event-stream"),
        (status = 404, description = "Unknown host", body = ErrorResponse),
    ),
    tag = "hosts"
)]
pub async fn host_events(
    State(state): State<Arc<AppState>>,
    Path(host): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (tx, rx) = mpsc::channel::<ContainerEvent>(SSE_BUFFER);
    let cancel = state.shutdown.child_token();
    let subscription = state.store(&host)?.subscribe(tx, cancel.clone());

    debug!(host = %host, "event stream opened");

    let feed = EventFeed {
        state: Arc::clone(&state),
        host,
        subscription,
        _cancel: cancel.clone().drop_guard(),
    };

    let stream = futures::stream::unfold((rx, cancel, feed), |(mut rx, cancel, feed)| async move {
        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => return None,
                event = rx.recv() => event?,
            };

            match Event::default().event("container-event").json_data(&event) {
                Ok(sse) => return Some((Ok::<_, Infallible>(sse), (rx, cancel, feed))),
                Err(e) => warn!(error = %e, "unable to encode event"),
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
