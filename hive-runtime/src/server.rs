//! Peer protocol and observability endpoints
//!
//! Handlers never touch node state. Pushed signals are forwarded to the
//! tick loop over its event channel; reads come from the latest published
//! [`NodeView`].

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::future::Future;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use hive_core::Pheromone;
use hive_gossip::{decode_signal, PushAck};

use crate::{Health, NodeEvent, NodeView};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub events: mpsc::Sender<NodeEvent>,
    pub view: watch::Receiver<NodeView>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/pheromone", post(receive_pheromone))
        .route("/pheromones", get(list_pheromones))
        .route("/health", get(health))
        .route("/state", get(node_state))
        .with_state(state)
}

/// Serve the router until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Peer protocol listening on {}", addr);
    }
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn receive_pheromone(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<PushAck>) {
    let signal = match decode_signal(&body) {
        Ok(signal) => signal,
        Err(e) => {
            debug!("Rejected malformed pheromone: {}", e);
            return (StatusCode::BAD_REQUEST, Json(PushAck::rejected(e)));
        }
    };

    match state.events.send(NodeEvent::Inbound(signal)).await {
        Ok(()) => (StatusCode::OK, Json(PushAck::accepted())),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(PushAck::rejected("node shutting down")),
        ),
    }
}

async fn list_pheromones(State(state): State<AppState>) -> Json<Vec<Pheromone>> {
    Json(state.view.borrow().signals.clone())
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health::from(&*state.view.borrow()))
}

async fn node_state(State(state): State<AppState>) -> Json<NodeView> {
    Json(state.view.borrow().clone())
}
