//! WebSocket event push for the panel page

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};

use super::{PanelEvent, SharedPanel};

/// Build the WebSocket router
pub fn router(state: SharedPanel) -> Router {
    Router::new()
        .route("/ws/panel", get(ws_upgrade))
        .with_state(state)
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(State(state): State<SharedPanel>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Push panel events to a connected client
async fn handle_socket(socket: WebSocket, state: SharedPanel) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.subscribe();

    // Bring the client up to date before streaming events
    let current = PanelEvent::ModelState {
        state: state.registry.state().await,
    };
    if send_event(&mut sender, &current).await.is_err() {
        return;
    }
    if let Some(exchange) = state.exchange.read().await.clone() {
        let catch_up = PanelEvent::Reply {
            text: exchange.reply,
        };
        if send_event(&mut sender, &catch_up).await.is_err() {
            return;
        }
    }

    tracing::debug!("panel client connected");

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if send_event(&mut sender, &event).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "panel client lagged, continuing");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // The panel only pushes; anything else from the client is ignored
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!("panel client disconnected");
}

/// Serialize and send one event, reporting failure to the caller
async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &PanelEvent,
) -> Result<(), axum::Error> {
    let Ok(json) = serde_json::to_string(event) else {
        return Ok(());
    };
    sender.send(Message::Text(json.into())).await
}
