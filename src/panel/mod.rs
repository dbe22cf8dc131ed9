//! The desktop panel
//!
//! A small locally served page showing the latest exchange, with a
//! dropdown to pick which model file to load. State flows one way: the
//! assistant loop and the model registry publish events, the panel
//! renders them; the only command coming back is the model selection.

mod routes;
mod websocket;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{RwLock, broadcast};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::catalog::ModelCatalog;
use crate::llm::{ModelRegistry, ModelState};
use crate::{Error, Result};

/// One transcript/reply pair shown in the panel
#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    /// What the user said
    pub you_said: String,
    /// The assistant's reply
    pub reply: String,
}

/// Event pushed to panel WebSocket clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PanelEvent {
    /// The assistant is waiting for speech
    Listening,
    /// A transcript was recognized
    Transcript { text: String },
    /// A reply was generated
    Reply { text: String },
    /// The model registry changed state
    ModelState {
        #[serde(flatten)]
        state: ModelState,
    },
}

/// Shared state for panel handlers
pub struct PanelState {
    pub catalog: ModelCatalog,
    pub registry: ModelRegistry,
    pub exchange: RwLock<Option<Exchange>>,
    pub voice_enabled: bool,
    pub static_dir: Option<PathBuf>,
    events: broadcast::Sender<PanelEvent>,
}

/// Shared handle to the panel state
pub type SharedPanel = Arc<PanelState>;

impl PanelState {
    /// Create panel state
    #[must_use]
    pub fn new(
        catalog: ModelCatalog,
        registry: ModelRegistry,
        voice_enabled: bool,
        static_dir: Option<PathBuf>,
    ) -> SharedPanel {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            catalog,
            registry,
            exchange: RwLock::new(None),
            voice_enabled,
            static_dir,
            events,
        })
    }

    /// Subscribe to panel events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.events.subscribe()
    }

    /// Publish that the assistant is listening again
    pub fn notify_listening(&self) {
        self.publish(PanelEvent::Listening);
    }

    /// Publish a recognized transcript
    pub fn notify_transcript(&self, text: &str) {
        self.publish(PanelEvent::Transcript {
            text: text.to_string(),
        });
    }

    /// Record a completed exchange and publish the reply
    pub async fn record_exchange(&self, you_said: &str, reply: &str) {
        {
            let mut exchange = self.exchange.write().await;
            *exchange = Some(Exchange {
                you_said: you_said.to_string(),
                reply: reply.to_string(),
            });
        }
        self.publish(PanelEvent::Reply {
            text: reply.to_string(),
        });
    }

    fn publish(&self, event: PanelEvent) {
        // No subscribers is fine; the panel may not be open
        let _ = self.events.send(event);
    }
}

/// Build the panel router
#[must_use]
pub fn router(state: SharedPanel) -> Router {
    let mut router = Router::new()
        .merge(routes::router(Arc::clone(&state)))
        .merge(websocket::router(Arc::clone(&state)));

    router = if let Some(dir) = &state.static_dir {
        router.fallback_service(ServeDir::new(dir))
    } else {
        router.route("/", axum::routing::get(routes::index))
    };

    router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Serve the panel until the process exits
///
/// Also bridges model registry state changes into panel events.
///
/// # Errors
///
/// Returns error if the port cannot be bound
pub async fn serve(state: SharedPanel, port: u16) -> Result<()> {
    // Forward registry state changes to panel clients
    {
        let state = Arc::clone(&state);
        let mut registry_events = state.registry.subscribe();
        tokio::spawn(async move {
            while let Ok(model_state) = registry_events.recv().await {
                state.publish(PanelEvent::ModelState { state: model_state });
            }
        });
    }

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Config(format!("cannot bind panel to {addr}: {e}")))?;

    tracing::info!(addr = %addr, "panel listening");

    axum::serve(listener, router(state))
        .await
        .map_err(|e| Error::Config(format!("panel server error: {e}")))
}
