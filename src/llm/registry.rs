//! The synchronized current-model handle
//!
//! The handle is owned by [`ModelRegistry`] and passed through the
//! orchestration layer rather than living in a shared global. Loads run
//! on blocking threads and are tagged with a generation counter so a
//! stale in-flight load can never overwrite a newer selection, and
//! inference clones its own reference to the loaded model so a concurrent
//! swap cannot tear a running generation.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::{RwLock, broadcast};

use super::engine::{GgufModel, SamplingParams, resolve_tokenizer};
use super::prompt::render_prompt;
use crate::config::LlmConfig;
use crate::{Error, Result};

/// Reply shown and spoken when inference is requested with no model loaded
pub const NO_MODEL_REPLY: &str = "No model loaded. Please select a model.";

/// Observable state of the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ModelState {
    /// No model selected yet
    Empty,
    /// A load is in flight
    Loading { file: String },
    /// The model is loaded and serving
    Ready { file: String },
    /// The most recent load failed
    Failed { file: String, error: String },
}

/// Slot holding the observable state and the loaded model itself
struct Slot {
    state: ModelState,
    /// Kept serving until a newer load completes, like the selection it
    /// replaces
    model: Option<Arc<std::sync::Mutex<GgufModel>>>,
}

/// Owned, synchronized handle to the currently selected model
#[derive(Clone)]
pub struct ModelRegistry {
    slot: Arc<RwLock<Slot>>,
    epoch: Arc<AtomicU64>,
    llm: LlmConfig,
    events: broadcast::Sender<ModelState>,
}

impl ModelRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new(llm: LlmConfig) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            slot: Arc::new(RwLock::new(Slot {
                state: ModelState::Empty,
                model: None,
            })),
            epoch: Arc::new(AtomicU64::new(0)),
            llm,
            events,
        }
    }

    /// Current observable state
    pub async fn state(&self) -> ModelState {
        self.slot.read().await.state.clone()
    }

    /// Subscribe to state-change events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ModelState> {
        self.events.subscribe()
    }

    /// Select a model file and load it in the background
    ///
    /// The previous model keeps serving until the new one is ready. If
    /// another selection arrives while this load is in flight, the slower
    /// result is discarded.
    pub async fn select(&self, file: String, path: PathBuf) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut slot = self.slot.write().await;
            slot.state = ModelState::Loading { file: file.clone() };
        }
        self.publish(ModelState::Loading { file: file.clone() });

        tracing::info!(file = %file, "model load started");

        let registry = self.clone();
        tokio::spawn(async move {
            let load_file = file.clone();
            let result = tokio::task::spawn_blocking(move || {
                let tokenizer = resolve_tokenizer(&path)?;
                GgufModel::load(&path, &tokenizer)
            })
            .await;

            let result = match result {
                Ok(r) => r,
                Err(e) => Err(Error::Model(format!("load task failed: {e}"))),
            };

            if registry.epoch.load(Ordering::SeqCst) != epoch {
                tracing::debug!(file = %load_file, "model load superseded, discarding");
                return;
            }

            let state = match result {
                Ok(model) => {
                    let state = ModelState::Ready {
                        file: load_file.clone(),
                    };
                    let mut slot = registry.slot.write().await;
                    slot.model = Some(Arc::new(std::sync::Mutex::new(model)));
                    slot.state = state.clone();
                    tracing::info!(file = %load_file, "model ready");
                    state
                }
                Err(e) => {
                    let state = ModelState::Failed {
                        file: load_file.clone(),
                        error: e.to_string(),
                    };
                    let mut slot = registry.slot.write().await;
                    slot.state = state.clone();
                    tracing::error!(file = %load_file, error = %e, "model load failed");
                    state
                }
            };
            registry.publish(state);
        });
    }

    /// Generate a reply for the given user text
    ///
    /// Degrades to [`NO_MODEL_REPLY`] when nothing is loaded rather than
    /// failing.
    ///
    /// # Errors
    ///
    /// Returns error if inference itself fails
    pub async fn reply(&self, user_text: &str) -> Result<String> {
        let model = self.slot.read().await.model.clone();

        let Some(model) = model else {
            return Ok(NO_MODEL_REPLY.to_string());
        };

        let prompt = render_prompt(&self.llm.system_prompt, user_text);
        let params = SamplingParams::from(&self.llm);

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| Error::Model("model lock poisoned".to_string()))?;
            model.generate(&prompt, &params)
        })
        .await
        .map_err(|e| Error::Model(format!("inference task failed: {e}")))?
    }

    /// Whether a model is currently loaded and serving
    pub async fn has_model(&self) -> bool {
        self.slot.read().await.model.is_some()
    }

    fn publish(&self, state: ModelState) {
        // No subscribers is fine; the panel may not be open
        let _ = self.events.send(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn wait_for<F>(registry: &ModelRegistry, pred: F) -> ModelState
    where
        F: Fn(&ModelState) -> bool,
    {
        for _ in 0..200 {
            let state = registry.state().await;
            if pred(&state) {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("registry never reached expected state");
    }

    #[tokio::test]
    async fn test_starts_empty_and_replies_with_fixed_message() {
        let registry = ModelRegistry::new(LlmConfig::default());
        assert_eq!(registry.state().await, ModelState::Empty);
        assert!(!registry.has_model().await);

        let reply = registry.reply("hello").await.unwrap();
        assert_eq!(reply, NO_MODEL_REPLY);
    }

    #[tokio::test]
    async fn test_select_transitions_to_loading_then_failed_for_bad_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("junk.gguf");
        std::fs::write(&path, b"not a gguf file").unwrap();
        std::fs::write(tmp.path().join("tokenizer.json"), b"{}").unwrap();

        let registry = ModelRegistry::new(LlmConfig::default());
        registry.select("junk.gguf".to_string(), path).await;

        // Immediately observable as loading or already failed
        match registry.state().await {
            ModelState::Loading { file } | ModelState::Failed { file, .. } => {
                assert_eq!(file, "junk.gguf");
            }
            other => panic!("unexpected state: {other:?}"),
        }

        let state = wait_for(&registry, |s| matches!(s, ModelState::Failed { .. })).await;
        let ModelState::Failed { file, .. } = state else {
            unreachable!()
        };
        assert_eq!(file, "junk.gguf");
        assert!(!registry.has_model().await);
    }

    #[tokio::test]
    async fn test_newer_selection_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.gguf");
        let b = tmp.path().join("b.gguf");
        std::fs::write(&a, b"junk").unwrap();
        std::fs::write(&b, b"junk").unwrap();
        std::fs::write(tmp.path().join("tokenizer.json"), b"{}").unwrap();

        let registry = ModelRegistry::new(LlmConfig::default());
        registry.select("a.gguf".to_string(), a).await;
        registry.select("b.gguf".to_string(), b).await;

        // Once everything settles, the newest selection owns the state
        let state = wait_for(&registry, |s| {
            matches!(s, ModelState::Failed { file, .. } if file == "b.gguf")
        })
        .await;
        assert!(matches!(state, ModelState::Failed { file, .. } if file == "b.gguf"));
    }

    #[tokio::test]
    async fn test_state_events_published() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("junk.gguf");
        std::fs::write(&path, b"junk").unwrap();
        std::fs::write(tmp.path().join("tokenizer.json"), b"{}").unwrap();

        let registry = ModelRegistry::new(LlmConfig::default());
        let mut events = registry.subscribe();

        registry.select("junk.gguf".to_string(), path).await;

        let first = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("no event")
            .unwrap();
        assert_eq!(
            first,
            ModelState::Loading {
                file: "junk.gguf".to_string()
            }
        );
    }
}
