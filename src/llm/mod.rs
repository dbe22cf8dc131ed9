//! Local language model inference
//!
//! Models are plain `.gguf` files loaded with candle's quantized llama
//! support. The currently selected model lives behind [`ModelRegistry`],
//! the single synchronized handle the rest of the crate goes through.

mod engine;
mod prompt;
mod registry;

pub use engine::{GgufModel, SamplingParams, resolve_tokenizer};
pub use prompt::render_prompt;
pub use registry::{ModelRegistry, ModelState, NO_MODEL_REPLY};
