//! GGUF model loading and sampled generation

use std::path::{Path, PathBuf};

use candle::quantized::gguf_file;
use candle::{Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::quantized_llama::{MAX_SEQ_LEN, ModelWeights};
use tokenizers::Tokenizer;

use crate::config::LlmConfig;
use crate::{Error, Result};

/// Hub repository used when no tokenizer file ships next to the model
const FALLBACK_TOKENIZER_REPO: &str = "hf-internal-testing/llama-tokenizer";

/// Token strings treated as end-of-sequence across llama families
const EOS_TOKENS: &[&str] = &["</s>", "<|endoftext|>", "<|eot_id|>", "<|im_end|>"];

/// Sampling parameters for a single generation
#[derive(Debug, Clone)]
pub struct SamplingParams {
    /// Max tokens to generate
    pub max_tokens: usize,

    /// Sampling temperature; 0 or below means greedy decoding
    pub temperature: f64,

    /// Nucleus sampling cutoff
    pub top_p: Option<f64>,

    /// Seed for the sampling RNG
    pub seed: u64,

    /// Penalty applied to repeating tokens, 1.0 means no penalty
    pub repeat_penalty: f32,

    /// Context window considered for the repeat penalty
    pub repeat_last_n: usize,
}

impl From<&LlmConfig> for SamplingParams {
    fn from(cfg: &LlmConfig) -> Self {
        Self {
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            seed: cfg.seed,
            repeat_penalty: cfg.repeat_penalty,
            repeat_last_n: cfg.repeat_last_n,
        }
    }
}

/// A loaded GGUF model ready for inference
pub struct GgufModel {
    weights: ModelWeights,
    tokenizer: Tokenizer,
    device: Device,
    eos_ids: Vec<u32>,
}

impl GgufModel {
    /// Load a GGUF model file with the given tokenizer
    ///
    /// This is a blocking call that can take seconds for large models;
    /// run it on a blocking thread.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, is not valid GGUF, or the
    /// tokenizer cannot be loaded
    pub fn load(model_path: &Path, tokenizer_path: &Path) -> Result<Self> {
        let device = select_device();
        tracing::info!(
            path = %model_path.display(),
            device = ?device,
            "loading model"
        );

        let mut file = std::fs::File::open(model_path)?;
        let content = gguf_file::Content::read(&mut file)
            .map_err(|e| Error::Model(format!("not a valid GGUF file: {e}")))?;
        let weights = ModelWeights::from_gguf(content, &mut file, &device)
            .map_err(|e| Error::Model(format!("failed to load weights: {e}")))?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| Error::Model(format!("failed to load tokenizer: {e}")))?;

        let eos_ids: Vec<u32> = EOS_TOKENS
            .iter()
            .filter_map(|t| tokenizer.token_to_id(t))
            .collect();
        if eos_ids.is_empty() {
            tracing::warn!("tokenizer defines no known EOS token, generation only stops at max_tokens");
        }

        tracing::info!(path = %model_path.display(), "model loaded");

        Ok(Self {
            weights,
            tokenizer,
            device,
            eos_ids,
        })
    }

    /// Generate a completion for the given prompt
    ///
    /// # Errors
    ///
    /// Returns error if tokenization or a forward pass fails
    pub fn generate(&mut self, prompt: &str, params: &SamplingParams) -> Result<String> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| Error::Model(format!("tokenization failed: {e}")))?;
        let mut prompt_tokens = encoding.get_ids().to_vec();

        // Leave room in the context window for the reply
        let budget = MAX_SEQ_LEN.saturating_sub(params.max_tokens + 1);
        if prompt_tokens.len() > budget {
            let excess = prompt_tokens.len() - budget;
            tracing::debug!(dropped = excess, "prompt exceeds context window, truncating front");
            prompt_tokens.drain(..excess);
        }

        let sampling = if params.temperature <= 0.0 {
            Sampling::ArgMax
        } else {
            match params.top_p {
                None => Sampling::All {
                    temperature: params.temperature,
                },
                Some(p) => Sampling::TopP {
                    p,
                    temperature: params.temperature,
                },
            }
        };
        let mut logits_processor = LogitsProcessor::from_sampling(params.seed, sampling);

        let start = std::time::Instant::now();

        let mut next_token = {
            let input = Tensor::new(prompt_tokens.as_slice(), &self.device)?.unsqueeze(0)?;
            let logits = self.weights.forward(&input, 0)?;
            let logits = logits.squeeze(0)?;
            logits_processor.sample(&logits)?
        };

        let mut generated = vec![next_token];

        for index in 0..params.max_tokens {
            if self.eos_ids.contains(&next_token) {
                break;
            }

            let input = Tensor::new(&[next_token], &self.device)?.unsqueeze(0)?;
            let logits = self.weights.forward(&input, prompt_tokens.len() + index)?;
            let logits = logits.squeeze(0)?;
            let logits = if params.repeat_penalty == 1.0 {
                logits
            } else {
                let start_at = generated.len().saturating_sub(params.repeat_last_n);
                candle_transformers::utils::apply_repeat_penalty(
                    &logits,
                    params.repeat_penalty,
                    &generated[start_at..],
                )?
            };

            next_token = logits_processor.sample(&logits)?;
            generated.push(next_token);
        }

        if generated.last().is_some_and(|t| self.eos_ids.contains(t)) {
            generated.pop();
        }

        let output = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| Error::Model(format!("decoding failed: {e}")))?;

        #[allow(clippy::cast_precision_loss)]
        let tokens_per_second = generated.len() as f64 / start.elapsed().as_secs_f64();
        tracing::debug!(
            tokens = generated.len(),
            tokens_per_second = %format!("{tokens_per_second:.1}"),
            "generation complete"
        );

        Ok(output.trim().to_string())
    }
}

/// Pick the best available device: Metal, then CUDA, then CPU
fn select_device() -> Device {
    Device::new_metal(0)
        .or_else(|_| Device::new_cuda(0))
        .unwrap_or(Device::Cpu)
}

/// Resolve the tokenizer file for a model
///
/// Looks for `<stem>.tokenizer.json` next to the model, then a shared
/// `tokenizer.json` in the models directory, and finally falls back to
/// downloading the stock llama tokenizer from the Hugging Face hub.
///
/// # Errors
///
/// Returns error if no local tokenizer exists and the hub fetch fails
pub fn resolve_tokenizer(model_path: &Path) -> Result<PathBuf> {
    if let Some(stem) = model_path.file_stem().and_then(|s| s.to_str()) {
        let sibling = model_path.with_file_name(format!("{stem}.tokenizer.json"));
        if sibling.is_file() {
            tracing::debug!(path = %sibling.display(), "using per-model tokenizer");
            return Ok(sibling);
        }
    }

    if let Some(dir) = model_path.parent() {
        let shared = dir.join("tokenizer.json");
        if shared.is_file() {
            tracing::debug!(path = %shared.display(), "using shared tokenizer");
            return Ok(shared);
        }
    }

    tracing::info!(repo = FALLBACK_TOKENIZER_REPO, "fetching fallback tokenizer from hub");
    let api = hf_hub::api::sync::Api::new()
        .map_err(|e| Error::Model(format!("hub client init failed: {e}")))?;
    api.model(FALLBACK_TOKENIZER_REPO.to_string())
        .get("tokenizer.json")
        .map_err(|e| Error::Model(format!("tokenizer download failed: {e}")))
}
