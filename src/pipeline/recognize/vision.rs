//! Vision-LLM transcription: send the page image to a multimodal model.
//!
//! All prompt text lives in [`crate::prompts`]; this module only builds the
//! request, retries and resolves the provider.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient and frequent under
//! concurrent load. Exponential backoff (`retry_backoff_ms * 2^(n-1)`)
//! spreads retries out: with 500 ms base and 3 retries the wait sequence is
//! 500 ms → 1 s → 2 s. A single wait never exceeds [`MAX_BACKOFF_MS`].

use super::{PageRecognizer, RecognizeError, Recognition};
use crate::config::{ExtractionConfig, RecognizerKind, VisionOptions, MAX_VISION_RETRIES};
use crate::error::ExtractError;
use crate::output::PageImage;
use crate::pipeline::encode::encode_for_vision;
use crate::prompts::{DEFAULT_SYSTEM_PROMPT, TRANSCRIBE_INSTRUCTION};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, instrument, warn};

/// Model used when none is named.
pub const DEFAULT_VISION_MODEL: &str = "gpt-4.1-nano";

/// Ceiling for one retry delay.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Recognizer that asks a vision LLM to transcribe each page.
pub struct VisionRecognizer {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl VisionRecognizer {
    pub fn new(provider: Arc<dyn LLMProvider>, opts: &VisionOptions) -> Self {
        Self {
            provider,
            system_prompt: system_prompt(opts),
            options: build_options(opts),
            max_retries: opts.max_retries.min(MAX_VISION_RETRIES),
            retry_backoff_ms: opts.retry_backoff_ms,
        }
    }

    /// Resolve the provider for `config` and wrap it.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let provider = resolve_provider(&config.vision)?;
        Ok(Self::new(provider, &config.vision))
    }
}

#[async_trait]
impl PageRecognizer for VisionRecognizer {
    fn name(&self) -> &str {
        RecognizerKind::Vision.as_str()
    }

    #[instrument(level = "debug", skip_all, fields(page = page.page_num))]
    async fn recognize(&self, page: &PageImage) -> Result<Recognition, RecognizeError> {
        let image = encode_for_vision(&page.image)
            .map_err(|e| RecognizeError::new(format!("image encoding failed: {e}")))?;

        let messages = vec![
            ChatMessage::system(&self.system_prompt),
            ChatMessage::user_with_images(TRANSCRIBE_INSTRUCTION, vec![image]),
        ];

        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "Page {}: retry {}/{} after {}ms",
                    page.page_num, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&self.options)).await {
                Ok(response) => {
                    debug!(
                        "Page {}: {} input tokens, {} output tokens",
                        page.page_num, response.prompt_tokens, response.completion_tokens
                    );
                    return Ok(Recognition {
                        text: response.content,
                        input_tokens: response.prompt_tokens,
                        output_tokens: response.completion_tokens,
                        retries: retry_count(attempt),
                    });
                }
                Err(e) => {
                    warn!("Page {}: attempt {} failed: {}", page.page_num, attempt + 1, e);
                    last_err = Some(e.to_string());
                }
            }
        }

        Err(
            RecognizeError::new(last_err.unwrap_or_else(|| "Unknown error".to_string()))
                .with_retries(retry_count(self.max_retries)),
        )
    }
}

fn system_prompt(opts: &VisionOptions) -> String {
    opts.system_prompt
        .clone()
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
}

/// Delay before retry number `attempt` (1-based), capped at [`MAX_BACKOFF_MS`].
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    2u64.checked_pow(attempt.saturating_sub(1))
        .map_or(MAX_BACKOFF_MS, |factor| base_ms.saturating_mul(factor))
        .min(MAX_BACKOFF_MS)
}

fn retry_count(n: u32) -> u8 {
    u8::try_from(n).unwrap_or(u8::MAX)
}

fn build_options(opts: &VisionOptions) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(opts.temperature),
        max_tokens: Some(opts.max_tokens),
        ..Default::default()
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ExtractError::RecognizerUnavailable {
            engine: format!("vision ({provider_name})"),
            hint: e.to_string(),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`opts.provider`), used as-is.
/// 2. **Named provider + model** (`opts.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`,
///    both non-empty.
/// 4. **`OPENAI_API_KEY`** present: OpenAI with the configured model.
/// 5. **Full auto-detection** via [`ProviderFactory::from_env`].
pub fn resolve_provider(opts: &VisionOptions) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    if let Some(ref provider) = opts.provider {
        return Ok(Arc::clone(provider));
    }

    let model = opts.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);

    if let Some(ref name) = opts.provider_name {
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExtractError::RecognizerUnavailable {
            engine: "vision (auto)".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                 Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                 Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
