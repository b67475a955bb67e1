//! Natural-language interpretation of sentiment results by a remote LLM.

mod client;
mod prompts;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::config::LlmConfig;

pub use client::GeminiClient;
pub use prompts::{global_prompt, GLOBAL_INSTRUCTIONS};

/// Prefix of the inline text that replaces a failed interpretation.
pub const INLINE_ERROR_PREFIX: &str = "Error en análisis por LLM (Gemini)";

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM is disabled")]
    Disabled,

    #[error("No API key configured (set SONDEO_LLM_API_KEY or GEMINI_API_KEY)")]
    MissingApiKey,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Turns a prompt into free text.
#[async_trait]
pub trait Interpreter: Send + Sync {
    async fn interpret_text(&self, prompt: &str) -> Result<String, LlmError>;

    fn model(&self) -> &str;
}

/// Interpreter used when the LLM is switched off in the configuration.
pub struct DisabledInterpreter;

#[async_trait]
impl Interpreter for DisabledInterpreter {
    async fn interpret_text(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Disabled)
    }

    fn model(&self) -> &str {
        "disabled"
    }
}

/// Builds the interpreter described by `config`.
pub fn from_config(config: &LlmConfig) -> Result<Box<dyn Interpreter>, LlmError> {
    if !config.enabled {
        return Ok(Box::new(DisabledInterpreter));
    }
    Ok(Box::new(GeminiClient::new(config)?))
}

/// Never fails: an LLM error becomes an inline error string.
pub async fn interpret_or_inline(interpreter: &dyn Interpreter, prompt: &str) -> String {
    match interpreter.interpret_text(prompt).await {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!("LLM interpretation failed: {}", e);
            format!("{}: {}", INLINE_ERROR_PREFIX, e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Interpreter for Echo {
        async fn interpret_text(&self, prompt: &str) -> Result<String, LlmError> {
            Ok(format!("  {}\n", prompt))
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_interpret_or_inline_trims_success() {
        assert_eq!(interpret_or_inline(&Echo, "hola").await, "hola");
    }

    #[tokio::test]
    async fn test_interpret_or_inline_degrades_to_text() {
        let text = interpret_or_inline(&DisabledInterpreter, "hola").await;
        assert_eq!(text, "Error en análisis por LLM (Gemini): LLM is disabled");
    }

    #[test]
    fn test_from_config() {
        let mut config = LlmConfig::default();
        config.enabled = false;
        assert_eq!(from_config(&config).unwrap().model(), "disabled");

        config.enabled = true;
        assert_eq!(from_config(&config).unwrap().model(), "gemini-3-flash-preview");
    }
}
