//! Code generation through an external text-generation service.
//!
//! The service is a black box returning text. [`parse_generated`] turns
//! that text into a [`GeneratedSource`] or rejects it outright.

pub mod openai;
pub mod prompt;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

pub use openai::OpenAiClient;

const REQUIREMENTS_MARKER: &str = "REQUIREMENTS:\n";
const CODE_SECTION_MARKER: &str = "\n\nCODE:";
const CODE_MARKER: &str = "CODE:\n";

/// Errors from the clarification and code generation steps
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("No response was generated by the text generation service")]
    EmptyResponse,

    #[error("Could not parse requirements and code from response")]
    Parse,

    #[error("text generation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("text generation service returned {status}: {body}")]
    Upstream { status: u16, body: String },
}

/// Output of one synthesis call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSource {
    /// Python module exposing `handler`
    pub source_code: String,
    /// requirements.txt contents
    pub dependency_manifest: String,
}

/// One chat-completion request
#[derive(Debug, Clone)]
pub struct Completion {
    pub system: Option<String>,
    pub user: String,
    pub temperature: f32,
}

/// Raw access to a chat-completions style model
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the first choice's content, or `None` when the model produced none.
    async fn complete(&self, request: Completion) -> Result<Option<String>, SynthesisError>;
}

/// Produces deployable source for a job
#[async_trait]
pub trait CodeSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        prompt: &str,
        clarification: &str,
    ) -> Result<GeneratedSource, SynthesisError>;
}

/// Synthesizer that prompts a [`TextGenerator`] and parses the two-section reply
pub struct LlmSynthesizer {
    generator: Arc<dyn TextGenerator>,
}

impl LlmSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl CodeSynthesizer for LlmSynthesizer {
    async fn synthesize(
        &self,
        prompt: &str,
        clarification: &str,
    ) -> Result<GeneratedSource, SynthesisError> {
        let request = Completion {
            system: None,
            user: prompt::code_generation(prompt, clarification),
            temperature: 0.2,
        };

        let response = self
            .generator
            .complete(request)
            .await?
            .filter(|text| !text.trim().is_empty())
            .ok_or(SynthesisError::EmptyResponse)?;

        let generated = parse_generated(&response)?;
        info!(
            code_bytes = generated.source_code.len(),
            manifest_bytes = generated.dependency_manifest.len(),
            "Generated function source"
        );
        debug!(requirements = %generated.dependency_manifest, "Generated requirements");
        Ok(generated)
    }
}

/// Split `REQUIREMENTS:\n<manifest>\n\nCODE:\n<code>` into its sections.
///
/// The manifest ends at the first blank line followed by `CODE:`; the code is
/// everything after the first `CODE:\n`.
pub fn parse_generated(response: &str) -> Result<GeneratedSource, SynthesisError> {
    let manifest_start = response
        .find(REQUIREMENTS_MARKER)
        .map(|i| i + REQUIREMENTS_MARKER.len())
        .ok_or(SynthesisError::Parse)?;
    let manifest_len = response[manifest_start..]
        .find(CODE_SECTION_MARKER)
        .ok_or(SynthesisError::Parse)?;
    let manifest = &response[manifest_start..manifest_start + manifest_len];

    let code_start = response
        .find(CODE_MARKER)
        .map(|i| i + CODE_MARKER.len())
        .ok_or(SynthesisError::Parse)?;
    let code = &response[code_start..];

    Ok(GeneratedSource {
        source_code: code.trim().to_string(),
        dependency_manifest: manifest.trim().to_string(),
    })
}

/// Ask for 1-3 clarifying questions about `prompt`; `None` when it is already clear.
pub async fn clarify(
    generator: &dyn TextGenerator,
    prompt: &str,
) -> Result<Option<String>, SynthesisError> {
    let request = Completion {
        system: Some(prompt::CLARIFIER_SYSTEM.to_string()),
        user: prompt::clarification(prompt),
        temperature: 0.7,
    };

    let question = generator.complete(request).await?.unwrap_or_default();
    let question = question.trim();

    if question.is_empty() || question.to_lowercase().contains("no clarification needed") {
        return Ok(None);
    }
    Ok(Some(question.to_string()))
}
