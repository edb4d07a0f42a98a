//! Slide Content Generation
//!
//! This module asks a text-generation model for the titles of a deck and for
//! the short paragraph shown on each slide. Prompts are plain templates so
//! they can be tuned without recompiling.

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{DeckError, Result};

/// Template key for the titles prompt. Placeholders: `{topic}`, `{num_slides}`.
pub const TITLES_PROMPT: &str = "generate_titles";
/// Template key for the body prompt. Placeholder: `{slide_title}`.
pub const BODY_PROMPT: &str = "generate_body";

const SAMPLING_TEMPERATURE: f32 = 0.1;
const MAX_OUTPUT_TOKENS: u32 = 200;

/// Built-in prompt templates, used unless overridden from a prompts directory.
pub fn default_prompts() -> HashMap<String, String> {
    HashMap::from([
        (
            TITLES_PROMPT.to_string(),
            "Generate {num_slides} short slides titles for the topic {topic}".to_string(),
        ),
        (
            BODY_PROMPT.to_string(),
            "Generate content for the slide {slide_title}. The content must be in a \
             medium-worded paragraph. Return only 1 paragraph. The paragraph should not \
             contain more than 20 words"
                .to_string(),
        ),
    ])
}

/// Defines the contract for any service that can write slide text.
///
/// Neither method enforces its hint: the slide count and the word cap are
/// only passed along to the model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentService: Send + Sync {
    /// Generates candidate slide titles for `topic`.
    ///
    /// The first element is usually a preamble; callers decide what to do
    /// with it.
    async fn generate_titles(&self, topic: &str, slide_count: u32) -> Result<Vec<String>>;

    /// Generates the body paragraph for one slide.
    async fn generate_body(&self, title: &str) -> Result<String>;
}

/// Splits a free-text model answer into titles.
///
/// The answer is cut on every `.`, so a title containing an abbreviation or
/// a decimal number ends up in several pieces. Each piece is trimmed and
/// empty pieces are dropped.
pub fn split_titles(answer: &str) -> Vec<String> {
    answer
        .split('.')
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
        .collect()
}

/// An implementation of `ContentService` backed by an OpenAI-compatible
/// chat-completions endpoint.
pub struct LLMContentService {
    client: Client<OpenAIConfig>,
    model: String,
    prompts: HashMap<String, String>,
}

impl LLMContentService {
    /// Creates a new LLM-backed content service.
    ///
    /// # Arguments
    ///
    /// * `config` - OpenAI API configuration (API key, base URL, etc.).
    /// * `model` - Chat model identifier (e.g., "gpt-3.5-turbo").
    /// * `prompts` - Template strings keyed by [`TITLES_PROMPT`] and [`BODY_PROMPT`].
    pub fn new(config: OpenAIConfig, model: String, prompts: HashMap<String, String>) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            prompts,
        }
    }

    fn template(&self, key: &str) -> Result<&str> {
        self.prompts
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| DeckError::MissingPrompt(key.to_string()))
    }

    /// A single system-role prompt. The length cap goes out as `max_tokens`,
    /// which every OpenAI-compatible server understands.
    #[allow(deprecated)]
    fn request(&self, prompt: String) -> Result<CreateChatCompletionRequest> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into(),
            ])
            .temperature(SAMPLING_TEMPERATURE)
            .max_tokens(MAX_OUTPUT_TOKENS)
            .build()?;
        Ok(request)
    }

    /// Sends `prompt` and returns the first choice's text.
    async fn complete(&self, prompt: String) -> Result<String> {
        let request = self.request(prompt)?;
        let response = self.client.chat().create(request).await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DeckError::RemoteService("no response choice from LLM".into()))?
            .message
            .content
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| DeckError::RemoteService("no content in LLM response".into()))?;

        Ok(text)
    }
}

#[async_trait]
impl ContentService for LLMContentService {
    async fn generate_titles(&self, topic: &str, slide_count: u32) -> Result<Vec<String>> {
        let prompt = self
            .template(TITLES_PROMPT)?
            .replace("{num_slides}", &slide_count.to_string())
            .replace("{topic}", topic);

        let answer = self.complete(prompt).await?;
        let titles = split_titles(&answer);
        if titles.is_empty() {
            return Err(DeckError::RemoteService(
                "LLM response contained no titles".into(),
            ));
        }
        debug!(topic, requested = slide_count, returned = titles.len(), "Generated titles");
        Ok(titles)
    }

    async fn generate_body(&self, title: &str) -> Result<String> {
        let prompt = self.template(BODY_PROMPT)?.replace("{slide_title}", title);
        self.complete(prompt).await
    }
}

/// A `ContentService` that never leaves the process.
///
/// Used for offline runs and tests; output is deterministic and always
/// starts with a preamble line, like a real model answer.
pub struct StaticContentService;

#[async_trait]
impl ContentService for StaticContentService {
    async fn generate_titles(&self, topic: &str, slide_count: u32) -> Result<Vec<String>> {
        let mut titles = vec![format!("Here are {} slide titles for {}", slide_count, topic)];
        titles.push(format!("Introduction to {}", topic));
        titles.extend((2..=slide_count).map(|n| format!("{} in Practice, Part {}", topic, n)));
        Ok(titles)
    }

    async fn generate_body(&self, title: &str) -> Result<String> {
        Ok(format!(
            "{} explained in a few words, with one idea worth remembering.",
            title
        ))
    }
}
