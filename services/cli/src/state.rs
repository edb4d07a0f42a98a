//! Shared Application State
//!
//! Builds every service once from the loaded [`Config`] and hands out the
//! pieces each command needs.

use anyhow::Context;
use deckgen_core::{
    assistant::{AssistantClient, OpenAIAssistantClient},
    content::{ContentService, LLMContentService, StaticContentService},
    deck::DeckAssembler,
    dispatch::DispatchLoop,
    illustration::{
        DisabledImageService, ImageService, OpenAIImageService, parse_image_model,
        parse_image_size,
    },
    llm_client::{LLMClient, OpenAICompatibleClient},
    presentation::PresentationBuilder,
    registry::{FunctionRegistry, presentation_registry},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::prompts::load_prompts;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub builder: Arc<PresentationBuilder>,
    pub registry: Arc<FunctionRegistry>,
}

impl AppState {
    /// Wires the deck builder and function registry.
    ///
    /// With `offline` set, slide text is canned, no images are requested and
    /// no API key is needed.
    pub fn new(config: Config, offline: bool) -> anyhow::Result<Self> {
        let (content, images): (Arc<dyn ContentService>, Arc<dyn ImageService>) = if offline {
            info!("Offline mode: using static content and no images.");
            (Arc::new(StaticContentService), Arc::new(DisabledImageService))
        } else {
            let openai_config = config.openai_config()?;
            let prompts = load_prompts(config.prompts_path.as_deref())?;
            let size = parse_image_size(&config.image_size)
                .with_context(|| format!("Unsupported image size '{}'", config.image_size))?;
            (
                Arc::new(LLMContentService::new(
                    openai_config.clone(),
                    config.chat_model.clone(),
                    prompts,
                )),
                Arc::new(OpenAIImageService::new(
                    openai_config,
                    parse_image_model(&config.image_model),
                    size,
                )),
            )
        };

        let builder = Arc::new(PresentationBuilder::new(
            content,
            images,
            DeckAssembler::new(config.output_dir.clone()),
        ));
        let registry = Arc::new(presentation_registry(builder.clone()));

        Ok(Self {
            config: Arc::new(config),
            builder,
            registry,
        })
    }

    pub fn assistant_client(&self) -> anyhow::Result<Arc<dyn AssistantClient>> {
        Ok(Arc::new(OpenAIAssistantClient::new(
            self.config.openai_config()?,
            self.config.assistant_model.clone(),
        )))
    }

    pub fn llm_client(&self) -> anyhow::Result<Arc<dyn LLMClient>> {
        Ok(Arc::new(OpenAICompatibleClient::new(
            self.config.openai_config()?,
            self.config.function_model.clone(),
        )))
    }

    /// A dispatch loop using the configured poll interval and time budget.
    pub fn dispatch_loop(
        &self,
        client: Arc<dyn AssistantClient>,
        cancel: CancellationToken,
    ) -> DispatchLoop {
        DispatchLoop::new(client, self.registry.clone())
            .with_poll_interval(self.config.poll_interval)
            .with_budget(self.config.run_timeout)
            .with_cancellation(cancel)
    }
}
