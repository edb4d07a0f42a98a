//! Presentation Building
//!
//! Ties the content generator, the image generator and the deck assembler
//! together: one [`DeckRequest`] in, one deck file out.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::content::ContentService;
use crate::deck::DeckAssembler;
use crate::error::Result;
use crate::illustration::ImageService;
use crate::slide::{DeckRequest, SlidePlan};

pub struct PresentationBuilder {
    content: Arc<dyn ContentService>,
    images: Arc<dyn ImageService>,
    assembler: DeckAssembler,
}

impl PresentationBuilder {
    pub fn new(
        content: Arc<dyn ContentService>,
        images: Arc<dyn ImageService>,
        assembler: DeckAssembler,
    ) -> Self {
        Self {
            content,
            images,
            assembler,
        }
    }

    /// Generates text for every slide and an image where one can be made.
    ///
    /// Any text-generation error aborts the plan. An image error only drops
    /// the image for that slide.
    pub async fn plan(&self, request: &DeckRequest) -> Result<SlidePlan> {
        let titles = self
            .content
            .generate_titles(&request.topic, request.slide_count)
            .await?;
        let mut plan = SlidePlan::from_titles(titles);
        info!(
            topic = %request.topic,
            requested = request.slide_count,
            planned = plan.len(),
            "Slide plan created"
        );

        for entry in plan.entries_mut() {
            entry.body = self.content.generate_body(&entry.title).await?;
            entry.image = match self.images.generate_image(&entry.body).await {
                Ok(image) => Some(image),
                Err(e) => {
                    warn!(
                        title = %entry.title,
                        error = %e,
                        "Image generation failed; slide will have no image"
                    );
                    None
                }
            };
        }

        Ok(plan)
    }

    /// Plans and writes the deck, returning its path.
    pub async fn build(&self, request: &DeckRequest) -> Result<PathBuf> {
        let plan = self.plan(request).await?;
        self.assembler.assemble(&request.topic, &plan)
    }
}
