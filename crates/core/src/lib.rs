//! Slide-deck generation from a topic.
//!
//! Titles and body text come from a text-generation model, illustrations
//! from an image-generation model, and the result is written as a `.pptx`
//! file. The same deck builder is exposed as a callable function, so a
//! remote assistant run (see [`dispatch`]) or a single chat completion (see
//! [`chat`]) can ask for a deck to be made.

pub mod assistant;
pub mod chat;
pub mod content;
pub mod deck;
pub mod dispatch;
pub mod error;
pub mod illustration;
pub mod llm_client;
pub mod presentation;
pub mod registry;
pub mod slide;

pub use error::{DeckError, Result};
pub use slide::{DeckRequest, SlideEntry, SlideImage, SlidePlan};
