use serde::{Deserialize, Serialize};

use crate::error::{DeckError, Result};

/// A user's request for a deck: what it is about and roughly how long it is.
///
/// The slide count is only a hint passed to the text model; the number of
/// slides actually produced depends on how many titles come back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckRequest {
    pub topic: String,
    pub slide_count: u32,
}

impl DeckRequest {
    /// Creates a request, rejecting an empty topic or a zero slide count.
    pub fn new(topic: impl Into<String>, slide_count: u32) -> Result<Self> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(DeckError::InvalidRequest("topic must not be empty".into()));
        }
        if slide_count == 0 {
            return Err(DeckError::InvalidRequest(
                "slide count must be at least 1".into(),
            ));
        }
        Ok(Self { topic, slide_count })
    }
}

/// An illustration ready to be embedded in a slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideImage {
    /// PNG-encoded pixels.
    pub png: Vec<u8>,
}

/// The content of one content slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideEntry {
    pub title: String,
    pub body: String,
    /// `None` when the image could not be generated.
    pub image: Option<SlideImage>,
}

impl SlideEntry {
    pub fn new(title: String) -> Self {
        Self {
            title,
            body: String::new(),
            image: None,
        }
    }
}

/// Ordered per-slide content, built before anything is rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlidePlan {
    entries: Vec<SlideEntry>,
}

impl SlidePlan {
    /// Builds a plan from generated titles.
    ///
    /// The first title is always dropped: the text model tends to open with
    /// a preamble line rather than a slide title.
    pub fn from_titles(titles: Vec<String>) -> Self {
        let entries = titles.into_iter().skip(1).map(SlideEntry::new).collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SlideEntry> {
        self.entries.iter()
    }

    pub fn entries_mut(&mut self) -> std::slice::IterMut<'_, SlideEntry> {
        self.entries.iter_mut()
    }
}

impl From<Vec<SlideEntry>> for SlidePlan {
    fn from(entries: Vec<SlideEntry>) -> Self {
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plan_drops_first_title() {
        let plan = SlidePlan::from_titles(titles(&["Intro", "A", "B"]));
        let names: Vec<_> = plan.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert!(plan.iter().all(|e| e.image.is_none() && e.body.is_empty()));
    }

    #[test]
    fn test_plan_length_ignores_requested_count() {
        let request = DeckRequest::new("Rust", 2).unwrap();
        let plan = SlidePlan::from_titles(titles(&["x", "a", "b", "c", "d"]));
        assert_eq!(plan.len(), 4);
        assert_ne!(plan.len(), request.slide_count as usize);
    }

    #[test]
    fn test_plan_from_single_title_is_empty() {
        assert!(SlidePlan::from_titles(titles(&["only a preamble"])).is_empty());
        assert!(SlidePlan::from_titles(Vec::new()).is_empty());
    }

    #[test]
    fn test_deck_request_validation() {
        assert!(DeckRequest::new("Pollution", 5).is_ok());
        assert!(matches!(
            DeckRequest::new("  ", 5),
            Err(DeckError::InvalidRequest(_))
        ));
        assert!(matches!(
            DeckRequest::new("Pollution", 0),
            Err(DeckError::InvalidRequest(_))
        ));
    }
}
