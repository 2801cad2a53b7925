//! Rendering and attribute validation errors.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("max_events must be a number between 1 and 100, got '{0}'")]
    InvalidMaxEvents(String),

    #[error("view must be 'normal' or 'compact', got '{0}'")]
    InvalidView(String),

    #[error("tag filter must look like '#tag', got '{0}'")]
    InvalidTagFilter(String),

    #[error("Invalid tag rule: {0}")]
    InvalidTagRule(String),
}

impl RenderError {
    /// User-friendly error message for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            RenderError::InvalidMaxEvents(_) => "The number of events must be between 1 and 100.",
            RenderError::InvalidView(_) => "Unknown calendar view.",
            RenderError::InvalidTagFilter(_) => "The tag filter must start with '#'.",
            RenderError::InvalidTagRule(_) => "The tag configuration is invalid.",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RenderError::InvalidMaxEvents(_) => "invalid_max_events",
            RenderError::InvalidView(_) => "invalid_view",
            RenderError::InvalidTagFilter(_) => "invalid_tag_filter",
            RenderError::InvalidTagRule(_) => "invalid_tag_rule",
        }
    }
}
