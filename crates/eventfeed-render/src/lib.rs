//! HTML presentation for eventfeed: templates, tag enrichment and shortcode attributes.

pub mod error;
pub mod html;
pub mod shortcode;
pub mod tags;
pub mod template;

pub use error::RenderError;
pub use html::{EventListRenderer, COMPACT_TEMPLATE, NORMAL_TEMPLATE};
pub use shortcode::{RawShortcodeAttrs, ShortcodeAttrs, View, MAX_EVENTS_LIMIT};
pub use tags::{TagAction, TagEnrichment, TagRule};
pub use template::{escape_html, Template, TemplateValues};
