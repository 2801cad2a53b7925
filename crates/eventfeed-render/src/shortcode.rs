//! Shortcode attributes: `max_events`, `view`, `tag_filter` / `filter`.

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::RenderError;

pub const MAX_EVENTS_LIMIT: u32 = 100;

#[allow(clippy::expect_used)]
fn tag_filter_regex() -> &'static Regex {
    static TAG_FILTER_RE: OnceLock<Regex> = OnceLock::new();
    TAG_FILTER_RE.get_or_init(|| Regex::new(r"^#\w+$").expect("tag filter regex must compile"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Normal,
    Compact,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            View::Normal => "normal",
            View::Compact => "compact",
        }
    }
}

impl FromStr for View {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "normal" => Ok(View::Normal),
            "compact" => Ok(View::Compact),
            other => Err(RenderError::InvalidView(other.to_string())),
        }
    }
}

/// Attributes as they arrive, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawShortcodeAttrs {
    #[serde(default)]
    pub max_events: Option<String>,
    #[serde(default)]
    pub view: Option<String>,
    #[serde(default)]
    pub tag_filter: Option<String>,
    /// Older alias of `tag_filter`
    #[serde(default)]
    pub filter: Option<String>,
}

/// Validated attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcodeAttrs {
    pub max_events: u32,
    pub view: View,
    /// Tag name without `#`
    pub tag_filter: Option<String>,
}

impl ShortcodeAttrs {
    /// Validate `raw`. Blank values count as unset; `tag_filter` wins over `filter`.
    pub fn parse(raw: &RawShortcodeAttrs, default_max_events: u32) -> Result<Self, RenderError> {
        let max_events = match non_blank(&raw.max_events) {
            None => default_max_events.clamp(1, MAX_EVENTS_LIMIT),
            Some(value) => value
                .parse::<u32>()
                .ok()
                .filter(|n| (1..=MAX_EVENTS_LIMIT).contains(n))
                .ok_or_else(|| RenderError::InvalidMaxEvents(value.to_string()))?,
        };

        let view = match non_blank(&raw.view) {
            None => View::default(),
            Some(value) => value.parse()?,
        };

        let tag_filter = match non_blank(&raw.tag_filter).or_else(|| non_blank(&raw.filter)) {
            None => None,
            Some(value) if tag_filter_regex().is_match(value) => {
                Some(value.trim_start_matches('#').to_string())
            }
            Some(value) => return Err(RenderError::InvalidTagFilter(value.to_string())),
        };

        Ok(Self {
            max_events,
            view,
            tag_filter,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn raw(max: Option<&str>, view: Option<&str>, tag: Option<&str>, filter: Option<&str>) -> RawShortcodeAttrs {
        RawShortcodeAttrs {
            max_events: max.map(String::from),
            view: view.map(String::from),
            tag_filter: tag.map(String::from),
            filter: filter.map(String::from),
        }
    }

    #[test]
    fn test_defaults() {
        let attrs = ShortcodeAttrs::parse(&RawShortcodeAttrs::default(), 20).unwrap();
        assert_eq!(
            attrs,
            ShortcodeAttrs {
                max_events: 20,
                view: View::Normal,
                tag_filter: None
            }
        );
    }

    #[test]
    fn test_max_events_bounds() {
        for ok in ["1", "100", " 42 "] {
            assert!(ShortcodeAttrs::parse(&raw(Some(ok), None, None, None), 20).is_ok(), "{}", ok);
        }
        for bad in ["0", "101", "-1", "ten"] {
            assert!(
                matches!(
                    ShortcodeAttrs::parse(&raw(Some(bad), None, None, None), 20),
                    Err(RenderError::InvalidMaxEvents(_))
                ),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn test_view() {
        let attrs = ShortcodeAttrs::parse(&raw(None, Some("compact"), None, None), 20).unwrap();
        assert_eq!(attrs.view, View::Compact);
        assert!(matches!(
            ShortcodeAttrs::parse(&raw(None, Some("grid"), None, None), 20),
            Err(RenderError::InvalidView(_))
        ));
    }

    #[test]
    fn test_tag_filter_and_alias() {
        let attrs = ShortcodeAttrs::parse(&raw(None, None, Some("#Repaircafe"), None), 20).unwrap();
        assert_eq!(attrs.tag_filter.as_deref(), Some("Repaircafe"));

        let attrs = ShortcodeAttrs::parse(&raw(None, None, None, Some("#Lötkurs")), 20).unwrap();
        assert_eq!(attrs.tag_filter.as_deref(), Some("Lötkurs"));

        let attrs = ShortcodeAttrs::parse(&raw(None, None, Some("#A"), Some("#B")), 20).unwrap();
        assert_eq!(attrs.tag_filter.as_deref(), Some("A"));
    }

    #[test]
    fn test_tag_filter_rejects_bad_values() {
        for bad in ["Repaircafe", "#", "#two words", "#a<script>"] {
            assert!(
                matches!(
                    ShortcodeAttrs::parse(&raw(None, None, Some(bad), None), 20),
                    Err(RenderError::InvalidTagFilter(_))
                ),
                "{}",
                bad
            );
        }
    }
}
