//! Hashtag enrichment table.

use eventfeed_core::TagRuleConfig;

use crate::error::RenderError;
use crate::template::escape_html;

/// What a known tag does to an event's rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagAction {
    /// Wrap the summary in a link to this URL.
    LinkSummary(String),
    /// Append this HTML snippet to the description.
    AppendHtml(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRule {
    pub tag: String,
    pub action: TagAction,
}

/// Tag → action lookup, applied in table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEnrichment {
    rules: Vec<TagRule>,
}

impl Default for TagEnrichment {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TagEnrichment {
    pub fn new(rules: Vec<TagRule>) -> Self {
        Self { rules }
    }

    /// The built-in table.
    pub fn builtin() -> Self {
        Self::new(vec![
            TagRule {
                tag: "Repaircafe".to_string(),
                action: TagAction::LinkSummary("/repaircafe/".to_string()),
            },
            TagRule {
                tag: "Anmeldung".to_string(),
                action: TagAction::AppendHtml(
                    r#"<p class="eventfeed-note">Bitte vorher anmelden.</p>"#.to_string(),
                ),
            },
            TagRule {
                tag: "Kids".to_string(),
                action: TagAction::AppendHtml(
                    r#"<p class="eventfeed-note">Für Kinder geeignet.</p>"#.to_string(),
                ),
            },
        ])
    }

    /// Build from config rules; an empty list selects the built-in table.
    pub fn from_config(rules: &[TagRuleConfig]) -> Result<Self, RenderError> {
        if rules.is_empty() {
            return Ok(Self::builtin());
        }

        rules
            .iter()
            .map(|rule| {
                let tag = rule.tag.trim().trim_start_matches('#').to_string();
                if tag.is_empty() {
                    return Err(RenderError::InvalidTagRule("empty tag".to_string()));
                }
                let action = match (&rule.link, &rule.html) {
                    (Some(link), None) => TagAction::LinkSummary(link.clone()),
                    (None, Some(html)) => TagAction::AppendHtml(html.clone()),
                    _ => {
                        return Err(RenderError::InvalidTagRule(format!(
                            "tag '{}' needs exactly one of link or html",
                            tag
                        )))
                    }
                };
                Ok(TagRule { tag, action })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    pub fn rules(&self) -> &[TagRule] {
        &self.rules
    }

    /// Apply every rule whose tag is in `tags` to already-escaped HTML.
    ///
    /// Only the first matching link wraps the summary.
    pub fn apply(&self, tags: &[String], summary_html: String, description_html: String) -> (String, String) {
        let mut summary = summary_html;
        let mut description = description_html;
        let mut linked = false;

        for rule in self.rules.iter().filter(|r| tags.iter().any(|t| *t == r.tag)) {
            match &rule.action {
                TagAction::LinkSummary(url) if !linked => {
                    summary = format!(r#"<a href="{}">{}</a>"#, escape_html(url), summary);
                    linked = true;
                }
                TagAction::LinkSummary(_) => {}
                TagAction::AppendHtml(snippet) => description.push_str(snippet),
            }
        }

        (summary, description)
    }
}
