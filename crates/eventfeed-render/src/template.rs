//! `{{name}}` placeholder templates.
//!
//! Substitution only: no loops, conditionals or implicit escaping. Callers
//! decide per value whether it goes in raw ([`TemplateValues::set_raw`]) or
//! HTML-escaped ([`TemplateValues::set_text`]).

use std::collections::HashMap;

/// Escape the five HTML-significant characters.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Name → value mapping for one render.
#[derive(Debug, Clone, Default)]
pub struct TemplateValues {
    values: HashMap<String, String>,
}

impl TemplateValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` as-is.
    pub fn set_raw(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    /// Insert `text` HTML-escaped.
    pub fn set_text(&mut self, name: &str, text: &str) -> &mut Self {
        self.set_raw(name, escape_html(text))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A template split into literal text and placeholders once, rendered many times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse `source`.
    ///
    /// `{{ name }}` may carry inner whitespace. Braces around anything other than
    /// a plain name, and an unterminated `{{`, stay literal text.
    pub fn new(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(open) = rest.find("{{") {
            literal.push_str(&rest[..open]);
            let after_open = &rest[open + 2..];
            let Some(close) = after_open.find("}}") else {
                literal.push_str(&rest[open..]);
                rest = "";
                break;
            };

            let name = after_open[..close].trim();
            if is_placeholder_name(name) {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(name.to_string()));
            } else {
                literal.push_str(&rest[open..open + 2 + close + 2]);
            }
            rest = &after_open[close + 2..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute every placeholder. Unknown names render as empty strings.
    pub fn render(&self, values: &TemplateValues) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => match values.get(name) {
                    Some(value) => out.push_str(value),
                    None => tracing::trace!("Template placeholder '{}' has no value", name),
                },
            }
        }
        out
    }
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_substitutes_values() {
        let template = Template::new("<h3>{{summary}}</h3><p>{{ location }}</p>");
        let mut values = TemplateValues::new();
        values.set_raw("summary", "Repair Café").set_raw("location", "Werkstatt");

        assert_eq!(
            template.render(&values),
            "<h3>Repair Café</h3><p>Werkstatt</p>"
        );
    }

    #[test]
    fn test_values_are_not_escaped_implicitly() {
        let template = Template::new("{{a}}|{{b}}");
        let mut values = TemplateValues::new();
        values.set_raw("a", "<b>x</b>").set_text("b", "<b>x</b>");

        assert_eq!(template.render(&values), "<b>x</b>|&lt;b&gt;x&lt;/b&gt;");
    }

    #[test]
    fn test_unknown_placeholder_is_empty() {
        let template = Template::new("[{{missing}}]");
        assert_eq!(template.render(&TemplateValues::new()), "[]");
    }

    #[test]
    fn test_literal_braces_survive() {
        let template = Template::new("{{#each items}} and {{ two words }} and {{open");
        assert_eq!(template.placeholders().count(), 0);
        assert_eq!(
            template.render(&TemplateValues::new()),
            "{{#each items}} and {{ two words }} and {{open"
        );
    }

    #[test]
    fn test_placeholders_in_order() {
        let template = Template::new("{{startDate}} {{startTime}}-{{endTime}}");
        let names: Vec<&str> = template.placeholders().collect();
        assert_eq!(names, vec!["startDate", "startTime", "endTime"]);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }
}
