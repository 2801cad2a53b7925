//! Server-side HTML rendering of event lists.

use eventfeed_calendar::{filter_by_tag, NormalizedEvent};

use crate::shortcode::{ShortcodeAttrs, View};
use crate::tags::TagEnrichment;
use crate::template::{escape_html, Template, TemplateValues};

pub const NORMAL_TEMPLATE: &str = r#"<div class="eventfeed-event">
  <div class="eventfeed-day">{{weekDayShort}}</div>
  <div class="eventfeed-body">
    <h3 class="eventfeed-summary">{{summary}}</h3>
    <div class="eventfeed-when">{{dateRange}}, {{timeRange}}</div>
    <div class="eventfeed-where">{{location}}</div>
    <div class="eventfeed-description">{{description}}</div>
    <div class="eventfeed-tags">{{tags}}</div>
  </div>
</div>
"#;

pub const COMPACT_TEMPLATE: &str = r#"<div class="eventfeed-event eventfeed-event--compact"><span class="eventfeed-when">{{weekDayShort}} {{startDate}} {{startTime}}</span> <span class="eventfeed-summary">{{summary}}</span></div>
"#;

const EMPTY_HTML: &str =
    r#"<div class="eventfeed eventfeed--empty"><p>Keine anstehenden Termine.</p></div>"#;

/// Renders event lists for both views.
#[derive(Debug, Clone)]
pub struct EventListRenderer {
    normal: Template,
    compact: Template,
    enrichment: TagEnrichment,
}

impl EventListRenderer {
    pub fn new(enrichment: TagEnrichment) -> Self {
        Self::with_templates(
            Template::new(NORMAL_TEMPLATE),
            Template::new(COMPACT_TEMPLATE),
            enrichment,
        )
    }

    pub fn with_templates(normal: Template, compact: Template, enrichment: TagEnrichment) -> Self {
        Self {
            normal,
            compact,
            enrichment,
        }
    }

    /// Filter by tag, cap at `max_events` and render each event into one container.
    pub fn render(&self, events: Vec<NormalizedEvent>, attrs: &ShortcodeAttrs) -> String {
        let events = match &attrs.tag_filter {
            Some(tag) => filter_by_tag(events, tag),
            None => events,
        };
        if events.is_empty() {
            return EMPTY_HTML.to_string();
        }

        let template = match attrs.view {
            View::Normal => &self.normal,
            View::Compact => &self.compact,
        };

        let mut html = format!(r#"<div class="eventfeed eventfeed--{}">"#, attrs.view.as_str());
        html.push('\n');
        for event in events.iter().take(attrs.max_events as usize) {
            html.push_str(&template.render(&self.values(event)));
        }
        html.push_str("</div>\n");
        html
    }

    /// Template values for one event. Text is escaped here; enrichment adds raw HTML.
    pub fn values(&self, event: &NormalizedEvent) -> TemplateValues {
        let summary = escape_html(&event.summary);
        let description = escape_html(&event.description).replace('\n', "<br>");
        let (summary, description) = self.enrichment.apply(&event.tags, summary, description);

        let date_range = if event.same_day {
            event.start_date.clone()
        } else {
            format!("{} - {}", event.start_date, event.end_date)
        };
        let time_range = if event.all_day {
            "ganztägig".to_string()
        } else if event.start_time == event.end_time && event.same_day {
            event.start_time.clone()
        } else {
            format!("{} - {}", event.start_time, event.end_time)
        };
        let tags: String = event
            .tags
            .iter()
            .map(|t| format!(r#"<span class="eventfeed-tag">#{}</span>"#, escape_html(t)))
            .collect();

        let mut values = TemplateValues::new();
        values
            .set_raw("summary", summary)
            .set_raw("description", description)
            .set_text("location", &event.location)
            .set_text("startDate", &event.start_date)
            .set_text("startTime", &event.start_time)
            .set_text("endDate", &event.end_date)
            .set_text("endTime", &event.end_time)
            .set_text("weekDayShort", &event.week_day_short)
            .set_text("dateRange", &date_range)
            .set_text("timeRange", &time_range)
            .set_raw("tags", tags);
        values
    }
}

impl Default for EventListRenderer {
    fn default() -> Self {
        Self::new(TagEnrichment::builtin())
    }
}
