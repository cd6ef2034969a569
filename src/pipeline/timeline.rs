//! Temporal event extraction
//!
//! Every document yields a base `document_observed` event, plus one
//! `date_mentioned` event per distinct date written in its text. Events are
//! keyed by a hash of their content, so re-extraction produces the same keys.

use crate::storage::{Content, TimelineEvent};
use chrono::{DateTime, NaiveDate, Utc};
use regex_lite::Regex;
use uuid::Uuid;

pub const DOCUMENT_OBSERVED: &str = "document_observed";
pub const DATE_MENTIONED: &str = "date_mentioned";

/// Bytes of surrounding text kept on each side of a date mention
const CONTEXT_RADIUS: usize = 60;

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september", "october",
    "november", "december",
];

/// Content-derived dedup key for a timeline event
pub fn event_hash(document_id: &str, date: NaiveDate, event_type: &str, description: &str) -> String {
    let key = format!("{}|{}|{}|{}", document_id, date, event_type, description);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}

#[derive(Debug, Clone)]
pub struct TimelineExtractor {
    iso: Regex,
    us: Regex,
    long: Regex,
}

impl TimelineExtractor {
    pub fn new() -> Result<Self, regex_lite::Error> {
        Ok(Self {
            iso: Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b")?,
            us: Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b")?,
            long: Regex::new(
                r"(?i)\b(January|February|March|April|May|June|July|August|September|October|November|December)\s+(\d{1,2}),?\s+(\d{4})\b",
            )?,
        })
    }

    /// Events for one document, base event first, mentions in text order
    pub fn extract(&self, content: &Content) -> Vec<TimelineEvent> {
        let now = Utc::now();
        let observed = observed_date(content);
        let label = content.title.as_deref().unwrap_or(&content.id);
        let description = format!("Document observed: {}", label);

        let mut events = vec![TimelineEvent {
            event_hash: event_hash(&content.id, observed, DOCUMENT_OBSERVED, &description),
            document_id: content.id.clone(),
            event_date: observed,
            event_type: DOCUMENT_OBSERVED.to_string(),
            description,
            context: None,
            created_at: now,
        }];

        let text = content.text();
        let mut mentions = self.mentions(&text);
        mentions.sort_by_key(|(start, _, _)| *start);

        for (start, end, date) in mentions {
            let description = format!("Date mentioned: {}", &text[start..end]);
            let hash = event_hash(&content.id, date, DATE_MENTIONED, &description);
            if events.iter().any(|e| e.event_hash == hash) {
                continue;
            }
            events.push(TimelineEvent {
                event_hash: hash,
                document_id: content.id.clone(),
                event_date: date,
                event_type: DATE_MENTIONED.to_string(),
                description,
                context: Some(surrounding(&text, start, end)),
                created_at: now,
            });
        }

        events
    }

    /// (start, end, date) for every parseable date in the text
    fn mentions(&self, text: &str) -> Vec<(usize, usize, NaiveDate)> {
        let mut found = Vec::new();

        for caps in self.iso.captures_iter(text) {
            let date = ymd(&caps[1], &caps[2], &caps[3]);
            push_match(&mut found, caps.get(0), date);
        }
        for caps in self.us.captures_iter(text) {
            let date = ymd(&caps[3], &caps[1], &caps[2]);
            push_match(&mut found, caps.get(0), date);
        }
        for caps in self.long.captures_iter(text) {
            let month = caps[1].to_lowercase();
            let date = MONTHS
                .iter()
                .position(|m| *m == month)
                .and_then(|i| ymd(&caps[3], &(i + 1).to_string(), &caps[2]));
            push_match(&mut found, caps.get(0), date);
        }

        found
    }
}

fn push_match(
    found: &mut Vec<(usize, usize, NaiveDate)>,
    whole: Option<regex_lite::Match<'_>>,
    date: Option<NaiveDate>,
) {
    if let (Some(m), Some(date)) = (whole, date) {
        found.push((m.start(), m.end(), date));
    }
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// Metadata `date` (RFC 3339 or YYYY-MM-DD) if present, else the creation date
fn observed_date(content: &Content) -> NaiveDate {
    content
        .meta_str("date")
        .and_then(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.date_naive())
                .ok()
                .or_else(|| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        })
        .unwrap_or_else(|| content.created_at.date_naive())
}

fn surrounding(text: &str, start: usize, end: usize) -> String {
    let mut from = start.saturating_sub(CONTEXT_RADIUS);
    while !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + CONTEXT_RADIUS).min(text.len());
    while !text.is_char_boundary(to) {
        to += 1;
    }
    text[from..to].split_whitespace().collect::<Vec<_>>().join(" ")
}
