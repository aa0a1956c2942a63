// src/services/extractor.rs

//! Structured event extraction from embedded JSON-LD.
//!
//! Extraction is platform-agnostic: Localist, Eventbrite and hand-rolled
//! calendars all publish schema.org `Event` objects the same way.

use chrono_tz::Tz;
use scraper::{Html, Selector};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::CandidateEvent;
use crate::utils::dates::parse_datetime;
use crate::utils::html::strip_html;

const JSONLD_SELECTOR: &str = r#"script[type="application/ld+json"]"#;

pub(crate) type JsonObject = Map<String, Value>;

/// Selector matching embedded JSON-LD blocks.
pub(crate) fn jsonld_selector() -> Result<Selector> {
    Selector::parse(JSONLD_SELECTOR)
        .map_err(|e| AppError::config(format!("Invalid selector '{JSONLD_SELECTOR}': {e:?}")))
}

/// Pulls a [`CandidateEvent`] out of a page's JSON-LD blocks.
pub struct EventExtractor {
    tz: Tz,
    scripts: Selector,
}

impl EventExtractor {
    /// Create an extractor that reads naive dates in `tz`.
    pub fn new(tz: Tz) -> Result<Self> {
        Ok(Self {
            tz,
            scripts: jsonld_selector()?,
        })
    }

    /// Parse `html` and extract from it.
    pub fn extract_html(&self, html: &str, page_url: &str) -> Option<CandidateEvent> {
        self.extract(&Html::parse_document(html), page_url)
    }

    /// The first acceptable `Event` object on the page.
    ///
    /// Objects without a name or with an unparseable start are passed over.
    /// The returned candidate carries the default platform tag; the caller
    /// labels it.
    pub fn extract(&self, document: &Html, page_url: &str) -> Option<CandidateEvent> {
        event_objects(document, &self.scripts).find_map(|obj| self.to_candidate(&obj, page_url))
    }

    fn to_candidate(&self, obj: &JsonObject, page_url: &str) -> Option<CandidateEvent> {
        let title = obj
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if title.is_empty() {
            return None;
        }

        let start = obj
            .get("startDate")
            .and_then(Value::as_str)
            .and_then(|raw| parse_datetime(raw, self.tz))?;
        let end = obj
            .get("endDate")
            .and_then(Value::as_str)
            .and_then(|raw| parse_datetime(raw, self.tz));

        let description = obj
            .get("description")
            .and_then(Value::as_str)
            .filter(|d| !d.trim().is_empty())
            .map(strip_html)
            .filter(|d| !d.is_empty());

        Some(CandidateEvent {
            title: title.to_string(),
            start,
            end,
            location: obj.get("location").map(location_name).unwrap_or_default(),
            description,
            source_url: page_url.to_string(),
            platform: Default::default(),
        })
    }
}

/// Every JSON-LD object on the page typed `Event`, in document order.
pub(crate) fn event_objects<'a>(
    document: &'a Html,
    scripts: &'a Selector,
) -> impl Iterator<Item = JsonObject> + 'a {
    document
        .select(scripts)
        .filter_map(|script| {
            let text = script.text().collect::<String>();
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            match serde_json::from_str::<Value>(text) {
                Ok(value) => Some(value),
                Err(e) => {
                    log::debug!("Skipping malformed JSON-LD block: {}", e);
                    None
                }
            }
        })
        .flat_map(candidate_pool)
        .filter(is_event)
}

/// Objects eligible for type filtering: a lone object, a list, or an `@graph`.
fn candidate_pool(value: Value) -> Vec<JsonObject> {
    match value {
        Value::Array(items) => items.into_iter().filter_map(into_object).collect(),
        Value::Object(mut obj) => match obj.remove("@graph") {
            Some(Value::Array(items)) => items.into_iter().filter_map(into_object).collect(),
            Some(other) => {
                obj.insert("@graph".to_string(), other);
                vec![obj]
            }
            None => vec![obj],
        },
        _ => Vec::new(),
    }
}

fn into_object(value: Value) -> Option<JsonObject> {
    match value {
        Value::Object(obj) => Some(obj),
        _ => None,
    }
}

/// `@type` equals "Event" (case-insensitive), directly or as a list member.
fn is_event(obj: &JsonObject) -> bool {
    let matches = |v: &Value| v.as_str().is_some_and(|t| t.trim().eq_ignore_ascii_case("event"));
    match obj.get("@type") {
        Some(Value::Array(types)) => types.iter().any(matches),
        Some(other) => matches(other),
        None => false,
    }
}

/// Human-readable location from a string, a Place, or a list of either.
fn location_name(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .map(location_name)
            .find(|name| !name.is_empty())
            .unwrap_or_default(),
        Value::Object(place) => {
            let name = place
                .get("name")
                .and_then(Value::as_str)
                .map(str::trim)
                .unwrap_or_default();
            if !name.is_empty() {
                return name.to_string();
            }
            place.get("address").map(address_text).unwrap_or_default()
        }
        _ => String::new(),
    }
}

fn address_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Object(addr) => {
            if let Some(street) = addr
                .get("streetAddress")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
            {
                return street.to_string();
            }
            ["addressLocality", "addressRegion"]
                .iter()
                .filter_map(|key| addr.get(*key).and_then(Value::as_str))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        }
        _ => String::new(),
    }
}
