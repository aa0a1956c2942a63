//! Event data structures.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::utils::dates::{iso_utc, iso_utc_opt, to_iso_utc};

/// Hex characters kept from the SHA-256 digest.
const EVENT_ID_LEN: usize = 24;

/// Hosting platform of an event page, used for labeling only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Localist,
    Eventbrite,
    Facebook,
    Meetup,
    #[serde(rename = "schema.org")]
    SchemaOrg,
    #[default]
    Custom,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Localist => "localist",
            Platform::Eventbrite => "eventbrite",
            Platform::Facebook => "facebook",
            Platform::Meetup => "meetup",
            Platform::SchemaOrg => "schema.org",
            Platform::Custom => "custom",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event pulled from a page's structured data, not yet confirmed.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateEvent {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    /// Empty when the page gave no usable location; such candidates are rejected later.
    pub location: String,
    pub description: Option<String>,
    pub source_url: String,
    pub platform: Platform,
}

impl CandidateEvent {
    /// Start time as a `Z`-suffixed ISO string.
    pub fn start_iso(&self) -> String {
        to_iso_utc(&self.start)
    }

    /// Deterministic identity of this event.
    pub fn event_id(&self) -> String {
        event_id(&self.title, &self.start_iso(), &self.location, &self.source_url)
    }
}

/// A confirmed free-food event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeFoodEvent {
    pub source_url: String,
    pub title: String,
    #[serde(with = "iso_utc")]
    pub start: DateTime<Utc>,
    #[serde(with = "iso_utc_opt")]
    pub end: Option<DateTime<Utc>>,
    pub location: String,
    pub description: Option<String>,
    /// Verbatim phrase the oracle cited
    pub proof: String,
    pub confidence: f64,
    pub event_id: String,
    pub platform: Platform,
}

impl FreeFoodEvent {
    /// Seal a candidate with the oracle's evidence.
    pub fn confirm(candidate: CandidateEvent, proof: String, confidence: f64) -> Self {
        let event_id = candidate.event_id();
        Self {
            source_url: candidate.source_url,
            title: candidate.title,
            start: candidate.start,
            end: candidate.end,
            location: candidate.location,
            description: candidate.description.filter(|d| !d.is_empty()),
            proof,
            confidence,
            event_id,
            platform: candidate.platform,
        }
    }
}

/// Stable id over (normalized title, start, normalized location, source URL).
pub fn event_id(title: &str, start_iso: &str, location: &str, source_url: &str) -> String {
    let key = format!(
        "{}|{}|{}|{}",
        title.trim().to_lowercase(),
        start_iso,
        location.trim().to_lowercase(),
        source_url
    );
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    digest[..EVENT_ID_LEN].to_string()
}
