//! Hosting platform detection.
//!
//! Labels a page with the platform that serves it. The label only feeds
//! logs and output records; extraction does not depend on it.

use scraper::{Html, Selector};

use crate::error::Result;
use crate::models::Platform;
use crate::services::extractor::{event_objects, jsonld_selector};

/// URL substrings identifying known event platforms, checked in order.
const URL_PATTERNS: &[(&str, Platform)] = &[
    ("localist.com", Platform::Localist),
    ("eventbrite.com", Platform::Eventbrite),
    ("facebook.com/events", Platform::Facebook),
    ("meetup.com", Platform::Meetup),
];

/// Service for labeling pages with their hosting platform.
pub struct PlatformDetector {
    patterns: Vec<(String, Platform)>,
    scripts: Selector,
}

impl PlatformDetector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            patterns: URL_PATTERNS
                .iter()
                .map(|(needle, platform)| (needle.to_string(), *platform))
                .collect(),
            scripts: jsonld_selector()?,
        })
    }

    /// Detect the platform for a fetched page.
    pub fn detect(&self, url: &str, document: &Html) -> Platform {
        let url_lower = url.to_lowercase();
        if let Some((needle, platform)) = self
            .patterns
            .iter()
            .find(|(needle, _)| url_lower.contains(needle.as_str()))
        {
            log::debug!("Detected platform '{}' via '{}' for URL: {}", platform, needle, url);
            return *platform;
        }

        if event_objects(document, &self.scripts).next().is_some() {
            return Platform::SchemaOrg;
        }

        Platform::Custom
    }
}
