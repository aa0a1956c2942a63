// src/models/mod.rs

//! Domain models for the spider.

mod config;
mod event;
mod stats;

// Re-export all public types
pub use config::{Config, CrawlerConfig, DetectionConfig, OracleConfig, OutputConfig};
pub use event::{CandidateEvent, FreeFoodEvent, Platform, event_id};
pub use stats::{CrawlStatistics, ERR_HTTP, ERR_LINKS, ERR_ORACLE, ERR_SINK, StatsSummary};
