//! Run-scoped crawl statistics.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error bucket for failed or rejected page fetches.
pub const ERR_HTTP: &str = "http_error";
/// Error bucket for link extraction failures.
pub const ERR_LINKS: &str = "link_extraction";
/// Error bucket for oracle soft failures.
pub const ERR_ORACLE: &str = "oracle";
/// Error bucket for persistence sink failures.
pub const ERR_SINK: &str = "sink";

/// Counters mutated throughout a run and read at its end.
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    pub pages_crawled: u64,
    pub pages_skipped: u64,
    pub events_found: u64,
    pub events_with_food: u64,
    pub events_saved: u64,
    pub oracle_calls: u64,
    pub oracle_errors: u64,
    pub cache_hits: u64,
    pub errors: BTreeMap<String, u64>,
    pub started_at: DateTime<Utc>,
    started: Instant,
}

impl CrawlStatistics {
    pub fn new() -> Self {
        Self {
            pages_crawled: 0,
            pages_skipped: 0,
            events_found: 0,
            events_with_food: 0,
            events_saved: 0,
            oracle_calls: 0,
            oracle_errors: 0,
            cache_hits: 0,
            errors: BTreeMap::new(),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Count one error under a named bucket.
    pub fn record_error(&mut self, bucket: &str) {
        *self.errors.entry(bucket.to_string()).or_insert(0) += 1;
    }

    /// Errors recorded under `bucket`.
    pub fn error_count(&self, bucket: &str) -> u64 {
        self.errors.get(bucket).copied().unwrap_or(0)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Serializable snapshot of the counters.
    pub fn summary(&self) -> StatsSummary {
        let elapsed = self.elapsed().as_secs_f64();
        StatsSummary {
            started_at: self.started_at,
            elapsed_seconds: round2(elapsed),
            pages_crawled: self.pages_crawled,
            pages_skipped: self.pages_skipped,
            events_found: self.events_found,
            events_with_food: self.events_with_food,
            events_saved: self.events_saved,
            oracle_calls: self.oracle_calls,
            oracle_errors: self.oracle_errors,
            cache_hits: self.cache_hits,
            crawl_rate_pages_per_sec: round2(self.pages_crawled as f64 / elapsed.max(1.0)),
            errors: self.errors.clone(),
        }
    }
}

impl Default for CrawlStatistics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`CrawlStatistics`] for logs and reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
    pub pages_crawled: u64,
    pub pages_skipped: u64,
    pub events_found: u64,
    pub events_with_food: u64,
    pub events_saved: u64,
    pub oracle_calls: u64,
    pub oracle_errors: u64,
    pub cache_hits: u64,
    pub crawl_rate_pages_per_sec: f64,
    pub errors: BTreeMap<String, u64>,
}

impl StatsSummary {
    /// Key/value rows for console summaries.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let errors = if self.errors.is_empty() {
            "none".to_string()
        } else {
            self.errors
                .iter()
                .map(|(bucket, count)| format!("{bucket}={count}"))
                .collect::<Vec<_>>()
                .join(", ")
        };

        vec![
            ("Elapsed (s)", self.elapsed_seconds.to_string()),
            ("Pages crawled", self.pages_crawled.to_string()),
            ("Pages skipped", self.pages_skipped.to_string()),
            ("Events found", self.events_found.to_string()),
            ("Events with food", self.events_with_food.to_string()),
            ("Events saved", self.events_saved.to_string()),
            ("Oracle calls", self.oracle_calls.to_string()),
            ("Oracle errors", self.oracle_errors.to_string()),
            ("Cache hits", self.cache_hits.to_string()),
            ("Pages/sec", self.crawl_rate_pages_per_sec.to_string()),
            ("Errors", errors),
        ]
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_error_buckets() {
        let mut stats = CrawlStatistics::new();
        stats.record_error(ERR_HTTP);
        stats.record_error(ERR_HTTP);
        stats.record_error(ERR_ORACLE);

        assert_eq!(stats.error_count(ERR_HTTP), 2);
        assert_eq!(stats.error_count(ERR_ORACLE), 1);
        assert_eq!(stats.error_count(ERR_SINK), 0);
    }

    #[test]
    fn test_summary_of_empty_run() {
        let summary = CrawlStatistics::new().summary();
        assert_eq!(summary.pages_crawled, 0);
        assert_eq!(summary.crawl_rate_pages_per_sec, 0.0);
        assert!(summary.errors.is_empty());
        assert!(summary.rows().iter().any(|(k, v)| *k == "Errors" && v == "none"));
    }

    #[test]
    fn test_crawl_rate_uses_at_least_one_second() {
        let mut stats = CrawlStatistics::new();
        stats.pages_crawled = 7;
        // Elapsed is well under a second, so the divisor clamps to 1
        assert_eq!(stats.summary().crawl_rate_pages_per_sec, 7.0);
    }

    #[test]
    fn test_summary_serializes() {
        let mut stats = CrawlStatistics::new();
        stats.record_error(ERR_LINKS);
        let json = serde_json::to_value(stats.summary()).unwrap();
        assert_eq!(json["errors"]["link_extraction"], 1);
    }
}
