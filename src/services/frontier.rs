//! Dual-priority crawl frontier.

use std::collections::VecDeque;

use regex::RegexSet;

use crate::error::{AppError, Result};

/// A discovered URL waiting to be crawled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub url: String,
    /// Link distance from the seed
    pub depth: usize,
}

/// Two FIFO queues: event-like URLs first, everything else after.
pub struct Frontier {
    priority: VecDeque<CrawlTarget>,
    normal: VecDeque<CrawlTarget>,
    patterns: RegexSet,
}

impl Frontier {
    /// Build a frontier whose priority queue takes URLs matching `patterns`.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = RegexSet::new(patterns.iter().map(AsRef::as_ref))
            .map_err(|e| AppError::config(format!("Invalid priority pattern: {e}")))?;
        Ok(Self::with_patterns(patterns))
    }

    /// Build a frontier from an already compiled pattern set.
    pub fn with_patterns(patterns: RegexSet) -> Self {
        Self {
            priority: VecDeque::new(),
            normal: VecDeque::new(),
            patterns,
        }
    }

    /// Whether `url` looks like an event page.
    pub fn is_priority(&self, url: &str) -> bool {
        self.patterns.is_match(&url.to_lowercase())
    }

    /// Queue the traversal root at depth 0, ahead of everything else.
    pub fn push_seed(&mut self, url: &str) {
        self.priority.push_front(CrawlTarget {
            url: url.to_string(),
            depth: 0,
        });
    }

    /// Queue a discovered link. Returns `true` if it went to the priority queue.
    pub fn push(&mut self, url: String, depth: usize) -> bool {
        let target = CrawlTarget { url, depth };
        if self.is_priority(&target.url) {
            self.priority.push_back(target);
            true
        } else {
            self.normal.push_back(target);
            false
        }
    }

    /// Next target, draining the priority queue first.
    pub fn pop(&mut self) -> Option<CrawlTarget> {
        self.priority.pop_front().or_else(|| self.normal.pop_front())
    }

    pub fn len(&self) -> usize {
        self.priority.len() + self.normal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.priority.is_empty() && self.normal.is_empty()
    }
}
