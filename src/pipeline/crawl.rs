// src/pipeline/crawl.rs

//! Free-food crawling pipeline.

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::models::Config;
use crate::services::{CrawlReport, FoodSpider, Oracle};
use crate::storage::{EventSink, write_json_atomic};
use crate::utils;
use crate::utils::http::HttpFetcher;

/// Crawl `seeds`, log a summary and write the event artifact.
///
/// The artifact at `config.output.path` is only written when at least one
/// event was confirmed. The statistics summary is logged either way.
pub async fn run_crawler(
    config: &Config,
    seeds: &[String],
    fetcher: HttpFetcher,
    oracle: Arc<dyn Oracle>,
    sink: Arc<dyn EventSink>,
) -> Result<CrawlReport> {
    utils::log::header("Free Food Spider");
    utils::log::sub_item(&format!("Seeds: {}", seeds.join(", ")));
    utils::log::sub_item(&format!(
        "Max pages: {}, max depth: {}, concurrency: {}",
        config.crawler.max_pages, config.crawler.max_depth, config.crawler.max_concurrent
    ));
    utils::log::sub_item(&format!(
        "Lookahead: {} days, min confidence: {:.2}, oracle: {}",
        config.detection.days_lookahead, config.detection.min_confidence, config.oracle.model
    ));

    let spider = FoodSpider::new(config, fetcher, oracle)?.with_sink(sink);
    let report = spider.crawl(seeds).await?;

    utils::log::summary("Crawl statistics", &report.stats.summary().rows());

    if report.events.is_empty() {
        log::info!("No free food events found");
        return Ok(report);
    }

    utils::log::separator();
    for event in &report.events {
        utils::log::sub_item(&format!(
            "{} | {} | {} | {:.2}",
            event.start.format("%Y-%m-%d %H:%M UTC"),
            event.title,
            event.location,
            event.confidence
        ));
    }

    let output = Path::new(&config.output.path);
    write_json_atomic(output, &report.events).await?;
    utils::log::success(&format!(
        "Saved {} events to {}",
        report.events.len(),
        output.display()
    ));

    Ok(report)
}
