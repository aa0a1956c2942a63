//! Crawl orchestration.
//!
//! One control loop per seed drains a [`Frontier`], pushing each page
//! through extraction, the keyword prefilter and the oracle. Only the HTTP
//! fetcher runs requests concurrently; all other state is owned by the loop.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use regex::RegexSet;
use scraper::Html;

use crate::error::{AppError, Result};
use crate::models::{
    CandidateEvent, Config, CrawlStatistics, CrawlerConfig, DetectionConfig, ERR_HTTP, ERR_LINKS,
    ERR_ORACLE, ERR_SINK, FreeFoodEvent, Platform,
};
use crate::services::extractor::EventExtractor;
use crate::services::frontier::{CrawlTarget, Frontier};
use crate::services::oracle::{ConfirmationClient, Oracle};
use crate::services::platform::PlatformDetector;
use crate::services::prefilter::might_have_food;
use crate::storage::{EventSink, NullSink};
use crate::utils::dates::within_lookahead;
use crate::utils::html::{extract_links, page_text};
use crate::utils::http::HttpFetcher;
use crate::utils::url::{is_crawlable, normalize, same_site};

/// Result of a crawl: accepted events ordered by start, plus counters.
#[derive(Debug)]
pub struct CrawlReport {
    pub events: Vec<FreeFoodEvent>,
    pub stats: CrawlStatistics,
}

/// Everything a page contributes, computed without holding the DOM across awaits.
struct PageAnalysis {
    links: Result<Vec<String>>,
    platform: Platform,
    candidate: Option<CandidateEvent>,
    text: String,
}

/// State shared by every seed traversal of one run.
struct RunState {
    stats: CrawlStatistics,
    /// url -> has-food verdict
    cache: HashMap<String, bool>,
    results: HashMap<String, FreeFoodEvent>,
}

/// Free-food event crawler.
pub struct FoodSpider {
    crawler: CrawlerConfig,
    detection: DetectionConfig,
    source_tag: String,
    priority: RegexSet,
    fetcher: HttpFetcher,
    confirmer: ConfirmationClient,
    extractor: EventExtractor,
    platforms: PlatformDetector,
    sink: Arc<dyn EventSink>,
}

impl FoodSpider {
    /// Create a spider that persists nothing.
    pub fn new(config: &Config, fetcher: HttpFetcher, oracle: Arc<dyn Oracle>) -> Result<Self> {
        let priority = RegexSet::new(&config.crawler.priority_patterns)
            .map_err(|e| AppError::config(format!("Invalid priority pattern: {e}")))?;

        Ok(Self {
            crawler: config.crawler.clone(),
            detection: config.detection.clone(),
            source_tag: config.output.source_tag.clone(),
            priority,
            fetcher,
            confirmer: ConfirmationClient::new(oracle, &config.oracle),
            extractor: EventExtractor::new(config.detection.tz()?)?,
            platforms: PlatformDetector::new()?,
            sink: Arc::new(NullSink),
        })
    }

    /// Hand accepted events to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Crawl every seed in order and collect confirmed free-food events.
    ///
    /// Seeds that are not absolute http(s) URLs are skipped; if none is
    /// left the run fails before fetching anything.
    pub async fn crawl(&self, seeds: &[String]) -> Result<CrawlReport> {
        let roots: Vec<String> = seeds
            .iter()
            .filter_map(|seed| {
                let root = normalize(seed, seed).filter(|u| is_crawlable(u));
                if root.is_none() {
                    log::warn!("Skipping invalid seed URL: {}", seed);
                }
                root
            })
            .collect();

        if roots.is_empty() {
            return Err(AppError::config("No valid seed URL to crawl"));
        }

        let mut run = RunState {
            stats: CrawlStatistics::new(),
            cache: HashMap::new(),
            results: HashMap::new(),
        };

        for root in &roots {
            if self.out_of_time(&run.stats) {
                break;
            }
            log::info!("Crawling seed {}", root);
            self.crawl_seed(root, &mut run).await;
        }

        let mut events: Vec<FreeFoodEvent> = run.results.into_values().collect();
        events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.event_id.cmp(&b.event_id)));

        log::info!(
            "Crawl complete: {} pages, {} events with free food",
            run.stats.pages_crawled,
            events.len()
        );

        Ok(CrawlReport {
            events,
            stats: run.stats,
        })
    }

    fn out_of_time(&self, stats: &CrawlStatistics) -> bool {
        self.crawler
            .max_runtime()
            .is_some_and(|limit| stats.elapsed() >= limit)
    }

    async fn crawl_seed(&self, seed: &str, run: &mut RunState) {
        let mut frontier = Frontier::with_patterns(self.priority.clone());
        let mut visited: HashSet<String> = HashSet::new();
        frontier.push_seed(seed);

        while visited.len() < self.crawler.max_pages {
            if self.out_of_time(&run.stats) {
                log::warn!("Runtime limit reached, stopping crawl of {}", seed);
                break;
            }
            let Some(target) = frontier.pop() else {
                break;
            };

            if visited.contains(&target.url) || target.depth > self.crawler.max_depth {
                run.stats.pages_skipped += 1;
                continue;
            }
            visited.insert(target.url.clone());

            if run.cache.contains_key(&target.url) {
                run.stats.cache_hits += 1;
            } else {
                self.process(seed, &target, &mut frontier, &visited, run)
                    .await;
            }

            let delay = self.crawler.request_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        log::debug!(
            "Finished {}: {} visited, {} still queued",
            seed,
            visited.len(),
            frontier.len()
        );
    }

    /// Fetch one page and run it through the acceptance pipeline.
    async fn process(
        &self,
        seed: &str,
        target: &CrawlTarget,
        frontier: &mut Frontier,
        visited: &HashSet<String>,
        run: &mut RunState,
    ) {
        let url = target.url.as_str();
        let (body, status) = self.fetcher.get(url).await;
        run.stats.pages_crawled += 1;

        let Some(html) = body else {
            log::debug!("Skipping {} (status {})", url, status);
            run.stats.record_error(ERR_HTTP);
            run.cache.insert(url.to_string(), false);
            return;
        };

        let page = self.analyze(url, &html);

        match page.links {
            Ok(links) => {
                for link in links {
                    if self.crawler.restrict_to_same_site && !same_site(seed, &link) {
                        continue;
                    }
                    if !visited.contains(&link) {
                        frontier.push(link, target.depth + 1);
                    }
                }
            }
            Err(e) => {
                log::debug!("Link extraction failed for {}: {}", url, e);
                run.stats.record_error(ERR_LINKS);
            }
        }

        let verdict = self.evaluate(page.candidate, page.platform, &page.text, run).await;
        run.cache.insert(url.to_string(), verdict.is_some());

        let Some(event) = verdict else {
            return;
        };

        log::info!(
            "Free food: '{}' at {} ({:.2}) {}",
            event.title,
            event.location,
            event.confidence,
            url
        );

        match self.sink.upsert(&event, &self.source_tag).await {
            Ok(Some(_)) => run.stats.events_saved += 1,
            Ok(None) => {}
            Err(e) => {
                log::warn!("Failed to persist event {}: {}", event.event_id, e);
                run.stats.record_error(ERR_SINK);
            }
        }

        run.results.insert(event.event_id.clone(), event);
    }

    /// Parse the page once and pull out everything later steps need.
    fn analyze(&self, url: &str, html: &str) -> PageAnalysis {
        let document = Html::parse_document(html);
        let platform = self.platforms.detect(url, &document);
        let candidate = self.extractor.extract(&document, url).map(|mut c| {
            c.platform = platform;
            c
        });

        PageAnalysis {
            links: extract_links(&document, url),
            platform,
            candidate,
            text: page_text(&document),
        }
    }

    /// Decide whether a candidate becomes a [`FreeFoodEvent`].
    async fn evaluate(
        &self,
        candidate: Option<CandidateEvent>,
        platform: Platform,
        page_text: &str,
        run: &mut RunState,
    ) -> Option<FreeFoodEvent> {
        let candidate = candidate?;
        run.stats.events_found += 1;

        if candidate.location.trim().is_empty() {
            log::debug!("No location for '{}' ({})", candidate.title, platform);
            return None;
        }
        if !within_lookahead(&candidate.start, &Utc::now(), self.detection.days_lookahead) {
            log::debug!("'{}' starts outside the lookahead window", candidate.title);
            return None;
        }

        let description = candidate.description.as_deref().unwrap_or_default();
        if !might_have_food(page_text) && !might_have_food(description) {
            return None;
        }

        run.stats.oracle_calls += 1;
        let oracle_text = if page_text.is_empty() { description } else { page_text };
        let confirmation = self
            .confirmer
            .confirm(
                &candidate.source_url,
                &candidate.title,
                &candidate.location,
                &candidate.start_iso(),
                oracle_text,
            )
            .await;

        if confirmation.failed {
            run.stats.oracle_errors += 1;
            run.stats.record_error(ERR_ORACLE);
        }
        if !confirmation.has_food
            || confirmation.confidence < self.detection.min_confidence
            || confirmation.proof.is_empty()
        {
            return None;
        }

        run.stats.events_with_food += 1;
        Some(FreeFoodEvent::confirm(
            candidate,
            confirmation.proof,
            confirmation.confidence,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::oracle::OracleResponse;
    use crate::services::oracle::testing::StubOracle;
    use crate::storage::LocalEventStore;
    use async_trait::async_trait;
    use chrono::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> Config {
        let mut config = Config::default();
        config.crawler.request_delay_ms = 0;
        config.crawler.max_concurrent = 4;
        config.crawler.timeout_secs = 5;
        config
    }

    fn spider(config: &Config, oracle: Arc<StubOracle>) -> FoodSpider {
        let fetcher = HttpFetcher::new(&config.crawler).unwrap();
        FoodSpider::new(config, fetcher, oracle).unwrap()
    }

    fn iso_in(offset: Duration) -> String {
        (Utc::now() + offset).format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    fn links_page(hrefs: &[&str]) -> String {
        let anchors: String = hrefs
            .iter()
            .map(|h| format!(r#"<a href="{h}">link</a>"#))
            .collect();
        format!("<html><body><h1>Home</h1>{anchors}</body></html>")
    }

    fn event_page(title: &str, start: &str, location: &str, body: &str) -> String {
        let jsonld = serde_json::json!({
            "@context": "https://schema.org",
            "@type": "Event",
            "name": title,
            "startDate": start,
            "location": {"@type": "Place", "name": location},
        });
        format!(
            r#"<html><head><script type="application/ld+json">{jsonld}</script></head>
            <body><h1>{title}</h1><p>{body}</p></body></html>"#
        )
    }

    fn pizza_page() -> String {
        event_page(
            "Pizza Night",
            &iso_in(Duration::days(1)),
            "Union",
            "free pizza for all!",
        )
    }

    async fn mount(server: &MockServer, route: &str, html: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(server)
            .await;
    }

    fn accept() -> Arc<StubOracle> {
        Arc::new(StubOracle::always(OracleResponse::new(
            true,
            0.9,
            "free pizza for all",
        )))
    }

    #[tokio::test]
    async fn test_confirms_linked_event() {
        let server = MockServer::start().await;
        mount(&server, "/", links_page(&["/events/pizza-night"])).await;
        mount(&server, "/events/pizza-night", pizza_page()).await;

        let oracle = accept();
        let report = spider(&test_config(), oracle.clone())
            .crawl(&[server.uri()])
            .await
            .unwrap();

        assert_eq!(report.events.len(), 1);
        let event = &report.events[0];
        assert_eq!(event.title, "Pizza Night");
        assert_eq!(event.location, "Union");
        assert_eq!(event.confidence, 0.9);
        assert_eq!(event.proof, "free pizza for all");
        assert_eq!(event.platform, Platform::SchemaOrg);
        assert_eq!(event.source_url, format!("{}/events/pizza-night", server.uri()));

        let stats = &report.stats;
        assert_eq!(stats.pages_crawled, 2);
        assert_eq!(stats.events_found, 1);
        assert_eq!(stats.events_with_food, 1);
        assert_eq!(stats.oracle_calls, 1);
        assert_eq!(stats.events_saved, 0);
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn test_oracle_rejection() {
        let server = MockServer::start().await;
        mount(&server, "/", links_page(&["/events/pizza-night"])).await;
        mount(&server, "/events/pizza-night", pizza_page()).await;

        let oracle = Arc::new(StubOracle::always(OracleResponse::new(false, 0.0, "")));
        let report = spider(&test_config(), oracle)
            .crawl(&[server.uri()])
            .await
            .unwrap();

        assert!(report.events.is_empty());
        assert_eq!(report.stats.events_found, 1);
        assert_eq!(report.stats.events_with_food, 0);
        assert_eq!(report.stats.oracle_errors, 0);
    }

    #[tokio::test]
    async fn test_low_confidence_and_missing_proof_rejected() {
        for response in [
            OracleResponse::new(true, 0.5, "free pizza"),
            OracleResponse::new(true, 0.95, "   "),
        ] {
            let server = MockServer::start().await;
            mount(&server, "/", links_page(&["/events/pizza-night"])).await;
            mount(&server, "/events/pizza-night", pizza_page()).await;

            let report = spider(&test_config(), Arc::new(StubOracle::always(response)))
                .crawl(&[server.uri()])
                .await
                .unwrap();
            assert!(report.events.is_empty());
            assert_eq!(report.stats.oracle_calls, 1);
        }
    }

    #[tokio::test]
    async fn test_each_url_processed_once() {
        let server = MockServer::start().await;
        mount(&server, "/", links_page(&["/events/one", "/events/two"])).await;
        for route in ["/events/one", "/events/two"] {
            mount(
                &server,
                route,
                links_page(&["/events/pizza-night", "/events/pizza-night#details", "/"]),
            )
            .await;
        }
        Mock::given(method("GET"))
            .and(path("/events/pizza-night"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                pizza_page().replace("</body>", r#"<a href="/events/pizza-night">self</a></body>"#),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let oracle = accept();
        let report = spider(&test_config(), oracle.clone())
            .crawl(&[server.uri()])
            .await
            .unwrap();

        assert_eq!(report.events.len(), 1);
        assert_eq!(report.stats.pages_crawled, 4);
        // Queued by both /events/one and /events/two, fetched once
        assert_eq!(report.stats.pages_skipped, 1);
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn test_event_paths_visited_first() {
        let server = MockServer::start().await;
        mount(&server, "/", links_page(&["/about", "/events/spring-fair"])).await;
        mount(&server, "/about", links_page(&[])).await;
        mount(&server, "/events/spring-fair", links_page(&[])).await;

        let mut config = test_config();
        config.crawler.max_pages = 2;
        let report = spider(&config, accept())
            .crawl(&[server.uri()])
            .await
            .unwrap();

        let paths: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect();
        assert_eq!(paths, vec!["/", "/events/spring-fair"]);
        assert_eq!(report.stats.pages_crawled, 2);
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let server = MockServer::start().await;
        mount(&server, "/", links_page(&["/events/pizza-night"])).await;
        mount(&server, "/events/pizza-night", pizza_page()).await;

        let mut config = test_config();
        config.crawler.max_depth = 0;
        let report = spider(&config, accept())
            .crawl(&[server.uri()])
            .await
            .unwrap();

        assert!(report.events.is_empty());
        assert_eq!(report.stats.pages_crawled, 1);
        assert_eq!(report.stats.pages_skipped, 1);
    }

    #[tokio::test]
    async fn test_cache_shared_across_seeds() {
        let server = MockServer::start().await;
        mount(&server, "/a", links_page(&["/events/pizza-night"])).await;
        mount(&server, "/b", links_page(&["/events/pizza-night"])).await;
        Mock::given(method("GET"))
            .and(path("/events/pizza-night"))
            .respond_with(ResponseTemplate::new(200).set_body_string(pizza_page()))
            .expect(1)
            .mount(&server)
            .await;

        let oracle = accept();
        let seeds = vec![format!("{}/a", server.uri()), format!("{}/b", server.uri())];
        let report = spider(&test_config(), oracle.clone())
            .crawl(&seeds)
            .await
            .unwrap();

        assert_eq!(report.events.len(), 1);
        assert_eq!(report.stats.cache_hits, 1);
        assert_eq!(report.stats.pages_crawled, 3);
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_not_retried_by_later_seed() {
        let server = MockServer::start().await;
        mount(&server, "/a", links_page(&["/events/missing"])).await;
        mount(&server, "/b", links_page(&["/events/missing"])).await;
        Mock::given(method("GET"))
            .and(path("/events/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let seeds = vec![format!("{}/a", server.uri()), format!("{}/b", server.uri())];
        let report = spider(&test_config(), accept())
            .crawl(&seeds)
            .await
            .unwrap();

        assert!(report.events.is_empty());
        assert_eq!(report.stats.pages_crawled, 3);
        assert_eq!(report.stats.cache_hits, 1);
        assert_eq!(report.stats.error_count(ERR_HTTP), 1);
    }

    #[tokio::test]
    async fn test_cache_hits_keep_polite_delay() {
        let server = MockServer::start().await;
        mount(&server, "/a", links_page(&["/events/pizza-night"])).await;
        mount(&server, "/b", links_page(&["/events/pizza-night"])).await;
        mount(&server, "/events/pizza-night", pizza_page()).await;

        let mut config = test_config();
        config.crawler.request_delay_ms = 50;
        let seeds = vec![format!("{}/a", server.uri()), format!("{}/b", server.uri())];

        let started = std::time::Instant::now();
        let report = spider(&config, accept()).crawl(&seeds).await.unwrap();

        // three fetches plus one cache hit, each followed by the delay
        assert_eq!(report.stats.cache_hits, 1);
        assert!(started.elapsed() >= std::time::Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_ineligible_candidates_never_reach_oracle() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/",
            links_page(&[
                "/events/past",
                "/events/far",
                "/events/nowhere",
                "/events/lecture",
                "/events/byof",
            ]),
        )
        .await;
        mount(&server, "/events/past", event_page("Old Pizza", &iso_in(-Duration::days(1)), "Union", "free pizza")).await;
        mount(&server, "/events/far", event_page("Far Pizza", &iso_in(Duration::days(200)), "Union", "free pizza")).await;
        mount(&server, "/events/nowhere", event_page("Lost Pizza", &iso_in(Duration::days(2)), "", "free pizza")).await;
        mount(&server, "/events/lecture", event_page("Compiler Lecture", &iso_in(Duration::days(2)), "Room 101", "A talk about parsing.")).await;
        mount(&server, "/events/byof", event_page("Movie Night", &iso_in(Duration::days(2)), "Hall", "Free pizza? No food will be provided.")).await;

        let oracle = accept();
        let report = spider(&test_config(), oracle.clone())
            .crawl(&[server.uri()])
            .await
            .unwrap();

        assert!(report.events.is_empty());
        assert_eq!(report.stats.events_found, 5);
        assert_eq!(report.stats.oracle_calls, 0);
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_soft_failures_are_bucketed() {
        let server = MockServer::start().await;
        mount(&server, "/", links_page(&["/events/pizza-night", "/events/missing"])).await;
        mount(&server, "/events/pizza-night", pizza_page()).await;

        let mut config = test_config();
        config.oracle.max_retries = 2;
        let oracle = Arc::new(StubOracle::failing());
        let report = spider(&config, oracle.clone())
            .crawl(&[server.uri()])
            .await
            .unwrap();

        assert!(report.events.is_empty());
        assert_eq!(report.stats.oracle_calls, 1);
        assert_eq!(report.stats.oracle_errors, 1);
        assert_eq!(report.stats.error_count(ERR_ORACLE), 1);
        assert_eq!(report.stats.error_count(ERR_HTTP), 1);
        assert_eq!(oracle.calls(), 2);
    }

    #[tokio::test]
    async fn test_results_sorted_and_persisted() {
        let server = MockServer::start().await;
        mount(&server, "/", links_page(&["/events/later", "/events/sooner"])).await;
        mount(&server, "/events/later", event_page("Later Lunch", &iso_in(Duration::days(5)), "Union", "free lunch")).await;
        mount(&server, "/events/sooner", event_page("Sooner Snacks", &iso_in(Duration::days(1)), "Union", "free snacks")).await;

        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalEventStore::new(tmp.path().join("events.json")));
        let report = spider(&test_config(), accept())
            .with_sink(store.clone())
            .crawl(&[server.uri()])
            .await
            .unwrap();

        let titles: Vec<&str> = report.events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Sooner Snacks", "Later Lunch"]);
        assert_eq!(report.stats.events_saved, 2);
        assert_eq!(store.load().await.unwrap().len(), 2);
    }

    struct BrokenSink;

    #[async_trait]
    impl EventSink for BrokenSink {
        async fn upsert(&self, _event: &FreeFoodEvent, _source_tag: &str) -> Result<Option<String>> {
            Err(AppError::storage("disk full"))
        }
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_abort() {
        let server = MockServer::start().await;
        mount(&server, "/", links_page(&["/events/pizza-night"])).await;
        mount(&server, "/events/pizza-night", pizza_page()).await;

        let report = spider(&test_config(), accept())
            .with_sink(Arc::new(BrokenSink))
            .crawl(&[server.uri()])
            .await
            .unwrap();

        assert_eq!(report.events.len(), 1);
        assert_eq!(report.stats.events_saved, 0);
        assert_eq!(report.stats.error_count(ERR_SINK), 1);
    }

    #[tokio::test]
    async fn test_invalid_seeds() {
        let config = test_config();
        let spider = spider(&config, accept());

        let err = spider
            .crawl(&["not a url".to_string(), "ftp://example.edu/".to_string()])
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_runtime_limit_stops_dequeuing() {
        let server = MockServer::start().await;
        mount(&server, "/", links_page(&[])).await;

        let mut config = test_config();
        config.crawler.max_runtime_secs = Some(0);
        let report = spider(&config, accept())
            .crawl(&[server.uri()])
            .await
            .unwrap();

        assert_eq!(report.stats.pages_crawled, 0);
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
