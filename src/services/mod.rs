//! Service layer for the spider.
//!
//! - Hosting platform labeling (`PlatformDetector`)
//! - JSON-LD event extraction (`EventExtractor`)
//! - Keyword prefilter (`might_have_food`)
//! - Confirmation oracle (`Oracle`, `GeminiOracle`, `ConfirmationClient`)
//! - Crawl frontier and orchestration (`Frontier`, `FoodSpider`)

pub mod extractor;
pub mod frontier;
pub mod oracle;
pub mod platform;
pub mod prefilter;
pub mod spider;

pub use extractor::EventExtractor;
pub use frontier::{CrawlTarget, Frontier};
pub use oracle::{
    Confirmation, ConfirmationClient, GeminiOracle, Oracle, OracleRequest, OracleResponse,
};
pub use platform::PlatformDetector;
pub use prefilter::{FoodSignal, food_signal, might_have_food};
pub use spider::{CrawlReport, FoodSpider};
