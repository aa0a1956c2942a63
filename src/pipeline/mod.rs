//! Pipeline entry points for spider operations.
//!
//! - `run_crawler`: Crawl seeds and write confirmed events
//! - `run_validate`: Check configuration without crawling

pub mod crawl;
pub mod validate;

pub use crawl::run_crawler;
pub use validate::run_validate;
