// src/pipeline/validate.rs

use crate::error::Result;
use crate::models::Config;
use crate::utils;
use crate::utils::url::{is_crawlable, normalize};

/// Validate a loaded configuration and report its key settings.
pub fn run_validate(config: &Config) -> Result<()> {
    utils::log::header("Validating configuration");

    if let Err(e) = config.validate() {
        log::error!("Configuration is invalid: {}", e);
        return Err(e);
    }

    utils::log::success("Configuration is valid");
    utils::log::sub_item(&format!("User agent: {}", config.crawler.user_agent));
    utils::log::sub_item(&format!("Timeout: {}s", config.crawler.timeout_secs));
    utils::log::sub_item(&format!("Max concurrent: {}", config.crawler.max_concurrent));
    utils::log::sub_item(&format!(
        "Priority patterns: {}",
        config.crawler.priority_patterns.len()
    ));
    utils::log::sub_item(&format!("Timezone: {}", config.detection.timezone));

    let usable = config
        .seeds
        .iter()
        .filter(|seed| normalize(seed, seed).is_some_and(|u| is_crawlable(&u)))
        .count();
    utils::log::sub_item(&format!("Seeds: {} ({} usable)", config.seeds.len(), usable));
    if usable < config.seeds.len() {
        log::warn!("Some configured seeds are not absolute http(s) URLs");
    }

    let key_set = std::env::var(&config.oracle.api_key_env)
        .is_ok_and(|key| !key.trim().is_empty());
    if key_set {
        utils::log::sub_item(&format!("Oracle key: {} is set", config.oracle.api_key_env));
    } else {
        log::warn!(
            "{} is not set; crawling will refuse to start",
            config.oracle.api_key_env
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_default_config_validates() {
        assert!(run_validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let mut config = Config::default();
        config.detection.min_confidence = 1.5;
        assert!(matches!(run_validate(&config), Err(AppError::Validation(_))));
    }
}
