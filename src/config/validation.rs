use crate::config::types::{
    Config, CrawlerConfig, DelayRange, IdentityConfig, OutputConfig, SiteConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_site_config(&config.site)?;
    validate_output_config(&config.output)?;
    validate_identity_config(&config.identity)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.start_page < 1 {
        return Err(ConfigError::Validation(format!(
            "start_page must be >= 1, got {}",
            config.start_page
        )));
    }

    if config.end_page < config.start_page {
        return Err(ConfigError::Validation(format!(
            "end_page ({}) must not be below start_page ({})",
            config.end_page, config.start_page
        )));
    }

    if config.max_concurrency < 1 || config.max_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrency must be between 1 and 100, got {}",
            config.max_concurrency
        )));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(
            "batch_size must be >= 1".to_string(),
        ));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max_attempts must be >= 1".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    validate_delay_range("inter_request_delay", &config.inter_request_delay)?;
    validate_delay_range("retry_backoff", &config.retry_backoff)?;

    Ok(())
}

fn validate_delay_range(name: &str, range: &DelayRange) -> Result<(), ConfigError> {
    if range.min_ms > range.max_ms {
        return Err(ConfigError::Validation(format!(
            "{} min ({}ms) exceeds max ({}ms)",
            name, range.min_ms, range.max_ms
        )));
    }
    Ok(())
}

/// Validates site addressing
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if !config.listing_url.contains("{page}") {
        return Err(ConfigError::Validation(format!(
            "listing_url must contain a {{page}} placeholder, got '{}'",
            config.listing_url
        )));
    }

    Url::parse(&config.listing_page_url(1))
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid listing_url: {}", e)))?;

    if !config.topic_page_suffix.contains("{page}") {
        return Err(ConfigError::Validation(format!(
            "topic_page_suffix must contain a {{page}} placeholder, got '{}'",
            config.topic_page_suffix
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    let paths = [
        ("topic_list", &config.topic_list),
        ("data_dir", &config.data_dir),
        ("pages_progress", &config.pages_progress),
        ("pages_failed", &config.pages_failed),
        ("topics_progress", &config.topics_progress),
        ("topics_failed", &config.topics_failed),
    ];

    for (name, value) in paths {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    if let Some(journal) = &config.journal_path {
        if journal.trim().is_empty() {
            return Err(ConfigError::Validation(
                "journal_path cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates the identity pool
fn validate_identity_config(config: &IdentityConfig) -> Result<(), ConfigError> {
    if config.user_agents.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user_agents cannot contain blank entries".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_crawler() -> CrawlerConfig {
        CrawlerConfig {
            start_page: 1,
            end_page: 5,
            max_concurrency: 4,
            batch_size: 100,
            max_attempts: 3,
            request_timeout_secs: 10,
            inter_request_delay: DelayRange::new(200, 500),
            retry_backoff: DelayRange::new(2000, 5000),
        }
    }

    fn valid_site() -> SiteConfig {
        SiteConfig {
            base_url: "https://forum.example/".to_string(),
            listing_url: "https://forum.example/forums/market.3/page-{page}".to_string(),
            topic_page_suffix: "page-{page}".to_string(),
        }
    }

    #[test]
    fn test_validate_crawler_ranges() {
        assert!(validate_crawler_config(&valid_crawler()).is_ok());

        let single_page = CrawlerConfig {
            start_page: 3,
            end_page: 3,
            ..valid_crawler()
        };
        assert!(validate_crawler_config(&single_page).is_ok());

        let inverted = CrawlerConfig {
            start_page: 6,
            end_page: 5,
            ..valid_crawler()
        };
        assert!(validate_crawler_config(&inverted).is_err());

        let zero_start = CrawlerConfig {
            start_page: 0,
            ..valid_crawler()
        };
        assert!(validate_crawler_config(&zero_start).is_err());

        let no_workers = CrawlerConfig {
            max_concurrency: 0,
            ..valid_crawler()
        };
        assert!(validate_crawler_config(&no_workers).is_err());

        let no_attempts = CrawlerConfig {
            max_attempts: 0,
            ..valid_crawler()
        };
        assert!(validate_crawler_config(&no_attempts).is_err());

        let empty_batch = CrawlerConfig {
            batch_size: 0,
            ..valid_crawler()
        };
        assert!(validate_crawler_config(&empty_batch).is_err());
    }

    #[test]
    fn test_validate_delay_range() {
        assert!(validate_delay_range("d", &DelayRange::new(0, 0)).is_ok());
        assert!(validate_delay_range("d", &DelayRange::new(100, 100)).is_ok());
        assert!(validate_delay_range("d", &DelayRange::new(500, 200)).is_err());
    }

    #[test]
    fn test_validate_site_config() {
        assert!(validate_site_config(&valid_site()).is_ok());

        let no_placeholder = SiteConfig {
            listing_url: "https://forum.example/forums/market.3/".to_string(),
            ..valid_site()
        };
        assert!(matches!(
            validate_site_config(&no_placeholder),
            Err(ConfigError::Validation(_))
        ));

        let bad_base = SiteConfig {
            base_url: "not a url".to_string(),
            ..valid_site()
        };
        assert!(matches!(
            validate_site_config(&bad_base),
            Err(ConfigError::InvalidUrl(_))
        ));

        let bad_suffix = SiteConfig {
            topic_page_suffix: "page-".to_string(),
            ..valid_site()
        };
        assert!(validate_site_config(&bad_suffix).is_err());
    }

    #[test]
    fn test_validate_identity_config() {
        assert!(validate_identity_config(&IdentityConfig::default()).is_ok());

        let blank = IdentityConfig {
            user_agents: vec!["Mozilla/5.0".to_string(), "  ".to_string()],
        };
        assert!(validate_identity_config(&blank).is_err());
    }
}
