use crate::config::types::{Config, CrawlerConfig, OutputConfig, SearchConfig, StatisticsConfig};
use crate::indexer::BUILTIN_INDEXERS;
use crate::url::{normalize_url, FilterPattern};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_search_config(&config.search)?;
    validate_statistics_config(&config.statistics)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_base_url(&config.base_url)?;

    for pattern in &config.filter_regex {
        FilterPattern::parse(pattern)?;
    }

    for identifier in &config.indexer {
        if !BUILTIN_INDEXERS.contains(&identifier.as_str()) {
            return Err(ConfigError::UnknownIndexer(format!(
                "'{}' (known indexers: {})",
                identifier,
                BUILTIN_INDEXERS.join(", ")
            )));
        }
    }

    if config.request_timeout < 1 || config.request_timeout > 600 {
        return Err(ConfigError::Validation(format!(
            "request_timeout must be between 1 and 600 seconds, got {}",
            config.request_timeout
        )));
    }

    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and 64, got {}",
            config.max_concurrent_fetches
        )));
    }

    Ok(())
}

/// Validates the base URL: non-empty, HTTP(S), with a host
pub(crate) fn validate_base_url(base_url: &str) -> Result<(), ConfigError> {
    if base_url.trim().is_empty() {
        return Err(ConfigError::InvalidUrl("base_url cannot be empty".to_string()));
    }

    normalize_url(base_url.trim())
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url '{}': {}", base_url, e)))?;

    Ok(())
}

fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if config.result_page_size < 1 {
        return Err(ConfigError::Validation(format!(
            "result_page_size must be >= 1, got {}",
            config.result_page_size
        )));
    }
    Ok(())
}

fn validate_statistics_config(config: &StatisticsConfig) -> Result<(), ConfigError> {
    for recipient in &config.recipients {
        validate_email(recipient)?;
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.report_path.is_empty() {
        return Err(ConfigError::Validation(
            "report_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "recipient address cannot be empty".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
