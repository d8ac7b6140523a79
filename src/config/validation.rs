use crate::config::types::{
    BrowserConfig, Config, CrawlerConfig, ExplorationConfig, OutputConfig, RunConfig,
};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_browser_config(&config.browser)?;
    validate_exploration_config(&config.exploration)?;
    validate_output_config(&config.output)?;
    validate_run_config(&config.run)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_body_chars == 0 {
        return Err(ConfigError::Validation(
            "max-body-chars must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.viewport_width == 0 || config.viewport_height == 0 {
        return Err(ConfigError::Validation(format!(
            "viewport must be non-zero, got {}x{}",
            config.viewport_width, config.viewport_height
        )));
    }

    if config.navigation_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "navigation-timeout-ms must be >= 1".to_string(),
        ));
    }

    if let Some(executable) = &config.executable {
        if executable.trim().is_empty() {
            return Err(ConfigError::Validation(
                "browser executable cannot be an empty string".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_exploration_config(config: &ExplorationConfig) -> Result<(), ConfigError> {
    if config.max_links == 0 {
        return Err(ConfigError::Validation(
            "max-links must be >= 1".to_string(),
        ));
    }

    if config.click_timeout_ms == 0 || config.visible_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "exploration timeouts must be >= 1ms".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.evidence_dir.is_empty() {
        return Err(ConfigError::Validation(
            "evidence-dir cannot be empty".to_string(),
        ));
    }

    if matches!(&config.report_path, Some(p) if p.is_empty()) {
        return Err(ConfigError::Validation(
            "report-path cannot be an empty string".to_string(),
        ));
    }

    Ok(())
}

fn validate_run_config(config: &RunConfig) -> Result<(), ConfigError> {
    if config.project.trim().is_empty() {
        return Err(ConfigError::Validation(
            "project cannot be empty".to_string(),
        ));
    }

    // The start URL is checked when the run starts so that a bad URL is
    // recorded as a failed run.
    Ok(())
}
