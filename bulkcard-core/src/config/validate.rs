//! Configuration validation rules.

use super::schema::Config;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if config.channels.telegram.enabled && config.channels.telegram.token.trim().is_empty() {
        errors.push("channels.telegram.token is required when telegram is enabled".to_string());
    }

    if !LOG_LEVELS.contains(&config.logging.level.to_lowercase().as_str()) {
        errors.push(format!(
            "logging.level must be one of {:?}, got {}",
            LOG_LEVELS, config.logging.level
        ));
    }
    if !["text", "json"].contains(&config.logging.format.to_lowercase().as_str()) {
        errors.push(format!(
            "logging.format must be text or json, got {}",
            config.logging.format
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}
