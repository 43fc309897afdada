//! Configuration validation.

use super::error::{ConfigError, ConfigResult};
use super::schema::{CommandsConfig, DispatchConfig, GantryConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &GantryConfig) -> ConfigResult<()> {
    validate_logging(&config.logging)?;
    validate_dispatch(&config.dispatch)?;
    validate_commands(&config.commands)?;
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.output is 'file' but logging.file_path is not set",
        ));
    }
    Ok(())
}

fn validate_dispatch(dispatch: &DispatchConfig) -> ConfigResult<()> {
    if dispatch.channel_capacity == 0 {
        return Err(ConfigError::validation(
            "dispatch.channel_capacity must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_commands(commands: &CommandsConfig) -> ConfigResult<()> {
    if let Some(index) = commands.prefixes.iter().position(String::is_empty) {
        return Err(ConfigError::validation(format!(
            "commands.prefixes[{index}] is empty"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GantryConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let mut config = GantryConfig::default();
        config.dispatch.channel_capacity = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_rejects_empty_prefix() {
        let mut config = GantryConfig::default();
        config.commands.prefixes = vec!["!".into(), String::new()];
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("prefixes[1]"));
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = GantryConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some("gantry.log".into());
        assert!(validate_config(&config).is_ok());
    }
}
