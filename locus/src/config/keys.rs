//! Key-based access for `locus config get|set|list`.

use std::str::FromStr;

use thiserror::Error;

use super::parser::{
    expand_tilde, parse_extension_secs, parse_filter_degrees, parse_timeout_secs, path_to_display,
};
use super::settings::ConfigFile;

#[derive(Debug, Error)]
pub enum ConfigKeyError {
    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {reason}")]
    ValidationFailed { key: String, reason: String },
}

/// Supported configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    BackgroundExtensionSecs,
    RequestsDefaultTimeoutSecs,
    HeadingFilterDegrees,
    LoggingDirectory,
    LoggingFile,
}

impl FromStr for ConfigKey {
    type Err = ConfigKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::all()
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigKeyError::UnknownKey(s.to_string()))
    }
}

impl ConfigKey {
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::BackgroundExtensionSecs,
            ConfigKey::RequestsDefaultTimeoutSecs,
            ConfigKey::HeadingFilterDegrees,
            ConfigKey::LoggingDirectory,
            ConfigKey::LoggingFile,
        ]
    }

    /// Canonical name, e.g. `heading.filter_degrees`.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::BackgroundExtensionSecs => "background.extension_secs",
            ConfigKey::RequestsDefaultTimeoutSecs => "requests.default_timeout_secs",
            ConfigKey::HeadingFilterDegrees => "heading.filter_degrees",
            ConfigKey::LoggingDirectory => "logging.directory",
            ConfigKey::LoggingFile => "logging.file",
        }
    }

    /// One-line explanation shown by `locus config list`.
    pub fn description(&self) -> &'static str {
        match self {
            ConfigKey::BackgroundExtensionSecs => {
                "Seconds of runtime requested per background window; each window polls once"
            }
            ConfigKey::RequestsDefaultTimeoutSecs => {
                "Timeout for one-shot and geocode requests that set none (0 = never)"
            }
            ConfigKey::HeadingFilterDegrees => {
                "Heading change in degrees before a heading request hears about it"
            }
            ConfigKey::LoggingDirectory => "Directory the log file is written to",
            ConfigKey::LoggingFile => "Log file name inside the logging directory",
        }
    }

    pub fn section(&self) -> &'static str {
        self.name().split('.').next().unwrap_or("")
    }

    pub fn key_name(&self) -> &'static str {
        self.name().split('.').nth(1).unwrap_or(self.name())
    }

    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::BackgroundExtensionSecs => config.background.extension_secs.to_string(),
            ConfigKey::RequestsDefaultTimeoutSecs => config
                .requests
                .default_timeout_secs
                .unwrap_or(0)
                .to_string(),
            ConfigKey::HeadingFilterDegrees => config.heading.filter_degrees.to_string(),
            ConfigKey::LoggingDirectory => path_to_display(&config.logging.directory),
            ConfigKey::LoggingFile => config.logging.file.clone(),
        }
    }

    /// Validates and stores `value`.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigKeyError> {
        let fail = |reason: String| ConfigKeyError::ValidationFailed {
            key: self.name().to_string(),
            reason,
        };

        match self {
            ConfigKey::BackgroundExtensionSecs => {
                config.background.extension_secs = parse_extension_secs(value).map_err(fail)?;
            }
            ConfigKey::RequestsDefaultTimeoutSecs => {
                config.requests.default_timeout_secs = parse_timeout_secs(value).map_err(fail)?;
            }
            ConfigKey::HeadingFilterDegrees => {
                config.heading.filter_degrees = parse_filter_degrees(value).map_err(fail)?;
            }
            ConfigKey::LoggingDirectory => {
                let value = value.trim();
                if value.is_empty() {
                    return Err(fail("must not be empty".to_string()));
                }
                config.logging.directory = expand_tilde(value);
            }
            ConfigKey::LoggingFile => {
                let value = value.trim();
                if value.is_empty() || value.contains(['/', '\\']) {
                    return Err(fail("expected a plain file name".to_string()));
                }
                config.logging.file = value.to_string();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_parsing() {
        assert_eq!(
            "heading.filter_degrees".parse::<ConfigKey>().unwrap(),
            ConfigKey::HeadingFilterDegrees
        );
        assert_eq!(
            "LOGGING.FILE".parse::<ConfigKey>().unwrap(),
            ConfigKey::LoggingFile
        );
        assert!("heading.north".parse::<ConfigKey>().is_err());
    }

    #[test]
    fn test_key_name_parts() {
        assert_eq!(ConfigKey::RequestsDefaultTimeoutSecs.section(), "requests");
        assert_eq!(
            ConfigKey::RequestsDefaultTimeoutSecs.key_name(),
            "default_timeout_secs"
        );
    }

    #[test]
    fn test_every_key_is_described() {
        for key in ConfigKey::all() {
            assert!(!key.description().is_empty(), "{}", key.name());
        }
    }

    #[test]
    fn test_set_and_get() {
        let mut config = ConfigFile::default();

        ConfigKey::RequestsDefaultTimeoutSecs
            .set(&mut config, "20")
            .unwrap();
        assert_eq!(ConfigKey::RequestsDefaultTimeoutSecs.get(&config), "20");

        assert!(ConfigKey::BackgroundExtensionSecs
            .set(&mut config, "0")
            .is_err());
        assert!(ConfigKey::LoggingFile.set(&mut config, "../x.log").is_err());
        assert_eq!(
            ConfigKey::BackgroundExtensionSecs.get(&config),
            ConfigFile::default().background.extension_secs.to_string()
        );
    }
}
