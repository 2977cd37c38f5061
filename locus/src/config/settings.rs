//! Settings structs, one per `[section]` of the INI file.

use std::path::PathBuf;
use std::time::Duration;

use crate::manager::{ManagerConfig, DEFAULT_BACKGROUND_EXTENSION, DEFAULT_HEADING_FILTER};

use super::file::config_directory;

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "locus.log";

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub background: BackgroundSettings,
    pub requests: RequestSettings,
    pub heading: HeadingSettings,
    pub logging: LoggingSettings,
}

/// `[background]`
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundSettings {
    /// Length of each runtime extension requested while in background.
    pub extension_secs: u64,
}

/// `[requests]`
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSettings {
    /// Timeout for one-shot location and geocode requests without their own.
    pub default_timeout_secs: Option<u64>,
}

/// `[heading]`
#[derive(Debug, Clone, PartialEq)]
pub struct HeadingSettings {
    /// Filter for heading requests that do not set one, in degrees.
    pub filter_degrees: f64,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            background: BackgroundSettings {
                extension_secs: DEFAULT_BACKGROUND_EXTENSION.as_secs(),
            },
            requests: RequestSettings {
                default_timeout_secs: None,
            },
            heading: HeadingSettings {
                filter_degrees: DEFAULT_HEADING_FILTER,
            },
            logging: LoggingSettings {
                directory: config_directory().join("logs"),
                file: DEFAULT_LOG_FILE.to_string(),
            },
        }
    }
}

impl ConfigFile {
    /// Manager tunables derived from this configuration.
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig::default()
            .with_background_extension(Duration::from_secs(self.background.extension_secs))
            .with_default_timeout(self.requests.default_timeout_secs.map(Duration::from_secs))
            .with_default_heading_filter(self.heading.filter_degrees)
    }
}
