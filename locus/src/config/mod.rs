//! User configuration for locus.
//!
//! Settings live in `~/.locus/config.ini`. A missing file means defaults.
//!
//! ```ini
//! [background]
//! extension_secs = 170
//!
//! [requests]
//! ; 0 disables the default timeout
//! default_timeout_secs = 0
//!
//! [heading]
//! filter_degrees = 1
//!
//! [logging]
//! directory = ~/.locus/logs
//! file = locus.log
//! ```

mod file;
mod keys;
mod parser;
mod settings;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use keys::{ConfigKey, ConfigKeyError};
pub use settings::{
    BackgroundSettings, ConfigFile, HeadingSettings, LoggingSettings, RequestSettings,
    DEFAULT_LOG_FILE,
};
