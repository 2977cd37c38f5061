//! INI parsing: `Ini` → `ConfigFile`.
//!
//! The value parsers here are shared with [`super::keys`] so `config set`
//! accepts exactly what the file loader accepts.

use std::path::{Path, PathBuf};

use ini::Ini;

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Starts from defaults and overlays every value found in `ini`.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("background")) {
        if let Some(v) = section.get("extension_secs") {
            config.background.extension_secs =
                parse_extension_secs(v).map_err(|reason| invalid("background", "extension_secs", v, reason))?;
        }
    }

    if let Some(section) = ini.section(Some("requests")) {
        if let Some(v) = section.get("default_timeout_secs") {
            config.requests.default_timeout_secs = parse_timeout_secs(v)
                .map_err(|reason| invalid("requests", "default_timeout_secs", v, reason))?;
        }
    }

    if let Some(section) = ini.section(Some("heading")) {
        if let Some(v) = section.get("filter_degrees") {
            config.heading.filter_degrees = parse_filter_degrees(v)
                .map_err(|reason| invalid("heading", "filter_degrees", v, reason))?;
        }
    }

    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: String) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason,
    }
}

pub(super) fn parse_extension_secs(value: &str) -> Result<u64, String> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err("must be greater than zero".to_string()),
        Ok(secs) => Ok(secs),
        Err(_) => Err("expected a whole number of seconds".to_string()),
    }
}

/// Empty or `0` disables the default timeout.
pub(super) fn parse_timeout_secs(value: &str) -> Result<Option<u64>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    match value.parse::<u64>() {
        Ok(0) => Ok(None),
        Ok(secs) => Ok(Some(secs)),
        Err(_) => Err("expected a whole number of seconds (0 disables)".to_string()),
    }
}

pub(super) fn parse_filter_degrees(value: &str) -> Result<f64, String> {
    match value.trim().parse::<f64>() {
        Ok(deg) if (0.0..=360.0).contains(&deg) => Ok(deg),
        Ok(_) => Err("must be between 0 and 360".to_string()),
        Err(_) => Err("expected a number of degrees".to_string()),
    }
}

pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Collapses the home directory to `~` for display and writing.
pub(super) fn path_to_display(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let ini = Ini::load_from_str("[requests]\ndefault_timeout_secs = 30\n").unwrap();
        let config = parse_ini(&ini).unwrap();

        assert_eq!(config.requests.default_timeout_secs, Some(30));
        assert_eq!(config.background, ConfigFile::default().background);
    }

    #[test]
    fn test_zero_timeout_disables() {
        assert_eq!(parse_timeout_secs("0"), Ok(None));
        assert_eq!(parse_timeout_secs(""), Ok(None));
        assert!(parse_timeout_secs("-3").is_err());
    }

    #[test]
    fn test_extension_must_be_positive() {
        assert!(parse_extension_secs("0").is_err());
        assert_eq!(parse_extension_secs(" 30 "), Ok(30));
    }

    #[test]
    fn test_filter_range() {
        assert_eq!(parse_filter_degrees("5"), Ok(5.0));
        assert!(parse_filter_degrees("400").is_err());
        assert!(parse_filter_degrees("NaN").is_err());
    }
}
