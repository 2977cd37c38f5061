//! INI serialization: `ConfigFile` → commented INI string.

use super::parser::path_to_display;
use super::settings::ConfigFile;

pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[background]
; Seconds of runtime requested from the OS per background extension.
; Renewed each time an extension is about to expire.
extension_secs = {}

[requests]
; Timeout in seconds for one-shot location and geocode requests that do not
; set their own. 0 disables.
default_timeout_secs = {}

[heading]
; Minimum heading change in degrees before an update is delivered, for
; heading requests that do not set their own filter.
filter_degrees = {}

[logging]
; Directory for log files
directory = {}
; Log file name
file = {}
"#,
        config.background.extension_secs,
        config.requests.default_timeout_secs.unwrap_or(0),
        config.heading.filter_degrees,
        path_to_display(&config.logging.directory),
        config.logging.file,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_parses_back() {
        let mut config = ConfigFile::default();
        config.requests.default_timeout_secs = Some(45);

        let text = to_config_string(&config);
        let ini = ini::Ini::load_from_str(&text).unwrap();
        let parsed = super::super::parser::parse_ini(&ini).unwrap();

        assert_eq!(parsed.requests.default_timeout_secs, Some(45));
        assert_eq!(parsed.logging.file, config.logging.file);
    }
}
