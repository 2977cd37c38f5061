//! `locus config` - inspect and edit `~/.locus/config.ini`.
//!
//! Values are validated by `ConfigKey::set` before the file is rewritten, so a
//! bad timeout or filter never reaches the manager.

use std::fmt::Write as _;

use clap::Subcommand;
use locus::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print one setting, e.g. `locus config get requests.default_timeout_secs`
    Get {
        /// Setting name as section.key
        key: String,
    },

    /// Change one setting, e.g. `locus config set heading.filter_degrees 5`
    Set {
        /// Setting name as section.key
        key: String,

        /// New value; checked before the file is written
        value: String,
    },

    /// Show every setting with its current value and what it controls
    List,

    /// Print where the config file lives
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => {
            let key = parse_key(&key)?;
            println!("{}", key.get(&ConfigFile::load()?));
            Ok(())
        }
        ConfigCommands::Set { key, value } => run_set(&key, &value),
        ConfigCommands::List => {
            print!("{}", render_list(&ConfigFile::load()?));
            Ok(())
        }
        ConfigCommands::Path => {
            println!("{}", config_file_path().display());
            Ok(())
        }
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        let known: Vec<&str> = ConfigKey::all().iter().map(|k| k.name()).collect();
        CliError::Config(format!(
            "no setting named '{}' (known: {})",
            key,
            known.join(", ")
        ))
    })
}

fn run_set(key: &str, value: &str) -> Result<(), CliError> {
    let key = parse_key(key)?;
    let mut config = ConfigFile::load()?;
    let before = key.get(&config);

    key.set(&mut config, value)
        .map_err(|e| CliError::Config(e.to_string()))?;
    config.save()?;

    tracing::debug!(key = key.name(), from = %before, to = %key.get(&config), "Setting changed");
    println!("{}: {} -> {}", key.name(), before, key.get(&config));
    Ok(())
}

/// Renders settings grouped by INI section, each with its description.
fn render_list(config: &ConfigFile) -> String {
    let width = ConfigKey::all()
        .iter()
        .map(|k| k.key_name().len() + 3 + k.get(config).len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    let mut section = "";
    for key in ConfigKey::all() {
        if key.section() != section {
            if !section.is_empty() {
                out.push('\n');
            }
            section = key.section();
            let _ = writeln!(out, "[{}]", section);
        }
        let assignment = format!("{} = {}", key.key_name(), key.get(config));
        let _ = writeln!(
            out,
            "  {:<width$}  ; {}",
            assignment,
            key.description(),
            width = width
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_groups_keys_by_section() {
        let listing = render_list(&ConfigFile::default());

        let sections: Vec<&str> = listing.lines().filter(|l| l.starts_with('[')).collect();
        assert_eq!(
            sections,
            vec!["[background]", "[requests]", "[heading]", "[logging]"]
        );
        assert!(listing.contains("default_timeout_secs = 0"));
        assert!(listing.contains("0 = never"));
    }

    #[test]
    fn test_unknown_key_lists_known_ones() {
        let err = parse_key("heading.north").unwrap_err().to_string();
        assert!(err.contains("heading.north"));
        assert!(err.contains("heading.filter_degrees"));
    }
}
