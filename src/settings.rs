//! Code for loading program settings.
use crate::get_solenna_config_dir;
use crate::input::{read_toml, with_header};
use crate::log::DEFAULT_LOG_LEVEL;
use crate::simulator::{DEFAULT_STORAGE_KEY, SimulatorOptions};
use crate::units::Millis;
use anyhow::Result;
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.toml";

const DEFAULT_SETTINGS_FILE_HEADER: &str = "# This file contains the program settings for Solenna
";

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_latency_ms() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

/// Get the path to where the settings file will be read from
pub fn get_settings_file_path() -> PathBuf {
    let mut path = get_solenna_config_dir();
    path.push(SETTINGS_FILE_NAME);

    path
}

/// Program settings from config file
#[derive(Debug, DocumentedFields, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// The default program log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Quiet period in milliseconds after the last edit before the quote is recomputed
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Delay in milliseconds before a started calculation is delivered
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
    /// Whether to recompute the quote automatically once edits have settled
    #[serde(default = "default_true")]
    pub auto_calculate: bool,
    /// Whether to save the simulator's answers between sessions
    #[serde(default = "default_true")]
    pub persist_state: bool,
    /// The key the simulator's answers are saved under
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    /// Path to a tariff file to use instead of the built-in tariff
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tariff_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        toml::from_str("").expect("Cannot create settings from empty TOML file")
    }
}

impl Settings {
    /// Read the program settings file.
    ///
    /// If the file is not present, default values for settings will be used
    ///
    /// # Returns
    ///
    /// The program settings as a `Settings` struct or an error if the file is invalid
    pub fn load() -> Result<Settings> {
        Self::load_from_path(&get_settings_file_path())
    }

    /// Read from the specified path, using defaults if the file does not exist
    pub fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        read_toml(file_path)
    }

    /// The simulator options described by these settings
    pub fn simulator_options(&self) -> SimulatorOptions {
        SimulatorOptions {
            auto_calculate: self.auto_calculate,
            debounce: Millis(self.debounce_ms),
            latency: Millis(self.latency_ms),
            persist_state: self.persist_state,
            storage_key: self.storage_key.clone(),
        }
    }

    /// The contents of the default settings file
    pub fn default_file_contents() -> String {
        let settings_raw =
            toml::to_string(&Settings::default()).expect("Could not convert settings to TOML");

        // Comment out every line, documenting each setting from its doc comment
        let mut out = String::new();
        for line in settings_raw.lines() {
            if let Some(last) = line.find('=') {
                let field = line[..last].trim();
                let docs = Settings::get_field_docs(field).expect("Missing doc comment for field");
                for line in docs.lines() {
                    write!(&mut out, "\n# # {}\n", line.trim()).unwrap();
                }

                writeln!(&mut out, "# {}", line.trim()).unwrap();
            }
        }

        with_header(DEFAULT_SETTINGS_FILE_HEADER, &out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_settings_load_from_path_no_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(SETTINGS_FILE_NAME); // NB: doesn't exist
        assert_eq!(
            Settings::load_from_path(&file_path).unwrap(),
            Settings::default()
        );
    }

    #[test]
    fn test_settings_load_from_path() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(SETTINGS_FILE_NAME);

        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "log_level = \"warn\"\ndebounce_ms = 500").unwrap();
        }

        assert_eq!(
            Settings::load_from_path(&file_path).unwrap(),
            Settings {
                log_level: "warn".to_string(),
                debounce_ms: 500,
                ..Settings::default()
            }
        );
    }

    #[test]
    fn test_simulator_options() {
        let settings = Settings {
            latency_ms: 0,
            persist_state: false,
            ..Settings::default()
        };
        assert_eq!(
            settings.simulator_options(),
            SimulatorOptions {
                latency: Millis(0),
                persist_state: false,
                ..SimulatorOptions::default()
            }
        );
    }

    #[test]
    fn test_default_file_contents() {
        let contents = Settings::default_file_contents();
        assert!(contents.starts_with(DEFAULT_SETTINGS_FILE_HEADER));
        assert!(contents.contains("# debounce_ms = 300"));

        // Uncommenting the settings gives back the defaults
        let uncommented: String = contents
            .lines()
            .filter_map(|line| line.strip_prefix("# "))
            .filter(|line| line.contains('=') && !line.starts_with("# "))
            .map(|line| format!("{line}\n"))
            .collect();
        let settings: Settings = toml::from_str(&uncommented).unwrap();
        assert_eq!(settings, Settings::default());
    }
}
