//! Configuration file parsing and data locations

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;

use crate::client::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};
use crate::error::DiabRiskError;

const APP_DIR: &str = "diabrisk";

const DEFAULT_CONFIG: &str = "\
# diabrisk configuration
# Format: key value  (anything after # is ignored)

# Prediction endpoint
endpoint http://127.0.0.1:5000/predict

# Seconds to wait for a prediction before giving up
timeout_secs 10

# Uncomment to keep the history database somewhere else
# database_path /path/to/diabrisk.db
";

/// Configuration loaded from config.txt
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub endpoint: String,
    pub timeout: Duration,
    pub database_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            database_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DiabRiskError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut entries = HashMap::new();

        for line in reader.lines() {
            let line = line?;

            // Skip empty lines and comments
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, rest)) = Self::parse_line(line) {
                // Extract value before any comment
                let value = rest.split('#').next().unwrap_or("").trim();
                if !value.is_empty() {
                    entries.insert(key.to_string(), value.to_string());
                }
            }
        }

        Self::from_entries(entries)
    }

    fn from_entries(mut entries: HashMap<String, String>) -> Result<Self, DiabRiskError> {
        let mut config = Config::default();
        if let Some(endpoint) = entries.remove("endpoint") {
            config.endpoint = endpoint;
        }
        if let Some(raw) = entries.remove("timeout_secs") {
            let secs: u64 = raw.parse().map_err(|_| {
                DiabRiskError::InvalidInput(format!("timeout_secs must be a whole number, got '{}'", raw))
            })?;
            config.timeout = Duration::from_secs(secs.max(1));
        }
        config.database_path = entries.remove("database_path");
        for key in entries.keys() {
            warn!("Ignoring unknown config key '{}'", key);
        }
        Ok(config)
    }

    /// Parse a single config line, returning (key, value)
    fn parse_line(line: &str) -> Option<(&str, &str)> {
        // Find first whitespace to separate key from value
        let mut parts = line.splitn(2, |c: char| c.is_whitespace());
        let key = parts.next()?.trim();
        let value = parts.next()?.trim();

        if key.is_empty() || value.is_empty() {
            return None;
        }

        Some((key, value))
    }

    /// Write a commented default config file
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<(), DiabRiskError> {
        fs::write(path, DEFAULT_CONFIG)?;
        Ok(())
    }

    /// Database path from config, or the OS default
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path)
    }
}

/// OS-specific data directory (falls back to the working directory)
pub fn get_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn ensure_data_dir() -> Result<PathBuf, DiabRiskError> {
    let dir = get_data_dir();
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn config_file_path() -> PathBuf {
    get_data_dir().join("config.txt")
}

pub fn default_database_path() -> PathBuf {
    get_data_dir().join("diabrisk.db")
}

pub fn settings_file_path() -> PathBuf {
    get_data_dir().join("settings.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_file_parses_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.txt");
        Config::create_default(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_values_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.txt");
        fs::write(
            &path,
            "endpoint https://risk.example.org/predict  # production\n\
             timeout_secs 3\n\
             database_path /tmp/h.db\n\
             colour blue\n",
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.endpoint, "https://risk.example.org/predict");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.database_path(), PathBuf::from("/tmp/h.db"));
    }

    #[test]
    fn test_bad_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.txt");
        fs::write(&path, "timeout_secs soon\n").unwrap();
        assert!(matches!(Config::load(&path), Err(DiabRiskError::InvalidInput(_))));
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(Config::load("/definitely/not/here/config.txt").is_err());
    }
}
