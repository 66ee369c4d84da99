use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DB_FILE_NAME: &str = "vplan.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Provider root, e.g. "https://www.stundenplan24.de".
    pub base_url: String,
    /// Applied separately to connecting and to the whole request.
    pub timeout_ms: u64,
    pub sync_interval_secs: u64,
    /// Days after today that a background sync also refreshes.
    pub days_ahead: u32,
}

impl AppConfig {
    /// Loads `config.toml` from `data_dir`. A missing file yields defaults.
    pub fn load<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let path = data_dir.join(CONFIG_FILE_NAME);

        let mut config = match fs::read_to_string(&path) {
            Ok(content) => toml::from_str::<AppConfig>(&content)
                .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
            Err(e) => return Err(e.into()),
        };
        config.data_dir = data_dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(self.data_dir.join(CONFIG_FILE_NAME), content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms must be positive".to_string()));
        }
        if self.sync_interval_secs == 0 {
            return Err(Error::Config("sync_interval_secs must be positive".to_string()));
        }
        Ok(())
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    /// Platform data directory, falling back to `./data`.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        ProjectDirs::from("", "", "vplan")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("./data"))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
            base_url: "https://www.stundenplan24.de".to_string(),
            timeout_ms: 5000,
            sync_interval_secs: 15 * 60,
            days_ahead: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig::load(temp.path()).unwrap();
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.data_dir, temp.path());
        assert_eq!(config.db_path(), temp.path().join("vplan.db"));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "base_url = \"http://127.0.0.1:9000\"\n",
        )
        .unwrap();

        let config = AppConfig::load(temp.path()).unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.sync_interval_secs, 900);
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE_NAME), "base_url = \"ftp://x\"\n").unwrap();

        let result = AppConfig::load(temp.path());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig {
            data_dir: temp.path().to_path_buf(),
            days_ahead: 3,
            ..AppConfig::default()
        };
        config.save().unwrap();

        let loaded = AppConfig::load(temp.path()).unwrap();
        assert_eq!(loaded, config);
    }
}
