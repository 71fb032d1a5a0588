use crate::error::{ClassifierError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use star_classifier_common::layout::DEFAULT_EXPORT_FILE_NAME;

pub const DEFAULT_ROWS_PER_PAGE: usize = 10;
pub const DEFAULT_INGEST_BATCH_SIZE: usize = 50;
pub const DEFAULT_IMAGE_EXTENSION: &str = "png";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store directory; `None` uses the platform data directory
    pub data_dir: Option<PathBuf>,
    /// Page size used until the user picks one (persisted in the store afterwards)
    pub default_rows_per_page: usize,
    /// Accepted archive entry extension, compared case-insensitively
    pub image_extension: String,
    /// Records committed per ingestion transaction
    pub ingest_batch_size: usize,
    pub export_file_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            default_rows_per_page: DEFAULT_ROWS_PER_PAGE,
            image_extension: DEFAULT_IMAGE_EXTENSION.into(),
            ingest_batch_size: DEFAULT_INGEST_BATCH_SIZE,
            export_file_name: DEFAULT_EXPORT_FILE_NAME.into(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.validate()?;
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ClassifierError::Config("home directory not found".into()))?;
        Ok(home.join(".config").join("star-classifier").join("config.json"))
    }

    /// Store directory: explicit setting, else `<data dir>/star-classifier/store`
    pub fn store_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let base = dirs::data_dir()
            .ok_or_else(|| ClassifierError::Config("data directory not found".into()))?;
        Ok(base.join("star-classifier").join("store"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_rows_per_page == 0 {
            return Err(ClassifierError::Config("default_rows_per_page must be positive".into()));
        }
        if self.ingest_batch_size == 0 {
            return Err(ClassifierError::Config("ingest_batch_size must be positive".into()));
        }
        let ext = self.image_extension.trim_start_matches('.');
        if ext.is_empty() {
            return Err(ClassifierError::Config("image_extension is empty".into()));
        }
        Ok(())
    }

    /// Lowercase suffix including the dot, e.g. `.png`
    pub fn extension_suffix(&self) -> String {
        format!(".{}", self.image_extension.trim_start_matches('.').to_lowercase())
    }
}
