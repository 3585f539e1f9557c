use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::models::MetadataSource;

/// Root application configuration, loaded from `~/.config/shelfmark/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub merge: MergeConfig,
    pub matching: MatchingConfig,
    pub call_number: CallNumberConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub database_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Source order used to resolve non-identifier fields. Must start with `vision`.
    pub priority: Vec<MetadataSource>,
    /// The only source trusted for the LCCN.
    pub lccn_source: MetadataSource,
    /// Record which source won each field.
    pub provenance: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegate: Option<DelegateConfig>,
}

/// External program that performs the preferred (assisted) merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegateConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// The delegate is killed and the rule-based merge used after this long.
    #[serde(default = "default_delegate_timeout")]
    pub timeout_secs: u64,
}

fn default_delegate_timeout() -> u64 {
    30
}

/// Where call numbers come from. Without a delegate every book gets a
/// provisional number built from its metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CallNumberConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegate: Option<DelegateConfig>,
}

/// Fuzzy duplicate thresholds. These are heuristics inherited from the first
/// cataloguing tool and have never been tuned against labelled data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub title_threshold: f64,
    pub author_threshold: f64,
    pub strong_title_threshold: f64,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for CatalogConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("shelfmark");

        Self {
            database_path: data_dir.join("catalog.db").to_string_lossy().to_string(),
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            priority: vec![
                MetadataSource::Vision,
                MetadataSource::GoogleBooks,
                MetadataSource::OpenLibrary,
                MetadataSource::Isbnlib,
                MetadataSource::LibraryOfCongress,
                MetadataSource::Worldcat,
                MetadataSource::Manual,
            ],
            lccn_source: MetadataSource::LibraryOfCongress,
            provenance: false,
            delegate: None,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            title_threshold: 0.6,
            author_threshold: 0.5,
            strong_title_threshold: 0.75,
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/shelfmark/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("SHELFMARK_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("shelfmark")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.merge.priority.first() != Some(&MetadataSource::PRIMARY) {
            return Err(CoreError::ConfigError(format!(
                "merge.priority must start with `{}`",
                MetadataSource::PRIMARY
            )));
        }

        let m = &self.matching;
        for (name, value) in [
            ("title_threshold", m.title_threshold),
            ("author_threshold", m.author_threshold),
            ("strong_title_threshold", m.strong_title_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CoreError::ConfigError(format!(
                    "matching.{name} must be within 0.0..=1.0, got {value}"
                )));
            }
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.catalog.database_path)
    }

    pub fn set_database_path(&mut self, path: PathBuf) {
        self.catalog.database_path = path.to_string_lossy().to_string();
    }
}
