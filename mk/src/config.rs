//! marksync configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default maximum number of files discovered by a workspace scan
pub const DEFAULT_MAX_FILES: usize = 1000;

/// Default number of files scanned concurrently in one batch
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// File extensions scanned by default
const DEFAULT_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "py", "rs", "go", "java", "c", "cpp", "h", "hpp", "cs", "rb", "php", "swift", "kt",
    "vue", "svelte", "html", "css", "scss", "md", "sh", "yaml", "yml",
];

/// Main marksync configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Comment scanning
    pub todos: ScannerConfig,

    /// Durable state location
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .marksync.yml
        let local_config = PathBuf::from(".marksync.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/marksync/marksync.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("marksync").join("marksync.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// What to scan and how
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Globs (relative to a workspace root) of files to scan
    #[serde(rename = "include-patterns")]
    pub include_patterns: Vec<String>,

    /// Globs of files to skip; checked before includes
    #[serde(rename = "exclude-patterns")]
    pub exclude_patterns: Vec<String>,

    /// Rescan a file whenever it is saved
    #[serde(rename = "scan-on-save")]
    pub scan_on_save: bool,

    /// Extra regex patterns, tagged CUSTOM
    #[serde(rename = "custom-patterns")]
    pub custom_patterns: Vec<String>,

    /// Upper bound on files discovered by a workspace scan
    #[serde(rename = "max-files")]
    pub max_files: usize,

    /// Files scanned concurrently per batch
    #[serde(rename = "batch-size")]
    pub batch_size: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            include_patterns: DEFAULT_EXTENSIONS.iter().map(|ext| format!("**/*.{}", ext)).collect(),
            exclude_patterns: vec![
                "**/node_modules/**".to_string(),
                "**/target/**".to_string(),
                "**/.git/**".to_string(),
                "**/dist/**".to_string(),
                "**/out/**".to_string(),
            ],
            scan_on_save: true,
            custom_patterns: Vec::new(),
            max_files: DEFAULT_MAX_FILES,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file holding persisted comment metadata
    #[serde(rename = "state-file")]
    pub state_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("marksync")
                .join("state.json"),
        }
    }
}
