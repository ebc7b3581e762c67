use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Location of the catalog database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub thumbnails: ThumbnailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Lowercase extensions treated as images during discovery.
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    #[serde(default = "default_thumb_cache_path")]
    pub path: PathBuf,

    /// Longest edge of a generated thumbnail, in pixels.
    #[serde(default = "default_thumb_size")]
    pub size: u32,

    /// JPEG quality (1-100) used when encoding thumbnails.
    #[serde(default = "default_thumb_quality")]
    pub quality: u8,
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pictor")
        .join("pictor.db")
}

fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "gif".to_string(),
        "bmp".to_string(),
        "tiff".to_string(),
        "tif".to_string(),
        "webp".to_string(),
        "ico".to_string(),
        "heic".to_string(),
        "heif".to_string(),
    ]
}

fn default_thumb_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("pictor/thumbnails")
}

fn default_thumb_size() -> u32 {
    150
}

fn default_thumb_quality() -> u8 {
    85
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
        }
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            path: default_thumb_cache_path(),
            size: default_thumb_size(),
            quality: default_thumb_quality(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            scanner: ScannerConfig::default(),
            thumbnails: ThumbnailConfig::default(),
        }
    }
}

impl Config {
    /// Load the configuration, writing a default file on first run.
    ///
    /// The `PICTOR_CONFIG` environment variable overrides the search
    /// path entirely; no file is created in that case.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("PICTOR_CONFIG") {
            return Self::load_from(Path::new(&path));
        }

        let path = Self::config_path();
        if !path.exists() {
            let config = Config::default();
            config.save()?;
            return Ok(config);
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file {:?}", path))
    }

    /// Directory holding `config.toml`; logs live in a subdirectory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pictor")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_falls_back_to_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.thumbnails.size, 150);
        assert_eq!(config.thumbnails.quality, 85);
        assert!(config.scanner.image_extensions.iter().any(|e| e == "jpg"));
        assert!(config.db_path.ends_with("pictor/pictor.db"));
    }

    #[test]
    fn partial_file_keeps_unrelated_defaults() {
        let content = "[thumbnails]\nsize = 300\n";
        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.thumbnails.size, 300);
        assert_eq!(config.thumbnails.quality, 85);
        assert!(!config.scanner.image_extensions.is_empty());
    }

    #[test]
    fn load_from_reads_an_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "db_path = \"/tmp/catalog.db\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/catalog.db"));
    }

    #[test]
    fn load_from_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "db_path = [broken").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
