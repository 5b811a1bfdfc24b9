use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub compression: CompressionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Version tag naming the generation this build of the application ships.
  /// Bumping it triggers a fresh install + activation cycle.
  pub generation: String,
  /// Origin that relative seed assets are resolved against.
  pub base_url: String,
  /// Seed set fetched at install: application shell, offline fallback page,
  /// logo asset. Entries may be absolute URLs or paths relative to
  /// `base_url`.
  pub seed_assets: Vec<String>,
  /// Page served for navigations when both network and cache miss.
  pub offline_path: String,
  /// Database location; defaults to the platform data directory.
  pub db_path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      generation: "marquee-v1".to_string(),
      base_url: "http://localhost:5173".to_string(),
      seed_assets: vec![
        "/".to_string(),
        "/offline.html".to_string(),
        "/images/logo.svg".to_string(),
      ],
      offline_path: "/offline.html".to_string(),
      db_path: None,
    }
  }
}

impl CacheConfig {
  /// Resolve the seed set to absolute URLs.
  pub fn seed_urls(&self) -> Result<Vec<String>> {
    let base = self.base()?;
    self
      .seed_assets
      .iter()
      .map(|asset| resolve(&base, asset))
      .collect()
  }

  /// Absolute URL of the offline fallback page.
  pub fn offline_url(&self) -> Result<String> {
    let base = self.base()?;
    resolve(&base, &self.offline_path)
  }

  fn base(&self) -> Result<Url> {
    Url::parse(&self.base_url).map_err(|e| eyre!("Invalid base URL {}: {}", self.base_url, e))
  }
}

fn resolve(base: &Url, asset: &str) -> Result<String> {
  match Url::parse(asset) {
    Ok(absolute) => Ok(absolute.to_string()),
    Err(_) => base
      .join(asset)
      .map(|u| u.to_string())
      .map_err(|e| eyre!("Invalid seed asset {}: {}", asset, e)),
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
  /// Bounding box for uploaded images; dimensions are never scaled up.
  pub max_width: u32,
  pub max_height: u32,
  /// Lossy re-encode quality factor in (0, 1].
  pub quality: f32,
  /// Upper bound on one worker round trip.
  pub timeout_secs: u64,
}

impl Default for CompressionConfig {
  fn default() -> Self {
    Self {
      max_width: 800,
      max_height: 800,
      quality: 0.8,
      timeout_secs: 30,
    }
  }
}

impl CompressionConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./marquee.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/marquee/config.yaml
  ///
  /// With no file anywhere the built-in defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => {
        tracing::debug!("no config file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("marquee.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("marquee").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }
}
