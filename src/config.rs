use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Prefix for partition names (`<prefix>-<role>-<version>`)
  #[serde(default = "default_app_prefix")]
  pub app_prefix: String,
  /// Cache version tag; changing it retires every partition of older versions
  pub version: String,
  /// Absolute URL the worker controls; its origin is the page origin
  pub scope: String,
  /// Resources required to boot offline, fetched at install
  #[serde(default = "default_shell")]
  pub shell: Vec<String>,
  /// URL substrings identifying external script providers
  #[serde(default = "default_third_party_markers")]
  pub third_party_markers: Vec<String>,
  /// SQLite cache location (defaults to the platform data directory)
  pub cache_path: Option<PathBuf>,
}

fn default_app_prefix() -> String {
  "sawmill".to_string()
}

fn default_shell() -> Vec<String> {
  [
    "./index.html",
    "./manifest.json",
    "./sw.js",
    "./icons/icon-192.png",
    "./icons/icon-512.png",
    "./icons/icon-512-maskable.png",
  ]
  .iter()
  .map(|s| s.to_string())
  .collect()
}

fn default_third_party_markers() -> Vec<String> {
  vec!["pdfmake".to_string()]
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./sawmill.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/sawmill-offline/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/sawmill-offline/config.yaml \
         or pass --config."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("sawmill.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("sawmill-offline").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))
  }

  /// Parse and validate a YAML document.
  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.app_prefix.trim().is_empty() {
      return Err(eyre!("app_prefix must not be empty"));
    }
    if self.version.trim().is_empty() {
      return Err(eyre!("version must not be empty"));
    }
    if self.third_party_markers.iter().any(|m| m.is_empty()) {
      return Err(eyre!("third_party_markers must not contain empty strings"));
    }
    self.scope_url()?;
    Ok(())
  }

  /// The scope as a parsed absolute URL.
  pub fn scope_url(&self) -> Result<Url> {
    let url =
      Url::parse(&self.scope).map_err(|e| eyre!("Invalid scope URL {}: {}", self.scope, e))?;
    if url.cannot_be_a_base() {
      return Err(eyre!("Scope URL {} cannot be used as a base", self.scope));
    }
    Ok(url)
  }
}
