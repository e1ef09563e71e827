// src/config/format.rs
use anyhow::{anyhow, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

/// On-disk format of a config document, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigFormat {
    /// `.toml` and `.json` are honored; everything else is treated as YAML.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "toml" => Self::Toml,
            "json" => Self::Json,
            _ => Self::Yaml,
        }
    }

    pub fn parse<T: DeserializeOwned>(self, s: &str) -> Result<T> {
        match self {
            Self::Yaml => {
                // An empty YAML file is a valid, empty document.
                if s.trim().is_empty() {
                    return serde_yaml::from_str("{}").context("parsing empty yaml");
                }
                serde_yaml::from_str(s).context("parsing yaml")
            }
            Self::Toml => toml::from_str(s).context("parsing toml"),
            Self::Json => serde_json::from_str(s).context("parsing json"),
        }
    }

    pub fn render<T: Serialize>(self, value: &T) -> Result<String> {
        match self {
            Self::Yaml => serde_yaml::to_string(value).context("rendering yaml"),
            Self::Toml => toml::to_string(value).map_err(|e| anyhow!("rendering toml: {e}")),
            Self::Json => serde_json::to_string_pretty(value).context("rendering json"),
        }
    }
}

/// Read and parse a document, choosing the format from the extension.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    ConfigFormat::from_path(path)
        .parse(&content)
        .with_context(|| format!("parsing {}", path.display()))
}

/// Write a document atomically (temp file + rename).
pub fn store_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let rendered = ConfigFormat::from_path(path).render(value)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, rendered).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}
