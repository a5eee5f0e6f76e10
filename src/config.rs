use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::graph::{DEFAULT_PALETTE_SIZE, LayoutOptions, LineStyle};

/// User-facing layout settings. Persisting them belongs to the host; this
/// only reads them.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LayoutConfig {
    #[serde(default = "default_palette_size")]
    pub palette_size: usize,
    #[serde(default)]
    pub line_style: LineStyle,
    #[serde(default = "default_row_height")]
    pub row_height: f32,
    /// Space opened below a row whose details are shown inline
    #[serde(default = "default_expansion_height")]
    pub expansion_height: f32,
}

fn default_palette_size() -> usize { DEFAULT_PALETTE_SIZE }
fn default_row_height() -> f32 { 24.0 }
fn default_expansion_height() -> f32 { 250.0 }

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            palette_size: default_palette_size(),
            line_style: LineStyle::default(),
            row_height: default_row_height(),
            expansion_height: default_expansion_height(),
        }
    }
}

impl LayoutConfig {
    fn config_dir() -> Option<PathBuf> {
        std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config").join("whisper-graph"))
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("layout.json"))
    }

    /// Load from the default location, falling back to defaults on any problem.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %format!("{e:#}"),
                    "using default layout config"
                );
                Self::default()
            }
        }
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read layout config {}", path.display()))?;
        let config: Self = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse layout config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.palette_size == 0 {
            bail!("palette_size must be at least 1");
        }
        if !self.row_height.is_finite() || self.row_height <= 0.0 {
            bail!("row_height must be positive, got {}", self.row_height);
        }
        if !self.expansion_height.is_finite() || self.expansion_height < 0.0 {
            bail!("expansion_height must not be negative, got {}", self.expansion_height);
        }
        Ok(())
    }

    pub fn layout_options(&self) -> LayoutOptions {
        LayoutOptions {
            palette_size: self.palette_size,
            line_style: self.line_style,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: LayoutConfig = serde_json::from_str(r#"{"line_style": "angular"}"#).unwrap();
        assert_eq!(config.line_style, LineStyle::Angular);
        assert_eq!(config.palette_size, 12);
        assert_eq!(config.row_height, 24.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_rejects_zero_palette() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        fs::write(&path, r#"{"palette_size": 0}"#).unwrap();
        let err = LayoutConfig::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("palette_size"));
    }

    #[test]
    fn test_load_from_roundtrips_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        fs::write(&path, r#"{"palette_size": 5, "expansion_height": 120.0}"#).unwrap();
        let config = LayoutConfig::load_from(&path).unwrap();
        assert_eq!(config.layout_options().palette_size, 5);
        assert_eq!(config.expansion_height, 120.0);
    }
}
