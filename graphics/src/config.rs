//! Configuration files.
//!
//! Anything implementing [`Config`] loads from and saves to `.ron` or
//! `.toml` files, picked by extension.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backend::{BackendKind, CapabilityProfile};
use crate::procedure::ProcedureDescriptor;
use crate::types::TextureFormat;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match extension(path) {
            Some("toml") => Self::from_toml_str(&contents),
            Some("ron") => Self::from_ron_str(&contents),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match extension(path) {
            Some("toml") => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            Some("ron") => ron::ser::to_string_pretty(self, Default::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn from_ron_str(s: &str) -> Result<Self, ConfigError> {
        ron::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// How to create a [`RenderDevice`](crate::device::RenderDevice).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub backend: BackendKind,
    /// Capabilities the null backend reports.
    pub profile: CapabilityProfile,
    pub width: u32,
    pub height: u32,
    pub color_format: TextureFormat,
    pub depth_format: Option<TextureFormat>,
    /// Null backend render target memory limit in bytes.
    pub memory_budget: Option<u64>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Null,
            profile: CapabilityProfile::Modern,
            width: 1280,
            height: 720,
            color_format: TextureFormat::Bgra8Unorm,
            depth_format: Some(TextureFormat::Depth24PlusStencil8),
            memory_budget: None,
        }
    }
}

impl Config for DeviceConfig {}

impl Config for ProcedureDescriptor {}
