//! Format-agnostic configuration loading

use crate::{Error, NormalizedPath, Result, io};
use serde::de::DeserializeOwned;

/// Format-agnostic configuration store.
///
/// Detects the format from the file extension: `.toml`, `.json`,
/// `.yaml`/`.yml`.
#[derive(Debug, Default)]
pub struct ConfigStore;

impl ConfigStore {
    pub fn new() -> Self {
        Self
    }

    /// Load configuration from a file.
    pub fn load<T: DeserializeOwned>(&self, path: &NormalizedPath) -> Result<T> {
        let content = io::read_text(path)?;
        self.parse(path, &content)
    }

    /// Load configuration, falling back to `T::default()` when the file
    /// does not exist. A file that exists but fails to parse is an error.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, path: &NormalizedPath) -> Result<T> {
        if !path.exists() {
            return Ok(T::default());
        }
        self.load(path)
    }

    fn parse<T: DeserializeOwned>(&self, path: &NormalizedPath, content: &str) -> Result<T> {
        let extension = path.extension().unwrap_or("");
        let parse_error = |format: &str, message: String| Error::ConfigParse {
            path: path.to_native(),
            format: format.into(),
            message,
        };

        match extension.to_lowercase().as_str() {
            "toml" => toml::from_str(content).map_err(|e| parse_error("TOML", e.to_string())),
            "json" => {
                serde_json::from_str(content).map_err(|e| parse_error("JSON", e.to_string()))
            }
            "yaml" | "yml" => {
                serde_yaml::from_str(content).map_err(|e| parse_error("YAML", e.to_string()))
            }
            _ => Err(Error::UnsupportedFormat {
                extension: extension.to_string(),
            }),
        }
    }
}
