//! Engine configuration loading.
//!
//! Provides format detection (RON/JSON/TOML), file discovery and
//! deserialization, then converts the file schema into a validated
//! [`EngineConfig`].

use gridwire_core::config::{ConfigError, EngineConfig};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::schema::EngineData;

/// Base name of the engine configuration file inside a data directory.
pub const ENGINE_FILE: &str = "engine";

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A value cannot be represented in the engine's fixed-point format.
    #[error("{field} = {value} is out of fixed-point range")]
    OutOfRange { field: &'static str, value: f64 },

    /// The values parsed but break an engine invariant.
    #[error(transparent)]
    Invalid(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name.
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// more than one format exists for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

// ===========================================================================
// Entry points
// ===========================================================================

/// Load and validate an engine configuration file.
///
/// Fields missing from the file keep their default values.
pub fn load_engine_config(path: &Path) -> Result<EngineConfig, DataLoadError> {
    let data: EngineData = deserialize_file(path)?;
    let config = data.to_config()?;
    debug!(path = %path.display(), seed = config.seed, "loaded engine config");
    Ok(config)
}

/// Load `engine.{ron,toml,json}` from a data directory.
pub fn load_engine_config_from_dir(dir: &Path) -> Result<EngineConfig, DataLoadError> {
    let path = require_data_file(dir, ENGINE_FILE)?;
    load_engine_config(&path)
}

// ===========================================================================
// Tests
// ===========================================================================
