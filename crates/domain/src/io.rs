use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::{config::EngineConfig, drill::Drill, error::DomainError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Guess the format from a file extension, defaulting to JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => DocumentFormat::Yaml,
            _ => DocumentFormat::Json,
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, DomainError> {
        match self {
            DocumentFormat::Json => serde_json::from_slice(bytes)
                .map_err(|err| DomainError::Serialization(err.to_string())),
            DocumentFormat::Yaml => serde_yaml::from_slice(bytes)
                .map_err(|err| DomainError::Serialization(err.to_string())),
        }
    }

    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, DomainError> {
        match self {
            DocumentFormat::Json => serde_json::to_vec_pretty(value)
                .map_err(|err| DomainError::Serialization(err.to_string())),
            DocumentFormat::Yaml => serde_yaml::to_string(value)
                .map(String::into_bytes)
                .map_err(|err| DomainError::Serialization(err.to_string())),
        }
    }
}

/// Decode and validate a drill definition.
pub fn load_drill(bytes: &[u8], format: DocumentFormat) -> Result<Drill, DomainError> {
    let drill: Drill = format.decode(bytes)?;
    drill.validate()?;
    Ok(drill)
}

pub fn load_config(bytes: &[u8], format: DocumentFormat) -> Result<EngineConfig, DomainError> {
    let config: EngineConfig = format.decode(bytes)?;
    config.validate()?;
    Ok(config)
}
