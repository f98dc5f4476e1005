use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Input required: {0}")]
    MissingInput(String),

    #[error("Endpoint '{endpoint}' has no URL configured")]
    MissingEndpointUrl { endpoint: String },

    #[error("Endpoint '{endpoint}' has no authorization parameters")]
    MissingEndpointAuth { endpoint: String },

    #[error("No file matched pattern '{pattern}' for input '{input}'")]
    NoMatchingFile { input: String, pattern: String },

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Failed to read inputs file {path}: {source}")]
    InputsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse inputs file {path}: {source}")]
    InputsFileParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
