use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while configuring an experiment. Any of these stops the
/// setup before a single run is assembled.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("resource entry must have 1 to 4 fields, got {0}")]
    ResourceArity(usize),

    #[error("resource entry field '{field}' is invalid: {reason}")]
    ResourceField { field: &'static str, reason: String },

    #[error("resource names must be unique within algorithm '{algorithm}': {name}")]
    DuplicateResource { algorithm: String, name: String },

    #[error("resource destinations must be unique within algorithm '{algorithm}': {destination}")]
    DuplicateDestination {
        algorithm: String,
        destination: String,
    },

    #[error("algorithm name must be a non-empty string: {0}")]
    InvalidAlgorithmName(String),

    #[error("algorithm names must be unique: {0}")]
    DuplicateAlgorithm(String),

    #[error("no domain file found for {domain}:{problem} in {}", dir.display())]
    MissingDomainFile {
        domain: String,
        problem: String,
        dir: PathBuf,
    },

    #[error("invalid experiment file: {0}")]
    Experiment(String),
}
