//! Error types for loading, extraction and matching.
//!
//! Every failure the library can produce is a value of one of these enums. Nothing in the
//! library terminates the process; the binary decides how to report them.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum SiftError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to load image: {0}")]
    Load(#[from] LoadError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("feature error: {0}")]
    Feature(#[from] FeatureError),

    #[error("output error: {0}")]
    Output(#[from] OutputError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A numeric parameter is outside the range the pipeline can work with.
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: &'static str, message: String },

    /// A mode selector did not name a known mode.
    #[error("unknown {kind} '{value}', expected one of: {expected}")]
    UnknownMode {
        kind: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("input file {0} does not exist")]
    NotFound(PathBuf),

    #[error("input file {0} is not a regular file, nothing to do")]
    NotRegularFile(PathBuf),

    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("malformed PGM file {path}: {message}")]
    Pgm { path: PathBuf, message: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The engine was torn down before this call.
    #[error("the engine has been torn down")]
    TornDown,

    /// The worker processing a job went away without producing a result.
    #[error("worker for job {0} exited without a result")]
    WorkerLost(u64),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeatureError {
    #[error("feature collection has been released")]
    Released,

    #[error("feature collection was already released")]
    AlreadyReleased,

    /// Matching needs both collections to come from an engine in matching mode.
    #[error("feature collection was produced in extraction mode and cannot be matched")]
    NotMatchable,
}

#[derive(Error, Debug)]
#[error("failed to write {path}: {source}")]
pub struct OutputError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

pub type Result<T> = std::result::Result<T, SiftError>;
