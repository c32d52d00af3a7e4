//! Crate-level error types.

use std::path::PathBuf;
use thiserror::Error;

pub use crate::gateway::GatewayError;
pub use crate::pipeline::StageError;
pub use crate::worker::StoreError;

/// Anything a [`crate::service::VideoQueue`] verb can fail with.
#[derive(Error, Debug)]
pub enum VidpipeError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("queue: {0}")]
    Store(#[from] StoreError),

    #[error("gateway: {0}")]
    Gateway(#[from] GatewayError),

    #[error("pipeline: {0}")]
    Stage(#[from] StageError),

    #[error("output files: {0}")]
    Storage(#[from] StorageError),

    #[error("database: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("source: {0}")]
    Source(#[from] crate::source::SourceError),

    #[error("secret: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("rendering output: {0}")]
    Output(String),

    #[error("logging setup: {0}")]
    Telemetry(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not valid JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("{message}")]
    Validation { message: String },

    #[error("does not match schema: {errors}")]
    SchemaValidation { errors: String },
}

/// Failures of the file-backed content sink.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("cannot create {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("record does not serialize: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VidpipeError>;
