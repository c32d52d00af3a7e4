pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod pipeline;
pub mod sanitize;
pub mod secrets;
pub mod service;
pub mod source;
pub mod storage;
pub mod telemetry;
pub mod worker;

pub use config::{load_config, Config};
pub use error::{ConfigError, Result, StorageError, VidpipeError};
pub use gateway::{GatewayError, VendorClient};
pub use pipeline::{Gateways, Pipeline, PipelineContext, PipelineOutcome, PipelineSettings};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use service::{ListFormat, VideoQueue};
pub use source::{detect, SourceKind};
pub use storage::FileSink;
pub use worker::{Job, JobId, JobStatus, JobStore, Runner, Scheduler, StoreError};
