use thiserror::Error;

use crate::gateway::{GatewayError, PublishError};
use crate::worker::job::Stage;
use crate::worker::StoreError;

/// Whether a failed job should be attempted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Transient,
    Permanent,
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error("{stage} failed: {source}")]
    Gateway {
        stage: Stage,
        #[source]
        source: GatewayError,
    },

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),

    #[error("{stage} failed to persist: {source}")]
    Store {
        stage: Stage,
        #[source]
        source: StoreError,
    },

    /// A checkpointed transcript is no longer stored; it will be fetched again.
    #[error("transcript text missing for checkpointed job")]
    MissingTranscript,

    /// A stage ran without the output of the stage it depends on.
    #[error("{stage} requires {requires}, which has not run")]
    MissingInput { stage: Stage, requires: Stage },

    #[error("job panicked: {0}")]
    Panic(String),
}

impl StageError {
    pub fn gateway(stage: Stage, source: GatewayError) -> Self {
        StageError::Gateway { stage, source }
    }

    pub fn class(&self) -> FailureClass {
        let transient = match self {
            StageError::Gateway { source, .. } => source.is_retryable(),
            StageError::Publish(e) => e.retryable,
            StageError::Store { .. } | StageError::MissingTranscript => true,
            StageError::MissingInput { .. } | StageError::Panic(_) => false,
        };
        if transient {
            FailureClass::Transient
        } else {
            FailureClass::Permanent
        }
    }

    /// Short machine-readable cause, used in logs.
    pub fn reason_code(&self) -> &'static str {
        match self {
            StageError::Gateway { source, .. } => match source {
                GatewayError::MissingLicense => "missing_license",
                GatewayError::Unauthorized { .. } => "unauthorized",
                GatewayError::Status { .. } | GatewayError::NotFound { .. } => "http_status",
                GatewayError::Transport { .. } | GatewayError::Timeout { .. } => "network",
                GatewayError::CircuitOpen { .. } => "circuit_open",
                GatewayError::Decode { .. } => "decode",
            },
            StageError::Publish(_) => "publish",
            StageError::Store { .. } => "store",
            StageError::MissingTranscript => "missing_transcript",
            StageError::MissingInput { .. } => "missing_input",
            StageError::Panic(_) => "panic",
        }
    }
}
