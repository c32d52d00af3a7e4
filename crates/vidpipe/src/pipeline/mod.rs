pub mod config;
pub mod context;
pub mod duration;
pub mod error;
pub mod progress;
pub mod prompt;
pub mod runner;

pub use config::PipelineSettings;
pub use context::PipelineContext;
pub use error::{FailureClass, StageError};
pub use progress::{
    BroadcastProgress, DiscardProgress, JobProgress, ProgressEvent, ProgressObserver,
};
pub use prompt::{PromptResolver, ResolvedPrompt};
pub use runner::{Gateways, Pipeline, PipelineOutcome};
