use std::sync::Arc;

use chrono::Utc;
use secrecy::SecretString;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::extract::Extractor;
use crate::gateway::{
    ContentSink, DescriptionGateway, DescriptionRequest, GatewayError, MetadataGateway,
    PromptAuthority, PublishRecord, TranscriptGateway, TranscriptRequest, VendorClient,
};
use crate::worker::job::{DescriptionOutput, JobMetadata, Stage, TranscriptOutcome};
use crate::worker::{JobStore, StoreError};

use super::config::PipelineSettings;
use super::context::PipelineContext;
use super::error::StageError;
use super::progress::{ProgressEvent, ProgressObserver};
use super::prompt::{apply_placeholders, build_generation_input, truncate_transcript, PromptResolver};

/// Remote collaborators used by the stages.
#[derive(Clone)]
pub struct Gateways {
    pub metadata: Arc<dyn MetadataGateway>,
    pub transcript: Arc<dyn TranscriptGateway>,
    pub description: Arc<dyn DescriptionGateway>,
    pub personalized_prompt: Option<Arc<dyn PromptAuthority>>,
    pub legacy_prompt: Option<Arc<dyn PromptAuthority>>,
    pub sink: Arc<dyn ContentSink>,
}

impl Gateways {
    /// Wires every remote stage to the vendor client. The personalized
    /// prompt is only consulted when a prompt license key is configured.
    pub fn from_vendor(
        client: VendorClient,
        prompt_license: Option<SecretString>,
        sink: Arc<dyn ContentSink>,
    ) -> Self {
        let personalized = prompt_license
            .map(|key| Arc::new(client.with_license(key)) as Arc<dyn PromptAuthority>);
        let client = Arc::new(client);
        Self {
            metadata: client.clone(),
            transcript: client.clone(),
            description: client.clone(),
            personalized_prompt: personalized,
            legacy_prompt: Some(client),
            sink,
        }
    }
}

/// How a stage that did not fail wants the run to proceed.
enum StageFlow {
    Continue,
    Skip(String),
}

/// Terminal result of one pipeline run.
#[derive(Debug)]
pub enum PipelineOutcome {
    Completed {
        metadata: JobMetadata,
    },
    Skipped {
        reason: String,
        metadata: JobMetadata,
    },
    Failed {
        stage: Stage,
        error: StageError,
        metadata: JobMetadata,
    },
}

impl PipelineOutcome {
    pub fn metadata(&self) -> &JobMetadata {
        match self {
            PipelineOutcome::Completed { metadata }
            | PipelineOutcome::Skipped { metadata, .. }
            | PipelineOutcome::Failed { metadata, .. } => metadata,
        }
    }
}

pub struct Pipeline {
    settings: Arc<PipelineSettings>,
    gateways: Gateways,
    store: JobStore,
    prompts: PromptResolver,
    extractor: Extractor,
}

impl Pipeline {
    pub fn new(settings: Arc<PipelineSettings>, gateways: Gateways, store: JobStore) -> Self {
        let prompts = PromptResolver::new(
            gateways.personalized_prompt.clone(),
            gateways.legacy_prompt.clone(),
            settings.local_prompt.clone(),
        );
        Self {
            settings,
            gateways,
            store,
            prompts,
            extractor: Extractor::new(),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Runs every stage not yet checkpointed on the job.
    ///
    /// Each completed stage is persisted before the next one starts, so an
    /// interrupted or failed run resumes where it stopped.
    pub async fn run(
        &self,
        ctx: PipelineContext,
        progress: &dyn ProgressObserver,
    ) -> PipelineOutcome {
        let span = info_span!("pipeline",
            job_id = %ctx.job.id,
            video_id = %ctx.job.video_id,
            source = %ctx.job.source_kind,
            attempt = ctx.job.attempts,
        );
        self.run_stages(ctx, progress).instrument(span).await
    }

    async fn run_stages(
        &self,
        mut ctx: PipelineContext,
        progress: &dyn ProgressObserver,
    ) -> PipelineOutcome {
        for stage in Stage::ALL {
            if ctx.metadata.is_completed(stage) {
                debug!("Stage {} already completed, resuming", stage);
                progress.report(ProgressEvent::StageResumed { stage });
                continue;
            }

            progress.report(ProgressEvent::StageStarted { stage });
            let span = info_span!("stage", stage = %stage);
            let result = match stage {
                Stage::Metadata => self.step_metadata(&mut ctx).instrument(span).await,
                Stage::DurationGate => span.in_scope(|| self.step_duration_gate(&ctx)),
                Stage::Transcript => self.step_transcript(&mut ctx).instrument(span).await,
                Stage::Description => self.step_description(&mut ctx).instrument(span).await,
                Stage::Extraction => span.in_scope(|| self.step_extraction(&mut ctx)),
                Stage::Publish => self.step_publish(&mut ctx).instrument(span).await,
            };

            match result {
                Ok(StageFlow::Continue) => {
                    ctx.metadata.mark_completed(stage);
                    if let Err(source) = self.checkpoint(&ctx) {
                        let error = StageError::Store { stage, source };
                        return self.fail(ctx, stage, error, progress);
                    }
                    progress.report(ProgressEvent::StageCompleted { stage });
                }
                Ok(StageFlow::Skip(reason)) => {
                    info!("Job {} skipped at {}: {}", ctx.job.id, stage, reason);
                    progress.report(ProgressEvent::Skipped {
                        reason: reason.clone(),
                    });
                    ctx.metadata.skip_reason = Some(reason.clone());
                    return PipelineOutcome::Skipped {
                        reason,
                        metadata: ctx.metadata,
                    };
                }
                Err(error) => return self.fail(ctx, stage, error, progress),
            }
        }

        progress.report(ProgressEvent::Completed);
        PipelineOutcome::Completed {
            metadata: ctx.metadata,
        }
    }

    fn checkpoint(&self, ctx: &PipelineContext) -> Result<(), StoreError> {
        self.store.checkpoint(&ctx.claim()?, &ctx.metadata)
    }

    fn fail(
        &self,
        ctx: PipelineContext,
        stage: Stage,
        error: StageError,
        progress: &dyn ProgressObserver,
    ) -> PipelineOutcome {
        warn!(
            reason = error.reason_code(),
            "Job {} failed at {}: {}",
            ctx.job.id,
            stage,
            error
        );
        progress.report(ProgressEvent::Failed {
            stage,
            error: error.to_string(),
        });
        PipelineOutcome::Failed {
            stage,
            error,
            metadata: ctx.metadata,
        }
    }

    async fn step_metadata(&self, ctx: &mut PipelineContext) -> Result<StageFlow, StageError> {
        let kind = ctx.job.source_kind;
        let mut video = self
            .gateways
            .metadata
            .fetch_video(kind, &ctx.job.video_id)
            .await
            .map_err(|e| StageError::gateway(Stage::Metadata, e))?;

        if video.thumbnail_url.is_none() {
            video.thumbnail_url = kind.derived_thumbnail_url(&ctx.job.video_id);
        }

        debug!(
            "Fetched \"{}\" ({}s, {} views)",
            video.title, video.duration_seconds, video.view_count
        );
        ctx.metadata.video = Some(video);
        Ok(StageFlow::Continue)
    }

    fn step_duration_gate(&self, ctx: &PipelineContext) -> Result<StageFlow, StageError> {
        let video = ctx.metadata.video.as_ref().ok_or(StageError::MissingInput {
            stage: Stage::DurationGate,
            requires: Stage::Metadata,
        })?;
        let seconds = video.duration_seconds;

        if seconds == 0 {
            if self.settings.skip_premieres {
                return Ok(StageFlow::Skip(
                    "duration unavailable: scheduled premiere or live stream".to_string(),
                ));
            }
            return Ok(StageFlow::Continue);
        }

        match self.settings.min_duration_secs {
            Some(min) if seconds < min => Ok(StageFlow::Skip(format!(
                "duration {}s is below the minimum of {}s",
                seconds, min
            ))),
            _ => Ok(StageFlow::Continue),
        }
    }

    async fn step_transcript(&self, ctx: &mut PipelineContext) -> Result<StageFlow, StageError> {
        let request = TranscriptRequest {
            video_id: ctx.job.video_id.clone(),
            mode: self.settings.transcript_mode,
            lang: self.settings.transcript_language.clone(),
        };

        let outcome = match self.gateways.transcript.fetch_transcript(&request).await {
            Ok(Some(text)) if !text.trim().is_empty() => {
                ctx.claim()
                    .and_then(|claim| self.store.save_transcript(&claim, &ctx.job.video_id, &text))
                    .map_err(|source| StageError::Store {
                        stage: Stage::Transcript,
                        source,
                    })?;
                let chars = text.chars().count();
                ctx.transcript = Some(text);
                TranscriptOutcome::Available { chars }
            }
            Ok(_) => TranscriptOutcome::Unavailable {
                reason: "no transcript available".to_string(),
            },
            Err(GatewayError::NotFound { message, .. }) => {
                TranscriptOutcome::Unavailable { reason: message }
            }
            Err(e) => return Err(StageError::gateway(Stage::Transcript, e)),
        };

        if let TranscriptOutcome::Unavailable { reason } = &outcome {
            info!("No transcript for {}: {}", ctx.job.video_id, reason);
        }
        ctx.metadata.transcript = Some(outcome);
        Ok(StageFlow::Continue)
    }

    /// Loads the transcript text of a job resumed after the transcript stage.
    fn transcript_text(&self, ctx: &mut PipelineContext) -> Result<Option<String>, StageError> {
        if ctx.transcript.is_none() {
            ctx.transcript = self
                .store
                .transcript(ctx.job.id)
                .map_err(|source| StageError::Store {
                    stage: Stage::Description,
                    source,
                })?;
        }
        Ok(ctx.transcript.clone())
    }

    async fn step_description(&self, ctx: &mut PipelineContext) -> Result<StageFlow, StageError> {
        let available = ctx
            .metadata
            .transcript
            .as_ref()
            .is_some_and(TranscriptOutcome::is_available);
        if !available {
            debug!("No transcript, description generation skipped");
            return Ok(StageFlow::Continue);
        }

        let Some(transcript) = self.transcript_text(ctx)? else {
            // Fetch it again on the next attempt.
            ctx.metadata.completed_stages.retain(|s| *s != Stage::Transcript);
            return Err(StageError::MissingTranscript);
        };

        let video = ctx.metadata.video.clone().ok_or(StageError::MissingInput {
            stage: Stage::Description,
            requires: Stage::Metadata,
        })?;

        let prompt = self.prompts.resolve().await;
        let prompt_text = apply_placeholders(&prompt.text, &self.settings.channel);
        let request = DescriptionRequest {
            transcript: truncate_transcript(&transcript).to_string(),
            title: video.title.clone(),
            custom_prompt: build_generation_input(&prompt_text, &video, &transcript),
        };

        let text = self
            .gateways
            .description
            .generate_description(&request)
            .await
            .map_err(|e| StageError::gateway(Stage::Description, e))?;

        info!(
            "Generated description ({} chars, {} prompt)",
            text.chars().count(),
            prompt.source
        );
        ctx.metadata.description = Some(DescriptionOutput {
            text,
            prompt_source: prompt.source,
            generated_at: Utc::now(),
        });
        Ok(StageFlow::Continue)
    }

    fn step_extraction(&self, ctx: &mut PipelineContext) -> Result<StageFlow, StageError> {
        let Some(description) = ctx.metadata.description.as_ref() else {
            debug!("No description, extraction skipped");
            return Ok(StageFlow::Continue);
        };

        // Speakers are only grounded against the transcript when it is still
        // at hand; a missing one yields fewer speakers, never an error.
        let transcript = match &ctx.transcript {
            Some(text) => text.clone(),
            None => self
                .store
                .transcript(ctx.job.id)
                .unwrap_or_else(|e| {
                    warn!("Transcript lookup failed during extraction: {}", e);
                    None
                })
                .unwrap_or_default(),
        };

        let toggles = ctx.metadata.extraction.resolve(self.settings.extraction);
        let entities = self
            .extractor
            .extract(&description.text, ctx.title(), &transcript, toggles);
        ctx.metadata.entities = Some(entities);
        Ok(StageFlow::Continue)
    }

    async fn step_publish(&self, ctx: &mut PipelineContext) -> Result<StageFlow, StageError> {
        let record = PublishRecord::from_job(&ctx.job, &ctx.metadata).ok_or(
            StageError::MissingInput {
                stage: Stage::Publish,
                requires: Stage::Metadata,
            },
        )?;

        let receipt = self.gateways.sink.publish(&record).await?;
        info!("Published as {}", receipt.post_id);
        ctx.metadata.publish = Some(receipt);
        Ok(StageFlow::Continue)
    }
}
