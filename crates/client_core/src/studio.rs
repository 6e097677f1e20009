//! Studio flow: analyze a source video into a localized studio package over
//! the streaming analysis channel.

use std::sync::Arc;

use futures::StreamExt;
use shared::{
    domain::{LanguageCode, ProjectId, ProjectSummary, Tone},
    protocol::{StudioArtifact, StudioJobRequest, StudioUpdate},
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    backend::{AnalysisStreamConnector, ProjectCatalog},
    error::{PipelineError, PipelineResult, CONNECTION_LOST},
    events::PipelineEvent,
    Dispatch, Precondition,
};

const STARTING_MESSAGE: &str = "Igniting studio engine...";
const RETRIEVING_MESSAGE: &str = "Retrieving project...";
const LOADED_MESSAGE: &str = "Loaded from project catalog";
const UNSPECIFIED_FAILURE: &str = "analysis failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudioStatus {
    Idle,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Clone, Default)]
pub enum StudioPhase {
    #[default]
    Idle,
    Processing,
    Completed(Arc<StudioArtifact>),
    Failed,
}

#[derive(Debug, Clone)]
pub struct PipelineSession {
    pub url: String,
    pub target_duration_minutes: u32,
    pub target_language: LanguageCode,
    pub tone: Tone,
    /// Last progress value received, as sent by the server.
    pub progress: u8,
    pub message: String,
    pub phase: StudioPhase,
}

impl Default for PipelineSession {
    fn default() -> Self {
        Self {
            url: String::new(),
            target_duration_minutes: 5,
            target_language: LanguageCode::new("am"),
            tone: Tone::Neutral,
            progress: 0,
            message: String::new(),
            phase: StudioPhase::Idle,
        }
    }
}

impl PipelineSession {
    pub fn status(&self) -> StudioStatus {
        match self.phase {
            StudioPhase::Idle => StudioStatus::Idle,
            StudioPhase::Processing => StudioStatus::Processing,
            StudioPhase::Completed(_) => StudioStatus::Completed,
            StudioPhase::Failed => StudioStatus::Error,
        }
    }

    pub fn artifact(&self) -> Option<&StudioArtifact> {
        match &self.phase {
            StudioPhase::Completed(artifact) => Some(artifact.as_ref()),
            _ => None,
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.phase, StudioPhase::Processing)
    }
}

fn clamp_progress(progress: f64) -> u8 {
    if progress.is_nan() {
        return 0;
    }
    progress.round().clamp(0.0, 100.0) as u8
}

struct Subscription {
    generation: u64,
    task: JoinHandle<()>,
}

struct StudioState {
    session: PipelineSession,
    generation: u64,
    subscription: Option<Subscription>,
}

impl StudioState {
    /// Invalidates whatever job is attached to the session and returns the
    /// new generation token.
    fn supersede(&mut self) -> u64 {
        self.generation += 1;
        if let Some(previous) = self.subscription.take() {
            info!(
                generation = previous.generation,
                "studio: abandoning previous analysis subscription"
            );
            previous.task.abort();
        }
        self.generation
    }
}

enum Applied {
    Continue,
    Finished,
}

pub struct StudioPipeline {
    connector: Arc<dyn AnalysisStreamConnector>,
    catalog: Arc<dyn ProjectCatalog>,
    inner: Mutex<StudioState>,
    events: broadcast::Sender<PipelineEvent>,
}

impl StudioPipeline {
    pub fn new(
        connector: Arc<dyn AnalysisStreamConnector>,
        catalog: Arc<dyn ProjectCatalog>,
        events: broadcast::Sender<PipelineEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            connector,
            catalog,
            inner: Mutex::new(StudioState {
                session: PipelineSession::default(),
                generation: 0,
                subscription: None,
            }),
            events,
        })
    }

    pub async fn snapshot(&self) -> PipelineSession {
        self.inner.lock().await.session.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    fn publish(&self, session: &PipelineSession) {
        let _ = self
            .events
            .send(PipelineEvent::StudioChanged(session.clone()));
    }

    /// Starts a new analysis job. Returns immediately; updates are applied by
    /// a background subscription task.
    pub async fn start(self: &Arc<Self>, request: StudioJobRequest) -> Dispatch {
        if request.url.trim().is_empty() {
            debug!("studio: start ignored, empty url");
            return Dispatch::Ignored(Precondition::EmptyInput);
        }

        let mut guard = self.inner.lock().await;
        if guard.session.is_processing() {
            debug!("studio: start ignored, a job is already processing");
            return Dispatch::Ignored(Precondition::InFlight);
        }

        let generation = guard.supersede();
        let session = &mut guard.session;
        session.url = request.url.clone();
        session.target_duration_minutes = request.duration_minutes;
        session.target_language = request.language.clone();
        session.tone = request.tone;
        session.phase = StudioPhase::Processing;
        session.progress = 0;
        session.message = STARTING_MESSAGE.to_string();
        self.publish(&guard.session);

        info!(
            generation,
            url = %request.url,
            duration_minutes = request.duration_minutes,
            language = %request.language,
            "studio: analysis started"
        );

        let pipeline = Arc::clone(self);
        let task = tokio::spawn(async move { pipeline.run_job(generation, request).await });
        guard.subscription = Some(Subscription { generation, task });
        Dispatch::Dispatched
    }

    async fn run_job(self: Arc<Self>, generation: u64, request: StudioJobRequest) {
        let mut updates = match self.connector.open(request).await {
            Ok(updates) => updates,
            Err(err) => {
                warn!(generation, error = %err, "studio: analysis channel failed to open");
                self.fail(generation, err.display_message()).await;
                return;
            }
        };

        while let Some(next) = updates.next().await {
            match next {
                Ok(update) => {
                    if let Applied::Finished = self.apply_update(generation, update).await {
                        return;
                    }
                }
                Err(err) => {
                    warn!(generation, error = %err, "studio: analysis channel failed");
                    self.fail(generation, err.display_message()).await;
                    return;
                }
            }
        }

        warn!(generation, "studio: analysis channel ended before a terminal message");
        self.fail(generation, CONNECTION_LOST.to_string()).await;
    }

    async fn apply_update(&self, generation: u64, update: StudioUpdate) -> Applied {
        let mut guard = self.inner.lock().await;
        if guard.generation != generation || !guard.session.is_processing() {
            debug!(generation, "studio: dropping update from a superseded subscription");
            return Applied::Finished;
        }

        let applied = match update {
            StudioUpdate::Processing { message, progress } => {
                guard.session.message = message;
                guard.session.progress = clamp_progress(progress);
                debug!(generation, progress = guard.session.progress, "studio: progress");
                Applied::Continue
            }
            StudioUpdate::Completed {
                message,
                studio_data,
            } => {
                info!(
                    generation,
                    target_lang = %studio_data.target_lang,
                    "studio: analysis completed"
                );
                guard.session.phase = StudioPhase::Completed(Arc::from(studio_data));
                guard.session.progress = 100;
                guard.session.message = message;
                guard.subscription = None;
                Applied::Finished
            }
            StudioUpdate::Error { message } => {
                let message = if message.is_empty() {
                    UNSPECIFIED_FAILURE.to_string()
                } else {
                    message
                };
                warn!(generation, %message, "studio: server reported failure");
                guard.session.phase = StudioPhase::Failed;
                guard.session.message = message.clone();
                guard.subscription = None;
                let _ = self.events.send(PipelineEvent::Error(message));
                Applied::Finished
            }
        };
        self.publish(&guard.session);
        let completed = matches!(guard.session.phase, StudioPhase::Completed(_));
        drop(guard);

        if completed {
            if let Err(err) = self.refresh_projects().await {
                warn!(error = %err, "studio: project catalog refresh failed");
            }
        }
        applied
    }

    async fn fail(&self, generation: u64, message: String) {
        let mut guard = self.inner.lock().await;
        if guard.generation != generation || !guard.session.is_processing() {
            return;
        }
        guard.session.phase = StudioPhase::Failed;
        guard.session.message = message.clone();
        guard.subscription = None;
        self.publish(&guard.session);
        let _ = self.events.send(PipelineEvent::Error(message));
    }

    pub async fn refresh_projects(&self) -> PipelineResult<Vec<ProjectSummary>> {
        let projects = self.catalog.list_projects().await?;
        let _ = self
            .events
            .send(PipelineEvent::ProjectsRefreshed(projects.clone()));
        Ok(projects)
    }

    /// Replaces the session with a stored project from the catalog.
    pub async fn load_project(&self, id: &ProjectId) -> PipelineResult<Dispatch> {
        let generation = {
            let mut guard = self.inner.lock().await;
            if guard.session.is_processing() {
                debug!(project_id = %id, "studio: load ignored, a job is already processing");
                return Ok(Dispatch::Ignored(Precondition::InFlight));
            }
            let generation = guard.supersede();
            guard.session.phase = StudioPhase::Processing;
            guard.session.progress = 0;
            guard.session.message = RETRIEVING_MESSAGE.to_string();
            self.publish(&guard.session);
            generation
        };

        let fetched = self
            .catalog
            .fetch_project(id)
            .await
            .and_then(|artifact| {
                if artifact.studio_script.is_empty() {
                    Err(PipelineError::Server("project not found".into()))
                } else {
                    Ok(artifact)
                }
            });

        let mut guard = self.inner.lock().await;
        if guard.generation != generation {
            debug!(project_id = %id, "studio: discarding superseded project load");
            return Ok(Dispatch::Dispatched);
        }
        match fetched {
            Ok(artifact) => {
                info!(project_id = %id, "studio: project loaded");
                if !artifact.target_lang.is_empty() {
                    guard.session.target_language = LanguageCode::new(artifact.target_lang.as_str());
                }
                guard.session.phase = StudioPhase::Completed(Arc::new(artifact));
                guard.session.progress = 100;
                guard.session.message = LOADED_MESSAGE.to_string();
                self.publish(&guard.session);
                Ok(Dispatch::Dispatched)
            }
            Err(err) => {
                warn!(project_id = %id, error = %err, "studio: project load failed");
                guard.session.phase = StudioPhase::Failed;
                guard.session.message = err.display_message();
                self.publish(&guard.session);
                let _ = self.events.send(PipelineEvent::Error(err.display_message()));
                Err(err)
            }
        }
    }

    /// Returns the session to idle, abandoning any attached job.
    pub async fn reset(&self) {
        let mut guard = self.inner.lock().await;
        guard.supersede();
        guard.session.phase = StudioPhase::Idle;
        guard.session.progress = 0;
        guard.session.message.clear();
        self.publish(&guard.session);
    }
}

#[cfg(test)]
#[path = "tests/studio_tests.rs"]
mod tests;
