use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::info;

pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod forge;
pub mod guard;
pub mod http;
pub mod studio;
pub mod transport;
pub mod voice;

pub use config::{load_settings, ClientSettings};
pub use error::{PipelineError, PipelineResult};
pub use events::PipelineEvent;
pub use export::DownloadExporter;
pub use forge::{ForgeDefaults, ForgePhase, ForgePipeline, ForgeSession, ForgeStatus};
pub use studio::{PipelineSession, StudioPhase, StudioPipeline, StudioStatus};
pub use voice::{VoiceClip, VoiceRequest, VoiceSynthesizer};

use backend::{AnalysisStreamConnector, ForgeApi, NarratorRegistry, ProjectCatalog, SpeechApi};
use http::HttpBackend;
use transport::WsAnalysisConnector;

/// Why an operation did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    EmptyInput,
    InFlight,
    WrongPhase,
    MissingAsset,
    UnknownNarrator,
}

/// Outcome of a user operation whose preconditions may turn it into a no-op.
/// An ignored call never touches session state.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Dispatched,
    Ignored(Precondition),
}

impl Dispatch {
    pub fn is_dispatched(self) -> bool {
        matches!(self, Dispatch::Dispatched)
    }
}

/// Collaborators the controllers talk to.
#[derive(Clone)]
pub struct StudioDependencies {
    pub analysis: Arc<dyn AnalysisStreamConnector>,
    pub catalog: Arc<dyn ProjectCatalog>,
    pub narrators: Arc<dyn NarratorRegistry>,
    pub speech: Arc<dyn SpeechApi>,
    pub forge: Arc<dyn ForgeApi>,
}

/// The three independent flows behind a single event stream.
pub struct StudioClient {
    pub studio: Arc<StudioPipeline>,
    pub forge: Arc<ForgePipeline>,
    pub voice: Arc<VoiceSynthesizer>,
    pub exporter: Arc<DownloadExporter>,
    events: broadcast::Sender<PipelineEvent>,
}

impl StudioClient {
    /// Wires every flow to the HTTP and websocket backend described by
    /// `settings`.
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        let base = settings.api_base()?;
        let backend = HttpBackend::new(base, settings.request_timeout())
            .context("failed to build http client")?;
        let ws_url = settings.analysis_ws_url()?;
        info!(api = %backend.base_url(), %ws_url, "studio client configured");

        let shared = Arc::new(backend.clone());
        let dependencies = StudioDependencies {
            analysis: Arc::new(WsAnalysisConnector::new(ws_url)),
            catalog: shared.clone(),
            narrators: shared.clone(),
            speech: shared.clone(),
            forge: shared,
        };
        let exporter = DownloadExporter::new(backend, settings.download_dir.clone());
        Ok(Self::new_with_dependencies(dependencies, exporter, settings))
    }

    pub fn new_with_dependencies(
        dependencies: StudioDependencies,
        exporter: DownloadExporter,
        settings: &ClientSettings,
    ) -> Self {
        let events = events::event_channel();
        let defaults = ForgeDefaults {
            narrator_id: settings.default_narrator_id.clone(),
            music_genre: settings.default_music_genre.clone(),
        };
        Self {
            studio: StudioPipeline::new(
                dependencies.analysis,
                dependencies.catalog,
                events.clone(),
            ),
            forge: Arc::new(ForgePipeline::new(
                dependencies.forge,
                dependencies.narrators,
                defaults,
                events.clone(),
            )),
            voice: Arc::new(VoiceSynthesizer::new(dependencies.speech, events.clone())),
            exporter: Arc::new(exporter),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/fakes.rs"]
mod fakes;

#[cfg(test)]
#[path = "tests/client_tests.rs"]
mod tests;
