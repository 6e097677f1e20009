//! Events published to the presentation layer.

use shared::domain::{Narrator, ProjectSummary};
use tokio::sync::broadcast;

use crate::{forge::ForgeSession, studio::PipelineSession};

const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    StudioChanged(PipelineSession),
    ForgeChanged(ForgeSession),
    VoiceReady { url: String, filename: String },
    ProjectsRefreshed(Vec<ProjectSummary>),
    NarratorsLoaded(Vec<Narrator>),
    /// Transient inline notification; never changes a session phase.
    Notice(String),
    Error(String),
}

pub fn event_channel() -> broadcast::Sender<PipelineEvent> {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    events
}
