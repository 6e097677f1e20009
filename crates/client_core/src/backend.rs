//! Collaborator seams between the controllers and the generation backend.

use async_trait::async_trait;
use futures::stream::BoxStream;
use shared::{
    domain::{Narrator, ProjectId, ProjectSummary},
    protocol::{
        ApproveRequest, CreativeScript, CreativeScriptRequest, ForgeAssets, RefineRequest,
        RefineResponse, RenderRequest, RenderResponse, StudioArtifact, StudioJobRequest,
        StudioUpdate, TtsRequest, TtsResponse,
    },
};

use crate::error::PipelineResult;

/// Updates of one analysis job in arrival order. Dropping the stream closes
/// the underlying channel.
pub type UpdateStream = BoxStream<'static, PipelineResult<StudioUpdate>>;

#[async_trait]
pub trait AnalysisStreamConnector: Send + Sync {
    /// Opens a fresh channel and sends the initiation frame.
    async fn open(&self, request: StudioJobRequest) -> PipelineResult<UpdateStream>;
}

#[async_trait]
pub trait ProjectCatalog: Send + Sync {
    async fn list_projects(&self) -> PipelineResult<Vec<ProjectSummary>>;
    async fn fetch_project(&self, id: &ProjectId) -> PipelineResult<StudioArtifact>;
}

#[async_trait]
pub trait NarratorRegistry: Send + Sync {
    async fn list_narrators(&self) -> PipelineResult<Vec<Narrator>>;
}

#[async_trait]
pub trait SpeechApi: Send + Sync {
    async fn generate_tts(&self, request: TtsRequest) -> PipelineResult<TtsResponse>;
}

#[async_trait]
pub trait ForgeApi: Send + Sync {
    async fn generate_creative_script(
        &self,
        request: CreativeScriptRequest,
    ) -> PipelineResult<CreativeScript>;
    async fn refine_script(&self, request: RefineRequest) -> PipelineResult<RefineResponse>;
    async fn approve_creative_project(
        &self,
        request: ApproveRequest,
    ) -> PipelineResult<ForgeAssets>;
    async fn generate_forge_video(&self, request: RenderRequest)
        -> PipelineResult<RenderResponse>;
}
