//! reqwest implementation of the REST collaborators.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{Narrator, ProjectId, ProjectSummary},
    error::ApiReply,
    protocol::{
        ApproveRequest, CreativeScript, CreativeScriptRequest, ForgeAssets, RefineRequest,
        RefineResponse, RenderRequest, RenderResponse, StudioArtifact, TtsRequest, TtsResponse,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    backend::{ForgeApi, NarratorRegistry, ProjectCatalog, SpeechApi},
    error::{PipelineError, PipelineResult},
};

#[derive(Clone)]
pub struct HttpBackend {
    http: Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(base: Url, timeout: Duration) -> PipelineResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> PipelineResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| PipelineError::Transport(format!("cannot-be-a-base url: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> PipelineResult<T> {
        let url = self.endpoint(segments)?;
        debug!(%url, "GET");
        let reply: ApiReply<T> = self
            .http
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        reply.into_result().map_err(|failure| {
            warn!(%url, error = %failure.error, "server reported failure");
            PipelineError::from(failure)
        })
    }

    async fn post_json<B, T>(&self, segments: &[&str], body: &B) -> PipelineResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        debug!(%url, "POST");
        let reply: ApiReply<T> = self
            .http
            .post(url.clone())
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        reply.into_result().map_err(|failure| {
            warn!(%url, error = %failure.error, "server reported failure");
            PipelineError::from(failure)
        })
    }

    /// Raw bytes of a server-hosted file.
    pub async fn fetch_bytes(&self, url: Url) -> PipelineResult<Vec<u8>> {
        let bytes = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ProjectCatalog for HttpBackend {
    async fn list_projects(&self) -> PipelineResult<Vec<ProjectSummary>> {
        self.get_json(&["videos"]).await
    }

    async fn fetch_project(&self, id: &ProjectId) -> PipelineResult<StudioArtifact> {
        self.get_json(&["project", id.as_str()]).await
    }
}

#[async_trait]
impl NarratorRegistry for HttpBackend {
    async fn list_narrators(&self) -> PipelineResult<Vec<Narrator>> {
        self.get_json(&["narrators"]).await
    }
}

#[async_trait]
impl SpeechApi for HttpBackend {
    async fn generate_tts(&self, request: TtsRequest) -> PipelineResult<TtsResponse> {
        self.post_json(&["generate-tts"], &request).await
    }
}

#[async_trait]
impl ForgeApi for HttpBackend {
    async fn generate_creative_script(
        &self,
        request: CreativeScriptRequest,
    ) -> PipelineResult<CreativeScript> {
        self.post_json(&["generate-creative-script"], &request)
            .await
    }

    async fn refine_script(&self, request: RefineRequest) -> PipelineResult<RefineResponse> {
        self.post_json(&["refine-script"], &request).await
    }

    async fn approve_creative_project(
        &self,
        request: ApproveRequest,
    ) -> PipelineResult<ForgeAssets> {
        self.post_json(&["approve-creative-project"], &request)
            .await
    }

    async fn generate_forge_video(
        &self,
        request: RenderRequest,
    ) -> PipelineResult<RenderResponse> {
        self.post_json(&["generate-forge-video"], &request).await
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
