//! Local downloads of studio and forge outputs.

use std::path::{Path, PathBuf};

use shared::protocol::{ForgeAssets, StudioArtifact};
use tracing::{debug, info};
use url::Url;

use crate::{error::PipelineResult, http::HttpBackend};

/// Final segment of a server-side path. Both `/` and `\` separate segments.
/// Empty and dot-only segments yield `None`.
pub fn file_name_from_path(path: &str) -> Option<&str> {
    path.rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .map(str::trim)
        .filter(|name| !matches!(*name, "" | "." | ".."))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    SourceVideo,
    RenderedVideo,
    Audio,
}

impl MediaKind {
    fn static_dir(self) -> &'static str {
        match self {
            MediaKind::SourceVideo => "downloads",
            MediaKind::RenderedVideo => "videos",
            MediaKind::Audio => "audio",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub filename: String,
    pub contents: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMedia {
    pub kind: MediaKind,
    pub url: Url,
    pub filename: String,
}

pub struct DownloadExporter {
    backend: HttpBackend,
    download_dir: PathBuf,
}

impl DownloadExporter {
    pub fn new(backend: HttpBackend, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            download_dir: download_dir.into(),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// `subtitles_{lang}.srt` carrying the artifact's SRT text.
    pub fn subtitle_file(artifact: &StudioArtifact) -> Option<ExportFile> {
        if artifact.srt_content.is_empty() {
            return None;
        }
        let lang = file_name_from_path(&artifact.target_lang).unwrap_or("und");
        Some(ExportFile {
            filename: format!("subtitles_{lang}.srt"),
            contents: artifact.srt_content.clone(),
        })
    }

    fn media(&self, kind: MediaKind, filename: &str) -> Option<RemoteMedia> {
        let mut url = self.backend.base_url().clone();
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend(["static", kind.static_dir(), filename]);
        Some(RemoteMedia {
            kind,
            url,
            filename: filename.to_string(),
        })
    }

    pub fn source_video(&self, artifact: &StudioArtifact) -> Option<RemoteMedia> {
        let filename = file_name_from_path(&artifact.video_filename)?;
        self.media(MediaKind::SourceVideo, filename)
    }

    pub fn rendered_video(&self, artifact: &StudioArtifact) -> Option<RemoteMedia> {
        let filename = file_name_from_path(artifact.rendered_video_path.as_deref()?)?;
        self.media(MediaKind::RenderedVideo, filename)
    }

    pub fn forge_video(&self, video_url: Option<&str>) -> Option<RemoteMedia> {
        let filename = file_name_from_path(video_url?)?;
        self.media(MediaKind::RenderedVideo, filename)
    }

    pub fn forge_audio(&self, assets: Option<&ForgeAssets>) -> Option<RemoteMedia> {
        let filename = file_name_from_path(&assets?.audio_url)?;
        self.media(MediaKind::Audio, filename)
    }

    async fn write_file(&self, filename: &str, contents: &[u8]) -> PipelineResult<PathBuf> {
        tokio::fs::create_dir_all(&self.download_dir).await?;
        let path = self.download_dir.join(filename);
        tokio::fs::write(&path, contents).await?;
        info!(path = %path.display(), bytes = contents.len(), "export: file written");
        Ok(path)
    }

    /// Writes the subtitle file. `Ok(None)` when there is nothing to save.
    pub async fn save_subtitles(
        &self,
        artifact: Option<&StudioArtifact>,
    ) -> PipelineResult<Option<PathBuf>> {
        let Some(file) = artifact.and_then(Self::subtitle_file) else {
            debug!("export: no subtitles to save");
            return Ok(None);
        };
        self.write_file(&file.filename, file.contents.as_bytes())
            .await
            .map(Some)
    }

    /// Fetches a hosted file into the download directory. `Ok(None)` when the
    /// source is absent.
    pub async fn download(&self, media: Option<RemoteMedia>) -> PipelineResult<Option<PathBuf>> {
        let Some(media) = media else {
            debug!("export: no media to download");
            return Ok(None);
        };
        info!(url = %media.url, kind = ?media.kind, "export: downloading");
        let bytes = self.backend.fetch_bytes(media.url).await?;
        self.write_file(&media.filename, &bytes).await.map(Some)
    }
}

#[cfg(test)]
#[path = "tests/export_tests.rs"]
mod tests;
