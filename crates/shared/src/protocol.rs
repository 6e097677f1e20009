use serde::{Deserialize, Serialize};

use crate::domain::{Gender, LanguageCode, NarratorId, RefineStyle, Tone};

/// First and only frame the client sends on the analysis channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudioJobRequest {
    pub url: String,
    #[serde(rename = "duration")]
    pub duration_minutes: u32,
    pub language: LanguageCode,
    #[serde(default)]
    pub tone: Tone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StudioUpdate {
    Processing {
        #[serde(default)]
        message: String,
        #[serde(default)]
        progress: f64,
    },
    Completed {
        #[serde(default)]
        message: String,
        studio_data: Box<StudioArtifact>,
    },
    Error {
        #[serde(default)]
        message: String,
    },
}

impl StudioUpdate {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StudioUpdate::Processing { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailData {
    #[serde(default)]
    pub text_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    #[serde(default)]
    pub titles: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditingCue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    #[serde(default)]
    pub narration_suggestion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_clip_prompt: Option<String>,
    #[serde(default)]
    pub edit_action: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityPoll {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowthLaunchpad {
    #[serde(default)]
    pub teaser: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<CommunityPoll>,
}

/// Output bundle of a completed studio analysis. Replaced wholesale, never
/// patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudioArtifact {
    #[serde(default)]
    pub english_script: String,
    #[serde(default)]
    pub studio_script: String,
    #[serde(default)]
    pub target_lang: String,
    #[serde(default)]
    pub viral_hooks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_data: Option<ThumbnailData>,
    #[serde(default)]
    pub metadata: VideoMetadata,
    #[serde(default)]
    pub chapters: String,
    #[serde(default)]
    pub editing_guide: Vec<EditingCue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_launchpad: Option<GrowthLaunchpad>,
    #[serde(default)]
    pub social_thread: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shorts_clip: Option<serde_json::Value>,
    #[serde(default)]
    pub srt_content: String,
    #[serde(default)]
    pub video_filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered_video_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mongodb_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_duration: Option<u32>,
}

impl StudioArtifact {
    pub fn thumbnail_prompt(&self) -> Option<&str> {
        self.thumbnail_data
            .as_ref()
            .map(|thumbnail| thumbnail.text_prompt.as_str())
            .filter(|prompt| !prompt.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    pub lang: LanguageCode,
    pub gender: Gender,
    pub tone: Tone,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtsResponse {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreativeScriptRequest {
    pub idea: String,
    pub duration: u32,
    pub lang: LanguageCode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSegment {
    pub timestamp: String,
    pub title: String,
    pub text: String,
    /// Scene length as the backend writes it, e.g. `"12s"`. The renderer
    /// reads it back when cutting scenes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_suggestion: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicCue {
    pub genre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionGuide {
    #[serde(default)]
    pub mood: String,
    #[serde(default)]
    pub palette: String,
    #[serde(default)]
    pub pacing: String,
}

impl ProductionGuide {
    /// Palette entries as listed by the backend (comma separated).
    pub fn palette_colors(&self) -> Vec<&str> {
        self.palette
            .split(',')
            .map(str::trim)
            .filter(|color| !color.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreativeScript {
    #[serde(default)]
    pub script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blueprint: Option<String>,
    #[serde(default)]
    pub segments: Vec<ScriptSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music: Option<MusicCue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production: Option<ProductionGuide>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefineRequest {
    pub script: String,
    pub style: RefineStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefineResponse {
    #[serde(default)]
    pub script: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveRequest {
    pub script: String,
    pub lang: LanguageCode,
    #[serde(rename = "narratorId")]
    pub narrator_id: NarratorId,
    pub segments: Vec<ScriptSegment>,
    pub idea: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryboardFrame {
    pub timestamp: String,
    pub title: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeAssets {
    #[serde(default)]
    pub audio_url: String,
    #[serde(default)]
    pub audio_path: String,
    #[serde(default)]
    pub storyboard: Vec<StoryboardFrame>,
    #[serde(default)]
    pub visual_prompts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub audio_path: String,
    pub segments: Vec<ScriptSegment>,
    pub bg_music: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResponse {
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}
