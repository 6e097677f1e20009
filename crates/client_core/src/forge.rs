//! Forge flow: idea → script → narrator → approved assets → rendered video.

use std::sync::Arc;

use shared::{
    domain::{LanguageCode, Narrator, NarratorId, RefineStyle},
    protocol::{
        ApproveRequest, CreativeScript, CreativeScriptRequest, ForgeAssets, MusicCue,
        ProductionGuide, RefineRequest, RenderRequest, ScriptSegment,
    },
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    backend::{ForgeApi, NarratorRegistry},
    error::{PipelineError, PipelineResult},
    events::PipelineEvent,
    guard::SingleFlight,
    Dispatch, Precondition,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForgeStatus {
    Idle,
    GeneratingScript,
    ScriptReady,
    GeneratingAssets,
    Completed,
}

impl ForgeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ForgeStatus::Idle => "idle",
            ForgeStatus::GeneratingScript => "generating-script",
            ForgeStatus::ScriptReady => "script-ready",
            ForgeStatus::GeneratingAssets => "generating-assets",
            ForgeStatus::Completed => "completed",
        }
    }
}

/// Script material returned by the creative engine, possibly edited or
/// refined since.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForgeDraft {
    pub script: String,
    pub blueprint: Option<String>,
    pub segments: Vec<ScriptSegment>,
    pub music: Option<MusicCue>,
    pub production: Option<ProductionGuide>,
}

impl From<CreativeScript> for ForgeDraft {
    fn from(value: CreativeScript) -> Self {
        Self {
            script: value.script,
            blueprint: value.blueprint,
            segments: value.segments,
            music: value.music,
            production: value.production,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ForgePhase {
    #[default]
    Idle,
    GeneratingScript,
    ScriptReady(ForgeDraft),
    GeneratingAssets(ForgeDraft),
    Completed {
        draft: ForgeDraft,
        assets: ForgeAssets,
    },
}

#[derive(Debug, Clone)]
pub struct ForgeSession {
    pub idea: String,
    pub duration_minutes: u32,
    pub lang: LanguageCode,
    pub phase: ForgePhase,
    pub narrators: Vec<Narrator>,
    pub selected_narrator: Option<Narrator>,
    pub rendered_video_url: Option<String>,
}

impl Default for ForgeSession {
    fn default() -> Self {
        Self {
            idea: String::new(),
            duration_minutes: 3,
            lang: LanguageCode::new("en"),
            phase: ForgePhase::Idle,
            narrators: Vec::new(),
            selected_narrator: None,
            rendered_video_url: None,
        }
    }
}

impl ForgeSession {
    pub fn status(&self) -> ForgeStatus {
        match self.phase {
            ForgePhase::Idle => ForgeStatus::Idle,
            ForgePhase::GeneratingScript => ForgeStatus::GeneratingScript,
            ForgePhase::ScriptReady(_) => ForgeStatus::ScriptReady,
            ForgePhase::GeneratingAssets(_) => ForgeStatus::GeneratingAssets,
            ForgePhase::Completed { .. } => ForgeStatus::Completed,
        }
    }

    pub fn draft(&self) -> Option<&ForgeDraft> {
        match &self.phase {
            ForgePhase::ScriptReady(draft)
            | ForgePhase::GeneratingAssets(draft)
            | ForgePhase::Completed { draft, .. } => Some(draft),
            ForgePhase::Idle | ForgePhase::GeneratingScript => None,
        }
    }

    pub fn script(&self) -> &str {
        self.draft().map(|draft| draft.script.as_str()).unwrap_or("")
    }

    pub fn segments(&self) -> &[ScriptSegment] {
        self.draft()
            .map(|draft| draft.segments.as_slice())
            .unwrap_or(&[])
    }

    pub fn assets(&self) -> Option<&ForgeAssets> {
        match &self.phase {
            ForgePhase::Completed { assets, .. } => Some(assets),
            _ => None,
        }
    }

    pub fn is_generating(&self) -> bool {
        matches!(
            self.phase,
            ForgePhase::GeneratingScript | ForgePhase::GeneratingAssets(_)
        )
    }

    pub fn narrators_for_language(&self) -> Vec<&Narrator> {
        self.narrators
            .iter()
            .filter(|narrator| narrator.lang == self.lang)
            .collect()
    }
}

/// Values substituted when the user made no choice.
#[derive(Debug, Clone)]
pub struct ForgeDefaults {
    pub narrator_id: NarratorId,
    pub music_genre: String,
}

struct ForgeState {
    session: ForgeSession,
    generation: u64,
}

pub struct ForgePipeline {
    api: Arc<dyn ForgeApi>,
    registry: Arc<dyn NarratorRegistry>,
    defaults: ForgeDefaults,
    refine_flight: SingleFlight,
    render_flight: SingleFlight,
    inner: Mutex<ForgeState>,
    events: broadcast::Sender<PipelineEvent>,
}

impl ForgePipeline {
    pub fn new(
        api: Arc<dyn ForgeApi>,
        registry: Arc<dyn NarratorRegistry>,
        defaults: ForgeDefaults,
        events: broadcast::Sender<PipelineEvent>,
    ) -> Self {
        Self {
            api,
            registry,
            defaults,
            refine_flight: SingleFlight::new("refine"),
            render_flight: SingleFlight::new("render"),
            inner: Mutex::new(ForgeState {
                session: ForgeSession::default(),
                generation: 0,
            }),
            events,
        }
    }

    pub async fn snapshot(&self) -> ForgeSession {
        self.inner.lock().await.session.clone()
    }

    pub fn is_refining(&self) -> bool {
        self.refine_flight.is_in_flight()
    }

    pub fn is_rendering(&self) -> bool {
        self.render_flight.is_in_flight()
    }

    fn publish(&self, session: &ForgeSession) {
        let _ = self.events.send(PipelineEvent::ForgeChanged(session.clone()));
    }

    fn report(&self, err: &PipelineError) {
        let _ = self.events.send(PipelineEvent::Error(err.display_message()));
    }

    pub async fn set_idea(&self, idea: impl Into<String>) -> Dispatch {
        let mut guard = self.inner.lock().await;
        if guard.session.is_generating() {
            return Dispatch::Ignored(Precondition::InFlight);
        }
        guard.session.idea = idea.into();
        self.publish(&guard.session);
        Dispatch::Dispatched
    }

    pub async fn set_duration(&self, minutes: u32) -> Dispatch {
        let mut guard = self.inner.lock().await;
        if guard.session.is_generating() {
            return Dispatch::Ignored(Precondition::InFlight);
        }
        guard.session.duration_minutes = minutes.max(1);
        self.publish(&guard.session);
        Dispatch::Dispatched
    }

    /// Changes the output language. A selected narrator of another language
    /// is dropped so the selection always belongs to the filtered set.
    pub async fn set_language(&self, lang: LanguageCode) -> Dispatch {
        let mut guard = self.inner.lock().await;
        if guard.session.is_generating() {
            return Dispatch::Ignored(Precondition::InFlight);
        }
        let session = &mut guard.session;
        if session
            .selected_narrator
            .as_ref()
            .is_some_and(|narrator| narrator.lang != lang)
        {
            debug!(%lang, "forge: clearing narrator selection of another language");
            session.selected_narrator = None;
        }
        session.lang = lang;
        self.publish(&guard.session);
        Dispatch::Dispatched
    }

    pub async fn load_narrators(&self) -> PipelineResult<Vec<Narrator>> {
        let narrators = match self.registry.list_narrators().await {
            Ok(narrators) => narrators,
            Err(err) => {
                warn!(error = %err, "forge: narrator registry unavailable");
                self.report(&err);
                return Err(err);
            }
        };

        let mut guard = self.inner.lock().await;
        let session = &mut guard.session;
        session.narrators = narrators.clone();
        if session.selected_narrator.is_none() {
            session.selected_narrator = narrators
                .iter()
                .find(|narrator| {
                    narrator.id == self.defaults.narrator_id && narrator.lang == session.lang
                })
                .cloned();
        }
        info!(count = narrators.len(), "forge: narrators loaded");
        let _ = self
            .events
            .send(PipelineEvent::NarratorsLoaded(narrators.clone()));
        self.publish(&guard.session);
        Ok(narrators)
    }

    pub async fn select_narrator(&self, id: &NarratorId) -> Dispatch {
        let mut guard = self.inner.lock().await;
        if matches!(guard.session.phase, ForgePhase::GeneratingAssets(_)) {
            return Dispatch::Ignored(Precondition::InFlight);
        }
        let Some(narrator) = guard
            .session
            .narrators_for_language()
            .into_iter()
            .find(|narrator| &narrator.id == id)
            .cloned()
        else {
            debug!(narrator_id = %id, lang = %guard.session.lang, "forge: narrator not offered for language");
            return Dispatch::Ignored(Precondition::UnknownNarrator);
        };
        guard.session.selected_narrator = Some(narrator);
        self.publish(&guard.session);
        Dispatch::Dispatched
    }

    pub async fn generate_script(&self) -> PipelineResult<Dispatch> {
        let (generation, request) = {
            let mut guard = self.inner.lock().await;
            if guard.session.idea.trim().is_empty() {
                return Ok(Dispatch::Ignored(Precondition::EmptyInput));
            }
            if guard.session.is_generating() {
                return Ok(Dispatch::Ignored(Precondition::InFlight));
            }
            guard.generation += 1;
            let session = &mut guard.session;
            session.phase = ForgePhase::GeneratingScript;
            session.rendered_video_url = None;
            let request = CreativeScriptRequest {
                idea: session.idea.clone(),
                duration: session.duration_minutes,
                lang: session.lang.clone(),
            };
            self.publish(&guard.session);
            (guard.generation, request)
        };
        info!(
            generation,
            idea = %request.idea,
            duration = request.duration,
            lang = %request.lang,
            "forge: generating script"
        );

        let result = self
            .api
            .generate_creative_script(request)
            .await
            .and_then(|script| {
                if script.script.trim().is_empty() {
                    Err(PipelineError::Server(
                        "script generation returned no script".into(),
                    ))
                } else {
                    Ok(script)
                }
            });

        let mut guard = self.inner.lock().await;
        if guard.generation != generation {
            return Ok(Dispatch::Dispatched);
        }
        match result {
            Ok(script) => {
                let draft = ForgeDraft::from(script);
                info!(
                    generation,
                    segments = draft.segments.len(),
                    blueprint = draft.blueprint.as_deref().unwrap_or("-"),
                    "forge: script ready"
                );
                guard.session.phase = ForgePhase::ScriptReady(draft);
                self.publish(&guard.session);
                Ok(Dispatch::Dispatched)
            }
            Err(err) => {
                warn!(generation, error = %err, "forge: script generation failed");
                guard.session.phase = ForgePhase::Idle;
                self.publish(&guard.session);
                self.report(&err);
                Err(err)
            }
        }
    }

    /// Manual edit of the draft script.
    pub async fn edit_script(&self, script: impl Into<String>) -> Dispatch {
        let mut guard = self.inner.lock().await;
        let ForgePhase::ScriptReady(draft) = &mut guard.session.phase else {
            return Dispatch::Ignored(Precondition::WrongPhase);
        };
        draft.script = script.into();
        self.publish(&guard.session);
        Dispatch::Dispatched
    }

    pub async fn refine(&self, style: RefineStyle) -> PipelineResult<Dispatch> {
        let (generation, request, _permit) = {
            let guard = self.inner.lock().await;
            let ForgePhase::ScriptReady(draft) = &guard.session.phase else {
                return Ok(Dispatch::Ignored(Precondition::WrongPhase));
            };
            if draft.script.trim().is_empty() {
                return Ok(Dispatch::Ignored(Precondition::EmptyInput));
            }
            let Some(permit) = self.refine_flight.try_acquire() else {
                return Ok(Dispatch::Ignored(Precondition::InFlight));
            };
            let request = RefineRequest {
                script: draft.script.clone(),
                style,
            };
            (guard.generation, request, permit)
        };
        info!(generation, style = style.as_str(), "forge: refining script");

        let result = self.api.refine_script(request).await.and_then(|reply| {
            if reply.script.is_empty() {
                Err(PipelineError::Server("refinement returned no script".into()))
            } else {
                Ok(reply.script)
            }
        });

        match result {
            Ok(script) => {
                let mut guard = self.inner.lock().await;
                let current = guard.generation == generation;
                match &mut guard.session.phase {
                    ForgePhase::ScriptReady(draft) if current => {
                        draft.script = script;
                        self.publish(&guard.session);
                    }
                    _ => debug!(generation, "forge: discarding refinement for a stale draft"),
                }
                Ok(Dispatch::Dispatched)
            }
            Err(err) => {
                warn!(generation, error = %err, "forge: refinement failed");
                self.report(&err);
                Err(err)
            }
        }
    }

    fn resolve_narrator(&self, session: &ForgeSession) -> NarratorId {
        match &session.selected_narrator {
            Some(narrator) if narrator.lang == session.lang => narrator.id.clone(),
            Some(narrator) => {
                warn!(
                    narrator_id = %narrator.id,
                    lang = %session.lang,
                    fallback = %self.defaults.narrator_id,
                    "forge: selected narrator does not speak the session language; using default"
                );
                self.defaults.narrator_id.clone()
            }
            None => {
                warn!(
                    fallback = %self.defaults.narrator_id,
                    "forge: no narrator selected; using default"
                );
                self.defaults.narrator_id.clone()
            }
        }
    }

    pub async fn approve(&self) -> PipelineResult<Dispatch> {
        let (generation, request) = {
            let mut guard = self.inner.lock().await;
            let ForgePhase::ScriptReady(draft) = &guard.session.phase else {
                return Ok(Dispatch::Ignored(Precondition::WrongPhase));
            };
            if draft.script.trim().is_empty() {
                return Ok(Dispatch::Ignored(Precondition::EmptyInput));
            }
            let draft = draft.clone();
            let request = ApproveRequest {
                script: draft.script.clone(),
                lang: guard.session.lang.clone(),
                narrator_id: self.resolve_narrator(&guard.session),
                segments: draft.segments.clone(),
                idea: guard.session.idea.clone(),
            };
            guard.session.phase = ForgePhase::GeneratingAssets(draft);
            self.publish(&guard.session);
            (guard.generation, request)
        };
        info!(
            generation,
            narrator_id = %request.narrator_id,
            lang = %request.lang,
            segments = request.segments.len(),
            "forge: generating assets"
        );

        let result = self
            .api
            .approve_creative_project(request)
            .await
            .and_then(|assets| {
                if assets.audio_url.is_empty() {
                    Err(PipelineError::Server(
                        "asset generation returned no audio".into(),
                    ))
                } else {
                    Ok(assets)
                }
            });

        let mut guard = self.inner.lock().await;
        if guard.generation != generation {
            return Ok(Dispatch::Dispatched);
        }
        let draft = match std::mem::take(&mut guard.session.phase) {
            ForgePhase::GeneratingAssets(draft) => draft,
            other => {
                guard.session.phase = other;
                return Ok(Dispatch::Dispatched);
            }
        };
        match result {
            Ok(assets) => {
                info!(
                    generation,
                    audio_url = %assets.audio_url,
                    storyboard = assets.storyboard.len(),
                    "forge: assets ready"
                );
                guard.session.phase = ForgePhase::Completed { draft, assets };
                guard.session.rendered_video_url = None;
                self.publish(&guard.session);
                Ok(Dispatch::Dispatched)
            }
            Err(err) => {
                warn!(generation, error = %err, "forge: asset generation failed; script kept");
                guard.session.phase = ForgePhase::ScriptReady(draft);
                self.publish(&guard.session);
                self.report(&err);
                Err(err)
            }
        }
    }

    pub async fn render_video(&self) -> PipelineResult<Dispatch> {
        let (generation, request, _permit) = {
            let mut guard = self.inner.lock().await;
            let ForgePhase::Completed { draft, assets } = &guard.session.phase else {
                return Ok(Dispatch::Ignored(Precondition::MissingAsset));
            };
            if assets.audio_path.trim().is_empty() {
                return Ok(Dispatch::Ignored(Precondition::MissingAsset));
            }
            let Some(permit) = self.render_flight.try_acquire() else {
                return Ok(Dispatch::Ignored(Precondition::InFlight));
            };
            let bg_music = draft
                .music
                .as_ref()
                .map(|music| music.genre.trim())
                .filter(|genre| !genre.is_empty())
                .unwrap_or(self.defaults.music_genre.as_str())
                .to_string();
            let request = RenderRequest {
                audio_path: assets.audio_path.clone(),
                segments: draft.segments.clone(),
                bg_music,
            };
            guard.session.rendered_video_url = None;
            self.publish(&guard.session);
            (guard.generation, request, permit)
        };
        info!(
            generation,
            audio_path = %request.audio_path,
            bg_music = %request.bg_music,
            "forge: rendering video"
        );

        let result = self
            .api
            .generate_forge_video(request)
            .await
            .and_then(|reply| {
                reply
                    .video_url
                    .filter(|url| !url.is_empty())
                    .ok_or_else(|| PipelineError::Server("render returned no video url".into()))
            });

        match result {
            Ok(video_url) => {
                let mut guard = self.inner.lock().await;
                if guard.generation == generation
                    && matches!(guard.session.phase, ForgePhase::Completed { .. })
                {
                    info!(generation, %video_url, "forge: video rendered");
                    guard.session.rendered_video_url = Some(video_url);
                    self.publish(&guard.session);
                } else {
                    debug!(generation, "forge: discarding render for a replaced project");
                }
                Ok(Dispatch::Dispatched)
            }
            Err(err) => {
                warn!(generation, error = %err, "forge: rendering failed");
                let _ = self
                    .events
                    .send(PipelineEvent::Notice(format!("Rendering error: {err}")));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/forge_tests.rs"]
mod tests;
