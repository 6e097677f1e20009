//! Standalone text-to-speech requests.

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use chrono::Utc;
use shared::{
    domain::{Gender, LanguageCode, Tone},
    protocol::TtsRequest,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::{
    backend::SpeechApi,
    error::{PipelineError, PipelineResult},
    events::PipelineEvent,
    guard::SingleFlight,
    Dispatch, Precondition,
};

#[derive(Debug, Clone)]
pub struct VoiceRequest {
    pub text: String,
    pub lang: LanguageCode,
    pub gender: Gender,
    pub tone: Tone,
}

/// A synthesized clip as hosted by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceClip {
    pub url: String,
    pub filename: String,
}

pub fn tts_filename(lang: &LanguageCode, gender: Gender, tone: Tone, stamp: i64) -> String {
    format!(
        "tts_{}_{}_{}_{stamp}.mp3",
        lang.as_str(),
        gender.as_str(),
        tone.as_str()
    )
}

pub struct VoiceSynthesizer {
    api: Arc<dyn SpeechApi>,
    flight: SingleFlight,
    last_stamp: AtomicI64,
    last_clip: Mutex<Option<VoiceClip>>,
    events: broadcast::Sender<PipelineEvent>,
}

impl VoiceSynthesizer {
    pub fn new(api: Arc<dyn SpeechApi>, events: broadcast::Sender<PipelineEvent>) -> Self {
        Self {
            api,
            flight: SingleFlight::new("tts"),
            last_stamp: AtomicI64::new(0),
            last_clip: Mutex::new(None),
            events,
        }
    }

    pub fn is_generating(&self) -> bool {
        self.flight.is_in_flight()
    }

    pub async fn last_audio(&self) -> Option<VoiceClip> {
        self.last_clip.lock().await.clone()
    }

    // Microsecond wall clock, bumped when the clock has not moved since the
    // previous request so filenames never collide.
    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_micros();
        let previous = self
            .last_stamp
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(previous + 1)
    }

    pub async fn generate(&self, request: VoiceRequest) -> PipelineResult<Dispatch> {
        if request.text.trim().is_empty() {
            return Ok(Dispatch::Ignored(Precondition::EmptyInput));
        }
        let Some(_permit) = self.flight.try_acquire() else {
            return Ok(Dispatch::Ignored(Precondition::InFlight));
        };

        let filename = tts_filename(&request.lang, request.gender, request.tone, self.next_stamp());
        info!(
            %filename,
            lang = %request.lang,
            chars = request.text.chars().count(),
            "voice: generating speech"
        );

        let result = self
            .api
            .generate_tts(TtsRequest {
                text: request.text,
                lang: request.lang,
                gender: request.gender,
                tone: request.tone,
                filename: filename.clone(),
            })
            .await
            .and_then(|reply| {
                reply
                    .url
                    .filter(|url| !url.is_empty())
                    .ok_or_else(|| PipelineError::Server("TTS generation failed".into()))
            });

        match result {
            Ok(url) => {
                let clip = VoiceClip { url, filename };
                *self.last_clip.lock().await = Some(clip.clone());
                let _ = self.events.send(PipelineEvent::VoiceReady {
                    url: clip.url,
                    filename: clip.filename,
                });
                Ok(Dispatch::Dispatched)
            }
            Err(err) => {
                warn!(%filename, error = %err, "voice: speech generation failed");
                let _ = self.events.send(PipelineEvent::Error(err.display_message()));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/voice_tests.rs"]
mod tests;
