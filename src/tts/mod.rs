//! Speech output providers.
//!
//! A [`TtsProvider`] turns text into audible speech. `speak` blocks until
//! dispatch has succeeded (audio handed to the output device or synthesis
//! process launched), not until the speech has finished; completion is
//! signalled through [`SpeakOptions::on_ended`]. The announcement queue relies
//! on `on_ended` firing eventually for every dispatched announcement, success
//! or failure, so a dead backend can never wedge the queue.

pub mod custom;
pub mod elevenlabs;
pub mod openai;
pub mod playback;
pub mod system;

use std::sync::Arc;

use anyhow::Result;

use crate::settings::{AnnouncementSettings, TtsProviderKind};

const ENABLE_LOGS: bool = true;
use crate::log_warn;

pub use custom::CustomTtsProvider;
pub use elevenlabs::ElevenLabsTtsProvider;
pub use openai::OpenAiTtsProvider;
pub use playback::PlaybackHandle;
pub use system::SystemTtsProvider;

/// Invoked exactly once when speech finishes, is stopped, or fails.
pub type EndedCallback = Box<dyn FnOnce() + Send + 'static>;

pub struct SpeakOptions {
    /// 0.5–2.0, default 0.9.
    pub rate: f32,
    /// 0.0–2.0, default 1.0.
    pub pitch: f32,
    /// 0.0–1.0, default 1.0.
    pub volume: f32,
    /// Provider-specific voice identifier.
    pub voice_id: Option<String>,
    pub on_ended: Option<EndedCallback>,
}

impl Default for SpeakOptions {
    fn default() -> Self {
        Self {
            rate: 0.9,
            pitch: 1.0,
            volume: 1.0,
            voice_id: None,
            on_ended: None,
        }
    }
}

pub trait TtsProvider: Send + Sync {
    /// Human-readable name shown in settings and logs.
    fn name(&self) -> &str;

    /// Begin speaking. Returns once dispatch succeeded. If this returns an
    /// error the caller treats the announcement as finished; if it returns
    /// `Ok`, `on_ended` fires when playback completes or is stopped.
    fn speak(&self, text: &str, options: SpeakOptions) -> Result<()>;

    /// Halt any in-progress speech. No-op when nothing is speaking.
    fn stop(&self);

    /// Cheap capability probe: engine present / endpoint configured.
    fn is_available(&self) -> bool;
}

/// Build the provider selected by `settings`, falling back to the on-device
/// system voice when the selection is unavailable or misconfigured. Never
/// fails: a room full of candidates must not see an error dialog because an
/// API key expired.
pub fn provider_for(
    settings: &AnnouncementSettings,
    playback: &Arc<PlaybackHandle>,
) -> Arc<dyn TtsProvider> {
    let candidate: Option<Arc<dyn TtsProvider>> = match settings.tts_provider {
        TtsProviderKind::System => None,
        TtsProviderKind::Openai => Some(Arc::new(OpenAiTtsProvider::new(
            settings.openai_api_key.clone(),
            settings.openai_model.clone(),
            playback.clone(),
        ))),
        TtsProviderKind::Elevenlabs => Some(Arc::new(ElevenLabsTtsProvider::new(
            settings.elevenlabs_api_key.clone(),
            settings.elevenlabs_voice_id.clone(),
            playback.clone(),
        ))),
        TtsProviderKind::CustomApi => Some(Arc::new(CustomTtsProvider::new(
            settings.custom_tts_url.clone(),
            settings.custom_tts_voice.clone(),
            playback.clone(),
        ))),
    };

    match candidate {
        Some(provider) if provider.is_available() => provider,
        Some(provider) => {
            log_warn!(
                "{} selected but unavailable or misconfigured; falling back to system voice",
                provider.name()
            );
            Arc::new(SystemTtsProvider::new())
        }
        None => Arc::new(SystemTtsProvider::new()),
    }
}
