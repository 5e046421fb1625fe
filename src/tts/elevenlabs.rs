//! ElevenLabs text-to-speech.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;

use super::{PlaybackHandle, SpeakOptions, TtsProvider};

pub const PROVIDER_NAME: &str = "ElevenLabs";

const BASE_URL: &str = "https://api.elevenlabs.io/v1";
const MODEL_ID: &str = "eleven_turbo_v2";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ElevenLabsTtsProvider {
    api_key: String,
    /// Falls back to this when no voice is chosen in settings ("Rachel").
    default_voice_id: String,
    playback: Arc<PlaybackHandle>,
}

impl ElevenLabsTtsProvider {
    pub fn new(api_key: String, default_voice_id: String, playback: Arc<PlaybackHandle>) -> Self {
        Self {
            api_key,
            default_voice_id,
            playback,
        }
    }

    fn synthesize(&self, text: &str, options: &SpeakOptions) -> Result<Vec<u8>> {
        let voice_id = options
            .voice_id
            .as_deref()
            .unwrap_or(&self.default_voice_id);
        let url = format!("{}/text-to-speech/{}", BASE_URL, voice_id);
        let body = serde_json::json!({
            "text": text,
            "model_id": MODEL_ID,
            "voice_settings": {
                "stability": 0.6,
                "similarity_boost": 0.8,
                "speed": options.rate,
            },
        });

        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        let response = client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .context("ElevenLabs request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("ElevenLabs error: {}", response.status()));
        }

        let bytes = response.bytes().context("failed to read audio payload")?;
        Ok(bytes.to_vec())
    }
}

impl TtsProvider for ElevenLabsTtsProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn speak(&self, text: &str, options: SpeakOptions) -> Result<()> {
        let bytes = self.synthesize(text, &options)?;
        self.playback
            .play(
                bytes,
                options.volume,
                1.0,
                options.on_ended.unwrap_or_else(|| Box::new(|| {})),
            )
            .map_err(|err| anyhow!("playback dispatch failed: {}", err))
    }

    fn stop(&self) {
        self.playback.stop();
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }
}
