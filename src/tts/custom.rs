//! User-hosted synthesis endpoint, for self-hosted or local models.
//!
//! Wire contract: `POST {text, voice}` to the configured URL, audio bytes
//! (WAV/MP3) back. The configured rate is applied client-side during playback
//! since the endpoint makes no promises about supporting one.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;

use super::{PlaybackHandle, SpeakOptions, TtsProvider};

pub const PROVIDER_NAME: &str = "Custom API";

const DEFAULT_VOICE: &str = "Jasper";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct CustomTtsProvider {
    url: String,
    default_voice: Option<String>,
    playback: Arc<PlaybackHandle>,
}

impl CustomTtsProvider {
    pub fn new(url: String, default_voice: Option<String>, playback: Arc<PlaybackHandle>) -> Self {
        Self {
            url,
            default_voice,
            playback,
        }
    }

    fn synthesize(&self, text: &str, options: &SpeakOptions) -> Result<Vec<u8>> {
        let voice = options
            .voice_id
            .as_deref()
            .or(self.default_voice.as_deref())
            .unwrap_or(DEFAULT_VOICE);
        let body = serde_json::json!({
            "text": text,
            "voice": voice,
        });

        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        let response = client
            .post(&self.url)
            .json(&body)
            .send()
            .context("custom TTS request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("custom TTS error: {}", response.status()));
        }

        let bytes = response.bytes().context("failed to read audio payload")?;
        Ok(bytes.to_vec())
    }
}

impl TtsProvider for CustomTtsProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn speak(&self, text: &str, options: SpeakOptions) -> Result<()> {
        let bytes = self.synthesize(text, &options)?;
        self.playback
            .play(
                bytes,
                options.volume,
                options.rate,
                options.on_ended.unwrap_or_else(|| Box::new(|| {})),
            )
            .map_err(|err| anyhow!("playback dispatch failed: {}", err))
    }

    fn stop(&self) {
        self.playback.stop();
    }

    fn is_available(&self) -> bool {
        !self.url.is_empty()
    }
}
