//! Cloud synthesis against an OpenAI-compatible `/v1/audio/speech` endpoint.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;

use super::{PlaybackHandle, SpeakOptions, TtsProvider};

pub const PROVIDER_NAME: &str = "OpenAI TTS";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Fixed voice catalog: alloy, echo, fable, onyx, nova, shimmer.
const DEFAULT_VOICE: &str = "nova";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct OpenAiTtsProvider {
    api_key: String,
    /// `tts-1` (fast) or `tts-1-hd` (higher quality).
    model: String,
    base_url: String,
    playback: Arc<PlaybackHandle>,
}

impl OpenAiTtsProvider {
    pub fn new(api_key: String, model: String, playback: Arc<PlaybackHandle>) -> Self {
        Self {
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
            playback,
        }
    }

    /// Point at an OpenAI-compatible endpoint other than api.openai.com.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn synthesize(&self, text: &str, options: &SpeakOptions) -> Result<Vec<u8>> {
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let voice = options.voice_id.as_deref().unwrap_or(DEFAULT_VOICE);
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": voice,
            "speed": options.rate,
        });

        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        let response = client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .context("OpenAI TTS request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("OpenAI TTS error: {}", response.status()));
        }

        let bytes = response.bytes().context("failed to read audio payload")?;
        Ok(bytes.to_vec())
    }
}

impl TtsProvider for OpenAiTtsProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn speak(&self, text: &str, options: SpeakOptions) -> Result<()> {
        let bytes = self.synthesize(text, &options)?;
        // The API already applied the speaking rate; play at natural speed.
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
