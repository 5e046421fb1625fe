//! Optional LLM rewrite of announcement text before it is spoken.
//!
//! Talks to a local Ollama-compatible endpoint. Strictly best-effort: when
//! disabled, unreachable, slow, or returning junk, the resolved text passes
//! through unchanged. No announcement is ever lost to this stage.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::settings::AnnouncementSettings;

const ENABLE_LOGS: bool = true;
use crate::log_warn;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const SYSTEM_PROMPT: &str = "You are an exam hall announcement assistant.\n\
Your job is to rewrite a formal exam announcement to sound natural and clear when spoken aloud.\n\
Rules:\n\
- Keep the same core information (program name, time remaining)\n\
- Use a calm, clear, authoritative tone\n\
- Vary phrasing slightly from previous announcements so it doesn't sound like a recording\n\
- Never add information that wasn't in the original\n\
- Return ONLY the spoken announcement text, no quotes, no explanation\n\
- Keep it under 25 words";

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Clone)]
pub struct Enhancer {
    client: reqwest::Client,
}

impl Enhancer {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    /// Rewrite `raw` for speech, or return it unchanged when enhancement is
    /// disabled or fails.
    pub async fn enhance(&self, raw: &str, settings: &AnnouncementSettings) -> String {
        if !settings.llm_enabled || settings.ollama_url.is_empty() {
            return raw.to_string();
        }

        match self.rewrite(raw, settings).await {
            Ok(Some(text)) => text,
            Ok(None) => raw.to_string(),
            Err(err) => {
                log_warn!("announcement enhancement failed: {:#}", err);
                raw.to_string()
            }
        }
    }

    async fn rewrite(
        &self,
        raw: &str,
        settings: &AnnouncementSettings,
    ) -> Result<Option<String>> {
        let url = format!("{}/api/chat", settings.ollama_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": settings.llm_model,
            "stream": false,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": raw },
            ],
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("enhancement request failed")?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("malformed enhancement response")?;

        Ok(parsed
            .message
            .map(|m| m.content.trim().to_string())
            .filter(|content| !content.is_empty()))
    }
}

impl Default for Enhancer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_enhancement_passes_text_through() {
        let enhancer = Enhancer::new();
        let settings = AnnouncementSettings::default();
        assert!(!settings.llm_enabled);

        let text = enhancer
            .enhance("BSc Geomatics, ten minutes remaining.", &settings)
            .await;
        assert_eq!(text, "BSc Geomatics, ten minutes remaining.");
    }

    #[tokio::test]
    async fn missing_url_passes_text_through() {
        let enhancer = Enhancer::new();
        let mut settings = AnnouncementSettings::default();
        settings.llm_enabled = true;
        settings.ollama_url = String::new();

        let text = enhancer.enhance("Pens down now.", &settings).await;
        assert_eq!(text, "Pens down now.");
    }

    #[tokio::test]
    async fn unreachable_endpoint_passes_text_through() {
        let enhancer = Enhancer::new();
        let mut settings = AnnouncementSettings::default();
        settings.llm_enabled = true;
        // Port 1 is never an Ollama server; the connection is refused.
        settings.ollama_url = "http://127.0.0.1:1".into();

        let text = enhancer
            .enhance("BSc Geomatics, five minutes remaining.", &settings)
            .await;
        assert_eq!(text, "BSc Geomatics, five minutes remaining.");
    }
}
