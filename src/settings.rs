use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::announcer::schedule::{default_schedule, ScheduleEntry};

/// Which speech backend to use. The factory falls back to `System` whenever
/// the configured backend is unavailable or misconfigured.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TtsProviderKind {
    System,
    Openai,
    Elevenlabs,
    CustomApi,
}

impl Default for TtsProviderKind {
    fn default() -> Self {
        TtsProviderKind::System
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnnouncementSettings {
    pub announcements_enabled: bool,

    pub tts_provider: TtsProviderKind,
    pub tts_voice_id: Option<String>,
    /// 0.5–2.0; 0.9 by default, slightly slower for clarity in a large room.
    pub tts_rate: f32,
    /// 0.0–1.0.
    pub tts_volume: f32,

    pub openai_api_key: String,
    pub openai_model: String,

    pub elevenlabs_api_key: String,
    pub elevenlabs_voice_id: String,

    /// Self-hosted endpoint; POST `{text, voice}` returning audio bytes.
    pub custom_tts_url: String,
    pub custom_tts_voice: Option<String>,

    pub llm_enabled: bool,
    pub llm_model: String,
    pub ollama_url: String,

    /// Spoken when a timer transitions Running -> Ended, independent of any
    /// 0-second schedule entry.
    pub end_message: String,

    /// Cloned into every newly registered timer.
    pub default_schedule: Vec<ScheduleEntry>,

    /// Operator shortcuts for manual announcements.
    pub quick_pick_messages: Vec<String>,
}

impl Default for AnnouncementSettings {
    fn default() -> Self {
        Self {
            announcements_enabled: true,

            tts_provider: TtsProviderKind::System,
            tts_voice_id: None,
            tts_rate: 0.9,
            tts_volume: 1.0,

            openai_api_key: String::new(),
            openai_model: "tts-1".into(),

            elevenlabs_api_key: String::new(),
            elevenlabs_voice_id: "21m00Tcm4TlvDq8ikWAM".into(),

            custom_tts_url: "http://localhost:8000/generate".into(),
            custom_tts_voice: Some("Jasper".into()),

            llm_enabled: false,
            llm_model: "llama3.1".into(),
            ollama_url: "http://localhost:11434".into(),

            end_message: "Time's up for {program}. Pens down.".into(),

            default_schedule: default_schedule(),

            quick_pick_messages: vec![
                "All papers collected.".into(),
                "Please remain seated.".into(),
                "Check your name is on your paper.".into(),
                "Pens down now.".into(),
            ],
        }
    }
}

/// JSON-file-backed settings shared across the announcement subsystem.
///
/// Reads are snapshots; an announcement already speaking keeps the
/// configuration it started with even if the settings change mid-delivery.
pub struct SettingsStore {
    path: Option<PathBuf>,
    data: RwLock<AnnouncementSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            AnnouncementSettings::default()
        };

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    /// In-memory store that never touches disk. Used by hosts that manage
    /// persistence themselves, and by tests.
    pub fn ephemeral(settings: AnnouncementSettings) -> Self {
        Self {
            path: None,
            data: RwLock::new(settings),
        }
    }

    pub fn snapshot(&self) -> AnnouncementSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, apply: impl FnOnce(&mut AnnouncementSettings)) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        apply(&mut guard);
        self.persist(&guard)
    }

    pub fn replace(&self, settings: AnnouncementSettings) -> Result<()> {
        self.update(|data| *data = settings)
    }

    fn persist(&self, data: &AnnouncementSettings) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    #[allow(dead_code)]
    pub fn reload(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let contents = fs::read_to_string(path)?;
        let data: AnnouncementSettings = serde_json::from_str(&contents)?;
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = data;
        Ok(())
    }
}
