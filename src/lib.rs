//! Announcement scheduling and spoken delivery for invigilated exam timers.
//!
//! This crate is the backend core of a desktop exam/quiz countdown app: it
//! decides when a spoken message fires for each running timer, resolves its
//! text from a template, optionally rewrites it through a local LLM, and
//! serializes delivery through one speech output with priority ordering,
//! deduplication, skip/clear control, and fallback across speech backends.
//!
//! The countdown engine and the UI live in the host application. The engine
//! pushes [`TimerTick`] events into an [`Announcer`] over an mpsc channel:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use invigilate::{Announcer, SettingsStore, TimerInfo};
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn wire() -> anyhow::Result<()> {
//! let settings = Arc::new(SettingsStore::new("settings.json".into())?);
//! let announcer = Announcer::new(settings);
//!
//! let (tick_tx, tick_rx) = mpsc::channel(64);
//! let cancel = CancellationToken::new();
//! announcer.spawn_tick_loop(tick_rx, cancel.clone());
//!
//! let exam = TimerInfo::new("t1", "GEO101 · BSc Geomatics", 7200)
//!     .with_exam_fields("GEO101", "BSc Geomatics", 42);
//! announcer.register_timer(exam).await;
//! # let _ = tick_tx;
//! # Ok(())
//! # }
//! ```

pub mod announcer;
pub mod settings;
pub mod timer;
pub mod tts;
pub mod utils;

pub use announcer::{
    default_schedule, resolve_template, Announcer, AnnouncementQueue, AnnouncerStatus,
    DueAnnouncement, Enhancer, ManualTarget, QueueStatus, QueuedAnnouncement, ScheduleEntry,
    ScheduleEvaluator,
    PRIORITY_END, PRIORITY_MANUAL, PRIORITY_MILESTONE, WINDOW_SECONDS,
};
pub use settings::{AnnouncementSettings, SettingsStore, TtsProviderKind};
pub use timer::{unix_now, TimerInfo, TimerStatus, TimerTick};
pub use tts::{SpeakOptions, TtsProvider};
pub use utils::init_logging;
