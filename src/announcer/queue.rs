//! The announcement queue: admission control and serial dispatch for the one
//! shared voice.
//!
//! Many timers enqueue; exactly one announcement is audible at any instant.
//! Items are ordered by priority (lower first) with FIFO tie-break, enqueues
//! with an id already pending are dropped, and a drain task pulls items one at
//! a time through the configured speech provider, pausing briefly between
//! announcements so they do not run together. Delivery failures advance the
//! queue instead of wedging it; a missed announcement is acceptable, a stuck
//! queue is not.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::settings::{AnnouncementSettings, SettingsStore};
use crate::tts::{self, PlaybackHandle, SpeakOptions, TtsProvider};

const ENABLE_LOGS: bool = true;
use crate::{log_error, log_info, log_warn};

/// Pause between announcements so consecutive messages stay distinct.
const INTER_ANNOUNCEMENT_GAP: Duration = Duration::from_millis(800);

/// A resolved, ready-to-speak text unit. Ephemeral: created on enqueue,
/// discarded once spoken.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedAnnouncement {
    /// Dedup key; `{timerId}-{entryId}` for scheduled announcements.
    pub id: String,
    /// Fully resolved, enhancement already applied.
    pub text: String,
    /// Lower is more urgent: 0 manual, 1 end-of-session, 2 milestone.
    pub priority: u8,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedAnnouncement {
    pub fn new(id: impl Into<String>, text: impl Into<String>, priority: u8) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            priority,
            enqueued_at: Utc::now(),
        }
    }
}

/// Read-only view for the UI status bar and caption overlay.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub pending_count: usize,
    pub is_speaking: bool,
    pub current_text: Option<String>,
}

struct QueueState {
    pending: Vec<QueuedAnnouncement>,
    is_speaking: bool,
    current: Option<QueuedAnnouncement>,
    active_provider: Option<Arc<dyn TtsProvider>>,
}

type ProviderFactory =
    Arc<dyn Fn(&AnnouncementSettings, &Arc<PlaybackHandle>) -> Arc<dyn TtsProvider> + Send + Sync>;

/// Cheap to clone; clones share one queue. Must live inside a tokio runtime
/// (enqueue spawns the drain task).
#[derive(Clone)]
pub struct AnnouncementQueue {
    state: Arc<Mutex<QueueState>>,
    settings: Arc<SettingsStore>,
    playback: Arc<PlaybackHandle>,
    factory: ProviderFactory,
    gap: Duration,
}

impl AnnouncementQueue {
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                pending: Vec::new(),
                is_speaking: false,
                current: None,
                active_provider: None,
            })),
            settings,
            playback: Arc::new(PlaybackHandle::new()),
            factory: Arc::new(|settings, playback| tts::provider_for(settings, playback)),
            gap: INTER_ANNOUNCEMENT_GAP,
        }
    }

    /// Override the provider factory (tests inject a recording mock here).
    pub fn with_provider_factory(mut self, factory: ProviderFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Override the inter-announcement pause.
    pub fn with_gap(mut self, gap: Duration) -> Self {
        self.gap = gap;
        self
    }

    /// Admit an announcement. An item whose id is already pending is silently
    /// dropped, so re-arming the same scheduled announcement never duplicates
    /// it. Insert position preserves priority order with FIFO tie-break. If
    /// nothing is speaking, draining starts immediately.
    pub fn enqueue(&self, announcement: QueuedAnnouncement) {
        let start_drain = {
            let mut state = self.lock_state();
            if state.pending.iter().any(|a| a.id == announcement.id) {
                log_info!("dropping duplicate announcement {}", announcement.id);
                return;
            }

            let position = state
                .pending
                .iter()
                .position(|a| a.priority > announcement.priority)
                .unwrap_or(state.pending.len());
            state.pending.insert(position, announcement);

            if state.is_speaking {
                false
            } else {
                state.is_speaking = true;
                true
            }
        };

        if start_drain {
            let queue = self.clone();
            tokio::spawn(async move {
                queue.drain().await;
            });
        }
    }

    /// Stop the announcement currently speaking. Its completion still fires,
    /// which advances the queue to the next pending item. No-op when idle.
    pub fn skip(&self) {
        let provider = self.lock_state().active_provider.clone();
        if let Some(provider) = provider {
            provider.stop();
        }
    }

    /// Discard all pending announcements and stop any active speech.
    ///
    /// A network provider still inside synthesis has no audio to stop yet;
    /// that one announcement still plays once its bytes arrive.
    pub fn clear(&self) {
        let provider = {
            let mut state = self.lock_state();
            state.pending.clear();
            state.current = None;
            state.active_provider.take()
        };
        if let Some(provider) = provider {
            provider.stop();
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock_state().pending.len()
    }

    pub fn is_active(&self) -> bool {
        let state = self.lock_state();
        Self::speaking(&state) || !state.pending.is_empty()
    }

    /// Text of the announcement being spoken, for transient on-screen
    /// captions. `None` while idle.
    pub fn current_announcement_text(&self) -> Option<String> {
        let state = self.lock_state();
        if Self::speaking(&state) {
            state.current.as_ref().map(|a| a.text.clone())
        } else {
            None
        }
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.lock_state();
        QueueStatus {
            pending_count: state.pending.len(),
            is_speaking: Self::speaking(&state),
            current_text: state.current.as_ref().map(|a| a.text.clone()),
        }
    }

    /// Observable speaking state. `is_speaking` alone also covers the drain
    /// worker winding down after `clear`, which observers should see as idle.
    fn speaking(state: &QueueState) -> bool {
        state.is_speaking && state.current.is_some()
    }

    /// Drain loop: exactly one runs at a time, guarded by `is_speaking`.
    async fn drain(&self) {
        loop {
            let next = {
                let mut state = self.lock_state();
                if state.pending.is_empty() {
                    state.is_speaking = false;
                    state.current = None;
                    state.active_provider = None;
                    return;
                }
                let item = state.pending.remove(0);
                state.is_speaking = true;
                state.current = Some(item.clone());
                item
            };

            self.speak_one(&next).await;

            tokio::time::sleep(self.gap).await;
        }
    }

    /// Deliver one announcement and wait for its completion. Delivery uses
    /// the configuration current at this moment; later settings changes do
    /// not affect it.
    async fn speak_one(&self, announcement: &QueuedAnnouncement) {
        let settings = self.settings.snapshot();
        let provider = (self.factory)(&settings, &self.playback);
        self.lock_state().active_provider = Some(provider.clone());

        let (done_tx, done_rx) = oneshot::channel::<()>();
        let options = SpeakOptions {
            rate: settings.tts_rate,
            pitch: 1.0,
            volume: settings.tts_volume,
            voice_id: settings.tts_voice_id.clone(),
            on_ended: Some(Box::new(move || {
                let _ = done_tx.send(());
            })),
        };

        let text = announcement.text.clone();
        let speaking = provider.clone();
        let dispatched =
            tokio::task::spawn_blocking(move || speaking.speak(&text, options)).await;

        match dispatched {
            Ok(Ok(())) => {
                // Completion is the callback, not dispatch. A dropped sender
                // (provider discarded the callback) also resolves here.
                let _ = done_rx.await;
            }
            Ok(Err(err)) => {
                log_warn!("announcement {} failed to dispatch: {:#}", announcement.id, err);
            }
            Err(err) => {
                log_error!("speech dispatch task panicked: {}", err);
            }
        }

        self.lock_state().active_provider = None;
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::time::Instant;

    /// Records every spoken text (and the rate it was dispatched with) and
    /// holds completions until released.
    struct MockProvider {
        spoken: StdMutex<Vec<String>>,
        rates: StdMutex<Vec<f32>>,
        pending_ends: StdMutex<Vec<crate::tts::EndedCallback>>,
    }

    impl MockProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                spoken: StdMutex::new(Vec::new()),
                rates: StdMutex::new(Vec::new()),
                pending_ends: StdMutex::new(Vec::new()),
            })
        }

        fn spoken(&self) -> Vec<String> {
            self.spoken.lock().unwrap().clone()
        }

        fn rates(&self) -> Vec<f32> {
            self.rates.lock().unwrap().clone()
        }

        /// Complete the oldest unfinished announcement.
        fn finish_next(&self) {
            let callback = {
                let mut pending = self.pending_ends.lock().unwrap();
                if pending.is_empty() {
                    None
                } else {
                    Some(pending.remove(0))
                }
            };
            if let Some(callback) = callback {
                callback();
            }
        }
    }

    impl TtsProvider for MockProvider {
        fn name(&self) -> &str {
            "Mock"
        }

        fn speak(&self, text: &str, options: SpeakOptions) -> anyhow::Result<()> {
            self.spoken.lock().unwrap().push(text.to_string());
            self.rates.lock().unwrap().push(options.rate);
            if let Some(ended) = options.on_ended {
                self.pending_ends.lock().unwrap().push(ended);
            }
            Ok(())
        }

        fn stop(&self) {
            self.finish_next();
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn test_queue(mock: Arc<MockProvider>) -> AnnouncementQueue {
        let settings = Arc::new(SettingsStore::ephemeral(AnnouncementSettings::default()));
        AnnouncementQueue::new(settings)
            .with_gap(Duration::from_millis(5))
            .with_provider_factory(Arc::new(move |_, _| mock.clone() as Arc<dyn TtsProvider>))
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met within 2s");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn duplicate_ids_collapse_to_one_pending_entry() {
        let mock = MockProvider::new();
        let queue = test_queue(mock.clone());

        // Occupy the voice so later enqueues stay pending.
        queue.enqueue(QueuedAnnouncement::new("blocker", "blocker", 0));
        wait_until(|| mock.spoken().len() == 1).await;

        queue.enqueue(QueuedAnnouncement::new("t1-e1", "ten minutes", 2));
        queue.enqueue(QueuedAnnouncement::new("t1-e1", "ten minutes", 2));
        assert_eq!(queue.pending_count(), 1);
    }

    #[tokio::test]
    async fn priority_order_with_fifo_tie_break() {
        let mock = MockProvider::new();
        let queue = test_queue(mock.clone());

        queue.enqueue(QueuedAnnouncement::new("blocker", "blocker", 0));
        wait_until(|| mock.spoken().len() == 1).await;

        queue.enqueue(QueuedAnnouncement::new("a", "a", 2));
        queue.enqueue(QueuedAnnouncement::new("b", "b", 0));
        queue.enqueue(QueuedAnnouncement::new("c", "c", 2));
        queue.enqueue(QueuedAnnouncement::new("d", "d", 1));
        assert_eq!(queue.pending_count(), 4);

        for expected in 2..=5 {
            mock.finish_next();
            wait_until(|| mock.spoken().len() == expected).await;
        }
        mock.finish_next();
        wait_until(|| !queue.is_active()).await;

        assert_eq!(mock.spoken(), vec!["blocker", "b", "d", "a", "c"]);
    }

    #[tokio::test]
    async fn at_most_one_announcement_is_active() {
        let mock = MockProvider::new();
        let queue = test_queue(mock.clone());

        queue.enqueue(QueuedAnnouncement::new("x", "x", 2));
        queue.enqueue(QueuedAnnouncement::new("y", "y", 2));
        queue.enqueue(QueuedAnnouncement::new("z", "z", 2));

        wait_until(|| mock.spoken().len() == 1).await;
        // Nothing else may start while the first completion is withheld.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(mock.spoken().len(), 1);
        assert_eq!(queue.pending_count(), 2);

        mock.finish_next();
        wait_until(|| mock.spoken().len() == 2).await;
    }

    #[tokio::test]
    async fn skip_discards_current_and_advances() {
        let mock = MockProvider::new();
        let queue = test_queue(mock.clone());

        queue.enqueue(QueuedAnnouncement::new("first", "first", 2));
        queue.enqueue(QueuedAnnouncement::new("second", "second", 2));
        wait_until(|| mock.spoken().len() == 1).await;

        queue.skip();
        wait_until(|| mock.spoken().len() == 2).await;

        assert_eq!(mock.spoken(), vec!["first", "second"]);
        assert_eq!(queue.pending_count(), 0);
        assert_eq!(queue.current_announcement_text().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn clear_empties_pending_and_goes_idle() {
        let mock = MockProvider::new();
        let queue = test_queue(mock.clone());

        queue.enqueue(QueuedAnnouncement::new("x", "x", 2));
        queue.enqueue(QueuedAnnouncement::new("y", "y", 2));
        queue.enqueue(QueuedAnnouncement::new("z", "z", 2));
        wait_until(|| mock.spoken().len() == 1).await;

        queue.clear();
        assert_eq!(queue.pending_count(), 0);
        wait_until(|| !queue.is_active()).await;

        // Only the interrupted first item ever reached the voice.
        assert_eq!(mock.spoken(), vec!["x"]);
    }

    #[tokio::test]
    async fn settings_changes_apply_from_the_next_announcement() {
        let mock = MockProvider::new();
        let settings = Arc::new(SettingsStore::ephemeral(AnnouncementSettings::default()));
        let queue = AnnouncementQueue::new(settings.clone())
            .with_gap(Duration::from_millis(5))
            .with_provider_factory({
                let mock = mock.clone();
                Arc::new(move |_, _| mock.clone() as Arc<dyn TtsProvider>)
            });

        queue.enqueue(QueuedAnnouncement::new("first", "first", 2));
        queue.enqueue(QueuedAnnouncement::new("second", "second", 2));
        wait_until(|| mock.spoken().len() == 1).await;

        // The first announcement is mid-delivery; its options are fixed.
        settings.update(|s| s.tts_rate = 1.5).unwrap();
        mock.finish_next();
        wait_until(|| mock.spoken().len() == 2).await;

        assert_eq!(mock.rates(), vec![0.9, 1.5]);
    }

    #[tokio::test]
    async fn clear_reports_idle_status_immediately() {
        let mock = MockProvider::new();
        let queue = test_queue(mock.clone());

        queue.enqueue(QueuedAnnouncement::new("x", "x", 2));
        queue.enqueue(QueuedAnnouncement::new("y", "y", 2));
        wait_until(|| mock.spoken().len() == 1).await;

        queue.clear();
        let status = queue.status();
        assert!(!status.is_speaking);
        assert_eq!(status.current_text, None);
        assert_eq!(status.pending_count, 0);
        assert!(!queue.is_active());
    }

    #[tokio::test]
    async fn delivery_failure_advances_the_queue() {
        struct FailingProvider;
        impl TtsProvider for FailingProvider {
            fn name(&self) -> &str {
                "Failing"
            }
            fn speak(&self, _text: &str, _options: SpeakOptions) -> anyhow::Result<()> {
                anyhow::bail!("synthesis engine unavailable")
            }
            fn stop(&self) {}
            fn is_available(&self) -> bool {
                true
            }
        }

        let settings = Arc::new(SettingsStore::ephemeral(AnnouncementSettings::default()));
        let queue = AnnouncementQueue::new(settings)
            .with_gap(Duration::from_millis(5))
            .with_provider_factory(Arc::new(|_, _| {
                Arc::new(FailingProvider) as Arc<dyn TtsProvider>
            }));

        queue.enqueue(QueuedAnnouncement::new("x", "x", 2));
        queue.enqueue(QueuedAnnouncement::new("y", "y", 2));
        wait_until(|| !queue.is_active()).await;
    }

    #[tokio::test]
    async fn queue_reports_current_text_only_while_speaking() {
        let mock = MockProvider::new();
        let queue = test_queue(mock.clone());
        assert_eq!(queue.current_announcement_text(), None);

        queue.enqueue(QueuedAnnouncement::new("x", "five minutes", 2));
        wait_until(|| mock.spoken().len() == 1).await;
        assert_eq!(
            queue.current_announcement_text().as_deref(),
            Some("five minutes")
        );

        mock.finish_next();
        wait_until(|| !queue.is_active()).await;
        assert_eq!(queue.current_announcement_text(), None);
    }
}
