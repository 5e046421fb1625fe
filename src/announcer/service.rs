//! The announcer service: the composition root of the subsystem.
//!
//! Owns the queue, the evaluator, and the enhancer; one instance exists per
//! running application, constructed explicitly and passed by reference to
//! whatever needs to announce. Ticks arrive over an mpsc channel from the
//! countdown engine; the UI calls the registration and manual-announcement
//! methods directly.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::settings::SettingsStore;
use crate::timer::{TimerInfo, TimerTick};

use super::enhancer::Enhancer;
use super::evaluator::ScheduleEvaluator;
use super::queue::{AnnouncementQueue, QueueStatus, QueuedAnnouncement};
use super::schedule::ScheduleEntry;
use super::template::resolve_template;
use super::PRIORITY_MANUAL;

const ENABLE_LOGS: bool = true;
use crate::log_info;

/// Destination of a manual announcement.
#[derive(Debug, Clone)]
pub enum ManualTarget {
    /// Resolve the template against one timer before speaking.
    Timer(String),
    /// Speak to the whole room; the text passes through unresolved.
    All,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncerStatus {
    #[serde(flatten)]
    pub queue: QueueStatus,
}

#[derive(Clone)]
pub struct Announcer {
    settings: Arc<SettingsStore>,
    queue: AnnouncementQueue,
    evaluator: Arc<Mutex<ScheduleEvaluator>>,
    enhancer: Enhancer,
}

impl Announcer {
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        Self {
            queue: AnnouncementQueue::new(settings.clone()),
            evaluator: Arc::new(Mutex::new(ScheduleEvaluator::new())),
            enhancer: Enhancer::new(),
            settings,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_queue(settings: Arc<SettingsStore>, queue: AnnouncementQueue) -> Self {
        Self {
            queue,
            evaluator: Arc::new(Mutex::new(ScheduleEvaluator::new())),
            enhancer: Enhancer::new(),
            settings,
        }
    }

    // ── Timer registry ────────────────────────────────────────────────

    /// Track a new timer, seeding its schedule from the configured default.
    /// Dedup keys are `{timerId}-{entryId}`, so timers sharing the default
    /// schedule never collide in the queue.
    pub async fn register_timer(&self, info: TimerInfo) {
        let schedule = self
            .settings
            .snapshot()
            .default_schedule
            .into_iter()
            .map(|mut entry| {
                entry.has_been_spoken = false;
                entry
            })
            .collect();
        self.register_timer_with_schedule(info, schedule).await;
    }

    pub async fn register_timer_with_schedule(
        &self,
        info: TimerInfo,
        schedule: Vec<ScheduleEntry>,
    ) {
        log_info!("tracking timer {} ({})", info.id, info.label);
        self.evaluator.lock().await.insert_timer(info, schedule);
    }

    pub async fn remove_timer(&self, timer_id: &str) {
        self.evaluator.lock().await.remove_timer(timer_id);
    }

    pub async fn update_schedule(&self, timer_id: &str, schedule: Vec<ScheduleEntry>) {
        self.evaluator
            .lock()
            .await
            .update_schedule(timer_id, schedule);
    }

    pub async fn schedule_of(&self, timer_id: &str) -> Option<Vec<ScheduleEntry>> {
        self.evaluator
            .lock()
            .await
            .schedule_of(timer_id)
            .map(|s| s.to_vec())
    }

    // ── Tick intake ───────────────────────────────────────────────────

    /// Consume ticks until the channel closes or `cancel` fires.
    pub fn spawn_tick_loop(
        &self,
        mut ticks: mpsc::Receiver<TimerTick>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let announcer = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    tick = ticks.recv() => {
                        match tick {
                            Some(tick) => announcer.handle_tick(tick).await,
                            None => break,
                        }
                    }
                    _ = cancel.cancelled() => {
                        log_info!("tick loop shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Evaluate one tick. The synchronous part latches due entries and
    /// returns immediately; enhancement and enqueue run detached so network
    /// latency never delays tick handling for other timers.
    pub async fn handle_tick(&self, tick: TimerTick) {
        let settings = self.settings.snapshot();
        let due = {
            let mut evaluator = self.evaluator.lock().await;
            evaluator.evaluate_tick(&tick, &settings)
        };

        for item in due {
            let queue = self.queue.clone();
            let enhancer = self.enhancer.clone();
            let settings = settings.clone();
            tokio::spawn(async move {
                let text = enhancer.enhance(&item.text, &settings).await;
                queue.enqueue(QueuedAnnouncement::new(item.id, text, item.priority));
            });
        }
    }

    // ── Manual announcements ──────────────────────────────────────────

    /// Speak operator-entered text ahead of everything pending. Bypasses the
    /// schedule and the enhancer; resolved against the target timer when one
    /// is named.
    pub async fn enqueue_manual(&self, text: &str, target: ManualTarget) {
        let resolved = match &target {
            ManualTarget::Timer(timer_id) => {
                let evaluator = self.evaluator.lock().await;
                match evaluator.timer(timer_id) {
                    Some(info) => resolve_template(text, info),
                    None => text.to_string(),
                }
            }
            ManualTarget::All => text.to_string(),
        };

        let id = format!("manual-{}", Uuid::new_v4());
        self.queue
            .enqueue(QueuedAnnouncement::new(id, resolved, PRIORITY_MANUAL));
    }

    // ── Queue control ─────────────────────────────────────────────────

    pub fn skip(&self) {
        self.queue.skip();
    }

    pub fn clear(&self) {
        self.queue.clear();
    }

    pub fn status(&self) -> AnnouncerStatus {
        AnnouncerStatus {
            queue: self.queue.status(),
        }
    }

    pub fn queue(&self) -> &AnnouncementQueue {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::AnnouncementSettings;
    use crate::timer::TimerStatus;
    use crate::tts::{SpeakOptions, TtsProvider};
    use std::sync::Mutex as StdMutex;
    use std::time::{Duration, Instant};

    struct InstantProvider {
        spoken: Arc<StdMutex<Vec<String>>>,
    }

    impl TtsProvider for InstantProvider {
        fn name(&self) -> &str {
            "Instant"
        }
        fn speak(&self, text: &str, options: SpeakOptions) -> anyhow::Result<()> {
            self.spoken.lock().unwrap().push(text.to_string());
            if let Some(ended) = options.on_ended {
                ended();
            }
            Ok(())
        }
        fn stop(&self) {}
        fn is_available(&self) -> bool {
            true
        }
    }

    fn test_announcer() -> (Announcer, Arc<StdMutex<Vec<String>>>) {
        let spoken = Arc::new(StdMutex::new(Vec::new()));
        let spoken_for_factory = spoken.clone();
        let settings = Arc::new(SettingsStore::ephemeral(AnnouncementSettings::default()));
        let queue = AnnouncementQueue::new(settings.clone())
            .with_gap(Duration::from_millis(1))
            .with_provider_factory(Arc::new(move |_, _| {
                Arc::new(InstantProvider {
                    spoken: spoken_for_factory.clone(),
                }) as Arc<dyn TtsProvider>
            }));
        (Announcer::with_queue(settings, queue), spoken)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met within 2s");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn scheduled_announcement_flows_tick_to_speech() {
        let (announcer, spoken) = test_announcer();

        let mut info = TimerInfo::new("t1", "GEO101 · BSc Geomatics", 7200)
            .with_exam_fields("GEO101", "BSc Geomatics", 42);
        info.status = TimerStatus::Running;
        announcer.register_timer(info).await;

        announcer
            .handle_tick(TimerTick {
                id: "t1".into(),
                remaining_seconds: 300,
                status: TimerStatus::Running,
                end_time_unix: None,
            })
            .await;

        wait_until(|| !spoken.lock().unwrap().is_empty()).await;
        let spoken = spoken.lock().unwrap();
        assert!(spoken[0].starts_with("BSc Geomatics, you have five minutes remaining."));
    }

    #[tokio::test]
    async fn manual_announcement_resolves_against_target_timer() {
        let (announcer, spoken) = test_announcer();

        let mut info = TimerInfo::new("t1", "GEO101 · BSc Geomatics", 7200)
            .with_exam_fields("GEO101", "BSc Geomatics", 42);
        info.remaining_seconds = 600;
        announcer.register_timer(info).await;

        announcer
            .enqueue_manual("{program}: please remain seated.", ManualTarget::Timer("t1".into()))
            .await;
        wait_until(|| !spoken.lock().unwrap().is_empty()).await;
        assert_eq!(
            spoken.lock().unwrap()[0],
            "BSc Geomatics: please remain seated."
        );
    }

    #[tokio::test]
    async fn broadcast_manual_announcement_passes_through_unresolved() {
        let (announcer, spoken) = test_announcer();

        announcer
            .enqueue_manual("{program}: pens down.", ManualTarget::All)
            .await;
        wait_until(|| !spoken.lock().unwrap().is_empty()).await;
        assert_eq!(spoken.lock().unwrap()[0], "{program}: pens down.");
    }

    #[tokio::test]
    async fn tick_loop_stops_on_cancellation() {
        let (announcer, _spoken) = test_announcer();
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let handle = announcer.spawn_tick_loop(rx, cancel.clone());
        cancel.cancel();
        handle.await.unwrap();
        drop(tx);
    }

    #[tokio::test]
    async fn ticks_for_unknown_timers_are_ignored() {
        let (announcer, spoken) = test_announcer();
        announcer
            .handle_tick(TimerTick {
                id: "ghost".into(),
                remaining_seconds: 300,
                status: TimerStatus::Running,
                end_time_unix: None,
            })
            .await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(spoken.lock().unwrap().is_empty());
    }
}
