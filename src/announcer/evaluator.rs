//! Per-timer schedule evaluation.
//!
//! Holds the registry of known timers and their announcement schedules and
//! examines each clock tick to decide which entries just became due. The
//! evaluation is fully synchronous — it returns the due work items and never
//! performs IO — so a tick is never delayed by enhancement or synthesis
//! latency; the caller runs the async part detached.

use std::collections::HashMap;

use crate::settings::AnnouncementSettings;
use crate::timer::{TimerInfo, TimerStatus, TimerTick};

use super::schedule::ScheduleEntry;
use super::template::resolve_template;
use super::{PRIORITY_END, PRIORITY_MILESTONE};

const ENABLE_LOGS: bool = false;
use crate::log_info;

/// Work item produced by a tick: text is resolved, enhancement and enqueue
/// happen downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueAnnouncement {
    pub id: String,
    pub text: String,
    pub priority: u8,
}

struct TrackedTimer {
    info: TimerInfo,
    schedule: Vec<ScheduleEntry>,
}

#[derive(Default)]
pub struct ScheduleEvaluator {
    timers: HashMap<String, TrackedTimer>,
}

impl ScheduleEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a timer with its own schedule (normally cloned from the default
    /// schedule at creation).
    pub fn insert_timer(&mut self, info: TimerInfo, schedule: Vec<ScheduleEntry>) {
        self.timers.insert(
            info.id.clone(),
            TrackedTimer { info, schedule },
        );
    }

    pub fn remove_timer(&mut self, timer_id: &str) {
        self.timers.remove(timer_id);
    }

    /// Replace a timer's schedule after a user edit. Unknown timers are
    /// ignored.
    pub fn update_schedule(&mut self, timer_id: &str, schedule: Vec<ScheduleEntry>) {
        if let Some(tracked) = self.timers.get_mut(timer_id) {
            tracked.schedule = schedule;
        }
    }

    pub fn schedule_of(&self, timer_id: &str) -> Option<&[ScheduleEntry]> {
        self.timers.get(timer_id).map(|t| t.schedule.as_slice())
    }

    pub fn timer(&self, timer_id: &str) -> Option<&TimerInfo> {
        self.timers.get(timer_id).map(|t| &t.info)
    }

    /// Apply one tick and return the announcements that just became due.
    ///
    /// Each due entry is latched (`has_been_spoken = true`) before this
    /// returns, so a rapid double-tick inside the firing window cannot fire
    /// it twice. A Running -> Ended transition additionally emits the global
    /// end message at end-of-session priority under its own
    /// `{timerId}-sys-end` id, independent of any 0-second schedule entry.
    /// A transition back to Idle (reset) re-arms every entry of that timer.
    pub fn evaluate_tick(
        &mut self,
        tick: &TimerTick,
        settings: &AnnouncementSettings,
    ) -> Vec<DueAnnouncement> {
        let Some(tracked) = self.timers.get_mut(&tick.id) else {
            log_info!("tick for unknown timer {}", tick.id);
            return Vec::new();
        };

        let previous_status = tracked.info.status;
        tracked.info.remaining_seconds = tick.remaining_seconds;
        tracked.info.status = tick.status;
        tracked.info.end_time_unix = tick.end_time_unix;

        if previous_status != TimerStatus::Idle && tick.status == TimerStatus::Idle {
            for entry in &mut tracked.schedule {
                entry.has_been_spoken = false;
            }
            return Vec::new();
        }

        if !settings.announcements_enabled {
            return Vec::new();
        }

        let mut due = Vec::new();

        if tick.status == TimerStatus::Running {
            for entry in &mut tracked.schedule {
                if entry.is_due(tick.remaining_seconds) {
                    entry.has_been_spoken = true;
                    due.push(DueAnnouncement {
                        id: format!("{}-{}", tracked.info.id, entry.id),
                        text: resolve_template(&entry.message, &tracked.info),
                        priority: if entry.trigger_at_seconds == 0 {
                            PRIORITY_END
                        } else {
                            PRIORITY_MILESTONE
                        },
                    });
                }
            }
        }

        if previous_status == TimerStatus::Running && tick.status == TimerStatus::Ended {
            due.push(DueAnnouncement {
                id: format!("{}-sys-end", tracked.info.id),
                text: resolve_template(&settings.end_message, &tracked.info),
                priority: PRIORITY_END,
            });
        }

        due
    }
}
