use serde::{Deserialize, Serialize};

/// Ticks arrive roughly once a second and rarely land exactly on a trigger
/// value. An entry fires when the remaining time is at or below its trigger
/// and within this many seconds of it, which tolerates tick jitter while
/// bounding how late a firing may be accepted.
pub const WINDOW_SECONDS: u64 = 3;

/// One announcement rule belonging to a single timer's schedule.
///
/// `has_been_spoken` latches true the moment the entry fires and is only
/// cleared when the owning timer is reset, so an entry speaks at most once
/// per timer run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub id: String,
    pub trigger_at_seconds: u64,
    /// Template string; resolved against the timer at fire time.
    pub message: String,
    pub enabled: bool,
    #[serde(default)]
    pub has_been_spoken: bool,
}

impl ScheduleEntry {
    pub fn new(id: impl Into<String>, trigger_at_seconds: u64, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            trigger_at_seconds,
            message: message.into(),
            enabled: true,
            has_been_spoken: false,
        }
    }

    /// Whether this entry should fire for the given remaining time.
    pub fn is_due(&self, remaining_seconds: u64) -> bool {
        self.enabled
            && !self.has_been_spoken
            && remaining_seconds <= self.trigger_at_seconds
            && remaining_seconds + WINDOW_SECONDS >= self.trigger_at_seconds
    }
}

/// The schedule cloned into every new timer. Trigger points and wording match
/// the shipped defaults; users edit per-timer copies from the settings panel.
pub fn default_schedule() -> Vec<ScheduleEntry> {
    vec![
        ScheduleEntry::new(
            "default-60min",
            3600,
            "{program}, you have one hour remaining.",
        ),
        ScheduleEntry::new(
            "default-30min",
            1800,
            "{program}, you have thirty minutes remaining.",
        ),
        ScheduleEntry::new(
            "default-15min",
            900,
            "{program}, you have fifteen minutes remaining.",
        ),
        ScheduleEntry::new(
            "default-10min",
            600,
            "{program}, you have ten minutes remaining. \
             Please ensure your student ID is visible on your desk.",
        ),
        ScheduleEntry::new(
            "default-5min",
            300,
            "{program}, you have five minutes remaining. \
             Please put your scannables on top of your question papers.",
        ),
        ScheduleEntry::new(
            "default-1min",
            60,
            "{program}, you have one minute remaining.",
        ),
        ScheduleEntry::new(
            "default-end",
            0,
            "Time is up for {program}. Stop writing. Put your pens down. \
             Do not turn your papers over.",
        ),
    ]
}
