use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
    Ended,
}

impl Default for TimerStatus {
    fn default() -> Self {
        TimerStatus::Idle
    }
}

/// Snapshot of one countdown session as the engine reports it.
///
/// The exam-specific fields (`course_code`, `program`, `student_count`) are
/// only present for exam-mode timers; quiz timers carry just a label. Missing
/// fields degrade to empty strings during template resolution rather than
/// erroring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerInfo {
    pub id: String,
    pub label: String,
    pub duration_seconds: u64,
    pub remaining_seconds: u64,
    pub status: TimerStatus,
    pub end_time_unix: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_count: Option<u32>,
}

impl TimerInfo {
    pub fn new(id: impl Into<String>, label: impl Into<String>, duration_seconds: u64) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            duration_seconds,
            remaining_seconds: duration_seconds,
            status: TimerStatus::Idle,
            end_time_unix: None,
            course_code: None,
            program: None,
            student_count: None,
        }
    }

    /// Attach exam metadata (course code, program, candidate count).
    pub fn with_exam_fields(
        mut self,
        course_code: impl Into<String>,
        program: impl Into<String>,
        student_count: u32,
    ) -> Self {
        self.course_code = Some(course_code.into());
        self.program = Some(program.into());
        self.student_count = Some(student_count);
        self
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.duration_seconds.saturating_sub(self.remaining_seconds)
    }
}

/// Per-second tick pushed by the engine for each running timer.
/// Field names follow the engine's wire payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerTick {
    pub id: String,
    pub remaining_seconds: u64,
    pub status: TimerStatus,
    pub end_time_unix: Option<u64>,
}
