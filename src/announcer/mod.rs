pub mod enhancer;
pub mod evaluator;
pub mod queue;
pub mod schedule;
pub mod service;
pub mod template;

pub use enhancer::Enhancer;
pub use evaluator::{DueAnnouncement, ScheduleEvaluator};
pub use queue::{AnnouncementQueue, QueueStatus, QueuedAnnouncement};
pub use schedule::{default_schedule, ScheduleEntry, WINDOW_SECONDS};
pub use service::{Announcer, AnnouncerStatus, ManualTarget};
pub use template::resolve_template;

/// Manual announcements typed by the invigilator; spoken before everything.
pub const PRIORITY_MANUAL: u8 = 0;
/// End-of-session announcements.
pub const PRIORITY_END: u8 = 1;
/// Scheduled milestone announcements.
pub const PRIORITY_MILESTONE: u8 = 2;
