//! Site features on top of the store, blob storage and identity ports.

mod calendar;
mod events;
mod sermons;

use std::time::Duration;

use crate::constants::{DEFAULT_FAN_OUT, DEFAULT_STALE_TIME};

pub use calendar::CalendarService;
pub use events::{EventImage, EventService, NewEvent, inferred_recurrence};
pub use sermons::{SermonService, SermonUpload};

/// How event and sermon listings are produced and cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSettings {
    /// Instances generated per weekly template
    pub fan_out: usize,
    /// How long a listing is served before it is read again
    pub stale_time: Duration,
}

impl Default for EventSettings {
    fn default() -> Self {
        EventSettings {
            fan_out: DEFAULT_FAN_OUT,
            stale_time: DEFAULT_STALE_TIME,
        }
    }
}
