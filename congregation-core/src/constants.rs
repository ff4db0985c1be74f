//! Shared constants.

use std::time::Duration;

/// Number of upcoming occurrences generated per weekly template.
pub const DEFAULT_FAN_OUT: usize = 4;

/// How long a materialized list is served from cache before it is re-read.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * 60);

pub const UNTITLED_SERMON: &str = "Untitled Sermon";

pub const DEFAULT_PROFILE_PIC: &str = "https://api.dicebear.com/7.x/avatars/svg?seed=default";

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_AUDIO_BYTES: usize = 50 * 1024 * 1024;

pub const IMAGE_URL_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp"];

// Database paths
pub const EVENTS_PATH: &str = "events";
pub const SERMONS_PATH: &str = "sermons";
pub const USERS_PATH: &str = "users";
pub const USER_EVENTS_PATH: &str = "userEvents";
pub const VERIFICATION_CODES_PATH: &str = "verificationCodes";

// Blob storage prefixes
pub const EVENT_IMAGES_PREFIX: &str = "events";
pub const SERMON_AUDIO_PREFIX: &str = "sermons";
pub const PROFILE_PICS_PREFIX: &str = "profilePics";
