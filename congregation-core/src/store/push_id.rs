//! Chronologically ordered child keys.
//!
//! Keys are 20 characters: 8 encoding the creation time in milliseconds and
//! 12 random. The alphabet is in ASCII order, so keys sort by creation time,
//! and keys generated within the same millisecond sort in generation order.

use std::sync::Mutex;

use chrono::Utc;
use rand::Rng;

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

const TIME_CHARS: usize = 8;
const RANDOM_CHARS: usize = 12;

#[derive(Debug, Default)]
struct State {
    last_time: i64,
    last_random: [u8; RANDOM_CHARS],
}

#[derive(Debug, Default)]
pub struct PushIdGenerator {
    state: Mutex<State>,
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A key for the current time.
    pub fn generate(&self) -> String {
        self.generate_at(Utc::now().timestamp_millis())
    }

    /// A key for `millis` since the epoch.
    pub fn generate_at(&self, millis: i64) -> String {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let duplicate = millis == state.last_time;
        state.last_time = millis;

        let mut key = Vec::with_capacity(TIME_CHARS + RANDOM_CHARS);

        let mut time = millis.max(0) as u64;
        let mut time_chars = [0u8; TIME_CHARS];
        for slot in time_chars.iter_mut().rev() {
            *slot = PUSH_CHARS[(time % 64) as usize];
            time /= 64;
        }
        key.extend_from_slice(&time_chars);

        if duplicate {
            // Same millisecond: bump the previous random part by one
            let mut i = RANDOM_CHARS - 1;
            while i > 0 && state.last_random[i] == 63 {
                state.last_random[i] = 0;
                i -= 1;
            }
            state.last_random[i] = (state.last_random[i] + 1) % 64;
        } else {
            let mut rng = rand::thread_rng();
            for slot in state.last_random.iter_mut() {
                *slot = rng.gen_range(0..64);
            }
        }

        key.extend(state.last_random.iter().map(|&i| PUSH_CHARS[i as usize]));

        // Every byte comes from PUSH_CHARS, which is ASCII
        String::from_utf8_lossy(&key).into_owned()
    }
}
