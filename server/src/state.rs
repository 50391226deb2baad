use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use scribblefusion_shared::PushMessage;
use tokio::sync::{broadcast, Mutex};

use crate::storage::Storage;

pub const DEFAULT_COUNTDOWN_SECS: u64 = 300;
pub const UPDATE_CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub updates: broadcast::Sender<String>,
    pub clock: Arc<SessionClock>,
    /// Held while a change is written to history and broadcast, so both see
    /// the same order.
    pub order: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, countdown_secs: u64) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            storage,
            updates,
            clock: Arc::new(SessionClock::new(countdown_secs)),
            order: Arc::new(Mutex::new(())),
        }
    }

    /// Sends to every connected participant. Returns the serialized payload.
    pub fn publish(&self, message: &PushMessage) -> Option<String> {
        let payload = match message.to_json() {
            Ok(payload) => payload,
            Err(error) => {
                tracing::error!("failed to serialize update: {error}");
                return None;
            }
        };
        // No receivers just means nobody is connected.
        let _ = self.updates.send(payload.clone());
        Some(payload)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    Running(u64),
    Expired,
}

/// Countdown until the shared canvas is wiped.
pub struct SessionClock {
    countdown_secs: u64,
    remaining: AtomicU64,
}

impl SessionClock {
    pub fn new(countdown_secs: u64) -> Self {
        let countdown_secs = countdown_secs.max(1);
        Self {
            countdown_secs,
            remaining: AtomicU64::new(countdown_secs),
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::Relaxed)
    }

    /// Advances one second. On expiry the countdown starts over.
    pub fn tick(&self) -> Tick {
        let next = self.remaining().saturating_sub(1);
        if next == 0 {
            self.remaining.store(self.countdown_secs, Ordering::Relaxed);
            Tick::Expired
        } else {
            self.remaining.store(next, Ordering::Relaxed);
            Tick::Running(next)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_counts_down_and_restarts() {
        let clock = SessionClock::new(3);
        assert_eq!(clock.remaining(), 3);
        assert_eq!(clock.tick(), Tick::Running(2));
        assert_eq!(clock.tick(), Tick::Running(1));
        assert_eq!(clock.tick(), Tick::Expired);
        assert_eq!(clock.remaining(), 3);
        assert_eq!(clock.tick(), Tick::Running(2));
    }

    #[test]
    fn zero_countdown_is_one_second() {
        let clock = SessionClock::new(0);
        assert_eq!(clock.tick(), Tick::Expired);
    }
}
