use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Per-user routing state
#[derive(Debug)]
pub struct Session {
    active_command: Option<String>,
    last_image_url: Option<String>,
    last_seen: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            active_command: None,
            last_image_url: None,
            last_seen: Instant::now(),
        }
    }

    pub fn active_command(&self) -> Option<&str> {
        self.active_command.as_deref()
    }

    pub fn activate(&mut self, command: &str) {
        self.active_command = Some(command.to_string());
    }

    /// Back to idle. Returns the command that was active, if any.
    pub fn deactivate(&mut self) -> Option<String> {
        self.active_command.take()
    }

    #[cfg(test)]
    pub fn last_image_url(&self) -> Option<&str> {
        self.last_image_url.as_deref()
    }

    pub fn remember_image(&mut self, url: &str) {
        if let Some(previous) = self.last_image_url.replace(url.to_string()) {
            debug!("Replacing previous image {}", previous);
        }
    }
}

/// In-memory session store with one lock per user.
///
/// `acquire` hands out an owned guard; holding it for a whole event keeps two
/// events from the same user from interleaving their reads and writes.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<Mutex<Session>>>>,
    idle_ttl: Duration,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_ttl,
        }
    }

    /// Lock the session for `key`, creating it on first use.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<Session> {
        let entry = {
            let mut sessions = self.sessions.lock().await;
            sessions
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Session::new())))
                .clone()
        };

        let mut guard = entry.lock_owned().await;
        guard.last_seen = Instant::now();
        guard
    }

    /// Drop sessions idle for at least the TTL. Sessions an in-flight event
    /// holds (or is about to lock) are kept. Returns how many were removed.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        let ttl = self.idle_ttl;

        sessions.retain(|_, session| {
            if Arc::strong_count(session) > 1 {
                return true;
            }
            match session.try_lock() {
                Ok(session) => session.last_seen.elapsed() < ttl,
                Err(_) => true,
            }
        });

        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
