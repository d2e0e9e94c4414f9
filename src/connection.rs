use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Global counter for active proxy sessions
pub static ACTIVE_SESSIONS: AtomicUsize = AtomicUsize::new(0);

/// Upper bound on concurrently running sessions
pub const MAX_CONCURRENT_SESSIONS: usize = 10_000;

/// RAII guard tying a session to the global counter
pub struct ConnectionGuard {
    decremented: bool,
}

impl ConnectionGuard {
    /// Acquire a session slot, or `None` when the server is at
    /// [`MAX_CONCURRENT_SESSIONS`].
    pub fn try_new() -> Option<Self> {
        let mut current = ACTIVE_SESSIONS.load(Ordering::Relaxed);

        loop {
            if current >= MAX_CONCURRENT_SESSIONS {
                return None;
            }

            match ACTIVE_SESSIONS.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(Self { decremented: false }),
                Err(observed) => current = observed,
            }
        }
    }

    /// Release the slot early; drop releases it otherwise
    pub fn decrement(&mut self) {
        if !self.decremented {
            ACTIVE_SESSIONS.fetch_sub(1, Ordering::Relaxed);
            self.decremented = true;
        }
    }

    pub fn active_count() -> usize {
        ACTIVE_SESSIONS.load(Ordering::Relaxed)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.decrement();
    }
}

/// Per-IP session counts for the accept-time cap
pub struct IpConnectionTracker {
    connections: RwLock<HashMap<IpAddr, usize>>,
}

impl IpConnectionTracker {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Claim a slot for `ip` unless that would exceed `limit`.
    /// Returns the new count on success.
    pub async fn try_increment(&self, ip: IpAddr, limit: usize) -> Option<usize> {
        let mut connections = self.connections.write().await;
        let entry = connections.entry(ip).or_insert(0);
        if *entry >= limit {
            return None;
        }
        *entry += 1;
        Some(*entry)
    }

    pub async fn decrement(&self, ip: IpAddr) {
        let mut connections = self.connections.write().await;
        if let Some(entry) = connections.get_mut(&ip) {
            if *entry > 0 {
                *entry -= 1;
            }
            if *entry == 0 {
                connections.remove(&ip);
            }
        }
    }

    pub async fn get_count(&self, ip: IpAddr) -> usize {
        let connections = self.connections.read().await;
        connections.get(&ip).copied().unwrap_or(0)
    }
}

impl Default for IpConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Global IP tracker instance
pub static IP_TRACKER: std::sync::OnceLock<IpConnectionTracker> = std::sync::OnceLock::new();

pub fn get_ip_tracker() -> &'static IpConnectionTracker {
    IP_TRACKER.get_or_init(IpConnectionTracker::new)
}
