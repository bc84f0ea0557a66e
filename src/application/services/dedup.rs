//! Bounded seen-set of message ids.
//!
//! Remembers an id for at most `ttl` and holds at most `capacity` ids; the
//! oldest entries go first when either bound is hit. Time is read from the
//! tokio clock so expiry follows a paused test runtime.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct DedupWindow {
    ttl: Duration,
    capacity: usize,
    seen: HashMap<String, Instant>,
    order: VecDeque<(String, Instant)>,
}

impl DedupWindow {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            seen: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Record `id`. Returns `false` if it was already in the window.
    pub fn insert(&mut self, id: &str) -> bool {
        self.insert_at(id, Instant::now())
    }

    pub fn insert_at(&mut self, id: &str, now: Instant) -> bool {
        self.evict_expired(now);

        if self.seen.contains_key(id) {
            return false;
        }

        while self.seen.len() >= self.capacity {
            match self.order.pop_front() {
                Some((oldest, at)) => self.forget(&oldest, at),
                None => break,
            }
        }

        self.seen.insert(id.to_string(), now);
        self.order.push_back((id.to_string(), now));
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some((_, at)) = self.order.front() {
            if now.saturating_duration_since(*at) < self.ttl {
                break;
            }
            if let Some((id, at)) = self.order.pop_front() {
                self.forget(&id, at);
            }
        }
    }

    // Only drop the map entry if it still belongs to this queue slot.
    fn forget(&mut self, id: &str, at: Instant) {
        if self.seen.get(id) == Some(&at) {
            self.seen.remove(id);
        }
    }
}
