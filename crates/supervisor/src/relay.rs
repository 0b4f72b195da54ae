//! In-memory buffer and live fan-out for server output lines.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::broadcast;

/// Default number of lines kept in the relay.
pub const DEFAULT_LOG_CAPACITY: usize = 2000;

/// Buffered lines per live subscriber before it starts lagging.
const SUBSCRIBER_BUFFER: usize = 256;

/// Append-only buffer of server output lines with live fan-out.
///
/// Lines are stored in arrival order in a fixed-capacity ring; when full,
/// the oldest line is evicted on each append. Subscribers receive lines
/// from the moment of subscription onward with no history replay; a
/// viewer wanting history takes a [`snapshot`](Self::snapshot) first, then
/// subscribes. A slow subscriber lags (misses lines) rather than blocking
/// the relay.
///
/// The buffer outlives any single server run: a stop does not clear it,
/// so lines from earlier runs stay visible for the rest of the session.
pub struct LogRelay {
    lines: Mutex<Ring>,
    live_tx: broadcast::Sender<String>,
}

struct Ring {
    buf: VecDeque<String>,
    capacity: usize,
}

impl LogRelay {
    /// Creates a relay keeping at most `capacity` lines.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "LogRelay capacity must be > 0");
        let (live_tx, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            lines: Mutex::new(Ring {
                buf: VecDeque::with_capacity(capacity),
                capacity,
            }),
            live_tx,
        }
    }

    /// Appends a line, evicting the oldest when at capacity, then pushes
    /// it to live subscribers. Never rejects.
    pub fn append(&self, line: String) {
        {
            let mut ring = self.lines.lock().unwrap();
            if ring.buf.len() == ring.capacity {
                ring.buf.pop_front();
            }
            ring.buf.push_back(line.clone());
        }
        // Err here just means nobody is subscribed.
        let _ = self.live_tx.send(line);
    }

    /// All buffered lines, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().unwrap().buf.iter().cloned().collect()
    }

    /// Subscribes to lines appended after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.live_tx.subscribe()
    }

    /// Number of lines currently buffered.
    pub fn len(&self) -> usize {
        self.lines.lock().unwrap().buf.len()
    }

    /// Whether the buffer holds no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.lock().unwrap().buf.is_empty()
    }

    /// Maximum number of lines the relay keeps.
    pub fn capacity(&self) -> usize {
        self.lines.lock().unwrap().capacity
    }
}

impl Default for LogRelay {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}
