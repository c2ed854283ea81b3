//! Playback queue abstraction
//!
//! The player only needs positional access and advance rules; the shell
//! decides what a queue actually is. [`MemoryQueue`] is the standalone
//! implementation used by the binary and the tests.

use chrono::{DateTime, Utc};

/// Repeat behavior when the queue end is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Repeat {
    #[default]
    Off,
    /// Repeat the current entry
    Single,
    /// Wrap around to the first entry
    All,
}

/// One queued piece of media.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub url: String,
    /// Already played in this session (resume bookkeeping)
    pub played: bool,
    /// Added by the auto controller rather than the user
    pub auto_play: bool,
    /// Known duration, for the total-time estimate
    pub playtime_ms: Option<u64>,
}

impl QueueEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            played: false,
            auto_play: false,
            playtime_ms: None,
        }
    }
}

/// Queue operations the player depends on.
pub trait PlaybackQueue: Send {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of the entry on air, if any entry ever went on air
    fn current_position(&self) -> Option<usize>;

    fn set_current_position(&mut self, pos: usize);

    fn url_at(&self, pos: usize) -> Option<String>;

    fn entry_at(&self, pos: usize) -> Option<QueueEntry>;

    /// Position that would play after the current one.
    ///
    /// `respect_repeat` applies the repeat mode; the end-of-stream handler
    /// also probes without it to tell "queue really exhausted" apart from
    /// "wrapping around".
    fn next_position(&self, respect_repeat: bool) -> Option<usize>;

    fn mark_played(&mut self, pos: usize, played: bool);

    fn enqueue(&mut self, entry: QueueEntry);

    /// Whether recently-played metadata makes this track a poor automatic
    /// choice right now. Manual selections ignore this entirely.
    fn is_boring(&self, artist: &str, title: &str, now: DateTime<Utc>) -> bool;
}

/// In-memory queue.
pub struct MemoryQueue {
    entries: Vec<QueueEntry>,
    current: Option<usize>,
    pub repeat: Repeat,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            current: None,
            repeat: Repeat::Off,
        }
    }

    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut q = Self::new();
        for url in urls {
            q.entries.push(QueueEntry::new(url));
        }
        q
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }
}

impl PlaybackQueue for MemoryQueue {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn current_position(&self) -> Option<usize> {
        self.current
    }

    fn set_current_position(&mut self, pos: usize) {
        if pos < self.entries.len() {
            self.current = Some(pos);
        }
    }

    fn url_at(&self, pos: usize) -> Option<String> {
        self.entries.get(pos).map(|e| e.url.clone())
    }

    fn entry_at(&self, pos: usize) -> Option<QueueEntry> {
        self.entries.get(pos).cloned()
    }

    fn next_position(&self, respect_repeat: bool) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        let current = match self.current {
            Some(pos) => pos,
            // Nothing went on air yet, start at the front.
            None => return Some(0),
        };

        if respect_repeat && self.repeat == Repeat::Single {
            return Some(current);
        }
        if current + 1 < self.entries.len() {
            return Some(current + 1);
        }
        if respect_repeat && self.repeat == Repeat::All {
            return Some(0);
        }
        None
    }

    fn mark_played(&mut self, pos: usize, played: bool) {
        if let Some(entry) = self.entries.get_mut(pos) {
            entry.played = played;
        }
    }

    fn enqueue(&mut self, entry: QueueEntry) {
        self.entries.push(entry);
    }

    fn is_boring(&self, _artist: &str, _title: &str, _now: DateTime<Utc>) -> bool {
        false
    }
}
