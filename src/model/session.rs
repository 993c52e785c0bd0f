//! The live recording session and its append-only event log.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};

use super::event::{EventPayload, EventRecord};

/// One recording session: identity, timing, the sequence counter and the
/// unflushed tail of the event log.
///
/// Owned exclusively by the attribution engine; trackers emit signals and
/// never touch this. `sequence` holds the next number to assign, so events
/// are numbered contiguously from zero across chunk flushes.
#[derive(Debug)]
pub struct RecordingSession {
    pub session_id: String,
    /// Milliseconds since the Unix epoch
    pub start_time: u64,
    pub end_time: Option<u64>,
    /// Next sequence number to assign
    pub sequence: u64,
    /// Events not yet flushed to a chunk
    pub events: Vec<EventRecord>,
    /// Sequence value when the log was last drained to a chunk; redaction of
    /// an emptied tail rewinds to here, never into persisted territory.
    chunk_floor: u64,
}

impl RecordingSession {
    pub fn new(session_id: String, start_time: u64) -> Self {
        Self {
            session_id,
            start_time,
            end_time: None,
            sequence: 0,
            events: Vec::new(),
            chunk_floor: 0,
        }
    }

    /// Append an event, assigning it the next sequence number.
    pub fn push(&mut self, timestamp: u64, payload: EventPayload) -> u64 {
        let sequence = self.sequence;
        self.sequence += 1;
        self.events.push(EventRecord {
            sequence,
            timestamp,
            payload,
        });
        sequence
    }

    /// Take the unflushed tail for chunk persistence, leaving the log empty.
    pub fn drain_events(&mut self) -> Vec<EventRecord> {
        self.chunk_floor = self.sequence;
        std::mem::take(&mut self.events)
    }

    /// Remove every event with `timestamp >= cutoff` from the unflushed tail
    /// and rewind the sequence counter to the new tail. Returns the number of
    /// events removed. Already-persisted chunks are untouched.
    pub fn redact_since(&mut self, cutoff: u64) -> usize {
        let keep = self
            .events
            .iter()
            .position(|e| e.timestamp >= cutoff)
            .unwrap_or(self.events.len());
        let removed = self.events.len() - keep;
        self.events.truncate(keep);
        self.sequence = self
            .events
            .last()
            .map(|e| e.sequence + 1)
            .unwrap_or(self.chunk_floor);
        removed
    }
}

/// Generate a random session identifier: 64 bits of hex from `RandomState`
/// hashing seeded with extra time and process-id entropy.
pub fn generate_session_id() -> String {
    let state = RandomState::new();
    let mut hasher = state.build_hasher();
    hasher.write_u128(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0),
    );
    hasher.write_u32(std::process::id());
    format!("{:016x}", hasher.finish())
}
