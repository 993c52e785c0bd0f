//! Chunked persistence of the session event log.
//!
//! The in-memory log is serialized into compressed, versioned chunks on a
//! timer and at session end; draining the log into a chunk is the sole
//! mechanism bounding memory over an arbitrarily long session. Writes are
//! atomic (temp file + rename) so a crash mid-save never leaves a truncated
//! chunk behind.

use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::model::event::EventRecord;

/// Format version written into every chunk.
pub const CHUNK_FORMAT_VERSION: &str = "2.0";

/// One persisted slice of a session's event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionChunk {
    pub version: String,
    pub session_id: String,
    /// Milliseconds since the Unix epoch
    pub start_time: u64,
    pub chunk_index: u32,
    pub events: Vec<EventRecord>,
}

/// Writes a session's chunks into the export directory.
#[derive(Debug)]
pub struct ChunkStore {
    export_dir: PathBuf,
    session_id: String,
    /// Session start formatted for filenames
    stamp: String,
    chunk_index: u32,
}

impl ChunkStore {
    pub fn new(export_dir: &Path, session_id: &str, start_time: u64) -> Self {
        Self {
            export_dir: export_dir.to_path_buf(),
            session_id: session_id.to_string(),
            stamp: format_stamp(start_time),
            chunk_index: 0,
        }
    }

    /// Ensure the export directory exists and is writable.
    pub fn ensure_dir(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.export_dir)
    }

    /// The filename stamp shared by this session's artifacts.
    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    fn chunk_path(&self, index: u32) -> PathBuf {
        self.export_dir.join(format!(
            "{}_{}_{:03}.json.gz",
            self.stamp, self.session_id, index
        ))
    }

    /// Serialize `events` into the next chunk, compress and write it
    /// atomically. Returns the chunk's path.
    pub async fn write_chunk(
        &mut self,
        start_time: u64,
        events: Vec<EventRecord>,
    ) -> io::Result<PathBuf> {
        let chunk = SessionChunk {
            version: CHUNK_FORMAT_VERSION.to_string(),
            session_id: self.session_id.clone(),
            start_time,
            chunk_index: self.chunk_index,
            events,
        };

        let compressed = compress_json(&chunk)?;
        let path = self.chunk_path(self.chunk_index);
        atomic_write(&path, &compressed).await?;

        self.chunk_index += 1;
        tracing::debug!(
            "Wrote chunk {} ({} bytes) to {:?}",
            chunk.chunk_index,
            compressed.len(),
            path
        );
        Ok(path)
    }
}

/// Serialize a value to gzip-compressed JSON bytes.
pub fn compress_json<T: Serialize>(value: &T) -> io::Result<Vec<u8>> {
    let json = serde_json::to_vec(value).map_err(io::Error::other)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    encoder.finish()
}

/// Read a chunk file back, decompressing and parsing it.
pub fn read_chunk(path: &Path) -> io::Result<SessionChunk> {
    let bytes = std::fs::read(path)?;
    let mut decoder = flate2::read::GzDecoder::new(bytes.as_slice());
    let mut json = String::new();
    io::Read::read_to_string(&mut decoder, &mut json)?;
    serde_json::from_str(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Write bytes to a temp file next to the target, then rename into place.
async fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

/// Format a session start time as the filename stamp.
fn format_stamp(start_time: u64) -> String {
    chrono::DateTime::from_timestamp_millis(start_time as i64)
        .map(|dt| dt.format("%Y%m%d-%H%M%S").to_string())
        .unwrap_or_else(|| start_time.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::event::{ActionSource, EventPayload};
    use tempfile::TempDir;

    fn sample_events() -> Vec<EventRecord> {
        vec![EventRecord {
            sequence: 0,
            timestamp: 1234,
            payload: EventPayload::TabSwitch {
                source: ActionSource::User,
                file: Some("a.txt".to_string()),
            },
        }]
    }

    #[tokio::test]
    async fn test_chunk_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut store = ChunkStore::new(dir.path(), "abc123", 1_700_000_000_000);
        store.ensure_dir().unwrap();

        let path = store
            .write_chunk(1_700_000_000_000, sample_events())
            .await
            .unwrap();

        let chunk = read_chunk(&path).unwrap();
        assert_eq!(chunk.version, CHUNK_FORMAT_VERSION);
        assert_eq!(chunk.session_id, "abc123");
        assert_eq!(chunk.chunk_index, 0);
        assert_eq!(chunk.events, sample_events());
    }

    #[tokio::test]
    async fn test_filename_encodes_stamp_id_and_padded_index() {
        let dir = TempDir::new().unwrap();
        let mut store = ChunkStore::new(dir.path(), "abc123", 1_700_000_000_000);
        store.ensure_dir().unwrap();

        let first = store.write_chunk(0, sample_events()).await.unwrap();
        let second = store.write_chunk(0, sample_events()).await.unwrap();

        let first_name = first.file_name().unwrap().to_string_lossy().into_owned();
        let second_name = second.file_name().unwrap().to_string_lossy().into_owned();
        assert!(first_name.ends_with("_abc123_000.json.gz"), "{first_name}");
        assert!(second_name.ends_with("_abc123_001.json.gz"), "{second_name}");
        assert!(first_name.starts_with(store.stamp()));
    }

    #[tokio::test]
    async fn test_no_tmp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let mut store = ChunkStore::new(dir.path(), "abc123", 0);
        store.ensure_dir().unwrap();
        store.write_chunk(0, sample_events()).await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_chunk_json_uses_camel_case_keys() {
        let chunk = SessionChunk {
            version: CHUNK_FORMAT_VERSION.to_string(),
            session_id: "s".to_string(),
            start_time: 7,
            chunk_index: 2,
            events: vec![],
        };
        let json = serde_json::to_value(&chunk).unwrap();
        assert!(json.get("sessionId").is_some());
        assert!(json.get("startTime").is_some());
        assert!(json.get("chunkIndex").is_some());
    }
}
