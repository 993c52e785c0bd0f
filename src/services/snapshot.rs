//! Workspace snapshot capture.
//!
//! Before the first agent-attributed change of a batch, the whole tracked
//! workspace is captured out-of-band as compressed JSON mapping relative
//! path to full text. Binary and oversized files are excluded. Artifacts
//! larger than the part-size ceiling are split into fixed-size `.partNNN`
//! files so the upload transport never sees an unbounded body.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use super::persistence::compress_json;

/// Captures and writes workspace snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    root: PathBuf,
    export_dir: PathBuf,
    max_file_bytes: u64,
    part_bytes: usize,
}

impl SnapshotWriter {
    pub fn new(root: &Path, export_dir: &Path, max_file_bytes: u64, part_bytes: usize) -> Self {
        Self {
            root: root.to_path_buf(),
            export_dir: export_dir.to_path_buf(),
            max_file_bytes,
            part_bytes: part_bytes.max(1),
        }
    }

    /// The artifact name for snapshot `index` of a session.
    pub fn artifact_name(stamp: &str, session_id: &str, index: u32) -> String {
        format!("{stamp}_{session_id}_snapshot{index:03}.json.gz")
    }

    /// Walk the workspace and collect relative path -> content for every
    /// trackable text file. Blocking; run via `spawn_blocking`.
    pub fn collect(&self) -> BTreeMap<String, String> {
        let mut files = BTreeMap::new();
        for entry in ignore::WalkBuilder::new(&self.root).build().flatten() {
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            if entry
                .metadata()
                .map(|m| m.len() > self.max_file_bytes)
                .unwrap_or(true)
            {
                continue;
            }
            let Ok(bytes) = std::fs::read(path) else {
                continue;
            };
            if bytes.contains(&0) {
                continue;
            }
            let Ok(content) = String::from_utf8(bytes) else {
                continue;
            };
            files.insert(relative.to_string_lossy().into_owned(), content);
        }
        files
    }

    /// Capture the workspace and write the artifact, splitting into parts
    /// above the size ceiling. Returns the written paths. Blocking; run via
    /// `spawn_blocking`.
    pub fn write(&self, artifact: &str) -> io::Result<Vec<PathBuf>> {
        let files = self.collect();
        let compressed = compress_json(&files)?;
        std::fs::create_dir_all(&self.export_dir)?;

        if compressed.len() <= self.part_bytes {
            let path = self.export_dir.join(artifact);
            std::fs::write(&path, &compressed)?;
            return Ok(vec![path]);
        }

        let mut paths = Vec::new();
        for (i, part) in compressed.chunks(self.part_bytes).enumerate() {
            let path = self
                .export_dir
                .join(format!("{artifact}.part{:03}", i + 1));
            std::fs::write(&path, part)?;
            paths.push(path);
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn writer(workspace: &TempDir, export: &TempDir, part_bytes: usize) -> SnapshotWriter {
        SnapshotWriter::new(workspace.path(), export.path(), 100 * 1024, part_bytes)
    }

    fn decompress(paths: &[PathBuf]) -> BTreeMap<String, String> {
        let mut bytes = Vec::new();
        for path in paths {
            bytes.extend(std::fs::read(path).unwrap());
        }
        let mut decoder = flate2::read::GzDecoder::new(bytes.as_slice());
        let mut json = String::new();
        decoder.read_to_string(&mut json).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_snapshot_collects_text_files() {
        let workspace = TempDir::new().unwrap();
        let export = TempDir::new().unwrap();
        std::fs::write(workspace.path().join("a.txt"), "alpha").unwrap();
        std::fs::create_dir(workspace.path().join("sub")).unwrap();
        std::fs::write(workspace.path().join("sub/b.txt"), "beta").unwrap();
        // Null bytes mark a binary file; it must be excluded.
        std::fs::write(workspace.path().join("bin.dat"), [b'a', 0, b'b']).unwrap();

        let paths = writer(&workspace, &export, 5 * 1024 * 1024)
            .write("snap.json.gz")
            .unwrap();
        assert_eq!(paths.len(), 1);

        let files = decompress(&paths);
        assert_eq!(files.get("a.txt").unwrap(), "alpha");
        assert_eq!(files.get("sub/b.txt").unwrap(), "beta");
        assert!(!files.contains_key("bin.dat"));
    }

    #[test]
    fn test_oversized_artifact_splits_into_parts() {
        let workspace = TempDir::new().unwrap();
        let export = TempDir::new().unwrap();
        // Random-ish content so gzip cannot collapse it below the part size.
        let mut blob = String::new();
        for i in 0..20_000u32 {
            blob.push_str(&format!("{i:x}"));
        }
        std::fs::write(workspace.path().join("big.txt"), &blob).unwrap();

        let paths = writer(&workspace, &export, 1024).write("snap.json.gz").unwrap();
        assert!(paths.len() > 1, "expected multiple parts");
        assert!(paths[0].to_string_lossy().ends_with(".part001"));

        // Concatenated parts reassemble into the original artifact.
        let files = decompress(&paths);
        assert_eq!(files.get("big.txt").unwrap(), &blob);
    }

    #[test]
    fn test_artifact_name_is_zero_padded() {
        assert_eq!(
            SnapshotWriter::artifact_name("20240101-000000", "abc", 7),
            "20240101-000000_abc_snapshot007.json.gz"
        );
    }
}
