//! Best-effort upload of persisted artifacts.
//!
//! Two-step protocol: ask the control endpoint for a short-lived write URL,
//! then transfer the compressed bytes straight to it. Everything here is
//! non-fatal — a capture tool must never take its host down over a network
//! hiccup — so failures are logged and the next chunk simply tries again on
//! its own. Calls block on `ureq`; the engine runs them via
//! `tokio::task::spawn_blocking`.

use std::collections::hash_map::RandomState;
use std::fs;
use std::hash::{BuildHasher, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

const URL_ISSUE_TIMEOUT: Duration = Duration::from_secs(10);
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(60);
const STAMP_FILE_NAME: &str = "upload_stamp";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadRequest<'a> {
    file_name: &'a str,
    version: &'a str,
    user_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadTicket {
    upload_url: String,
}

/// Uploads compressed artifacts to the configured control endpoint.
#[derive(Debug, Clone)]
pub struct Uploader {
    endpoint: String,
    user_id: String,
}

impl Uploader {
    pub fn new(endpoint: &str, user_id: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            user_id: user_id.to_string(),
        }
    }

    /// Upload one artifact file: request a write URL, then PUT the bytes.
    pub fn upload_file(&self, path: &Path) -> anyhow::Result<()> {
        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow!("artifact path has no file name: {path:?}"))?
            .to_string_lossy()
            .into_owned();
        let bytes = fs::read(path).with_context(|| format!("reading artifact {path:?}"))?;

        let ticket: UploadTicket = ureq::post(&self.endpoint)
            .timeout(URL_ISSUE_TIMEOUT)
            .send_json(UploadRequest {
                file_name: &file_name,
                version: env!("CARGO_PKG_VERSION"),
                user_id: &self.user_id,
            })
            .context("requesting upload URL")?
            .into_json()
            .context("parsing upload ticket")?;

        ureq::put(&ticket.upload_url)
            .set("Content-Type", "application/gzip")
            .timeout(TRANSFER_TIMEOUT)
            .send_bytes(&bytes)
            .context("transferring artifact bytes")?;

        tracing::debug!("Uploaded {} ({} bytes)", file_name, bytes.len());
        Ok(())
    }

    /// Upload several artifacts (snapshot parts), stopping at the first
    /// failure since later parts are useless without it.
    pub fn upload_all(&self, paths: &[PathBuf]) -> anyhow::Result<()> {
        for path in paths {
            self.upload_file(path)?;
        }
        Ok(())
    }
}

/// Load the persisted anonymous user id, generating and persisting a fresh
/// one on first use. Malformed stamp files are replaced.
pub fn load_or_create_user_id(data_dir: &Path) -> String {
    let path = data_dir.join(STAMP_FILE_NAME);
    if let Ok(content) = fs::read_to_string(&path) {
        let id = content.trim();
        if !id.is_empty() {
            return id.to_string();
        }
    }

    let id = generate_user_id();
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            tracing::debug!("Failed to create upload stamp directory: {}", e);
            return id;
        }
    }
    match fs::File::create(&path).and_then(|mut f| f.write_all(id.as_bytes())) {
        Ok(()) => {}
        Err(e) => tracing::debug!("Failed to write upload stamp file: {}", e),
    }
    id
}

/// Generate a random 64-bit hex id using std's `RandomState` plus time and
/// process-id entropy.
fn generate_user_id() -> String {
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
