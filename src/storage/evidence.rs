//! Evidence object storage
//!
//! Screenshots, network logs and auth storage-state documents are blobs kept
//! outside the database. The database only stores their keys.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid evidence key: {0}")]
    InvalidKey(String),
}

pub type EvidenceResult<T> = Result<T, EvidenceError>;

/// Blob store for crawl evidence
pub trait EvidenceStore: Send + Sync {
    /// Stores a PNG screenshot of a page and returns its key
    fn save_screenshot(&self, run_id: i64, page_id: i64, png: &[u8]) -> EvidenceResult<String>;

    /// Stores a HAR document for a page and returns its key
    fn save_network_log(
        &self,
        run_id: i64,
        page_id: i64,
        har: &serde_json::Value,
    ) -> EvidenceResult<String>;

    /// Stores an auth storage-state document for a profile and returns its key
    fn save_storage_state(&self, profile: &str, json: &str) -> EvidenceResult<String>;

    /// Reads back a storage-state document
    fn load_storage_state(&self, key: &str) -> EvidenceResult<String>;

    /// A URL a client can use to fetch the object
    fn presigned_url(&self, key: &str) -> EvidenceResult<String>;
}

/// Evidence store backed by a local directory
#[derive(Debug, Clone)]
pub struct FsEvidenceStore {
    root: PathBuf,
}

impl FsEvidenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a key to a path under the root, refusing keys that escape it
    fn path_for(&self, key: &str) -> EvidenceResult<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(EvidenceError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn put(&self, key: String, bytes: &[u8]) -> EvidenceResult<String> {
        let path = self.path_for(&key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        Ok(key)
    }
}

impl EvidenceStore for FsEvidenceStore {
    fn save_screenshot(&self, run_id: i64, page_id: i64, png: &[u8]) -> EvidenceResult<String> {
        self.put(
            format!("runs/{}/pages/{}/screenshot.png", run_id, page_id),
            png,
        )
    }

    fn save_network_log(
        &self,
        run_id: i64,
        page_id: i64,
        har: &serde_json::Value,
    ) -> EvidenceResult<String> {
        let body = serde_json::to_vec_pretty(har)?;
        self.put(
            format!("runs/{}/pages/{}/network.har.json", run_id, page_id),
            &body,
        )
    }

    fn save_storage_state(&self, profile: &str, json: &str) -> EvidenceResult<String> {
        let profile: String = profile
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.put(
            format!("auth/{}/storage-state.json", profile),
            json.as_bytes(),
        )
    }

    fn load_storage_state(&self, key: &str) -> EvidenceResult<String> {
        Ok(std::fs::read_to_string(self.path_for(key)?)?)
    }

    fn presigned_url(&self, key: &str) -> EvidenceResult<String> {
        let path = self.path_for(key)?;
        let absolute = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()?.join(path)
        };
        url::Url::from_file_path(&absolute)
            .map(|u| u.to_string())
            .map_err(|_| EvidenceError::InvalidKey(key.to_string()))
    }
}

/// A request observed while a page was loading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequest {
    pub url: String,
    pub method: String,
    pub resource_type: Option<String>,
    pub headers: serde_json::Map<String, serde_json::Value>,
}

/// Builds a HAR 1.2 document from observed requests
///
/// Responses are not captured, so each entry carries a placeholder status.
pub fn build_har(requests: &[NetworkRequest]) -> serde_json::Value {
    let entries: Vec<_> = requests
        .iter()
        .map(|r| {
            json!({
                "request": {
                    "method": r.method,
                    "url": r.url,
                    "headers": r.headers,
                },
                "response": {
                    "status": 200,
                    "headers": {},
                },
            })
        })
        .collect();

    json!({
        "log": {
            "version": "1.2",
            "entries": entries,
        }
    })
}
