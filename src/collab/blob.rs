//! Blob storage for change request attachments.
//!
//! The engine only needs two calls: store bytes under a folder and get back a
//! key, then turn a key into a time-limited retrieval URL.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use url::Url;
use uuid::Uuid;

use super::signing::{compute_signature, verify_signature};

pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `folder` and return the content key.
    fn put(&self, bytes: &[u8], folder: &str) -> Result<String>;

    /// Retrieval URL for `key` that stops working after `ttl_minutes`.
    fn presigned_url(&self, key: &str, ttl_minutes: u32) -> Result<String>;
}

/// Reject keys or folders that could escape the store root.
fn validate_relative(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("empty blob path");
    }
    let ok = Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !ok {
        bail!("blob path must be relative without '..': {}", path);
    }
    Ok(())
}

fn expiry(ttl_minutes: u32) -> i64 {
    (Utc::now() + Duration::minutes(i64::from(ttl_minutes))).timestamp()
}

/// Files on local disk with HMAC-signed `file://` URLs.
pub struct LocalBlobStore {
    root: PathBuf,
    secret: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, secret: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            secret: secret.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check a URL produced by [`BlobStore::presigned_url`] and return the
    /// file it grants access to.
    pub fn verify_url(&self, url: &str) -> Result<PathBuf> {
        let url = Url::parse(url).context("invalid blob URL")?;
        let path = url
            .to_file_path()
            .map_err(|_| anyhow!("blob URL is not a file URL"))?;
        let root = std::fs::canonicalize(&self.root).unwrap_or_else(|_| self.root.clone());
        let key = path
            .strip_prefix(&root)
            .map_err(|_| anyhow!("blob URL outside store root"))?
            .to_string_lossy()
            .replace('\\', "/");

        let mut expires = None;
        let mut signature = None;
        for (k, v) in url.query_pairs() {
            match k.as_ref() {
                "expires" => expires = Some(v.into_owned()),
                "signature" => signature = Some(v.into_owned()),
                _ => {}
            }
        }
        let expires = expires.ok_or_else(|| anyhow!("missing expires"))?;
        let signature = signature.ok_or_else(|| anyhow!("missing signature"))?;

        if !verify_signature(&self.secret, &expires, key.as_bytes(), &signature) {
            bail!("signature verification failed");
        }
        let ts: i64 = expires.parse().context("invalid expires")?;
        if ts < Utc::now().timestamp() {
            bail!("blob URL expired");
        }
        Ok(path)
    }
}

impl BlobStore for LocalBlobStore {
    fn put(&self, bytes: &[u8], folder: &str) -> Result<String> {
        validate_relative(folder)?;
        let dir = self.root.join(folder);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("cannot create blob folder {}", dir.display()))?;

        let key = format!("{}/{}", folder.trim_end_matches('/'), Uuid::new_v4());
        let path = self.root.join(&key);
        std::fs::write(&path, bytes)
            .with_context(|| format!("cannot write blob {}", path.display()))?;
        Ok(key)
    }

    fn presigned_url(&self, key: &str, ttl_minutes: u32) -> Result<String> {
        validate_relative(key)?;
        let path = self.root.join(key);
        if !path.is_file() {
            bail!("blob not found: {}", key);
        }
        let absolute = std::fs::canonicalize(&path)
            .with_context(|| format!("cannot resolve blob {}", path.display()))?;
        let root = std::fs::canonicalize(&self.root).context("cannot resolve blob root")?;
        // Re-derive the key against the canonical root so verify_url agrees
        let canonical_key = absolute
            .strip_prefix(&root)
            .map_err(|_| anyhow!("blob outside store root"))?
            .to_string_lossy()
            .replace('\\', "/");

        let expires = expiry(ttl_minutes).to_string();
        let signature = compute_signature(&self.secret, &expires, canonical_key.as_bytes());

        let mut url = Url::from_file_path(&absolute)
            .map_err(|_| anyhow!("cannot build URL for {}", absolute.display()))?;
        url.query_pairs_mut()
            .append_pair("expires", &expires)
            .append_pair("signature", &signature);
        Ok(url.to_string())
    }
}

/// In-process store used by tests and when no blob directory is configured.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.lock().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, bytes: &[u8], folder: &str) -> Result<String> {
        validate_relative(folder)?;
        let key = format!("{}/{}", folder.trim_end_matches('/'), Uuid::new_v4());
        self.blobs
            .lock()
            .map_err(|_| anyhow!("blob store lock poisoned"))?
            .insert(key.clone(), bytes.to_vec());
        Ok(key)
    }

    fn presigned_url(&self, key: &str, ttl_minutes: u32) -> Result<String> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|_| anyhow!("blob store lock poisoned"))?;
        if !blobs.contains_key(key) {
            bail!("blob not found: {}", key);
        }
        Ok(format!("memory://{}?expires={}", key, expiry(ttl_minutes)))
    }
}
