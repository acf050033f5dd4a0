//! TOML file credential store
//!
//! All credentials live in one TOML file keyed by credential name. Writes go
//! to a temporary file in the same directory which is then renamed over the
//! original, so readers never observe a half-written file. Every refresh
//! bumps a counter in a sibling `<file>.refreshed` marker that other
//! processes can watch to drop cached tokens.
//!
//! Workers in different processes coordinate through advisory locks on
//! sibling files: `<file>.lock` guards each read-modify-write of the
//! credential file and the marker, `<file>.<key>.lock` is held across a
//! whole refresh of one credential.

use std::{
    collections::BTreeMap,
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use ai_core::{CredentialLock, CredentialStore, InferenceError, OAuthCredential};
use async_trait::async_trait;
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

const MARKER_SUFFIX: &str = "refreshed";
const LOCK_SUFFIX: &str = "lock";
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    credentials: BTreeMap<String, OAuthCredential>,
}

/// Exclusive advisory lock on a file, released on drop
#[derive(Debug)]
struct FileLock {
    file: File,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Credential store persisted to a TOML file
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    lock_timeout: Duration,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Store backed by `path`; the file is created on first save
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            write_lock: Mutex::new(()),
        }
    }

    /// Give up waiting for another worker's lock after `timeout`
    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Credential file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the refresh marker
    pub fn marker_path(&self) -> PathBuf {
        self.sibling(MARKER_SUFFIX)
    }

    /// Path of the lock file held while refreshing `key`
    pub fn key_lock_path(&self, key: &str) -> PathBuf {
        let key: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.sibling(&format!("{key}.{LOCK_SUFFIX}"))
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".");
        name.push(suffix);
        PathBuf::from(name)
    }

    /// Number of refreshes recorded in the marker, `0` when absent
    pub async fn refresh_generation(&self) -> Result<u64, InferenceError> {
        match tokio::fs::read_to_string(self.marker_path()).await {
            Ok(contents) => Ok(contents.trim().parse().unwrap_or(0)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(store_error("read refresh marker", &e)),
        }
    }

    async fn read_file(&self) -> Result<CredentialFile, InferenceError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CredentialFile::default());
            },
            Err(e) => return Err(store_error("read credential file", &e)),
        };
        toml::from_str(&contents).map_err(|e| {
            InferenceError::CredentialStore(format!(
                "invalid credential file {}: {e}",
                self.path.display()
            ))
        })
    }

    async fn acquire(&self, path: PathBuf) -> Result<FileLock, InferenceError> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| store_error("create directory", &e))?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .await
            .map_err(|e| store_error("open lock file", &e))?
            .into_std()
            .await;

        let start = Instant::now();
        loop {
            if matches!(FileExt::try_lock_exclusive(&file), Ok(true)) {
                return Ok(FileLock { file });
            }
            if start.elapsed() >= self.lock_timeout {
                return Err(InferenceError::CredentialStore(format!(
                    "timed out waiting for lock {}",
                    path.display()
                )));
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL).await;
        }
    }

    async fn write_atomic(path: PathBuf, contents: String) -> Result<(), InferenceError> {
        tokio::task::spawn_blocking(move || {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir).map_err(|e| store_error("create directory", &e))?;
            let mut file = NamedTempFile::new_in(dir).map_err(|e| store_error("create temp file", &e))?;
            file.write_all(contents.as_bytes())
                .map_err(|e| store_error("write temp file", &e))?;
            file.as_file()
                .sync_all()
                .map_err(|e| store_error("sync temp file", &e))?;
            file.persist(&path)
                .map_err(|e| store_error("replace credential file", &e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| InferenceError::CredentialStore(format!("write task failed: {e}")))?
    }
}

fn store_error(action: &str, err: &std::io::Error) -> InferenceError {
    InferenceError::CredentialStore(format!("failed to {action}: {err}"))
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self, key: &str) -> Result<Option<OAuthCredential>, InferenceError> {
        let mut file = self.read_file().await?;
        Ok(file.credentials.remove(key))
    }

    #[instrument(skip(self, credential), fields(path = %self.path.display()))]
    async fn save(&self, key: &str, credential: &OAuthCredential) -> Result<(), InferenceError> {
        let _guard = self.write_lock.lock().await;
        let _file_lock = self.acquire(self.sibling(LOCK_SUFFIX)).await?;
        let mut file = self.read_file().await?;
        file.credentials.insert(key.to_string(), credential.clone());

        let contents = toml::to_string_pretty(&file)
            .map_err(|e| InferenceError::CredentialStore(format!("cannot encode credentials: {e}")))?;
        Self::write_atomic(self.path.clone(), contents).await?;
        debug!(expires_at = %credential.expires_at, "Saved credential");
        Ok(())
    }

    #[instrument(skip(self), fields(marker = %self.marker_path().display()))]
    async fn notify_refreshed(&self, key: &str) -> Result<(), InferenceError> {
        let _guard = self.write_lock.lock().await;
        let _file_lock = self.acquire(self.sibling(LOCK_SUFFIX)).await?;
        let generation = self.refresh_generation().await?.saturating_add(1);
        Self::write_atomic(self.marker_path(), format!("{generation}\n")).await?;
        info!(generation, "Recorded credential refresh");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn lock(&self, key: &str) -> Result<CredentialLock, InferenceError> {
        let lock = self.acquire(self.key_lock_path(key)).await?;
        debug!("Acquired credential lock");
        Ok(CredentialLock::new(lock))
    }
}
