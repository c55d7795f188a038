use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::auth::error::CacheError;
use crate::auth::token::Token;
use crate::cache::{CacheEntry, TokenCache};
use crate::helpers::time::now_i64;
use crate::observability::metrics::get_metrics;

static CACHE_KIND: &str = "file";
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// On-disk layout, one entry per cache key.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    tokens: BTreeMap<String, PersistedEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedEntry {
    token: String,
    fetched_at: i64,
}

/// Cache shared between processes through a JSON file.
///
/// Writers take an exclusive advisory lock on a sibling `.lock` file for the
/// whole read-modify-write cycle, so entries of other keys are never lost.
/// The new content goes to a temporary sibling and is renamed into place:
/// readers take no lock and see either the old or the new file. Any
/// unreadable state is reported as a miss and repaired by the next `set`.
#[derive(Debug)]
pub struct FileTokenCache {
    path: PathBuf,
    // keeps this process's writers off the blocking pool while one holds the file lock
    write_lock: Mutex<()>,
}

impl FileTokenCache {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn entry(&self, key: &str) -> Option<CacheEntry> {
        let file = match decode(&self.read_raw().await?) {
            Ok(file) => file,
            Err(err) => {
                self.report_corruption(&err.to_string()).await;
                return None;
            }
        };
        let persisted = file.tokens.get(key)?;
        match Token::parse(&persisted.token) {
            Ok(token) => Some(CacheEntry::new(token, persisted.fetched_at)),
            Err(err) => {
                self.report_corruption(&format!("entry '{}': {}", key, err)).await;
                None
            }
        }
    }

    async fn read_raw(&self) -> Option<Vec<u8>> {
        match fs::read(&self.path).await {
            Ok(content) => Some(content),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "token cache file not found");
                None
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "token cache file unreadable, treating as miss");
                None
            }
        }
    }

    async fn report_corruption(&self, reason: &str) {
        warn!(path = %self.path.display(), reason, "token cache corrupted, token will be re-issued");
        get_metrics().await.cache_corruptions.inc();
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "tokens".to_owned());
        self.path.with_file_name(format!(".{}.{}", file_name, suffix))
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling(&format!(
            "{}.{}.tmp",
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ))
    }

    async fn ensure_parent(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_err(parent))?;
        }
        Ok(())
    }

    /// Blocks until the exclusive lock is held. It is released when the
    /// returned handle is dropped, on every exit path.
    async fn acquire_write_lock(&self) -> Result<std::fs::File, CacheError> {
        let lock_path = self.sibling("lock");
        let err_path = lock_path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            FileExt::lock_exclusive(&file)?;
            Ok(file)
        })
        .await
        .map_err(|join_err| std::io::Error::other(join_err.to_string()))
        .and_then(|locked| locked)
        .map_err(io_err(&err_path))
    }

    async fn write_atomic(&self, content: &[u8]) -> Result<(), CacheError> {
        let tmp = self.temp_path();
        let result = async {
            fs::write(&tmp, content).await.map_err(io_err(&tmp))?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
                    .await
                    .map_err(io_err(&tmp))?;
            }
            fs::rename(&tmp, &self.path).await.map_err(io_err(&self.path))
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&tmp).await;
        }
        result
    }
}

fn decode(content: &[u8]) -> Result<CacheFile, serde_json::Error> {
    serde_json::from_slice(content)
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> CacheError {
    let path = path.display().to_string();
    move |source| CacheError::Io { path, source }
}

#[async_trait]
impl TokenCache for FileTokenCache {
    async fn get(&self, key: &str) -> Option<Token> {
        let token = self.entry(key).await.map(|entry| entry.token);
        let result = if token.is_some() { "hit" } else { "miss" };
        get_metrics().await.cache_lookups.with_label_values(&[CACHE_KIND, result]).inc();
        token
    }

    async fn set(&self, key: &str, token: Token) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        self.ensure_parent().await?;
        let _file_lock = self.acquire_write_lock().await?;

        // corruption was already reported by the read that missed; just replace it
        let mut file = match self.read_raw().await.map(|content| decode(&content)) {
            Some(Ok(file)) => file,
            Some(Err(err)) => {
                debug!(path = %self.path.display(), error = %err, "replacing unreadable token cache file");
                CacheFile::default()
            }
            None => CacheFile::default(),
        };
        file.tokens.insert(
            key.to_owned(),
            PersistedEntry {
                token: token.raw().to_owned(),
                fetched_at: now_i64(),
            },
        );

        let content = serde_json::to_vec_pretty(&file)?;
        self.write_atomic(&content).await?;
        debug!(key, path = %self.path.display(), expires_at = token.expires_at(), "file cache store");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        CACHE_KIND
    }
}
