use crate::error::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A JSON array of records on disk, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
    flush_timeout: Duration,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>, flush_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            flush_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole collection. A missing or blank file is a first run and yields no records.
    pub async fn load<T: DeserializeOwned>(&self) -> Result<Vec<T>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "state file absent; starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.corrupt(format!("read failed: {e}"))),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            tracing::info!(path = %self.path.display(), "state file empty; starting empty");
            return Ok(Vec::new());
        }

        serde_json::from_slice::<Vec<T>>(&bytes).map_err(|e| self.corrupt(e.to_string()))
    }

    /// Writes every record to a sibling temp file, fsyncs it, then renames it over the target so
    /// readers only ever observe the old or the new file in full.
    ///
    /// The write runs on one blocking task. If it overruns `flush_timeout` before the rename has
    /// started, the rename is called off and the old file stays in place; once the rename has
    /// started its own result is reported. Either way this only returns after the task is done,
    /// so the file on disk always matches the returned outcome.
    pub async fn save<T: Serialize>(&self, records: &[T]) -> Result<(), StoreError> {
        let mut body = serde_json::to_vec_pretty(records)
            .map_err(|e| self.persistence(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        body.push(b'\n');
        let bytes = body.len();

        let stage = Arc::new(Mutex::new(FlushStage::Writing));
        let mut flush = {
            let tmp = self.temp_path();
            let target = self.path.clone();
            let stage = Arc::clone(&stage);
            tokio::task::spawn_blocking(move || write_and_replace(&tmp, &target, &body, &stage))
        };

        let t0 = Instant::now();
        let res = match tokio::time::timeout(self.flush_timeout, &mut flush).await {
            Ok(joined) => joined.unwrap_or_else(|e| Err(io::Error::other(e))),
            Err(_) if abandon(&stage) => {
                // The writer checks the stage before renaming and removes its own temp file.
                let _ = flush.await;
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("flush did not finish within {:?}", self.flush_timeout),
                ))
            }
            Err(_) => {
                tracing::warn!(
                    path = %self.path.display(),
                    timeout_ms = self.flush_timeout.as_millis() as u64,
                    "flush overran its timeout during rename; waiting for it"
                );
                flush.await.unwrap_or_else(|e| Err(io::Error::other(e)))
            }
        };
        res.map_err(|source| self.persistence(source))?;

        tracing::debug!(
            path = %self.path.display(),
            records = records.len(),
            bytes,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "state file flushed"
        );
        Ok(())
    }

    pub fn corrupt(&self, detail: impl Into<String>) -> StoreError {
        StoreError::CorruptState {
            path: self.path.clone(),
            detail: detail.into(),
        }
    }

    fn persistence(&self, source: io::Error) -> StoreError {
        StoreError::Persistence {
            path: self.path.clone(),
            source,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state".to_string());
        dir.join(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushStage {
    Writing,
    Replacing,
    Abandoned,
}

/// Calls off a flush that has not reached its rename. Returns false once the rename has begun.
fn abandon(stage: &Mutex<FlushStage>) -> bool {
    let mut stage = stage.lock().unwrap_or_else(PoisonError::into_inner);
    if *stage == FlushStage::Writing {
        *stage = FlushStage::Abandoned;
        true
    } else {
        false
    }
}

fn write_and_replace(
    tmp: &Path,
    target: &Path,
    body: &[u8],
    stage: &Mutex<FlushStage>,
) -> io::Result<()> {
    let written = write_synced(tmp, body);
    let proceed = {
        let mut stage = stage.lock().unwrap_or_else(PoisonError::into_inner);
        let proceed = written.is_ok() && *stage == FlushStage::Writing;
        if proceed {
            *stage = FlushStage::Replacing;
        }
        proceed
    };

    if !proceed {
        let _ = std::fs::remove_file(tmp);
        return written.and(Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "flush abandoned before rename",
        )));
    }

    std::fs::rename(tmp, target).map_err(|e| {
        let _ = std::fs::remove_file(tmp);
        e
    })
}

fn write_synced(path: &Path, body: &[u8]) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(body)?;
    file.sync_all()
}
