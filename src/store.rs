//! Named transcript store.
//!
//! A flat directory of transcripts saved under a name of the user's choosing,
//! so `replay` can take either a file path or a saved name.

use std::path::{Path, PathBuf};

use crate::capture;

const STORE_SUBDIR: [&str; 2] = [".capture", "save"];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no transcript file or saved name `{0}`")]
    NotFound(String),
}

#[derive(Debug, Clone)]
pub struct TranscriptStore {
    dir: PathBuf,
}

impl TranscriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<home>/.capture/save`, home taken from `HOME`, then `USERPROFILE`,
    /// then `HOMEPATH`.
    pub fn default_location() -> Option<PathBuf> {
        ["HOME", "USERPROFILE", "HOMEPATH"]
            .iter()
            .filter_map(std::env::var_os)
            .find(|v| !v.is_empty())
            .map(|home| STORE_SUBDIR.iter().fold(PathBuf::from(home), |p, s| p.join(s)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `file` into the store as `name`, replacing any earlier entry.
    pub async fn save(&self, file: &Path, name: &str) -> Result<PathBuf, StoreError> {
        capture::ensure_dir(&self.dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let dest = self.dir.join(name);
        tokio::fs::copy(file, &dest)
            .await
            .map_err(|source| StoreError::Io {
                path: file.to_path_buf(),
                source,
            })?;

        tracing::debug!(from = %file.display(), to = %dest.display(), "Transcript saved");
        Ok(dest)
    }

    /// Read `name_or_path` as a file path, falling back to a saved name.
    pub async fn load(&self, name_or_path: &str) -> Result<Vec<u8>, StoreError> {
        let direct = Path::new(name_or_path);
        let candidates = [direct.to_path_buf(), self.dir.join(name_or_path)];

        for path in candidates {
            match tokio::fs::read(&path).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if is_missing(&e) => continue,
                Err(source) => return Err(StoreError::Io { path, source }),
            }
        }
        Err(StoreError::NotFound(name_or_path.to_string()))
    }
}

fn is_missing(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::NotFound | std::io::ErrorKind::IsADirectory
    )
}
