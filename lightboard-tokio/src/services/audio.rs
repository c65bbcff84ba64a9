//! The audio blob store: write-once bytes under a generated name.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// An error from the audio store.
#[derive(Debug, Error)]
pub enum AudioError {
    /// No blob with that name exists.
    #[error("audio blob `{0}` does not exist")]
    BlobMissing(String),

    /// The blob could not be written.
    #[error("failed to write audio blob: {0}")]
    BlobWrite(#[source] std::io::Error),

    /// The name is not a plain file name.
    #[error("invalid blob name `{0}`")]
    InvalidName(String),
}

/// A flat directory of uploaded audio files, read and deleted by exact
/// name.
pub struct AudioStore {
    dir: PathBuf,
}

impl AudioStore {
    /// Open the store, creating its directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::BlobWrite`] if the directory cannot be
    /// created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, AudioError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(AudioError::BlobWrite)?;
        info!("audio store at {}", dir.display());
        Ok(Self { dir })
    }

    /// Store bytes under a generated `<sanitized-base>-<unix-millis><ext>`
    /// name derived from the uploaded file name, and return that name.
    /// A name collision bumps the millisecond and retries.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::BlobWrite`] if the file cannot be written.
    pub async fn store(&self, original_name: &str, bytes: &[u8]) -> Result<String, AudioError> {
        let (base, ext) = split_name(original_name);
        let base = sanitize(base);
        let mut millis = Utc::now().timestamp_millis();

        loop {
            let name = format!("{base}-{millis}{ext}");
            let path = self.dir.join(&name);

            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(bytes).await.map_err(AudioError::BlobWrite)?;
                    file.flush().await.map_err(AudioError::BlobWrite)?;
                    return Ok(name);
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    millis += 1;
                }
                Err(err) => return Err(AudioError::BlobWrite(err)),
            }
        }
    }

    /// Read a blob by exact name.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::BlobMissing`] when no blob has that name.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>, AudioError> {
        validate_name(name)?;
        match fs::read(self.dir.join(name)).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(AudioError::BlobMissing(name.to_string()))
            }
            Err(err) => Err(AudioError::BlobWrite(err)),
        }
    }

    /// Delete a blob by exact name.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::BlobMissing`] when no blob has that name.
    pub async fn remove(&self, name: &str) -> Result<(), AudioError> {
        validate_name(name)?;
        match fs::remove_file(self.dir.join(name)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(AudioError::BlobMissing(name.to_string()))
            }
            Err(err) => Err(AudioError::BlobWrite(err)),
        }
    }
}

fn validate_name(name: &str) -> Result<(), AudioError> {
    let bad = name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || Path::new(name).is_absolute();
    if bad {
        return Err(AudioError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn split_name(original: &str) -> (&str, &str) {
    // Strip any client-side path, then split off the extension.
    let file = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original);
    file.rfind('.')
        .map_or((file, ""), |dot| (&file[..dot], &file[dot..]))
}

fn sanitize(base: &str) -> String {
    let clean: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if clean.is_empty() {
        "audio".to_string()
    } else {
        clean
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    async fn store() -> AudioStore {
        let dir = std::env::temp_dir().join(format!(
            "lightboard-audio-test-{}-{}",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        ));
        AudioStore::open(dir).await.unwrap()
    }

    #[tokio::test]
    async fn test_store_and_read_round_trip() {
        let store = store().await;
        let bytes = vec![0x49, 0x44, 0x33, 0x04, 0x00];

        let name = store.store("Air Horn.mp3", &bytes).await.unwrap();
        assert!(name.starts_with("Air-Horn-"));
        assert!(name.ends_with(".mp3"));

        let read = store.read(&name).await.unwrap();
        assert_eq!(read, bytes);
    }

    #[tokio::test]
    async fn test_collisions_bump_the_millisecond() {
        let store = store().await;
        let a = store.store("x.mp3", b"a").await.unwrap();
        let b = store.store("x.mp3", b"b").await.unwrap();
        // Either a different millisecond or the bumped retry: never equal.
        assert_ne!(a, b);
        assert_eq!(store.read(&a).await.unwrap(), b"a");
        assert_eq!(store.read(&b).await.unwrap(), b"b");
    }

    #[tokio::test]
    async fn test_missing_blob() {
        let store = store().await;
        assert!(matches!(
            store.read("nope.mp3").await,
            Err(AudioError::BlobMissing(_))
        ));
        assert!(matches!(
            store.remove("nope.mp3").await,
            Err(AudioError::BlobMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_remove() {
        let store = store().await;
        let name = store.store("gone.mp3", b"bytes").await.unwrap();
        store.remove(&name).await.unwrap();
        assert!(store.read(&name).await.is_err());
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let store = store().await;
        for name in ["../etc/passwd", "a/b.mp3", "", "..\\x.mp3"] {
            assert!(
                matches!(store.read(name).await, Err(AudioError::InvalidName(_))),
                "{name} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_client_path_is_stripped() {
        let store = store().await;
        let name = store
            .store("C:\\Users\\me\\sounds\\horn!.mp3", b"x")
            .await
            .unwrap();
        assert!(name.starts_with("horn--"));
        assert!(!name.contains('\\'));
    }
}
