//! Publish sink that writes one JSON document per video.
//!
//! Records land at `<output_directory>/<source>/<video_id>.json`. Writes go
//! through a uniquely named temporary file that is renamed over the target,
//! so readers never see a partial document and publishing the same video
//! again replaces the previous record.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::gateway::{ContentSink, PublishError, PublishRecord};
use crate::source::SourceKind;
use crate::worker::job::PublishReceipt;

pub struct FileSink {
    output_directory: PathBuf,
}

impl FileSink {
    pub fn new<P: AsRef<Path>>(output_directory: P) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_path_buf(),
        }
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// Where the record of a video is stored.
    pub fn record_path(&self, source: SourceKind, video_id: &str) -> PathBuf {
        self.output_directory
            .join(source.as_str())
            .join(format!("{}.json", file_stem(video_id)))
    }

    /// Reads back a published record.
    pub fn load(
        &self,
        source: SourceKind,
        video_id: &str,
    ) -> Result<Option<PublishRecord>, StorageError> {
        let path = self.record_path(source, video_id);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::ReadFile { path, source: e }),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Writes `record`, replacing any earlier version.
    pub fn write(&self, record: &PublishRecord) -> Result<PathBuf, StorageError> {
        let path = self.record_path(record.source_kind, &record.video_id);
        let dir = path.parent().unwrap_or(&self.output_directory);
        ensure_directory(dir)?;

        let content = serde_json::to_vec_pretty(record)?;
        let tmp_path = dir.join(format!(
            ".{}.{}.tmp",
            file_stem(&record.video_id),
            uuid::Uuid::new_v4().simple()
        ));

        let write_tmp = || -> std::io::Result<()> {
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp_path)?;
            file.write_all(&content)?;
            file.sync_all()
        };
        if let Err(e) = write_tmp() {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(StorageError::WriteFile {
                path: tmp_path,
                source: e,
            });
        }

        if let Err(e) = std::fs::rename(&tmp_path, &path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(StorageError::WriteFile { path, source: e });
        }

        log::debug!("Wrote {}", path.display());
        Ok(path)
    }
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Video ids are plain tokens, but never trust them as path components.
fn file_stem(video_id: &str) -> String {
    let stem: String = video_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "_".to_string()
    } else {
        stem
    }
}

impl From<StorageError> for PublishError {
    fn from(error: StorageError) -> Self {
        let permanent = match &error {
            StorageError::Encode(_) => true,
            StorageError::CreateDirectory { source, .. }
            | StorageError::ReadFile { source, .. }
            | StorageError::WriteFile { source, .. } => {
                source.kind() == std::io::ErrorKind::PermissionDenied
            }
        };
        if permanent {
            PublishError::permanent(error.to_string())
        } else {
            PublishError::transient(error.to_string())
        }
    }
}

#[async_trait]
impl ContentSink for FileSink {
    async fn publish(&self, record: &PublishRecord) -> Result<PublishReceipt, PublishError> {
        let path = self.write(record)?;
        Ok(PublishReceipt {
            post_id: format!("{}-{}", record.source_kind, record.video_id),
            location: Some(path.display().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::job::VideoDetails;
    use tempfile::TempDir;

    fn record(video_id: &str, description: Option<&str>) -> PublishRecord {
        PublishRecord {
            job_id: 1,
            video_id: video_id.to_string(),
            source_kind: SourceKind::Youtube,
            source_url: format!("https://www.youtube.com/watch?v={video_id}"),
            video: VideoDetails {
                title: "Talk".into(),
                ..Default::default()
            },
            description: description.map(str::to_string),
            entities: Default::default(),
            transcript_available: description.is_some(),
        }
    }

    #[tokio::test]
    async fn test_publish_writes_record() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path());

        let receipt = sink.publish(&record("abc123", Some("Desc"))).await.unwrap();
        assert_eq!(receipt.post_id, "youtube-abc123");

        let path = dir.path().join("youtube").join("abc123.json");
        assert_eq!(receipt.location.as_deref(), Some(path.display().to_string().as_str()));
        let loaded = sink.load(SourceKind::Youtube, "abc123").unwrap().unwrap();
        assert_eq!(loaded.description.as_deref(), Some("Desc"));
    }

    #[tokio::test]
    async fn test_republish_replaces() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path());

        sink.publish(&record("abc123", None)).await.unwrap();
        sink.publish(&record("abc123", Some("Second"))).await.unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path().join("youtube"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(files.len(), 1, "no temp files or duplicates: {files:?}");
        let loaded = sink.load(SourceKind::Youtube, "abc123").unwrap().unwrap();
        assert_eq!(loaded.description.as_deref(), Some("Second"));
    }

    #[test]
    fn test_load_missing() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path());
        assert!(sink.load(SourceKind::Vimeo, "42").unwrap().is_none());
    }

    #[test]
    fn test_file_stem_rejects_traversal() {
        assert_eq!(file_stem("../etc/passwd"), "___etc_passwd");
        assert_eq!(file_stem(""), "_");
        assert_eq!(file_stem("x7tgad0"), "x7tgad0");
    }
}
