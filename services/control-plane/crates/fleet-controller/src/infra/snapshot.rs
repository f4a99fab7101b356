//! Image snapshot archive on the local filesystem.
//!
//! Uploads stream into `<root>/<name>-<nonce>`, are synced, then renamed to
//! `<root>/<name>-<nonce>.tar.gz`. The rename is the only publication point.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fleet_common::snapshot::ARCHIVE_SUFFIX;
use futures::TryStreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::application::ports::{ByteStream, SnapshotArchive};
use crate::domain::generate_secret;
use crate::error::{ControllerError, ValidationError};

#[derive(Debug, Clone)]
pub struct FsSnapshotArchive {
    root: PathBuf,
}

impl FsSnapshotArchive {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn write_staged(
        staged: &Path,
        mut chunks: ByteStream<'_>,
    ) -> Result<u64, ControllerError> {
        let mut file = fs::File::create(staged).await?;
        let mut written = 0u64;
        while let Some(chunk) = chunks.try_next().await.map_err(|e| {
            ControllerError::from(ValidationError::Upload(format!("upload interrupted: {e}")))
        })? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.sync_all().await?;
        Ok(written)
    }
}

#[async_trait]
impl SnapshotArchive for FsSnapshotArchive {
    async fn publish(
        &self,
        name: &str,
        chunks: ByteStream<'_>,
    ) -> Result<PathBuf, ControllerError> {
        fs::create_dir_all(&self.root).await?;
        let staged = self.root.join(format!("{name}-{}", generate_secret(8)));

        let written = match Self::write_staged(&staged, chunks).await {
            Ok(0) => Err(ValidationError::Upload("empty archive".to_string()).into()),
            other => other,
        };
        if let Err(err) = written {
            if let Err(cleanup) = fs::remove_file(&staged).await {
                tracing::warn!(
                    path = %staged.display(),
                    error = %cleanup,
                    "failed to remove staged upload"
                );
            }
            return Err(err);
        }

        let mut published = staged.clone().into_os_string();
        published.push(ARCHIVE_SUFFIX);
        let published = PathBuf::from(published);
        fs::rename(&staged, &published).await?;
        tracing::debug!(path = %published.display(), "snapshot archive published");
        Ok(published)
    }

    async fn discard(&self, path: &Path) -> Result<(), ControllerError> {
        fs::remove_file(path).await?;
        Ok(())
    }
}
