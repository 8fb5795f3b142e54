use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use subgrab_engine::{ExportSink, OutputName, SubgrabError};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Writes each document to `<dir>/<name>`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    overwrite: bool,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            dir: dir.into(),
            overwrite,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ExportSink for DirectorySink {
    async fn export(&self, name: &OutputName, document: Bytes) -> Result<(), SubgrabError> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(name.as_str());

        let mut options = OpenOptions::new();
        options.write(true);
        if self.overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }

        let mut file = options.open(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                SubgrabError::export(
                    name.as_str(),
                    format!("{} already exists (use --overwrite)", path.display()),
                )
            } else {
                SubgrabError::export(name.as_str(), e.to_string())
            }
        })?;
        file.write_all(&document).await?;
        file.flush().await?;

        debug!(path = %path.display(), bytes = document.len(), "Document written");
        info!("Saved {}", path.display());
        Ok(())
    }
}
