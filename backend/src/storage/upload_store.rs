use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Where an upload ended up: `<upload_dir>/<uuid><extension>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredImagePath(PathBuf);

impl StoredImagePath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name().and_then(|name| name.to_str())
    }
}

impl fmt::Display for StoredImagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Local directory holding every uploaded image under a fresh UUID name.
/// Names never repeat, so concurrent uploads need no coordination.
#[derive(Debug, Clone)]
pub struct UploadStore {
    upload_dir: PathBuf,
}

impl UploadStore {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub async fn init(&self) -> io::Result<()> {
        fs::create_dir_all(&self.upload_dir).await
    }

    /// Extension of the client's file name with its leading dot, or an
    /// empty string. Only the last path component is considered.
    pub fn extract_file_extension(file_name: &str) -> String {
        Path::new(file_name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default()
    }

    pub fn generate_path(&self, file_extension: &str) -> StoredImagePath {
        StoredImagePath(
            self.upload_dir
                .join(format!("{}{}", Uuid::new_v4(), file_extension)),
        )
    }

    /// Writes the bytes under a new name. The data goes to a hidden
    /// `.part` sibling first and is renamed into place, so a returned path
    /// always holds the complete upload.
    pub async fn persist(&self, image_data: &[u8], file_name: &str) -> io::Result<StoredImagePath> {
        let stored = self.generate_path(&Self::extract_file_extension(file_name));
        let partial = self.upload_dir.join(format!(
            ".{}.part",
            stored.file_name().unwrap_or("upload")
        ));

        let written = match write_new(&partial, image_data).await {
            Ok(()) => fs::rename(&partial, stored.as_path()).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&partial).await {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    log::warn!("Could not remove {}: {}", partial.display(), cleanup);
                }
            }
            return Err(e);
        }

        log::info!("Stored upload {} ({} bytes)", stored, image_data.len());
        Ok(stored)
    }
}

async fn write_new(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}
