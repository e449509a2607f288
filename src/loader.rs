//! Host-side file handles
//!
//! A [`FileLoader`] stands for one inserted file: the file itself may not be
//! available yet, and the loader carries the progress counters the host reads
//! while an adapter uploads it.

use crate::{Error, Result};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Binary image data as handed over by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub name: String,
    pub mime: Option<String>,
    pub data: Vec<u8>,
}

impl ImageBlob {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: None,
            data,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, data))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone)]
enum FileState {
    Pending,
    Ready(Arc<ImageBlob>),
    Failed(String),
}

/// Settles the file of a loader created with [`FileLoader::deferred`].
pub struct FileSender {
    tx: watch::Sender<FileState>,
}

impl FileSender {
    pub fn send(self, blob: ImageBlob) {
        let _ = self.tx.send(FileState::Ready(Arc::new(blob)));
    }

    pub fn fail(self, reason: impl Into<String>) {
        let _ = self.tx.send(FileState::Failed(reason.into()));
    }
}

pub struct FileLoader {
    id: Uuid,
    file: watch::Receiver<FileState>,
    upload_total: AtomicU64,
    uploaded: AtomicU64,
}

impl FileLoader {
    /// Loader whose file is already available.
    pub fn new(blob: ImageBlob) -> Self {
        let (_tx, rx) = watch::channel(FileState::Ready(Arc::new(blob)));
        Self::from_receiver(rx)
    }

    /// Loader whose file arrives later through the returned [`FileSender`].
    pub fn deferred() -> (Self, FileSender) {
        let (tx, rx) = watch::channel(FileState::Pending);
        (Self::from_receiver(rx), FileSender { tx })
    }

    fn from_receiver(file: watch::Receiver<FileState>) -> Self {
        Self {
            id: Uuid::new_v4(),
            file,
            upload_total: AtomicU64::new(0),
            uploaded: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Waits until the host settles the file.
    pub async fn file(&self) -> Result<Arc<ImageBlob>> {
        let mut rx = self.file.clone();
        let state = rx
            .wait_for(|state| !matches!(state, FileState::Pending))
            .await
            .map_err(|_| Error::Read("file source was dropped before it resolved".to_string()))?
            .clone();

        match state {
            FileState::Ready(blob) => Ok(blob),
            FileState::Failed(reason) => Err(Error::Read(reason)),
            FileState::Pending => Err(Error::Invariant(
                "file state still pending after wait".to_string(),
            )),
        }
    }

    pub fn upload_total(&self) -> u64 {
        self.upload_total.load(Ordering::Relaxed)
    }

    pub fn uploaded(&self) -> u64 {
        self.uploaded.load(Ordering::Relaxed)
    }

    pub fn set_upload_total(&self, total: u64) {
        self.upload_total.store(total, Ordering::Relaxed);
    }

    pub fn set_uploaded(&self, uploaded: u64) {
        self.uploaded.store(uploaded, Ordering::Relaxed);
    }

    pub(crate) fn add_uploaded(&self, bytes: u64) {
        self.uploaded.fetch_add(bytes, Ordering::Relaxed);
    }
}
