use std::path::PathBuf;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::error::SourceError;

/// A previously captured MJPEG byte stream replayed from disk. `throttle`
/// paces emission to roughly mimic the original camera's framerate, the
/// same role `usec` plays in the original file source.
pub struct FileSource {
    name: String,
    path: PathBuf,
    throttle: Option<Duration>,
    file: Option<File>,
}

impl FileSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, usec: u64) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            throttle: if usec > 0 {
                Some(Duration::from_micros(usec))
            } else {
                None
            },
            file: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn throttle(&self) -> Option<Duration> {
        self.throttle
    }

    pub async fn open(&mut self) -> Result<(), SourceError> {
        debug!(path = %self.path.display(), "opening file source");
        let file = File::open(&self.path)
            .await
            .map_err(|e| SourceError::FileOpenError {
                path: self.path.display().to_string(),
                details: e.to_string(),
            })?;
        self.file = Some(file);
        Ok(())
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let file = self
            .file
            .as_mut()
            .expect("read() called before open() succeeded");
        file.read(buf).await
    }

    pub fn close(&mut self) {
        self.file = None;
    }
}
