//! File contents read on the tokio runtime

use std::path::Path;
use std::sync::{Arc, OnceLock};

use sable_core::source::{file_modification_stamp, FileContentProvider};
use sable_core::{
    ContentDelivery, ContentFetch, ContentProvider, CoreError, Source, SourceContent,
    TimestampedData,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;

/// Serves `file:` sources. Once attached to a context's content channel,
/// every fetch answers `Pending` and the file is read asynchronously; until
/// then, and outside a runtime, files are read synchronously.
#[derive(Debug, Default)]
pub struct AsyncFileProvider {
    sender: OnceLock<UnboundedSender<ContentDelivery>>,
}

impl AsyncFileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver contents through `sender` from now on. Only the first call
    /// has an effect.
    pub fn attach(&self, sender: UnboundedSender<ContentDelivery>) -> bool {
        self.sender.set(sender).is_ok()
    }
}

impl ContentProvider for AsyncFileProvider {
    fn exists(&self, source: &Source) -> bool {
        source.to_path().is_some_and(|path| path.is_file())
    }

    fn modification_stamp(&self, source: &Source) -> i64 {
        source
            .to_path()
            .map(|path| file_modification_stamp(&path))
            .unwrap_or(-1)
    }

    fn fetch(&self, source: &Source) -> Result<ContentFetch, CoreError> {
        let path = source
            .to_path()
            .ok_or_else(|| CoreError::InvalidUri(source.full_name().to_string()))?;
        let (Some(sender), Ok(handle)) = (self.sender.get(), Handle::try_current()) else {
            return FileContentProvider::new().fetch(source);
        };

        let sender = sender.clone();
        let source = source.clone();
        handle.spawn(async move {
            let result = read_source(&source, &path).await;
            if sender.send(ContentDelivery { source, result }).is_err() {
                tracing::debug!("Context closed before {} was read", path.display());
            }
        });
        Ok(ContentFetch::Pending)
    }
}

async fn read_source(source: &Source, path: &Path) -> Result<SourceContent, CoreError> {
    let stamp = file_modification_stamp(path);
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CoreError::io(source.full_name(), &e))?;
    tracing::trace!("Read {} bytes from {}", text.len(), path.display());
    Ok(TimestampedData::new(stamp, Arc::from(text)))
}
