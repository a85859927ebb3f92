use std::sync::Arc;

use dashmap::DashMap;
use sable_core::{ContentFetch, ContentProvider, CoreError, Source, SourceContent, TimestampedData};

/// Editor overlays layered over another provider. Overlay contents win and
/// get a modification stamp newer than anything seen for the source.
pub struct OverlayContentProvider {
    overlays: DashMap<Source, SourceContent>,
    inner: Arc<dyn ContentProvider>,
}

impl OverlayContentProvider {
    pub fn new(inner: Arc<dyn ContentProvider>) -> Self {
        Self {
            overlays: DashMap::new(),
            inner,
        }
    }

    /// Set the overlay for `source` and return its modification stamp.
    pub fn set(&self, source: &Source, contents: &str) -> i64 {
        let stamp = self.modification_stamp(source).max(0) + 1;
        self.overlays.insert(
            source.clone(),
            TimestampedData::new(stamp, Arc::from(contents)),
        );
        stamp
    }

    pub fn remove(&self, source: &Source) -> bool {
        self.overlays.remove(source).is_some()
    }

    pub fn has_overlay(&self, source: &Source) -> bool {
        self.overlays.contains_key(source)
    }
}

impl ContentProvider for OverlayContentProvider {
    fn exists(&self, source: &Source) -> bool {
        self.overlays.contains_key(source) || self.inner.exists(source)
    }

    fn modification_stamp(&self, source: &Source) -> i64 {
        match self.overlays.get(source) {
            Some(overlay) => overlay.modification_time,
            None => self.inner.modification_stamp(source),
        }
    }

    fn fetch(&self, source: &Source) -> Result<ContentFetch, CoreError> {
        if let Some(overlay) = self.overlays.get(source) {
            return Ok(ContentFetch::Ready(overlay.clone()));
        }
        self.inner.fetch(source)
    }
}
