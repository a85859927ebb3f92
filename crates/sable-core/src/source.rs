//! Source identities and the providers that supply their contents
//!
//! A [`Source`] is only an identity. Its text lives behind a
//! [`ContentProvider`], which may answer immediately or report that the
//! content will be delivered later through a [`ContentDelivery`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use url::Url;

use crate::error::CoreError;
use crate::sdk::DartSdk;

/// Stable identity for one unit of textual input, keyed by its absolute URI
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Source {
    uri: Arc<str>,
}

impl Source {
    pub fn new(uri: impl AsRef<str>) -> Self {
        Self {
            uri: Arc::from(uri.as_ref()),
        }
    }

    /// Build a `file:` source for an absolute filesystem path.
    pub fn from_path(path: &Path) -> Result<Self, CoreError> {
        Url::from_file_path(path)
            .map(|url| Source::new(url.as_str()))
            .map_err(|_| CoreError::InvalidUri(path.display().to_string()))
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn full_name(&self) -> &str {
        &self.uri
    }

    /// Last path segment, used in task descriptions and CLI output
    pub fn short_name(&self) -> &str {
        self.uri
            .rsplit(['/', ':'])
            .next()
            .unwrap_or(&self.uri)
    }

    pub fn scheme(&self) -> &str {
        self.uri.split(':').next().unwrap_or("")
    }

    pub fn is_in_system_library(&self) -> bool {
        self.scheme() == "dart"
    }

    /// `.html` and `.htm` sources are never scanned as Dart
    pub fn is_html(&self) -> bool {
        let path = self.uri.split(['?', '#']).next().unwrap_or(&self.uri);
        let Some((_, extension)) = path.rsplit_once('.') else {
            return false;
        };
        extension.eq_ignore_ascii_case("html") || extension.eq_ignore_ascii_case("htm")
    }

    /// Filesystem path for `file:` sources.
    pub fn to_path(&self) -> Option<PathBuf> {
        Url::parse(&self.uri).ok()?.to_file_path().ok()
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Source({})", self.uri)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

impl Serialize for Source {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.uri)
    }
}

/// Classification of a source, decided from its parsed directives or, for
/// HTML, from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SourceKind {
    Library,
    Part,
    Html,
    Unknown,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Library => write!(f, "LIBRARY"),
            SourceKind::Part => write!(f, "PART"),
            SourceKind::Html => write!(f, "HTML"),
            SourceKind::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A payload paired with the modification time of the content it came from
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampedData<T> {
    pub modification_time: i64,
    pub data: T,
}

impl<T> TimestampedData<T> {
    pub fn new(modification_time: i64, data: T) -> Self {
        Self {
            modification_time,
            data,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TimestampedData<U> {
        TimestampedData {
            modification_time: self.modification_time,
            data: f(self.data),
        }
    }
}

pub type SourceContent = TimestampedData<Arc<str>>;

/// Answer to a content request
#[derive(Debug, Clone)]
pub enum ContentFetch {
    Ready(SourceContent),
    /// The content will arrive later as a [`ContentDelivery`].
    Pending,
}

/// Content that arrives after a [`ContentFetch::Pending`] answer
#[derive(Debug, Clone)]
pub struct ContentDelivery {
    pub source: Source,
    pub result: Result<SourceContent, CoreError>,
}

pub trait ContentProvider: Send + Sync {
    fn exists(&self, source: &Source) -> bool;

    fn modification_stamp(&self, source: &Source) -> i64;

    fn fetch(&self, source: &Source) -> Result<ContentFetch, CoreError>;
}

/// In-memory contents, used for tests and for editor overlays
#[derive(Default)]
pub struct MemoryContentProvider {
    contents: RwLock<HashMap<Source, SourceContent>>,
    stamp: AtomicI64,
}

impl MemoryContentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store content under a fresh modification stamp and return that stamp.
    pub fn set_contents(&self, source: &Source, contents: impl AsRef<str>) -> i64 {
        let stamp = self.stamp.fetch_add(1, Ordering::SeqCst) + 1;
        self.contents.write().insert(
            source.clone(),
            TimestampedData::new(stamp, Arc::from(contents.as_ref())),
        );
        stamp
    }

    pub fn remove(&self, source: &Source) -> bool {
        self.contents.write().remove(source).is_some()
    }

    pub fn sources(&self) -> Vec<Source> {
        let mut sources: Vec<Source> = self.contents.read().keys().cloned().collect();
        sources.sort();
        sources
    }
}

impl ContentProvider for MemoryContentProvider {
    fn exists(&self, source: &Source) -> bool {
        self.contents.read().contains_key(source)
    }

    fn modification_stamp(&self, source: &Source) -> i64 {
        self.contents
            .read()
            .get(source)
            .map(|content| content.modification_time)
            .unwrap_or(-1)
    }

    fn fetch(&self, source: &Source) -> Result<ContentFetch, CoreError> {
        self.contents
            .read()
            .get(source)
            .cloned()
            .map(ContentFetch::Ready)
            .ok_or_else(|| CoreError::ContentUnavailable(source.full_name().to_string()))
    }
}

/// Synchronous reads of `file:` sources
#[derive(Debug, Default, Clone)]
pub struct FileContentProvider;

impl FileContentProvider {
    pub fn new() -> Self {
        Self
    }

    fn path_of(source: &Source) -> Result<PathBuf, CoreError> {
        source
            .to_path()
            .ok_or_else(|| CoreError::InvalidUri(source.full_name().to_string()))
    }
}

/// Modification stamp of a file in milliseconds since the epoch, or -1.
pub fn file_modification_stamp(path: &Path) -> i64 {
    std::fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
        .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(-1)
}

impl ContentProvider for FileContentProvider {
    fn exists(&self, source: &Source) -> bool {
        Self::path_of(source)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    fn modification_stamp(&self, source: &Source) -> i64 {
        Self::path_of(source)
            .map(|path| file_modification_stamp(&path))
            .unwrap_or(-1)
    }

    fn fetch(&self, source: &Source) -> Result<ContentFetch, CoreError> {
        let path = Self::path_of(source)?;
        let stamp = file_modification_stamp(&path);
        let text =
            std::fs::read_to_string(&path).map_err(|e| CoreError::io(source.full_name(), &e))?;
        Ok(ContentFetch::Ready(TimestampedData::new(
            stamp,
            Arc::from(text),
        )))
    }
}

/// Serves the embedded `dart:` libraries and delegates everything else
pub struct SdkContentProvider {
    sdk: Arc<DartSdk>,
    inner: Arc<dyn ContentProvider>,
}

impl SdkContentProvider {
    pub fn new(sdk: Arc<DartSdk>, inner: Arc<dyn ContentProvider>) -> Self {
        Self { sdk, inner }
    }
}

impl ContentProvider for SdkContentProvider {
    fn exists(&self, source: &Source) -> bool {
        if source.is_in_system_library() {
            return self.sdk.contents(source).is_some();
        }
        self.inner.exists(source)
    }

    fn modification_stamp(&self, source: &Source) -> i64 {
        if source.is_in_system_library() {
            return self.sdk.modification_stamp();
        }
        self.inner.modification_stamp(source)
    }

    fn fetch(&self, source: &Source) -> Result<ContentFetch, CoreError> {
        if source.is_in_system_library() {
            return self
                .sdk
                .contents(source)
                .map(|text| {
                    ContentFetch::Ready(TimestampedData::new(
                        self.sdk.modification_stamp(),
                        text,
                    ))
                })
                .ok_or_else(|| CoreError::ContentUnavailable(source.full_name().to_string()));
        }
        self.inner.fetch(source)
    }
}
