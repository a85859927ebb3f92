//! URI resolution with pluggable strategies
//!
//! The factory walks its registered [`UriResolver`]s in order and the first
//! one that accepts a URI decides which [`Source`] it denotes. Resolution is
//! deterministic for a given `(base, uri)` pair, which the cache relies on.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use crate::sdk::{DartSdk, DART_SCHEME};
use crate::source::Source;

/// Characters that are escaped before a directive URI is parsed
const URI_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^');

pub fn encode_uri(uri: &str) -> String {
    utf8_percent_encode(uri, URI_ENCODE_SET).to_string()
}

/// True when the encoded URI parses as an absolute or relative reference.
pub fn is_valid_uri(uri: &str) -> bool {
    match Url::parse(&encode_uri(uri)) {
        Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => true,
        Err(_) => false,
    }
}

/// One strategy for turning an absolute URI into a [`Source`]
pub trait UriResolver: Send + Sync {
    fn can_resolve(&self, uri: &Url) -> bool;

    fn resolve_absolute(&self, uri: &Url) -> Option<Source>;

    /// Human-readable name, for logs
    fn name(&self) -> &str;
}

/// `dart:` URIs backed by the embedded SDK
pub struct DartUriResolver {
    sdk: Arc<DartSdk>,
}

impl DartUriResolver {
    pub fn new(sdk: Arc<DartSdk>) -> Self {
        Self { sdk }
    }
}

impl UriResolver for DartUriResolver {
    fn can_resolve(&self, uri: &Url) -> bool {
        uri.scheme() == DART_SCHEME
    }

    fn resolve_absolute(&self, uri: &Url) -> Option<Source> {
        self.sdk
            .library(uri.as_str())
            .map(|_| Source::new(uri.as_str()))
    }

    fn name(&self) -> &str {
        "dart"
    }
}

pub struct FileUriResolver;

impl UriResolver for FileUriResolver {
    fn can_resolve(&self, uri: &Url) -> bool {
        uri.scheme() == "file"
    }

    fn resolve_absolute(&self, uri: &Url) -> Option<Source> {
        Some(Source::new(uri.as_str()))
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// `package:name/path.dart` mapped onto per-package `lib` directories
#[derive(Debug, Default)]
pub struct PackageUriResolver {
    roots: BTreeMap<String, PathBuf>,
}

impl PackageUriResolver {
    pub fn new(roots: BTreeMap<String, PathBuf>) -> Self {
        Self { roots }
    }
}

impl UriResolver for PackageUriResolver {
    fn can_resolve(&self, uri: &Url) -> bool {
        uri.scheme() == "package"
    }

    fn resolve_absolute(&self, uri: &Url) -> Option<Source> {
        let (package, relative) = uri.path().split_once('/')?;
        let root = self.roots.get(package)?;
        if relative.is_empty() {
            return None;
        }
        Source::from_path(&root.join(relative)).ok()
    }

    fn name(&self) -> &str {
        "package"
    }
}

pub struct SourceFactory {
    resolvers: Vec<Box<dyn UriResolver>>,
}

impl SourceFactory {
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
        }
    }

    /// Factory with the SDK and `file:` resolvers registered
    pub fn standard(sdk: Arc<DartSdk>) -> Self {
        let mut factory = Self::new();
        factory.register(Box::new(DartUriResolver::new(sdk)));
        factory.register(Box::new(FileUriResolver));
        factory
    }

    pub fn register(&mut self, resolver: Box<dyn UriResolver>) {
        self.resolvers.push(resolver);
    }

    /// Resolve an absolute URI.
    pub fn for_uri(&self, uri: &str) -> Option<Source> {
        let url = Url::parse(uri).ok()?;
        self.resolve_url(&url)
    }

    /// Resolve `relative` against the containing source. Invalid or
    /// unresolvable URIs yield `None`.
    pub fn resolve_uri(&self, base: &Source, relative: &str) -> Option<Source> {
        let encoded = encode_uri(relative);
        match Url::parse(&encoded) {
            Ok(absolute) => return self.resolve_url(&absolute),
            Err(url::ParseError::RelativeUrlWithoutBase) => {}
            Err(e) => {
                tracing::trace!("SourceFactory: invalid URI '{}': {}", relative, e);
                return None;
            }
        }
        if encoded.is_empty() {
            return None;
        }

        if base.is_in_system_library() {
            // dart:core + x.dart -> dart:core/x.dart
            let library = base.uri().split('/').next()?;
            return self.for_uri(&format!("{}/{}", library, encoded));
        }

        let base_url = Url::parse(base.uri()).ok()?;
        let joined = base_url.join(&encoded).ok()?;
        self.resolve_url(&joined)
    }

    fn resolve_url(&self, url: &Url) -> Option<Source> {
        for resolver in &self.resolvers {
            if resolver.can_resolve(url) {
                tracing::trace!("SourceFactory: trying resolver '{}' for {}", resolver.name(), url);
                if let Some(source) = resolver.resolve_absolute(url) {
                    return Some(source);
                }
            }
        }
        None
    }
}

impl Default for SourceFactory {
    fn default() -> Self {
        Self::standard(Arc::new(DartSdk::embedded()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn factory() -> SourceFactory {
        SourceFactory::default()
    }

    #[test]
    fn test_relative_resolution_against_file() {
        let base = Source::new("file:///proj/lib/a.dart");
        let resolved = factory().resolve_uri(&base, "src/b.dart").unwrap();
        assert_eq!(resolved.uri(), "file:///proj/lib/src/b.dart");

        let parent = factory().resolve_uri(&base, "../test/c.dart").unwrap();
        assert_eq!(parent.uri(), "file:///proj/test/c.dart");
    }

    #[test]
    fn test_dart_uris() {
        let base = Source::new("file:///proj/a.dart");
        assert_eq!(
            factory().resolve_uri(&base, "dart:core").unwrap().uri(),
            "dart:core"
        );
        assert!(factory().resolve_uri(&base, "dart:unknown").is_none());
    }

    #[test]
    fn test_spaces_are_encoded() {
        let base = Source::new("file:///proj/a.dart");
        let resolved = factory().resolve_uri(&base, "my file.dart").unwrap();
        assert_eq!(resolved.uri(), "file:///proj/my%20file.dart");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let base = Source::new("file:///proj/a.dart");
        let first = factory().resolve_uri(&base, "b.dart");
        let second = factory().resolve_uri(&base, "b.dart");
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_uris_are_dropped() {
        let base = Source::new("file:///proj/a.dart");
        assert!(factory().resolve_uri(&base, "").is_none());
        assert!(factory().resolve_uri(&base, "http://[::1").is_none());
        assert!(factory().resolve_uri(&base, "unknown:thing").is_none());
    }

    #[test]
    fn test_package_uris() {
        let mut roots = BTreeMap::new();
        roots.insert("util".to_string(), PathBuf::from("/packages/util/lib"));
        let mut factory = factory();
        factory.register(Box::new(PackageUriResolver::new(roots)));

        let base = Source::new("file:///proj/a.dart");
        let resolved = factory.resolve_uri(&base, "package:util/strings.dart").unwrap();
        assert_eq!(resolved.uri(), "file:///packages/util/lib/strings.dart");
        assert!(factory.resolve_uri(&base, "package:other/x.dart").is_none());
    }
}
