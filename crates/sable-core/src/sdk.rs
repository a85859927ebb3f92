//! The embedded Dart SDK
//!
//! Only the handful of `dart:` libraries the engine needs to type-check
//! ordinary code are bundled. They are written in the same Dart subset the
//! parser accepts and go through the normal analysis pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::source::Source;

pub const DART_CORE: &str = "dart:core";
pub const DART_SCHEME: &str = "dart";
pub const DART_EXT_SCHEME: &str = "dart-ext:";

/// Modification stamp for embedded libraries, which never change
const SDK_STAMP: i64 = 0;

#[derive(Debug, Clone)]
pub struct SdkLibrary {
    pub short_name: &'static str,
    pub contents: Arc<str>,
}

#[derive(Debug, Clone)]
pub struct DartSdk {
    libraries: BTreeMap<String, SdkLibrary>,
}

impl DartSdk {
    pub fn embedded() -> Self {
        let mut sdk = Self {
            libraries: BTreeMap::new(),
        };
        sdk.add("dart:core", "core", include_str!("../sdk/core.dart"));
        sdk.add("dart:async", "async", include_str!("../sdk/async.dart"));
        sdk.add("dart:math", "math", include_str!("../sdk/math.dart"));
        sdk
    }

    fn add(&mut self, uri: &str, short_name: &'static str, contents: &str) {
        self.libraries.insert(
            uri.to_string(),
            SdkLibrary {
                short_name,
                contents: Arc::from(contents),
            },
        );
    }

    pub fn library(&self, uri: &str) -> Option<&SdkLibrary> {
        self.libraries.get(uri)
    }

    pub fn contents(&self, source: &Source) -> Option<Arc<str>> {
        self.library(source.uri())
            .map(|library| library.contents.clone())
    }

    pub fn library_uris(&self) -> impl Iterator<Item = &str> {
        self.libraries.keys().map(String::as_str)
    }

    pub fn modification_stamp(&self) -> i64 {
        SDK_STAMP
    }

    pub fn core_source() -> Source {
        Source::new(DART_CORE)
    }
}

impl Default for DartSdk {
    fn default() -> Self {
        Self::embedded()
    }
}

/// True for `dart-ext:` native extension URIs.
pub fn is_dart_ext_uri(uri: &str) -> bool {
    uri.starts_with(DART_EXT_SCHEME)
}
