// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cache key factory.
//!
//! Keys take the form `<namespace>:<k1>=<v1>&<k2>=<v2>` with parameter names
//! sorted lexicographically, so parameter order never changes the key. The
//! parameter set (the *fingerprint*) holds already-normalized values; callers
//! normalize with this crate's functions before keying.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Keys longer than this are digested; the durable KV tier bounds key size.
const MAX_KEY_LEN: usize = 512;

/// A normalized, order-independent parameter set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint {
    params: BTreeMap<String, String>,
}

impl Fingerprint {
    /// Empty fingerprint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one parameter. Later inserts of the same name win.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// True when no parameters have been added.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Render as the sorted `k=v&k=v` tail of a cache key.
    pub fn render(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Build a cache key from a namespace and fingerprint.
///
/// Oversized keys keep the namespace prefix and replace the parameter tail
/// with its SHA-256 digest, staying under the KV key-size bound while
/// remaining deterministic.
///
/// ```
/// use bgw_normalize::{cache_key, Fingerprint};
/// let fp = Fingerprint::new()
///     .with("title", "great gatsby")
///     .with("maxResults", "20");
/// assert_eq!(
///     cache_key("search:title", &fp),
///     "search:title:maxResults=20&title=great gatsby"
/// );
/// ```
pub fn cache_key(namespace: &str, fingerprint: &Fingerprint) -> String {
    let tail = fingerprint.render();
    let key = if tail.is_empty() {
        namespace.to_string()
    } else {
        format!("{namespace}:{tail}")
    };
    if key.len() <= MAX_KEY_LEN {
        return key;
    }
    let digest = hex::encode(Sha256::digest(tail.as_bytes()));
    format!("{namespace}:sha256={digest}")
}
