// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Artifact key derivation.
//!
//! When a producer does not propose its own storage key, the engine derives
//! one from the logical key. The filesystem generator emits
//! `<subfolder>/<prefix><base64(hash)[0..n]>.<ext>` with the path-hostile
//! base64 characters (`/` and `+`) replaced by `_`.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use larder_core::{ArtifactKey, EntityHash};

/// Derives artifact keys from logical entry keys.
pub trait KeyGenerator {
    /// Derive the storage key for the blob of `logical_key`.
    fn derive_artifact_key(&self, logical_key: &EntityHash) -> ArtifactKey;
}

/// Filesystem key generator.
#[derive(Debug, Clone)]
pub struct PathKeyGenerator {
    subfolder: PathBuf,
    prefix: String,
    extension: String,
    hash_len: usize,
}

impl Default for PathKeyGenerator {
    fn default() -> Self {
        Self {
            subfolder: PathBuf::new(),
            prefix: String::new(),
            extension: "bin".to_owned(),
            hash_len: 8,
        }
    }
}

impl PathKeyGenerator {
    /// Place generated keys under a subfolder of the storage root.
    pub fn with_subfolder<P: Into<PathBuf>>(mut self, subfolder: P) -> Self {
        self.subfolder = subfolder.into();
        self
    }

    /// Prepend a fixed prefix to every generated filename.
    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// File extension of generated keys (without the dot).
    pub fn with_extension<S: Into<String>>(mut self, extension: S) -> Self {
        self.extension = extension.into();
        self
    }

    /// Number of base64 characters of the hash kept in the filename.
    pub fn with_hash_len(mut self, hash_len: usize) -> Self {
        self.hash_len = hash_len;
        self
    }
}

impl KeyGenerator for PathKeyGenerator {
    fn derive_artifact_key(&self, logical_key: &EntityHash) -> ArtifactKey {
        let b64 = STANDARD.encode(logical_key.as_bytes());
        let safe: String = b64
            .chars()
            .take(self.hash_len)
            .map(|c| if c == '/' || c == '+' { '_' } else { c })
            .collect();
        let filename = format!("{}{safe}.{}", self.prefix, self.extension);
        ArtifactKey::Path(self.subfolder.join(filename))
    }
}
