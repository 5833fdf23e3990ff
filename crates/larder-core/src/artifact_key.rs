// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Blob identifiers.
//!
//! An [`ArtifactKey`] names a single blob in artifact storage. Filesystem
//! backends use the [`ArtifactKey::Path`] variant (a relative path under the
//! storage root); backends with opaque addressing use [`ArtifactKey::Ident`].
//!
//! # Ordering Invariant
//!
//! The ordering over keys is total and stable — `Path` sorts before `Ident`,
//! values sort within a variant — because multi-blob entry hashes are
//! computed over artifacts iterated in ascending key order.

use std::path::{Path, PathBuf};

/// Identifier of a single stored blob.
///
/// Serialized with [`encode`](ArtifactKey::encode) /
/// [`decode`](ArtifactKey::decode). The string form of a `Path` key is the
/// path itself; an `Ident` key carries the reserved `id:` prefix. Path keys
/// must therefore never begin with `id:` — generated and proposed keys live
/// under a storage root and never do.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactKey {
    /// Relative filesystem path under the storage root.
    Path(PathBuf),
    /// Abstract identifier for non-filesystem backends.
    Ident(String),
}

/// Reserved prefix marking the string form of an [`ArtifactKey::Ident`].
const IDENT_PREFIX: &str = "id:";

impl ArtifactKey {
    /// Build a path-variant key.
    pub fn path<P: Into<PathBuf>>(path: P) -> Self {
        Self::Path(path.into())
    }

    /// Build an ident-variant key.
    pub fn ident<S: Into<String>>(ident: S) -> Self {
        Self::Ident(ident.into())
    }

    /// The path, if this is a path key.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(p) => Some(p),
            Self::Ident(_) => None,
        }
    }

    /// Serialize to the canonical string form.
    pub fn encode(&self) -> String {
        match self {
            Self::Path(p) => p.display().to_string(),
            Self::Ident(i) => format!("{IDENT_PREFIX}{i}"),
        }
    }

    /// Parse the canonical string form. Total: any string is a valid key.
    pub fn decode(s: &str) -> Self {
        s.strip_prefix(IDENT_PREFIX).map_or_else(
            || Self::Path(PathBuf::from(s)),
            |ident| Self::Ident(ident.to_owned()),
        )
    }

    /// Human-facing shortening to at most roughly `max_len` characters.
    ///
    /// Path keys are shortened component-wise around a `...` in the middle,
    /// preserving the outermost components on both ends. Ident keys keep a
    /// head and tail around an ellipsis.
    pub fn pretty_shorten(&self, max_len: usize) -> String {
        match self {
            Self::Path(p) => shorten_path(p, max_len),
            Self::Ident(i) => shorten_middle(i, max_len),
        }
    }
}

impl std::fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Component-wise middle-ellipsis path shortening.
///
/// Alternates taking components from the tail and the head until adding one
/// more would exceed `max_len`, leaving `...` where components were dropped.
fn shorten_path(path: &Path, max_len: usize) -> String {
    let full = path.display().to_string();
    if full.len() < max_len {
        return full;
    }

    let sep = std::path::MAIN_SEPARATOR;
    let mut remaining: Vec<&str> = full.split(sep).collect();
    let mut shortened = String::from("...");
    let mut take_tail = true;

    while shortened.len() < max_len {
        if remaining.is_empty() {
            return shortened;
        }
        if take_tail {
            let tail = remaining.remove(remaining.len() - 1);
            shortened = shortened.replace("...", &format!("...{sep}{tail}"));
        } else {
            let head = remaining.remove(0);
            shortened = shortened.replace("...", &format!("{head}{sep}..."));
        }
        take_tail = !take_tail;
    }
    shortened
}

/// Keep a head and tail of `s` around a middle ellipsis.
fn shorten_middle(s: &str, max_len: usize) -> String {
    if s.len() <= max_len || max_len < 5 {
        return s.to_owned();
    }
    let keep = max_len - 3;
    let head = keep / 2 + keep % 2;
    let tail = keep / 2;
    let head_str: String = s.chars().take(head).collect();
    let tail_str: String = s.chars().rev().take(tail).collect::<Vec<_>>().into_iter().rev().collect();
    format!("{head_str}...{tail_str}")
}
