// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Ready-made engine assemblies.

use std::path::Path;

use larder_core::CacheConfig;
use larder_meta::SqliteStore;
use larder_storage::{FsStorage, MemStorage, PathKeyGenerator};

use crate::engine::ObjectCache;
use crate::error::CacheError;

/// Default filename of the metadata catalog inside the cache root.
pub const DEFAULT_DB_FILENAME: &str = ".metadata.sqlite";

/// Filesystem-backed cache: blobs under a root directory, catalog in a
/// SQLite file alongside them.
pub type FileCache = ObjectCache<FsStorage, SqliteStore, PathKeyGenerator>;

/// In-memory cache for tests and harnesses: byte-budgeted blob map,
/// private in-memory catalog.
pub type MemCache = ObjectCache<MemStorage, SqliteStore, PathKeyGenerator>;

/// Assemble a [`FileCache`] rooted at `root`.
///
/// The catalog lives at `root/<db_filename>` ([`DEFAULT_DB_FILENAME`] when
/// `None`). `calculate_hash` enables the save-time integrity check.
///
/// # Errors
///
/// Storage or store failures while opening.
pub fn file_cache<P: AsRef<Path>>(
    root: P,
    config: CacheConfig,
    keygen: PathKeyGenerator,
    db_filename: Option<&str>,
    calculate_hash: bool,
) -> Result<FileCache, CacheError> {
    let root = root.as_ref();
    let storage = FsStorage::open(root)?;
    let db_path = root.join(db_filename.unwrap_or(DEFAULT_DB_FILENAME));
    let meta = SqliteStore::open(db_path)?;
    Ok(ObjectCache::new(
        storage,
        meta,
        keygen,
        config,
        calculate_hash,
    ))
}

/// Assemble a [`MemCache`] with `total_space` bytes of blob capacity.
///
/// # Errors
///
/// Store failures while opening the in-memory catalog.
pub fn mem_cache(total_space: u64, config: CacheConfig) -> Result<MemCache, CacheError> {
    let storage = MemStorage::new(total_space);
    let meta = SqliteStore::open_in_memory()?;
    let keygen = PathKeyGenerator::default().with_prefix("mock_").with_hash_len(6);
    Ok(ObjectCache::new(storage, meta, keygen, config, true))
}
