// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem blob store.
//!
//! Blobs live at `<root>/<artifact_key>` for path-variant keys. Saves are
//! create-exclusive; hashes are SHA-256 over the file bytes, streamed; free
//! space comes from the filesystem itself (statvfs via `fs2`), so the
//! reading reflects every other tenant of the device.

use std::fs::{File, OpenOptions};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use larder_core::{ArtifactKey, EntityHash};
use sha2::{Digest, Sha256};

use crate::traits::{StorageError, StorageModify, StorageRead};

/// Blob store rooted at a directory.
#[derive(Debug)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// [`StorageError::Io`] when the root cannot be created.
    pub fn open<P: Into<PathBuf>>(root: P) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            key: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    /// The root directory blobs resolve against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to an on-disk path. Ident keys are not addressable by
    /// this backend.
    fn resolve(&self, key: &ArtifactKey) -> Result<PathBuf, StorageError> {
        let path = key.as_path().ok_or_else(|| StorageError::BadKey {
            key: key.encode(),
        })?;
        // Joining an already-absolute path yields it unchanged, which makes
        // canonical keys resolve to themselves.
        Ok(self.root.join(path))
    }
}

impl StorageRead for FsStorage {
    fn free_space(&self) -> Result<u64, StorageError> {
        fs2::available_space(&self.root).map_err(|source| StorageError::Io {
            key: self.root.display().to_string(),
            source,
        })
    }

    fn storage_id(&self) -> String {
        self.root.display().to_string()
    }

    fn exists(&self, key: &ArtifactKey) -> bool {
        self.resolve(key).is_ok_and(|path| path.is_file())
    }

    fn size(&self, key: &ArtifactKey) -> Result<u64, StorageError> {
        let path = self.resolve(key)?;
        match std::fs::metadata(&path) {
            Ok(meta) => Ok(meta.len()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(StorageError::Missing {
                key: key.encode(),
            }),
            Err(source) => Err(StorageError::Io {
                key: key.encode(),
                source,
            }),
        }
    }

    fn hash(&self, key: &ArtifactKey) -> Result<Option<EntityHash>, StorageError> {
        let path = self.resolve(key)?;
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::Missing {
                    key: key.encode(),
                })
            }
            Err(source) => {
                return Err(StorageError::Io {
                    key: key.encode(),
                    source,
                })
            }
        };
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher).map_err(|source| StorageError::Io {
            key: key.encode(),
            source,
        })?;
        Ok(Some(EntityHash(hasher.finalize().into())))
    }

    fn remove(&mut self, key: &ArtifactKey) -> bool {
        self.resolve(key)
            .is_ok_and(|path| std::fs::remove_file(path).is_ok())
    }

    fn close(&mut self) {}
}

impl StorageModify for FsStorage {
    fn save(&mut self, bytes: &[u8], key: &ArtifactKey) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                key: key.encode(),
                source,
            })?;
        }
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists {
                    key: key.encode(),
                })
            }
            Err(source) => {
                return Err(StorageError::Io {
                    key: key.encode(),
                    source,
                })
            }
        };
        file.write_all(bytes).map_err(|source| StorageError::Io {
            key: key.encode(),
            source,
        })?;
        Ok(())
    }

    fn load(&self, key: &ArtifactKey) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(StorageError::Missing {
                key: key.encode(),
            }),
            Err(source) => Err(StorageError::Io {
                key: key.encode(),
                source,
            }),
        }
    }

    fn canonical_key(&self, key: &ArtifactKey) -> ArtifactKey {
        self.resolve(key)
            .map_or_else(|_| key.clone(), ArtifactKey::Path)
    }
}
