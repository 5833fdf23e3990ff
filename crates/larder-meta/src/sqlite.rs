// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Embedded SQLite implementation of the metadata store.
//!
//! Four relations: `entries`, `artifacts`, `accesses`,
//! `serialization_samples`. Logical keys and content hashes are stored as
//! URL-safe base64 text; artifact keys in their canonical encoded string
//! form; timestamps as REAL epoch seconds.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use larder_core::{
    AccessRecord, ArtifactKey, CacheEntry, EntityHash, SerializationSample,
    SerializationSummary, StoredArtifact,
};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::store::{MetadataStore, SampleFilters, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS entries (
    logical_key          TEXT PRIMARY KEY,
    compute_time_seconds REAL NOT NULL,
    weight               REAL NOT NULL,
    main_artifact_key    TEXT NOT NULL,
    serialization_class  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS artifacts (
    artifact_key TEXT PRIMARY KEY,
    logical_key  TEXT NOT NULL,
    tag          TEXT NOT NULL,
    content_hash TEXT,
    size_bytes   REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_artifacts_logical_tag ON artifacts (logical_key, tag);
CREATE TABLE IF NOT EXISTS accesses (
    logical_key TEXT NOT NULL,
    timestamp   REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_accesses_timestamp ON accesses (timestamp);
CREATE TABLE IF NOT EXISTS serialization_samples (
    class               TEXT NOT NULL,
    timestamp           REAL NOT NULL,
    serialize_seconds   REAL,
    deserialize_seconds REAL,
    serialized_size     REAL NOT NULL,
    in_memory_size      REAL,
    PRIMARY KEY (class, timestamp)
);
";

/// Metadata catalog backed by an embedded SQLite file.
///
/// Holds an open transaction between [`commit`](MetadataStore::commit)
/// calls; dropping (or closing) the handle rolls back whatever was not
/// committed.
pub struct SqliteStore {
    path: PathBuf,
    conn: Option<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .field("open", &self.conn.is_some())
            .finish()
    }
}

impl SqliteStore {
    /// Open (creating if absent) the catalog at `path`.
    ///
    /// # Errors
    ///
    /// Propagates database errors from opening or schema creation.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                // Best effort; Connection::open reports the real failure.
                let _ = std::fs::create_dir_all(parent);
            }
        }
        let conn = Connection::open(&path)?;
        Self::bootstrap(conn, path)
    }

    /// Open a private in-memory catalog. Test and mock use.
    ///
    /// # Errors
    ///
    /// Propagates database errors from schema creation.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(conn, PathBuf::from(":memory:"))
    }

    fn bootstrap(conn: Connection, path: PathBuf) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        conn.execute_batch("BEGIN")?;
        debug!(path = %path.display(), "metadata store open");
        Ok(Self {
            path,
            conn: Some(conn),
        })
    }

    /// Path of the backing database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<&Connection, StoreError> {
        self.conn.as_ref().ok_or(StoreError::Closed)
    }

    fn assemble_entry(
        &self,
        logical_key: EntityHash,
        compute_time_seconds: f64,
        weight: f64,
        main_artifact_key: &str,
        serialization_class: String,
    ) -> Result<CacheEntry, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT artifact_key, tag, content_hash, size_bytes
             FROM artifacts WHERE logical_key = ?1",
        )?;
        let rows = stmt.query_map(params![logical_key.as_url_base64()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;

        let mut artifacts = std::collections::BTreeMap::new();
        for row in rows {
            let (key_str, tag, hash_str, size) = row?;
            let key = ArtifactKey::decode(&key_str);
            let hash = hash_str
                .map(|s| EntityHash::from_url_base64(&s))
                .transpose()?;
            let artifact = StoredArtifact::new(key.clone(), &tag, hash, size as u64)?;
            artifacts.insert(key, artifact);
        }

        Ok(CacheEntry::new(
            logical_key,
            duration_from_seconds(compute_time_seconds),
            weight,
            ArtifactKey::decode(main_artifact_key),
            artifacts,
            serialization_class,
        )?)
    }

    fn insert_artifact_row(
        &self,
        logical_key: EntityHash,
        artifact: &StoredArtifact,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO artifacts (artifact_key, logical_key, tag, content_hash, size_bytes)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                artifact.artifact_key().encode(),
                logical_key.as_url_base64(),
                artifact.tag(),
                artifact.content_hash().map(|h| h.as_url_base64()),
                artifact.size_bytes() as f64,
            ],
        )
        .map_err(|err| map_duplicate(err, &artifact.artifact_key().encode()))?;
        Ok(())
    }
}

impl MetadataStore for SqliteStore {
    fn insert_entry(&mut self, entry: &CacheEntry) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO entries
             (logical_key, compute_time_seconds, weight, main_artifact_key, serialization_class)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.logical_key().as_url_base64(),
                entry.compute_time().as_secs_f64(),
                entry.weight(),
                entry.main_artifact_key().encode(),
                entry.serialization_class(),
            ],
        )
        .map_err(|err| map_duplicate(err, &entry.logical_key().as_url_base64()))?;
        for artifact in entry.artifacts().values() {
            self.insert_artifact_row(entry.logical_key(), artifact)?;
        }
        Ok(())
    }

    fn entry(&self, logical_key: EntityHash) -> Result<Option<CacheEntry>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT compute_time_seconds, weight, main_artifact_key, serialization_class
                 FROM entries WHERE logical_key = ?1",
                params![logical_key.as_url_base64()],
                |row| {
                    Ok((
                        row.get::<_, f64>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        match row {
            None => Ok(None),
            Some((compute, weight, main_key, class)) => Ok(Some(
                self.assemble_entry(logical_key, compute, weight, &main_key, class)?,
            )),
        }
    }

    fn entry_by_artifact(&self, key: &ArtifactKey) -> Result<Option<CacheEntry>, StoreError> {
        let conn = self.conn()?;
        let owner = conn
            .query_row(
                "SELECT logical_key FROM artifacts WHERE artifact_key = ?1",
                params![key.encode()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        match owner {
            None => Ok(None),
            Some(logical_key) => self.entry(EntityHash::from_url_base64(&logical_key)?),
        }
    }

    fn entries(&self) -> Result<Vec<CacheEntry>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT logical_key, compute_time_seconds, weight, main_artifact_key,
                    serialization_class
             FROM entries ORDER BY logical_key",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        let mut entries = Vec::with_capacity(rows.len());
        for (key_str, compute, weight, main_key, class) in rows {
            let logical_key = EntityHash::from_url_base64(&key_str)?;
            entries.push(self.assemble_entry(logical_key, compute, weight, &main_key, class)?);
        }
        Ok(entries)
    }

    fn remove_entry(
        &mut self,
        logical_key: EntityHash,
        retain_history: bool,
    ) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let key = logical_key.as_url_base64();
        conn.execute("DELETE FROM artifacts WHERE logical_key = ?1", params![key])?;
        let removed = conn.execute("DELETE FROM entries WHERE logical_key = ?1", params![key])?;
        if !retain_history {
            conn.execute("DELETE FROM accesses WHERE logical_key = ?1", params![key])?;
        }
        Ok(removed > 0)
    }

    fn append_access(&mut self, access: &AccessRecord) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO accesses (logical_key, timestamp) VALUES (?1, ?2)",
            params![
                access.logical_key.as_url_base64(),
                epoch_seconds(access.timestamp)
            ],
        )?;
        Ok(())
    }

    fn last_access(&self, logical_key: EntityHash) -> Result<Option<SystemTime>, StoreError> {
        let conn = self.conn()?;
        let newest = conn
            .query_row(
                "SELECT timestamp FROM accesses WHERE logical_key = ?1
                 ORDER BY timestamp DESC LIMIT 1",
                params![logical_key.as_url_base64()],
                |row| row.get::<_, f64>(0),
            )
            .optional()?;
        Ok(newest.map(time_from_epoch))
    }

    fn access_history(&self, logical_key: EntityHash) -> Result<Vec<SystemTime>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT timestamp FROM accesses WHERE logical_key = ?1 ORDER BY timestamp ASC",
        )?;
        let rows = stmt
            .query_map(params![logical_key.as_url_base64()], |row| {
                row.get::<_, f64>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().map(time_from_epoch).collect())
    }

    fn append_serialization_sample(
        &mut self,
        sample: &SerializationSample,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO serialization_samples
             (class, timestamp, serialize_seconds, deserialize_seconds,
              serialized_size, in_memory_size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                sample.class,
                epoch_seconds(sample.timestamp),
                sample.serialize_duration.map(|d| d.as_secs_f64()),
                sample.deserialize_duration.map(|d| d.as_secs_f64()),
                sample.serialized_size as f64,
                sample.in_memory_size.map(|s| s as f64),
            ],
        )
        .map_err(|err| map_duplicate(err, &sample.class))?;
        Ok(())
    }

    fn summarize_serialization(
        &self,
        class: &str,
        filters: &SampleFilters,
    ) -> Result<SerializationSummary, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, serialize_seconds, deserialize_seconds, serialized_size
             FROM serialization_samples WHERE class = ?1 ORDER BY timestamp DESC",
        )?;
        let rows = stmt
            .query_map(params![class], |row| {
                Ok((
                    row.get::<_, f64>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let matches = |(_, ser, _, size): &(f64, Option<f64>, Option<f64>, f64)| {
            let size = *size as u64;
            if filters.min_size.is_some_and(|min| size < min) {
                return false;
            }
            if filters.max_size.is_some_and(|max| size > max) {
                return false;
            }
            if let Some(min_ser) = filters.min_serialize_duration {
                if !ser.is_some_and(|s| s >= min_ser.as_secs_f64()) {
                    return false;
                }
            }
            true
        };

        // Rows arrive newest-first; value filters apply before the last_n cut.
        let kept: Vec<_> = rows
            .into_iter()
            .filter(matches)
            .take(filters.last_n.map_or(usize::MAX, |n| n as usize))
            .collect();

        let mean_of = |values: Vec<f64>| {
            if values.is_empty() {
                None
            } else {
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                Some(duration_from_seconds(mean))
            }
        };
        let serialize: Vec<f64> = kept.iter().filter_map(|(_, s, _, _)| *s).collect();
        let deserialize: Vec<f64> = kept.iter().filter_map(|(_, _, d, _)| *d).collect();
        let oldest = kept
            .iter()
            .map(|(ts, _, _, _)| *ts)
            .fold(None::<f64>, |acc, ts| {
                Some(acc.map_or(ts, |prev| prev.min(ts)))
            });

        Ok(SerializationSummary {
            mean_serialize: mean_of(serialize),
            mean_deserialize: mean_of(deserialize),
            sample_count: kept.len() as u64,
            oldest_sample: oldest.map(time_from_epoch),
        })
    }

    fn add_artifact_to_entry(
        &mut self,
        logical_key: EntityHash,
        artifact: &StoredArtifact,
    ) -> Result<(), StoreError> {
        if self.entry(logical_key)?.is_none() {
            return Err(StoreError::Missing {
                key: logical_key.as_url_base64(),
            });
        }
        self.insert_artifact_row(logical_key, artifact)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute_batch("COMMIT; BEGIN")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute_batch("ROLLBACK; BEGIN")?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        match self.conn.take() {
            None => Err(StoreError::Closed),
            Some(conn) => {
                debug!(path = %self.path.display(), "metadata store closed");
                conn.close().map_err(|(_, err)| StoreError::Unavailable(err))
            }
        }
    }
}

/// Map a SQLite uniqueness violation to [`StoreError::DuplicateKey`].
fn map_duplicate(err: rusqlite::Error, key: &str) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::DuplicateKey {
                key: key.to_owned(),
            }
        }
        other => StoreError::Unavailable(other),
    }
}

fn epoch_seconds(t: SystemTime) -> f64 {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

fn time_from_epoch(secs: f64) -> SystemTime {
    if secs.is_finite() && secs > 0.0 {
        SystemTime::UNIX_EPOCH + Duration::from_secs_f64(secs)
    } else {
        SystemTime::UNIX_EPOCH
    }
}

fn duration_from_seconds(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}
