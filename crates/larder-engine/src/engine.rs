// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The serve-or-compute orchestrator.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, BTreeMap, BTreeSet};
use std::time::{Duration, Instant, SystemTime};

use larder_core::{
    pretty_size, AccessRecord, ArtifactKey, CacheConfig, CacheEntry, EntityHash,
    SerializationSample, SerializationSummary, StoredArtifact, UtilityPolicy, MAIN_TAG,
};
use larder_meta::{MetadataStore, SampleFilters};
use larder_storage::{KeyGenerator, StorageModify};
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::producer::Producer;

/// Per-call options of [`ObjectCache::lookup_or_produce`].
#[derive(Debug, Clone)]
pub struct Options {
    /// Importance multiplier applied to the entry's benefit.
    pub weight: f64,
    /// Recompute and check content hashes before serving a resident entry.
    pub verify: bool,
    /// Trust the recorded auxiliary hashes of a re-seen entry. Off makes
    /// the engine cross-check the auxiliary key set and every auxiliary
    /// hash against the catalog.
    pub reuse_past_hash: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            weight: 1.0,
            verify: false,
            reuse_past_hash: true,
        }
    }
}

/// Utility-driven content-addressed object cache.
///
/// Generic over the storage backend `S`, the metadata store `M` and the
/// key generator `G`. All public operations take `&mut self`: the engine
/// is the exclusive guard over its stores.
#[derive(Debug)]
pub struct ObjectCache<S, M, G> {
    storage: S,
    meta: M,
    keygen: G,
    policy: UtilityPolicy,
    calculate_hash: bool,
}

impl<S, M, G> ObjectCache<S, M, G>
where
    S: StorageModify,
    M: MetadataStore,
    G: KeyGenerator,
{
    /// Assemble an engine from its collaborators.
    ///
    /// `calculate_hash` enables the save-time integrity check: after
    /// storing a main blob, the engine re-reads its hash from storage and
    /// fails admission on mismatch.
    pub fn new(storage: S, meta: M, keygen: G, config: CacheConfig, calculate_hash: bool) -> Self {
        Self {
            storage,
            meta,
            keygen,
            policy: UtilityPolicy::new(config),
            calculate_hash,
        }
    }

    /// Serve the producer's result from the cache, or compute it and decide
    /// admission by utility. Default options.
    ///
    /// # Errors
    ///
    /// See [`lookup_or_produce`](Self::lookup_or_produce).
    pub fn get<P: Producer>(&mut self, producer: &mut P) -> Result<P::Item, CacheError> {
        self.lookup_or_produce(producer, &Options::default())
    }

    /// Serve the producer's result from the cache, or compute it and decide
    /// admission by utility.
    ///
    /// # Errors
    ///
    /// [`CacheError::Corrupted`] when `verify` finds tampered content;
    /// [`CacheError::NonFunctionalProducer`] / [`CacheError::AuxiliaryMutated`]
    /// on the `reuse_past_hash = false` cross-checks;
    /// [`CacheError::HashMismatch`] when the stored blob disagrees with the
    /// serialized bytes; store, storage and producer failures transparently.
    pub fn lookup_or_produce<P: Producer>(
        &mut self,
        producer: &mut P,
        options: &Options,
    ) -> Result<P::Item, CacheError> {
        let result = self.lookup_or_produce_inner(producer, options);
        if result.is_err() {
            self.discard_failed_mutations();
        }
        result
    }

    fn lookup_or_produce_inner<P: Producer>(
        &mut self,
        producer: &mut P,
        options: &Options,
    ) -> Result<P::Item, CacheError> {
        let now = SystemTime::now();
        let logical_key = producer.logical_key();
        let prior = self.meta.entry(logical_key)?;

        if let Some(entry) = &prior {
            if self.is_resident(entry) {
                return self.serve_resident(producer, entry, options.verify, now);
            }
        }
        self.compute_and_decide(producer, prior, options, now)
    }

    /// Whether every blob of `entry` exists in storage.
    pub fn is_resident(&self, entry: &CacheEntry) -> bool {
        entry.artifacts().keys().all(|key| self.storage.exists(key))
    }

    /// Look up the catalog record for a logical key.
    ///
    /// # Errors
    ///
    /// Metadata store failures.
    pub fn entry_info(&self, logical_key: EntityHash) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.meta.entry(logical_key)?)
    }

    /// Score an entry exactly as the eviction sweep would, against the
    /// current free space and its recorded last access.
    ///
    /// # Errors
    ///
    /// Metadata store and storage failures.
    pub fn utility_of(&self, entry: &CacheEntry) -> Result<f64, CacheError> {
        let now = SystemTime::now();
        let free_space = self.storage.free_space()?;
        let last_access = self.meta.last_access(entry.logical_key())?;
        let resident = self.is_resident(entry);
        Ok(self
            .policy
            .utility(entry, free_space, last_access, now, resident))
    }

    /// Full access history of an entry, oldest first.
    ///
    /// # Errors
    ///
    /// Metadata store failures.
    pub fn access_history(&self, logical_key: EntityHash) -> Result<Vec<SystemTime>, CacheError> {
        Ok(self.meta.access_history(logical_key)?)
    }

    /// Aggregate the recorded serialization samples of one class.
    ///
    /// # Errors
    ///
    /// Metadata store failures.
    pub fn serialization_summary(
        &self,
        class: &str,
        filters: &SampleFilters,
    ) -> Result<SerializationSummary, CacheError> {
        Ok(self.meta.summarize_serialization(class, filters)?)
    }

    /// Snapshot of cataloged entries; `only_resident` filters to entries
    /// whose blobs all exist.
    ///
    /// # Errors
    ///
    /// Metadata store failures.
    pub fn entries(&self, only_resident: bool) -> Result<Vec<CacheEntry>, CacheError> {
        let mut entries = self.meta.entries()?;
        if only_resident {
            entries.retain(|entry| self.is_resident(entry));
        }
        Ok(entries)
    }

    /// Evict resident entries whose utility is negative, worst first.
    ///
    /// Re-evaluates the worst remaining entry against the free space its
    /// predecessors released and stops at the first non-negative score —
    /// utility is non-decreasing in free space, so everything still queued
    /// has only improved. Returns the number of entries evicted.
    ///
    /// # Errors
    ///
    /// [`CacheError::ArtifactRemovalFailed`] when storage refuses a delete;
    /// the pass aborts, and entries already evicted remain evicted.
    pub fn evict(&mut self, retain_history: bool) -> Result<usize, CacheError> {
        let result = self.evict_inner(retain_history);
        if result.is_err() {
            self.discard_failed_mutations();
        }
        result
    }

    fn evict_inner(&mut self, retain_history: bool) -> Result<usize, CacheError> {
        let now = SystemTime::now();
        let free_space = self.storage.free_space()?;

        let mut queue = BinaryHeap::new();
        for entry in self.meta.entries()? {
            if !self.is_resident(&entry) {
                continue;
            }
            let last_access = self.meta.last_access(entry.logical_key())?;
            let utility = self
                .policy
                .utility(&entry, free_space, last_access, now, true);
            if utility < 0.0 {
                queue.push(Reverse(Scored {
                    utility,
                    last_access,
                    entry,
                }));
            }
        }

        let mut evicted = 0;
        while let Some(Reverse(scored)) = queue.pop() {
            let free_now = self.storage.free_space()?;
            let utility =
                self.policy
                    .utility(&scored.entry, free_now, scored.last_access, now, true);
            if utility >= 0.0 {
                break;
            }
            info!(
                entry = %scored.entry.pretty_description(),
                utility,
                "evicting"
            );
            if let Err(err) = self.remove_artifacts(&scored.entry) {
                // Keep what the pass already did durable before surfacing.
                self.meta.commit()?;
                return Err(err);
            }
            self.meta
                .remove_entry(scored.entry.logical_key(), retain_history)?;
            evicted += 1;
        }

        self.meta.commit()?;
        Ok(evicted)
    }

    /// Remove one entry: its blobs (if any are resident) and its catalog
    /// record. Returns whether an entry existed.
    ///
    /// # Errors
    ///
    /// [`CacheError::ArtifactRemovalFailed`] when a present blob cannot be
    /// deleted; store and storage failures.
    pub fn remove(
        &mut self,
        logical_key: EntityHash,
        retain_history: bool,
    ) -> Result<bool, CacheError> {
        let result = self.remove_inner(logical_key, retain_history);
        if result.is_err() {
            self.discard_failed_mutations();
        }
        result
    }

    fn remove_inner(
        &mut self,
        logical_key: EntityHash,
        retain_history: bool,
    ) -> Result<bool, CacheError> {
        let Some(entry) = self.meta.entry(logical_key)? else {
            return Ok(false);
        };
        self.remove_artifacts(&entry)?;
        self.meta.remove_entry(logical_key, retain_history)?;
        self.meta.commit()?;
        Ok(true)
    }

    /// Remove every cataloged entry and all of their resident blobs.
    ///
    /// # Errors
    ///
    /// As [`remove`](Self::remove); the pass aborts on the first failure.
    pub fn remove_all(&mut self, retain_history: bool) -> Result<usize, CacheError> {
        let result = self.remove_all_inner(retain_history);
        if result.is_err() {
            self.discard_failed_mutations();
        }
        result
    }

    fn remove_all_inner(&mut self, retain_history: bool) -> Result<usize, CacheError> {
        let mut removed = 0;
        for entry in self.meta.entries()? {
            if let Err(err) = self.remove_artifacts(&entry) {
                self.meta.commit()?;
                return Err(err);
            }
            self.meta.remove_entry(entry.logical_key(), retain_history)?;
            removed += 1;
        }
        self.meta.commit()?;
        Ok(removed)
    }

    /// Human-readable listing of all entries, worst utility first.
    ///
    /// # Errors
    ///
    /// Metadata store and storage failures.
    pub fn contents_report(&self) -> Result<String, CacheError> {
        let mut scored = Vec::new();
        for entry in self.meta.entries()? {
            let utility = self.utility_of(&entry)?;
            scored.push((utility, entry));
        }
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut report = String::new();
        for (utility, entry) in scored {
            report.push_str(&format!(
                "util={utility:.3}, {}\n",
                entry.pretty_description()
            ));
        }
        Ok(report)
    }

    /// Total size and count of cataloged entries. `resident` filters to
    /// entries whose blobs all exist (`Some(true)`), to tracked-only
    /// entries (`Some(false)`), or counts everything (`None`).
    ///
    /// # Errors
    ///
    /// Metadata store failures.
    pub fn size_summary(&self, resident: Option<bool>) -> Result<(u64, usize), CacheError> {
        let mut size = 0;
        let mut count = 0;
        for entry in self.meta.entries()? {
            if resident.is_none_or(|want| self.is_resident(&entry) == want) {
                size += entry.size_bytes();
                count += 1;
            }
        }
        Ok((size, count))
    }

    /// One-line occupancy summary of the whole cache.
    ///
    /// # Errors
    ///
    /// Metadata store and storage failures.
    pub fn occupancy_report(&self) -> Result<String, CacheError> {
        let free_space = self.storage.free_space()?;
        let (resident_size, resident_count) = self.size_summary(Some(true))?;
        let (_, total_count) = self.size_summary(None)?;
        let (rejected_size, _) = self.size_summary(Some(false))?;
        let capacity = free_space + resident_size;
        let fullness = if capacity == 0 {
            0.0
        } else {
            resident_size as f64 / capacity as f64 * 100.0
        };
        Ok(format!(
            "cache of size {}, {fullness:.1}% full; {resident_count} of {total_count} seen entries stored, {} rejected",
            pretty_size(capacity),
            pretty_size(rejected_size),
        ))
    }

    /// Raw free-space reading from storage, in bytes.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub fn free_space(&self) -> Result<u64, CacheError> {
        Ok(self.storage.free_space()?)
    }

    /// Whether the save-time integrity check is enabled.
    pub fn calculate_hash(&self) -> bool {
        self.calculate_hash
    }

    /// Enable or disable the save-time integrity check.
    pub fn set_calculate_hash(&mut self, enabled: bool) {
        self.calculate_hash = enabled;
    }

    /// The storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Mutable storage access, for harnesses that tamper with blobs or
    /// inject pressure out-of-band.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Close both stores, consuming the engine.
    ///
    /// # Errors
    ///
    /// Metadata store failures.
    pub fn close(mut self) -> Result<(), CacheError> {
        self.storage.close();
        self.meta.close()?;
        Ok(())
    }

    // ── internals ───────────────────────────────────────────────────────

    /// Discard whatever a failed operation left in the open transaction,
    /// so a later commit cannot flush its leftovers.
    fn discard_failed_mutations(&mut self) {
        if let Err(err) = self.meta.rollback() {
            warn!(error = %err, "could not discard uncommitted mutations of a failed operation");
        }
    }

    /// Fast path: verify if asked, record the access, load and
    /// reinstantiate.
    fn serve_resident<P: Producer>(
        &mut self,
        producer: &mut P,
        entry: &CacheEntry,
        verify: bool,
        now: SystemTime,
    ) -> Result<P::Item, CacheError> {
        if verify {
            self.verify_entry(entry)?;
        }
        self.meta.append_access(&AccessRecord {
            logical_key: entry.logical_key(),
            timestamp: now,
        })?;
        self.meta.commit()?;

        let bytes = self.storage.load(entry.main_artifact_key())?;
        let auxiliaries = entry.auxiliaries_by_tag();
        let deserialize_started = Instant::now();
        let item = producer.instantiate(&bytes, auxiliaries.as_ref())?;
        let deserialize_duration = deserialize_started.elapsed();
        debug!(
            entry = %entry.pretty_description(),
            "cache hit"
        );

        // Advisory sample; rides along to the next commit boundary.
        self.meta.append_serialization_sample(&SerializationSample {
            class: entry.serialization_class().to_owned(),
            timestamp: now,
            serialize_duration: None,
            deserialize_duration: Some(deserialize_duration),
            serialized_size: bytes.len() as u64,
            in_memory_size: producer.in_memory_size(&item),
        })?;
        Ok(item)
    }

    /// Recompute the aggregated content hash from storage and compare it to
    /// the recorded one. Unverifiable sides pass trivially.
    fn verify_entry(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let Some(recorded) = entry.content_hash() else {
            return Ok(());
        };
        let mut member_hashes = Vec::with_capacity(entry.artifacts().len());
        for key in entry.artifacts().keys() {
            match self.storage.hash(key)? {
                Some(hash) => member_hashes.push(hash),
                // Backend cannot hash: verification passes trivially.
                None => return Ok(()),
            }
        }
        let actual = EntityHash::combine(member_hashes.iter());
        if actual == recorded {
            Ok(())
        } else {
            Err(CacheError::Corrupted {
                logical_key: entry.logical_key().pretty(),
            })
        }
    }

    /// The compute path: run the producer, build the prospective entry,
    /// decide admission.
    fn compute_and_decide<P: Producer>(
        &mut self,
        producer: &mut P,
        prior: Option<CacheEntry>,
        options: &Options,
        now: SystemTime,
    ) -> Result<P::Item, CacheError> {
        let logical_key = producer.logical_key();

        let compute_started = Instant::now();
        let item = producer.compute();
        let measured = compute_started.elapsed();
        let compute_time = producer.declared_compute_time().unwrap_or(measured);

        let main_key = producer
            .propose_key()
            .unwrap_or_else(|| self.keygen.derive_artifact_key(&logical_key));

        // Size the main blob. Producers that know their size skip
        // serialization here; for the rest we serialize once and keep the
        // bytes for the admission path.
        let mut serialized: Option<(Vec<u8>, Duration)> = None;
        let main_size = match producer.estimate_size(&item) {
            Some(size) => size,
            None => {
                let started = Instant::now();
                let bytes = producer.serialize(&item)?;
                let duration = started.elapsed();
                let len = bytes.len() as u64;
                serialized = Some((bytes, duration));
                len
            }
        };
        let main_hash = serialized
            .as_ref()
            .map(|(bytes, _)| EntityHash::of_bytes(bytes));

        let auxiliaries = producer.auxiliary_artifacts(&self.storage);
        let mut artifacts = BTreeMap::new();
        for (tag, key) in &auxiliaries {
            let size = self.storage.size(key)?;
            let hash = self.storage.hash(key)?;
            artifacts.insert(
                key.clone(),
                StoredArtifact::new(key.clone(), tag, hash, size)?,
            );
        }
        artifacts.insert(
            main_key.clone(),
            StoredArtifact::new(main_key.clone(), MAIN_TAG, main_hash, main_size)?,
        );

        let new_entry = CacheEntry::new(
            logical_key,
            compute_time,
            options.weight,
            main_key.clone(),
            artifacts,
            producer.serialization_class(),
        )?;

        if let Some(prior_entry) = &prior {
            if !options.reuse_past_hash {
                self.check_producer_functional(prior_entry, &new_entry)?;
            }
        }

        let free_space = self.storage.free_space()?;
        let last_access = self.meta.last_access(logical_key)?;
        // Residency at decision time: on this path the fast path has
        // already ruled out a fully resident entry.
        let resident = prior.as_ref().is_some_and(|entry| self.is_resident(entry));
        let utility = self
            .policy
            .utility(&new_entry, free_space, last_access, now, resident);

        if utility < 0.0 {
            debug!(
                entry = %new_entry.pretty_description(),
                utility,
                "negative utility, tracking without storing"
            );
            match &prior {
                None => self.meta.insert_entry(&new_entry)?,
                Some(prior_entry) => {
                    let merged = prior_entry.merged_with(compute_time, options.weight);
                    self.meta.remove_entry(logical_key, true)?;
                    self.meta.insert_entry(&merged)?;
                }
            }
            self.meta.append_access(&AccessRecord {
                logical_key,
                timestamp: now,
            })?;
            self.meta.commit()?;
            return Ok(item);
        }

        // Committed to storing. Serialize if sizing didn't already.
        let (bytes, serialize_duration) = match serialized {
            Some(pair) => pair,
            None => {
                let started = Instant::now();
                let bytes = producer.serialize(&item)?;
                (bytes, started.elapsed())
            }
        };
        if new_entry.artifacts().len() > 1 {
            producer.protect_auxiliaries();
        }

        let declared_hash = EntityHash::of_bytes(&bytes);
        let canonical = self.storage.canonical_key(&main_key);
        self.storage.save(&bytes, &canonical)?;

        if self.calculate_hash {
            if let Some(stored) = self.storage.hash(&canonical)? {
                if stored != declared_hash {
                    // Don't leave the bad blob behind.
                    if !self.storage.remove(&canonical) {
                        warn!(key = %canonical, "could not remove mismatched blob");
                    }
                    return Err(CacheError::HashMismatch {
                        key: main_key.encode(),
                        declared: declared_hash,
                        stored,
                    });
                }
            }
        }

        // Refresh the main descriptor with the exact stored size and hash.
        let admitted = {
            let mut artifacts = new_entry.artifacts().clone();
            artifacts.insert(
                main_key.clone(),
                StoredArtifact::new(
                    main_key.clone(),
                    MAIN_TAG,
                    Some(declared_hash),
                    bytes.len() as u64,
                )?,
            );
            let merged_time = prior
                .as_ref()
                .map_or(compute_time, |entry| entry.compute_time().max(compute_time));
            CacheEntry::new(
                logical_key,
                merged_time,
                options.weight,
                main_key,
                artifacts,
                producer.serialization_class(),
            )?
        };

        if prior.is_some() {
            self.meta.remove_entry(logical_key, true)?;
        }
        self.meta.insert_entry(&admitted)?;
        self.meta.append_access(&AccessRecord {
            logical_key,
            timestamp: now,
        })?;
        self.meta.append_serialization_sample(&SerializationSample {
            class: admitted.serialization_class().to_owned(),
            timestamp: now,
            serialize_duration: Some(serialize_duration),
            deserialize_duration: None,
            serialized_size: bytes.len() as u64,
            in_memory_size: producer.in_memory_size(&item),
        })?;
        self.meta.commit()?;
        debug!(
            entry = %admitted.pretty_description(),
            utility,
            "admitted"
        );
        Ok(item)
    }

    /// The `reuse_past_hash = false` cross-checks for a re-seen entry.
    fn check_producer_functional(
        &self,
        prior: &CacheEntry,
        fresh: &CacheEntry,
    ) -> Result<(), CacheError> {
        let prior_aux: BTreeSet<&ArtifactKey> = prior
            .artifacts()
            .keys()
            .filter(|key| *key != prior.main_artifact_key())
            .collect();
        let fresh_aux: BTreeSet<&ArtifactKey> = fresh
            .artifacts()
            .keys()
            .filter(|key| *key != fresh.main_artifact_key())
            .collect();
        if prior_aux != fresh_aux {
            return Err(CacheError::NonFunctionalProducer {
                logical_key: prior.logical_key().pretty(),
            });
        }
        for key in fresh_aux {
            let recorded = prior.artifacts()[key].content_hash();
            let observed = fresh.artifacts()[key].content_hash();
            if let (Some(recorded), Some(observed)) = (recorded, observed) {
                if recorded != observed {
                    return Err(CacheError::AuxiliaryMutated { key: key.encode() });
                }
            }
        }
        Ok(())
    }

    /// Delete every resident blob of an entry; absent blobs are skipped.
    fn remove_artifacts(&mut self, entry: &CacheEntry) -> Result<(), CacheError> {
        for key in entry.artifacts().keys() {
            if !self.storage.exists(key) {
                continue;
            }
            if !self.storage.remove(key) {
                return Err(CacheError::ArtifactRemovalFailed { key: key.encode() });
            }
        }
        Ok(())
    }
}

/// Eviction-queue element ordered by utility under IEEE total order.
struct Scored {
    utility: f64,
    last_access: Option<SystemTime>,
    entry: CacheEntry,
}

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.utility.total_cmp(&other.utility) == std::cmp::Ordering::Equal
    }
}

impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.utility.total_cmp(&other.utility)
    }
}
