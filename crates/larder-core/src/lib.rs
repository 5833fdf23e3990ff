// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Larder data model: the value types shared by every layer of the cache.
//!
//! `larder-core` is pure data plus pure functions. It defines the content
//! digest ([`EntityHash`]), the blob identifier ([`ArtifactKey`]), the
//! logical cache record ([`CacheEntry`] and its [`StoredArtifact`] members),
//! the durable bookkeeping records ([`AccessRecord`],
//! [`SerializationSample`]), the engine configuration ([`CacheConfig`]) and
//! the admission/eviction scorer ([`UtilityPolicy`]). Nothing in this crate
//! touches a disk, a database, or a clock — callers capture `now` once and
//! pass it down.
//!
//! # Key Domain Policy
//!
//! A *logical* key ([`EntityHash`]) names an invocation of a computation; an
//! *artifact* key ([`ArtifactKey`]) names one stored blob. The two never mix:
//! logical keys index the metadata catalog, artifact keys index storage.
//!
//! # Determinism Invariant
//!
//! Every derived hash in this crate is a function of byte content and
//! ascending [`ArtifactKey`] order only. No API exposes map iteration order
//! that is not already total and stable.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::cast_precision_loss,
    clippy::use_self
)]

mod artifact_key;
mod config;
mod entity_hash;
mod entry;
mod pretty;
mod samples;
mod utility;

pub use artifact_key::ArtifactKey;
pub use config::CacheConfig;
pub use entity_hash::{EntityHash, ParseHashError};
pub use entry::{CacheEntry, EntryError, StoredArtifact, MAIN_TAG, MAX_TAG_LEN};
pub use pretty::{pretty_duration, pretty_size};
pub use samples::{AccessRecord, SerializationSample, SerializationSummary};
pub use utility::{UtilityPolicy, BYTES_PER_GIB};
