// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Durable metadata catalog for the larder cache.
//!
//! This crate defines the [`MetadataStore`] trait — the seam between the
//! cache engine and whatever durably records entries, artifacts, accesses
//! and serialization samples — and ships [`SqliteStore`], the embedded
//! reference implementation over four relations.
//!
//! # Commit Discipline
//!
//! The store holds an open transaction at all times. Mutations accumulate
//! until [`commit`](MetadataStore::commit), which makes them durable and
//! opens the next transaction. A crash before commit loses the mutations
//! since the last commit and nothing else; the engine calls `commit`
//! exactly once per successful public operation, so the durable state
//! always reflects a prefix of completed operations.
//!
//! # Exclusivity
//!
//! One store handle, one writer. The trait takes `&mut self` for every
//! mutation; concurrent engines over the same database file are undefined
//! behavior at the contract level (SQLite's own locking notwithstanding).
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
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::use_self
)]

mod sqlite;
mod store;

pub use sqlite::SqliteStore;
pub use store::{MetadataStore, SampleFilters, StoreError};
