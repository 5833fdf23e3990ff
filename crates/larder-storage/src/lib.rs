// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Artifact storage for the larder cache.
//!
//! Blobs are opaque byte sequences keyed by [`ArtifactKey`]. This crate
//! defines the read ([`StorageRead`]) and write ([`StorageModify`]) surfaces,
//! the [`FsStorage`] filesystem backend, the [`MemStorage`] byte-budgeted
//! mock, and key derivation ([`KeyGenerator`] / [`PathKeyGenerator`]).
//!
//! # Absence Semantics
//!
//! A missing blob on the read path is a `Missing` error, not a panic — the
//! engine treats it as an evicted entry and recomputes. Saves are
//! create-exclusive: an occupied key is never silently overwritten.
//!
//! # Hash Contract
//!
//! [`StorageRead::hash`] returns the content digest of the bytes actually
//! stored under a key. A backend that cannot hash in principle returns
//! `Ok(None)`, and verification against it passes trivially.
//!
//! [`ArtifactKey`]: larder_core::ArtifactKey
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
    clippy::use_self
)]

mod fs;
mod keygen;
mod mem;
mod traits;

pub use fs::FsStorage;
pub use keygen::{KeyGenerator, PathKeyGenerator};
pub use mem::MemStorage;
pub use traits::{StorageError, StorageModify, StorageRead};
