// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The larder cache engine.
//!
//! [`ObjectCache`] orchestrates the whole serve-or-compute cycle: it looks a
//! [`Producer`]'s logical key up in the metadata catalog, serves resident
//! results (optionally verifying content hashes), computes missing ones,
//! and decides admission with the utility scorer — storing blobs whose
//! discounted recomputation cost outweighs their storage scarcity cost, and
//! merely tracking the rest. A separate sweep ([`ObjectCache::evict`])
//! removes resident entries whose utility has decayed below zero.
//!
//! # Scheduling Model
//!
//! Single-threaded cooperative. Every public operation takes `&mut self`,
//! which is the exclusive guard; producers run inline on the caller's
//! thread and block the engine for their duration. Each operation captures
//! `now` once at entry and threads it through every decision it makes.
//!
//! # Commit Discipline
//!
//! Exactly one metadata commit per successful public operation. Storage
//! writes happen before metadata mutations, so a failed save leaves the
//! catalog untouched.
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
    clippy::use_self
)]

mod codec;
mod engine;
mod error;
mod factory;
mod mock;
mod producer;

pub use codec::{invocation_key, CborProducer, JsonProducer};
pub use engine::{ObjectCache, Options};
pub use error::{CacheError, ProducerError};
pub use factory::{file_cache, mem_cache, FileCache, MemCache, DEFAULT_DB_FILENAME};
pub use mock::MockProducer;
pub use producer::Producer;
