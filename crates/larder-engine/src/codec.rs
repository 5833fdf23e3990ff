// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Codec producer adapters.
//!
//! [`JsonProducer`] and [`CborProducer`] wrap a closure and a serde type
//! into a full [`Producer`]: the closure computes, the codec serializes.
//! Both are self-contained — they store no auxiliaries and reject any that
//! are offered back at instantiation.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use larder_core::{ArtifactKey, EntityHash};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ProducerError;
use crate::producer::Producer;

/// Fingerprint a computation invocation: a label (the computation's name)
/// plus its serializable arguments.
///
/// Deterministic for a fixed argument type — serde_json emits struct fields
/// in declaration order. Callers needing map-valued arguments should use
/// ordered maps.
pub fn invocation_key<A: Serialize>(label: &str, args: &A) -> EntityHash {
    let mut buf = Vec::new();
    buf.extend_from_slice(label.as_bytes());
    buf.push(0);
    // Serialization of a value that just serialized is infallible in
    // practice; fall back to the label alone if the codec refuses.
    if let Ok(arg_bytes) = serde_json::to_vec(args) {
        buf.extend_from_slice(&arg_bytes);
    }
    EntityHash::of_bytes(&buf)
}

/// Producer adapter over a closure, serialized as JSON.
pub struct JsonProducer<T, F> {
    logical_key: EntityHash,
    class: String,
    compute: F,
    _item: PhantomData<fn() -> T>,
}

impl<T, F> JsonProducer<T, F>
where
    T: Serialize + DeserializeOwned,
    F: FnMut() -> T,
{
    /// Wrap `compute` under the given invocation key.
    pub fn new(logical_key: EntityHash, compute: F) -> Self {
        Self {
            logical_key,
            class: String::new(),
            compute,
            _item: PhantomData,
        }
    }

    /// Tag the producer with a serialization-performance class.
    ///
    /// Rarely useful for JSON — its cost given the object size is flat —
    /// but available for symmetry.
    pub fn with_class<S: Into<String>>(mut self, class: S) -> Self {
        self.class = class.into();
        self
    }
}

impl<T, F> Producer for JsonProducer<T, F>
where
    T: Serialize + DeserializeOwned,
    F: FnMut() -> T,
{
    type Item = T;

    fn logical_key(&self) -> EntityHash {
        self.logical_key
    }

    fn serialization_class(&self) -> String {
        self.class.clone()
    }

    fn compute(&mut self) -> T {
        (self.compute)()
    }

    fn serialize(&self, item: &T) -> Result<Vec<u8>, ProducerError> {
        serde_json::to_vec(item).map_err(|err| ProducerError::Codec(Box::new(err)))
    }

    fn instantiate(
        &self,
        bytes: &[u8],
        auxiliaries: Option<&BTreeMap<String, ArtifactKey>>,
    ) -> Result<T, ProducerError> {
        if auxiliaries.is_some() {
            return Err(ProducerError::UnexpectedAuxiliaries);
        }
        serde_json::from_slice(bytes).map_err(|err| ProducerError::Codec(Box::new(err)))
    }
}

/// Producer adapter over a closure, serialized as CBOR.
///
/// The binary counterpart of [`JsonProducer`] for items whose JSON form is
/// wasteful.
pub struct CborProducer<T, F> {
    logical_key: EntityHash,
    class: String,
    compute: F,
    _item: PhantomData<fn() -> T>,
}

impl<T, F> CborProducer<T, F>
where
    T: Serialize + DeserializeOwned,
    F: FnMut() -> T,
{
    /// Wrap `compute` under the given invocation key.
    pub fn new(logical_key: EntityHash, compute: F) -> Self {
        Self {
            logical_key,
            class: String::new(),
            compute,
            _item: PhantomData,
        }
    }

    /// Tag the producer with a serialization-performance class.
    pub fn with_class<S: Into<String>>(mut self, class: S) -> Self {
        self.class = class.into();
        self
    }
}

impl<T, F> Producer for CborProducer<T, F>
where
    T: Serialize + DeserializeOwned,
    F: FnMut() -> T,
{
    type Item = T;

    fn logical_key(&self) -> EntityHash {
        self.logical_key
    }

    fn serialization_class(&self) -> String {
        self.class.clone()
    }

    fn compute(&mut self) -> T {
        (self.compute)()
    }

    fn serialize(&self, item: &T) -> Result<Vec<u8>, ProducerError> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(item, &mut buf)
            .map_err(|err| ProducerError::Codec(Box::new(err)))?;
        Ok(buf)
    }

    fn instantiate(
        &self,
        bytes: &[u8],
        auxiliaries: Option<&BTreeMap<String, ArtifactKey>>,
    ) -> Result<T, ProducerError> {
        if auxiliaries.is_some() {
            return Err(ProducerError::UnexpectedAuxiliaries);
        }
        ciborium::de::from_reader(bytes).map_err(|err| ProducerError::Codec(Box::new(err)))
    }
}
