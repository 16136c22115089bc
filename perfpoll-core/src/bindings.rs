//! Name → handle binding registry shared across poll cycles.
//!
//! Handles are the first eight bytes of the SHA-256 of the property name,
//! read little-endian: deterministic, stable across processes, same name ⇒
//! same handle. Bindings must be fully populated before a session starts;
//! there is no removal.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::types::{PropertyHandle, PropertyName};

/// Registry of bound property names, iterated in stable handle order.
#[derive(Debug, Clone, Default)]
pub struct BindingRegistry {
    bound: BTreeMap<PropertyHandle, PropertyName>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the stable handle for `name` and record the binding.
    ///
    /// Re-binding the same name returns the same handle; a different name
    /// that collides overwrites the stored name (last-write-wins).
    pub fn bind(&mut self, name: impl Into<PropertyName>) -> PropertyHandle {
        let name = name.into();
        let handle = derive_handle(&name);
        self.bound.insert(handle, name);
        handle
    }

    /// The name stored under `handle`, if bound.
    pub fn name(&self, handle: PropertyHandle) -> Option<&PropertyName> {
        self.bound.get(&handle)
    }

    /// Bound `(handle, name)` pairs in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (PropertyHandle, &PropertyName)> {
        self.bound.iter().map(|(handle, name)| (*handle, name))
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}

/// First eight bytes (little-endian) of SHA-256 of the property name.
pub fn derive_handle(name: &PropertyName) -> PropertyHandle {
    let digest = Sha256::digest(name.0.as_bytes());
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&digest[..8]);
    PropertyHandle(u64::from_le_bytes(raw))
}
