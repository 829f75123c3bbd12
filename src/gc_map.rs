// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! A lazily populated map with explicit, predicate-driven collection.
//!
//! [`GcMap`] creates its values through a factory the first time a key is asked for, and keeps
//! them until a [`GcMap::sweep`] is told they are dead. When to sweep, and what counts as dead, is
//! entirely up to the owner: for a [`Link`](crate::Link) collection is a protocol event driven
//! by watermarks, not a memory-management detail.
use crate::keyed_map::{KeyEquivalence, KeyedMap, Structural};
use std::fmt;

/// A [`KeyedMap`] whose values are made on demand and dropped by explicit sweeps.
///
/// `P` is an extra construction parameter handed to the factory alongside the key.
pub struct GcMap<K, V, P = (), E = Structural> {
    map: KeyedMap<K, V, E>,
    make: fn(&K, P) -> V,
}

impl<K: fmt::Debug, V: fmt::Debug, P, E> fmt::Debug for GcMap<K, V, P, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.map.fmt(f)
    }
}

impl<K, V, P, E> GcMap<K, V, P, E> {
    #[must_use]
    pub fn new(make: fn(&K, P) -> V) -> Self
    where
        E: Default,
    {
        Self::with_equivalence(make, E::default())
    }

    #[must_use]
    pub fn with_equivalence(make: fn(&K, P) -> V, equivalence: E) -> Self {
        Self {
            map: KeyedMap::with_equivalence(equivalence),
            make,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.map.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut V)> {
        self.map.iter_mut()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.map.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.map.values_mut()
    }

    /// Drops every value `is_dead` reports as dead.
    ///
    /// Returns whether the map is now completely empty, so that a parent structure holding this
    /// map can itself treat it as dead.
    pub fn sweep(&mut self, mut is_dead: impl FnMut(&K, &mut V) -> bool) -> bool {
        self.map.retain(|k, v| !is_dead(k, v));
        self.map.is_empty()
    }
}

impl<K, V, P, E> GcMap<K, V, P, E>
where
    E: KeyEquivalence<K>,
{
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.map.get_mut(key)
    }

    /// Returns the value for `key`, making it from `key` and `param` if there is none yet.
    pub fn get_or_make(&mut self, key: &K, param: P) -> &mut V
    where
        K: Clone,
    {
        let make = self.make;
        self.map.get_or_insert_with(key, |key| make(key, param))
    }
}
