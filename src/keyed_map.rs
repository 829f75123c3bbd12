// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! An associative container keyed by a caller-supplied notion of equality.
//!
//! [`KeyedMap`] is for keys that are not directly usable as native map keys, or whose natural
//! `Eq` is not the identity the caller wants. How keys are hashed and compared is decided by a
//! [`KeyEquivalence`]. Entries whose keys hash alike share a bucket; a bucket disappears together
//! with its last entry.
use crate::{LinkRandomState, create_map};
use smallvec::SmallVec;
use std::{
    collections::HashMap,
    fmt,
    hash::{BuildHasher, Hash, Hasher},
};

/// Decides which keys a [`KeyedMap`] considers the same.
///
/// Implementations must be consistent: keys that are equal must hash alike.
pub trait KeyEquivalence<K: ?Sized> {
    fn hash_key<H: Hasher>(&self, key: &K, state: &mut H);

    fn keys_equal(&self, a: &K, b: &K) -> bool;
}

/// Uses the key's own [`Hash`] and [`Eq`].
///
/// For [`Value`](crate::Value) keys this is structural equality.
#[derive(Debug, Default, Clone, Copy)]
pub struct Structural;

impl<K> KeyEquivalence<K> for Structural
where
    K: Hash + Eq + ?Sized,
{
    fn hash_key<H: Hasher>(&self, key: &K, state: &mut H) {
        key.hash(state);
    }

    fn keys_equal(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

/// Identifies keys by their JSON serialization: two keys are the same exactly when they
/// serialize to the same JSON text.
///
/// NOTE: keys that fail to serialize all land in one bucket and are never equal to anything,
/// including themselves.
#[cfg(feature = "json")]
#[derive(Debug, Default, Clone, Copy)]
pub struct ByJson;

#[cfg(feature = "json")]
impl<K> KeyEquivalence<K> for ByJson
where
    K: ::serde::Serialize + ?Sized,
{
    fn hash_key<H: Hasher>(&self, key: &K, state: &mut H) {
        serde_json::to_vec(key).ok().hash(state);
    }

    fn keys_equal(&self, a: &K, b: &K) -> bool {
        match (serde_json::to_vec(a), serde_json::to_vec(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

type Bucket<K, V> = SmallVec<[(K, V); 1]>;

/// A map whose key identity is decided by a [`KeyEquivalence`].
#[derive(Clone)]
pub struct KeyedMap<K, V, E = Structural> {
    buckets: HashMap<u64, Bucket<K, V>, LinkRandomState>,
    hasher: LinkRandomState,
    equivalence: E,
    len: usize,
}

impl<K: fmt::Debug, V: fmt::Debug, E> fmt::Debug for KeyedMap<K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, E: Default> Default for KeyedMap<K, V, E> {
    fn default() -> Self {
        Self::with_equivalence(E::default())
    }
}

impl<K, V, E> KeyedMap<K, V, E> {
    #[must_use]
    pub fn new() -> Self
    where
        E: Default,
    {
        Self::default()
    }

    #[must_use]
    pub fn with_equivalence(equivalence: E) -> Self {
        Self {
            buckets: create_map(),
            hasher: LinkRandomState::default(),
            equivalence,
            len: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct hash buckets currently allocated.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.buckets
            .values()
            .flat_map(|bucket| bucket.iter().map(|(k, v)| (k, v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut V)> {
        self.buckets
            .values_mut()
            .flat_map(|bucket| bucket.iter_mut().map(|(k, v)| (&*k, v)))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.iter_mut().map(|(_, v)| v)
    }

    /// Keeps only the entries for which `keep` returns true, dropping emptied buckets.
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &mut V) -> bool) {
        let mut removed = 0;
        self.buckets.retain(|_, bucket| {
            let before = bucket.len();
            bucket.retain(|(k, v)| keep(k, v));
            removed += before - bucket.len();
            !bucket.is_empty()
        });
        self.len -= removed;
    }
}

impl<K, V, E> KeyedMap<K, V, E>
where
    E: KeyEquivalence<K>,
{
    fn hash_of(hasher: &LinkRandomState, equivalence: &E, key: &K) -> u64 {
        let mut state = hasher.build_hasher();
        equivalence.hash_key(key, &mut state);
        state.finish()
    }

    fn position(&self, key: &K) -> Option<(u64, usize)> {
        let hash = Self::hash_of(&self.hasher, &self.equivalence, key);
        let bucket = self.buckets.get(&hash)?;
        let i = bucket
            .iter()
            .position(|(k, _)| self.equivalence.keys_equal(k, key))?;
        Some((hash, i))
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.position(key).is_some()
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        let (hash, i) = self.position(key)?;
        Some(&self.buckets[&hash][i].1)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let (hash, i) = self.position(key)?;
        self.buckets.get_mut(&hash).map(|bucket| &mut bucket[i].1)
    }

    /// Inserts `value` under `key`, returning the value it replaced, if any.
    ///
    /// When an equivalent key is already present, that key is kept.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = Self::hash_of(&self.hasher, &self.equivalence, &key);
        let bucket = self.buckets.entry(hash).or_default();
        if let Some((_, old)) = bucket
            .iter_mut()
            .find(|(k, _)| self.equivalence.keys_equal(k, &key))
        {
            return Some(std::mem::replace(old, value));
        }
        bucket.push((key, value));
        self.len += 1;
        None
    }

    /// Returns the value for `key`, inserting the result of `make` first if there is none.
    pub fn get_or_insert_with(&mut self, key: &K, make: impl FnOnce(&K) -> V) -> &mut V
    where
        K: Clone,
    {
        let hash = Self::hash_of(&self.hasher, &self.equivalence, key);
        let bucket = self.buckets.entry(hash).or_default();
        let i = match bucket
            .iter()
            .position(|(k, _)| self.equivalence.keys_equal(k, key))
        {
            Some(i) => i,
            None => {
                let value = make(key);
                bucket.push((key.clone(), value));
                self.len += 1;
                bucket.len() - 1
            }
        };
        &mut bucket[i].1
    }

    /// Removes `key`, dropping its bucket if it was the last entry in it.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let (hash, i) = self.position(key)?;
        let bucket = self.buckets.get_mut(&hash)?;
        let (_, value) = bucket.remove(i);
        if bucket.is_empty() {
            self.buckets.remove(&hash);
        }
        self.len -= 1;
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Value, value};

    /// Treats strings case-insensitively, and hashes everything into one bucket.
    struct Collide;

    impl KeyEquivalence<String> for Collide {
        fn hash_key<H: Hasher>(&self, _key: &String, state: &mut H) {
            0u8.hash(state);
        }

        fn keys_equal(&self, a: &String, b: &String) -> bool {
            a.eq_ignore_ascii_case(b)
        }
    }

    #[test]
    fn structural_keys() {
        let mut map = KeyedMap::<Value, u32>::new();
        assert_eq!(map.insert(value!(["a", ["b"]]), 1), None);
        assert_eq!(map.insert(value!(["a", ["b"]]), 2), Some(1));
        assert_eq!(map.insert(value!(["a", "b"]), 3), None);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&value!(["a", ["b"]])), Some(&2));
        assert!(!map.contains_key(&value!("a")));
    }

    #[test]
    fn custom_equivalence_shares_buckets() {
        let mut map = KeyedMap::with_equivalence(Collide);
        map.insert("Ping".to_string(), 1);
        map.insert("pong".to_string(), 2);
        assert_eq!(map.insert("PING".to_string(), 3), Some(1));
        assert_eq!(map.len(), 2);
        assert_eq!(map.bucket_count(), 1);

        assert_eq!(map.remove(&"ping".to_string()), Some(3));
        assert_eq!(map.bucket_count(), 1);
        assert_eq!(map.remove(&"PONG".to_string()), Some(2));
        assert_eq!(map.bucket_count(), 0);
        assert!(map.is_empty());
        assert_eq!(map.remove(&"pong".to_string()), None);
    }

    #[test]
    fn get_or_insert_with_only_makes_once() {
        let mut map = KeyedMap::<Value, Vec<u32>>::new();
        let mut made = 0;
        for i in 0..3 {
            map.get_or_insert_with(&value!("k"), |_| {
                made += 1;
                Vec::new()
            })
            .push(i);
        }
        assert_eq!(made, 1);
        assert_eq!(map.get(&value!("k")), Some(&vec![0, 1, 2]));
    }

    #[test]
    fn retain_drops_empty_buckets() {
        let mut map = KeyedMap::<u32, u32>::new();
        for i in 0..10 {
            map.insert(i, i * 10);
        }
        map.retain(|k, _| k % 2 == 0);
        assert_eq!(map.len(), 5);
        assert_eq!(map.bucket_count(), 5);
        for (_, v) in map.iter_mut() {
            *v += 1;
        }
        let mut values: Vec<_> = map.values().copied().collect();
        values.sort_unstable();
        assert_eq!(values, [1, 21, 41, 61, 81]);
    }

    #[cfg(feature = "json")]
    #[test]
    fn json_identity() {
        let mut map = KeyedMap::<Value, u32, ByJson>::new();
        map.insert(value!(["x", "y"]), 1);
        assert_eq!(map.get(&value!(["x", "y"])), Some(&1));
        assert_eq!(map.get(&value!(["x", ["y"]])), None);
    }
}
