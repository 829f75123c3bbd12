// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Payload values carried by demands and responses.
//!
//! A [`Value`] is a tree of strings and ordered lists of values. Equality, hashing and ordering
//! are structural, which is what allows responses to be correlated with demands purely by the
//! demanded value: two values that serialize identically always compare equal.
use std::fmt;

/// A demand or response payload.
///
/// With the `serde` feature enabled, values serialize untagged: a string becomes a JSON string
/// and a list becomes a JSON array.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    String(String),
    List(Vec<Value>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s:?}"),
            Value::List(items) => f.debug_list().entries(items).finish(),
        }
    }
}

impl Value {
    /// Returns the string held by this value, if it is a leaf.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::List(_) => None,
        }
    }

    /// Returns the items of this value, if it is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::String(_) => None,
            Value::List(items) => Some(items),
        }
    }

    /// Nesting depth of this value. A string has depth 1, an empty list depth 1, and every level of
    /// list nesting adds one.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Value::String(_) => 1,
            Value::List(items) => 1 + items.iter().map(Value::depth).max().unwrap_or(0),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl<V> FromIterator<V> for Value
where
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Value::List(iter.into_iter().map(Into::into).collect())
    }
}

impl PartialEq<str> for Value {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

#[cfg(any(test, feature = "arbitrary"))]
impl quickcheck::Arbitrary for Value {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        arbitrary_value(g, 2)
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        match self {
            Value::String(_) => quickcheck::empty_shrinker(),
            Value::List(items) => Box::new(items.clone().into_iter()),
        }
    }
}

// a small alphabet so that generated histories actually contain equal neighbours to merge
#[cfg(any(test, feature = "arbitrary"))]
fn arbitrary_value(g: &mut quickcheck::Gen, depth: usize) -> Value {
    use quickcheck::Arbitrary;

    if depth == 0 || bool::arbitrary(g) {
        Value::from(*g.choose(&["ping", "pong", "x", "y"]).unwrap())
    } else {
        let len = usize::arbitrary(g) % 3;
        Value::List((0..len).map(|_| arbitrary_value(g, depth - 1)).collect())
    }
}
