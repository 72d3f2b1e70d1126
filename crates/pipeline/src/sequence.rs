//! Value-equality wrapper for ordered sequences embedded in models.
//!
//! Hosts cache pipeline outputs by structural equality. A model that embeds a
//! collection must therefore compare by content, element-wise and in order,
//! never by identity of the backing allocation.

use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An immutable, ordered sequence with structural equality and hashing.
///
/// Two sequences are equal iff they have the same length and pairwise-equal
/// elements in the same order; hashing is order-sensitive and consistent with
/// equality. An absent source normalizes to the empty sequence, so a model
/// field moving between "not computed" and "empty" does not invalidate caches.
///
/// Clones share the backing storage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EquatableSequence<T>(Arc<[T]>);

impl<T> EquatableSequence<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self(items.into())
    }

    pub fn empty() -> Self {
        Self(Arc::from(Vec::new()))
    }

    /// Builds a sequence from an optional source; `None` yields the empty
    /// sequence.
    pub fn from_option<I>(source: Option<I>) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        source.map_or_else(Self::empty, |items| items.into_iter().collect())
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }
}

impl<T> Default for EquatableSequence<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Deref for EquatableSequence<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<T> From<Vec<T>> for EquatableSequence<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T> From<Option<Vec<T>>> for EquatableSequence<T> {
    fn from(items: Option<Vec<T>>) -> Self {
        items.map_or_else(Self::empty, Self::new)
    }
}

impl<T: Clone> From<&[T]> for EquatableSequence<T> {
    fn from(items: &[T]) -> Self {
        Self(items.into())
    }
}

impl<T> FromIterator<T> for EquatableSequence<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a, T> IntoIterator for &'a EquatableSequence<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<T: Serialize> Serialize for EquatableSequence<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

// `null` reads back as the empty sequence.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for EquatableSequence<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<Vec<T>>::deserialize(deserializer).map(Self::from)
    }
}
