//! Utilities.

use std::fmt::{Debug, Formatter};

const WORD_BITS: usize = 64;

/// A growable set of small non-negative integers.
///
/// Trailing zero words are never stored so that equal sets have equal representations.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BitSet {
    words: Vec<u64>,
}

impl BitSet {
    /// Creates an empty set.
    pub const fn new() -> Self {
        BitSet { words: Vec::new() }
    }

    /// Adds the given value to this set. Returns `true` if the value has not been present.
    pub fn insert(&mut self, value: usize) -> bool {
        let (word, bit) = (value / WORD_BITS, value % WORD_BITS);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let mask = 1u64 << bit;
        let added = self.words[word] & mask == 0;
        self.words[word] |= mask;
        added
    }

    /// Removes the given value from this set. Returns `true` if the value has been present.
    pub fn remove(&mut self, value: usize) -> bool {
        let (word, bit) = (value / WORD_BITS, value % WORD_BITS);
        match self.words.get_mut(word) {
            Some(w) => {
                let mask = 1u64 << bit;
                let removed = *w & mask != 0;
                *w &= !mask;
                self.trim();
                removed
            }
            None => false,
        }
    }

    pub fn contains(&self, value: usize) -> bool {
        let (word, bit) = (value / WORD_BITS, value % WORD_BITS);
        self.words.get(word).map(|w| w & (1u64 << bit) != 0).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// The number of elements of this set.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn clear(&mut self) {
        self.words.clear()
    }

    /// Adds all elements of `other` to this set.
    pub fn union_with(&mut self, other: &BitSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (l, r) in self.words.iter_mut().zip(other.words.iter()) {
            *l |= *r;
        }
    }

    /// Retains only elements that are also present in `other`.
    pub fn intersect_with(&mut self, other: &BitSet) {
        self.words.truncate(other.words.len());
        for (l, r) in self.words.iter_mut().zip(other.words.iter()) {
            *l &= *r;
        }
        self.trim();
    }

    /// Removes all elements of `other` from this set.
    pub fn difference_with(&mut self, other: &BitSet) {
        for (l, r) in self.words.iter_mut().zip(other.words.iter()) {
            *l &= !*r;
        }
        self.trim();
    }

    /// Returns `true` if every element of this set is also an element of `other`.
    pub fn is_subset(&self, other: &BitSet) -> bool {
        if self.words.len() > other.words.len() {
            return false;
        }
        self.words.iter().zip(other.words.iter()).all(|(l, r)| l & !r == 0)
    }

    /// Returns `true` if the sets have at least one common element.
    pub fn intersects(&self, other: &BitSet) -> bool {
        self.words.iter().zip(other.words.iter()).any(|(l, r)| l & r != 0)
    }

    /// Returns an iterator over elements of this set in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, w)| {
            let mut w = *w;
            std::iter::from_fn(move || {
                if w == 0 {
                    None
                } else {
                    let bit = w.trailing_zeros() as usize;
                    w &= w - 1;
                    Some(i * WORD_BITS + bit)
                }
            })
        })
    }

    fn trim(&mut self) {
        while let Some(0) = self.words.last() {
            self.words.pop();
        }
    }
}

impl FromIterator<usize> for BitSet {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        let mut set = BitSet::new();
        for v in iter {
            set.insert(v);
        }
        set
    }
}

impl Debug for BitSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
