//! Sets of columns.

use std::fmt::{Debug, Display, Formatter};

use itertools::Itertools;

use crate::meta::ColumnId;
use crate::util::BitSet;

/// A set of [column identifiers](ColumnId).
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColSet {
    bits: BitSet,
}

impl ColSet {
    /// Creates an empty set of columns.
    pub const fn new() -> Self {
        ColSet { bits: BitSet::new() }
    }

    /// Creates a set that contains only the given column.
    pub fn single(column: ColumnId) -> Self {
        let mut set = ColSet::new();
        set.insert(column);
        set
    }

    pub fn insert(&mut self, column: ColumnId) -> bool {
        self.bits.insert(column.index())
    }

    pub fn remove(&mut self, column: ColumnId) -> bool {
        self.bits.remove(column.index())
    }

    pub fn contains(&self, column: ColumnId) -> bool {
        self.bits.contains(column.index())
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Returns a union of this set and the `other` set.
    pub fn union(&self, other: &ColSet) -> ColSet {
        let mut bits = self.bits.clone();
        bits.union_with(&other.bits);
        ColSet { bits }
    }

    /// Returns the columns of this set that are also present in `other`.
    pub fn intersection(&self, other: &ColSet) -> ColSet {
        let mut bits = self.bits.clone();
        bits.intersect_with(&other.bits);
        ColSet { bits }
    }

    /// Returns the columns of this set that are not present in `other`.
    pub fn difference(&self, other: &ColSet) -> ColSet {
        let mut bits = self.bits.clone();
        bits.difference_with(&other.bits);
        ColSet { bits }
    }

    pub fn union_with(&mut self, other: &ColSet) {
        self.bits.union_with(&other.bits)
    }

    pub fn is_subset(&self, other: &ColSet) -> bool {
        self.bits.is_subset(&other.bits)
    }

    pub fn intersects(&self, other: &ColSet) -> bool {
        self.bits.intersects(&other.bits)
    }

    /// Returns an iterator over columns in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ColumnId> + '_ {
        self.bits.iter().map(ColumnId::new)
    }
}

impl FromIterator<ColumnId> for ColSet {
    fn from_iter<T: IntoIterator<Item = ColumnId>>(iter: T) -> Self {
        let mut set = ColSet::new();
        for c in iter {
            set.insert(c);
        }
        set
    }
}

impl<'a> FromIterator<&'a ColumnId> for ColSet {
    fn from_iter<T: IntoIterator<Item = &'a ColumnId>>(iter: T) -> Self {
        iter.into_iter().copied().collect()
    }
}

impl Display for ColSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", self.iter().join(","))
    }
}

impl Debug for ColSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ColSet{}", self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn cols(ids: &[usize]) -> ColSet {
        ids.iter().map(|i| ColumnId::new(*i)).collect()
    }

    #[test]
    fn test_colset_ops() {
        let a = cols(&[1, 2, 5]);
        let b = cols(&[2, 3]);

        assert_eq!(a.union(&b), cols(&[1, 2, 3, 5]));
        assert_eq!(a.intersection(&b), cols(&[2]));
        assert_eq!(a.difference(&b), cols(&[1, 5]));
        assert!(cols(&[1, 5]).is_subset(&a));
        assert!(!b.is_subset(&a));
        assert_eq!(format!("{}", a), "(1,2,5)");
    }
}
