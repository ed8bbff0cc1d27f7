//! Orderings.

use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::meta::ColumnId;
use crate::properties::colset::ColSet;

/// Describes how rows are sorted: a sequence of columns with sort directions.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Ordering {
    columns: Vec<OrderingColumn>,
}

impl Ordering {
    /// Creates an ordering from the given ordering columns.
    ///
    /// # Panics
    ///
    /// This method panics if the ordering columns are empty.
    pub fn new(columns: Vec<OrderingColumn>) -> Self {
        assert!(!columns.is_empty(), "columns are not specified");
        Ordering { columns }
    }

    /// Creates an ordering where all the given columns are ordered in ascending order.
    pub fn from_columns(columns: Vec<ColumnId>) -> Self {
        Ordering::new(columns.into_iter().map(OrderingColumn::asc).collect())
    }

    /// A reference to the ordering columns.
    pub fn columns(&self) -> &[OrderingColumn] {
        &self.columns
    }

    /// Returns `true` if the this ordering is a prefix of the given ordering.
    pub fn prefix_of(&self, other: &Ordering) -> bool {
        if self.columns.len() > other.columns.len() {
            return false;
        }
        self.columns.iter().zip(other.columns.iter()).all(|(l, r)| l == r)
    }

    /// Returns the set of columns this ordering refers to.
    pub fn column_set(&self) -> ColSet {
        self.columns.iter().map(|c| c.column()).collect()
    }
}

impl Display for Ordering {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.columns.iter().join(", "))
    }
}

/// Specifies how a column is sorted. The sign of the stored value encodes the direction:
/// negative values denote descending order.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Hash, Ord, PartialOrd)]
pub struct OrderingColumn(i32);

impl OrderingColumn {
    /// Creates an ordering for the given column.
    pub fn ord(id: ColumnId, descending: bool) -> Self {
        if descending {
            OrderingColumn::desc(id)
        } else {
            OrderingColumn::asc(id)
        }
    }

    /// Ordering in ascending order for the given column.
    pub fn asc(id: ColumnId) -> Self {
        OrderingColumn(id.index() as i32)
    }

    /// Ordering in descending order for the given column.
    pub fn desc(id: ColumnId) -> Self {
        OrderingColumn(-(id.index() as i32))
    }

    /// Returns the column.
    pub fn column(&self) -> ColumnId {
        ColumnId::new(self.0.unsigned_abs() as usize)
    }

    /// Returns `true` if the column is sorted in descending order.
    pub fn descending(&self) -> bool {
        self.0 < 0
    }

    /// The signed representation of this ordering column.
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl Display for OrderingColumn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.descending() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "+{}", self.0)
        }
    }
}
