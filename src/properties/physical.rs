//! Physical properties. See [PhysicalProps].

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::memo::fingerprint::Fingerprint;
use crate::meta::ColumnId;
use crate::properties::colset::ColSet;
use crate::properties::ordering::Ordering;

/// Physical properties: the ordering of rows and the projection (names and positions) of columns.
#[derive(Debug, Eq, PartialEq, Hash, Clone, Default)]
pub struct PhysicalProps {
    ordering: Option<Ordering>,
    projection: Option<Projection>,
}

impl PhysicalProps {
    /// Returns physical properties that have no requirements.
    pub const fn none() -> Self {
        PhysicalProps {
            ordering: None,
            projection: None,
        }
    }

    /// Creates physical properties that require the given ordering.
    pub fn with_ordering(ordering: Ordering) -> Self {
        PhysicalProps {
            ordering: Some(ordering),
            projection: None,
        }
    }

    /// Creates physical properties that require the given projection.
    pub fn with_projection(projection: Projection) -> Self {
        PhysicalProps {
            ordering: None,
            projection: Some(projection),
        }
    }

    /// Returns `true` if there are no requirements.
    pub fn is_empty(&self) -> bool {
        self.ordering.is_none() && self.projection.is_none()
    }

    pub fn ordering(&self) -> Option<&Ordering> {
        self.ordering.as_ref()
    }

    pub fn projection(&self) -> Option<&Projection> {
        self.projection.as_ref()
    }

    /// Returns a copy of these properties with the given ordering.
    pub fn set_ordering(&self, ordering: Option<Ordering>) -> PhysicalProps {
        PhysicalProps {
            ordering,
            projection: self.projection.clone(),
        }
    }

    /// Returns a copy of these properties without the ordering requirement.
    pub fn without_ordering(&self) -> PhysicalProps {
        self.set_ordering(None)
    }

    /// Returns a copy of these properties with the given projection.
    pub fn set_projection(&self, projection: Option<Projection>) -> PhysicalProps {
        PhysicalProps {
            ordering: self.ordering.clone(),
            projection,
        }
    }

    /// Returns a copy of these properties without the projection requirement.
    pub fn without_projection(&self) -> PhysicalProps {
        self.set_projection(None)
    }

    /// Returns `true` if these properties satisfy every requirement of `required`.
    /// An ordering is satisfied by any ordering it is a prefix of.
    pub fn provides(&self, required: &PhysicalProps) -> bool {
        let ordering = match (&required.ordering, &self.ordering) {
            (None, _) => true,
            (Some(r), Some(p)) => r.prefix_of(p),
            (Some(_), None) => false,
        };
        let projection = match (&required.projection, &self.projection) {
            (None, _) => true,
            (Some(r), Some(p)) => p.satisfies(r),
            (Some(_), None) => false,
        };
        ordering && projection
    }

    /// The columns these properties refer to.
    pub fn columns(&self) -> ColSet {
        let mut cols = ColSet::new();
        if let Some(o) = self.ordering.as_ref() {
            cols.union_with(&o.column_set());
        }
        if let Some(p) = self.projection.as_ref() {
            cols.union_with(&p.column_set());
        }
        cols
    }

    /// Encodes these properties into a byte sequence used to compute a fingerprint.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        if let Some(ordering) = self.ordering.as_ref() {
            buf.push(b'o');
            buf.extend_from_slice(&(ordering.columns().len() as u32).to_le_bytes());
            for c in ordering.columns() {
                buf.extend_from_slice(&c.value().to_le_bytes());
            }
        }
        if let Some(projection) = self.projection.as_ref() {
            buf.push(if projection.ordered { b'P' } else { b'p' });
            buf.extend_from_slice(&(projection.columns.len() as u32).to_le_bytes());
            for (label, col) in projection.columns.iter() {
                buf.extend_from_slice(&(col.index() as u32).to_le_bytes());
                buf.extend_from_slice(&(label.len() as u32).to_le_bytes());
                buf.extend_from_slice(label.as_bytes());
            }
        }
        buf
    }
}

impl Display for PhysicalProps {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "[]");
        }
        let mut parts = Vec::new();
        if let Some(ordering) = self.ordering.as_ref() {
            parts.push(format!("ordering={}", ordering));
        }
        if let Some(projection) = self.projection.as_ref() {
            parts.push(format!("projection={}", projection));
        }
        write!(f, "{}", parts.join(" "))
    }
}

/// A list of labeled output columns. When `ordered` is set, the positions of the columns are significant.
#[derive(Debug, Eq, PartialEq, Hash, Clone)]
pub struct Projection {
    columns: Vec<(String, ColumnId)>,
    ordered: bool,
}

impl Projection {
    /// Creates a projection where the order of columns is significant.
    pub fn new(columns: Vec<(String, ColumnId)>) -> Self {
        Projection { columns, ordered: true }
    }

    /// Creates a projection where the order of columns is not significant.
    pub fn unordered(columns: Vec<(String, ColumnId)>) -> Self {
        Projection { columns, ordered: false }
    }

    pub fn columns(&self) -> &[(String, ColumnId)] {
        &self.columns
    }

    pub fn ordered(&self) -> bool {
        self.ordered
    }

    /// Returns the set of columns of this projection.
    pub fn column_set(&self) -> ColSet {
        self.columns.iter().map(|(_, c)| *c).collect()
    }

    /// Returns `true` if this projection satisfies the `required` one.
    pub fn satisfies(&self, required: &Projection) -> bool {
        if required.ordered {
            self.columns == required.columns
        } else {
            let mut l = self.columns.clone();
            let mut r = required.columns.clone();
            l.sort();
            r.sort();
            l == r
        }
    }
}

impl Display for Projection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let columns = self.columns.iter().map(|(label, col)| format!("{}:{}", label, col)).join(", ");
        if self.ordered {
            write!(f, "[{}]", columns)
        } else {
            write!(f, "{{{}}}", columns)
        }
    }
}

/// Identifies an interned set of [physical properties](PhysicalProps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysicalPropsId(u32);

impl PhysicalPropsId {
    /// The identifier of the properties without requirements.
    pub const NONE: PhysicalPropsId = PhysicalPropsId(1);

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl Display for PhysicalPropsId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interns physical properties by fingerprint. Identifier `0` is reserved and
/// identifier `1` always refers to the properties without requirements.
#[derive(Debug, Clone)]
pub struct PhysicalPropsStore {
    props: Vec<PhysicalProps>,
    index: HashMap<Fingerprint, PhysicalPropsId>,
}

impl PhysicalPropsStore {
    pub fn new() -> Self {
        let none = PhysicalProps::none();
        let mut index = HashMap::new();
        index.insert(Fingerprint::new(&none.encode()), PhysicalPropsId::NONE);
        PhysicalPropsStore {
            // the placeholder at 0 is never returned.
            props: vec![PhysicalProps::none(), none],
            index,
        }
    }

    /// Returns the identifier of the given properties. Equal properties receive equal identifiers.
    pub fn intern(&mut self, props: PhysicalProps) -> PhysicalPropsId {
        let fingerprint = Fingerprint::new(&props.encode());
        if let Some(id) = self.index.get(&fingerprint) {
            return *id;
        }
        let id = PhysicalPropsId(self.props.len() as u32);
        self.props.push(props);
        self.index.insert(fingerprint, id);
        id
    }

    /// Returns the properties with the given identifier.
    pub fn get(&self, id: PhysicalPropsId) -> Option<&PhysicalProps> {
        if id.0 == 0 {
            None
        } else {
            self.props.get(id.index())
        }
    }

    /// The number of interned properties (including the empty properties).
    pub fn len(&self) -> usize {
        self.props.len() - 1
    }
}

impl Default for PhysicalPropsStore {
    fn default() -> Self {
        PhysicalPropsStore::new()
    }
}
