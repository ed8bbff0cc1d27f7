//! Logical and physical properties of expressions.

pub mod colset;
pub mod logical;
pub mod ordering;
pub mod physical;
pub mod provider;

pub use colset::ColSet;
pub use logical::{LogicalProps, RelationalProps, ScalarProps};
pub use ordering::{Ordering, OrderingColumn};
pub use physical::{PhysicalProps, PhysicalPropsId, Projection};
