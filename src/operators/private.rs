//! Private values of expressions. Privates are opaque to the memo: it only interns them
//! and hands out their identifiers.

use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::datatypes::{DataType, ScalarValue};
use crate::meta::{ColumnId, TableId};

/// A private value of an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Private {
    /// A column referenced by a [variable](crate::operators::Operator::Variable).
    Column(ColumnId),
    /// A value of a [constant](crate::operators::Operator::Const).
    Value(ScalarValue),
    /// A table reference of a [scan](crate::operators::Operator::Scan).
    Table(TableId),
    /// An ordered list of columns (projections, aggregations, values).
    Columns(Vec<ColumnId>),
    /// Pairs of (left column, right column) of a set operation.
    ColumnMap(Vec<(ColumnId, ColumnId)>),
    /// A function descriptor.
    Function(FuncDef),
}

impl Private {
    pub fn as_column(&self) -> Option<ColumnId> {
        match self {
            Private::Column(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&ScalarValue> {
        match self {
            Private::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<TableId> {
        match self {
            Private::Table(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_columns(&self) -> Option<&[ColumnId]> {
        match self {
            Private::Columns(cols) => Some(cols),
            _ => None,
        }
    }

    pub fn as_column_map(&self) -> Option<&[(ColumnId, ColumnId)]> {
        match self {
            Private::ColumnMap(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FuncDef> {
        match self {
            Private::Function(f) => Some(f),
            _ => None,
        }
    }
}

impl Display for Private {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Private::Column(c) => write!(f, "col:{}", c),
            Private::Value(v) => write!(f, "{}", v),
            Private::Table(t) => write!(f, "table:{}", t),
            Private::Columns(cols) => write!(f, "[{}]", cols.iter().join(", ")),
            Private::ColumnMap(m) => write!(f, "[{}]", m.iter().map(|(l, r)| format!("{}:{}", l, r)).join(", ")),
            Private::Function(func) => write!(f, "{}", func),
        }
    }
}

/// Function volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Volatility {
    /// The function always returns the same result for the same arguments.
    Immutable,
    /// The function returns the same result for the same arguments within a single query.
    Stable,
    /// The function may return different results for the same arguments.
    Volatile,
}

/// A function descriptor. Both scalar and aggregate functions are described by a `FuncDef`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncDef {
    name: String,
    return_type: DataType,
    aggregate: bool,
    volatility: Volatility,
    can_fail: bool,
}

impl FuncDef {
    /// Creates a descriptor of an immutable scalar function that never fails.
    pub fn scalar(name: &str, return_type: DataType) -> Self {
        FuncDef {
            name: name.to_string(),
            return_type,
            aggregate: false,
            volatility: Volatility::Immutable,
            can_fail: false,
        }
    }

    /// Creates a descriptor of an aggregate function.
    pub fn aggregate(name: &str, return_type: DataType) -> Self {
        FuncDef {
            name: name.to_string(),
            return_type,
            aggregate: true,
            volatility: Volatility::Immutable,
            can_fail: false,
        }
    }

    /// Marks this function as one that can raise an error at runtime.
    pub fn with_can_fail(mut self, can_fail: bool) -> Self {
        self.can_fail = can_fail;
        self
    }

    pub fn with_volatility(mut self, volatility: Volatility) -> Self {
        self.volatility = volatility;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn return_type(&self) -> DataType {
        self.return_type
    }

    pub fn is_aggregate(&self) -> bool {
        self.aggregate
    }

    pub fn volatility(&self) -> Volatility {
        self.volatility
    }

    /// Returns `true` if a call to this function can fail or has side effects.
    pub fn can_fail(&self) -> bool {
        self.can_fail || self.volatility == Volatility::Volatile
    }
}

impl Display for FuncDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
