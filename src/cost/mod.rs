//! Cost-model.

use std::fmt::Debug;

use ordered_float::OrderedFloat;

use crate::memo::expr::MemoExpr;
use crate::memo::Memo;
use crate::operators::Operator;
use crate::properties::physical::PhysicalProps;

pub mod simple;

/// The cost of an expression. Costs are non-negative.
pub type Cost = OrderedFloat<f64>;

/// Estimates costs of expressions.
///
/// A cost of an expression must not decrease when the costs of its children increase.
pub trait Coster: Debug {
    /// Returns the cost of the given member of a group. `inputs` are the costs of the best expressions
    /// of the children of the expression under the properties required from them.
    fn cost(&self, memo: &Memo, expr: &MemoExpr, inputs: &[Cost]) -> Cost;

    /// Returns the cost of an [enforcer](Operator::is_enforcer) that provides `required` properties
    /// on top of an input with the given cost.
    fn enforcer_cost(&self, memo: &Memo, op: Operator, required: &PhysicalProps, input: Cost) -> Cost;
}
