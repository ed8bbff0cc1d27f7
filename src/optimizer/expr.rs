use std::fmt::Write;

use itertools::Itertools;

use crate::cost::Cost;
use crate::error::OptimizerError;
use crate::memo::expr::{ExprOffset, GroupId, MemoExpr};
use crate::memo::group::BestExpr;
use crate::memo::Memo;
use crate::operators::Operator;
use crate::properties::physical::PhysicalPropsId;

/// A node of a plan chosen by the optimizer: the best expression of a group for a set of required properties.
/// Children are resolved lazily via [child](Self::child).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expr {
    group: GroupId,
    op: Operator,
    offset: Option<ExprOffset>,
    required: PhysicalPropsId,
}

impl Expr {
    pub(crate) fn new(group: GroupId, op: Operator, offset: Option<ExprOffset>, required: PhysicalPropsId) -> Self {
        Expr {
            group,
            op,
            offset,
            required,
        }
    }

    /// Returns the best expression of the given group for the given required properties.
    pub fn best(memo: &Memo, group: GroupId, required: PhysicalPropsId) -> Result<Expr, OptimizerError> {
        let best = memo.get_group(group)?.best_expr(required).ok_or_else(|| {
            OptimizerError::internal(format!("Group {} has no best expression for {}", group, required))
        })?;
        Ok(Expr::new(group, best.op, best.offset, required))
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn op(&self) -> Operator {
        self.op
    }

    /// The offset of the memo expression. `None` for enforcers.
    pub fn offset(&self) -> Option<ExprOffset> {
        self.offset
    }

    /// Properties this expression is required to provide.
    pub fn required(&self) -> PhysicalPropsId {
        self.required
    }

    pub fn is_enforcer(&self) -> bool {
        self.offset.is_none()
    }

    /// The memo expression of this node. `None` for enforcers.
    pub fn memo_expr(&self, memo: &Memo) -> Option<MemoExpr> {
        self.offset.map(|offset| memo.expr(offset))
    }

    fn best_expr<'m>(&self, memo: &'m Memo) -> Result<&'m BestExpr, OptimizerError> {
        memo.get_group(self.group)?.best_expr(self.required).ok_or_else(|| {
            OptimizerError::internal(format!("Group {} has no best expression for {}", self.group, self.required))
        })
    }

    pub fn cost(&self, memo: &Memo) -> Result<Cost, OptimizerError> {
        self.best_expr(memo).map(|b| b.cost)
    }

    /// Properties provided by this expression.
    pub fn provided(&self, memo: &Memo) -> Result<PhysicalPropsId, OptimizerError> {
        self.best_expr(memo).map(|b| b.provided)
    }

    /// The number of children. An enforcer has one child: the plan it enforces properties on.
    pub fn num_children(&self, memo: &Memo) -> usize {
        match self.memo_expr(memo) {
            Some(expr) => expr.child_count(),
            None => 1,
        }
    }

    /// Returns the `i`-th child of this expression.
    pub fn child(&self, memo: &Memo, i: usize) -> Result<Expr, OptimizerError> {
        let best = self.best_expr(memo)?;
        match (self.memo_expr(memo), best.inner) {
            (None, Some(inner)) if i == 0 => Expr::best(memo, self.group, inner),
            (Some(expr), _) if i < expr.child_count() => {
                let required = best.child_required.get(i).copied().ok_or_else(|| {
                    OptimizerError::internal(format!("No required properties for child {} of {:?}", i, expr))
                })?;
                Expr::best(memo, expr.child(memo, i), required)
            }
            _ => Err(OptimizerError::argument(format!("{} has no child {}", self.op, i))),
        }
    }
}

/// Formats a plan as an indented tree. Every line contains an operator, its arguments, the properties
/// it provides (when not empty) and its cost. Scalar children are written as arguments of their parents.
pub fn format_plan(memo: &Memo, expr: &Expr) -> Result<String, OptimizerError> {
    let mut buf = String::new();
    format_node(memo, expr, 0, &mut buf)?;
    Ok(buf)
}

fn format_node(memo: &Memo, expr: &Expr, depth: usize, buf: &mut String) -> Result<(), OptimizerError> {
    let _ = write!(buf, "{:indent$}{}", "", expr.op(), indent = depth * 2);
    let args = format_args(memo, expr)?;
    if !args.is_empty() {
        buf.push(' ');
        buf.push_str(&args);
    }
    let provided = memo.get_physical_props(expr.provided(memo)?)?;
    if !provided.is_empty() && !expr.is_enforcer() {
        let _ = write!(buf, " {}", provided);
    }
    let _ = writeln!(buf, " cost={}", expr.cost(memo)?);

    for i in 0..expr.num_children(memo) {
        let child = expr.child(memo, i)?;
        if child.op().is_relational() || child.op().is_enforcer() {
            format_node(memo, &child, depth + 1, buf)?;
        }
    }
    Ok(())
}

fn format_args(memo: &Memo, expr: &Expr) -> Result<String, OptimizerError> {
    let required = memo.get_physical_props(expr.required())?;
    let memo_expr = match expr.memo_expr(memo) {
        Some(memo_expr) => memo_expr,
        None => {
            let args = match expr.op() {
                Operator::Sort => required.ordering().map(|o| format!("ord={}", o)),
                Operator::Arrange => required.projection().map(|p| format!("projection={}", p)),
                _ => None,
            };
            return Ok(args.unwrap_or_default());
        }
    };

    let args = match memo_expr.op() {
        Operator::Scan => {
            let table = memo.private(memo_expr.private_field(0)).as_table();
            match table {
                Some(table) => memo.metadata().table(table).alias().to_string(),
                None => String::new(),
            }
        }
        Operator::Values => format!(
            "cols={} rows=[{}]",
            memo.private(memo_expr.private_field(1)),
            memo.list(memo_expr.list_field(0)).iter().map(|r| memo.format_scalar(*r)).join(", ")
        ),
        Operator::Select => match memo_expr.as_select() {
            Some(select) => format!("filter={}", memo.format_scalar(select.filter)),
            None => String::new(),
        },
        Operator::Project => match memo_expr.as_project() {
            Some(project) => memo.format_scalar(project.projections),
            None => String::new(),
        },
        Operator::GroupBy => match memo_expr.as_group_by() {
            Some(group_by) => format!(
                "groupings={} aggregations={}",
                memo.format_scalar(group_by.groupings),
                memo.format_scalar(group_by.aggregations)
            ),
            None => String::new(),
        },
        op if op.is_join() => match memo_expr.as_join() {
            Some(join) => format!("filter={}", memo.format_scalar(join.filter)),
            None => String::new(),
        },
        op if op.is_set_op() => match memo_expr.as_set_op() {
            Some(set_op) => format!("map={}", memo.private(set_op.column_map)),
            None => String::new(),
        },
        _ => memo.format_scalar(expr.group()),
    };
    Ok(args)
}
