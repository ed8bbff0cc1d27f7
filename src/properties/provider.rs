//! The physical properties factory: which required properties an operator can provide on its own
//! and which properties it requires from its children.

use std::fmt::Debug;

use itertools::Itertools;

use crate::memo::expr::MemoExpr;
use crate::memo::Memo;
use crate::meta::ColumnId;
use crate::operators::{JoinKind, Operator};
use crate::properties::colset::ColSet;
use crate::properties::ordering::Ordering;
use crate::properties::physical::{PhysicalProps, Projection};

/// Derives physical properties of expressions.
pub trait PhysicalPropsProvider: Debug {
    /// Returns `true` if the given expression provides the `required` properties
    /// when its children provide the properties returned by [child_required](Self::child_required).
    fn can_provide(&self, memo: &Memo, expr: &MemoExpr, required: &PhysicalProps) -> bool;

    /// Returns the properties the `i`-th child of the given expression must provide
    /// so that the expression provides the `required` properties.
    fn child_required(&self, memo: &Memo, expr: &MemoExpr, required: &PhysicalProps, i: usize) -> PhysicalProps;

    /// Returns the properties the given expression actually provides. Must be a superset of `required`.
    fn provided(&self, memo: &Memo, expr: &MemoExpr, required: &PhysicalProps) -> PhysicalProps;
}

/// The default implementation of [PhysicalPropsProvider].
#[derive(Debug, Default)]
pub struct DefaultPhysicalPropsProvider;

impl DefaultPhysicalPropsProvider {
    /// The order of rows produced by a scan: the columns of the primary key in ascending order.
    pub fn scan_ordering(memo: &Memo, expr: &MemoExpr) -> Option<Ordering> {
        let table = memo.private(expr.private_field(0)).as_table()?;
        let table = memo.metadata().table(table);
        let key = table.table().primary_key()?;
        if key.is_empty() {
            return None;
        }
        Some(Ordering::from_columns(key.iter().map(|p| table.column_at(*p)).collect()))
    }

    /// Joins pass an ordering of the left input through. Right and full joins produce NULLs in place
    /// of the columns of the left input and so do not preserve its order.
    fn join_preserves(memo: &Memo, expr: &MemoExpr, ordering_cols: &ColSet) -> bool {
        let join = match expr.as_join() {
            Some(join) => join,
            None => return false,
        };
        match join.op.join_kind() {
            Some(JoinKind::Inner | JoinKind::Left | JoinKind::Semi | JoinKind::Anti) => {
                ordering_cols.is_subset(memo.props(join.left).output_cols())
            }
            _ => false,
        }
    }

    /// Returns `true` if a project that outputs the given columns in the given order produces the projection.
    fn project_emits(output: &[ColumnId], projection: &Projection) -> bool {
        let columns = projection.columns().iter().map(|(_, c)| *c);
        if projection.ordered() {
            columns.eq(output.iter().copied())
        } else {
            columns.sorted().eq(output.iter().copied().sorted())
        }
    }

    /// The projection produced by a project: its output columns in order, labeled as in the `required` projection.
    fn project_projection(output: &[ColumnId], required: &Projection) -> Projection {
        let columns = output
            .iter()
            .filter_map(|col| required.columns().iter().find(|(_, c)| c == col).cloned())
            .collect();
        Projection::new(columns)
    }
}

impl PhysicalPropsProvider for DefaultPhysicalPropsProvider {
    fn can_provide(&self, memo: &Memo, expr: &MemoExpr, required: &PhysicalProps) -> bool {
        if required.is_empty() {
            return true;
        }
        let op = expr.op();
        if op.is_scalar() {
            return false;
        }
        let ordering_cols = required.ordering().map(|o| o.column_set()).unwrap_or_default();
        match op {
            Operator::Scan => {
                required.projection().is_none()
                    && match (required.ordering(), DefaultPhysicalPropsProvider::scan_ordering(memo, expr)) {
                        (Some(required), Some(natural)) => required.prefix_of(&natural),
                        (Some(_), None) => false,
                        (None, _) => true,
                    }
            }
            Operator::Select => match (required.projection(), expr.as_select()) {
                (Some(projection), Some(select)) => {
                    let filter_cols = memo.props(select.filter).unbound_cols();
                    let input_cols = memo.props(select.input).output_cols();
                    filter_cols.intersection(input_cols).is_subset(&projection.column_set())
                }
                (None, _) => true,
                (Some(_), None) => false,
            },
            Operator::Project => {
                let project = match expr.as_project() {
                    Some(project) => project,
                    None => return false,
                };
                let output = memo.projection_columns(project.projections);
                let projection_ok = match required.projection() {
                    Some(projection) => DefaultPhysicalPropsProvider::project_emits(output, projection),
                    None => true,
                };
                projection_ok && ordering_cols.is_subset(memo.props(project.input).output_cols())
            }
            _ if op.is_join() => {
                required.projection().is_none() && DefaultPhysicalPropsProvider::join_preserves(memo, expr, &ordering_cols)
            }
            _ => false,
        }
    }

    fn child_required(&self, _memo: &Memo, expr: &MemoExpr, required: &PhysicalProps, i: usize) -> PhysicalProps {
        match (expr.op(), i) {
            (Operator::Select, 0) => required.clone(),
            (Operator::Project, 0) => required.without_projection(),
            (op, 0) if op.is_join() => required.without_projection(),
            (Operator::Sort, 0) => required.without_ordering(),
            (Operator::Arrange, 0) => required.without_projection(),
            _ => PhysicalProps::none(),
        }
    }

    fn provided(&self, memo: &Memo, expr: &MemoExpr, required: &PhysicalProps) -> PhysicalProps {
        match expr.op() {
            Operator::Scan => match DefaultPhysicalPropsProvider::scan_ordering(memo, expr) {
                Some(ordering) => PhysicalProps::with_ordering(ordering),
                None => required.clone(),
            },
            Operator::Project => match (required.projection(), expr.as_project()) {
                (Some(projection), Some(project)) => {
                    let output = memo.projection_columns(project.projections);
                    let projection = DefaultPhysicalPropsProvider::project_projection(output, projection);
                    required.set_projection(Some(projection))
                }
                _ => required.clone(),
            },
            _ => required.clone(),
        }
    }
}
