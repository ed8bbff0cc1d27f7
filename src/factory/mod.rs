//! The factory is the only way to create expressions. Before an expression is added to the memo
//! the factory applies normalization rules to it, so the memo only stores expressions in normal form.

use log::trace;

use crate::datatypes::ScalarValue;
use crate::error::OptimizerError;
use crate::memo::expr::{binary_expr, join_expr, FieldValue, GroupId, MemoExpr};
use crate::memo::Memo;
use crate::meta::{ColumnId, TableId};
use crate::operators::private::{FuncDef, Private};
use crate::operators::{FieldKind, Operator};

pub mod rules;

pub use rules::{NormalizationRule, NormalizationRules, RuleResult};

/// Constructs expressions in normal form. See the [module docs](self).
pub struct Factory<'a> {
    memo: &'a mut Memo,
    rules: &'a NormalizationRules,
}

impl<'a> Factory<'a> {
    pub fn new(memo: &'a mut Memo, rules: &'a NormalizationRules) -> Self {
        Factory { memo, rules }
    }

    pub fn memo(&self) -> &Memo {
        &*self.memo
    }

    pub fn memo_mut(&mut self) -> &mut Memo {
        &mut *self.memo
    }

    /// Constructs the given expression and returns its group.
    pub fn construct(&mut self, expr: MemoExpr) -> Result<GroupId, OptimizerError> {
        self.construct_expr(expr, None)
    }

    /// Constructs the given expression and adds it to the `target` group unless the expression
    /// (or the expression it normalizes to) already exists in another group.
    pub fn construct_in_group(&mut self, expr: MemoExpr, target: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct_expr(expr, Some(target))
    }

    fn construct_expr(&mut self, expr: MemoExpr, target: Option<GroupId>) -> Result<GroupId, OptimizerError> {
        let fingerprint = expr.fingerprint();
        if let Some(group) = self.memo.find_group(&fingerprint) {
            return Ok(group);
        }

        let rules = self.rules;
        for rule in rules.rules_for(expr.op()) {
            if !rule.matches(self.memo, &expr) {
                continue;
            }
            let group = match rule.apply(self, &expr)? {
                None => continue,
                Some(RuleResult::Group(group)) => group,
                Some(RuleResult::Substitute(substitute)) => {
                    if substitute.fingerprint() == fingerprint {
                        return Err(OptimizerError::internal(format!(
                            "Rule {} returned the same expression: {}",
                            rule.name(),
                            self.memo.format_expr(&expr)
                        )));
                    }
                    self.construct_expr(substitute, target)?
                }
            };
            trace!("Rule {} rewrote {} to group {}", rule.name(), self.memo.format_expr(&expr), group);
            self.memo.add_alt_fingerprint(fingerprint, group)?;
            return Ok(group);
        }

        self.memo.intern_expr(&expr, target)
    }

    fn construct_private(&mut self, op: Operator, value: Private) -> Result<GroupId, OptimizerError> {
        let private = self.memo.intern_private(value);
        self.construct(MemoExpr::new(op, &[FieldValue::Private(private)]))
    }

    fn construct_list_expr(&mut self, op: Operator, items: &[GroupId]) -> Result<GroupId, OptimizerError> {
        let list = self.memo.intern_list(items);
        self.construct(MemoExpr::new(op, &[FieldValue::List(list)]))
    }

    fn construct_list_private(
        &mut self,
        op: Operator,
        items: &[GroupId],
        value: Private,
    ) -> Result<GroupId, OptimizerError> {
        let list = self.memo.intern_list(items);
        let private = self.memo.intern_private(value);
        self.construct(MemoExpr::new(op, &[FieldValue::List(list), FieldValue::Private(private)]))
    }

    // scalar operators

    pub fn construct_variable(&mut self, column: ColumnId) -> Result<GroupId, OptimizerError> {
        self.construct_private(Operator::Variable, Private::Column(column))
    }

    pub fn construct_const(&mut self, value: ScalarValue) -> Result<GroupId, OptimizerError> {
        self.construct_private(Operator::Const, Private::Value(value))
    }

    pub fn construct_true(&mut self) -> Result<GroupId, OptimizerError> {
        self.construct_const(ScalarValue::Bool(true))
    }

    pub fn construct_false(&mut self) -> Result<GroupId, OptimizerError> {
        self.construct_const(ScalarValue::Bool(false))
    }

    pub fn construct_null(&mut self) -> Result<GroupId, OptimizerError> {
        self.construct_const(ScalarValue::Null)
    }

    pub fn construct_list(&mut self, items: &[GroupId]) -> Result<GroupId, OptimizerError> {
        self.construct_list_expr(Operator::List, items)
    }

    /// Constructs a conjunction of the given filters.
    pub fn construct_filters(&mut self, items: &[GroupId]) -> Result<GroupId, OptimizerError> {
        self.construct_list_expr(Operator::Filters, items)
    }

    pub fn construct_and(&mut self, left: GroupId, right: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct(binary_expr(Operator::And, left, right))
    }

    pub fn construct_or(&mut self, left: GroupId, right: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct(binary_expr(Operator::Or, left, right))
    }

    pub fn construct_not(&mut self, input: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct(MemoExpr::new(Operator::Not, &[FieldValue::Group(input)]))
    }

    /// Constructs a binary scalar expression: a comparison, an arithmetic or a logical operator.
    pub fn construct_binary(&mut self, op: Operator, left: GroupId, right: GroupId) -> Result<GroupId, OptimizerError> {
        if !op.is_scalar() || !matches!(op.layout(), [FieldKind::Group, FieldKind::Group]) {
            return Err(OptimizerError::internal(format!("{} is not a binary scalar operator", op)));
        }
        self.construct(binary_expr(op, left, right))
    }

    pub fn construct_eq(&mut self, left: GroupId, right: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct(binary_expr(Operator::Eq, left, right))
    }

    pub fn construct_ne(&mut self, left: GroupId, right: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct(binary_expr(Operator::Ne, left, right))
    }

    pub fn construct_lt(&mut self, left: GroupId, right: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct(binary_expr(Operator::Lt, left, right))
    }

    pub fn construct_le(&mut self, left: GroupId, right: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct(binary_expr(Operator::Le, left, right))
    }

    pub fn construct_gt(&mut self, left: GroupId, right: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct(binary_expr(Operator::Gt, left, right))
    }

    pub fn construct_ge(&mut self, left: GroupId, right: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct(binary_expr(Operator::Ge, left, right))
    }

    pub fn construct_plus(&mut self, left: GroupId, right: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct(binary_expr(Operator::Plus, left, right))
    }

    pub fn construct_minus(&mut self, left: GroupId, right: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct(binary_expr(Operator::Minus, left, right))
    }

    pub fn construct_mult(&mut self, left: GroupId, right: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct(binary_expr(Operator::Mult, left, right))
    }

    pub fn construct_div(&mut self, left: GroupId, right: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct(binary_expr(Operator::Div, left, right))
    }

    pub fn construct_function(&mut self, func: FuncDef, args: &[GroupId]) -> Result<GroupId, OptimizerError> {
        self.construct_list_private(Operator::Function, args, Private::Function(func))
    }

    /// Constructs a scalar subquery: the value of `projection` computed over the single row of `input`.
    pub fn construct_subquery(&mut self, input: GroupId, projection: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct(binary_expr(Operator::Subquery, input, projection))
    }

    pub fn construct_exists(&mut self, input: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct(MemoExpr::new(Operator::Exists, &[FieldValue::Group(input)]))
    }

    /// Constructs a list of projections. The `i`-th item defines the `i`-th column.
    pub fn construct_projections(
        &mut self,
        items: &[GroupId],
        columns: Vec<ColumnId>,
    ) -> Result<GroupId, OptimizerError> {
        check_projections(items, &columns)?;
        self.construct_list_private(Operator::Projections, items, Private::Columns(columns))
    }

    /// Constructs a list of aggregate functions. The `i`-th item defines the `i`-th column.
    pub fn construct_aggregations(
        &mut self,
        items: &[GroupId],
        columns: Vec<ColumnId>,
    ) -> Result<GroupId, OptimizerError> {
        check_projections(items, &columns)?;
        self.construct_list_private(Operator::Aggregations, items, Private::Columns(columns))
    }

    // relational operators

    pub fn construct_scan(&mut self, table: TableId) -> Result<GroupId, OptimizerError> {
        self.construct_private(Operator::Scan, Private::Table(table))
    }

    /// Constructs a set of literal rows. Each row is a [list](Operator::List) of scalar expressions.
    pub fn construct_values(&mut self, rows: &[GroupId], columns: Vec<ColumnId>) -> Result<GroupId, OptimizerError> {
        for row in rows {
            let row_expr = self.memo.normal_expr(*row);
            let arity = row_expr.as_list().filter(|_| row_expr.op() == Operator::List).map(|l| l.len());
            if arity != Some(columns.len()) {
                return Err(OptimizerError::argument(format!(
                    "Values: row {} does not match the number of columns {}",
                    row,
                    columns.len()
                )));
            }
        }
        self.construct_list_private(Operator::Values, rows, Private::Columns(columns))
    }

    pub fn construct_select(&mut self, input: GroupId, filter: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct(binary_expr(Operator::Select, input, filter))
    }

    pub fn construct_project(&mut self, input: GroupId, projections: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct(binary_expr(Operator::Project, input, projections))
    }

    /// Constructs a group by. `groupings` is a list of [projections](Operator::Projections) of grouping columns,
    /// `aggregations` is a list of [aggregations](Operator::Aggregations).
    pub fn construct_group_by(
        &mut self,
        input: GroupId,
        groupings: GroupId,
        aggregations: GroupId,
    ) -> Result<GroupId, OptimizerError> {
        self.construct(MemoExpr::new(
            Operator::GroupBy,
            &[
                FieldValue::Group(input),
                FieldValue::Group(groupings),
                FieldValue::Group(aggregations),
            ],
        ))
    }

    /// Constructs a set operation. `column_map` pairs output columns of the left input with columns of the right input.
    pub fn construct_set_op(
        &mut self,
        op: Operator,
        left: GroupId,
        right: GroupId,
        column_map: Vec<(ColumnId, ColumnId)>,
    ) -> Result<GroupId, OptimizerError> {
        if !op.is_set_op() {
            return Err(OptimizerError::internal(format!("{} is not a set operator", op)));
        }
        let left_cols = self.memo.props(left).output_cols();
        let right_cols = self.memo.props(right).output_cols();
        if column_map.len() != left_cols.len() || column_map.len() != right_cols.len() {
            return Err(OptimizerError::argument(format!(
                "{}: column map has {} columns but inputs have {} and {} columns",
                op,
                column_map.len(),
                left_cols.len(),
                right_cols.len()
            )));
        }
        if let Some((l, r)) = column_map.iter().find(|(l, r)| !left_cols.contains(*l) || !right_cols.contains(*r)) {
            return Err(OptimizerError::argument(format!("{}: unexpected column pair {}:{}", op, l, r)));
        }
        let private = self.memo.intern_private(Private::ColumnMap(column_map));
        self.construct(MemoExpr::new(
            op,
            &[
                FieldValue::Group(left),
                FieldValue::Group(right),
                FieldValue::Private(private),
            ],
        ))
    }

    pub fn construct_union(
        &mut self,
        left: GroupId,
        right: GroupId,
        column_map: Vec<(ColumnId, ColumnId)>,
    ) -> Result<GroupId, OptimizerError> {
        self.construct_set_op(Operator::Union, left, right, column_map)
    }

    pub fn construct_intersect(
        &mut self,
        left: GroupId,
        right: GroupId,
        column_map: Vec<(ColumnId, ColumnId)>,
    ) -> Result<GroupId, OptimizerError> {
        self.construct_set_op(Operator::Intersect, left, right, column_map)
    }

    pub fn construct_except(
        &mut self,
        left: GroupId,
        right: GroupId,
        column_map: Vec<(ColumnId, ColumnId)>,
    ) -> Result<GroupId, OptimizerError> {
        self.construct_set_op(Operator::Except, left, right, column_map)
    }

    /// Constructs a join or an apply.
    pub fn construct_join(
        &mut self,
        op: Operator,
        left: GroupId,
        right: GroupId,
        filter: GroupId,
    ) -> Result<GroupId, OptimizerError> {
        if !op.is_join() {
            return Err(OptimizerError::internal(format!("{} is not a join operator", op)));
        }
        self.construct(join_expr(op, left, right, filter))
    }

    pub fn construct_inner_join(&mut self, left: GroupId, right: GroupId, filter: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct_join(Operator::InnerJoin, left, right, filter)
    }

    pub fn construct_left_join(&mut self, left: GroupId, right: GroupId, filter: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct_join(Operator::LeftJoin, left, right, filter)
    }

    pub fn construct_right_join(&mut self, left: GroupId, right: GroupId, filter: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct_join(Operator::RightJoin, left, right, filter)
    }

    pub fn construct_full_join(&mut self, left: GroupId, right: GroupId, filter: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct_join(Operator::FullJoin, left, right, filter)
    }

    pub fn construct_semi_join(&mut self, left: GroupId, right: GroupId, filter: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct_join(Operator::SemiJoin, left, right, filter)
    }

    pub fn construct_anti_join(&mut self, left: GroupId, right: GroupId, filter: GroupId) -> Result<GroupId, OptimizerError> {
        self.construct_join(Operator::AntiJoin, left, right, filter)
    }

    pub fn construct_inner_join_apply(
        &mut self,
        left: GroupId,
        right: GroupId,
        filter: GroupId,
    ) -> Result<GroupId, OptimizerError> {
        self.construct_join(Operator::InnerJoinApply, left, right, filter)
    }

    pub fn construct_left_join_apply(
        &mut self,
        left: GroupId,
        right: GroupId,
        filter: GroupId,
    ) -> Result<GroupId, OptimizerError> {
        self.construct_join(Operator::LeftJoinApply, left, right, filter)
    }

    pub fn construct_right_join_apply(
        &mut self,
        left: GroupId,
        right: GroupId,
        filter: GroupId,
    ) -> Result<GroupId, OptimizerError> {
        self.construct_join(Operator::RightJoinApply, left, right, filter)
    }

    pub fn construct_full_join_apply(
        &mut self,
        left: GroupId,
        right: GroupId,
        filter: GroupId,
    ) -> Result<GroupId, OptimizerError> {
        self.construct_join(Operator::FullJoinApply, left, right, filter)
    }

    pub fn construct_semi_join_apply(
        &mut self,
        left: GroupId,
        right: GroupId,
        filter: GroupId,
    ) -> Result<GroupId, OptimizerError> {
        self.construct_join(Operator::SemiJoinApply, left, right, filter)
    }

    pub fn construct_anti_join_apply(
        &mut self,
        left: GroupId,
        right: GroupId,
        filter: GroupId,
    ) -> Result<GroupId, OptimizerError> {
        self.construct_join(Operator::AntiJoinApply, left, right, filter)
    }
}

fn check_projections(items: &[GroupId], columns: &[ColumnId]) -> Result<(), OptimizerError> {
    if items.len() != columns.len() {
        return Err(OptimizerError::argument(format!(
            "Number of expressions {} does not match the number of columns {}",
            items.len(),
            columns.len()
        )));
    }
    Ok(())
}
