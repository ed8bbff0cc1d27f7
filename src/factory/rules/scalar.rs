use std::cmp::Ordering;

use crate::datatypes::ScalarValue;
use crate::error::OptimizerError;
use crate::factory::rules::{NormalizationRule, RuleResult};
use crate::factory::Factory;
use crate::memo::expr::{binary_expr, FieldValue, GroupId, MemoExpr};
use crate::memo::Memo;
use crate::operators::Operator;

const COMPARISONS: &[Operator] = &[
    Operator::Eq,
    Operator::Ne,
    Operator::Lt,
    Operator::Le,
    Operator::Gt,
    Operator::Ge,
];

fn operands(expr: &MemoExpr) -> Result<(GroupId, GroupId), OptimizerError> {
    expr.as_binary()
        .ok_or_else(|| OptimizerError::internal(format!("Expected a binary expression: {:?}", expr)))
}

/// Orders operands of commutative operators by group id: `op(b, a) => op(a, b)` if `a < b`.
/// Equalities between a variable and a non-variable are left to [VariableFirst].
#[derive(Debug)]
pub struct CommuteOperands;

impl NormalizationRule for CommuteOperands {
    fn name(&self) -> &'static str {
        "CommuteOperands"
    }

    fn operators(&self) -> &'static [Operator] {
        &[
            Operator::Eq,
            Operator::Ne,
            Operator::And,
            Operator::Or,
            Operator::Plus,
            Operator::Mult,
        ]
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        match expr.as_binary() {
            Some((left, right)) if left > right => {
                if expr.op().is_comparison() {
                    memo.as_column(left).is_some() == memo.as_column(right).is_some()
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    fn apply(&self, _factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError> {
        let (left, right) = operands(expr)?;
        Ok(Some(RuleResult::Substitute(binary_expr(expr.op(), right, left))))
    }
}

/// Moves a variable to the left side of a comparison: `5 < x => x > 5`.
/// A comparison of two variables is ordered by group id.
#[derive(Debug)]
pub struct VariableFirst;

impl NormalizationRule for VariableFirst {
    fn name(&self) -> &'static str {
        "VariableFirst"
    }

    fn operators(&self) -> &'static [Operator] {
        COMPARISONS
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        match expr.as_binary() {
            Some((left, right)) => {
                let left_var = memo.as_column(left).is_some();
                let right_var = memo.as_column(right).is_some();
                (!left_var && right_var)
                    || (left_var && right_var && left > right && !matches!(expr.op(), Operator::Eq | Operator::Ne))
            }
            None => false,
        }
    }

    fn apply(&self, _factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError> {
        let (left, right) = operands(expr)?;
        match expr.op().commute_comparison() {
            Some(op) => Ok(Some(RuleResult::Substitute(binary_expr(op, right, left)))),
            None => Ok(None),
        }
    }
}

/// Evaluates a comparison of two constants. A comparison with `NULL` is `NULL`.
#[derive(Debug)]
pub struct FoldComparison;

impl NormalizationRule for FoldComparison {
    fn name(&self) -> &'static str {
        "FoldComparison"
    }

    fn operators(&self) -> &'static [Operator] {
        COMPARISONS
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        matches!(expr.as_binary(), Some((l, r)) if memo.as_const(l).is_some() && memo.as_const(r).is_some())
    }

    fn apply(&self, factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError> {
        let (left, right) = operands(expr)?;
        let memo = factory.memo();
        let (left, right) = match (memo.as_const(left), memo.as_const(right)) {
            (Some(l), Some(r)) => (l, r),
            _ => return Ok(None),
        };
        if *left == ScalarValue::Null || *right == ScalarValue::Null {
            return factory.construct_null().map(|g| Some(RuleResult::Group(g)));
        }
        let ordering = match left.compare(right) {
            Some(ordering) => ordering,
            None => return Ok(None),
        };
        let result = match expr.op() {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Ne => ordering != Ordering::Equal,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Le => ordering != Ordering::Greater,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Ge => ordering != Ordering::Less,
            _ => return Ok(None),
        };
        factory.construct_const(ScalarValue::Bool(result)).map(|g| Some(RuleResult::Group(g)))
    }
}

/// `AND(true, x) => x`, `AND(x, x) => x`, `AND(false, x) => false` when `x` can not fail.
#[derive(Debug)]
pub struct FoldAnd;

impl NormalizationRule for FoldAnd {
    fn name(&self) -> &'static str {
        "FoldAnd"
    }

    fn operators(&self) -> &'static [Operator] {
        &[Operator::And]
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        matches!(expr.as_binary(), Some((l, r)) if l == r || memo.as_bool_const(l).is_some() || memo.as_bool_const(r).is_some())
    }

    fn apply(&self, factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError> {
        let (left, right) = operands(expr)?;
        Ok(fold_logical(factory.memo(), left, right, true).map(RuleResult::Group))
    }
}

/// `OR(false, x) => x`, `OR(x, x) => x`, `OR(true, x) => true` when `x` can not fail.
#[derive(Debug)]
pub struct FoldOr;

impl NormalizationRule for FoldOr {
    fn name(&self) -> &'static str {
        "FoldOr"
    }

    fn operators(&self) -> &'static [Operator] {
        &[Operator::Or]
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        matches!(expr.as_binary(), Some((l, r)) if l == r || memo.as_bool_const(l).is_some() || memo.as_bool_const(r).is_some())
    }

    fn apply(&self, factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError> {
        let (left, right) = operands(expr)?;
        Ok(fold_logical(factory.memo(), left, right, false).map(RuleResult::Group))
    }
}

/// `identity` is `true` for AND and `false` for OR.
fn fold_logical(memo: &Memo, left: GroupId, right: GroupId, identity: bool) -> Option<GroupId> {
    if left == right {
        return Some(left);
    }
    for (operand, other) in [(left, right), (right, left)] {
        match memo.as_bool_const(operand) {
            Some(value) if value == identity => return Some(other),
            // the other operand must be evaluated when it can raise an error.
            Some(_) if !memo.props(other).can_fail() => return Some(operand),
            _ => {}
        }
    }
    None
}

/// `NOT(NOT(x)) => x`, `NOT(a < b) => a >= b`, `NOT(const) => !const`.
#[derive(Debug)]
pub struct FoldNot;

impl NormalizationRule for FoldNot {
    fn name(&self) -> &'static str {
        "FoldNot"
    }

    fn operators(&self) -> &'static [Operator] {
        &[Operator::Not]
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        match expr.as_unary() {
            Some(input) => {
                let input_expr = memo.normal_expr(input);
                match input_expr.op() {
                    Operator::Not => true,
                    Operator::Const => matches!(memo.as_const(input), Some(ScalarValue::Bool(_)) | Some(ScalarValue::Null)),
                    op => op.is_comparison(),
                }
            }
            None => false,
        }
    }

    fn apply(&self, factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError> {
        let input = match expr.as_unary() {
            Some(input) => input,
            None => return Ok(None),
        };
        let memo = factory.memo();
        let input_expr = memo.normal_expr(input);
        match input_expr.op() {
            Operator::Not => Ok(input_expr.as_unary().map(RuleResult::Group)),
            Operator::Const => match memo.as_const(input) {
                Some(ScalarValue::Bool(value)) => {
                    let value = !*value;
                    factory.construct_const(ScalarValue::Bool(value)).map(|g| Some(RuleResult::Group(g)))
                }
                Some(ScalarValue::Null) => Ok(Some(RuleResult::Group(input))),
                _ => Ok(None),
            },
            op => match (op.negate_comparison(), input_expr.as_binary()) {
                (Some(negated), Some((l, r))) => Ok(Some(RuleResult::Substitute(binary_expr(negated, l, r)))),
                _ => Ok(None),
            },
        }
    }
}

/// Evaluates `+`, `-` and `*` of two constants. Overflows are left to be reported at runtime.
#[derive(Debug)]
pub struct FoldArithmetic;

impl NormalizationRule for FoldArithmetic {
    fn name(&self) -> &'static str {
        "FoldArithmetic"
    }

    fn operators(&self) -> &'static [Operator] {
        &[Operator::Plus, Operator::Minus, Operator::Mult]
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        matches!(expr.as_binary(), Some((l, r)) if memo.as_const(l).is_some() && memo.as_const(r).is_some())
    }

    fn apply(&self, factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError> {
        let (left, right) = operands(expr)?;
        let memo = factory.memo();
        let (left, right) = match (memo.as_const(left), memo.as_const(right)) {
            (Some(l), Some(r)) => (l, r),
            _ => return Ok(None),
        };
        let result = if *left == ScalarValue::Null || *right == ScalarValue::Null {
            Some(ScalarValue::Null)
        } else {
            match expr.op() {
                Operator::Plus => left.checked_add(right),
                Operator::Minus => left.checked_sub(right),
                Operator::Mult => left.checked_mul(right),
                _ => None,
            }
        };
        match result {
            Some(value) => factory.construct_const(value).map(|g| Some(RuleResult::Group(g))),
            None => Ok(None),
        }
    }
}

/// Replaces `AND(a, b)` with a flat list of conjuncts `Filters[a, b]`.
#[derive(Debug)]
pub struct FlattenAnd;

impl NormalizationRule for FlattenAnd {
    fn name(&self) -> &'static str {
        "FlattenAnd"
    }

    fn operators(&self) -> &'static [Operator] {
        &[Operator::And]
    }

    fn matches(&self, _memo: &Memo, expr: &MemoExpr) -> bool {
        expr.as_binary().is_some()
    }

    fn apply(&self, factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError> {
        let (left, right) = operands(expr)?;
        let memo = factory.memo();
        let mut items = memo.conjuncts(left);
        items.extend(memo.conjuncts(right));
        factory.construct_filters(&items).map(|g| Some(RuleResult::Group(g)))
    }
}

/// Normalizes a list of conjuncts: nested lists are flattened, `true` items are removed,
/// items are sorted by group id and deduplicated. A list with a `false` item becomes `[false]`
/// when none of its items can fail.
#[derive(Debug)]
pub struct NormalizeFilters;

impl NormalizeFilters {
    fn normalize(memo: &Memo, items: &[GroupId]) -> Vec<GroupId> {
        let mut result = Vec::with_capacity(items.len());
        for item in items {
            let expr = memo.normal_expr(*item);
            match expr.op() {
                Operator::Filters => result.extend_from_slice(memo.list(expr.list_field(0))),
                Operator::Const if memo.as_bool_const(*item) == Some(true) => {}
                _ => result.push(*item),
            }
        }
        let false_item = result.iter().copied().find(|i| memo.as_bool_const(*i) == Some(false));
        if let Some(false_item) = false_item {
            if result.iter().all(|i| !memo.props(*i).can_fail()) {
                return vec![false_item];
            }
        }
        result.sort();
        result.dedup();
        result
    }
}

impl NormalizationRule for NormalizeFilters {
    fn name(&self) -> &'static str {
        "NormalizeFilters"
    }

    fn operators(&self) -> &'static [Operator] {
        &[Operator::Filters]
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        let items = memo.list(expr.list_field(0));
        NormalizeFilters::normalize(memo, items) != items
    }

    fn apply(&self, factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError> {
        let memo = factory.memo();
        let items = NormalizeFilters::normalize(memo, memo.list(expr.list_field(0)));
        let list = factory.memo_mut().intern_list(&items);
        Ok(Some(RuleResult::Substitute(MemoExpr::new(Operator::Filters, &[FieldValue::List(list)]))))
    }
}
