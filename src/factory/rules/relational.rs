use crate::error::OptimizerError;
use crate::factory::rules::{find_subquery, replace_subexpr, NormalizationRule, RuleResult};
use crate::factory::Factory;
use crate::memo::expr::{binary_expr, join_expr, GroupId, MemoExpr};
use crate::memo::Memo;
use crate::meta::ColumnId;
use crate::operators::{JoinKind, Operator};
use crate::properties::colset::ColSet;
use crate::properties::logical::merge_equivalence;

const FILTERED: &[Operator] = &[
    Operator::Select,
    Operator::InnerJoin,
    Operator::LeftJoin,
    Operator::RightJoin,
    Operator::FullJoin,
    Operator::SemiJoin,
    Operator::AntiJoin,
    Operator::InnerJoinApply,
    Operator::LeftJoinApply,
    Operator::RightJoinApply,
    Operator::FullJoinApply,
    Operator::SemiJoinApply,
    Operator::AntiJoinApply,
];

const APPLIES: &[Operator] = &[
    Operator::InnerJoinApply,
    Operator::LeftJoinApply,
    Operator::RightJoinApply,
    Operator::FullJoinApply,
    Operator::SemiJoinApply,
    Operator::AntiJoinApply,
];

fn unexpected(expr: &MemoExpr) -> OptimizerError {
    OptimizerError::internal(format!("Unexpected expression: {:?}", expr))
}

/// Returns the filter of a select or a join.
fn filter_of(expr: &MemoExpr) -> Option<GroupId> {
    match (expr.as_select(), expr.as_join()) {
        (Some(select), _) => Some(select.filter),
        (_, Some(join)) => Some(join.filter),
        _ => None,
    }
}

/// Returns a copy of a select or a join with the given filter.
fn with_filter(expr: &MemoExpr, filter: GroupId) -> Result<MemoExpr, OptimizerError> {
    match (expr.as_select(), expr.as_join()) {
        (Some(select), _) => Ok(binary_expr(Operator::Select, select.input, filter)),
        (_, Some(join)) => Ok(join_expr(join.op, join.left, join.right, filter)),
        _ => Err(unexpected(expr)),
    }
}

/// Conjuncts of both filters.
fn combine_conjuncts(memo: &Memo, a: GroupId, b: GroupId) -> Vec<GroupId> {
    let mut items = memo.conjuncts(a);
    items.extend(memo.conjuncts(b));
    items
}

/// Converts the filter of a select or a join into a [list of conjuncts](Operator::Filters).
#[derive(Debug)]
pub struct WrapFilter;

impl NormalizationRule for WrapFilter {
    fn name(&self) -> &'static str {
        "WrapFilter"
    }

    fn operators(&self) -> &'static [Operator] {
        FILTERED
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        match filter_of(expr) {
            Some(filter) => memo.normal_expr(filter).op() != Operator::Filters,
            None => false,
        }
    }

    fn apply(&self, factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError> {
        let filter = filter_of(expr).ok_or_else(|| unexpected(expr))?;
        let items = factory.memo().conjuncts(filter);
        let filter = factory.construct_filters(&items)?;
        Ok(Some(RuleResult::Substitute(with_filter(expr, filter)?)))
    }
}

/// `Select(input, [])` => `input`.
#[derive(Debug)]
pub struct EliminateEmptySelect;

impl NormalizationRule for EliminateEmptySelect {
    fn name(&self) -> &'static str {
        "EliminateEmptySelect"
    }

    fn operators(&self) -> &'static [Operator] {
        &[Operator::Select]
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        match expr.as_select() {
            Some(select) => {
                let filter = memo.normal_expr(select.filter);
                filter.op() == Operator::Filters && filter.list_field(0).is_empty()
            }
            None => false,
        }
    }

    fn apply(&self, _factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError> {
        Ok(expr.as_select().map(|s| RuleResult::Group(s.input)))
    }
}

/// `Select(Select(input, f1), f2)` => `Select(input, f1 AND f2)`.
#[derive(Debug)]
pub struct MergeSelects;

impl NormalizationRule for MergeSelects {
    fn name(&self) -> &'static str {
        "MergeSelects"
    }

    fn operators(&self) -> &'static [Operator] {
        &[Operator::Select]
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        match expr.as_select() {
            Some(select) => memo.normal_expr(select.input).op() == Operator::Select,
            None => false,
        }
    }

    fn apply(&self, factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError> {
        let select = expr.as_select().ok_or_else(|| unexpected(expr))?;
        let inner = factory.memo().normal_expr(select.input).as_select().ok_or_else(|| unexpected(expr))?;
        let items = combine_conjuncts(factory.memo(), inner.filter, select.filter);
        let filter = factory.construct_filters(&items)?;
        Ok(Some(RuleResult::Substitute(binary_expr(Operator::Select, inner.input, filter))))
    }
}

/// Lifts subqueries out of filters and projections:
///  * `Select(input, EXISTS(q))` => `SemiJoinApply(input, q, [])`
///  * `Select(input, NOT EXISTS(q))` => `AntiJoinApply(input, q, [])`
///  * `Select(input, f(Subquery(q, p)))` => `Project(Select(LeftJoinApply(input, Project(q, p as c), []), f(c)), input columns)`
///  * `Project(input, [.., f(Subquery(q, p)), ..])` => `Project(LeftJoinApply(input, Project(q, p as c), []), [.., f(c), ..])`
#[derive(Debug)]
pub struct HoistSubquery;

impl HoistSubquery {
    /// Returns `(q, anti)` if the given conjunct is `EXISTS(q)` or `NOT EXISTS(q)`.
    fn as_exists(memo: &Memo, conjunct: GroupId) -> Option<(GroupId, bool)> {
        let expr = memo.normal_expr(conjunct);
        match expr.op() {
            Operator::Exists => expr.as_unary().map(|q| (q, false)),
            Operator::Not => {
                let input = memo.normal_expr(expr.as_unary()?);
                match input.op() {
                    Operator::Exists => input.as_unary().map(|q| (q, true)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn hoistable(memo: &Memo, conjunct: GroupId) -> bool {
        HoistSubquery::as_exists(memo, conjunct).is_some() || find_subquery(memo, conjunct).is_some()
    }

    /// Joins the result of a scalar subquery to `input` and returns the join and the column of the result.
    fn join_subquery(
        factory: &mut Factory,
        input: GroupId,
        subquery: GroupId,
    ) -> Result<(GroupId, ColumnId), OptimizerError> {
        let memo = factory.memo();
        let (query, projection) = memo
            .normal_expr(subquery)
            .as_binary()
            .ok_or_else(|| OptimizerError::internal(format!("Unexpected subquery: {}", subquery)))?;
        let data_type = memo.infer_type(subquery);
        let column = factory.memo_mut().metadata_mut().add_column("subquery", data_type);
        let projections = factory.construct_projections(&[projection], vec![column])?;
        let right = factory.construct_project(query, projections)?;
        let filter = factory.construct_filters(&[])?;
        let apply = factory.construct_left_join_apply(input, right, filter)?;
        Ok((apply, column))
    }

    fn hoist_from_select(
        &self,
        factory: &mut Factory,
        input: GroupId,
        filter: GroupId,
    ) -> Result<Option<RuleResult>, OptimizerError> {
        let memo = factory.memo();
        let mut conjuncts = memo.conjuncts(filter);
        let position = match conjuncts.iter().position(|c| HoistSubquery::hoistable(memo, *c)) {
            Some(position) => position,
            None => return Ok(None),
        };
        let conjunct = conjuncts.remove(position);

        if let Some((query, anti)) = HoistSubquery::as_exists(memo, conjunct) {
            let empty = factory.construct_filters(&[])?;
            let op = if anti {
                Operator::AntiJoinApply
            } else {
                Operator::SemiJoinApply
            };
            let apply = factory.construct_join(op, input, query, empty)?;
            if conjuncts.is_empty() {
                return Ok(Some(RuleResult::Group(apply)));
            }
            let filter = factory.construct_filters(&conjuncts)?;
            return Ok(Some(RuleResult::Substitute(binary_expr(Operator::Select, apply, filter))));
        }

        let subquery = match find_subquery(memo, conjunct) {
            Some(subquery) => subquery,
            None => return Ok(None),
        };
        let output_cols: Vec<ColumnId> = memo.props(input).output_cols().iter().collect();
        let (apply, column) = HoistSubquery::join_subquery(factory, input, subquery)?;
        let variable = factory.construct_variable(column)?;
        let conjunct = replace_subexpr(factory, conjunct, subquery, variable)?;
        conjuncts.push(conjunct);
        let filter = factory.construct_filters(&conjuncts)?;
        let select = factory.construct_select(apply, filter)?;

        // the result of the subquery is not a part of the output.
        let mut items = Vec::with_capacity(output_cols.len());
        for col in output_cols.iter() {
            items.push(factory.construct_variable(*col)?);
        }
        let projections = factory.construct_projections(&items, output_cols)?;
        Ok(Some(RuleResult::Substitute(binary_expr(Operator::Project, select, projections))))
    }

    fn hoist_from_project(
        &self,
        factory: &mut Factory,
        input: GroupId,
        projections: GroupId,
    ) -> Result<Option<RuleResult>, OptimizerError> {
        let memo = factory.memo();
        let projections_expr = memo.normal_expr(projections);
        let mut items = memo.list(projections_expr.list_field(0)).to_vec();
        let columns = memo.projection_columns(projections).to_vec();

        let mut input = input;
        let mut changed = false;
        for item in items.iter_mut() {
            while let Some(subquery) = find_subquery(factory.memo(), *item) {
                let (apply, column) = HoistSubquery::join_subquery(factory, input, subquery)?;
                let variable = factory.construct_variable(column)?;
                *item = replace_subexpr(factory, *item, subquery, variable)?;
                input = apply;
                changed = true;
            }
        }
        if !changed {
            return Ok(None);
        }
        let projections = factory.construct_projections(&items, columns)?;
        Ok(Some(RuleResult::Substitute(binary_expr(Operator::Project, input, projections))))
    }
}

impl NormalizationRule for HoistSubquery {
    fn name(&self) -> &'static str {
        "HoistSubquery"
    }

    fn operators(&self) -> &'static [Operator] {
        &[Operator::Select, Operator::Project]
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        if let Some(select) = expr.as_select() {
            memo.props(select.filter).has_subquery()
                && memo.conjuncts(select.filter).into_iter().any(|c| HoistSubquery::hoistable(memo, c))
        } else if let Some(project) = expr.as_project() {
            memo.props(project.projections).has_subquery()
                && memo
                    .list(memo.normal_expr(project.projections).list_field(0))
                    .iter()
                    .any(|item| find_subquery(memo, *item).is_some())
        } else {
            false
        }
    }

    fn apply(&self, factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError> {
        if let Some(select) = expr.as_select() {
            self.hoist_from_select(factory, select.input, select.filter)
        } else if let Some(project) = expr.as_project() {
            self.hoist_from_project(factory, project.input, project.projections)
        } else {
            Ok(None)
        }
    }
}

/// `Select(InnerJoin(l, r, f1), f2)` => `InnerJoin(l, r, f1 AND f2)`.
#[derive(Debug)]
pub struct MergeSelectIntoInnerJoin;

impl NormalizationRule for MergeSelectIntoInnerJoin {
    fn name(&self) -> &'static str {
        "MergeSelectIntoInnerJoin"
    }

    fn operators(&self) -> &'static [Operator] {
        &[Operator::Select]
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        match expr.as_select() {
            Some(select) => {
                memo.normal_expr(select.input).op() == Operator::InnerJoin && !memo.props(select.filter).has_subquery()
            }
            None => false,
        }
    }

    fn apply(&self, factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError> {
        let select = expr.as_select().ok_or_else(|| unexpected(expr))?;
        let join = factory.memo().normal_expr(select.input).as_join().ok_or_else(|| unexpected(expr))?;
        let items = combine_conjuncts(factory.memo(), join.filter, select.filter);
        let filter = factory.construct_filters(&items)?;
        Ok(Some(RuleResult::Substitute(join_expr(Operator::InnerJoin, join.left, join.right, filter))))
    }
}

/// Replaces an apply whose right input does not reference columns of the left input with a join.
#[derive(Debug)]
pub struct EliminateApply;

impl NormalizationRule for EliminateApply {
    fn name(&self) -> &'static str {
        "EliminateApply"
    }

    fn operators(&self) -> &'static [Operator] {
        APPLIES
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        match expr.as_join() {
            Some(apply) => !memo
                .props(apply.right)
                .unbound_cols()
                .intersects(memo.props(apply.left).output_cols()),
            None => false,
        }
    }

    fn apply(&self, _factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError> {
        let apply = expr.as_join().ok_or_else(|| unexpected(expr))?;
        Ok(apply.op.apply_to_join().map(|op| RuleResult::Substitute(apply.to_expr(op))))
    }
}

/// Moves a correlated filter of the right input of an apply into the apply:
/// `Apply(l, Select(r, f1), f2)` => `Apply(l, r, f1 AND f2)`.
#[derive(Debug)]
pub struct DecorrelateApply;

impl NormalizationRule for DecorrelateApply {
    fn name(&self) -> &'static str {
        "DecorrelateApply"
    }

    fn operators(&self) -> &'static [Operator] {
        &[
            Operator::InnerJoinApply,
            Operator::LeftJoinApply,
            Operator::SemiJoinApply,
            Operator::AntiJoinApply,
        ]
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        let apply = match expr.as_join() {
            Some(apply) => apply,
            None => return false,
        };
        match memo.normal_expr(apply.right).as_select() {
            Some(select) => memo
                .props(select.filter)
                .unbound_cols()
                .intersects(memo.props(apply.left).output_cols()),
            None => false,
        }
    }

    fn apply(&self, factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError> {
        let apply = expr.as_join().ok_or_else(|| unexpected(expr))?;
        let select = factory.memo().normal_expr(apply.right).as_select().ok_or_else(|| unexpected(expr))?;
        let items = combine_conjuncts(factory.memo(), apply.filter, select.filter);
        let filter = factory.construct_filters(&items)?;
        Ok(Some(RuleResult::Substitute(join_expr(apply.op, apply.left, select.input, filter))))
    }
}

/// Derives new conjuncts from equivalences: `x = y AND x > 5` => `x = y AND x > 5 AND y > 5`.
/// Every (conjunct, equivalent column) pair produces at most one new conjunct.
#[derive(Debug)]
pub struct InferFilters;

impl InferFilters {
    /// Returns the conjuncts, the equivalence classes and the columns available to the filter.
    fn context(memo: &Memo, expr: &MemoExpr) -> Option<(Vec<GroupId>, Vec<ColSet>, ColSet)> {
        let (filter, mut classes, cols) = if let Some(select) = expr.as_select() {
            let input = memo.props(select.input).relational()?;
            (select.filter, input.equiv_cols.clone(), input.output_cols.clone())
        } else if let Some(join) = expr.as_join() {
            let left = memo.props(join.left).relational()?;
            let right = memo.props(join.right).relational()?;
            let mut classes = left.equiv_cols.clone();
            for class in right.equiv_cols.iter() {
                merge_equivalence(&mut classes, class.clone());
            }
            (join.filter, classes, left.output_cols.union(&right.output_cols))
        } else {
            return None;
        };
        let conjuncts = memo.conjuncts(filter);
        for conjunct in conjuncts.iter() {
            if let Some((a, b)) = memo.as_column_equality(*conjunct) {
                if cols.contains(a) && cols.contains(b) {
                    merge_equivalence(&mut classes, [a, b].iter().collect());
                }
            }
        }
        Some((conjuncts, classes, cols))
    }

    /// Returns `(op, column, constant)` of a `column op constant` conjunct.
    fn as_column_comparison(memo: &Memo, conjunct: GroupId) -> Option<(Operator, ColumnId, GroupId)> {
        let expr = memo.normal_expr(conjunct);
        if !expr.op().is_comparison() {
            return None;
        }
        let (left, right) = expr.as_binary()?;
        let column = memo.as_column(left)?;
        match memo.as_const(right) {
            Some(value) if !value.is_null() => Some((expr.op(), column, right)),
            _ => None,
        }
    }

    /// Candidate conjuncts `(op, column, constant)` that are not present in the filter yet.
    fn candidates(memo: &Memo, conjuncts: &[GroupId], classes: &[ColSet], cols: &ColSet) -> Vec<(Operator, ColumnId, GroupId)> {
        let existing: Vec<_> =
            conjuncts.iter().filter_map(|c| InferFilters::as_column_comparison(memo, *c)).collect();
        let mut result = Vec::new();
        for (op, column, constant) in existing.iter().copied() {
            if let Some(class) = classes.iter().find(|c| c.contains(column)) {
                for other in class.iter().filter(|c| *c != column && cols.contains(*c)) {
                    let candidate = (op, other, constant);
                    if !existing.contains(&candidate) && !result.contains(&candidate) {
                        result.push(candidate);
                    }
                }
            }
        }
        result
    }
}

impl NormalizationRule for InferFilters {
    fn name(&self) -> &'static str {
        "InferFilters"
    }

    fn operators(&self) -> &'static [Operator] {
        &[Operator::Select, Operator::InnerJoin]
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        match InferFilters::context(memo, expr) {
            Some((conjuncts, classes, cols)) => {
                !classes.is_empty() && !InferFilters::candidates(memo, &conjuncts, &classes, &cols).is_empty()
            }
            None => false,
        }
    }

    fn apply(&self, factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError> {
        let (mut conjuncts, classes, cols) = match InferFilters::context(factory.memo(), expr) {
            Some(context) => context,
            None => return Ok(None),
        };
        let candidates = InferFilters::candidates(factory.memo(), &conjuncts, &classes, &cols);
        let mut changed = false;
        for (op, column, constant) in candidates {
            let variable = factory.construct_variable(column)?;
            let conjunct = factory.construct_binary(op, variable, constant)?;
            if !conjuncts.contains(&conjunct) {
                conjuncts.push(conjunct);
                changed = true;
            }
        }
        if !changed {
            return Ok(None);
        }
        let filter = factory.construct_filters(&conjuncts)?;
        Ok(Some(RuleResult::Substitute(with_filter(expr, filter)?)))
    }
}

/// Pushes conjuncts of a join filter that reference columns of only one input into a select over that input.
/// Conjuncts are pushed into the right input of inner, left, semi and anti joins and into the left input
/// of inner and semi joins. Conjuncts that can fail stay in the join.
#[derive(Debug)]
pub struct PushDownJoinFilter;

impl PushDownJoinFilter {
    /// Splits conjuncts into (left, right, remaining) parts.
    fn split(memo: &Memo, expr: &MemoExpr) -> Option<(Vec<GroupId>, Vec<GroupId>, Vec<GroupId>)> {
        let join = expr.as_join()?;
        let kind = join.op.join_kind()?;
        let left_cols = memo.props(join.left).output_cols();
        let right_cols = memo.props(join.right).output_cols();
        let mut left = Vec::new();
        let mut right = Vec::new();
        let mut remaining = Vec::new();
        for conjunct in memo.conjuncts(join.filter) {
            let props = memo.props(conjunct);
            let cols = props.unbound_cols();
            if cols.is_empty() || props.can_fail() || props.has_subquery() {
                remaining.push(conjunct);
            } else if cols.is_subset(left_cols) && matches!(kind, JoinKind::Inner | JoinKind::Semi) {
                left.push(conjunct);
            } else if cols.is_subset(right_cols) && kind != JoinKind::Right && kind != JoinKind::Full {
                right.push(conjunct);
            } else {
                remaining.push(conjunct);
            }
        }
        Some((left, right, remaining))
    }
}

impl NormalizationRule for PushDownJoinFilter {
    fn name(&self) -> &'static str {
        "PushDownJoinFilter"
    }

    fn operators(&self) -> &'static [Operator] {
        &[
            Operator::InnerJoin,
            Operator::LeftJoin,
            Operator::SemiJoin,
            Operator::AntiJoin,
        ]
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        matches!(PushDownJoinFilter::split(memo, expr), Some((l, r, _)) if !l.is_empty() || !r.is_empty())
    }

    fn apply(&self, factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError> {
        let join = expr.as_join().ok_or_else(|| unexpected(expr))?;
        let (left_items, right_items, remaining) = match PushDownJoinFilter::split(factory.memo(), expr) {
            Some(split) => split,
            None => return Ok(None),
        };
        let mut left = join.left;
        if !left_items.is_empty() {
            let filter = factory.construct_filters(&left_items)?;
            left = factory.construct_select(left, filter)?;
        }
        let mut right = join.right;
        if !right_items.is_empty() {
            let filter = factory.construct_filters(&right_items)?;
            right = factory.construct_select(right, filter)?;
        }
        let filter = factory.construct_filters(&remaining)?;
        Ok(Some(RuleResult::Substitute(join_expr(join.op, left, right, filter))))
    }
}

/// Removes a project that returns the columns of its input unchanged.
#[derive(Debug)]
pub struct EliminateProject;

impl NormalizationRule for EliminateProject {
    fn name(&self) -> &'static str {
        "EliminateProject"
    }

    fn operators(&self) -> &'static [Operator] {
        &[Operator::Project]
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        let project = match expr.as_project() {
            Some(project) => project,
            None => return false,
        };
        let columns = memo.projection_columns(project.projections);
        let input_cols = memo.props(project.input).output_cols();
        let output_cols: ColSet = columns.iter().collect();
        output_cols.len() == columns.len()
            && output_cols == *input_cols
            && pass_through(memo, project.projections).is_some()
    }

    fn apply(&self, _factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError> {
        Ok(expr.as_project().map(|p| RuleResult::Group(p.input)))
    }
}

/// Returns the columns of projections that only forward columns: every item is a variable of its own column.
fn pass_through(memo: &Memo, projections: GroupId) -> Option<&[ColumnId]> {
    let expr = memo.normal_expr(projections);
    let items = memo.list(expr.as_list()?);
    let columns = memo.projection_columns(projections);
    let forwards = items.len() == columns.len()
        && items
            .iter()
            .zip(columns.iter())
            .all(|(item, col)| memo.as_column(*item) == Some(*col));
    if forwards {
        Some(columns)
    } else {
        None
    }
}

/// `Project(Project(input, p1), p2)` => `Project(input, p1')` where `p2` only forwards columns of `p1`
/// and `p1'` consists of items of `p1` that define those columns.
#[derive(Debug)]
pub struct MergeProjects;

impl NormalizationRule for MergeProjects {
    fn name(&self) -> &'static str {
        "MergeProjects"
    }

    fn operators(&self) -> &'static [Operator] {
        &[Operator::Project]
    }

    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool {
        let project = match expr.as_project() {
            Some(project) => project,
            None => return false,
        };
        let inner = match memo.normal_expr(project.input).as_project() {
            Some(inner) => inner,
            None => return false,
        };
        let inner_cols = memo.projection_columns(inner.projections);
        match pass_through(memo, project.projections) {
            Some(cols) => cols.iter().all(|c| inner_cols.contains(c)),
            None => false,
        }
    }

    fn apply(&self, factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError> {
        let project = expr.as_project().ok_or_else(|| unexpected(expr))?;
        let memo = factory.memo();
        let inner = memo.normal_expr(project.input).as_project().ok_or_else(|| unexpected(expr))?;
        let inner_expr = memo.normal_expr(inner.projections);
        let inner_items = memo.list(inner_expr.list_field(0));
        let inner_cols = memo.projection_columns(inner.projections);
        let columns = memo.projection_columns(project.projections).to_vec();

        let mut items = Vec::with_capacity(columns.len());
        for col in columns.iter() {
            match inner_cols.iter().position(|c| c == col) {
                Some(i) => items.push(inner_items[i]),
                None => return Ok(None),
            }
        }
        let projections = factory.construct_projections(&items, columns)?;
        Ok(Some(RuleResult::Substitute(binary_expr(Operator::Project, inner.input, projections))))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::TestContext;

    #[test]
    fn test_infer_filters_skips_present_conjuncts() {
        let mut ctx = TestContext::new();
        let a = ctx.scan("a");
        let x = ctx.col("a", "x");
        let y = ctx.col("a", "y");
        let eq = ctx.eq_columns(x, y);
        let x_gt = ctx.gt_const("a", "x", 5);
        let y_gt = ctx.gt_const("a", "y", 5);
        let partial = ctx.factory().construct_filters(&[eq, x_gt]).unwrap();
        let complete = ctx.factory().construct_filters(&[eq, x_gt, y_gt]).unwrap();

        let memo = ctx.memo();
        let partial = binary_expr(Operator::Select, a, partial);
        assert!(InferFilters.matches(memo, &partial));
        let context = InferFilters::context(memo, &partial).unwrap();
        let candidates = InferFilters::candidates(memo, &context.0, &context.1, &context.2);
        assert_eq!(candidates.len(), 1, "{:?}", candidates);
        assert_eq!(candidates[0].1, y);

        let complete = binary_expr(Operator::Select, a, complete);
        assert!(!InferFilters.matches(memo, &complete));
    }

    #[test]
    fn test_inferred_filter_is_constructed_once() {
        let mut ctx = TestContext::new();
        let a = ctx.scan("a");
        let x = ctx.col("a", "x");
        let y = ctx.col("a", "y");
        let eq = ctx.eq_columns(x, y);
        let x_gt = ctx.gt_const("a", "x", 5);
        let y_gt = ctx.gt_const("a", "y", 5);
        let filter = ctx.factory().construct_filters(&[eq, x_gt]).unwrap();
        let select = ctx.factory().construct_select(a, filter).unwrap();

        let memo = ctx.memo();
        let normal = memo.normal_expr(select).as_select().unwrap();
        let mut conjuncts = memo.conjuncts(normal.filter);
        conjuncts.sort();
        let mut expected = vec![eq, x_gt, y_gt];
        expected.sort();
        assert_eq!(conjuncts, expected);

        let expr = memo.normal_expr(select);
        assert!(!InferFilters.matches(memo, &expr));
        assert_eq!(ctx.factory().construct(expr).unwrap(), select);
    }
}
