//! Logical properties of groups.

use std::fmt::Debug;

use crate::datatypes::{DataType, ScalarValue};
use crate::error::OptimizerError;
use crate::memo::expr::{GroupId, MemoExpr};
use crate::memo::Memo;
use crate::meta::ColumnId;
use crate::operators::{JoinKind, Operator};
use crate::properties::colset::ColSet;

static EMPTY_COLS: ColSet = ColSet::new();

/// Logical properties of a group. Computed once when the group is created.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalProps {
    Scalar(ScalarProps),
    Relational(RelationalProps),
}

impl LogicalProps {
    pub fn scalar(&self) -> Option<&ScalarProps> {
        match self {
            LogicalProps::Scalar(props) => Some(props),
            LogicalProps::Relational(_) => None,
        }
    }

    pub fn relational(&self) -> Option<&RelationalProps> {
        match self {
            LogicalProps::Scalar(_) => None,
            LogicalProps::Relational(props) => Some(props),
        }
    }

    /// Columns referenced by the expression but not produced by any of its descendants.
    pub fn unbound_cols(&self) -> &ColSet {
        match self {
            LogicalProps::Scalar(props) => &props.unbound_cols,
            LogicalProps::Relational(props) => &props.unbound_cols,
        }
    }

    /// Output columns of a relational expression. Empty for scalar expressions.
    pub fn output_cols(&self) -> &ColSet {
        match self {
            LogicalProps::Scalar(_) => &EMPTY_COLS,
            LogicalProps::Relational(props) => &props.output_cols,
        }
    }

    /// Returns `true` if an evaluation of a scalar expression may raise an error or has side effects.
    pub fn can_fail(&self) -> bool {
        match self {
            LogicalProps::Scalar(props) => props.can_fail,
            LogicalProps::Relational(_) => false,
        }
    }

    pub fn has_subquery(&self) -> bool {
        match self {
            LogicalProps::Scalar(props) => props.has_subquery,
            LogicalProps::Relational(_) => false,
        }
    }
}

/// Logical properties of scalar expressions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScalarProps {
    pub unbound_cols: ColSet,
    pub data_type: DataType,
    pub can_fail: bool,
    pub has_subquery: bool,
}

/// A foreign key between column lists of two table references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyProps {
    pub src: Vec<ColumnId>,
    pub dest: Vec<ColumnId>,
}

/// Logical properties of relational expressions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelationalProps {
    pub output_cols: ColSet,
    pub not_null_cols: ColSet,
    /// Column sets that are unique modulo NULLs.
    pub weak_keys: Vec<ColSet>,
    pub foreign_keys: Vec<ForeignKeyProps>,
    /// Classes of columns proven equal by filters.
    pub equiv_cols: Vec<ColSet>,
    pub unbound_cols: ColSet,
}

impl RelationalProps {
    /// Returns the equivalence class of the given column (the column itself if it is not equal to any other column).
    pub fn equiv_class(&self, col: ColumnId) -> ColSet {
        self.equiv_cols
            .iter()
            .find(|c| c.contains(col))
            .cloned()
            .unwrap_or_else(|| ColSet::single(col))
    }

    /// Returns `true` if the given columns contain a weak key.
    pub fn is_key(&self, cols: &ColSet) -> bool {
        self.weak_keys.iter().any(|k| k.is_subset(cols))
    }
}

/// Builds logical properties of memo expressions.
pub trait LogicalPropsProvider: Debug {
    /// Builds logical properties of the group of the given expression.
    /// Children of the expression must already be present in the memo.
    fn build_props(&self, memo: &Memo, expr: &MemoExpr) -> Result<LogicalProps, OptimizerError>;
}

/// The default implementation of [LogicalPropsProvider].
#[derive(Debug, Default)]
pub struct LogicalPropsBuilder;

impl LogicalPropsProvider for LogicalPropsBuilder {
    fn build_props(&self, memo: &Memo, expr: &MemoExpr) -> Result<LogicalProps, OptimizerError> {
        if expr.op().is_scalar() {
            self.build_scalar(memo, expr).map(LogicalProps::Scalar)
        } else if expr.op().is_enforcer() {
            Err(OptimizerError::internal(format!("Enforcers have no logical properties: {}", expr.op())))
        } else {
            self.build_relational(memo, expr).map(LogicalProps::Relational)
        }
    }
}

impl LogicalPropsBuilder {
    fn build_scalar(&self, memo: &Memo, expr: &MemoExpr) -> Result<ScalarProps, OptimizerError> {
        let mut props = ScalarProps::default();
        match expr.op() {
            Operator::Variable => {
                let col = private_column(memo, expr)?;
                props.unbound_cols.insert(col);
                props.data_type = memo.metadata().column(col).data_type();
            }
            Operator::Const => {
                props.data_type = memo.private(expr.private_field(0)).as_value().map(|v| v.data_type()).unwrap_or_default();
            }
            Operator::Subquery => {
                let (input, projection) = binary(expr)?;
                let input = memo.props(input);
                let projection_props = memo.props(projection);
                props.unbound_cols = projection_props.unbound_cols().difference(input.output_cols());
                props.unbound_cols.union_with(input.unbound_cols());
                props.data_type = projection_props.scalar().map(|p| p.data_type).unwrap_or_default();
                // more than one row is an error
                props.can_fail = true;
                props.has_subquery = true;
            }
            Operator::Exists => {
                let input = expr.group_field(0);
                props.unbound_cols = memo.props(input).unbound_cols().clone();
                props.data_type = DataType::Bool;
                props.has_subquery = true;
            }
            op => {
                for child in expr.children(memo) {
                    let child = memo.props(child);
                    props.unbound_cols.union_with(child.unbound_cols());
                    props.can_fail |= child.can_fail();
                    props.has_subquery |= child.has_subquery();
                }
                props.data_type = match op {
                    Operator::Plus | Operator::Minus | Operator::Mult | Operator::Div => {
                        let (left, right) = binary(expr)?;
                        match memo.infer_type(left) {
                            DataType::Null => memo.infer_type(right),
                            t => t,
                        }
                    }
                    Operator::Function => {
                        let func = memo.private(expr.private_field(1)).as_function().ok_or_else(|| {
                            OptimizerError::internal(format!("Function without a descriptor: {:?}", expr))
                        })?;
                        props.can_fail |= func.can_fail();
                        func.return_type()
                    }
                    Operator::List | Operator::Projections | Operator::Aggregations => DataType::Null,
                    _ => DataType::Bool,
                };
                props.can_fail |= op == Operator::Div;
            }
        }
        Ok(props)
    }

    fn build_relational(&self, memo: &Memo, expr: &MemoExpr) -> Result<RelationalProps, OptimizerError> {
        let op = expr.op();
        match op {
            Operator::Scan => self.build_scan(memo, expr),
            Operator::Values => self.build_values(memo, expr),
            Operator::Select => {
                let select = expr.as_select().ok_or_else(|| unexpected(expr))?;
                let input = relational(memo, select.input)?;
                let mut props = input.clone();
                let filter = memo.props(select.filter);
                props.unbound_cols = filter.unbound_cols().difference(&input.output_cols);
                props.unbound_cols.union_with(&input.unbound_cols);
                let conjuncts = memo.conjuncts(select.filter);
                add_not_null_cols(memo, &conjuncts, &mut props);
                add_equivalences(memo, &conjuncts, &mut props.equiv_cols, &props.output_cols);
                Ok(props)
            }
            Operator::Project => {
                let project = expr.as_project().ok_or_else(|| unexpected(expr))?;
                let input = relational(memo, project.input)?;
                let output_cols: ColSet = memo.projection_columns(project.projections).iter().collect();
                let mut props = project_props(input, output_cols);
                props.unbound_cols = memo.props(project.projections).unbound_cols().difference(&input.output_cols);
                props.unbound_cols.union_with(&input.unbound_cols);
                Ok(props)
            }
            Operator::GroupBy => {
                let group_by = expr.as_group_by().ok_or_else(|| unexpected(expr))?;
                let input = relational(memo, group_by.input)?;
                let grouping_cols: ColSet = memo.projection_columns(group_by.groupings).iter().collect();
                let aggr_cols: ColSet = memo.projection_columns(group_by.aggregations).iter().collect();

                let mut unbound = memo.props(group_by.groupings).unbound_cols().clone();
                unbound.union_with(memo.props(group_by.aggregations).unbound_cols());
                let mut unbound = unbound.difference(&input.output_cols);
                unbound.union_with(&input.unbound_cols);

                let mut equiv_cols = Vec::new();
                for class in input.equiv_cols.iter() {
                    let class = class.intersection(&grouping_cols);
                    if class.len() > 1 {
                        equiv_cols.push(class);
                    }
                }

                Ok(RelationalProps {
                    output_cols: grouping_cols.union(&aggr_cols),
                    not_null_cols: input.not_null_cols.intersection(&grouping_cols),
                    weak_keys: vec![grouping_cols],
                    foreign_keys: Vec::new(),
                    equiv_cols,
                    unbound_cols: unbound,
                })
            }
            Operator::Union | Operator::Intersect | Operator::Except => {
                let set_op = expr.as_set_op().ok_or_else(|| unexpected(expr))?;
                let left = relational(memo, set_op.left)?;
                let right = relational(memo, set_op.right)?;
                let column_map = memo.private(set_op.column_map).as_column_map().ok_or_else(|| {
                    OptimizerError::internal(format!("{} without a column map: {:?}", op, expr))
                })?;

                let mut props = RelationalProps::default();
                for (l, r) in column_map.iter() {
                    props.output_cols.insert(*l);
                    let not_null = match op {
                        Operator::Union => left.not_null_cols.contains(*l) && right.not_null_cols.contains(*r),
                        Operator::Intersect => left.not_null_cols.contains(*l) || right.not_null_cols.contains(*r),
                        _ => left.not_null_cols.contains(*l),
                    };
                    if not_null {
                        props.not_null_cols.insert(*l);
                    }
                }
                if op != Operator::Union {
                    props.weak_keys = left.weak_keys.iter().filter(|k| k.is_subset(&props.output_cols)).cloned().collect();
                }
                props.unbound_cols = left.unbound_cols.union(&right.unbound_cols);
                Ok(props)
            }
            _ if op.is_join() => self.build_join(memo, expr),
            _ => Err(OptimizerError::not_implemented(format!("Logical properties of {}", op))),
        }
    }

    fn build_scan(&self, memo: &Memo, expr: &MemoExpr) -> Result<RelationalProps, OptimizerError> {
        let table_id = memo
            .private(expr.private_field(0))
            .as_table()
            .ok_or_else(|| OptimizerError::internal(format!("Scan without a table: {:?}", expr)))?;
        let metadata = memo.metadata();
        let table_meta = metadata.table(table_id);
        let table = table_meta.table();

        let mut props = RelationalProps::default();
        for (i, column) in table.columns().iter().enumerate() {
            let id = table_meta.column_at(i);
            props.output_cols.insert(id);
            if !column.nullable() {
                props.not_null_cols.insert(id);
            }
        }

        let key_cols = |positions: &[usize]| -> ColSet { positions.iter().map(|p| table_meta.column_at(*p)).collect() };
        if let Some(pk) = table.primary_key() {
            props.weak_keys.push(key_cols(pk));
        }
        for key in table.unique_keys() {
            let key = key_cols(key);
            if !props.weak_keys.contains(&key) {
                props.weak_keys.push(key);
            }
        }

        for fk in table.foreign_keys() {
            let src: Vec<ColumnId> = fk.columns().iter().map(|p| table_meta.column_at(*p)).collect();
            for referenced in metadata.tables().filter(|t| t.table().name() == fk.referenced_table()) {
                let dest: Option<Vec<ColumnId>> = fk
                    .referenced_columns()
                    .iter()
                    .map(|name| metadata.find_column(referenced.id(), name))
                    .collect();
                if let Some(dest) = dest {
                    props.foreign_keys.push(ForeignKeyProps { src: src.clone(), dest });
                }
            }
        }
        Ok(props)
    }

    fn build_values(&self, memo: &Memo, expr: &MemoExpr) -> Result<RelationalProps, OptimizerError> {
        let columns = memo
            .private(expr.private_field(1))
            .as_columns()
            .ok_or_else(|| OptimizerError::internal(format!("Values without columns: {:?}", expr)))?;
        let rows = memo.list(expr.list_field(0));

        let mut props = RelationalProps {
            output_cols: columns.iter().collect(),
            ..Default::default()
        };
        for (i, col) in columns.iter().enumerate() {
            let not_null = rows.iter().all(|row| {
                let row = memo.normal_expr(*row);
                let item = row.as_list().and_then(|l| memo.list(l).get(i).copied());
                matches!(item.and_then(|g| memo.as_const(g)), Some(v) if *v != ScalarValue::Null)
            });
            if not_null && !rows.is_empty() {
                props.not_null_cols.insert(*col);
            }
        }
        if rows.len() <= 1 {
            props.weak_keys.push(ColSet::new());
        }
        for row in rows {
            props.unbound_cols.union_with(memo.props(*row).unbound_cols());
        }
        Ok(props)
    }

    fn build_join(&self, memo: &Memo, expr: &MemoExpr) -> Result<RelationalProps, OptimizerError> {
        let join = expr.as_join().ok_or_else(|| unexpected(expr))?;
        let kind = join.op.join_kind().ok_or_else(|| unexpected(expr))?;
        let left = relational(memo, join.left)?;
        let right = relational(memo, join.right)?;
        let filter = memo.props(join.filter);
        let conjuncts = memo.conjuncts(join.filter);

        let input_cols = left.output_cols.union(&right.output_cols);
        let mut unbound = filter.unbound_cols().difference(&input_cols);
        unbound.union_with(&left.unbound_cols);
        if join.op.is_apply() {
            unbound.union_with(&right.unbound_cols.difference(&left.output_cols));
        } else {
            unbound.union_with(&right.unbound_cols);
        }

        let mut props = RelationalProps {
            unbound_cols: unbound,
            ..Default::default()
        };

        if kind.left_only() {
            props.output_cols = left.output_cols.clone();
            props.not_null_cols = left.not_null_cols.clone();
            props.weak_keys = left.weak_keys.clone();
            props.foreign_keys = left.foreign_keys.clone();
            props.equiv_cols = left.equiv_cols.clone();
            if kind == JoinKind::Semi {
                add_not_null_cols(memo, &conjuncts, &mut props);
                add_equivalences(memo, &conjuncts, &mut props.equiv_cols, &left.output_cols);
            }
            return Ok(props);
        }

        props.output_cols = input_cols;
        props.not_null_cols = match kind {
            JoinKind::Inner => left.not_null_cols.union(&right.not_null_cols),
            JoinKind::Left => left.not_null_cols.clone(),
            JoinKind::Right => right.not_null_cols.clone(),
            _ => ColSet::new(),
        };
        if kind == JoinKind::Inner {
            add_not_null_cols(memo, &conjuncts, &mut props);
        }

        props.equiv_cols = left.equiv_cols.clone();
        for class in right.equiv_cols.iter() {
            merge_equivalence(&mut props.equiv_cols, class.clone());
        }
        let mut join_equiv = Vec::new();
        add_equivalences(memo, &conjuncts, &mut join_equiv, &props.output_cols);
        if kind == JoinKind::Inner {
            for class in join_equiv.iter() {
                merge_equivalence(&mut props.equiv_cols, class.clone());
            }
        }

        // A key of one side is a key of the join if every row of that side matches at most one row of the other side.
        let left_unique = key_covered_by(right, &join_equiv, &left.output_cols);
        let right_unique = key_covered_by(left, &join_equiv, &right.output_cols);
        if left_unique && kind != JoinKind::Full {
            props.weak_keys.extend(left.weak_keys.iter().cloned());
        }
        if right_unique && kind != JoinKind::Full {
            for key in right.weak_keys.iter() {
                if !props.weak_keys.contains(key) {
                    props.weak_keys.push(key.clone());
                }
            }
        }
        for l in left.weak_keys.iter() {
            for r in right.weak_keys.iter() {
                let key = l.union(r);
                if !props.weak_keys.iter().any(|k| k.is_subset(&key)) {
                    props.weak_keys.push(key);
                }
            }
        }

        props.foreign_keys = left.foreign_keys.iter().chain(right.foreign_keys.iter()).cloned().collect();
        Ok(props)
    }
}

fn private_column(memo: &Memo, expr: &MemoExpr) -> Result<ColumnId, OptimizerError> {
    memo.private(expr.private_field(0))
        .as_column()
        .ok_or_else(|| OptimizerError::internal(format!("{} without a column: {:?}", expr.op(), expr)))
}

fn unexpected(expr: &MemoExpr) -> OptimizerError {
    OptimizerError::internal(format!("Unexpected expression: {:?}", expr))
}

fn binary(expr: &MemoExpr) -> Result<(GroupId, GroupId), OptimizerError> {
    expr.as_binary()
        .ok_or_else(|| OptimizerError::internal(format!("Expected a binary expression: {:?}", expr)))
}

fn relational(memo: &Memo, group: GroupId) -> Result<&RelationalProps, OptimizerError> {
    memo.props(group)
        .relational()
        .ok_or_else(|| OptimizerError::internal(format!("Expected a relational group: {}", group)))
}

/// Properties of a projection of the given input onto the given columns.
fn project_props(input: &RelationalProps, output_cols: ColSet) -> RelationalProps {
    let mut equiv_cols = Vec::new();
    for class in input.equiv_cols.iter() {
        let class = class.intersection(&output_cols);
        if class.len() > 1 {
            equiv_cols.push(class);
        }
    }
    RelationalProps {
        not_null_cols: input.not_null_cols.intersection(&output_cols),
        weak_keys: input.weak_keys.iter().filter(|k| k.is_subset(&output_cols)).cloned().collect(),
        foreign_keys: input
            .foreign_keys
            .iter()
            .filter(|fk| fk.src.iter().all(|c| output_cols.contains(*c)))
            .cloned()
            .collect(),
        equiv_cols,
        output_cols,
        unbound_cols: ColSet::new(),
    }
}

/// Columns compared by conjuncts are not null: a comparison with NULL is never true.
fn add_not_null_cols(memo: &Memo, conjuncts: &[GroupId], props: &mut RelationalProps) {
    for conjunct in conjuncts {
        let expr = memo.normal_expr(*conjunct);
        if !expr.op().is_comparison() {
            continue;
        }
        if let Some((left, right)) = expr.as_binary() {
            for side in [left, right] {
                if let Some(col) = memo.as_column(side) {
                    if props.output_cols.contains(col) {
                        props.not_null_cols.insert(col);
                    }
                }
            }
        }
    }
}

/// Adds equivalences between columns of `cols` implied by `a = b` conjuncts.
fn add_equivalences(memo: &Memo, conjuncts: &[GroupId], classes: &mut Vec<ColSet>, cols: &ColSet) {
    for conjunct in conjuncts {
        if let Some((a, b)) = memo.as_column_equality(*conjunct) {
            if cols.contains(a) && cols.contains(b) {
                merge_equivalence(classes, [a, b].iter().collect());
            }
        }
    }
}

/// Adds the given class of equal columns merging every class it intersects with.
pub(crate) fn merge_equivalence(classes: &mut Vec<ColSet>, mut class: ColSet) {
    let mut i = 0;
    while i < classes.len() {
        if classes[i].intersects(&class) {
            let other = classes.swap_remove(i);
            class.union_with(&other);
        } else {
            i += 1;
        }
    }
    classes.push(class);
}

/// Returns `true` if `side` has a key every column of which is equated to a column of `other_cols`.
fn key_covered_by(side: &RelationalProps, equalities: &[ColSet], other_cols: &ColSet) -> bool {
    side.weak_keys.iter().any(|key| {
        !key.is_empty()
            && key.iter().all(|col| {
                equalities
                    .iter()
                    .any(|class| class.contains(col) && class.intersects(other_cols))
            })
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn cols(ids: &[usize]) -> ColSet {
        ids.iter().map(|i| ColumnId::new(*i)).collect()
    }

    #[test]
    fn test_merge_equivalence() {
        let mut classes = vec![cols(&[1, 2]), cols(&[5, 6])];
        merge_equivalence(&mut classes, cols(&[2, 3]));
        merge_equivalence(&mut classes, cols(&[8, 9]));

        assert_eq!(classes.len(), 3);
        assert!(classes.contains(&cols(&[1, 2, 3])));

        merge_equivalence(&mut classes, cols(&[3, 6]));
        assert_eq!(classes, vec![cols(&[8, 9]), cols(&[1, 2, 3, 5, 6])]);
    }

    #[test]
    fn test_project_props() {
        let input = RelationalProps {
            output_cols: cols(&[1, 2, 3]),
            not_null_cols: cols(&[1, 3]),
            weak_keys: vec![cols(&[1]), cols(&[2, 3])],
            foreign_keys: vec![ForeignKeyProps {
                src: vec![ColumnId::new(3)],
                dest: vec![ColumnId::new(7)],
            }],
            equiv_cols: vec![cols(&[1, 2, 3])],
            unbound_cols: ColSet::new(),
        };
        let props = project_props(&input, cols(&[1, 2]));

        assert_eq!(props.not_null_cols, cols(&[1]));
        assert_eq!(props.weak_keys, vec![cols(&[1])]);
        assert!(props.foreign_keys.is_empty());
        assert_eq!(props.equiv_cols, vec![cols(&[1, 2])]);
        assert_eq!(props.equiv_class(ColumnId::new(2)), cols(&[1, 2]));
        assert_eq!(props.equiv_class(ColumnId::new(9)), cols(&[9]));
    }
}
