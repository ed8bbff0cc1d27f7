use std::collections::HashMap;

use proptest::prelude::*;
use rand::seq::SliceRandom;

use crate::cost::Cost;
use crate::datatypes::{DataType, ScalarValue};
use crate::factory::NormalizationRule;
use crate::memo::expr::{binary_expr, FieldValue, GroupId, MemoExpr};
use crate::memo::Memo;
use crate::meta::{ColumnId, Metadata};
use crate::operators::private::Private;
use crate::operators::Operator;
use crate::optimizer::{Expr, OptimizerOptions};
use crate::properties::logical::LogicalProps;
use crate::properties::ordering::Ordering;
use crate::properties::physical::{PhysicalProps, PhysicalPropsId, Projection};
use crate::testing::TestContext;

const COMPARISONS: [Operator; 6] = [
    Operator::Eq,
    Operator::Ne,
    Operator::Lt,
    Operator::Le,
    Operator::Gt,
    Operator::Ge,
];

/// A predicate over columns of the table `a`.
#[derive(Debug, Clone)]
enum Pred {
    Cmp {
        op: Operator,
        col: usize,
        value: i32,
        const_first: bool,
    },
    Bool(bool),
    Not(Box<Pred>),
    And(Box<Pred>, Box<Pred>),
    Or(Box<Pred>, Box<Pred>),
}

fn pred_strategy() -> impl Strategy<Value = Pred> {
    let leaf = prop_oneof![
        4 => (prop::sample::select(COMPARISONS.to_vec()), 0..3usize, 0..4i32, any::<bool>())
            .prop_map(|(op, col, value, const_first)| Pred::Cmp { op, col, value, const_first }),
        1 => any::<bool>().prop_map(Pred::Bool),
    ];
    leaf.prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(|p| Pred::Not(Box::new(p))),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Pred::And(Box::new(l), Box::new(r))),
            (inner.clone(), inner).prop_map(|(l, r)| Pred::Or(Box::new(l), Box::new(r))),
        ]
    })
}

fn build_pred(ctx: &mut TestContext, pred: &Pred) -> GroupId {
    match pred {
        Pred::Cmp {
            op,
            col,
            value,
            const_first,
        } => {
            let col = ctx.col("a", ["x", "y", "c"][*col]);
            let var = ctx.var(col);
            let value = ctx.int(*value);
            let (l, r) = if *const_first { (value, var) } else { (var, value) };
            ctx.factory().construct_binary(*op, l, r).unwrap()
        }
        Pred::Bool(true) => ctx.factory().construct_true().unwrap(),
        Pred::Bool(false) => ctx.factory().construct_false().unwrap(),
        Pred::Not(input) => {
            let input = build_pred(ctx, input);
            ctx.factory().construct_not(input).unwrap()
        }
        Pred::And(l, r) => {
            let l = build_pred(ctx, l);
            let r = build_pred(ctx, r);
            ctx.factory().construct_and(l, r).unwrap()
        }
        Pred::Or(l, r) => {
            let l = build_pred(ctx, l);
            let r = build_pred(ctx, r);
            ctx.factory().construct_or(l, r).unwrap()
        }
    }
}

fn raw_comparison(memo: &mut Memo, op: Operator, col: usize, value: i32) -> MemoExpr {
    let var = memo.intern_private(Private::Column(ColumnId::new(col)));
    let var = memo.intern_expr(&MemoExpr::new(Operator::Variable, &[FieldValue::Private(var)]), None).unwrap();
    let value = memo.intern_private(Private::Value(ScalarValue::Int32(value)));
    let value = memo.intern_expr(&MemoExpr::new(Operator::Const, &[FieldValue::Private(value)]), None).unwrap();
    binary_expr(op, var, value)
}

/// Joins `r`, `s` and `t` in the given order. Every table is joined on `a` with the first one.
fn join_tables(ctx: &mut TestContext, tables: &[&str]) -> GroupId {
    let first = tables[0];
    let mut result = ctx.scan(first);
    for table in &tables[1..] {
        let scan = ctx.scan(table);
        let l = ctx.col(first, "a");
        let r = ctx.col(table, "a");
        let filter = ctx.eq_columns(l, r);
        result = ctx.factory().construct_inner_join(result, scan, filter).unwrap();
    }
    result
}

/// Checks that every node of a plan provides the properties required from it.
fn check_provided_props(memo: &Memo, expr: &Expr) -> Result<(), TestCaseError> {
    let provided = memo.get_physical_props(expr.provided(memo).unwrap()).unwrap();
    let required = memo.get_physical_props(expr.required()).unwrap();
    prop_assert!(
        provided.provides(required),
        "{} in group {} provides {} but {} is required",
        expr.op(),
        expr.group(),
        provided,
        required
    );
    for i in 0..expr.num_children(memo) {
        let child = expr.child(memo, i).unwrap();
        if child.op().is_relational() || child.op().is_enforcer() {
            check_provided_props(memo, &child)?;
        }
    }
    Ok(())
}

fn logical_props(memo: &Memo) -> Vec<(GroupId, LogicalProps)> {
    memo.groups().map(|g| (g.id(), g.props().clone())).collect()
}

fn best_costs(memo: &Memo) -> HashMap<(GroupId, PhysicalPropsId), Cost> {
    let mut costs = HashMap::new();
    for group in memo.groups() {
        for (props, best) in group.best_exprs() {
            costs.insert((group.id(), props), best.cost);
        }
    }
    costs
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn logical_props_do_not_change(
        tables in Just(vec!["r", "s", "t"]).prop_shuffle(),
        order_by in 0..2usize,
    ) {
        let mut ctx = TestContext::new();
        let join = join_tables(&mut ctx, &tables);
        let col = ctx.col(tables[order_by], "b");
        let before = logical_props(ctx.memo());

        ctx.optimize(join, PhysicalProps::none());
        let required = ctx.ordering(&[col]);
        ctx.optimize(join, required);
        let filter = ctx.factory().construct_true().unwrap();
        ctx.factory().construct_select(join, filter).unwrap();

        let memo = ctx.memo();
        prop_assert!(memo.groups().count() >= before.len());
        for (group, props) in before {
            prop_assert_eq!(memo.props(group), &props, "group {}", group);
        }
    }

    #[test]
    fn every_plan_node_provides_its_required_props(
        order_by in prop::option::of(0..3usize),
        columns in prop::option::of((Just(vec![0usize, 1, 2]).prop_shuffle(), any::<bool>())),
        value in 0..4i32,
    ) {
        let mut ctx = TestContext::new();
        let a = ctx.scan("a");
        let names = ["x", "y", "c"];
        let cols: Vec<_> = names.iter().map(|n| ctx.col("a", n)).collect();
        let filter = ctx.gt_const("a", "y", value);
        let select = ctx.factory().construct_select(a, filter).unwrap();
        let project = ctx.project(select, &cols);

        let ordering = order_by.map(|i| Ordering::from_columns(vec![cols[i]]));
        let projection = columns.map(|(positions, ordered)| {
            let columns = positions.iter().map(|i| (names[*i].to_string(), cols[*i])).collect();
            if ordered {
                Projection::new(columns)
            } else {
                Projection::unordered(columns)
            }
        });
        let required = PhysicalProps::none().set_ordering(ordering).set_projection(projection);

        let expr = ctx.optimize(project, required.clone());
        let memo = ctx.memo();
        prop_assert_eq!(memo.physical_props(expr.required()), &required);
        check_provided_props(memo, &expr)?;
    }

    #[test]
    fn best_costs_never_increase_within_a_session(
        tables in Just(vec!["r", "s", "t"]).prop_shuffle(),
        max_steps in 1..8usize,
    ) {
        let mut ctx = TestContext::new();
        let join = join_tables(&mut ctx, &tables);
        let sb = ctx.col("s", "b");
        let ra = ctx.col("r", "a");
        let optimizer = ctx.optimizer().with_options(OptimizerOptions::default().with_max_steps(Some(max_steps)));
        let requirements = vec![
            PhysicalProps::none(),
            ctx.ordering(&[sb]),
            ctx.ordering(&[ra]),
            ctx.ordering(&[sb]),
            PhysicalProps::none(),
        ];

        let mut previous = HashMap::new();
        for required in requirements {
            optimizer.optimize(ctx.memo_mut(), join, required).unwrap();
            let current = best_costs(ctx.memo());
            for (slot, cost) in previous.iter() {
                let now = current.get(slot);
                prop_assert!(now.is_some(), "best expression of {:?} is lost", slot);
                prop_assert!(now <= Some(cost), "cost of {:?} increased: {} -> {:?}", slot, cost, now);
            }
            previous = current;
        }
    }

    #[test]
    fn interned_exprs_are_equal_iff_their_fields_are_equal(
        exprs in prop::collection::vec((prop::sample::select(COMPARISONS.to_vec()), 1..4usize, 0..3i32), 1..24)
    ) {
        let mut metadata = Metadata::new();
        for i in 1..4 {
            metadata.add_column(&format!("c{}", i), DataType::Int32);
        }
        let mut memo = Memo::new(metadata);

        let groups: Vec<_> = exprs
            .iter()
            .map(|(op, col, value)| {
                let expr = raw_comparison(&mut memo, *op, *col, *value);
                memo.intern_expr(&expr, None).unwrap()
            })
            .collect();

        for (i, a) in exprs.iter().enumerate() {
            for (j, b) in exprs.iter().enumerate() {
                prop_assert_eq!(a == b, groups[i] == groups[j], "{:?} {:?}", a, b);
            }
        }
        for group in memo.groups() {
            for expr in memo.group_exprs(group.id()) {
                prop_assert_eq!(memo.find_group(&expr.fingerprint()), Some(group.id()));
            }
        }
    }

    #[test]
    fn normal_forms_are_not_rewritten_again(pred in pred_strategy()) {
        let mut ctx = TestContext::new();
        ctx.scan("a");
        let group = build_pred(&mut ctx, &pred);

        prop_assert_eq!(build_pred(&mut ctx, &pred), group, "construction is deterministic");
        let normal = ctx.memo().normal_expr(group);
        prop_assert_eq!(ctx.factory().construct(normal).unwrap(), group);

        let memo = ctx.memo();
        for g in memo.groups() {
            let expr = memo.normal_expr(g.id());
            for rule in ctx.rules().rules_for(expr.op()) {
                prop_assert!(!rule.matches(memo, &expr), "{} matches {}", rule.name(), memo.format_expr(&expr));
            }
        }
    }

    #[test]
    fn conjunctions_and_disjunctions_commute(l in pred_strategy(), r in pred_strategy()) {
        let mut ctx = TestContext::new();
        ctx.scan("a");
        let l = build_pred(&mut ctx, &l);
        let r = build_pred(&mut ctx, &r);
        let mut factory = ctx.factory();

        let lr = factory.construct_and(l, r).unwrap();
        let rl = factory.construct_and(r, l).unwrap();
        prop_assert_eq!(lr, rl);
        let lr = factory.construct_or(l, r).unwrap();
        let rl = factory.construct_or(r, l).unwrap();
        prop_assert_eq!(lr, rl);

        let and = factory.construct_and(l, r).unwrap();
        let memo = factory.memo();
        let and = memo.normal_expr(and);
        if and.op() == Operator::Filters {
            let items = memo.list(and.list_field(0));
            prop_assert!(items.windows(2).all(|w| w[0] < w[1]), "conjuncts are sorted: {:?}", items);
        }
    }

    #[test]
    fn rewritten_exprs_resolve_to_their_normal_form(
        op in prop::sample::select(COMPARISONS.to_vec()),
        col in 0..3usize,
        value in 0..4i32,
    ) {
        let mut ctx = TestContext::new();
        ctx.scan("a");
        let col = ctx.col("a", ["x", "y", "c"][col]);
        let var = ctx.var(col);
        let value = ctx.int(value);

        // `value op var` is rewritten by VariableFirst.
        let expr = binary_expr(op, value, var);
        let group = ctx.factory().construct(expr).unwrap();
        let memo = ctx.memo();
        prop_assert!(memo.is_alt_fingerprint(&expr.fingerprint()));
        prop_assert_eq!(memo.find_group(&expr.fingerprint()), Some(group));
        prop_assert_eq!(memo.as_column(memo.normal_expr(group).as_binary().unwrap().0), Some(col));
        prop_assert_eq!(ctx.factory().construct(expr).unwrap(), group);
    }

    #[test]
    fn exploration_never_increases_cost(tables in Just(vec!["r", "s", "t"]).prop_shuffle()) {
        let mut ctx = TestContext::new();
        let join = join_tables(&mut ctx, &tables);
        let explored = ctx.optimize(join, PhysicalProps::none());
        let explored = explored.cost(ctx.memo()).unwrap();

        let mut ctx = TestContext::new();
        let join = join_tables(&mut ctx, &tables);
        let optimizer = ctx.optimizer().with_options(OptimizerOptions::default().with_explore(false));
        let plan = optimizer.optimize(ctx.memo_mut(), join, PhysicalProps::none()).unwrap();
        let initial = plan.cost(ctx.memo()).unwrap();

        prop_assert!(explored <= initial, "{} > {}", explored, initial);
    }

    #[test]
    fn required_ordering_never_decreases_cost(col in 0..3usize, value in 0..4i32) {
        let mut ctx = TestContext::new();
        let a = ctx.scan("a");
        let filter = ctx.gt_const("a", "y", value);
        let select = ctx.factory().construct_select(a, filter).unwrap();
        let col = ctx.col("a", ["x", "y", "c"][col]);

        let unordered = ctx.optimize(select, PhysicalProps::none());
        let unordered = unordered.cost(ctx.memo()).unwrap();
        let required = ctx.ordering(&[col]);
        let ordered = ctx.optimize(select, required);
        let ordered = ordered.cost(ctx.memo()).unwrap();

        prop_assert!(unordered <= ordered, "{} > {}", unordered, ordered);
    }
}

#[test]
fn test_conjuncts_in_any_order_build_the_same_filter() {
    let mut ctx = TestContext::new();
    ctx.scan("a");
    let mut items = vec![
        ctx.gt_const("a", "x", 1),
        ctx.gt_const("a", "y", 2),
        ctx.gt_const("a", "c", 3),
        ctx.gt_const("a", "x", 4),
    ];
    let expected = ctx.factory().construct_filters(&items).unwrap();

    let mut rng = rand::thread_rng();
    for _ in 0..16 {
        items.shuffle(&mut rng);
        assert_eq!(ctx.factory().construct_filters(&items).unwrap(), expected, "{:?}", items);

        let and = items[1..]
            .iter()
            .try_fold(items[0], |acc, item| ctx.factory().construct_and(acc, *item))
            .unwrap();
        assert_eq!(and, expected);
    }
}
