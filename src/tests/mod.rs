use crate::cost::Cost;
use crate::datatypes::ScalarValue;
use crate::explorer::rules::ExplorationRules;
use crate::explorer::Explorer;
use crate::factory::NormalizationRules;
use crate::memo::expr::{join_expr, GroupId};
use crate::memo::group::OptimizePass;
use crate::operators::Operator;
use crate::optimizer::format_plan;
use crate::optimizer::OptimizerOptions;
use crate::properties::colset::ColSet;
use crate::properties::physical::{PhysicalProps, PhysicalPropsId, Projection};
use crate::testing::TestContext;

mod properties;

// SELECT x FROM a WHERE y > 0
#[test]
fn test_select_project() {
    let mut ctx = TestContext::new();
    let a = ctx.scan("a");
    let x = ctx.col("a", "x");
    let y = ctx.col("a", "y");
    let filter = ctx.gt_const("a", "y", 0);
    let select = ctx.factory().construct_select(a, filter).unwrap();
    let project = ctx.project(select, &[x]);

    let memo = ctx.memo();
    let root = memo.normal_expr(project).as_project().unwrap();
    assert_eq!(root.input, select);
    let select_expr = memo.normal_expr(select).as_select().unwrap();
    assert_eq!(select_expr.input, a);
    assert_eq!(memo.normal_expr(a).op(), Operator::Scan);

    let select_props = memo.props(select).relational().unwrap();
    assert!(select_props.not_null_cols.contains(y), "y > 0 rejects NULLs");
    assert_eq!(memo.props(project).output_cols(), &ColSet::single(x));

    let (expr, stats) = ctx.optimizer().optimize_with_stats(ctx.memo_mut(), project, PhysicalProps::none()).unwrap();
    assert_eq!(stats.enforcers, 0);
    let plan = format_plan(ctx.memo(), &expr).unwrap();
    assert_eq!(
        plan,
        r#"Project [col:1] cost=1011
  Select filter=[col:2 > 0] cost=1010
    Scan a ordering=[+1] cost=1000
"#
    );
}

#[test]
fn test_commutative_operands() {
    let mut ctx = TestContext::new();
    ctx.scan("a");
    ctx.scan("b");
    let by = ctx.col("b", "y");
    let ac = ctx.col("a", "c");
    let v5 = ctx.var(by);
    let v3 = ctx.var(ac);

    let eq1 = ctx.factory().construct_eq(v5, v3).unwrap();
    let eq2 = ctx.factory().construct_eq(v3, v5).unwrap();
    assert_eq!(eq1, eq2);

    let memo = ctx.memo();
    let (l, r) = memo.normal_expr(eq1).as_binary().unwrap();
    assert!(l < r, "the operand with the lower group id goes first: {:?} {:?}", l, r);
    assert_eq!(memo.group(eq1).num_exprs(), 1);
}

// SELECT * FROM a JOIN a AS a2 USING (x)
#[test]
fn test_self_join() {
    let mut ctx = TestContext::new();
    let a = ctx.scan("a");
    let a2 = ctx.scan_as("a", "a2");
    let ax = ctx.col("a", "x");
    let a2x = ctx.col("a2", "x");
    assert_ne!(ax, a2x);
    assert_ne!(a, a2);

    let filter = ctx.eq_columns(ax, a2x);
    let join = ctx.factory().construct_inner_join(a, a2, filter).unwrap();

    let memo = ctx.memo();
    let expr = memo.normal_expr(join).as_join().unwrap();
    assert_eq!(memo.conjuncts(expr.filter), vec![filter]);

    let props = memo.props(join).relational().unwrap();
    let expected: ColSet = [ax, a2x].iter().collect();
    assert_eq!(props.equiv_class(ax), expected);
    assert_eq!(props.equiv_class(a2x), expected);
    assert!(props.is_key(&ColSet::single(ax)), "x is a key of both sides");
}

#[test]
fn test_decorrelate_and_eliminate_apply() {
    let mut ctx = TestContext::new();
    let a = ctx.scan("a");
    let b = ctx.scan("b");
    let ax = ctx.col("a", "x");
    let by = ctx.col("b", "y");
    let eq = ctx.eq_columns(ax, by);

    let right = ctx.factory().construct_select(b, eq).unwrap();
    assert!(ctx.memo().props(right).unbound_cols().contains(ax));

    let mut factory = ctx.factory();
    let filter = factory.construct_true().unwrap();
    let apply = factory.construct_inner_join_apply(a, right, filter).unwrap();
    let join = factory.construct_inner_join(a, b, eq).unwrap();
    assert_eq!(apply, join);

    let memo = ctx.memo();
    let expr = memo.normal_expr(apply).as_join().unwrap();
    assert_eq!(expr.op, Operator::InnerJoin);
    assert_eq!((expr.left, expr.right), (a, b));
    assert_eq!(memo.conjuncts(expr.filter), vec![eq]);
    assert!(memo.is_alt_fingerprint(&join_expr(Operator::InnerJoinApply, a, right, filter).fingerprint()));
    assert!(memo.props(apply).unbound_cols().is_empty());
}

#[test]
fn test_sort_enforcer() {
    let mut ctx = TestContext::new();
    let a = ctx.scan("a");
    let c = ctx.col("a", "c");
    let required = ctx.ordering(&[c]);
    let expr = ctx.optimize(a, required.clone());

    let memo = ctx.memo();
    assert_eq!(expr.op(), Operator::Sort);
    assert!(expr.is_enforcer());
    assert_eq!(memo.physical_props(expr.required()), &required);

    let inner = expr.child(memo, 0).unwrap();
    assert_eq!(inner.required(), PhysicalPropsId::NONE);
    assert_eq!(inner.op(), Operator::Scan);
    let scan_cost = inner.cost(memo).unwrap();
    assert_eq!(expr.cost(memo).unwrap(), scan_cost + 500.0);

    let provided = memo.physical_props(expr.provided(memo).unwrap());
    assert!(provided.provides(&required));
}

#[test]
fn test_no_enforcer_for_primary_key_ordering() {
    let mut ctx = TestContext::new();
    let a = ctx.scan("a");
    let x = ctx.col("a", "x");
    let expr = ctx.optimize(a, ctx.ordering(&[x]));

    assert_eq!(expr.op(), Operator::Scan);
    assert_eq!(expr.cost(ctx.memo()).unwrap(), Cost::from(1000.0));
}

#[test]
fn test_arrange_reorders_project_output() {
    let mut ctx = TestContext::new();
    let a = ctx.scan("a");
    let x = ctx.col("a", "x");
    let y = ctx.col("a", "y");
    let project = ctx.project(a, &[x, y]);

    let reordered = PhysicalProps::with_projection(Projection::new(vec![("y".into(), y), ("x".into(), x)]));
    let expr = ctx.optimize(project, reordered.clone());
    let memo = ctx.memo();
    assert_eq!(expr.op(), Operator::Arrange);
    assert_eq!(memo.physical_props(expr.provided(memo).unwrap()), &reordered);

    let inner = expr.child(memo, 0).unwrap();
    assert_eq!(inner.op(), Operator::Project);
    assert_eq!(inner.required(), PhysicalPropsId::NONE);
    assert_eq!(expr.cost(memo).unwrap(), inner.cost(memo).unwrap() + 5.0);

    let in_order = PhysicalProps::with_projection(Projection::new(vec![("x".into(), x), ("y".into(), y)]));
    let expr = ctx.optimize(project, in_order.clone());
    let memo = ctx.memo();
    assert_eq!(expr.op(), Operator::Project);
    assert_eq!(memo.physical_props(expr.provided(memo).unwrap()), &in_order);
}

#[test]
fn test_arrange_above_select_keeps_filter_columns() {
    let mut ctx = TestContext::new();
    let a = ctx.scan("a");
    let x = ctx.col("a", "x");
    let c = ctx.col("a", "c");
    let filter = ctx.gt_const("a", "y", 0);
    let select = ctx.factory().construct_select(a, filter).unwrap();

    let required = PhysicalProps::with_projection(Projection::new(vec![("x".into(), x), ("c".into(), c)]));
    let expr = ctx.optimize(select, required);
    let memo = ctx.memo();
    assert_eq!(expr.op(), Operator::Arrange);

    let inner = expr.child(memo, 0).unwrap();
    assert_eq!(inner.op(), Operator::Select);
    assert_eq!(inner.required(), PhysicalPropsId::NONE);
    assert_eq!(expr.cost(memo).unwrap(), Cost::from(1015.0));
}

fn three_way_join(ctx: &mut TestContext) -> (GroupId, [GroupId; 3]) {
    let r = ctx.scan("r");
    let s = ctx.scan("s");
    let t = ctx.scan("t");
    let ra = ctx.col("r", "a");
    let rb = ctx.col("r", "b");
    let sa = ctx.col("s", "a");
    let ta = ctx.col("t", "a");
    let tb = ctx.col("t", "b");

    let p_rs = ctx.eq_columns(ra, sa);
    let rs = ctx.factory().construct_inner_join(r, s, p_rs).unwrap();
    let p_rt = ctx.eq_columns(rb, tb);
    let p_st = ctx.eq_columns(sa, ta);
    let p_rst = ctx.factory().construct_filters(&[p_rt, p_st]).unwrap();
    let rst = ctx.factory().construct_inner_join(rs, t, p_rst).unwrap();
    (rst, [r, s, t])
}

#[test]
fn test_join_associativity() {
    let mut ctx = TestContext::new();
    let (rst, [r, s, t]) = three_way_join(&mut ctx);
    let rb = ctx.col("r", "b");
    let tb = ctx.col("t", "b");
    let p_rt = ctx.eq_columns(rb, tb);

    let rules = ExplorationRules::default();
    let normalization = NormalizationRules::default();
    let mut explorer = Explorer::new(&rules, &normalization);
    explorer.explore_group(ctx.memo_mut(), rst, OptimizePass::new(1, 1)).unwrap();

    let memo = ctx.memo();
    let alternate = memo
        .group_exprs(rst)
        .into_iter()
        .filter_map(|e| e.as_join())
        .find(|j| j.right == s && memo.normal_expr(j.left).op() == Operator::InnerJoin)
        .expect("no join(join(r, t), s) alternate");

    let rt = memo.normal_expr(alternate.left).as_join().unwrap();
    assert_eq!((rt.left, rt.right), (r, t));
    assert_eq!(memo.conjuncts(rt.filter), vec![p_rt]);

    let s_cols = memo.props(s).output_cols();
    let upper = memo.conjuncts(alternate.filter);
    assert_eq!(upper.len(), 2);
    assert!(upper.iter().all(|c| memo.props(*c).unbound_cols().intersects(s_cols)));
    assert_eq!(memo.props(alternate.left).output_cols(), &memo.props(r).output_cols().union(memo.props(t).output_cols()));
}

#[test]
fn test_optimize_three_way_join() {
    let mut ctx = TestContext::new();
    let (rst, _) = three_way_join(&mut ctx);

    let (expr, stats) = ctx.optimizer().optimize_with_stats(ctx.memo_mut(), rst, PhysicalProps::none()).unwrap();
    assert!(stats.alternates > 0);
    assert!(stats.costed_exprs > 0);

    let memo = ctx.memo();
    assert_eq!(expr.op(), Operator::InnerJoin);
    // every join order costs the same: 2 joins + 100 + 1000 + 1000.
    assert_eq!(expr.cost(memo).unwrap(), Cost::from(2300.0));
    assert!(memo.group(rst).num_exprs() > 1);
    assert!(memo.group(rst).best_expr(PhysicalPropsId::NONE).is_some());
}

#[test]
fn test_optimize_without_exploration() {
    let mut ctx = TestContext::new();
    let (rst, _) = three_way_join(&mut ctx);
    let optimizer = ctx
        .optimizer()
        .with_options(OptimizerOptions::default().with_explore(false));

    let (_, stats) = optimizer.optimize_with_stats(ctx.memo_mut(), rst, PhysicalProps::none()).unwrap();
    assert_eq!(stats.alternates, 0);
    assert_eq!(ctx.memo().group(rst).num_exprs(), 1);
}

#[test]
fn test_fold_constants() {
    let mut ctx = TestContext::new();
    let one = ctx.int(1);
    let two = ctx.int(2);
    let mut factory = ctx.factory();

    let lt = factory.construct_lt(one, two).unwrap();
    assert_eq!(factory.memo().as_bool_const(lt), Some(true));

    let sum = factory.construct_plus(one, two).unwrap();
    assert_eq!(factory.memo().as_const(sum), Some(&ScalarValue::Int32(3)));

    let null = factory.construct_null().unwrap();
    let cmp = factory.construct_eq(one, null).unwrap();
    assert_eq!(cmp, null);
}

#[test]
fn test_variable_first() {
    let mut ctx = TestContext::new();
    ctx.scan("a");
    let x = ctx.col("a", "x");
    let v = ctx.var(x);
    let five = ctx.int(5);
    let lt = ctx.factory().construct_lt(five, v).unwrap();
    let gt = ctx.factory().construct_gt(v, five).unwrap();

    assert_eq!(lt, gt);
    assert_eq!(ctx.memo().format_scalar(lt), "col:1 > 5");
}

#[test]
fn test_fold_not() {
    let mut ctx = TestContext::new();
    ctx.scan("a");
    let filter = ctx.gt_const("a", "y", 5);
    let mut factory = ctx.factory();

    let not = factory.construct_not(filter).unwrap();
    assert_eq!(factory.memo().format_scalar(not), "col:2 <= 5");
    let not_not = factory.construct_not(not).unwrap();
    assert_eq!(not_not, filter);

    let t = factory.construct_true().unwrap();
    let f = factory.construct_false().unwrap();
    assert_eq!(factory.construct_not(t).unwrap(), f);
}

#[test]
fn test_fold_and_flatten() {
    let mut ctx = TestContext::new();
    ctx.scan("a");
    let p = ctx.gt_const("a", "x", 1);
    let q = ctx.gt_const("a", "y", 2);
    let mut factory = ctx.factory();

    let t = factory.construct_true().unwrap();
    assert_eq!(factory.construct_and(p, t).unwrap(), p);
    assert_eq!(factory.construct_and(p, p).unwrap(), p);

    let and = factory.construct_and(q, p).unwrap();
    let filters = factory.construct_filters(&[p, q]).unwrap();
    assert_eq!(and, filters);
    assert_eq!(factory.memo().conjuncts(and), vec![p, q]);

    let f = factory.construct_false().unwrap();
    assert_eq!(factory.construct_or(p, f).unwrap(), p);
    assert_eq!(factory.construct_or(p, t).unwrap(), t);
}

#[test]
fn test_eliminate_and_merge_selects() {
    let mut ctx = TestContext::new();
    let a = ctx.scan("a");
    let p = ctx.gt_const("a", "x", 1);
    let q = ctx.gt_const("a", "y", 2);
    let mut factory = ctx.factory();

    let t = factory.construct_true().unwrap();
    assert_eq!(factory.construct_select(a, t).unwrap(), a);

    let inner = factory.construct_select(a, p).unwrap();
    let outer = factory.construct_select(inner, q).unwrap();
    let both = factory.construct_filters(&[p, q]).unwrap();
    let merged = factory.construct_select(a, both).unwrap();
    assert_eq!(outer, merged);

    let select = factory.memo().normal_expr(outer).as_select().unwrap();
    assert_eq!(select.input, a);
}

#[test]
fn test_push_down_and_infer_filters() {
    let mut ctx = TestContext::new();
    let a = ctx.scan("a");
    let b = ctx.scan("b");
    let ax = ctx.col("a", "x");
    let bx = ctx.col("b", "x");
    let eq = ctx.eq_columns(ax, bx);
    let ax_gt = ctx.gt_const("a", "x", 5);
    let bx_gt = ctx.gt_const("b", "x", 5);

    let t = ctx.factory().construct_true().unwrap();
    let join = ctx.factory().construct_inner_join(a, b, t).unwrap();
    let filter = ctx.factory().construct_filters(&[eq, ax_gt]).unwrap();
    let select = ctx.factory().construct_select(join, filter).unwrap();

    let memo = ctx.memo();
    let join = memo.normal_expr(select).as_join().expect("the select is merged into the join");
    assert_eq!(join.op, Operator::InnerJoin);
    assert_eq!(memo.conjuncts(join.filter), vec![eq]);

    let left = memo.normal_expr(join.left).as_select().unwrap();
    assert_eq!(left.input, a);
    assert_eq!(memo.conjuncts(left.filter), vec![ax_gt]);
    let right = memo.normal_expr(join.right).as_select().unwrap();
    assert_eq!(right.input, b);
    assert_eq!(memo.conjuncts(right.filter), vec![bx_gt], "b.x > 5 is inferred from a.x = b.x");
}

#[test]
fn test_left_join_keeps_left_filter() {
    let mut ctx = TestContext::new();
    let a = ctx.scan("a");
    let b = ctx.scan("b");
    let ax = ctx.col("a", "x");
    let bx = ctx.col("b", "x");
    let eq = ctx.eq_columns(ax, bx);
    let ay_gt = ctx.gt_const("a", "y", 1);
    let by_gt = ctx.gt_const("b", "y", 1);

    let filter = ctx.factory().construct_filters(&[eq, ay_gt, by_gt]).unwrap();
    let join = ctx.factory().construct_left_join(a, b, filter).unwrap();

    let memo = ctx.memo();
    let join = memo.normal_expr(join).as_join().unwrap();
    assert_eq!(join.left, a);
    assert_eq!(memo.conjuncts(join.filter), vec![eq, ay_gt]);
    let right = memo.normal_expr(join.right).as_select().unwrap();
    assert_eq!((right.input, memo.conjuncts(right.filter)), (b, vec![by_gt]));
}

#[test]
fn test_projects() {
    let mut ctx = TestContext::new();
    let a = ctx.scan("a");
    let x = ctx.col("a", "x");
    let y = ctx.col("a", "y");
    let c = ctx.col("a", "c");

    assert_eq!(ctx.project(a, &[x, y, c]), a, "the project returns its input unchanged");

    let inner = ctx.project(a, &[x, y]);
    let outer = ctx.project(inner, &[x]);
    let direct = ctx.project(a, &[x]);
    assert_eq!(outer, direct);
}

#[test]
fn test_exists_becomes_semi_join() {
    let mut ctx = TestContext::new();
    let a = ctx.scan("a");
    let b = ctx.scan("b");
    let exists = ctx.factory().construct_exists(b).unwrap();
    let select = ctx.factory().construct_select(a, exists).unwrap();

    let memo = ctx.memo();
    let join = memo.normal_expr(select).as_join().unwrap();
    assert_eq!(join.op, Operator::SemiJoin);
    assert_eq!((join.left, join.right), (a, b));
    assert!(memo.conjuncts(join.filter).is_empty());
}

#[test]
fn test_correlated_not_exists_becomes_anti_join() {
    let mut ctx = TestContext::new();
    let a = ctx.scan("a");
    let b = ctx.scan("b");
    let ax = ctx.col("a", "x");
    let bx = ctx.col("b", "x");
    let eq = ctx.eq_columns(ax, bx);

    let mut factory = ctx.factory();
    let subquery = factory.construct_select(b, eq).unwrap();
    let exists = factory.construct_exists(subquery).unwrap();
    let not_exists = factory.construct_not(exists).unwrap();
    let select = factory.construct_select(a, not_exists).unwrap();

    let memo = ctx.memo();
    let join = memo.normal_expr(select).as_join().unwrap();
    assert_eq!(join.op, Operator::AntiJoin);
    assert_eq!((join.left, join.right), (a, b));
    assert_eq!(memo.conjuncts(join.filter), vec![eq]);
    assert_eq!(memo.props(select).output_cols(), memo.props(a).output_cols());
}

#[test]
fn test_hoist_scalar_subquery() {
    let mut ctx = TestContext::new();
    let a = ctx.scan("a");
    let b = ctx.scan("b");
    let ay = ctx.col("a", "y");
    let by = ctx.col("b", "y");
    let ay = ctx.var(ay);
    let by = ctx.var(by);

    let mut factory = ctx.factory();
    let subquery = factory.construct_subquery(b, by).unwrap();
    let eq = factory.construct_eq(ay, subquery).unwrap();
    let select = factory.construct_select(a, eq).unwrap();

    let memo = ctx.memo();
    assert!(memo.props(subquery).has_subquery());
    let project = memo.normal_expr(select).as_project().expect("the subquery column is projected away");
    assert_eq!(memo.props(select).output_cols(), memo.props(a).output_cols());

    let inner = memo.normal_expr(project.input).as_select().unwrap();
    assert!(!memo.props(inner.filter).has_subquery());
    let join = memo.normal_expr(inner.input).as_join().unwrap();
    assert_eq!(join.op, Operator::LeftJoin, "an uncorrelated apply becomes a join");
    assert_eq!(join.left, a);
}

#[test]
fn test_normalization_rules_can_be_disabled() {
    let mut ctx = TestContext::with_rules(NormalizationRules::empty());
    let a = ctx.scan("a");
    let t = ctx.factory().construct_true().unwrap();
    let select = ctx.factory().construct_select(a, t).unwrap();

    assert_ne!(select, a);
    assert_eq!(ctx.memo().normal_expr(select).op(), Operator::Select);
}
