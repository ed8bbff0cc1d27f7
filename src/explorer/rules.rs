//! Exploration rules.

use std::fmt::{Debug, Formatter};

use crate::error::OptimizerError;
use crate::factory::Factory;
use crate::memo::expr::{join_expr, GroupId, MemoExpr};
use crate::operators::Operator;

/// An exploration rule adds expressions that are logically equivalent to a member of a group to that group.
pub trait ExplorationRule {
    fn name(&self) -> &'static str;

    /// Operators of expressions this rule applies to.
    fn operators(&self) -> &'static [Operator];

    /// Applies this rule to the given member of `group`. New expressions must be added via
    /// [construct_in_group](Factory::construct_in_group). Returns the number of expressions added to the group.
    fn explore(&self, factory: &mut Factory, group: GroupId, expr: &MemoExpr) -> Result<usize, OptimizerError>;
}

impl Debug for dyn ExplorationRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplorationRule").field("name", &self.name()).finish()
    }
}

/// A set of exploration rules.
pub struct ExplorationRules {
    rules: Vec<Box<dyn ExplorationRule>>,
}

impl ExplorationRules {
    pub fn new(rules: Vec<Box<dyn ExplorationRule>>) -> Self {
        ExplorationRules { rules }
    }

    /// A rule set that does not add any expressions.
    pub fn empty() -> Self {
        ExplorationRules::new(Vec::new())
    }

    /// Returns a copy of this rule set without the rule with the given name.
    pub fn without_rule(self, name: &str) -> Self {
        ExplorationRules::new(self.rules.into_iter().filter(|r| r.name() != name).collect())
    }

    /// Returns rules of the given operator.
    pub fn rules_for(&self, op: Operator) -> impl Iterator<Item = &dyn ExplorationRule> + '_ {
        self.rules.iter().filter(move |r| r.operators().contains(&op)).map(|r| r.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }
}

impl Default for ExplorationRules {
    fn default() -> Self {
        ExplorationRules::new(vec![Box::new(JoinCommutativity), Box::new(JoinAssociativity)])
    }
}

impl Debug for ExplorationRules {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.rules.iter()).finish()
    }
}

/// Adds the given expression to the group. Returns `true` if the group has a new member.
fn add_alternate(factory: &mut Factory, group: GroupId, expr: MemoExpr) -> Result<bool, OptimizerError> {
    let before = factory.memo().group(group).num_exprs();
    let result = factory.construct_in_group(expr, group)?;
    Ok(result == group && factory.memo().group(group).num_exprs() > before)
}

/// `InnerJoin(l, r, f)` => `InnerJoin(r, l, f)`.
#[derive(Debug)]
pub struct JoinCommutativity;

impl ExplorationRule for JoinCommutativity {
    fn name(&self) -> &'static str {
        "JoinCommutativity"
    }

    fn operators(&self) -> &'static [Operator] {
        &[Operator::InnerJoin]
    }

    fn explore(&self, factory: &mut Factory, group: GroupId, expr: &MemoExpr) -> Result<usize, OptimizerError> {
        let join = match expr.as_join() {
            Some(join) => join,
            None => return Ok(0),
        };
        let swapped = join_expr(Operator::InnerJoin, join.right, join.left, join.filter);
        Ok(add_alternate(factory, group, swapped)? as usize)
    }
}

/// `InnerJoin(InnerJoin(r, s, f1), t, f2)` => `InnerJoin(InnerJoin(r, t, f_rt), s, f_s)`.
///
/// Conjuncts of `f1` and `f2` that reference columns of `s` form `f_s`, the remaining conjuncts form `f_rt`.
/// The rule does not produce cross joins: it is not applied when `f_rt` is empty.
/// Every inner join member of the group of the left input is considered.
#[derive(Debug)]
pub struct JoinAssociativity;

impl ExplorationRule for JoinAssociativity {
    fn name(&self) -> &'static str {
        "JoinAssociativity"
    }

    fn operators(&self) -> &'static [Operator] {
        &[Operator::InnerJoin]
    }

    fn explore(&self, factory: &mut Factory, group: GroupId, expr: &MemoExpr) -> Result<usize, OptimizerError> {
        let upper = match expr.as_join() {
            Some(join) => join,
            None => return Ok(0),
        };
        let lower_joins: Vec<_> = factory
            .memo()
            .group_exprs(upper.left)
            .into_iter()
            .filter(|e| e.op() == Operator::InnerJoin)
            .filter_map(|e| e.as_join())
            .collect();

        let mut added = 0;
        for lower in lower_joins {
            let memo = factory.memo();
            let s_cols = memo.props(lower.right).output_cols();
            let mut conjuncts = memo.conjuncts(lower.filter);
            conjuncts.extend(memo.conjuncts(upper.filter));

            let (s_part, rt_part): (Vec<GroupId>, Vec<GroupId>) =
                conjuncts.into_iter().partition(|c| memo.props(*c).unbound_cols().intersects(s_cols));
            if rt_part.is_empty() {
                continue;
            }

            let rt_filter = factory.construct_filters(&rt_part)?;
            let rt = factory.construct_inner_join(lower.left, upper.right, rt_filter)?;
            let s_filter = factory.construct_filters(&s_part)?;
            let alternate = join_expr(Operator::InnerJoin, rt, lower.right, s_filter);
            if add_alternate(factory, group, alternate)? {
                added += 1;
            }
        }
        Ok(added)
    }
}
