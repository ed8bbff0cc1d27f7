//! Normalization rules.
//!
//! A normalization rule rewrites an expression into an equivalent expression that is "more canonical".
//! The factory evaluates the rules of an operator in the order they are declared in [NormalizationRules]
//! and the first rule that produces a result wins.

use std::fmt::{Debug, Formatter};

use crate::error::OptimizerError;
use crate::factory::Factory;
use crate::memo::expr::{FieldValue, GroupId, MemoExpr};
use crate::memo::Memo;
use crate::operators::Operator;

mod relational;
mod scalar;

pub use relational::*;
pub use scalar::*;

/// A normalization rule.
pub trait NormalizationRule {
    /// The name of this rule.
    fn name(&self) -> &'static str;

    /// Operators of expressions this rule applies to.
    fn operators(&self) -> &'static [Operator];

    /// Checks whether this rule can be applied to the given expression.
    /// Children of the expression are in normal form.
    fn matches(&self, memo: &Memo, expr: &MemoExpr) -> bool;

    /// Tries to apply this rule to the given expression. New expressions must be created via the given factory.
    /// If this rule can not be applied to the given expression this method must return `Ok(None)`.
    fn apply(&self, factory: &mut Factory, expr: &MemoExpr) -> Result<Option<RuleResult>, OptimizerError>;
}

impl Debug for dyn NormalizationRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizationRule")
            .field("name", &self.name())
            .field("operators", &self.operators())
            .finish()
    }
}

/// A result of a rule application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleResult {
    /// An equivalent expression. It is constructed via the factory so it is normalized as well.
    Substitute(MemoExpr),
    /// An existing group the expression is equivalent to.
    Group(GroupId),
}

/// An ordered set of normalization rules.
pub struct NormalizationRules {
    rules: Vec<Box<dyn NormalizationRule>>,
    // rules of an operator: indexed by operator tag.
    by_operator: Vec<Vec<usize>>,
}

impl NormalizationRules {
    /// Creates a rule set. Rules of the same operator are evaluated in the order they appear in `rules`.
    pub fn new(rules: Vec<Box<dyn NormalizationRule>>) -> Self {
        let mut by_operator = vec![Vec::new(); Operator::COUNT + 1];
        for (i, rule) in rules.iter().enumerate() {
            for op in rule.operators() {
                by_operator[op.tag() as usize].push(i);
            }
        }
        NormalizationRules { rules, by_operator }
    }

    /// Creates an empty rule set. The factory interns expressions as they are.
    pub fn empty() -> Self {
        NormalizationRules::new(Vec::new())
    }

    /// Returns a copy of this rule set without the rule with the given name.
    pub fn without_rule(self, name: &str) -> Self {
        let rules = self.rules.into_iter().filter(|r| r.name() != name).collect();
        NormalizationRules::new(rules)
    }

    /// Returns rules of the given operator in evaluation order.
    pub fn rules_for(&self, op: Operator) -> impl Iterator<Item = &dyn NormalizationRule> + '_ {
        self.by_operator[op.tag() as usize].iter().map(move |i| self.rules[*i].as_ref())
    }

    /// Names of the rules.
    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }
}

impl Default for NormalizationRules {
    fn default() -> Self {
        NormalizationRules::new(vec![
            // scalar
            Box::new(CommuteOperands),
            Box::new(VariableFirst),
            Box::new(FoldComparison),
            Box::new(FoldAnd),
            Box::new(FoldOr),
            Box::new(FoldNot),
            Box::new(FoldArithmetic),
            Box::new(FlattenAnd),
            Box::new(NormalizeFilters),
            // relational
            Box::new(WrapFilter),
            Box::new(EliminateEmptySelect),
            Box::new(MergeSelects),
            Box::new(HoistSubquery),
            Box::new(MergeSelectIntoInnerJoin),
            Box::new(EliminateApply),
            Box::new(DecorrelateApply),
            Box::new(InferFilters),
            Box::new(PushDownJoinFilter),
            Box::new(EliminateProject),
            Box::new(MergeProjects),
        ])
    }
}

impl Debug for NormalizationRules {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.rules.iter()).finish()
    }
}

/// Replaces every occurrence of `from` in the scalar expression `group` with `to`.
/// Does not descend into relational expressions and subqueries.
pub(crate) fn replace_subexpr(
    factory: &mut Factory,
    group: GroupId,
    from: GroupId,
    to: GroupId,
) -> Result<GroupId, OptimizerError> {
    if group == from {
        return Ok(to);
    }
    let memo = factory.memo();
    let expr = memo.normal_expr(group);
    if !expr.op().is_scalar() || expr.op() == Operator::Subquery || !memo.props(group).has_subquery() {
        return Ok(group);
    }

    let mut changed = false;
    let mut fields = Vec::new();
    for field in expr.fields() {
        let field = match field {
            FieldValue::Group(g) => {
                let new_group = replace_subexpr(factory, g, from, to)?;
                changed |= new_group != g;
                FieldValue::Group(new_group)
            }
            FieldValue::List(list) => {
                let items = factory.memo().list(list).to_vec();
                let mut new_items = Vec::with_capacity(items.len());
                for item in items {
                    new_items.push(replace_subexpr(factory, item, from, to)?);
                }
                if new_items.iter().eq(factory.memo().list(list).iter()) {
                    FieldValue::List(list)
                } else {
                    changed = true;
                    FieldValue::List(factory.memo_mut().intern_list(&new_items))
                }
            }
            private => private,
        };
        fields.push(field);
    }

    if changed {
        factory.construct(MemoExpr::new(expr.op(), &fields))
    } else {
        Ok(group)
    }
}

/// Returns the first subquery in the given scalar expression.
/// Does not descend into relational expressions and subqueries.
pub(crate) fn find_subquery(memo: &Memo, group: GroupId) -> Option<GroupId> {
    let props = memo.props(group);
    if !props.has_subquery() {
        return None;
    }
    let expr = memo.normal_expr(group);
    match expr.op() {
        Operator::Subquery => Some(group),
        Operator::Exists => None,
        _ => expr
            .children(memo)
            .into_iter()
            .filter(|c| memo.props(*c).scalar().is_some())
            .find_map(|c| find_subquery(memo, c)),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rule_order() {
        let rules = NormalizationRules::default();
        let names: Vec<_> = rules.rules_for(Operator::Select).map(|r| r.name()).collect();
        assert_eq!(
            names,
            vec![
                "WrapFilter",
                "EliminateEmptySelect",
                "MergeSelects",
                "HoistSubquery",
                "MergeSelectIntoInnerJoin",
                "InferFilters"
            ]
        );
        let names: Vec<_> = rules.rules_for(Operator::InnerJoinApply).map(|r| r.name()).collect();
        assert_eq!(names, vec!["WrapFilter", "EliminateApply", "DecorrelateApply"]);
    }

    #[test]
    fn test_without_rule() {
        let rules = NormalizationRules::default().without_rule("CommuteOperands");
        assert!(!rules.names().contains(&"CommuteOperands"));
        let names: Vec<_> = rules.rules_for(Operator::Eq).map(|r| r.name()).collect();
        assert_eq!(names, vec!["VariableFirst", "FoldComparison"]);
    }
}
