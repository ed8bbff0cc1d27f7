//! Exploration: adds logically equivalent alternatives to the groups of a memo.
//!
//! Exploration runs as a part of every optimization pass. Each group records the pass that explored it last
//! so that a group shared by several parents is explored once per pass. A member whose rules have been applied
//! against the final content of its child groups is marked as explored. A group becomes fully explored when
//! all its members are explored and no new members have been added to it. Fully explored groups are never
//! explored again.

use log::{debug, trace};

use crate::error::OptimizerError;
use crate::factory::{Factory, NormalizationRules};
use crate::memo::expr::GroupId;
use crate::memo::group::OptimizePass;
use crate::memo::Memo;

pub mod rules;

pub use rules::{ExplorationRule, ExplorationRules};

/// Explores groups of a memo. See the [module docs](self).
#[derive(Debug)]
pub struct Explorer<'a> {
    rules: &'a ExplorationRules,
    normalization: &'a NormalizationRules,
    max_steps: Option<usize>,
    steps: usize,
    alternates: usize,
}

impl<'a> Explorer<'a> {
    pub fn new(rules: &'a ExplorationRules, normalization: &'a NormalizationRules) -> Self {
        Explorer {
            rules,
            normalization,
            max_steps: None,
            steps: 0,
            alternates: 0,
        }
    }

    /// Limits the number of rule applications. When the limit is reached groups are reported as fully explored.
    pub fn with_max_steps(mut self, max_steps: Option<usize>) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// The number of rule applications so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// The number of alternatives added so far.
    pub fn alternates(&self) -> usize {
        self.alternates
    }

    fn exhausted(&self) -> bool {
        matches!(self.max_steps, Some(max) if self.steps >= max)
    }

    /// Explores the given group and its child groups. Returns `true` if the group is fully explored.
    pub fn explore_group(&mut self, memo: &mut Memo, group: GroupId, pass: OptimizePass) -> Result<bool, OptimizerError> {
        let context = &memo.get_group(group)?.explore;
        if context.is_fully_explored() {
            return Ok(true);
        }
        if context.pass == pass {
            return Ok(false);
        }
        if self.exhausted() {
            memo.group_mut(group).explore.pass = OptimizePass::FULLY_EXPLORED;
            return Ok(true);
        }
        memo.group_mut(group).explore.pass = pass;

        let num_exprs = memo.group(group).num_exprs();
        let mut fully_explored = true;

        for i in 0..num_exprs {
            if memo.group(group).explore.explored.contains(i) {
                continue;
            }
            let expr = memo.group_expr(group, i);
            let mut children_explored = true;
            let mut signature = 0;
            for child in expr.children(memo) {
                children_explored &= self.explore_group(memo, child, pass)?;
                signature += memo.group(child).num_exprs();
            }

            let seen = matches!(memo.group(group).explore.signatures.get(i), Some(Some(s)) if *s == signature);
            if !seen && !self.exhausted() {
                let rules = self.rules;
                for rule in rules.rules_for(expr.op()) {
                    let mut factory = Factory::new(memo, self.normalization);
                    let added = rule.explore(&mut factory, group, &expr)?;
                    self.steps += 1;
                    self.alternates += added;
                    if added > 0 {
                        debug!("Rule {} added {} expression(s) to group {}", rule.name(), added, group);
                    }
                }
                let signatures = &mut memo.group_mut(group).explore.signatures;
                if signatures.len() <= i {
                    signatures.resize(i + 1, None);
                }
                signatures[i] = Some(signature);
            }

            if children_explored {
                memo.group_mut(group).explore.explored.insert(i);
            } else {
                fully_explored = false;
            }
        }

        if memo.group(group).num_exprs() > num_exprs {
            fully_explored = false;
        }
        if fully_explored {
            trace!("Group {} has been fully explored", group);
            memo.group_mut(group).explore.pass = OptimizePass::FULLY_EXPLORED;
        }
        Ok(fully_explored)
    }
}
