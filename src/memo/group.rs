//! Groups of a memo and the search state attached to them.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::cost::Cost;
use crate::memo::expr::{ExprOffset, GroupId};
use crate::operators::Operator;
use crate::properties::logical::LogicalProps;
use crate::properties::physical::PhysicalPropsId;
use crate::util::BitSet;

/// An optimization pass: a `(major, minor)` pair compared lexicographically.
/// The major number identifies a top-level call to the optimizer and the minor number
/// an iteration of the loop over the members of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct OptimizePass {
    pub major: u32,
    pub minor: u32,
}

impl OptimizePass {
    /// Stamp of a group that has been fully optimized. Greater than any other pass.
    pub const FULLY_OPTIMIZED: OptimizePass = OptimizePass {
        major: u32::MAX,
        minor: u32::MAX,
    };

    /// Stamp of a group that has been fully explored.
    pub const FULLY_EXPLORED: OptimizePass = OptimizePass::FULLY_OPTIMIZED;

    pub fn new(major: u32, minor: u32) -> Self {
        OptimizePass { major, minor }
    }

    /// The first minor pass of the next major pass.
    pub fn next_major(&self) -> Self {
        OptimizePass {
            major: self.major + 1,
            minor: 1,
        }
    }

    pub fn next_minor(&self) -> Self {
        OptimizePass {
            major: self.major,
            minor: self.minor + 1,
        }
    }

    pub fn is_final(&self) -> bool {
        *self == OptimizePass::FULLY_OPTIMIZED
    }
}

impl Display for OptimizePass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_final() {
            write!(f, "final")
        } else {
            write!(f, "{}.{}", self.major, self.minor)
        }
    }
}

/// Exploration state of a group.
#[derive(Debug, Clone, Default)]
pub struct ExploreContext {
    /// The pass that explored the group last.
    pub pass: OptimizePass,
    /// Members for which every exploration rule has been exhausted against the current content of their children.
    pub explored: BitSet,
    /// Per member: the total number of members of its child groups when rules were last applied to it.
    /// `None` for members rules have not been applied to yet.
    pub(crate) signatures: Vec<Option<usize>>,
}

impl ExploreContext {
    pub fn is_fully_explored(&self) -> bool {
        self.pass == OptimizePass::FULLY_EXPLORED
    }
}

/// The best expression found so far for a (group, required properties) pair.
#[derive(Debug, Clone)]
pub struct BestExpr {
    /// The operator of the expression. Either an operator of a member of the group or an enforcer.
    pub op: Operator,
    /// The member of the group. `None` for enforcers.
    pub offset: Option<ExprOffset>,
    /// Physical properties provided by the expression. May be a superset of the required properties.
    pub provided: PhysicalPropsId,
    /// For enforcers: the properties required from the enforcer's input (the same group).
    pub inner: Option<PhysicalPropsId>,
    /// Properties required from each child of the expression.
    pub child_required: Vec<PhysicalPropsId>,
    pub cost: Cost,
    /// The pass that last improved this slot.
    pub pass: OptimizePass,
    /// Children that were fully optimized when this expression was costed.
    pub fully_optimized_children: BitSet,
}

impl BestExpr {
    pub fn is_enforcer(&self) -> bool {
        self.offset.is_none()
    }
}

/// Optimization state of a group for one set of required physical properties.
#[derive(Debug, Clone)]
pub struct OptimizeState {
    /// The pass that optimized the group last.
    pub pass: OptimizePass,
    /// The cost budget of the last pass.
    pub max_cost: Cost,
    /// Members that need not be costed again.
    pub fully_optimized: BitSet,
    pub best: Option<BestExpr>,
}

impl OptimizeState {
    pub(crate) fn new() -> Self {
        OptimizeState {
            pass: OptimizePass::default(),
            max_cost: Cost::from(0.0),
            fully_optimized: BitSet::new(),
            best: None,
        }
    }

    pub fn is_fully_optimized(&self) -> bool {
        self.pass.is_final()
    }
}

/// A group of logically equivalent expressions.
#[derive(Debug, Clone)]
pub struct MemoGroup {
    pub(crate) id: GroupId,
    pub(crate) exprs: Vec<ExprOffset>,
    pub(crate) props: LogicalProps,
    pub(crate) explore: ExploreContext,
    pub(crate) optimize: BTreeMap<PhysicalPropsId, OptimizeState>,
}

impl MemoGroup {
    pub(crate) fn new(id: GroupId, props: LogicalProps) -> Self {
        MemoGroup {
            id,
            exprs: Vec::new(),
            props,
            explore: ExploreContext::default(),
            optimize: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Offsets of the members of this group. The normal form is the first member.
    pub fn exprs(&self) -> &[ExprOffset] {
        &self.exprs
    }

    pub fn num_exprs(&self) -> usize {
        self.exprs.len()
    }

    pub fn props(&self) -> &LogicalProps {
        &self.props
    }

    pub fn explore_context(&self) -> &ExploreContext {
        &self.explore
    }

    /// Returns the optimization state of this group for the given required properties.
    pub fn optimize_state(&self, required: PhysicalPropsId) -> Option<&OptimizeState> {
        self.optimize.get(&required)
    }

    /// Returns the best expression of this group for the given required properties.
    pub fn best_expr(&self, required: PhysicalPropsId) -> Option<&BestExpr> {
        self.optimize.get(&required).and_then(|s| s.best.as_ref())
    }

    /// Returns an iterator over (required properties, best expression) pairs.
    pub fn best_exprs(&self) -> impl Iterator<Item = (PhysicalPropsId, &BestExpr)> + '_ {
        self.optimize.iter().filter_map(|(k, s)| s.best.as_ref().map(|b| (*k, b)))
    }

    pub(crate) fn state_mut(&mut self, required: PhysicalPropsId) -> &mut OptimizeState {
        self.optimize.entry(required).or_insert_with(OptimizeState::new)
    }
}
