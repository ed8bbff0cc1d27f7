//! Cost-based search.
//!
//! The optimizer walks a memo top-down starting from the root group. For every (group, required properties)
//! pair it costs the members of the group that can provide the required properties, keeps the cheapest one as
//! the best expression of that pair and adds [enforcers](Operator::is_enforcer) when required properties can
//! not be provided by the members of the group. Every top-level call to [optimize](Optimizer::optimize)
//! starts a new major pass. Each iteration of the loop over the members of a group starts a new minor pass.

use std::collections::HashSet;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

use log::{debug, trace};

use crate::cost::{Cost, Coster};
use crate::error::OptimizerError;
use crate::explorer::{ExplorationRules, Explorer};
use crate::factory::NormalizationRules;
use crate::memo::expr::{GroupId, MemoExpr};
use crate::memo::group::{BestExpr, OptimizePass, OptimizeState};
use crate::memo::Memo;
use crate::operators::Operator;
use crate::properties::physical::{PhysicalProps, PhysicalPropsId};
use crate::properties::provider::PhysicalPropsProvider;
use crate::util::BitSet;

mod expr;

pub use expr::{format_plan, Expr};

/// Options of the [optimizer](Optimizer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizerOptions {
    explore: bool,
    max_steps: Option<usize>,
    max_passes: usize,
}

impl OptimizerOptions {
    /// Enables or disables exploration. When exploration is disabled only normal forms are costed.
    pub fn with_explore(mut self, explore: bool) -> Self {
        self.explore = explore;
        self
    }

    /// Sets the maximum number of exploration rule applications per call to [optimize](Optimizer::optimize).
    pub fn with_max_steps(mut self, max_steps: Option<usize>) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Sets the maximum number of major passes per call to [optimize](Optimizer::optimize).
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes.max(1);
        self
    }

    pub fn explore(&self) -> bool {
        self.explore
    }

    pub fn max_steps(&self) -> Option<usize> {
        self.max_steps
    }

    pub fn max_passes(&self) -> usize {
        self.max_passes
    }
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        OptimizerOptions {
            explore: true,
            max_steps: None,
            max_passes: 64,
        }
    }
}

/// Counters collected by a call to [optimize](Optimizer::optimize).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizerStats {
    /// The number of major passes.
    pub passes: usize,
    /// The number of expressions whose cost has been computed.
    pub costed_exprs: usize,
    /// The number of times a best expression has been replaced by a cheaper one.
    pub ratchets: usize,
    /// The number of enforcers that became best expressions.
    pub enforcers: usize,
    /// The number of exploration rule applications.
    pub explore_steps: usize,
    /// The number of expressions added by exploration.
    pub alternates: usize,
}

/// Cost-based optimizer.
pub struct Optimizer {
    normalization: Rc<NormalizationRules>,
    exploration: Rc<ExplorationRules>,
    coster: Rc<dyn Coster>,
    provider: Rc<dyn PhysicalPropsProvider>,
    options: OptimizerOptions,
}

impl Optimizer {
    /// Creates a new instance of `Optimizer`.
    pub fn new(
        normalization: Rc<NormalizationRules>,
        exploration: Rc<ExplorationRules>,
        coster: Rc<dyn Coster>,
        provider: Rc<dyn PhysicalPropsProvider>,
    ) -> Self {
        Optimizer {
            normalization,
            exploration,
            coster,
            provider,
            options: OptimizerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: OptimizerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &OptimizerOptions {
        &self.options
    }

    /// Finds the cheapest plan of the given group that provides the `required` physical properties.
    pub fn optimize(&self, memo: &mut Memo, root: GroupId, required: PhysicalProps) -> Result<Expr, OptimizerError> {
        self.optimize_with_stats(memo, root, required).map(|(expr, _)| expr)
    }

    /// The same as [optimize](Self::optimize) but also returns counters collected during the search.
    pub fn optimize_with_stats(
        &self,
        memo: &mut Memo,
        root: GroupId,
        required: PhysicalProps,
    ) -> Result<(Expr, OptimizerStats), OptimizerError> {
        memo.get_group(root)?;
        if memo.props(root).relational().is_none() {
            return Err(OptimizerError::argument(format!("Group {} is not a relational expression", root)));
        }
        debug!("Optimizing group {} required: {}", root, required);

        let required = memo.intern_physical_props(required);
        let explorer =
            Explorer::new(self.exploration.as_ref(), self.normalization.as_ref()).with_max_steps(self.options.max_steps);
        let mut search = Search {
            memo,
            explorer,
            coster: self.coster.as_ref(),
            provider: self.provider.as_ref(),
            explore: self.options.explore,
            in_progress: HashSet::new(),
            stats: OptimizerStats::default(),
        };

        for _ in 0..self.options.max_passes {
            let pass = search.memo.pass().next_major();
            search.memo.set_pass(pass);
            search.stats.passes += 1;

            let ratchets = search.stats.ratchets;
            let alternates = search.explorer.alternates();
            let fully_optimized = search.optimize_group(root, required, Cost::from(f64::INFINITY))?;
            debug!(
                "Pass {} completed. Fully optimized: {}. Ratchets: {} Alternates: {}",
                pass,
                fully_optimized,
                search.stats.ratchets - ratchets,
                search.explorer.alternates() - alternates
            );
            if fully_optimized || (ratchets == search.stats.ratchets && alternates == search.explorer.alternates()) {
                break;
            }
        }

        search.stats.explore_steps = search.explorer.steps();
        search.stats.alternates = search.explorer.alternates();
        let stats = search.stats;
        let memo = search.memo;

        let best = memo.group(root).best_expr(required).ok_or_else(|| {
            OptimizerError::internal(format!("No plan has been found for group {} required: {}", root, required))
        })?;
        let expr = Expr::new(root, best.op, best.offset, required);

        debug!("Final memo:\n{}", memo);
        debug!("Stats: {:?}", stats);
        Ok((expr, stats))
    }
}

impl Debug for Optimizer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Optimizer")
            .field("normalization", self.normalization.as_ref())
            .field("exploration", self.exploration.as_ref())
            .field("coster", &self.coster)
            .field("provider", &self.provider)
            .field("options", &self.options)
            .finish()
    }
}

/// A candidate for the best expression of a group.
struct Candidate {
    cost: Cost,
    child_required: Vec<PhysicalPropsId>,
    fully_optimized_children: BitSet,
}

/// The result of costing a member of a group.
enum Costed {
    Candidate(Candidate),
    /// The expression exceeded the budget or one of its children has no plan.
    Abandoned,
    /// The expression can never become a best expression.
    Pruned,
}

struct Search<'m, 'r> {
    memo: &'m mut Memo,
    explorer: Explorer<'r>,
    coster: &'r dyn Coster,
    provider: &'r dyn PhysicalPropsProvider,
    explore: bool,
    in_progress: HashSet<(GroupId, PhysicalPropsId)>,
    stats: OptimizerStats,
}

impl<'m, 'r> Search<'m, 'r> {
    /// Optimizes the given group for the given required properties.
    /// Returns `true` if the group is fully optimized: its best expression will not change in the future.
    fn optimize_group(
        &mut self,
        group: GroupId,
        required: PhysicalPropsId,
        max_cost: Cost,
    ) -> Result<bool, OptimizerError> {
        let mut pass = self.memo.pass();
        let state = self.memo.group_mut(group).state_mut(required);
        if state.is_fully_optimized() {
            return Ok(true);
        }
        if state.pass >= pass && max_cost <= state.max_cost {
            return Ok(false);
        }
        if !self.in_progress.insert((group, required)) {
            return Ok(false);
        }
        state.pass = pass;
        state.max_cost = max_cost;

        let result = self.optimize_group_members(group, required, max_cost, &mut pass);
        self.in_progress.remove(&(group, required));
        result
    }

    fn optimize_group_members(
        &mut self,
        group: GroupId,
        required: PhysicalPropsId,
        max_cost: Cost,
        pass: &mut OptimizePass,
    ) -> Result<bool, OptimizerError> {
        let required_props = self.memo.physical_props(required).clone();

        loop {
            let mut improved = false;
            let mut fully_optimized = true;
            let num_exprs = self.memo.group(group).num_exprs();

            for i in 0..num_exprs {
                if self.memo.group(group).optimize[&required].fully_optimized.contains(i) {
                    continue;
                }
                let offset = self.memo.group(group).exprs()[i];
                let expr = self.memo.expr(offset);
                if !self.provider.can_provide(self.memo, &expr, &required_props) {
                    self.state_mut(group, required).fully_optimized.insert(i);
                    continue;
                }

                let (costed, expr_fully_optimized) = self.optimize_expr(group, &expr, &required_props, required, max_cost)?;
                if expr_fully_optimized || matches!(costed, Costed::Pruned) {
                    self.state_mut(group, required).fully_optimized.insert(i);
                } else {
                    fully_optimized = false;
                }
                if let Costed::Candidate(candidate) = costed {
                    let provided = self.provider.provided(self.memo, &expr, &required_props);
                    let best = BestExpr {
                        op: expr.op(),
                        offset: Some(offset),
                        provided: self.memo.intern_physical_props(provided),
                        inner: None,
                        child_required: candidate.child_required,
                        cost: candidate.cost,
                        pass: *pass,
                        fully_optimized_children: candidate.fully_optimized_children,
                    };
                    improved |= self.ratchet_best(group, required, best);
                }
            }

            if !required_props.is_empty() {
                let (enforced, enforcer_fully_optimized) = self.enforce_props(group, required, &required_props, max_cost)?;
                improved |= enforced;
                fully_optimized &= enforcer_fully_optimized;
            }
            if improved {
                self.recompute_enforcer_costs(group)?;
            }
            if self.explore && !self.explorer.explore_group(self.memo, group, *pass)? {
                fully_optimized = false;
            }

            let new_members = self.memo.group(group).num_exprs() > num_exprs;
            if fully_optimized && !new_members {
                trace!("Group {} required {} has been fully optimized", group, required);
                self.state_mut(group, required).pass = OptimizePass::FULLY_OPTIMIZED;
                return Ok(true);
            }
            if !improved && !new_members {
                return Ok(false);
            }
            // child groups may have advanced the session pass past the local one.
            *pass = self.memo.pass().max(*pass).next_minor();
            self.memo.set_pass(*pass);
            self.state_mut(group, required).pass = *pass;
        }
    }

    /// Optimizes the children of the given expression and computes its cost.
    /// Returns the result and whether the cost of the expression will not change in the future.
    fn optimize_expr(
        &mut self,
        group: GroupId,
        expr: &MemoExpr,
        required_props: &PhysicalProps,
        required: PhysicalPropsId,
        max_cost: Cost,
    ) -> Result<(Costed, bool), OptimizerError> {
        let best_cost = self.memo.group(group).best_expr(required).map(|b| b.cost);
        let bound = match best_cost {
            Some(best) if best < max_cost => best,
            _ => max_cost,
        };

        let children = expr.children(self.memo);
        let mut inputs = Vec::with_capacity(children.len());
        let mut child_required = Vec::with_capacity(children.len());
        let mut fully_optimized_children = BitSet::new();
        let mut total = Cost::from(0.0);

        for (i, child) in children.iter().enumerate() {
            let child_props = self.provider.child_required(self.memo, expr, required_props, i);
            let child_props = self.memo.intern_physical_props(child_props);
            let child_fully_optimized = self.optimize_group(*child, child_props, bound - total)?;
            if child_fully_optimized {
                fully_optimized_children.insert(i);
            }
            let all_fully_optimized = fully_optimized_children.len() == i + 1;

            let cost = match self.memo.group(*child).best_expr(child_props) {
                Some(best) => best.cost,
                None => return Ok((Costed::Abandoned, false)),
            };
            total += cost;
            inputs.push(cost);
            child_required.push(child_props);

            if matches!(best_cost, Some(best) if total >= best) && all_fully_optimized {
                return Ok((Costed::Pruned, true));
            }
            if total > bound {
                return Ok((Costed::Abandoned, false));
            }
        }

        let cost = self.coster.cost(self.memo, expr, &inputs);
        self.stats.costed_exprs += 1;
        let fully_optimized = fully_optimized_children.len() == children.len();
        if cost > max_cost {
            return Ok((Costed::Abandoned, false));
        }
        let candidate = Candidate {
            cost,
            child_required,
            fully_optimized_children,
        };
        Ok((Costed::Candidate(candidate), fully_optimized))
    }

    /// Tries to provide the required properties by an enforcer. A projection is enforced by [Arrange](Operator::Arrange)
    /// on top of a plan that provides the remaining properties, an ordering is enforced by [Sort](Operator::Sort).
    /// An existing best expression that provides a superset of the required properties is reused as is.
    fn enforce_props(
        &mut self,
        group: GroupId,
        required: PhysicalPropsId,
        required_props: &PhysicalProps,
        max_cost: Cost,
    ) -> Result<(bool, bool), OptimizerError> {
        let mut improved = false;

        let aliases: Vec<BestExpr> = self
            .memo
            .group(group)
            .best_exprs()
            .filter(|(props, best)| *props != required && !best.is_enforcer())
            .filter(|(_, best)| self.memo.physical_props(best.provided).provides(required_props))
            .map(|(_, best)| best.clone())
            .collect();
        for alias in aliases {
            improved |= self.ratchet_best(group, required, alias);
        }

        let (op, inner_props) = if required_props.projection().is_some() {
            (Operator::Arrange, required_props.without_projection())
        } else {
            (Operator::Sort, required_props.without_ordering())
        };
        let inner = self.memo.intern_physical_props(inner_props);
        let inner_fully_optimized = self.optimize_group(group, inner, max_cost)?;

        let inner_cost = match self.memo.group(group).best_expr(inner) {
            Some(best) => best.cost,
            None if inner == PhysicalPropsId::NONE && inner_fully_optimized => {
                return Err(OptimizerError::internal(format!("No plan provides empty properties. Group {}", group)))
            }
            None => return Ok((improved, false)),
        };
        let cost = self.coster.enforcer_cost(self.memo, op, required_props, inner_cost);
        if cost <= max_cost {
            let best = BestExpr {
                op,
                offset: None,
                provided: required,
                inner: Some(inner),
                child_required: Vec::new(),
                cost,
                pass: self.memo.pass(),
                fully_optimized_children: BitSet::new(),
            };
            if self.ratchet_best(group, required, best) {
                debug!("Enforcer {} in group {} required: {} cost: {}", op, group, required_props, cost);
                self.stats.enforcers += 1;
                improved = true;
            }
        }
        Ok((improved, inner_fully_optimized))
    }

    /// Recomputes the costs of enforcers when the best expressions they enforce properties on have become cheaper.
    fn recompute_enforcer_costs(&mut self, group: GroupId) -> Result<(), OptimizerError> {
        let mut enforcers: Vec<(PhysicalPropsId, BestExpr)> = self
            .memo
            .group(group)
            .best_exprs()
            .filter(|(_, best)| best.is_enforcer())
            .map(|(props, best)| (props, best.clone()))
            .collect();
        // inner properties have fewer requirements than the properties of their enforcers.
        enforcers.sort_by_key(|(props, _)| {
            let props = self.memo.physical_props(*props);
            props.ordering().is_some() as usize + props.projection().is_some() as usize
        });

        for (props, enforcer) in enforcers {
            let inner = enforcer
                .inner
                .ok_or_else(|| OptimizerError::internal(format!("Enforcer without input in group {}", group)))?;
            let inner_cost = match self.memo.group(group).best_expr(inner) {
                Some(best) => best.cost,
                None => continue,
            };
            let required_props = self.memo.physical_props(props).clone();
            let cost = self.coster.enforcer_cost(self.memo, enforcer.op, &required_props, inner_cost);
            if cost < enforcer.cost {
                let best = BestExpr {
                    cost,
                    pass: self.memo.pass(),
                    ..enforcer
                };
                self.ratchet_best(group, props, best);
            }
        }
        Ok(())
    }

    /// Replaces the best expression of the given group if the candidate is cheaper.
    fn ratchet_best(&mut self, group: GroupId, required: PhysicalPropsId, candidate: BestExpr) -> bool {
        let state = self.state_mut(group, required);
        let better = match state.best.as_ref() {
            Some(best) => candidate.cost < best.cost,
            None => true,
        };
        if better {
            trace!("Best expression of group {} required {}: {} cost: {}", group, required, candidate.op, candidate.cost);
            state.best = Some(candidate);
            self.stats.ratchets += 1;
        }
        better
    }

    fn state_mut(&mut self, group: GroupId, required: PhysicalPropsId) -> &mut OptimizeState {
        self.memo.group_mut(group).state_mut(required)
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;

    use super::*;
    use crate::cost::simple::SimpleCoster;
    use crate::properties::provider::DefaultPhysicalPropsProvider;
    use crate::testing::TestContext;

    fn optimizer() -> Optimizer {
        optimizer_with_coster(Rc::new(SimpleCoster::new()))
    }

    fn optimizer_with_coster(coster: Rc<dyn Coster>) -> Optimizer {
        Optimizer::new(
            Rc::new(NormalizationRules::default()),
            Rc::new(ExplorationRules::default()),
            coster,
            Rc::new(DefaultPhysicalPropsProvider),
        )
    }

    /// Records the pass of the memo every time an expression is costed.
    #[derive(Debug, Default)]
    struct PassRecorder {
        inner: SimpleCoster,
        passes: RefCell<Vec<OptimizePass>>,
    }

    impl Coster for PassRecorder {
        fn cost(&self, memo: &Memo, expr: &MemoExpr, inputs: &[Cost]) -> Cost {
            self.passes.borrow_mut().push(memo.pass());
            self.inner.cost(memo, expr, inputs)
        }

        fn enforcer_cost(&self, memo: &Memo, op: Operator, required: &PhysicalProps, input: Cost) -> Cost {
            self.passes.borrow_mut().push(memo.pass());
            self.inner.enforcer_cost(memo, op, required, input)
        }
    }

    #[test]
    fn test_options() {
        let options = OptimizerOptions::default();
        assert!(options.explore());
        assert_eq!(options.max_steps(), None);
        assert_eq!(options.max_passes(), 64);

        let options = options.with_explore(false).with_max_steps(Some(10)).with_max_passes(0);
        assert!(!options.explore());
        assert_eq!(options.max_steps(), Some(10));
        assert_eq!(options.max_passes(), 1);
    }

    #[test]
    fn test_reject_scalar_root() {
        let mut ctx = TestContext::new();
        let one = ctx.int(1);
        let err = optimizer().optimize(ctx.memo_mut(), one, PhysicalProps::none()).unwrap_err();
        assert!(matches!(err, OptimizerError::Argument(_)), "{}", err);
    }

    #[test]
    fn test_passes_advance() {
        let mut ctx = TestContext::new();
        let a = ctx.scan("a");
        let optimizer = optimizer();

        optimizer.optimize(ctx.memo_mut(), a, PhysicalProps::none()).unwrap();
        let first = ctx.memo().pass();
        optimizer.optimize(ctx.memo_mut(), a, PhysicalProps::none()).unwrap();
        assert!(ctx.memo().pass() > first);
        assert_eq!(ctx.memo().pass().major, first.major + 1);
    }

    #[test]
    fn test_minor_passes_never_go_backwards() {
        let mut ctx = TestContext::new();
        let r = ctx.scan("r");
        let s = ctx.scan("s");
        let t = ctx.scan("t");
        let ra = ctx.col("r", "a");
        let sa = ctx.col("s", "a");
        let tb = ctx.col("t", "b");
        let rb = ctx.col("r", "b");
        let p_rs = ctx.eq_columns(ra, sa);
        let rs = ctx.factory().construct_inner_join(r, s, p_rs).unwrap();
        let p_rt = ctx.eq_columns(rb, tb);
        let rst = ctx.factory().construct_inner_join(rs, t, p_rt).unwrap();

        let recorder = Rc::new(PassRecorder::default());
        let optimizer = optimizer_with_coster(recorder.clone());
        let required = ctx.ordering(&[rb]);
        optimizer.optimize(ctx.memo_mut(), rst, PhysicalProps::none()).unwrap();
        optimizer.optimize(ctx.memo_mut(), rst, required).unwrap();

        let passes = recorder.passes.borrow();
        assert!(!passes.is_empty());
        for w in passes.windows(2) {
            assert!(w[0] <= w[1], "pass went backwards: {} -> {}", w[0], w[1]);
        }
        assert!(passes.iter().all(|p| *p <= ctx.memo().pass()));
    }

    #[test]
    fn test_scan_is_fully_optimized() {
        let mut ctx = TestContext::new();
        let a = ctx.scan("a");
        let (expr, stats) = optimizer().optimize_with_stats(ctx.memo_mut(), a, PhysicalProps::none()).unwrap();

        assert_eq!(expr.op(), Operator::Scan);
        assert_eq!(stats.passes, 1);
        assert_eq!(stats.enforcers, 0);
        let state = ctx.memo().group(a).optimize_state(PhysicalPropsId::NONE).unwrap();
        assert!(state.is_fully_optimized());
    }
}
