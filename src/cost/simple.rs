use crate::cost::{Cost, Coster};
use crate::memo::expr::MemoExpr;
use crate::memo::Memo;
use crate::operators::Operator;
use crate::properties::physical::PhysicalProps;

/// Constants used by [SimpleCoster].
#[derive(Debug, Clone, PartialEq)]
pub struct CostConstants {
    /// The number of rows of a table without statistics.
    pub default_row_count: f64,
    /// The cost of reading a single row of a table.
    pub scan_row: f64,
    /// The cost of producing a single row of a `Values` operator.
    pub values_row: f64,
    pub select: f64,
    pub project: f64,
    pub group_by: f64,
    pub join: f64,
    /// Applies reevaluate their right input for every row of the left input.
    pub apply: f64,
    pub set_op: f64,
    /// The fixed cost of a sort enforcer.
    pub sort: f64,
    /// The fixed cost of an arrange enforcer.
    pub arrange: f64,
}

impl Default for CostConstants {
    fn default() -> Self {
        CostConstants {
            default_row_count: 1000.0,
            scan_row: 1.0,
            values_row: 0.1,
            select: 10.0,
            project: 1.0,
            group_by: 50.0,
            join: 100.0,
            apply: 1000.0,
            set_op: 50.0,
            sort: 500.0,
            arrange: 5.0,
        }
    }
}

/// A simple [coster](Coster): the sum of the costs of the inputs plus a constant per operator.
/// Scans cost a per-row constant times the number of rows of the table.
/// Scalar expressions cost nothing on their own.
#[derive(Debug, Default)]
pub struct SimpleCoster {
    constants: CostConstants,
}

impl SimpleCoster {
    pub fn new() -> Self {
        SimpleCoster::default()
    }

    pub fn with_constants(constants: CostConstants) -> Self {
        SimpleCoster { constants }
    }

    pub fn constants(&self) -> &CostConstants {
        &self.constants
    }

    fn scan_cost(&self, memo: &Memo, expr: &MemoExpr) -> f64 {
        let row_count = memo
            .private(expr.private_field(0))
            .as_table()
            .and_then(|t| memo.metadata().table(t).table().statistics().and_then(|s| s.row_count()))
            .map(|r| r as f64)
            .unwrap_or(self.constants.default_row_count);
        row_count * self.constants.scan_row
    }
}

impl Coster for SimpleCoster {
    fn cost(&self, memo: &Memo, expr: &MemoExpr, inputs: &[Cost]) -> Cost {
        let c = &self.constants;
        let own = match expr.op() {
            Operator::Scan => self.scan_cost(memo, expr),
            Operator::Values => expr.child_count() as f64 * c.values_row,
            Operator::Select => c.select,
            Operator::Project => c.project,
            Operator::GroupBy => c.group_by,
            op if op.is_apply() => c.apply,
            op if op.is_join() => c.join,
            op if op.is_set_op() => c.set_op,
            _ => 0.0,
        };
        inputs.iter().fold(Cost::from(own), |acc, cost| acc + *cost)
    }

    fn enforcer_cost(&self, _memo: &Memo, op: Operator, _required: &PhysicalProps, input: Cost) -> Cost {
        match op {
            Operator::Sort => input + self.constants.sort,
            Operator::Arrange => input + self.constants.arrange,
            _ => input,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::TestContext;

    #[test]
    fn test_scan_cost_uses_row_count() {
        let mut ctx = TestContext::new();
        let r = ctx.scan("r");
        let a = ctx.scan("a");
        let memo = ctx.memo();
        let coster = SimpleCoster::new();

        // r has 100 rows, a has no statistics.
        assert_eq!(coster.cost(memo, &memo.normal_expr(r), &[]), Cost::from(100.0));
        assert_eq!(coster.cost(memo, &memo.normal_expr(a), &[]), Cost::from(1000.0));
    }

    #[test]
    fn test_cost_is_sum_of_inputs() {
        let mut ctx = TestContext::new();
        let a = ctx.scan("a");
        let filter = ctx.gt_const("a", "y", 0);
        let select = ctx.factory().construct_select(a, filter).unwrap();
        let memo = ctx.memo();
        let coster = SimpleCoster::new();

        let expr = memo.normal_expr(select);
        let cost = coster.cost(memo, &expr, &[Cost::from(1000.0), Cost::from(0.0)]);
        assert_eq!(cost, Cost::from(1010.0));

        let sort = coster.enforcer_cost(memo, Operator::Sort, &PhysicalProps::none(), cost);
        assert_eq!(sort, Cost::from(1510.0));
    }
}
