use std::rc::Rc;
use std::sync::{Arc, Once};

use crate::catalog::mutable::MutableCatalog;
use crate::catalog::{Catalog, TableBuilder, DEFAULT_SCHEMA};
use crate::cost::simple::SimpleCoster;
use crate::datatypes::{DataType, ScalarValue};
use crate::explorer::rules::ExplorationRules;
use crate::factory::rules::NormalizationRules;
use crate::factory::Factory;
use crate::memo::expr::GroupId;
use crate::memo::Memo;
use crate::meta::{ColumnId, Metadata, TableId};
use crate::optimizer::Expr;
use crate::optimizer::Optimizer;
use crate::properties::ordering::Ordering;
use crate::properties::physical::PhysicalProps;
use crate::properties::provider::DefaultPhysicalPropsProvider;

static INIT_LOG: Once = Once::new();

pub fn init_logger() {
    INIT_LOG.call_once(pretty_env_logger::init);
}

/// Provides a test setup: a catalog with a few tables and a memo built on top of it.
///
/// Tables:
/// * `a(x Int32 NOT NULL, y Int32, c Int32)` primary key `x`.
/// * `b(x Int32 NOT NULL, y Int32)` primary key `x`.
/// * `r(a Int32 NOT NULL, b Int32)` primary key `a`, 100 rows.
/// * `s(a Int32, b Int32)`, `t(a Int32, b Int32)`.
pub struct TestContext {
    catalog: Arc<MutableCatalog>,
    memo: Memo,
    rules: Rc<NormalizationRules>,
}

impl TestContext {
    pub fn new() -> Self {
        TestContext::with_rules(NormalizationRules::default())
    }

    /// Creates a test context that uses the given normalization rules.
    pub fn with_rules(rules: NormalizationRules) -> Self {
        init_logger();

        let catalog = Arc::new(MutableCatalog::new());
        let tables = vec![
            TableBuilder::new("a")
                .add_not_null_column("x", DataType::Int32)
                .add_column("y", DataType::Int32)
                .add_column("c", DataType::Int32)
                .primary_key(&["x"]),
            TableBuilder::new("b")
                .add_not_null_column("x", DataType::Int32)
                .add_column("y", DataType::Int32)
                .primary_key(&["x"]),
            TableBuilder::new("r")
                .add_not_null_column("a", DataType::Int32)
                .add_column("b", DataType::Int32)
                .primary_key(&["a"])
                .add_row_count(100),
            TableBuilder::new("s").add_column("a", DataType::Int32).add_column("b", DataType::Int32),
            TableBuilder::new("t").add_column("a", DataType::Int32).add_column("b", DataType::Int32),
        ];
        for table in tables {
            let table = table.build().expect("Invalid test table");
            catalog.add_table(DEFAULT_SCHEMA, table).expect("Failed to add a test table");
        }

        TestContext {
            catalog,
            memo: Memo::new(Metadata::new()),
            rules: Rc::new(rules),
        }
    }

    pub fn memo(&self) -> &Memo {
        &self.memo
    }

    pub fn memo_mut(&mut self) -> &mut Memo {
        &mut self.memo
    }

    pub fn rules(&self) -> &NormalizationRules {
        &self.rules
    }

    pub fn factory(&mut self) -> Factory<'_> {
        Factory::new(&mut self.memo, &self.rules)
    }

    /// Adds a reference to the given table and constructs a scan of it. The table is aliased by its name.
    pub fn scan(&mut self, table: &str) -> GroupId {
        self.scan_as(table, table)
    }

    /// Adds a reference to the given table under the given alias and constructs a scan of it.
    pub fn scan_as(&mut self, table: &str, alias: &str) -> GroupId {
        let table_ref = self.catalog.get_table(table).unwrap_or_else(|| panic!("Unknown table: {}", table));
        let table = self.memo.metadata_mut().add_table(table_ref, Some(alias));
        self.factory().construct_scan(table).expect("Failed to construct a scan")
    }

    /// Returns the column `name` of the latest table reference with the given alias.
    pub fn col(&self, alias: &str, name: &str) -> ColumnId {
        let metadata = self.memo.metadata();
        let table = self.table(alias);
        metadata
            .find_column(table, name)
            .unwrap_or_else(|| panic!("Unknown column: {}.{}", alias, name))
    }

    /// Returns the latest table reference with the given alias.
    pub fn table(&self, alias: &str) -> TableId {
        self.memo
            .metadata()
            .tables()
            .filter(|t| t.alias() == alias)
            .last()
            .map(|t| t.id())
            .unwrap_or_else(|| panic!("Unknown table reference: {}", alias))
    }

    pub fn var(&mut self, col: ColumnId) -> GroupId {
        self.factory().construct_variable(col).unwrap()
    }

    pub fn int(&mut self, value: i32) -> GroupId {
        self.factory().construct_const(ScalarValue::Int32(value)).unwrap()
    }

    /// `l = r`
    pub fn eq_columns(&mut self, l: ColumnId, r: ColumnId) -> GroupId {
        let l = self.var(l);
        let r = self.var(r);
        self.factory().construct_eq(l, r).unwrap()
    }

    /// `alias.col > value`
    pub fn gt_const(&mut self, alias: &str, col: &str, value: i32) -> GroupId {
        let col = self.col(alias, col);
        let l = self.var(col);
        let r = self.int(value);
        self.factory().construct_gt(l, r).unwrap()
    }

    /// A projection of the given columns of the input.
    pub fn project(&mut self, input: GroupId, cols: &[ColumnId]) -> GroupId {
        let items: Vec<_> = cols.iter().map(|c| self.var(*c)).collect();
        let mut factory = self.factory();
        let projections = factory.construct_projections(&items, cols.to_vec()).unwrap();
        factory.construct_project(input, projections).unwrap()
    }

    /// Properties that require rows ordered by the given columns in ascending order.
    pub fn ordering(&self, cols: &[ColumnId]) -> PhysicalProps {
        PhysicalProps::with_ordering(Ordering::from_columns(cols.to_vec()))
    }

    /// An optimizer with the default rules, [SimpleCoster] and [DefaultPhysicalPropsProvider].
    pub fn optimizer(&self) -> Optimizer {
        Optimizer::new(
            self.rules.clone(),
            Rc::new(ExplorationRules::default()),
            Rc::new(SimpleCoster::new()),
            Rc::new(DefaultPhysicalPropsProvider),
        )
    }

    pub fn optimize(&mut self, group: GroupId, required: PhysicalProps) -> Expr {
        let optimizer = self.optimizer();
        optimizer.optimize(&mut self.memo, group, required).expect("Failed to optimize an expression")
    }
}
