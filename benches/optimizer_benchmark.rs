use std::rc::Rc;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use relopt::catalog::mutable::MutableCatalog;
use relopt::catalog::{Catalog, TableBuilder, DEFAULT_SCHEMA};
use relopt::cost::simple::SimpleCoster;
use relopt::datatypes::{DataType, ScalarValue};
use relopt::error::OptimizerError;
use relopt::explorer::ExplorationRules;
use relopt::factory::{Factory, NormalizationRules};
use relopt::memo::expr::GroupId;
use relopt::memo::Memo;
use relopt::meta::{ColumnId, Metadata};
use relopt::optimizer::Optimizer;
use relopt::properties::provider::DefaultPhysicalPropsProvider;
use relopt::properties::{Ordering, PhysicalProps};

fn new_catalog() -> Arc<MutableCatalog> {
    let catalog = MutableCatalog::new();
    for (name, rows) in [("A", 100), ("B", 110), ("C", 1000)] {
        let table = TableBuilder::new(name)
            .add_not_null_column("id", DataType::Int32)
            .add_column("a", DataType::Int32)
            .primary_key(&["id"])
            .add_row_count(rows)
            .build()
            .expect("Invalid table");
        catalog.add_table(DEFAULT_SCHEMA, table).expect("Failed to add a table");
    }
    Arc::new(catalog)
}

fn eq(factory: &mut Factory, l: ColumnId, r: ColumnId) -> Result<GroupId, OptimizerError> {
    let l = factory.construct_variable(l)?;
    let r = factory.construct_variable(r)?;
    factory.construct_eq(l, r)
}

/// SELECT * FROM A JOIN B ON A.a = B.a JOIN C ON B.a = C.a WHERE A.id > 100 ORDER BY A.a
fn build_query(catalog: &dyn Catalog, memo: &mut Memo, rules: &NormalizationRules) -> (GroupId, PhysicalProps) {
    let tables: Vec<_> = ["A", "B", "C"]
        .iter()
        .map(|name| {
            let table = catalog.get_table(name).expect("Unknown table");
            memo.metadata_mut().add_table(table, None)
        })
        .collect();
    let metadata = memo.metadata();
    let col = |i: usize, name: &str| metadata.find_column(tables[i], name).expect("Unknown column");
    let (a_id, a_a, b_a, c_a) = (col(0, "id"), col(0, "a"), col(1, "a"), col(2, "a"));

    let mut factory = Factory::new(memo, rules);
    let scans = tables.iter().map(|t| factory.construct_scan(*t)).collect::<Result<Vec<_>, _>>().unwrap();
    let ab = eq(&mut factory, a_a, b_a).unwrap();
    let bc = eq(&mut factory, b_a, c_a).unwrap();

    let join = factory.construct_inner_join(scans[0], scans[1], ab).unwrap();
    let join = factory.construct_inner_join(join, scans[2], bc).unwrap();
    let id = factory.construct_variable(a_id).unwrap();
    let value = factory.construct_const(ScalarValue::Int32(100)).unwrap();
    let filter = factory.construct_gt(id, value).unwrap();
    let select = factory.construct_select(join, filter).unwrap();

    (select, PhysicalProps::with_ordering(Ordering::from_columns(vec![a_a])))
}

fn optimizer_bench(c: &mut Criterion) {
    let catalog = new_catalog();
    let rules = Rc::new(NormalizationRules::default());
    let optimizer = Optimizer::new(
        rules.clone(),
        Rc::new(ExplorationRules::default()),
        Rc::new(SimpleCoster::new()),
        Rc::new(DefaultPhysicalPropsProvider),
    );

    c.bench_function("optimize_query_join_ABC_ordered", |b| {
        b.iter(|| {
            let mut memo = Memo::new(Metadata::new());
            let (root, required) = build_query(catalog.as_ref(), &mut memo, &rules);
            let plan = optimizer.optimize(&mut memo, root, required).expect("Failed to optimize a query");
            black_box(plan);
        });
    });
}

criterion_group!(benches, optimizer_bench,);

criterion_main!(benches);
