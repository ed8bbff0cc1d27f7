use criterion::{black_box, criterion_group, criterion_main, Criterion};

use relopt::datatypes::{DataType, ScalarValue};
use relopt::factory::{Factory, NormalizationRules};
use relopt::memo::expr::{binary_expr, FieldValue, MemoExpr};
use relopt::memo::Memo;
use relopt::meta::{ColumnId, Metadata};
use relopt::operators::private::Private;
use relopt::operators::Operator;

const NUM_COLUMNS: usize = 16;

fn new_memo() -> Memo {
    let mut metadata = Metadata::new();
    for i in 0..NUM_COLUMNS {
        metadata.add_column(&format!("c{}", i), DataType::Int32);
    }
    Memo::new(metadata)
}

fn memo_bench(c: &mut Criterion) {
    c.bench_function("memo_intern_comparisons", |b| {
        b.iter(|| {
            let mut memo = new_memo();
            for i in 0..NUM_COLUMNS {
                let col = memo.intern_private(Private::Column(ColumnId::new(i + 1)));
                let col = memo.intern_expr(&MemoExpr::new(Operator::Variable, &[FieldValue::Private(col)]), None).unwrap();
                for value in 0..8 {
                    let value = memo.intern_private(Private::Value(ScalarValue::Int32(value)));
                    let value = memo
                        .intern_expr(&MemoExpr::new(Operator::Const, &[FieldValue::Private(value)]), None)
                        .unwrap();
                    let group = memo.intern_expr(&binary_expr(Operator::Lt, col, value), None).unwrap();
                    black_box(group);
                }
            }
            black_box(memo.num_groups());
        });
    });

    let rules = NormalizationRules::default();
    c.bench_function("factory_construct_filters", |b| {
        b.iter(|| {
            let mut memo = new_memo();
            let mut factory = Factory::new(&mut memo, &rules);
            let mut filters = Vec::with_capacity(NUM_COLUMNS);
            for i in (0..NUM_COLUMNS).rev() {
                let col = factory.construct_variable(ColumnId::new(i + 1)).unwrap();
                let value = factory.construct_const(ScalarValue::Int32(i as i32)).unwrap();
                // `value < col` is rewritten to `col > value`
                filters.push(factory.construct_lt(value, col).unwrap());
            }
            let filter = filters.iter().try_fold(filters[0], |acc, f| factory.construct_and(acc, *f)).unwrap();
            black_box(filter);
        });
    });
}

criterion_group!(benches, memo_bench,);

criterion_main!(benches);
