//! Pruning soundness: a block holding a matching row is never excluded.

use microblock_prefetch::catalog::stats::{ColumnStats, ScalarValue};
use microblock_prefetch::catalog::Catalog;
use microblock_prefetch::prune::predicate::{CmpOp, Operand, Predicate};
use microblock_prefetch::prune::{EmptyResultPolicy, Pruner};
use microblock_prefetch::store::memory::MemoryStore;

/// Ten blocks; block `i` holds every integer in `[10 * i, 10 * i + 9]`.
fn dense_store() -> MemoryStore {
    let ranges: Vec<(i64, i64)> = (0..10).map(|i| (i * 10, i * 10 + 9)).collect();
    MemoryStore::from_ranges("v", &ranges, 10)
}

fn compare(lhs: &ScalarValue, op: CmpOp, rhs: &ScalarValue) -> bool {
    match op {
        CmpOp::Eq => lhs == rhs,
        CmpOp::NotEq => lhs != rhs,
        CmpOp::Lt => lhs < rhs,
        CmpOp::LtEq => lhs <= rhs,
        CmpOp::Gt => lhs > rhs,
        CmpOp::GtEq => lhs >= rhs,
    }
}

/// Whether the row with `v = value` satisfies `predicate`. Unknown shapes
/// count as satisfied.
fn holds(predicate: &Predicate, value: i64) -> bool {
    let row = ScalarValue::Int(value);
    match predicate {
        Predicate::And(l, r) => holds(l, value) && holds(r, value),
        Predicate::Or(l, r) => holds(l, value) || holds(r, value),
        Predicate::Range { low, high, .. } => &row >= low && &row <= high,
        Predicate::InList { values, .. } => values.contains(&row),
        Predicate::Comparison {
            op,
            left: Operand::Column(_),
            right: Operand::Literal(lit),
        } => compare(&row, *op, lit),
        Predicate::Comparison {
            op,
            left: Operand::Literal(lit),
            right: Operand::Column(_),
        } => compare(lit, *op, &row),
        _ => true,
    }
}

fn predicates() -> Vec<Predicate> {
    vec![
        Predicate::between("v", 18, 24),
        Predicate::between("v", 40, 40),
        Predicate::between("v", 70, 20),
        Predicate::in_list("v", [3, 55, 99]),
        Predicate::in_list("v", [200]),
        Predicate::cmp("v", CmpOp::Eq, 42),
        Predicate::cmp("v", CmpOp::NotEq, 42),
        Predicate::cmp("v", CmpOp::Lt, 30),
        Predicate::cmp("v", CmpOp::LtEq, 30),
        Predicate::cmp("v", CmpOp::Gt, 89),
        Predicate::cmp("v", CmpOp::GtEq, 90),
        Predicate::cmp("v", CmpOp::Gt, 2.5),
        Predicate::Comparison {
            op: CmpOp::Lt,
            left: Operand::Literal(ScalarValue::Int(65)),
            right: Operand::Column("v".to_string()),
        },
        Predicate::cmp("v", CmpOp::Lt, 10).or(Predicate::cmp("v", CmpOp::Gt, 90)),
        Predicate::cmp("v", CmpOp::GtEq, 20).and(Predicate::cmp("v", CmpOp::Lt, 35)),
        Predicate::between("v", 0, 99).and(Predicate::Unsupported),
        Predicate::Unsupported.or(Predicate::cmp("v", CmpOp::Eq, 5)),
    ]
}

#[test]
fn test_no_false_negatives() {
    let store = dense_store();
    let catalog = Catalog::build("t", &store);
    let pruner = Pruner::default();

    for predicate in predicates() {
        let candidates = pruner.prune(&catalog, "t", Some(&predicate));
        for value in 0..100 {
            if holds(&predicate, value) {
                let block = (value / 10) as u64;
                assert!(
                    candidates.contains(&block),
                    "{predicate:?} excluded block {block} holding {value}"
                );
            }
        }
    }
}

#[test]
fn test_prunes_tightly_on_simple_ranges() {
    let store = dense_store();
    let catalog = Catalog::build("t", &store);
    let pruner = Pruner::default();

    let cases = [
        (Predicate::between("v", 18, 24), vec![1, 2]),
        (Predicate::in_list("v", [3, 55, 99]), vec![0, 5, 9]),
        (Predicate::cmp("v", CmpOp::Lt, 30), vec![0, 1, 2]),
        (Predicate::cmp("v", CmpOp::Gt, 89), vec![9]),
        (
            Predicate::cmp("v", CmpOp::Lt, 10).or(Predicate::cmp("v", CmpOp::Gt, 90)),
            vec![0, 9],
        ),
    ];
    for (predicate, expected) in cases {
        assert_eq!(pruner.prune(&catalog, "t", Some(&predicate)), expected, "{predicate:?}");
    }
}

#[test]
fn test_missing_stats_keep_block() {
    let mut store = MemoryStore::new();
    store.push_block(10, vec![("v".to_string(), Some(ColumnStats::new(0, 9)))]);
    store.push_block(10, vec![("v".to_string(), None)]);
    store.push_block(10, vec![("other".to_string(), Some(ColumnStats::new(0, 9)))]);
    let catalog = Catalog::build("t", &store);

    let candidates = Pruner::default().prune(&catalog, "t", Some(&Predicate::cmp("v", CmpOp::Gt, 100)));
    assert_eq!(candidates, vec![1, 2]);
}

#[test]
fn test_incomparable_literal_keeps_block() {
    let store = dense_store();
    let catalog = Catalog::build("t", &store);

    let candidates = Pruner::default().prune(&catalog, "t", Some(&Predicate::cmp("v", CmpOp::Eq, "abc")));
    assert_eq!(candidates.len(), 10);
}

#[test]
fn test_unknown_table_keeps_every_block() {
    let store = dense_store();
    let catalog = Catalog::build("t", &store);

    let candidates = Pruner::default().prune(&catalog, "other", Some(&Predicate::cmp("v", CmpOp::Eq, 5)));
    assert_eq!(candidates.len(), 10);
}

#[test]
fn test_sql_pruning() {
    let store = dense_store();
    let catalog = Catalog::build("t", &store);
    let pruner = Pruner::default();

    assert_eq!(
        pruner.prune_sql(&catalog, "t", "SELECT * FROM t WHERE v BETWEEN 18 AND 24"),
        vec![1, 2]
    );
    assert_eq!(
        pruner.prune_sql(&catalog, "t", "SELECT * FROM t WHERE 85 < v"),
        vec![8, 9]
    );
    assert_eq!(
        pruner.prune_sql(&catalog, "t", "SELECT * FROM t WHERE v IN (1, 2) OR v = 77"),
        vec![0, 7]
    );
    // No WHERE clause and unparsable text both scan everything.
    assert_eq!(pruner.prune_sql(&catalog, "t", "SELECT * FROM t").len(), 10);
    assert_eq!(pruner.prune_sql(&catalog, "t", "not even sql").len(), 10);
}

#[test]
fn test_empty_result_policies() {
    let store = dense_store();
    let catalog = Catalog::build("t", &store);
    let nothing = Predicate::cmp("v", CmpOp::Gt, 1000);

    assert!(Pruner::new(EmptyResultPolicy::Empty)
        .prune(&catalog, "t", Some(&nothing))
        .is_empty());
    assert_eq!(
        Pruner::new(EmptyResultPolicy::FullScan)
            .prune(&catalog, "t", Some(&nothing))
            .len(),
        10
    );
}
