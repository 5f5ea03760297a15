//! Rewrite-rule behavior: pattern matches, key pairing, operand
//! swapping, and the fall-through cases that must not rewrite.

use std::sync::Arc;

use bumpalo::Bump;
use opaldb::catalog::Catalog;
use opaldb::exec::plan::*;
use opaldb::exec::{ComparisonOp, ConstValue, Expression, LogicOp};
use opaldb::optimizer::Optimizer;
use opaldb::types::{Column, Schema, TypeId};
use opaldb::{BufferPool, MemoryDiskManager};

fn bpm() -> Arc<BufferPool> {
    Arc::new(BufferPool::new(64, Arc::new(MemoryDiskManager::new()), 2))
}

fn ab_schema() -> Schema {
    Schema::new(vec![
        Column::new("x", TypeId::Int),
        Column::new("z", TypeId::Int),
    ])
}

fn expect_column(expr: &Expression<'_>, col: usize) {
    match expr {
        Expression::ColumnValue {
            tuple_idx, col_idx, ..
        } => {
            assert_eq!(*tuple_idx, 0);
            assert_eq!(*col_idx, col);
        }
        _ => panic!("expected a column expression"),
    }
}

#[test]
fn nlj_with_conjunctive_equalities_becomes_hash_join() {
    let catalog = Arc::new(Catalog::new());
    let schema = ab_schema();
    let join_schema = Schema::join_of(&schema, &schema);
    let arena = Bump::new();

    let left = arena.alloc(PlanNode::SeqScan(SeqScanPlan {
        table_oid: 0,
        schema: &schema,
        filter: None,
    }));
    let right = arena.alloc(PlanNode::SeqScan(SeqScanPlan {
        table_oid: 1,
        schema: &schema,
        filter: None,
    }));

    // A.x = B.y AND A.z = B.w
    let c1 = Expression::comparison(
        &arena,
        ComparisonOp::Equal,
        Expression::column(&arena, 0, 0, TypeId::Int),
        Expression::column(&arena, 1, 0, TypeId::Int),
    );
    let c2 = Expression::comparison(
        &arena,
        ComparisonOp::Equal,
        Expression::column(&arena, 0, 1, TypeId::Int),
        Expression::column(&arena, 1, 1, TypeId::Int),
    );
    let pred = Expression::logic(&arena, LogicOp::And, c1, c2);
    let plan = arena.alloc(PlanNode::NestedLoopJoin(NestedLoopJoinPlan {
        left,
        right,
        predicate: pred,
        join_type: JoinType::Inner,
        schema: &join_schema,
    }));

    let optimizer = Optimizer::new(catalog);
    let out = optimizer.optimize(plan, &arena).unwrap();
    let PlanNode::HashJoin(hj) = out else {
        panic!("expected a hash join");
    };
    assert_eq!(hj.left_keys.len(), 2);
    assert_eq!(hj.right_keys.len(), 2);
    expect_column(hj.left_keys[0], 0); // x
    expect_column(hj.left_keys[1], 1); // z
    expect_column(hj.right_keys[0], 0); // y
    expect_column(hj.right_keys[1], 1); // w
}

#[test]
fn swapped_operands_land_on_the_correct_sides() {
    let catalog = Arc::new(Catalog::new());
    let schema = ab_schema();
    let join_schema = Schema::join_of(&schema, &schema);
    let arena = Bump::new();

    let left = arena.alloc(PlanNode::SeqScan(SeqScanPlan {
        table_oid: 0,
        schema: &schema,
        filter: None,
    }));
    let right = arena.alloc(PlanNode::SeqScan(SeqScanPlan {
        table_oid: 1,
        schema: &schema,
        filter: None,
    }));

    // B.y = A.x (right side written first)
    let pred = Expression::comparison(
        &arena,
        ComparisonOp::Equal,
        Expression::column(&arena, 1, 0, TypeId::Int),
        Expression::column(&arena, 0, 1, TypeId::Int),
    );
    let plan = arena.alloc(PlanNode::NestedLoopJoin(NestedLoopJoinPlan {
        left,
        right,
        predicate: pred,
        join_type: JoinType::Inner,
        schema: &join_schema,
    }));

    let optimizer = Optimizer::new(catalog);
    let out = optimizer.optimize(plan, &arena).unwrap();
    let PlanNode::HashJoin(hj) = out else {
        panic!("expected a hash join");
    };
    expect_column(hj.left_keys[0], 1); // A.x came from the right operand
    expect_column(hj.right_keys[0], 0); // B.y
}

#[test]
fn non_equi_predicates_stay_nested_loop() {
    let catalog = Arc::new(Catalog::new());
    let schema = ab_schema();
    let join_schema = Schema::join_of(&schema, &schema);
    let arena = Bump::new();

    let left = arena.alloc(PlanNode::SeqScan(SeqScanPlan {
        table_oid: 0,
        schema: &schema,
        filter: None,
    }));
    let right = arena.alloc(PlanNode::SeqScan(SeqScanPlan {
        table_oid: 1,
        schema: &schema,
        filter: None,
    }));

    // x < y aborts; so does x = y AND z < w.
    let less = Expression::comparison(
        &arena,
        ComparisonOp::LessThan,
        Expression::column(&arena, 0, 0, TypeId::Int),
        Expression::column(&arena, 1, 0, TypeId::Int),
    );
    let equal = Expression::comparison(
        &arena,
        ComparisonOp::Equal,
        Expression::column(&arena, 0, 0, TypeId::Int),
        Expression::column(&arena, 1, 0, TypeId::Int),
    );
    for pred in [less, Expression::logic(&arena, LogicOp::And, equal, less)] {
        let plan = arena.alloc(PlanNode::NestedLoopJoin(NestedLoopJoinPlan {
            left,
            right,
            predicate: pred,
            join_type: JoinType::Inner,
            schema: &join_schema,
        }));
        let optimizer = Optimizer::new(Arc::clone(&catalog));
        let out = optimizer.optimize(plan, &arena).unwrap();
        assert!(matches!(out, PlanNode::NestedLoopJoin(_)));
    }
}

#[test]
fn seq_scan_with_indexed_equality_becomes_index_scan() {
    let catalog = Arc::new(Catalog::new());
    let table = catalog.create_table("t", ab_schema()).unwrap();
    let index = catalog.create_index("t_x", "t", 0, bpm()).unwrap();

    let schema = table.schema.clone();
    let arena = Bump::new();
    let pred = Expression::comparison(
        &arena,
        ComparisonOp::Equal,
        Expression::column(&arena, 0, 0, TypeId::Int),
        Expression::constant(&arena, ConstValue::Int(7)),
    );
    let plan = arena.alloc(PlanNode::SeqScan(SeqScanPlan {
        table_oid: table.oid,
        schema: &schema,
        filter: Some(pred),
    }));

    let optimizer = Optimizer::new(Arc::clone(&catalog));
    let out = optimizer.optimize(plan, &arena).unwrap();
    let PlanNode::IndexScan(is) = out else {
        panic!("expected an index scan");
    };
    assert_eq!(is.index_oid, index.oid);
    assert_eq!(is.probe, ConstValue::Int(7));

    // An equality on the unindexed column falls through.
    let pred2 = Expression::comparison(
        &arena,
        ComparisonOp::Equal,
        Expression::column(&arena, 0, 1, TypeId::Int),
        Expression::constant(&arena, ConstValue::Int(7)),
    );
    let plan2 = arena.alloc(PlanNode::SeqScan(SeqScanPlan {
        table_oid: table.oid,
        schema: &schema,
        filter: Some(pred2),
    }));
    let out2 = optimizer.optimize(plan2, &arena).unwrap();
    assert!(matches!(out2, PlanNode::SeqScan(_)));
}

#[test]
fn sort_under_limit_fuses_into_topn() {
    let catalog = Arc::new(Catalog::new());
    let schema = ab_schema();
    let arena = Bump::new();

    let scan = arena.alloc(PlanNode::SeqScan(SeqScanPlan {
        table_oid: 0,
        schema: &schema,
        filter: None,
    }));
    let order_bys = arena.alloc_slice_copy(&[OrderBy {
        order_type: OrderByType::Asc,
        expr: Expression::column(&arena, 0, 0, TypeId::Int),
    }]);
    let sort = arena.alloc(PlanNode::Sort(SortPlan {
        child: scan,
        order_bys,
        schema: &schema,
    }));
    let limit = arena.alloc(PlanNode::Limit(LimitPlan {
        child: sort,
        limit: 5,
        schema: &schema,
    }));

    let optimizer = Optimizer::new(catalog);
    let out = optimizer.optimize(limit, &arena).unwrap();
    let PlanNode::TopN(topn) = out else {
        panic!("expected a top-n");
    };
    assert_eq!(topn.n, 5);
    assert_eq!(topn.order_bys.len(), 1);
    assert!(matches!(topn.child, PlanNode::SeqScan(_)));

    // A bare limit (no sort beneath) is left alone.
    let scan2 = arena.alloc(PlanNode::SeqScan(SeqScanPlan {
        table_oid: 0,
        schema: &schema,
        filter: None,
    }));
    let limit2 = arena.alloc(PlanNode::Limit(LimitPlan {
        child: scan2,
        limit: 5,
        schema: &schema,
    }));
    let optimizer = Optimizer::new(Arc::new(Catalog::new()));
    let out2 = optimizer.optimize(limit2, &arena).unwrap();
    assert!(matches!(out2, PlanNode::Limit(_)));
}

#[test]
fn rules_rewrite_nested_children() {
    // Limit(Sort(NLJ(x = y))) fuses into TopN(HashJoin).
    let catalog = Arc::new(Catalog::new());
    let schema = ab_schema();
    let join_schema = Schema::join_of(&schema, &schema);
    let arena = Bump::new();

    let left = arena.alloc(PlanNode::SeqScan(SeqScanPlan {
        table_oid: 0,
        schema: &schema,
        filter: None,
    }));
    let right = arena.alloc(PlanNode::SeqScan(SeqScanPlan {
        table_oid: 1,
        schema: &schema,
        filter: None,
    }));
    let pred = Expression::comparison(
        &arena,
        ComparisonOp::Equal,
        Expression::column(&arena, 0, 0, TypeId::Int),
        Expression::column(&arena, 1, 0, TypeId::Int),
    );
    let nlj = arena.alloc(PlanNode::NestedLoopJoin(NestedLoopJoinPlan {
        left,
        right,
        predicate: pred,
        join_type: JoinType::Inner,
        schema: &join_schema,
    }));
    let order_bys = arena.alloc_slice_copy(&[OrderBy {
        order_type: OrderByType::Desc,
        expr: Expression::column(&arena, 0, 0, TypeId::Int),
    }]);
    let sort = arena.alloc(PlanNode::Sort(SortPlan {
        child: nlj,
        order_bys,
        schema: &join_schema,
    }));
    let limit = arena.alloc(PlanNode::Limit(LimitPlan {
        child: sort,
        limit: 3,
        schema: &join_schema,
    }));

    let optimizer = Optimizer::new(catalog);
    let out = optimizer.optimize(limit, &arena).unwrap();
    let PlanNode::TopN(topn) = out else {
        panic!("expected a top-n");
    };
    assert!(matches!(topn.child, PlanNode::HashJoin(_)));
}
