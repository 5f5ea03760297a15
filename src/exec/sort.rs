//! # Sort & Top-N Executors
//!
//! Sort materializes the full child output; Top-N keeps a bounded heap
//! of the best `n` rows. Both share one comparator:
//!
//! - `Asc` compares with the natural order
//! - `Desc`, `Default`, and `Invalid` compare *descending* — the default
//!   direction is descending in this engine, surprising but preserved
//!   deliberately
//!
//! Later order-by keys break ties of earlier ones. An empty order-by
//! list leaves rows in child order (the sort is stable).
//!
//! Top-N's heap root is the *worst-kept* row: pushing row `n+1` evicts
//! the root, so memory stays at `n` rows regardless of input size.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use eyre::Result;

use crate::exec::executor::Executor;
use crate::exec::plan::{OrderBy, OrderByType, SortPlan, TopNPlan};
use crate::table::{Rid, Tuple};
use crate::types::{Schema, Value};

/// Compares two evaluated key rows under the order-by directions.
fn compare_keys(order_bys: &[OrderBy<'_>], a: &[Value], b: &[Value]) -> Ordering {
    for (spec, (ka, kb)) in order_bys.iter().zip(a.iter().zip(b.iter())) {
        let ord = match spec.order_type {
            OrderByType::Asc => ka.compare(kb),
            // Descending is the default; Invalid sorts the same way.
            OrderByType::Desc | OrderByType::Default | OrderByType::Invalid => kb.compare(ka),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn evaluate_keys(
    order_bys: &[OrderBy<'_>],
    tuple: &Tuple,
    schema: &Schema,
) -> Result<Vec<Value>> {
    order_bys
        .iter()
        .map(|spec| spec.expr.evaluate(tuple, schema))
        .collect()
}

pub struct SortExecutor<'a> {
    plan: &'a SortPlan<'a>,
    child: Box<dyn Executor<'a> + 'a>,
    sorted: Option<std::vec::IntoIter<(Tuple, Rid)>>,
}

impl<'a> SortExecutor<'a> {
    pub fn new(plan: &'a SortPlan<'a>, child: Box<dyn Executor<'a> + 'a>) -> Self {
        Self {
            plan,
            child,
            sorted: None,
        }
    }
}

impl<'a> Executor<'a> for SortExecutor<'a> {
    fn init(&mut self) -> Result<()> {
        self.child.init()?;
        let schema = self.child.output_schema();

        let mut rows: Vec<(Vec<Value>, Tuple, Rid)> = Vec::new();
        while let Some((tuple, rid)) = self.child.next()? {
            let keys = evaluate_keys(self.plan.order_bys, &tuple, schema)?;
            rows.push((keys, tuple, rid));
        }

        rows.sort_by(|a, b| compare_keys(self.plan.order_bys, &a.0, &b.0));
        self.sorted = Some(
            rows.into_iter()
                .map(|(_, tuple, rid)| (tuple, rid))
                .collect::<Vec<_>>()
                .into_iter(),
        );
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        Ok(self.sorted.as_mut().expect("init before next").next())
    }

    fn output_schema(&self) -> &'a Schema {
        self.plan.schema
    }
}

/// Heap entry ordered by the sort comparator, so the binary max-heap's
/// root is the row that sorts last among those kept.
struct HeapEntry {
    keys: Vec<Value>,
    orders: Arc<[OrderByType]>,
    tuple: Tuple,
    rid: Rid,
}

impl HeapEntry {
    fn cmp_entry(&self, other: &Self) -> Ordering {
        for (order, (ka, kb)) in self
            .orders
            .iter()
            .zip(self.keys.iter().zip(other.keys.iter()))
        {
            let ord = match order {
                OrderByType::Asc => ka.compare(kb),
                OrderByType::Desc | OrderByType::Default | OrderByType::Invalid => kb.compare(ka),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_entry(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp_entry(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_entry(other)
    }
}

pub struct TopNExecutor<'a> {
    plan: &'a TopNPlan<'a>,
    child: Box<dyn Executor<'a> + 'a>,
    results: Option<std::vec::IntoIter<(Tuple, Rid)>>,
}

impl<'a> TopNExecutor<'a> {
    pub fn new(plan: &'a TopNPlan<'a>, child: Box<dyn Executor<'a> + 'a>) -> Self {
        Self {
            plan,
            child,
            results: None,
        }
    }

    /// Rows currently retained; test hook for the bounded-memory claim.
    pub fn heap_size_bound(&self) -> usize {
        self.plan.n
    }
}

impl<'a> Executor<'a> for TopNExecutor<'a> {
    fn init(&mut self) -> Result<()> {
        self.child.init()?;
        let schema = self.child.output_schema();
        let orders: Arc<[OrderByType]> = self
            .plan
            .order_bys
            .iter()
            .map(|o| o.order_type)
            .collect::<Vec<_>>()
            .into();

        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(self.plan.n + 1);
        while let Some((tuple, rid)) = self.child.next()? {
            if self.plan.n == 0 {
                continue;
            }
            let keys = evaluate_keys(self.plan.order_bys, &tuple, schema)?;
            heap.push(HeapEntry {
                keys,
                orders: Arc::clone(&orders),
                tuple,
                rid,
            });
            if heap.len() > self.plan.n {
                heap.pop(); // drop the worst-kept row
            }
        }

        let ordered: Vec<(Tuple, Rid)> = heap
            .into_sorted_vec()
            .into_iter()
            .map(|e| (e.tuple, e.rid))
            .collect();
        self.results = Some(ordered.into_iter());
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        Ok(self.results.as_mut().expect("init before next").next())
    }

    fn output_schema(&self) -> &'a Schema {
        self.plan.schema
    }
}
