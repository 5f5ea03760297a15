//! # Undo Logs
//!
//! An undo log is the delta needed to step a tuple one version back in
//! time: a delete marker, a bitmap of modified columns, the prior values
//! of exactly those columns, the timestamp of the version it restores,
//! and an optional link to the next-older log.
//!
//! Reconstruction applies logs newest-to-oldest on top of the heap
//! tuple; the last applied log decides both the surviving values and the
//! delete state.

use eyre::{ensure, Result};

use crate::config::Timestamp;
use crate::table::{Tuple, TupleMeta};
use crate::types::{Schema, Value};

/// Position of an undo log: owning transaction plus index into its log
/// array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoLink {
    pub prev_txn: Timestamp,
    pub prev_log_idx: usize,
}

#[derive(Debug)]
pub struct UndoLog {
    /// The restored version was a delete marker.
    pub is_deleted: bool,
    /// Which columns this delta carries, aligned with the table schema.
    pub modified_fields: Vec<bool>,
    /// Prior values of the modified columns, encoded against the partial
    /// schema induced by `modified_fields`.
    pub tuple: Tuple,
    /// Timestamp of the version this log restores.
    pub ts: Timestamp,
    pub prev_version: Option<UndoLink>,
}

/// Schema of just the modified columns of `schema`.
fn partial_schema(schema: &Schema, modified: &[bool]) -> Schema {
    let columns = schema
        .columns()
        .iter()
        .zip(modified)
        .filter(|(_, &m)| m)
        .map(|(c, _)| c.clone())
        .collect();
    Schema::new(columns)
}

impl UndoLog {
    /// Builds a full-row undo log (every column modified). Used when the
    /// original version must be restorable wholesale, e.g. for deletes.
    pub fn full(
        schema: &Schema,
        values: &[Value],
        ts: Timestamp,
        is_deleted: bool,
        prev_version: Option<UndoLink>,
    ) -> Result<Self> {
        Ok(Self {
            is_deleted,
            modified_fields: vec![true; schema.column_count()],
            tuple: Tuple::from_values(values, schema)?,
            ts,
            prev_version,
        })
    }

    /// Builds a delete marker: restoring it yields "tuple absent".
    pub fn deletion_marker(schema: &Schema, ts: Timestamp, prev_version: Option<UndoLink>) -> Self {
        Self {
            is_deleted: true,
            modified_fields: vec![false; schema.column_count()],
            tuple: Tuple::from_bytes(Vec::new()),
            ts,
            prev_version,
        }
    }
}

/// Replays `undo_logs` (newest first) over the heap tuple, producing the
/// version the last log restores. `None` means the tuple did not exist
/// at that point.
pub fn reconstruct_tuple(
    schema: &Schema,
    base_tuple: &Tuple,
    base_meta: TupleMeta,
    undo_logs: &[UndoLog],
) -> Result<Option<Tuple>> {
    if undo_logs.is_empty() {
        if base_meta.is_deleted {
            return Ok(None);
        }
        return Ok(Some(Tuple::from_bytes(base_tuple.data().to_vec())));
    }

    let mut values = base_tuple.values(schema)?;
    let mut deleted = base_meta.is_deleted;

    for log in undo_logs {
        ensure!(
            log.modified_fields.len() == schema.column_count(),
            "undo log arity {} does not match schema arity {}",
            log.modified_fields.len(),
            schema.column_count()
        );
        deleted = log.is_deleted;
        if log.is_deleted {
            continue;
        }
        let partial = partial_schema(schema, &log.modified_fields);
        let partial_values = log.tuple.values(&partial)?;
        let mut it = partial_values.into_iter();
        for (slot, modified) in log.modified_fields.iter().enumerate() {
            if *modified {
                values[slot] = it.next().expect("partial value per modified field");
            }
        }
    }

    if deleted {
        return Ok(None);
    }
    Ok(Some(Tuple::from_values(&values, schema)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Column, TypeId};

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("a", TypeId::Int),
            Column::new("b", TypeId::Text),
        ])
    }

    fn base() -> Tuple {
        Tuple::from_values(&[Value::Int(3), Value::Text("v3".into())], &schema()).unwrap()
    }

    fn partial_log(a: Option<i64>, b: Option<&str>, ts: Timestamp) -> UndoLog {
        let s = schema();
        let modified = [a.is_some(), b.is_some()];
        let partial = partial_schema(&s, &modified);
        let mut values = Vec::new();
        if let Some(a) = a {
            values.push(Value::Int(a));
        }
        if let Some(b) = b {
            values.push(Value::Text(b.into()));
        }
        UndoLog {
            is_deleted: false,
            modified_fields: modified.to_vec(),
            tuple: Tuple::from_values(&values, &partial).unwrap(),
            ts,
            prev_version: None,
        }
    }

    #[test]
    fn no_logs_returns_base() {
        let t = reconstruct_tuple(&schema(), &base(), TupleMeta::new(3, false), &[])
            .unwrap()
            .unwrap();
        assert_eq!(t.values(&schema()).unwrap()[0], Value::Int(3));
    }

    #[test]
    fn no_logs_deleted_base_is_absent() {
        let out = reconstruct_tuple(&schema(), &base(), TupleMeta::new(3, true), &[]).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn partial_deltas_compose_in_order() {
        // v3 -> (restore a=2) -> (restore b="v1")
        let logs = vec![partial_log(Some(2), None, 2), partial_log(None, Some("v1"), 1)];
        let t = reconstruct_tuple(&schema(), &base(), TupleMeta::new(3, false), &logs)
            .unwrap()
            .unwrap();
        assert_eq!(
            t.values(&schema()).unwrap(),
            vec![Value::Int(2), Value::Text("v1".into())]
        );
    }

    #[test]
    fn trailing_delete_marker_means_absent() {
        let logs = vec![
            partial_log(Some(2), None, 2),
            UndoLog::deletion_marker(&schema(), 1, None),
        ];
        let out =
            reconstruct_tuple(&schema(), &base(), TupleMeta::new(3, false), &logs).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn full_log_resurrects_deleted_base() {
        let s = schema();
        let logs = vec![UndoLog::full(
            &s,
            &[Value::Int(1), Value::Text("v1".into())],
            1,
            false,
            None,
        )
        .unwrap()];
        let t = reconstruct_tuple(&s, &base(), TupleMeta::new(3, true), &logs)
            .unwrap()
            .unwrap();
        assert_eq!(t.value_at(&s, 0).unwrap(), Value::Int(1));
    }
}
