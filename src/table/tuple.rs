//! # Tuples
//!
//! A tuple is an opaque byte row decoded against a schema. The encoding
//! is serial per column: one presence byte, then a fixed payload for
//! `Bool`/`Int`/`Float` or a length-prefixed payload for `Text`. Decoding
//! walks columns in order; there is no per-tuple offset table.
//!
//! Tuples are move-only. The heap and executors transfer ownership; when
//! a second copy is genuinely needed the bytes are re-wrapped explicitly
//! via [`Tuple::from_bytes`].
//!
//! [`TupleMeta`] carries the MVCC timestamp and delete marker. A `ts`
//! with bit 63 set is an uncommitted write and the low 63 bits name the
//! writing transaction.

use eyre::{bail, ensure, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::config::{PageId, Timestamp, TXN_START_ID};
use crate::types::{Schema, TypeId, Value};

/// Record id: page plus slot. The in-memory heap uses page 0 and the
/// slot as a row index; the layout is fixed so rids can live inside
/// index bucket pages as raw bytes.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct Rid {
    pub page_id: PageId,
    pub slot: u32,
}

impl Rid {
    pub fn new(page_id: PageId, slot: u32) -> Self {
        Self { page_id, slot }
    }
}

impl std::fmt::Display for Rid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.page_id, self.slot)
    }
}

/// Per-tuple MVCC metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupleMeta {
    pub ts: Timestamp,
    pub is_deleted: bool,
}

impl TupleMeta {
    pub fn new(ts: Timestamp, is_deleted: bool) -> Self {
        Self { ts, is_deleted }
    }

    /// True when the timestamp names an uncommitted writing transaction.
    pub fn is_uncommitted(&self) -> bool {
        self.ts & TXN_START_ID != 0
    }

    /// The writing transaction id for an uncommitted tuple.
    pub fn writer_txn(&self) -> Timestamp {
        self.ts
    }
}

/// Schema-encoded byte row. Move-only.
#[derive(Debug, PartialEq)]
pub struct Tuple {
    data: Vec<u8>,
}

impl Tuple {
    /// Encodes `values` against `schema`.
    pub fn from_values(values: &[Value], schema: &Schema) -> Result<Self> {
        ensure!(
            values.len() == schema.column_count(),
            "tuple arity {} does not match schema arity {}",
            values.len(),
            schema.column_count()
        );
        let mut data = Vec::with_capacity(values.len() * 9);
        for (value, column) in values.iter().zip(schema.columns()) {
            match value {
                Value::Null => data.push(0),
                Value::Bool(b) => {
                    ensure!(column.type_id == TypeId::Bool, "bool into {:?}", column.type_id);
                    data.push(1);
                    data.push(*b as u8);
                }
                Value::Int(i) => {
                    ensure!(column.type_id == TypeId::Int, "int into {:?}", column.type_id);
                    data.push(1);
                    data.extend_from_slice(&i.to_le_bytes());
                }
                Value::Float(x) => {
                    ensure!(
                        column.type_id == TypeId::Float,
                        "float into {:?}",
                        column.type_id
                    );
                    data.push(1);
                    data.extend_from_slice(&x.to_le_bytes());
                }
                Value::Text(s) => {
                    ensure!(column.type_id == TypeId::Text, "text into {:?}", column.type_id);
                    data.push(1);
                    data.extend_from_slice(&(s.len() as u32).to_le_bytes());
                    data.extend_from_slice(s.as_bytes());
                }
            }
        }
        Ok(Self { data })
    }

    /// Wraps raw bytes previously produced by [`Tuple::from_values`].
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Decodes the value of column `idx`.
    pub fn value_at(&self, schema: &Schema, idx: usize) -> Result<Value> {
        ensure!(idx < schema.column_count(), "column {} out of range", idx);
        let mut offset = 0usize;
        for (i, column) in schema.columns().iter().enumerate() {
            let (value, next) = Self::decode_column(&self.data, offset, column.type_id)?;
            if i == idx {
                return Ok(value);
            }
            offset = next;
        }
        unreachable!("idx checked against column count");
    }

    /// Decodes the whole row.
    pub fn values(&self, schema: &Schema) -> Result<Vec<Value>> {
        let mut out = Vec::with_capacity(schema.column_count());
        let mut offset = 0usize;
        for column in schema.columns() {
            let (value, next) = Self::decode_column(&self.data, offset, column.type_id)?;
            out.push(value);
            offset = next;
        }
        Ok(out)
    }

    fn decode_column(data: &[u8], offset: usize, type_id: TypeId) -> Result<(Value, usize)> {
        let Some(&present) = data.get(offset) else {
            bail!("tuple truncated at offset {}", offset);
        };
        let offset = offset + 1;
        if present == 0 {
            return Ok((Value::Null, offset));
        }
        fn take(data: &[u8], offset: usize, n: usize) -> Result<&[u8]> {
            data.get(offset..offset + n)
                .ok_or_else(|| eyre::eyre!("tuple truncated at offset {}", offset))
        }
        match type_id {
            TypeId::Bool => Ok((Value::Bool(take(data, offset, 1)?[0] != 0), offset + 1)),
            TypeId::Int => Ok((
                Value::Int(i64::from_le_bytes(take(data, offset, 8)?.try_into().unwrap())),
                offset + 8,
            )),
            TypeId::Float => Ok((
                Value::Float(f64::from_le_bytes(take(data, offset, 8)?.try_into().unwrap())),
                offset + 8,
            )),
            TypeId::Text => {
                let len = u32::from_le_bytes(take(data, offset, 4)?.try_into().unwrap()) as usize;
                let bytes = data
                    .get(offset + 4..offset + 4 + len)
                    .ok_or_else(|| eyre::eyre!("tuple text truncated"))?;
                let s = std::str::from_utf8(bytes)?.to_owned();
                Ok((Value::Text(s), offset + 4 + len))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Column;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("id", TypeId::Int),
            Column::new("name", TypeId::Text),
            Column::new("score", TypeId::Float),
            Column::new("active", TypeId::Bool),
        ])
    }

    #[test]
    fn encode_decode_round_trip() {
        let s = schema();
        let values = vec![
            Value::Int(42),
            Value::Text("alice".into()),
            Value::Float(3.5),
            Value::Bool(true),
        ];
        let t = Tuple::from_values(&values, &s).unwrap();
        assert_eq!(t.values(&s).unwrap(), values);
        assert_eq!(t.value_at(&s, 1).unwrap(), Value::Text("alice".into()));
    }

    #[test]
    fn nulls_decode_as_null() {
        let s = schema();
        let values = vec![Value::Null, Value::Null, Value::Null, Value::Null];
        let t = Tuple::from_values(&values, &s).unwrap();
        assert_eq!(t.values(&s).unwrap(), values);
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let s = schema();
        assert!(Tuple::from_values(&[Value::Int(1)], &s).is_err());
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let s = schema();
        let values = vec![
            Value::Text("oops".into()),
            Value::Null,
            Value::Null,
            Value::Null,
        ];
        assert!(Tuple::from_values(&values, &s).is_err());
    }

    #[test]
    fn uncommitted_meta_flags() {
        let committed = TupleMeta::new(7, false);
        assert!(!committed.is_uncommitted());

        let writing = TupleMeta::new(TXN_START_ID | 3, false);
        assert!(writing.is_uncommitted());
        assert_eq!(writing.writer_txn() & !TXN_START_ID, 3);
    }

    #[test]
    fn rid_layout_is_eight_bytes() {
        assert_eq!(std::mem::size_of::<Rid>(), 8);
        let rid = Rid::new(3, 9);
        assert_eq!(format!("{}", rid), "3/9");
    }
}
