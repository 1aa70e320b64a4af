//! Output row materialization
//!
//! Converts one change event plus its cached converter pipeline into one or
//! two fully-typed output rows. Header layout is deterministic: the fixed
//! fields `scn, schema, table, ts, op_time`, then `type`, then before-side
//! fields, then after-side fields.

use crate::convert::FieldValue;
use crate::error::{CdcError, Result};
use crate::event::{ChangeEvent, ChangeOp, Column};
use crate::schema::CacheEntry;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Field name prefixes and fixed header names.
const SCN: &str = "scn";
const SCHEMA: &str = "schema";
const TABLE: &str = "table";
const TS: &str = "ts";
const OP_TIME: &str = "op_time";
const TYPE: &str = "type";
const BEFORE: &str = "before";
const AFTER: &str = "after";
const BEFORE_PREFIX: &str = "before_";
const AFTER_PREFIX: &str = "after_";

/// Row change kind, used by the downstream consumer to decide
/// insert/delete/update semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowKind {
    Insert,
    Delete,
    /// Before-image half of a split update
    UpdateBefore,
    /// After-image half of a split update
    UpdateAfter,
    /// Unsplit update carrying both sides
    Update,
}

impl std::fmt::Display for RowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowKind::Insert => write!(f, "INSERT"),
            RowKind::Delete => write!(f, "DELETE"),
            RowKind::UpdateBefore => write!(f, "UPDATE_BEFORE"),
            RowKind::UpdateAfter => write!(f, "UPDATE_AFTER"),
            RowKind::Update => write!(f, "UPDATE"),
        }
    }
}

impl From<ChangeOp> for RowKind {
    fn from(op: ChangeOp) -> Self {
        match op {
            ChangeOp::Insert => RowKind::Insert,
            ChangeOp::Delete => RowKind::Delete,
            // DDL never reaches materialization; Update covers the rest
            ChangeOp::Update | ChangeOp::Ddl => RowKind::Update,
        }
    }
}

/// A materialized output row: parallel header/field lists plus a row kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRow {
    /// Change semantics tag
    pub kind: RowKind,
    /// Field names, positionally matched to `fields`
    pub headers: Vec<String>,
    /// Typed field values
    pub fields: Vec<FieldValue>,
}

impl OutputRow {
    fn with_capacity(kind: RowKind, capacity: usize) -> Self {
        Self {
            kind,
            headers: Vec::with_capacity(capacity),
            fields: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, header: impl Into<String>, field: FieldValue) {
        self.headers.push(header.into());
        self.fields.push(field);
    }

    /// Look up a field value by header name.
    pub fn get(&self, header: &str) -> Option<&FieldValue> {
        self.headers
            .iter()
            .position(|h| h == header)
            .map(|i| &self.fields[i])
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check for an empty row.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Materializes change events into typed output rows.
///
/// Two representation modes: *paved* flattens before/after columns into
/// individually named `before_<col>` / `after_<col>` fields in table-schema
/// order; *nested* collapses each side into a single ordered name -> raw
/// value map. Update splitting turns one UPDATE into an UPDATE_BEFORE row
/// followed by an UPDATE_AFTER row.
#[derive(Debug, Clone)]
pub struct RowMaterializer {
    paved: bool,
    split_update: bool,
}

impl RowMaterializer {
    /// Create a materializer with the given representation and split modes.
    pub fn new(paved: bool, split_update: bool) -> Self {
        Self {
            paved,
            split_update,
        }
    }

    /// Materialize one DML event into one or two output rows.
    ///
    /// DDL events are handled by the dispatch registry and must never reach
    /// this component.
    pub fn materialize(&self, event: &ChangeEvent, entry: &CacheEntry) -> Result<Vec<OutputRow>> {
        if event.op == ChangeOp::Ddl {
            return Err(CdcError::invalid_state(format!(
                "DDL event for table {} cannot be materialized",
                event.table_identity()
            )));
        }

        // 5 fixed fields + type + per-side fields (paved) or one map per side
        let capacity = if self.paved {
            6 + event.before.len() + event.after.len()
        } else {
            8
        };

        let mut skeleton = OutputRow::with_capacity(RowKind::from(event.op), capacity);
        skeleton.push(SCN, FieldValue::Decimal(Decimal::from(event.scn)));
        skeleton.push(SCHEMA, FieldValue::Text(event.schema.clone()));
        skeleton.push(TABLE, FieldValue::Text(event.table.clone()));
        skeleton.push(TS, FieldValue::Decimal(Decimal::from(event.commit_ts_ms)));
        skeleton.push(OP_TIME, FieldValue::Timestamp(event.op_time));

        let (before_fields, after_fields) = if self.paved {
            (
                self.paved_fields(event, &event.before, entry, BEFORE_PREFIX)?,
                self.paved_fields(event, &event.after, entry, AFTER_PREFIX)?,
            )
        } else {
            (
                vec![(BEFORE.to_string(), raw_column_map(&event.before))],
                vec![(AFTER.to_string(), raw_column_map(&event.after))],
            )
        };

        let mut rows = Vec::with_capacity(2);

        if self.split_update && event.op == ChangeOp::Update {
            let mut before_row = skeleton.clone();
            before_row.kind = RowKind::UpdateBefore;
            before_row.push(TYPE, FieldValue::Text(RowKind::UpdateBefore.to_string()));
            for (header, field) in before_fields {
                before_row.push(header, field);
            }
            rows.push(before_row);

            skeleton.kind = RowKind::UpdateAfter;
            skeleton.push(TYPE, FieldValue::Text(RowKind::UpdateAfter.to_string()));
            for (header, field) in after_fields {
                skeleton.push(header, field);
            }
            rows.push(skeleton);
        } else {
            skeleton.push(TYPE, FieldValue::Text(event.op.to_string()));
            for (header, field) in before_fields.into_iter().chain(after_fields) {
                skeleton.push(header, field);
            }
            rows.push(skeleton);
        }

        Ok(rows)
    }

    /// Convert one side's columns into prefixed typed fields, ordered by the
    /// table schema (not the event's raw column order).
    fn paved_fields(
        &self,
        event: &ChangeEvent,
        columns: &[Column],
        entry: &CacheEntry,
        prefix: &str,
    ) -> Result<Vec<(String, FieldValue)>> {
        // The log's column order may drift from metadata order, so each
        // column is resolved by name against the schema's column list.
        let mut indexed = Vec::with_capacity(columns.len());
        for column in columns {
            let index = entry.schema.column_index(&column.name).ok_or_else(|| {
                CdcError::field_inconsistency(
                    event.table_identity(),
                    columns.iter().map(|c| c.name.clone()).collect(),
                    entry.schema.column_names.clone(),
                )
            })?;
            indexed.push((index, column));
        }
        indexed.sort_by_key(|(index, _)| *index);

        let mut fields = Vec::with_capacity(indexed.len());
        for (index, column) in indexed {
            let value = entry.converters[index].convert(column.value.as_deref())?;
            fields.push((format!("{prefix}{}", column.name), value));
        }
        Ok(fields)
    }
}

/// Collapse one side's columns into an ordered name -> raw value map,
/// preserving the event's raw column order.
fn raw_column_map(columns: &[Column]) -> FieldValue {
    let mut map = serde_json::Map::with_capacity(columns.len());
    for column in columns {
        let value = match &column.value {
            Some(v) => serde_json::Value::String(v.clone()),
            None => serde_json::Value::Null,
        };
        map.insert(column.name.clone(), value);
    }
    FieldValue::Map(map)
}
