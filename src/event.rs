//! Change event representation
//!
//! One [`ChangeEvent`] per captured database change, as produced by a
//! log-mining layer. Column values are always textual at this layer: either a
//! database-native literal or wrapper syntax such as `HEXTORAW('..')`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operation kind of a captured change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeOp {
    /// Row inserted
    Insert,
    /// Row updated
    Update,
    /// Row deleted
    Delete,
    /// Schema change marker
    Ddl,
}

impl std::fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeOp::Insert => write!(f, "INSERT"),
            ChangeOp::Update => write!(f, "UPDATE"),
            ChangeOp::Delete => write!(f, "DELETE"),
            ChangeOp::Ddl => write!(f, "DDL"),
        }
    }
}

/// A single named column with its raw textual value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Raw value as emitted by the log miner (None = SQL NULL)
    pub value: Option<String>,
}

impl Column {
    /// Create a column with a value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Create a NULL column.
    pub fn null(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

/// Represents one change captured from the transaction log.
///
/// For DML events exactly one of `before`/`after` is meaningful per
/// operation kind (INSERT: after only, DELETE: before only, UPDATE: both).
/// For DDL events both column lists are empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Schema (owner) name
    pub schema: String,
    /// Table name
    pub table: String,
    /// Operation kind
    pub op: ChangeOp,
    /// Monotonic log position (SCN); used for replay/checkpointing, never
    /// for reordering within this core
    pub scn: u64,
    /// Transaction commit timestamp (Unix epoch millis)
    pub commit_ts_ms: i64,
    /// Operation timestamp
    pub op_time: NaiveDateTime,
    /// Previous row state (UPDATE/DELETE)
    pub before: Vec<Column>,
    /// Current row state (INSERT/UPDATE)
    pub after: Vec<Column>,
}

impl ChangeEvent {
    /// Create a new INSERT event.
    pub fn insert(
        schema: impl Into<String>,
        table: impl Into<String>,
        scn: u64,
        after: Vec<Column>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            op: ChangeOp::Insert,
            scn,
            commit_ts_ms: 0,
            op_time: DateTime::<Utc>::UNIX_EPOCH.naive_utc(),
            before: Vec::new(),
            after,
        }
    }

    /// Create a new UPDATE event.
    pub fn update(
        schema: impl Into<String>,
        table: impl Into<String>,
        scn: u64,
        before: Vec<Column>,
        after: Vec<Column>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            op: ChangeOp::Update,
            scn,
            commit_ts_ms: 0,
            op_time: DateTime::<Utc>::UNIX_EPOCH.naive_utc(),
            before,
            after,
        }
    }

    /// Create a new DELETE event.
    pub fn delete(
        schema: impl Into<String>,
        table: impl Into<String>,
        scn: u64,
        before: Vec<Column>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            op: ChangeOp::Delete,
            scn,
            commit_ts_ms: 0,
            op_time: DateTime::<Utc>::UNIX_EPOCH.naive_utc(),
            before,
            after: Vec::new(),
        }
    }

    /// Create a new DDL (schema change) event.
    pub fn ddl(schema: impl Into<String>, table: impl Into<String>, scn: u64) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            op: ChangeOp::Ddl,
            scn,
            commit_ts_ms: 0,
            op_time: DateTime::<Utc>::UNIX_EPOCH.naive_utc(),
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    /// Set the transaction commit timestamp (epoch millis).
    pub fn with_commit_ts(mut self, ts_ms: i64) -> Self {
        self.commit_ts_ms = ts_ms;
        self
    }

    /// Set the operation timestamp.
    pub fn with_op_time(mut self, op_time: NaiveDateTime) -> Self {
        self.op_time = op_time;
        self
    }

    /// Stable table identity: `schema.table`.
    pub fn table_identity(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// Check if this is a data-manipulation event.
    pub fn is_dml(&self) -> bool {
        matches!(self.op, ChangeOp::Insert | ChangeOp::Update | ChangeOp::Delete)
    }

    /// Columns checked against cached metadata for converter drift: the
    /// meaningful side for the operation kind.
    pub fn probe_columns(&self) -> &[Column] {
        match self.op {
            ChangeOp::Insert => &self.after,
            ChangeOp::Update | ChangeOp::Delete => &self.before,
            ChangeOp::Ddl => &[],
        }
    }
}
