//! # logrow - Ordering-safe CDC dispatch and row materialization
//!
//! The in-process core of a change-data-capture pipeline: accepts a stream of
//! database change events captured from a transaction log and emits them
//! downstream as typed rows, preserving per-table ordering between schema
//! changes and the data changes that follow them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   enqueue    ┌─────────────────────────────┐
//! │ producer  │ ───────────▶│ CdcDispatcher               │
//! └──────────┘              │  one queue + worker / table │
//!                           └──────┬──────────────┬───────┘
//!                              DML │          DDL │
//!                                  ▼              ▼
//!                        ┌────────────────┐ ┌────────────────┐
//!                        │ RowMaterializer│ │ ConverterCache │
//!                        │ paved / nested │ │ refresh-on-drift
//!                        └───────┬────────┘ └───────▲────────┘
//!                                │ OutputRow        │ metadata
//!                                ▼                  │
//!                        ┌────────────────┐ ┌───────┴────────┐
//!                        │    RowSink     │ │MetadataProvider│
//!                        └────────────────┘ └────────────────┘
//! ```
//!
//! A schema-change event for a table is never overtaken by later data-change
//! events for the same table; unrelated tables progress independently.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # async fn example() -> logrow::Result<()> {
//! use logrow::{
//!     CdcDispatcher, ChangeEvent, ChannelSink, Column, DispatchConfig,
//!     MemoryMetadataProvider, TableSchema,
//! };
//! use std::sync::Arc;
//!
//! let provider = Arc::new(MemoryMetadataProvider::new());
//! provider.set_table(
//!     "SALES",
//!     "ORDERS",
//!     TableSchema::from_columns([("ID", "NUMBER"), ("NOTE", "VARCHAR2(200)")]),
//! );
//!
//! let config = DispatchConfig::builder()
//!     .paved_representation(true)
//!     .split_update(true)
//!     .batch_depth(1000)
//!     .build()?;
//!
//! let (sink, mut rows) = ChannelSink::new();
//! let dispatcher = CdcDispatcher::new(config, provider, Arc::new(sink));
//!
//! dispatcher
//!     .enqueue(ChangeEvent::insert(
//!         "SALES",
//!         "ORDERS",
//!         1,
//!         vec![Column::new("ID", "1"), Column::new("NOTE", "first")],
//!     ))
//!     .await;
//!
//! let row = rows.recv().await.expect("row");
//! println!("{:?}", row.kind);
//!
//! dispatcher.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod row;
pub mod schema;

// Core types
pub use config::{DispatchConfig, DispatchConfigBuilder};
pub use error::{BoxError, CdcError, ErrorCategory, Result};
pub use event::{ChangeEvent, ChangeOp, Column};

// Conversion and schema cache
pub use convert::{FieldValue, TypeConverter};
pub use schema::{CacheEntry, ConverterCache, MemoryMetadataProvider, MetadataProvider, TableSchema};

// Materialization and dispatch
pub use dispatch::{
    CdcDispatcher, ChannelSink, DispatcherStats, DispatcherStatsSnapshot, RowSink,
};
pub use row::{OutputRow, RowKind, RowMaterializer};
