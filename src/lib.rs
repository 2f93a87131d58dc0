//! tablepipe - Record transformation pipelines for report tables
//!
//! A [`Table`] pairs an explicit [`Schema`] (whose field order is the display
//! order) with a list of [`Record`]s. A [`Pipeline`] applies filter, sort,
//! limit, computed-column and group-by operations to a copy of a table and
//! returns a new one, under operation-count and time limits and with
//! cooperative cancellation.

pub mod config;
pub mod content;
pub mod error;
pub mod input;
pub mod model;
pub mod ops;
pub mod pipeline;

pub use config::PipelineOptions;
pub use content::{Content, ContentType, Document, DocumentBuilder, TextContent};
pub use error::{CancelCause, ErrorKind, PipelineError};
pub use model::{Field, FieldType, Record, Schema, Table, Value};
pub use ops::{AggregateFunc, GroupBy, Operation, SortDirection, SortKey};
pub use pipeline::{ExecutionContext, ExecutionStats, Pipeline};
