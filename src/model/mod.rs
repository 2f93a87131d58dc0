//! Data model for tabular records

mod key;
mod record;
mod schema;
mod table;
mod value;

pub use key::{GroupKey, KeyBuilder};
pub use record::Record;
pub use schema::{Field, FieldType, Formatter, Schema};
pub use table::Table;
pub use value::Value;
