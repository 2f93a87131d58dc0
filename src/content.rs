//! Content boundary between tables and renderers

use std::fmt;
use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::config::PipelineOptions;
use crate::error::PipelineError;
use crate::model::{Field, Record, Table};
use crate::ops::Operation;

/// Kind of a content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Table,
    Text,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::Table => write!(f, "table"),
            ContentType::Text => write!(f, "text"),
        }
    }
}

/// Anything a renderer can serialize
pub trait Content: fmt::Debug + Send + Sync {
    fn content_type(&self) -> ContentType;

    /// Unique id of this content item
    fn id(&self) -> &str;

    fn encode_text(&self) -> Result<String, PipelineError>;

    fn encode_binary(&self) -> Result<Vec<u8>, PipelineError> {
        self.encode_text().map(String::into_bytes)
    }

    /// The table behind this content, if it is one
    fn as_table(&self) -> Option<&Table> {
        None
    }
}

impl Content for Table {
    fn content_type(&self) -> ContentType {
        ContentType::Table
    }

    fn id(&self) -> &str {
        Table::id(self)
    }

    /// JSON array of objects, keys in visible key order.
    ///
    /// Attached transformations run first. Fields with a formatter are
    /// written as the formatted string; missing fields are `null`.
    fn encode_text(&self) -> Result<String, PipelineError> {
        let table = self.materialize()?;
        let fields: Vec<&Field> = table
            .schema_ref()
            .fields()
            .iter()
            .filter(|f| !f.hidden)
            .collect();
        serde_json::to_string(&Rows {
            fields: &fields,
            records: table.records_ref(),
        })
        .map_err(|e| PipelineError::execution("encode", e.to_string()))
    }

    fn as_table(&self) -> Option<&Table> {
        Some(self)
    }
}

struct Rows<'a> {
    fields: &'a [&'a Field],
    records: &'a [Record],
}

impl Serialize for Rows<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.records.len()))?;
        for record in self.records {
            seq.serialize_element(&Row {
                fields: self.fields,
                record,
            })?;
        }
        seq.end()
    }
}

struct Row<'a> {
    fields: &'a [&'a Field],
    record: &'a Record,
}

impl Serialize for Row<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for field in self.fields {
            match self.record.get(&field.name) {
                None => map.serialize_entry(&field.name, &())?,
                Some(value) if field.has_formatter() => {
                    map.serialize_entry(&field.name, &field.format(value))?
                }
                Some(value) => map.serialize_entry(&field.name, value)?,
            }
        }
        map.end()
    }
}

/// Plain text content
#[derive(Debug, Clone)]
pub struct TextContent {
    id: String,
    text: String,
}

impl TextContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Content for TextContent {
    fn content_type(&self) -> ContentType {
        ContentType::Text
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn encode_text(&self) -> Result<String, PipelineError> {
        Ok(self.text.clone())
    }
}

/// Ordered collection of content items
#[derive(Debug, Clone, Default)]
pub struct Document {
    contents: Vec<Arc<dyn Content>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::default()
    }

    /// Content items in insertion order
    pub fn contents(&self) -> &[Arc<dyn Content>] {
        &self.contents
    }

    pub fn add_content(&mut self, content: Arc<dyn Content>) {
        self.contents.push(content);
    }

    /// Tables in the document, in order
    pub fn tables(&self) -> impl Iterator<Item = &Table> + '_ {
        self.contents.iter().filter_map(|c| c.as_table())
    }

    /// Run `operations` over every table, producing a new document.
    ///
    /// Attached transformations of each table run before `operations`.
    /// Non-table items are carried over as they are.
    pub fn transform(
        &self,
        operations: &[Operation],
        options: &PipelineOptions,
    ) -> Result<Document, PipelineError> {
        let mut out = Document::new();
        for content in &self.contents {
            match content.as_table() {
                Some(table) => {
                    let table = table.materialize()?;
                    let result = operations
                        .iter()
                        .cloned()
                        .fold(table.pipeline().with_options(options.clone()), |p, op| {
                            p.push(op)
                        })
                        .execute()?;
                    out.add_content(Arc::new(result));
                }
                None => out.add_content(Arc::clone(content)),
            }
        }
        Ok(out)
    }

    /// Materialize the transformations attached to every table
    pub fn materialize(&self) -> Result<Document, PipelineError> {
        let mut out = Document::new();
        for content in &self.contents {
            match content.as_table() {
                Some(table) => out.add_content(Arc::new(table.materialize()?)),
                None => out.add_content(Arc::clone(content)),
            }
        }
        Ok(out)
    }
}

/// Builder for [`Document`]
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    document: Document,
}

impl DocumentBuilder {
    pub fn add_table(mut self, table: Table) -> Self {
        self.document.add_content(Arc::new(table));
        self
    }

    pub fn add_text(mut self, text: impl Into<String>) -> Self {
        self.document.add_content(Arc::new(TextContent::new(text)));
        self
    }

    pub fn add_content(mut self, content: Arc<dyn Content>) -> Self {
        self.document.add_content(content);
        self
    }

    pub fn build(self) -> Document {
        self.document
    }
}
