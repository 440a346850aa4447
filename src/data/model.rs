use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use arrow::array::{ArrayRef, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use super::extract::TableDecoder;

// ---------------------------------------------------------------------------
// Scalar – a single metadata value
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value as stored in a model's properties.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => write!(f, "{s}"),
            Scalar::Integer(i) => write!(f, "{i}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Null => write!(f, "<null>"),
        }
    }
}

// ---------------------------------------------------------------------------
// UploadedArchive – raw bytes plus the identity used as a cache key
// ---------------------------------------------------------------------------

/// Identity of an upload: file name, byte length and a content digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveIdentity {
    pub name: String,
    pub size: u64,
    pub digest: u64,
}

impl fmt::Display for ArchiveIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.name, self.size)
    }
}

/// An archive as received from the upload control. Immutable.
#[derive(Clone)]
pub struct UploadedArchive {
    identity: ArchiveIdentity,
    bytes: Arc<[u8]>,
}

impl UploadedArchive {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        let identity = ArchiveIdentity {
            name: name.into(),
            size: bytes.len() as u64,
            digest: hasher.finish(),
        };
        Self { identity, bytes }
    }

    pub fn identity(&self) -> &ArchiveIdentity {
        &self.identity
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for UploadedArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UploadedArchive").field(&self.identity).finish()
    }
}

// ---------------------------------------------------------------------------
// Model – the decoded summary of one archive
// ---------------------------------------------------------------------------

/// Summary attributes an extractor produces for one archive.
pub struct ModelParts {
    pub table_names: Vec<String>,
    pub metadata: BTreeMap<String, Scalar>,
    /// `TableName`, `ColumnName`, `DataType`.
    pub schema: RecordBatch,
    /// `TableName`, `RowCount`, `ColumnCount`, `DataSize`.
    pub statistics: RecordBatch,
    /// `TableName`, `Expression`.
    pub power_query: RecordBatch,
    /// `TableName`, `Expression`.
    pub dax_tables: RecordBatch,
    /// `TableName`, `Name`, `Expression`, `DisplayFolder`, `Description`.
    pub dax_measures: RecordBatch,
    pub size_bytes: u64,
}

/// Handle to a decoded archive. Immutable after construction; table rows
/// stay inside the decoder until someone asks for them.
pub struct Model {
    identity: ArchiveIdentity,
    parts: ModelParts,
    decoder: Box<dyn TableDecoder>,
}

impl Model {
    pub fn new(identity: ArchiveIdentity, mut parts: ModelParts, decoder: Box<dyn TableDecoder>) -> Self {
        // Table names are unique; keep the first occurrence.
        let mut seen = HashSet::new();
        parts.table_names.retain(|name| seen.insert(name.clone()));
        Self {
            identity,
            parts,
            decoder,
        }
    }

    pub fn identity(&self) -> &ArchiveIdentity {
        &self.identity
    }

    pub fn table_names(&self) -> &[String] {
        &self.parts.table_names
    }

    /// Table names in lexical order, as offered by the table selector.
    pub fn sorted_table_names(&self) -> Vec<String> {
        let mut names = self.parts.table_names.clone();
        names.sort();
        names
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.parts.table_names.iter().any(|t| t == name)
    }

    pub fn metadata(&self) -> &BTreeMap<String, Scalar> {
        &self.parts.metadata
    }

    pub fn schema(&self) -> &RecordBatch {
        &self.parts.schema
    }

    pub fn statistics(&self) -> &RecordBatch {
        &self.parts.statistics
    }

    pub fn power_query(&self) -> &RecordBatch {
        &self.parts.power_query
    }

    pub fn dax_tables(&self) -> &RecordBatch {
        &self.parts.dax_tables
    }

    pub fn dax_measures(&self) -> &RecordBatch {
        &self.parts.dax_measures
    }

    pub fn size_bytes(&self) -> u64 {
        self.parts.size_bytes
    }

    pub(crate) fn decoder(&self) -> &dyn TableDecoder {
        self.decoder.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn wrap_decoder(
        self,
        wrap: impl FnOnce(Box<dyn TableDecoder>) -> Box<dyn TableDecoder>,
    ) -> Self {
        Self {
            decoder: wrap(self.decoder),
            ..self
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("identity", &self.identity)
            .field("tables", &self.parts.table_names)
            .field("size_bytes", &self.parts.size_bytes)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// MaterializedTable – the rows of one table, decoded on demand
// ---------------------------------------------------------------------------

/// Identity of a materialized table: which archive, which table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableKey {
    pub archive: ArchiveIdentity,
    pub table: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedTable {
    key: TableKey,
    batch: RecordBatch,
}

impl MaterializedTable {
    pub fn new(key: TableKey, batch: RecordBatch) -> Self {
        Self { key, batch }
    }

    pub fn key(&self) -> &TableKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.key.table
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build an all-text batch (every column nullable `Utf8`).
pub(crate) fn text_batch<const N: usize>(
    fields: [&str; N],
    rows: &[[Option<String>; N]],
) -> Result<RecordBatch, ArrowError> {
    let schema = Schema::new(
        fields
            .iter()
            .map(|name| Field::new(*name, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    );
    let columns: Vec<ArrayRef> = (0..N)
        .map(|col| {
            let mut builder = StringBuilder::new();
            for row in rows {
                builder.append_option(row[col].as_deref());
            }
            Arc::new(builder.finish()) as ArrayRef
        })
        .collect();
    batch_with_rows(Arc::new(schema), columns, rows.len())
}

/// `RecordBatch::try_new` that also accepts zero columns.
pub(crate) fn batch_with_rows(
    schema: Arc<Schema>,
    columns: Vec<ArrayRef>,
    rows: usize,
) -> Result<RecordBatch, ArrowError> {
    let options = RecordBatchOptions::new().with_row_count(Some(rows));
    RecordBatch::try_new_with_options(schema, columns, &options)
}
