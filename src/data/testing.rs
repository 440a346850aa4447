//! Shared fixtures for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arrow::record_batch::RecordBatch;

use super::extract::{ExtractError, Extractor, ModelExportExtractor, TableDecoder};
use super::model::{Model, UploadedArchive};

pub const SAMPLE_EXPORT: &str = r#"{
  "metadata": { "Version": 3, "Culture": "en-US", "Compat": 1550.0 },
  "size": 48213,
  "tables": [
    {
      "name": "Sales",
      "columns": [
        { "name": "OrderId", "type": "int64" },
        { "name": "Region", "type": "string" },
        { "name": "Amount", "type": "double" }
      ],
      "rows": [[1, "North", 120.5], [2, "South", 80.25], [3, "North", null]],
      "power_query": "let Source = Csv.Document(File.Contents(\"sales.csv\")) in Source"
    },
    {
      "name": "Returns",
      "columns": [
        { "name": "OrderId", "type": "int64" },
        { "name": "Reason", "type": "string" }
      ],
      "rows": [[2, "Damaged"], [3, "Late"]],
      "power_query": "let Source = Sql.Database(\"srv\", \"db\") in Source"
    },
    {
      "name": "Age",
      "columns": [{ "name": "Bucket", "type": "string" }],
      "rows": [["18-25"], ["26-40"]],
      "dax": "DATATABLE(\"Bucket\", STRING, {{\"18-25\"}, {\"26-40\"}})"
    }
  ],
  "measures": [
    { "table": "Sales", "name": "Total Sales", "expression": "SUM(Sales[Amount])", "display_folder": "KPI" },
    { "table": "Returns", "name": "Return Count", "expression": "COUNTROWS(Returns)" }
  ]
}"#;

pub fn sample_archive() -> UploadedArchive {
    UploadedArchive::new("Sales & Returns.pbix", SAMPLE_EXPORT.as_bytes().to_vec())
}

/// Wraps [`ModelExportExtractor`] and counts model loads and table decodes.
#[derive(Default, Clone)]
pub struct CountingExtractor {
    pub loads: Arc<AtomicUsize>,
    pub decodes: Arc<AtomicUsize>,
}

impl CountingExtractor {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }
}

struct CountingDecoder {
    inner: Box<dyn TableDecoder>,
    decodes: Arc<AtomicUsize>,
}

impl TableDecoder for CountingDecoder {
    fn decode(&self, table: &str) -> Result<RecordBatch, ExtractError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        self.inner.decode(table)
    }
}

impl Extractor for CountingExtractor {
    fn load(&self, archive: &UploadedArchive) -> Result<Model, ExtractError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let model = ModelExportExtractor.load(archive)?;
        let decodes = self.decodes.clone();
        Ok(model.wrap_decoder(|inner| Box::new(CountingDecoder { inner, decodes })))
    }
}

/// A decoder that fails for every table.
pub struct BrokenDecoder;

impl TableDecoder for BrokenDecoder {
    fn decode(&self, table: &str) -> Result<RecordBatch, ExtractError> {
        Err(ExtractError::Decode(anyhow::anyhow!(
            "corrupt segment in table '{table}'"
        )))
    }
}
