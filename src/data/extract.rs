use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Array, Int64Builder, StringArray, StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{NaiveDate, NaiveDateTime};
use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::Value as JsonValue;
use thiserror::Error;

use super::model::{batch_with_rows, text_batch, Model, ModelParts, Scalar, UploadedArchive};

// ---------------------------------------------------------------------------
// Collaborator contract
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported archive format: {0}")]
    Unsupported(String),
    #[error("{0:#}")]
    Decode(anyhow::Error),
    #[error("table '{0}' not found")]
    NotFound(String),
}

/// Turns raw archive bytes into a [`Model`].
pub trait Extractor {
    fn load(&self, archive: &UploadedArchive) -> Result<Model, ExtractError>;
}

/// Decodes the rows of one table. Owned by the [`Model`] it belongs to.
pub trait TableDecoder: Send + Sync {
    fn decode(&self, table: &str) -> Result<RecordBatch, ExtractError>;
}

// ---------------------------------------------------------------------------
// Model-export backend
// ---------------------------------------------------------------------------

/// Local file header of a ZIP container, which is what a compressed `.pbix` is.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Reads JSON model exports:
///
/// ```json
/// {
///   "metadata": { "Version": 3 },
///   "tables": [
///     {
///       "name": "Sales",
///       "columns": [{ "name": "Id", "type": "int64" }],
///       "rows": [[1], [2]],
///       "power_query": "let Source = ... in Source",
///       "dax": null
///     }
///   ],
///   "measures": [{ "table": "Sales", "name": "Total", "expression": "SUM(Sales[Id])" }]
/// }
/// ```
///
/// Row payloads are kept as raw JSON until a table is materialized.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModelExportExtractor;

#[derive(Deserialize)]
struct ModelExport {
    #[serde(default)]
    metadata: BTreeMap<String, JsonValue>,
    #[serde(default)]
    size: Option<u64>,
    tables: Vec<TableExport>,
    #[serde(default)]
    measures: Vec<MeasureExport>,
}

#[derive(Deserialize)]
struct TableExport {
    name: String,
    columns: Vec<ColumnExport>,
    rows: Box<RawValue>,
    #[serde(default)]
    power_query: Option<String>,
    #[serde(default)]
    dax: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ColumnExport {
    name: String,
    #[serde(rename = "type")]
    data_type: ColumnType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ColumnType {
    String,
    Int64,
    Double,
    Boolean,
    Datetime,
}

impl ColumnType {
    fn name(self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Int64 => "int64",
            ColumnType::Double => "double",
            ColumnType::Boolean => "boolean",
            ColumnType::Datetime => "datetime",
        }
    }

    fn arrow_type(self) -> DataType {
        match self {
            ColumnType::String | ColumnType::Datetime => DataType::Utf8,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Double => DataType::Float64,
            ColumnType::Boolean => DataType::Boolean,
        }
    }
}

#[derive(Deserialize)]
struct MeasureExport {
    table: String,
    name: String,
    expression: String,
    #[serde(default)]
    display_folder: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl Extractor for ModelExportExtractor {
    fn load(&self, archive: &UploadedArchive) -> Result<Model, ExtractError> {
        let bytes = archive.bytes();
        if bytes.starts_with(ZIP_MAGIC) {
            return Err(ExtractError::Unsupported(
                "compressed .pbix container; an external extraction backend is required".into(),
            ));
        }
        let export: ModelExport = serde_json::from_slice(bytes)
            .context("parsing model export")
            .map_err(ExtractError::Decode)?;
        let (parts, decoder) = split_export(export, bytes.len() as u64).map_err(ExtractError::Decode)?;
        log::debug!(
            "Decoded summary of {} ({} tables)",
            archive.identity(),
            parts.table_names.len()
        );
        Ok(Model::new(archive.identity().clone(), parts, Box::new(decoder)))
    }
}

fn split_export(export: ModelExport, archive_len: u64) -> anyhow::Result<(ModelParts, ExportDecoder)> {
    let mut seen = HashSet::new();
    for table in &export.tables {
        if !seen.insert(table.name.as_str()) {
            bail!("duplicate table '{}'", table.name);
        }
    }

    let table_names: Vec<String> = export.tables.iter().map(|t| t.name.clone()).collect();

    let schema_rows: Vec<[Option<String>; 3]> = export
        .tables
        .iter()
        .flat_map(|t| {
            t.columns.iter().map(|c| {
                [
                    Some(t.name.clone()),
                    Some(c.name.clone()),
                    Some(c.data_type.name().to_string()),
                ]
            })
        })
        .collect();
    let schema = text_batch(["TableName", "ColumnName", "DataType"], &schema_rows)?;

    let statistics = statistics_batch(&export.tables)?;

    let power_query_rows: Vec<[Option<String>; 2]> = export
        .tables
        .iter()
        .filter_map(|t| Some([Some(t.name.clone()), Some(t.power_query.clone()?)]))
        .collect();
    let power_query = text_batch(["TableName", "Expression"], &power_query_rows)?;

    let dax_table_rows: Vec<[Option<String>; 2]> = export
        .tables
        .iter()
        .filter_map(|t| Some([Some(t.name.clone()), Some(t.dax.clone()?)]))
        .collect();
    let dax_tables = text_batch(["TableName", "Expression"], &dax_table_rows)?;

    let measure_rows: Vec<[Option<String>; 5]> = export
        .measures
        .into_iter()
        .map(|m| {
            [
                Some(m.table),
                Some(m.name),
                Some(m.expression),
                m.display_folder,
                m.description,
            ]
        })
        .collect();
    let dax_measures = text_batch(
        ["TableName", "Name", "Expression", "DisplayFolder", "Description"],
        &measure_rows,
    )?;

    let metadata = export
        .metadata
        .into_iter()
        .map(|(k, v)| (k, json_to_scalar(v)))
        .collect();

    let decoder = ExportDecoder {
        tables: export
            .tables
            .into_iter()
            .map(|t| {
                (
                    t.name,
                    RawTable {
                        columns: t.columns,
                        rows: t.rows,
                    },
                )
            })
            .collect(),
    };

    let parts = ModelParts {
        table_names,
        metadata,
        schema,
        statistics,
        power_query,
        dax_tables,
        dax_measures,
        size_bytes: export.size.unwrap_or(archive_len),
    };
    Ok((parts, decoder))
}

/// Per-table row count, column count and payload size. Rows are counted
/// without decoding their values.
fn statistics_batch(tables: &[TableExport]) -> anyhow::Result<RecordBatch> {
    let mut row_counts = Vec::with_capacity(tables.len());
    for t in tables {
        let rows: Vec<IgnoredAny> = serde_json::from_str(t.rows.get())
            .with_context(|| format!("table '{}': rows must be an array", t.name))?;
        row_counts.push(rows.len() as i64);
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("TableName", DataType::Utf8, false),
        Field::new("RowCount", DataType::Int64, false),
        Field::new("ColumnCount", DataType::Int64, false),
        Field::new("DataSize", DataType::Int64, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(
            tables.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        )),
        Arc::new(Int64Array::from(row_counts)),
        Arc::new(Int64Array::from(
            tables.iter().map(|t| t.columns.len() as i64).collect::<Vec<_>>(),
        )),
        Arc::new(Int64Array::from(
            tables.iter().map(|t| t.rows.get().len() as i64).collect::<Vec<_>>(),
        )),
    ];
    Ok(batch_with_rows(schema, columns, tables.len())?)
}

fn json_to_scalar(val: JsonValue) -> Scalar {
    match val {
        JsonValue::String(s) => Scalar::String(s),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Scalar::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Scalar::Float(f)
            } else {
                Scalar::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => Scalar::Bool(b),
        JsonValue::Null => Scalar::Null,
        other => Scalar::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Lazy row decoding
// ---------------------------------------------------------------------------

struct RawTable {
    columns: Vec<ColumnExport>,
    rows: Box<RawValue>,
}

struct ExportDecoder {
    tables: HashMap<String, RawTable>,
}

impl TableDecoder for ExportDecoder {
    fn decode(&self, table: &str) -> Result<RecordBatch, ExtractError> {
        let raw = self
            .tables
            .get(table)
            .ok_or_else(|| ExtractError::NotFound(table.to_string()))?;
        raw.decode()
            .with_context(|| format!("decoding table '{table}'"))
            .map_err(ExtractError::Decode)
    }
}

impl RawTable {
    fn decode(&self) -> anyhow::Result<RecordBatch> {
        let rows: Vec<Vec<JsonValue>> =
            serde_json::from_str(self.rows.get()).context("rows must be arrays of values")?;

        for (i, row) in rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                bail!(
                    "row {i}: expected {} values but found {}",
                    self.columns.len(),
                    row.len()
                );
            }
        }

        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| Field::new(&c.name, c.data_type.arrow_type(), true))
            .collect();

        let arrays = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                build_column(col.data_type, rows.iter().map(|r| &r[idx]))
                    .with_context(|| format!("column '{}'", col.name))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(batch_with_rows(
            Arc::new(Schema::new(fields)),
            arrays,
            rows.len(),
        )?)
    }
}

fn build_column<'a>(
    ty: ColumnType,
    values: impl Iterator<Item = &'a JsonValue>,
) -> anyhow::Result<ArrayRef> {
    let mismatch = |row: usize, v: &JsonValue| anyhow!("row {row}: {v} is not a {} value", ty.name());

    let array: ArrayRef = match ty {
        ColumnType::String | ColumnType::Datetime => {
            let mut b = StringBuilder::new();
            for (row, v) in values.enumerate() {
                match v {
                    JsonValue::Null => b.append_null(),
                    JsonValue::String(s) if ty == ColumnType::String || is_iso_datetime(s) => {
                        b.append_value(s)
                    }
                    other => return Err(mismatch(row, other)),
                }
            }
            Arc::new(b.finish())
        }
        ColumnType::Int64 => {
            let mut b = Int64Builder::new();
            for (row, v) in values.enumerate() {
                match v {
                    JsonValue::Null => b.append_null(),
                    other => b.append_value(other.as_i64().ok_or_else(|| mismatch(row, other))?),
                }
            }
            Arc::new(b.finish())
        }
        ColumnType::Double => {
            let mut b = Float64Builder::new();
            for (row, v) in values.enumerate() {
                match v {
                    JsonValue::Null => b.append_null(),
                    other => b.append_value(other.as_f64().ok_or_else(|| mismatch(row, other))?),
                }
            }
            Arc::new(b.finish())
        }
        ColumnType::Boolean => {
            let mut b = BooleanBuilder::new();
            for (row, v) in values.enumerate() {
                match v {
                    JsonValue::Null => b.append_null(),
                    other => b.append_value(other.as_bool().ok_or_else(|| mismatch(row, other))?),
                }
            }
            Arc::new(b.finish())
        }
    };
    Ok(array)
}

/// ISO 8601 date or date-time without offset, e.g. `2019-03-01T08:30:00`.
fn is_iso_datetime(s: &str) -> bool {
    s.parse::<NaiveDateTime>().is_ok() || s.parse::<NaiveDate>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::testing::sample_archive;
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{Float64Type, Int64Type};
    use pretty_assertions::assert_eq;

    #[test]
    fn load_reads_summary_attributes() {
        let model = ModelExportExtractor.load(&sample_archive()).unwrap();

        assert_eq!(model.table_names(), ["Sales", "Returns", "Age"]);
        assert_eq!(model.sorted_table_names(), ["Age", "Returns", "Sales"]);
        assert_eq!(model.metadata().get("Version"), Some(&Scalar::Integer(3)));
        assert_eq!(
            model.metadata().get("Culture"),
            Some(&Scalar::String("en-US".into()))
        );
        assert_eq!(model.size_bytes(), 48_213);

        // Sales: 3 columns, Returns: 2 columns, Age: 1 column.
        assert_eq!(model.schema().num_rows(), 6);
        assert_eq!(model.power_query().num_rows(), 2);
        assert_eq!(model.dax_tables().num_rows(), 1);
        assert_eq!(model.dax_measures().num_rows(), 2);
    }

    #[test]
    fn statistics_count_rows_without_decoding() {
        let model = ModelExportExtractor.load(&sample_archive()).unwrap();
        let stats = model.statistics();

        let names = stats.column(0).as_string::<i32>();
        let rows = stats.column(1).as_primitive::<Int64Type>();
        let cols = stats.column(2).as_primitive::<Int64Type>();
        assert_eq!(names.value(0), "Sales");
        assert_eq!(rows.value(0), 3);
        assert_eq!(cols.value(0), 3);
        assert_eq!(names.value(1), "Returns");
        assert_eq!(rows.value(1), 2);
    }

    #[test]
    fn size_falls_back_to_archive_length() {
        let archive = UploadedArchive::new(
            "tiny.json",
            br#"{"tables":[{"name":"T","columns":[],"rows":[]}]}"#.to_vec(),
        );
        let model = ModelExportExtractor.load(&archive).unwrap();
        assert_eq!(model.size_bytes(), archive.bytes().len() as u64);
    }

    #[test]
    fn zip_container_is_unsupported() {
        let archive = UploadedArchive::new("real.pbix", b"PK\x03\x04rest".to_vec());
        let err = ModelExportExtractor.load(&archive).unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(_)));
    }

    #[test]
    fn malformed_export_is_decode_error() {
        let archive = UploadedArchive::new("bad.json", b"{ not json".to_vec());
        let err = ModelExportExtractor.load(&archive).unwrap_err();
        assert!(matches!(err, ExtractError::Decode(_)));
        assert!(err.to_string().contains("parsing model export"));
    }

    #[test]
    fn duplicate_tables_are_rejected() {
        let archive = UploadedArchive::new(
            "dup.json",
            br#"{"tables":[
                {"name":"T","columns":[],"rows":[]},
                {"name":"T","columns":[],"rows":[]}
            ]}"#
            .to_vec(),
        );
        let err = ModelExportExtractor.load(&archive).unwrap_err();
        assert!(err.to_string().contains("duplicate table 'T'"));
    }

    #[test]
    fn decode_builds_typed_columns() {
        let model = ModelExportExtractor.load(&sample_archive()).unwrap();
        let batch = model.decoder().decode("Sales").unwrap();

        assert_eq!(batch.num_rows(), 3);
        let schema = batch.schema();
        assert_eq!(schema.field(0).data_type(), &DataType::Int64);
        assert_eq!(schema.field(1).data_type(), &DataType::Utf8);
        assert_eq!(schema.field(2).data_type(), &DataType::Float64);

        let amount = batch.column(2).as_primitive::<Float64Type>();
        assert_eq!(amount.value(0), 120.5);
        assert!(amount.is_null(2));
    }

    #[test]
    fn decode_unknown_table_is_not_found() {
        let model = ModelExportExtractor.load(&sample_archive()).unwrap();
        let err = model.decoder().decode("Nope").unwrap_err();
        assert!(matches!(err, ExtractError::NotFound(name) if name == "Nope"));
    }

    #[test]
    fn wrong_arity_reports_row() {
        let archive = UploadedArchive::new(
            "short.json",
            br#"{"tables":[{"name":"T","columns":[{"name":"a","type":"int64"},{"name":"b","type":"string"}],"rows":[[1,"x"],[2]]}]}"#.to_vec(),
        );
        let model = ModelExportExtractor.load(&archive).unwrap();
        let err = model.decoder().decode("T").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("decoding table 'T'"), "{msg}");
        assert!(msg.contains("row 1"), "{msg}");
    }

    #[test]
    fn type_mismatch_names_column() {
        let archive = UploadedArchive::new(
            "typed.json",
            br#"{"tables":[{"name":"T","columns":[{"name":"flag","type":"boolean"}],"rows":[[true],["yes"]]}]}"#.to_vec(),
        );
        let model = ModelExportExtractor.load(&archive).unwrap();
        let msg = model.decoder().decode("T").unwrap_err().to_string();
        assert!(msg.contains("column 'flag'"), "{msg}");
        assert!(msg.contains("not a boolean value"), "{msg}");
    }

    fn decode_single(column_type: &str, rows: &str) -> Result<RecordBatch, ExtractError> {
        let json = format!(
            r#"{{"tables":[{{"name":"T","columns":[{{"name":"c","type":"{column_type}"}}],"rows":{rows}}}]}}"#
        );
        let model = ModelExportExtractor
            .load(&UploadedArchive::new("single.json", json.into_bytes()))
            .unwrap();
        model.decoder().decode("T")
    }

    #[test]
    fn string_column_rejects_numbers_and_booleans() {
        let msg = decode_single("string", r#"[["a"],[5]]"#).unwrap_err().to_string();
        assert!(msg.contains("column 'c'"), "{msg}");
        assert!(msg.contains("row 1: 5 is not a string value"), "{msg}");

        let msg = decode_single("string", r#"[["a"],[null],[true]]"#)
            .unwrap_err()
            .to_string();
        assert!(msg.contains("row 2: true is not a string value"), "{msg}");
    }

    #[test]
    fn datetime_column_keeps_iso_text() {
        let batch = decode_single(
            "datetime",
            r#"[["2019-03-01T08:30:00"],[null],["2019-12-31"]]"#,
        )
        .unwrap();

        assert_eq!(batch.schema().field(0).data_type(), &DataType::Utf8);
        let values = batch.column(0).as_string::<i32>();
        assert_eq!(values.value(0), "2019-03-01T08:30:00");
        assert!(values.is_null(1));
        assert_eq!(values.value(2), "2019-12-31");
    }

    #[test]
    fn datetime_column_rejects_other_values() {
        let msg = decode_single("datetime", r#"[[20190301]]"#).unwrap_err().to_string();
        assert!(msg.contains("row 0: 20190301 is not a datetime value"), "{msg}");

        let msg = decode_single("datetime", r#"[["next tuesday"]]"#)
            .unwrap_err()
            .to_string();
        assert!(msg.contains("is not a datetime value"), "{msg}");
    }
}
