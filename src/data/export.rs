use std::fs::File;
use std::path::Path;

use anyhow::{bail, Context, Result};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use parquet::arrow::ArrowWriter;

use super::model::MaterializedTable;

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Write the table as CSV with a header row. Nulls become empty fields.
pub fn write_csv(table: &MaterializedTable, path: &Path) -> Result<()> {
    let batch = table.batch();
    if batch.num_columns() == 0 {
        bail!("table '{}' has no columns to export", table.name());
    }

    let options = FormatOptions::default();
    let formatters = batch
        .columns()
        .iter()
        .map(|col| ArrayFormatter::try_new(col.as_ref(), &options))
        .collect::<Result<Vec<_>, _>>()
        .context("preparing column formatters")?;

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer
        .write_record(table.column_names())
        .context("writing CSV header")?;
    for row in 0..batch.num_rows() {
        let record = formatters
            .iter()
            .map(|f| f.value(row).try_to_string())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("formatting row {row}"))?;
        writer
            .write_record(&record)
            .with_context(|| format!("writing CSV row {row}"))?;
    }
    writer.flush().context("flushing CSV")?;

    log::info!(
        "Exported {} rows of '{}' to {}",
        batch.num_rows(),
        table.name(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

pub fn write_parquet(table: &MaterializedTable, path: &Path) -> Result<()> {
    let batch = table.batch();
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("creating parquet writer")?;
    writer.write(batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;

    log::info!(
        "Exported {} rows of '{}' to {}",
        batch.num_rows(),
        table.name(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::extract::Extractor;
    use crate::data::materialize::materialize;
    use crate::data::testing::{sample_archive, CountingExtractor};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use pretty_assertions::assert_eq;

    fn sales() -> MaterializedTable {
        let model = CountingExtractor::default().load(&sample_archive()).unwrap();
        materialize(&model, "Sales").unwrap()
    }

    #[test]
    fn csv_has_header_and_empty_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");

        write_csv(&sales(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "OrderId,Region,Amount",
                "1,North,120.5",
                "2,South,80.25",
                "3,North,"
            ]
        );
    }

    #[test]
    fn parquet_reads_back_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.parquet");
        let table = sales();

        write_parquet(&table, &path).unwrap();

        let file = File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].columns(), table.batch().columns());
        assert_eq!(batches[0].schema().fields(), table.batch().schema().fields());
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("sales.csv");
        let err = write_csv(&sales(), &path).unwrap_err();
        assert!(format!("{err:#}").contains("creating"));
    }
}
