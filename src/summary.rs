use arrow::record_batch::RecordBatch;

use crate::data::model::Model;

// ---------------------------------------------------------------------------
// Size formatting
// ---------------------------------------------------------------------------

const BINARY_PREFIXES: [&str; 8] = ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi"];

/// Format a byte count with binary prefixes: `1536.0` → `"1.5KiB"`.
/// Anything still ≥ 1024 after `Zi` is printed in `Yi` without further scaling.
pub fn format_size(bytes: f64) -> String {
    let mut num = bytes;
    for prefix in BINARY_PREFIXES {
        if num.abs() < 1024.0 {
            return format!("{num:.1}{prefix}B");
        }
        num /= 1024.0;
    }
    format!("{num:.1}YiB")
}

// ---------------------------------------------------------------------------
// Display bundle
// ---------------------------------------------------------------------------

/// One tabular section of the summary page.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: &'static str,
    pub batch: RecordBatch,
    /// Shown even when it has no rows.
    pub always_shown: bool,
}

impl Section {
    pub fn is_visible(&self) -> bool {
        self.always_shown || self.batch.num_rows() > 0
    }
}

/// Everything the summary page shows for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayBundle {
    pub metadata: Vec<(String, String)>,
    pub size: String,
    pub table_count: usize,
    pub table_names: Vec<String>,
    pub sections: Vec<Section>,
}

impl DisplayBundle {
    pub fn visible_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| s.is_visible())
    }
}

/// Arrange a model's attributes for display. Reads the model only.
pub fn summarize(model: &Model) -> DisplayBundle {
    let section = |title, batch: &RecordBatch, always_shown| Section {
        title,
        batch: batch.clone(),
        always_shown,
    };

    DisplayBundle {
        metadata: model
            .metadata()
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect(),
        size: format_size(model.size_bytes() as f64),
        table_count: model.table_names().len(),
        table_names: model.sorted_table_names(),
        sections: vec![
            section("Schema", model.schema(), true),
            section("Statistics", model.statistics(), true),
            section("Power Query code", model.power_query(), false),
            section("DAX tables", model.dax_tables(), false),
            section("DAX measures", model.dax_measures(), false),
        ],
    }
}
