use std::hash::Hash;

use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use eframe::egui::{Color32, Ui};
use egui_extras::{Column, TableBuilder};

const ROW_HEIGHT: f32 = 18.0;

/// Render a record batch as a scrollable grid. Only visible rows are formatted.
pub fn batch_grid(ui: &mut Ui, id_salt: impl Hash, batch: &RecordBatch, max_height: f32) {
    if batch.num_columns() == 0 {
        ui.weak("(no columns)");
        return;
    }

    let options = FormatOptions::default();
    let formatters = match batch
        .columns()
        .iter()
        .map(|col| ArrayFormatter::try_new(col.as_ref(), &options))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(f) => f,
        Err(e) => {
            ui.colored_label(Color32::RED, format!("Cannot display table: {e}"));
            return;
        }
    };
    let schema = batch.schema();

    ui.push_id(id_salt, |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .max_scroll_height(max_height)
            .columns(Column::auto().at_least(60.0).clip(true), batch.num_columns())
            .header(ROW_HEIGHT + 2.0, |mut header| {
                for field in schema.fields() {
                    header.col(|ui: &mut Ui| {
                        ui.strong(field.name());
                    });
                }
            })
            .body(|body| {
                body.rows(ROW_HEIGHT, batch.num_rows(), |mut row| {
                    let idx = row.index();
                    for formatter in &formatters {
                        row.col(|ui: &mut Ui| {
                            let text = formatter
                                .value(idx)
                                .try_to_string()
                                .unwrap_or_else(|e| format!("<{e}>"));
                            ui.label(text);
                        });
                    }
                });
            });
    });
}
