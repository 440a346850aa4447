use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use super::grid::batch_grid;
use crate::error::NoticeLevel;
use crate::state::{Action, AppState, Phase};
use crate::viz::VisualizationSession;

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Title, upload button, status line and live clock.
pub fn top_bar(ui: &mut Ui, state: &AppState, clock: Option<&str>, actions: &mut Vec<Action>) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.heading(RichText::new("Power BI Scanner").strong());
        ui.separator();

        if ui.button("Upload…").clicked() {
            if let Some(action) = open_file_dialog() {
                actions.push(action);
            }
        }

        if let Some(notice) = state.notice() {
            let color = match notice.level {
                NoticeLevel::Info => ui.visuals().text_color(),
                NoticeLevel::Warning => Color32::from_rgb(230, 160, 30),
                NoticeLevel::Error => Color32::RED,
            };
            ui.separator();
            ui.label(RichText::new(&notice.text).color(color));
        }

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui: &mut Ui| {
            if let Some(now) = clock {
                ui.label(RichText::new(now).monospace().size(16.0));
                ui.label("Date");
            }
        });
    });
}

// ---------------------------------------------------------------------------
// Left side panel – model overview and table picker
// ---------------------------------------------------------------------------

pub fn side_panel(ui: &mut Ui, state: &AppState, actions: &mut Vec<Action>) {
    ui.heading("Model");
    ui.separator();

    if !state.models().is_empty() {
        ui.weak(format!(
            "Cached: {} models, {} charts ({} built)",
            state.models().len(),
            state.charts().len(),
            state.charts().builds()
        ));
    }

    let Phase::Loaded(loaded) = state.phase() else {
        ui.label("No model loaded.");
        return;
    };
    let summary = &loaded.summary;

    ui.horizontal(|ui: &mut Ui| {
        metric(ui, "Model size", &summary.size);
        ui.separator();
        metric(ui, "Tables", &summary.table_count.to_string());
    });
    ui.separator();

    egui::CollapsingHeader::new(RichText::new("Metadata").strong())
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            egui::Grid::new("metadata_grid")
                .striped(true)
                .show(ui, |ui: &mut Ui| {
                    for (key, value) in &summary.metadata {
                        ui.label(key);
                        ui.label(value);
                        ui.end_row();
                    }
                });
        });
    ui.separator();

    ui.strong("Select a table to peek at its contents:");
    let current = loaded.selected.as_deref().unwrap_or("");
    egui::ComboBox::from_id_salt("table_picker")
        .selected_text(current)
        .width(ui.available_width() - 8.0)
        .show_ui(ui, |ui: &mut Ui| {
            for name in &summary.table_names {
                if ui.selectable_label(current == name, name).clicked() {
                    actions.push(Action::Select(name.clone()));
                }
            }
        });

    if ui
        .add_enabled(loaded.selected.is_some(), egui::Button::new("View table"))
        .clicked()
    {
        actions.push(Action::View);
    }
    ui.separator();

    let has_view = loaded.view.is_some();
    ui.horizontal(|ui: &mut Ui| {
        if ui.add_enabled(has_view, egui::Button::new("Export CSV…")).clicked() {
            actions.extend(save_file_dialog("CSV", "csv").map(Action::ExportCsv));
        }
        if ui.add_enabled(has_view, egui::Button::new("Export Parquet…")).clicked() {
            actions.extend(save_file_dialog("Parquet", "parquet").map(Action::ExportParquet));
        }
    });

    if ui.button("Close model").clicked() {
        actions.push(Action::Forget);
    }
}

fn metric(ui: &mut Ui, label: &str, value: &str) {
    ui.vertical(|ui: &mut Ui| {
        ui.weak(label);
        ui.label(RichText::new(value).size(20.0).strong());
    });
}

// ---------------------------------------------------------------------------
// Central panel – summary sections and the viewed table
// ---------------------------------------------------------------------------

pub fn central_panel(ui: &mut Ui, state: &mut AppState) {
    if matches!(state.phase(), Phase::Empty) {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Start scanning your PBIX file  (Upload…)");
        });
        return;
    }

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            if let Phase::Loaded(loaded) = state.phase() {
                for section in loaded.summary.visible_sections() {
                    egui::CollapsingHeader::new(RichText::new(section.title).strong())
                        .id_salt(section.title)
                        .default_open(section.always_shown)
                        .show(ui, |ui: &mut Ui| {
                            batch_grid(ui, section.title, &section.batch, 240.0);
                        });
                    ui.separator();
                }
            }

            let Some((view, chart)) = state.view_and_chart() else {
                return;
            };
            ui.heading(format!(
                "{}  ({} rows)",
                view.table.name(),
                view.table.num_rows()
            ));
            batch_grid(ui, ("table_view", view.table.name()), view.table.batch(), 360.0);
            ui.separator();

            match (chart, &view.chart_error) {
                (Some(session), _) => {
                    session.render(ui);
                    ui.weak(chart_caption(session));
                }
                (None, Some(err)) => {
                    ui.colored_label(Color32::from_rgb(230, 160, 30), err);
                }
                (None, None) => {}
            }
        });
}

fn chart_caption(session: &VisualizationSession) -> String {
    let spec = session.spec();
    let series = if spec.y.is_empty() {
        "no columns".to_string()
    } else {
        spec.y.join(", ")
    };
    let mut text = format!(
        "{} chart of {series} against {}",
        spec.kind.label(),
        spec.x.as_deref().unwrap_or("row index")
    );
    match session.history().len() {
        0 => {}
        1 => text.push_str(" (1 change)"),
        n => text.push_str(&format!(" ({n} changes)")),
    }
    text
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog() -> Option<Action> {
    rfd::FileDialog::new()
        .set_title("Upload a PBIX file")
        .add_filter("Power BI model", &["pbix", "json"])
        .add_filter("PBIX", &["pbix"])
        .add_filter("Model export (JSON)", &["json"])
        .pick_file()
        .map(Action::Open)
}

fn save_file_dialog(label: &str, extension: &str) -> Option<std::path::PathBuf> {
    rfd::FileDialog::new()
        .set_title(format!("Export table as {label}"))
        .add_filter(label, &[extension])
        .save_file()
}
