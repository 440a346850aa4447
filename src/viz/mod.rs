//! Interactive chart exploration of a materialized table.

pub mod cache;

use std::path::{Path, PathBuf};

use anyhow::Context;
use arrow::array::AsArray;
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type};
use arrow::error::ArrowError;
use eframe::egui::{self, Ui};
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoints, Points};
use serde::Deserialize;
use thiserror::Error;

use crate::color::series_colors;
use crate::data::model::{MaterializedTable, TableKey};

#[derive(Debug, Error)]
pub enum VizError {
    #[error("chart config {}: {error:#}", path.display())]
    Config { path: PathBuf, error: anyhow::Error },
    #[error("table '{0}' has no numeric columns to chart")]
    NoPlottableColumns(String),
    #[error("column '{0}' is not a numeric column of this table")]
    UnknownColumn(String),
    #[error("converting column to numbers")]
    Arrow(#[from] ArrowError),
}

// ---------------------------------------------------------------------------
// Chart specification
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Line,
    Bar,
    Points,
}

impl ChartKind {
    pub const ALL: [ChartKind; 3] = [ChartKind::Line, ChartKind::Bar, ChartKind::Points];

    pub fn label(self) -> &'static str {
        match self {
            ChartKind::Line => "Line",
            ChartKind::Bar => "Bar",
            ChartKind::Points => "Points",
        }
    }
}

/// What to draw. `x: None` plots against the row index.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct ChartSpec {
    #[serde(default)]
    pub kind: ChartKind,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Vec<String>,
}

fn load_chart_spec(path: &Path) -> Result<ChartSpec, VizError> {
    let read = || -> anyhow::Result<ChartSpec> {
        let text = std::fs::read_to_string(path).context("reading file")?;
        serde_json::from_str(&text).context("parsing JSON")
    };
    read().map_err(|error| VizError::Config {
        path: path.to_path_buf(),
        error,
    })
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RendererMode {
    /// Chart controls are editable.
    #[default]
    Explore,
    ReadOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    SetKind(ChartKind),
    SetX(Option<String>),
    ToggleY(String),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct NumericColumn {
    name: String,
    /// Nulls are NaN.
    values: Vec<f64>,
}

/// A chart renderer bound to one materialized table.
#[derive(Debug)]
pub struct VisualizationSession {
    key: TableKey,
    mode: RendererMode,
    spec: ChartSpec,
    columns: Vec<NumericColumn>,
    row_count: usize,
    history: Vec<Interaction>,
}

/// Build a renderer for `table`, optionally starting from a chart config file.
pub fn build_renderer(
    table: &MaterializedTable,
    config_path: Option<&Path>,
    mode: RendererMode,
) -> Result<VisualizationSession, VizError> {
    let batch = table.batch();
    let schema = batch.schema();

    let mut columns = Vec::new();
    for (field, array) in schema.fields().iter().zip(batch.columns()) {
        if !field.data_type().is_numeric() {
            continue;
        }
        let floats = cast(array, &DataType::Float64)?;
        let values = floats
            .as_primitive::<Float64Type>()
            .iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        columns.push(NumericColumn {
            name: field.name().clone(),
            values,
        });
    }

    let Some(first) = columns.first() else {
        return Err(VizError::NoPlottableColumns(table.name().to_string()));
    };

    let mut spec = match config_path {
        Some(path) => load_chart_spec(path)?,
        None => ChartSpec::default(),
    };
    if spec.y.is_empty() {
        spec.y.push(first.name.clone());
    }
    let is_numeric = |name: &str| columns.iter().any(|c| c.name == name);
    for name in spec.x.iter().chain(&spec.y) {
        if !is_numeric(name) {
            return Err(VizError::UnknownColumn(name.clone()));
        }
    }

    log::debug!(
        "Built {:?} renderer for '{}' ({} numeric columns)",
        spec.kind,
        table.name(),
        columns.len()
    );

    Ok(VisualizationSession {
        key: table.key().clone(),
        mode,
        spec,
        columns,
        row_count: table.num_rows(),
        history: Vec::new(),
    })
}

impl VisualizationSession {
    pub fn spec(&self) -> &ChartSpec {
        &self.spec
    }

    pub fn history(&self) -> &[Interaction] {
        &self.history
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    fn column(&self, name: &str) -> Option<&NumericColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Apply a user interaction. Returns `false` when it changed nothing
    /// (read-only mode, unknown column, same value).
    pub fn apply(&mut self, interaction: Interaction) -> bool {
        if self.mode == RendererMode::ReadOnly {
            return false;
        }
        let changed = match &interaction {
            Interaction::SetKind(kind) => {
                let changed = self.spec.kind != *kind;
                self.spec.kind = *kind;
                changed
            }
            Interaction::SetX(x) => {
                if x.as_deref().is_some_and(|name| self.column(name).is_none()) {
                    return false;
                }
                let changed = self.spec.x != *x;
                self.spec.x = x.clone();
                changed
            }
            Interaction::ToggleY(name) => {
                if self.column(name).is_none() {
                    return false;
                }
                if let Some(pos) = self.spec.y.iter().position(|y| y == name) {
                    self.spec.y.remove(pos);
                } else {
                    self.spec.y.push(name.clone());
                }
                true
            }
        };
        if changed {
            self.history.push(interaction);
        }
        changed
    }

    /// Finite `[x, y]` points per selected y column.
    pub fn series(&self) -> Vec<(String, Vec<[f64; 2]>)> {
        let xs: Vec<f64> = match self.spec.x.as_deref().and_then(|x| self.column(x)) {
            Some(col) => col.values.clone(),
            None => (0..self.row_count).map(|i| i as f64).collect(),
        };
        self.spec
            .y
            .iter()
            .filter_map(|name| {
                let col = self.column(name)?;
                let points = xs
                    .iter()
                    .zip(&col.values)
                    .filter(|(x, y)| x.is_finite() && y.is_finite())
                    .map(|(&x, &y)| [x, y])
                    .collect();
                Some((name.clone(), points))
            })
            .collect()
    }

    pub fn render(&mut self, ui: &mut Ui) {
        if self.mode == RendererMode::Explore {
            let pending = self.controls(ui);
            for interaction in pending {
                self.apply(interaction);
            }
        }

        let kind = self.spec.kind;
        let series = self.series();
        let colors = series_colors(series.len());

        Plot::new(("chart", &self.key.table))
            .legend(Legend::default())
            .x_axis_label(self.spec.x.as_deref().unwrap_or("row"))
            .height(320.0)
            .show(ui, |plot_ui| {
                for ((name, points), color) in series.into_iter().zip(colors) {
                    match kind {
                        ChartKind::Line => {
                            let points: PlotPoints = points.into_iter().collect();
                            plot_ui.line(Line::new(points).name(&name).color(color).width(1.5));
                        }
                        ChartKind::Points => {
                            let points: PlotPoints = points.into_iter().collect();
                            plot_ui.points(Points::new(points).name(&name).color(color).radius(2.5));
                        }
                        ChartKind::Bar => {
                            let bars = points.into_iter().map(|[x, y]| Bar::new(x, y)).collect();
                            plot_ui.bar_chart(BarChart::new(bars).name(&name).color(color));
                        }
                    }
                }
            });
    }

    fn controls(&self, ui: &mut Ui) -> Vec<Interaction> {
        let mut pending = Vec::new();
        ui.horizontal(|ui: &mut Ui| {
            let mut kind = self.spec.kind;
            egui::ComboBox::from_id_salt(("chart_kind", &self.key.table))
                .selected_text(kind.label())
                .show_ui(ui, |ui: &mut Ui| {
                    for k in ChartKind::ALL {
                        ui.selectable_value(&mut kind, k, k.label());
                    }
                });
            if kind != self.spec.kind {
                pending.push(Interaction::SetKind(kind));
            }

            ui.label("x:");
            egui::ComboBox::from_id_salt(("chart_x", &self.key.table))
                .selected_text(self.spec.x.as_deref().unwrap_or("row index"))
                .show_ui(ui, |ui: &mut Ui| {
                    if ui.selectable_label(self.spec.x.is_none(), "row index").clicked() {
                        pending.push(Interaction::SetX(None));
                    }
                    for name in self.numeric_columns() {
                        let selected = self.spec.x.as_deref() == Some(name);
                        if ui.selectable_label(selected, name).clicked() {
                            pending.push(Interaction::SetX(Some(name.to_string())));
                        }
                    }
                });

            ui.label("y:");
            for name in self.numeric_columns() {
                let mut on = self.spec.y.iter().any(|y| y == name);
                if ui.checkbox(&mut on, name).changed() {
                    pending.push(Interaction::ToggleY(name.to_string()));
                }
            }

            ui.weak(format!("{} changes", self.history.len()));
        });
        pending
    }
}
