use std::time::Duration;

use eframe::egui;

use crate::clock::{spawn_clock, ClockSlot};
use crate::config::ScannerConfig;
use crate::data::extract::ModelExportExtractor;
use crate::data::model::UploadedArchive;
use crate::state::{Action, AppState};
use crate::ui::panels;

const CLOCK_PERIOD: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct ScannerApp {
    pub state: AppState,
    clock: Option<ClockSlot>,
}

impl ScannerApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let config = ScannerConfig::from_env();
        log::info!("Starting with {config:?}");

        let ctx = cc.egui_ctx.clone();
        let clock = match spawn_clock(CLOCK_PERIOD, move || ctx.request_repaint()) {
            // The updater is detached; it ends with the process.
            Ok((slot, _updater)) => Some(slot),
            Err(e) => {
                log::warn!("Live clock unavailable: {e}");
                None
            }
        };

        Self {
            state: AppState::new(Box::new(ModelExportExtractor), config),
            clock,
        }
    }
}

impl eframe::App for ScannerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = self.clock.as_mut().and_then(ClockSlot::display);
        let mut actions = dropped_files(ctx);

        // ---- Top panel: title, upload, status, clock ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &self.state, now.as_deref(), &mut actions);
        });

        // ---- Left side panel: model overview, table picker ----
        egui::SidePanel::left("model_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &self.state, &mut actions);
            });

        // ---- Central panel: summary sections, viewed table, chart ----
        egui::CentralPanel::default().show(ctx, |ui| {
            panels::central_panel(ui, &mut self.state);
        });

        if actions.is_empty() {
            return;
        }
        for action in actions {
            log::debug!("Handling {action:?}");
            self.state.handle(action);
        }
        ctx.request_repaint();
    }
}

/// Files dropped onto the window. Native platforms hand over a path, the web
/// backend hands over the bytes.
fn dropped_files(ctx: &egui::Context) -> Vec<Action> {
    ctx.input(|i| i.raw.dropped_files.clone())
        .into_iter()
        .filter_map(|file| match (file.bytes, file.path) {
            (Some(bytes), _) => Some(Action::Upload(UploadedArchive::new(file.name, bytes))),
            (None, Some(path)) => Some(Action::Open(path)),
            (None, None) => None,
        })
        .collect()
}
