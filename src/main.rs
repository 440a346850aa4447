mod app;
mod clock;
mod color;
mod config;
mod data;
mod error;
mod state;
mod summary;
mod ui;
mod viz;

use app::ScannerApp;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Power BI Scanner")
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Power BI Scanner",
        options,
        Box::new(|cc| Ok(Box::new(ScannerApp::new(cc)))),
    )
}
