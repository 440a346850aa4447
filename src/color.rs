use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Chart series palette
// ---------------------------------------------------------------------------

/// Golden angle, in degrees.
const HUE_STEP: f32 = 137.507_77;

/// `n` distinct colours for chart series, first one blue-ish.
pub fn series_colors(n: usize) -> Vec<Color32> {
    (0..n)
        .map(|i| {
            let hue = (210.0 + i as f32 * HUE_STEP) % 360.0;
            let rgb: Srgb = Hsl::new(hue, 0.70, 0.55).into_color();
            Color32::from_rgb(
                (rgb.red * 255.0).round() as u8,
                (rgb.green * 255.0).round() as u8,
                (rgb.blue * 255.0).round() as u8,
            )
        })
        .collect()
}
