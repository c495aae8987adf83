use std::collections::{BTreeMap, BTreeSet};

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::data::model::MetaValue;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// `n` visually distinct colours from evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    (0..n).map(|i| hue_color(i as f32 / n.max(1) as f32)).collect()
}

/// Map `t` in [0, 1] onto the hue wheel.
fn hue_color(t: f32) -> Color32 {
    let hsl = Hsl::new(t.clamp(0.0, 1.0) * 300.0, 0.75, 0.55);
    let rgb: Srgb = hsl.into_color();
    Color32::from_rgb(
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    )
}

// ---------------------------------------------------------------------------
// Color mapping: metadata value → Color32
// ---------------------------------------------------------------------------

/// Maps the values of a chosen metadata column to colours. Columns whose
/// values are all numeric (e.g. an orbital period keyword) get a
/// continuous hue gradient; everything else (asteroid names, array and
/// frequency identifiers) gets one distinct colour per value.
#[derive(Debug, Clone)]
pub struct ColorMap {
    pub column: String,
    scale: Scale,
    default_color: Color32,
}

#[derive(Debug, Clone)]
enum Scale {
    Categorical(BTreeMap<MetaValue, Color32>),
    Numeric { min: f64, max: f64 },
}

impl ColorMap {
    /// Build a colour map for the given column from its unique values.
    pub fn new(column: &str, unique_values: &BTreeSet<MetaValue>) -> Self {
        let numeric: Vec<f64> = unique_values.iter().filter_map(MetaValue::as_f64).collect();

        let scale = if numeric.len() == unique_values.len() && numeric.len() > 1 {
            let min = numeric.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = numeric.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            Scale::Numeric { min, max }
        } else {
            let palette = generate_palette(unique_values.len());
            Scale::Categorical(
                unique_values
                    .iter()
                    .cloned()
                    .zip(palette)
                    .collect(),
            )
        };

        ColorMap {
            column: column.to_string(),
            scale,
            default_color: Color32::GRAY,
        }
    }

    /// Look up the colour for a metadata value.
    pub fn color_for(&self, value: &MetaValue) -> Color32 {
        match &self.scale {
            Scale::Categorical(mapping) => {
                mapping.get(value).copied().unwrap_or(self.default_color)
            }
            Scale::Numeric { min, max } => match value.as_f64() {
                Some(v) if max > min => hue_color(((v - min) / (max - min)) as f32),
                Some(_) => hue_color(0.0),
                None => self.default_color,
            },
        }
    }
}
