use eframe::egui::{Color32, Ui};
use egui_plot::{Line, MarkerShape, Plot, PlotPoints, Points};

use crate::data::model::LightCurve;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Light-curve plot (central panel)
// ---------------------------------------------------------------------------

/// Render the light-curve scatter plot in the central panel.
pub fn lightcurve_plot(ui: &mut Ui, state: &AppState) {
    if state.curves.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Fetch a light curve from the archive, or File → Open…");
        });
        return;
    }

    let color_map = &state.color_map;
    let color_col = state.color_column.as_deref();

    let x_label = axis_label("Time", state.curves.curves.first().and_then(|c| c.time_unit.as_deref()));
    let y_label = if state.normalize_flux {
        "Normalized flux".to_string()
    } else {
        axis_label("Flux", state.curves.curves.first().and_then(|c| c.flux_unit.as_deref()))
    };

    Plot::new("lightcurve_plot")
        .legend(egui_plot::Legend::default())
        .x_axis_label(x_label)
        .y_axis_label(y_label)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            for &idx in &state.visible_indices {
                let curve = &state.curves.curves[idx];

                // Colour from the colour-by column.
                let color = color_col
                    .and_then(|col| {
                        let val = curve.metadata.get(col)?;
                        let cm = color_map.as_ref()?;
                        Some(cm.color_for(val))
                    })
                    .unwrap_or(Color32::LIGHT_BLUE);

                // Legend name from the colour column value, falling back
                // to the curve's own provenance label.
                let name = color_col
                    .and_then(|col| curve.metadata.get(col))
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| curve.label());

                let samples =
                    visible_points(curve, state.min_weight, state.normalize_flux);

                if state.show_error_bars {
                    for &[t, flux, sigma] in &samples {
                        let whisker: PlotPoints =
                            vec![[t, flux - sigma], [t, flux + sigma]].into();
                        plot_ui.line(Line::new(whisker).color(color).width(1.0));
                    }
                }

                let points: Vec<[f64; 2]> =
                    samples.iter().map(|&[t, flux, _]| [t, flux]).collect();
                let scatter = Points::new(PlotPoints::from(points))
                    .name(&name)
                    .color(color)
                    .shape(MarkerShape::Circle)
                    .radius(2.5);
                plot_ui.points(scatter);
            }
        });
}

/// The samples of a curve that survive the weight cutoff, mapped through
/// the flux transform: `[time, flux, sigma]` per point. Points below the
/// cutoff are only omitted from the output; the curve itself is never
/// modified.
fn visible_points(curve: &LightCurve, min_weight: f64, normalize: bool) -> Vec<[f64; 3]> {
    let (scale, offset) = flux_transform(curve, normalize);
    (0..curve.len())
        .filter(|&i| curve.weight[i] >= min_weight)
        .map(|i| {
            let flux = (curve.flux[i] - offset) * scale;
            [curve.time[i], flux, curve.flux_uncertainty[i] * scale]
        })
        .collect()
}

fn axis_label(quantity: &str, unit: Option<&str>) -> String {
    match unit {
        Some(unit) => format!("{quantity} ({unit})"),
        None => quantity.to_string(),
    }
}

/// Scale and offset mapping raw flux to the displayed value. Identity
/// unless normalization is on; a zero-range curve renders flat at 0.
fn flux_transform(curve: &LightCurve, normalize: bool) -> (f64, f64) {
    if !normalize {
        return (1.0, 0.0);
    }
    let min = curve.flux.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = curve.flux.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range.abs() < f64::EPSILON || !range.is_finite() {
        (0.0, min)
    } else {
        (1.0 / range, min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(flux: Vec<f64>) -> LightCurve {
        LightCurve {
            time: (0..flux.len()).map(|i| i as f64).collect(),
            flux_uncertainty: vec![0.1; flux.len()],
            weight: vec![1.0; flux.len()],
            flux,
            ..Default::default()
        }
    }

    #[test]
    fn identity_transform_without_normalization() {
        assert_eq!(flux_transform(&curve(vec![5.0, 10.0]), false), (1.0, 0.0));
    }

    #[test]
    fn normalization_maps_flux_to_unit_range() {
        let c = curve(vec![10.0, 20.0, 15.0]);
        let (scale, offset) = flux_transform(&c, true);
        assert_eq!((20.0 - offset) * scale, 1.0);
        assert_eq!((10.0 - offset) * scale, 0.0);
        assert_eq!((15.0 - offset) * scale, 0.5);
    }

    #[test]
    fn zero_range_curve_renders_flat() {
        let c = curve(vec![7.0, 7.0]);
        let (scale, offset) = flux_transform(&c, true);
        assert_eq!((7.0 - offset) * scale, 0.0);
    }

    #[test]
    fn weight_cutoff_hides_points_without_touching_the_curve() {
        let mut c = curve(vec![10.0, 11.0, 12.0]);
        c.weight = vec![2.0, 0.4, 1.0];

        let samples = visible_points(&c, 1.0, false);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0][0], 0.0);
        assert_eq!(samples[1][0], 2.0);

        // The underlying data is untouched, only the view thins out.
        assert_eq!(c.len(), 3);
        assert_eq!(c.weight, vec![2.0, 0.4, 1.0]);
        assert_eq!(c.flux, vec![10.0, 11.0, 12.0]);
    }

    #[test]
    fn weight_equal_to_the_cutoff_stays_visible() {
        let mut c = curve(vec![10.0, 11.0]);
        c.weight = vec![1.0, 0.999];
        let samples = visible_points(&c, 1.0, false);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0][1], 10.0);
    }

    #[test]
    fn visible_points_apply_the_flux_transform_to_sigma_too() {
        let mut c = curve(vec![10.0, 20.0]);
        c.flux_uncertainty = vec![5.0, 5.0];
        let samples = visible_points(&c, 0.0, true);
        // Range is 10, so both flux and sigma scale by 1/10.
        assert_eq!(samples[0], [0.0, 0.0, 0.5]);
        assert_eq!(samples[1], [1.0, 1.0, 0.5]);
    }

    #[test]
    fn axis_labels_include_units_when_known() {
        assert_eq!(axis_label("Time", Some("MJD")), "Time (MJD)");
        assert_eq!(axis_label("Flux", None), "Flux");
    }
}
