use std::sync::mpsc;
use std::thread;

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::archive::{self, ARRAYS, FREQUENCIES};
use crate::state::{AppState, FetchOutcome};

// ---------------------------------------------------------------------------
// Left side panel – archive fetch form + filter widgets
// ---------------------------------------------------------------------------

/// Render the left panel: the archive fetch form on top, then the
/// metadata filters for whatever is loaded.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Archive");
    ui.separator();
    fetch_form(ui, state);

    ui.add_space(8.0);
    ui.heading("Filters");
    ui.separator();

    if state.curves.is_empty() {
        ui.label("No light curves loaded.");
        return;
    }

    // Clone what we need so we can mutate state inside the loop.
    let columns = state.curves.column_names.clone();
    let unique = state.curves.unique_values.clone();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Colour-by selector ----
            ui.strong("Color by");
            let current_color_col = state.color_column.clone().unwrap_or_default();
            egui::ComboBox::from_id_salt("color_by")
                .selected_text(&current_color_col)
                .show_ui(ui, |ui: &mut Ui| {
                    for col in &columns {
                        if ui
                            .selectable_label(current_color_col == *col, col)
                            .clicked()
                        {
                            state.set_color_column(col.clone());
                        }
                    }
                });
            ui.separator();

            // ---- Per-column filter widgets (collapsible) ----
            for col in &columns {
                let Some(all_values) = unique.get(col) else {
                    continue;
                };

                let selected = state.filters.entry(col.clone()).or_default();
                let n_selected = selected.len();
                let n_total = all_values.len();
                let header_text = format!("{col}  ({n_selected}/{n_total})");

                egui::CollapsingHeader::new(RichText::new(header_text).strong())
                    .id_salt(col)
                    .default_open(false)
                    .show(ui, |ui: &mut Ui| {
                        ui.horizontal(|ui: &mut Ui| {
                            if ui.small_button("All").clicked() {
                                state.select_all(col);
                            }
                            if ui.small_button("None").clicked() {
                                state.select_none(col);
                            }
                        });

                        // Re-borrow after potential mutation from All/None
                        let selected = state.filters.entry(col.clone()).or_default();

                        for val in all_values {
                            let is_selected = selected.contains(val);
                            let label = val.to_string();

                            // Colour swatch when this is the colour column
                            let mut text = RichText::new(&label);
                            if state.color_column.as_deref() == Some(col) {
                                if let Some(cm) = &state.color_map {
                                    text = text.color(cm.color_for(val));
                                }
                            }

                            let mut checked = is_selected;
                            if ui.checkbox(&mut checked, text).changed() {
                                if checked {
                                    selected.insert(val.clone());
                                } else {
                                    selected.remove(val);
                                }
                            }
                        }
                    });
            }
        });

    // Recompute visible indices after any checkbox changes.
    state.refilter();
}

/// The fetch form: asteroid designation plus array / frequency pickers.
fn fetch_form(ui: &mut Ui, state: &mut AppState) {
    ui.label("Asteroid");
    ui.text_edit_singleline(&mut state.fetch_name);

    ui.horizontal(|ui: &mut Ui| {
        egui::ComboBox::from_id_salt("array")
            .selected_text(&state.fetch_array)
            .width(80.0)
            .show_ui(ui, |ui: &mut Ui| {
                for array in ARRAYS {
                    ui.selectable_value(&mut state.fetch_array, array.to_string(), *array);
                }
            });
        egui::ComboBox::from_id_salt("frequency")
            .selected_text(&state.fetch_frequency)
            .width(80.0)
            .show_ui(ui, |ui: &mut Ui| {
                for freq in FREQUENCIES {
                    ui.selectable_value(&mut state.fetch_frequency, freq.to_string(), *freq);
                }
            });
    });

    // Show the object key the form resolves to, so the convention is
    // visible to the user.
    let key = state.fetch_key();
    ui.label(
        RichText::new(key.object_key())
            .monospace()
            .color(Color32::DARK_GRAY),
    );

    let can_fetch = !state.loading && !state.fetch_name.trim().is_empty();
    if ui
        .add_enabled(can_fetch, egui::Button::new("Fetch from archive"))
        .clicked()
    {
        start_fetch(ui.ctx().clone(), state);
    }
    if state.loading {
        ui.horizontal(|ui: &mut Ui| {
            ui.spinner();
            ui.label("Fetching…");
        });
    }
}

/// Kick off the download on a worker thread; `AppState::poll_fetch`
/// picks the outcome up on a later frame.
fn start_fetch(ctx: egui::Context, state: &mut AppState) {
    let key = state.fetch_key();
    let (tx, rx) = mpsc::channel();
    state.fetch_rx = Some(rx);
    state.loading = true;
    state.status_message = None;

    thread::spawn(move || {
        let result = archive::fetch(&key);
        // The UI may have shut down; nothing to do then.
        let _ = tx.send(FetchOutcome { key, result });
        ctx.request_repaint();
    });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            if ui.button("Clear").clicked() {
                state.clear();
                ui.close_menu();
            }
        });

        ui.separator();

        if !state.curves.is_empty() {
            ui.label(format!(
                "{} light curves loaded, {} visible",
                state.curves.len(),
                state.visible_indices.len()
            ));
        }

        ui.separator();

        ui.checkbox(&mut state.show_error_bars, "Error bars");

        if ui
            .selectable_label(state.normalize_flux, "Normalize")
            .clicked()
        {
            state.normalize_flux = !state.normalize_flux;
        }

        let weight_ceiling = state
            .curves
            .curves
            .iter()
            .map(|c| c.max_weight())
            .fold(0.0, f64::max)
            .max(1.0);
        ui.add(
            egui::Slider::new(&mut state.min_weight, 0.0..=weight_ceiling)
                .text("min weight"),
        );

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open light curve")
        .add_filter("Supported files", &["fits", "fit", "csv", "json"])
        .add_filter("FITS", &["fits", "fit"])
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .pick_file();

    if let Some(path) = file {
        match crate::data::loader::load_file(&path) {
            Ok(curve) => {
                log::info!(
                    "Loaded {} ({} points) from {}",
                    curve.label(),
                    curve.len(),
                    path.display()
                );
                state.add_curve(curve);
            }
            Err(e) => {
                log::error!("Failed to load file: {e:#}");
                state.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}
