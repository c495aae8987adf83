use std::collections::BTreeSet;
use std::sync::mpsc::{Receiver, TryRecvError};

use crate::archive::{ArchiveError, ArchiveResult, LightCurveKey, ARRAYS, FREQUENCIES};
use crate::color::ColorMap;
use crate::data::filter::{filtered_indices, init_filter_state, FilterState};
use crate::data::model::{LightCurve, LightCurveSet};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// What a background fetch thread reports back to the UI.
pub struct FetchOutcome {
    pub key: LightCurveKey,
    pub result: ArchiveResult<LightCurve>,
}

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Every curve currently loaded (archive fetches and local files).
    pub curves: LightCurveSet,

    /// Per-metadata-column filter selections.
    pub filters: FilterState,

    /// Indices of curves passing the current filters (cached).
    pub visible_indices: Vec<usize>,

    /// Which metadata column is used for colouring.
    pub color_column: Option<String>,

    /// Active colour map.
    pub color_map: Option<ColorMap>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    /// Whether an archive fetch is in flight.
    pub loading: bool,

    /// Channel from the in-flight fetch thread, if any.
    pub fetch_rx: Option<Receiver<FetchOutcome>>,

    // ---- Fetch form ----
    pub fetch_name: String,
    pub fetch_array: String,
    pub fetch_frequency: String,

    // ---- Display options ----
    pub show_error_bars: bool,
    pub normalize_flux: bool,
    /// Points with `Weight` below this are hidden from the plot.
    pub min_weight: f64,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            curves: LightCurveSet::default(),
            filters: FilterState::default(),
            visible_indices: Vec::new(),
            color_column: None,
            color_map: None,
            status_message: None,
            loading: false,
            fetch_rx: None,
            fetch_name: String::new(),
            fetch_array: ARRAYS[0].to_string(),
            fetch_frequency: FREQUENCIES[0].to_string(),
            show_error_bars: true,
            normalize_flux: false,
            min_weight: 0.0,
        }
    }
}

impl AppState {
    /// Ingest a newly loaded curve: reset filters to show everything and
    /// default the colour column to the curve provenance.
    pub fn add_curve(&mut self, curve: LightCurve) {
        self.curves.push(curve);
        self.filters = init_filter_state(&self.curves);
        self.visible_indices = (0..self.curves.len()).collect();

        if self.color_column.is_none() {
            self.color_column = self.curves.column_names.first().cloned();
        }
        self.rebuild_color_map();
        self.status_message = None;
    }

    /// Drop all loaded curves and reset the view.
    pub fn clear(&mut self) {
        self.curves = LightCurveSet::default();
        self.filters.clear();
        self.visible_indices.clear();
        self.color_column = None;
        self.color_map = None;
        self.status_message = None;
    }

    /// Rebuild the colour map from the current `color_column`.
    pub fn rebuild_color_map(&mut self) {
        self.color_map = self.color_column.as_ref().and_then(|col| {
            self.curves
                .unique_values
                .get(col)
                .map(|vals| ColorMap::new(col, vals))
        });
    }

    /// Recompute `visible_indices` after a filter change.
    pub fn refilter(&mut self) {
        self.visible_indices = filtered_indices(&self.curves, &self.filters);
    }

    /// Set colour column and rebuild the map.
    pub fn set_color_column(&mut self, col: String) {
        self.color_column = Some(col);
        self.rebuild_color_map();
    }

    /// Select all values in a column.
    pub fn select_all(&mut self, column: &str) {
        if let Some(all_vals) = self.curves.unique_values.get(column) {
            self.filters.insert(column.to_string(), all_vals.clone());
            self.refilter();
        }
    }

    /// Deselect all values in a column.
    pub fn select_none(&mut self, column: &str) {
        self.filters.insert(column.to_string(), BTreeSet::new());
        self.refilter();
    }

    /// The key currently described by the fetch form.
    pub fn fetch_key(&self) -> LightCurveKey {
        LightCurveKey::new(&self.fetch_name, &self.fetch_array, &self.fetch_frequency)
    }

    /// Drain the fetch channel, if a worker has reported back.
    pub fn poll_fetch(&mut self) {
        let Some(rx) = self.fetch_rx.take() else { return };
        match rx.try_recv() {
            Ok(FetchOutcome { key, result }) => {
                self.loading = false;
                match result {
                    Ok(curve) => {
                        log::info!("Loaded {} ({} points)", key.object_key(), curve.len());
                        self.add_curve(curve);
                        self.status_message = None;
                    }
                    Err(e) => {
                        log::error!("Fetch failed: {e:#}");
                        self.status_message = Some(archive_error_message(&e));
                    }
                }
            }
            Err(TryRecvError::Empty) => {
                self.fetch_rx = Some(rx);
            }
            Err(TryRecvError::Disconnected) => {
                // Worker died without reporting (panicked); recover the UI.
                self.loading = false;
                self.status_message = Some("Fetch aborted unexpectedly".to_string());
            }
        }
    }

}

fn archive_error_message(e: &ArchiveError) -> String {
    match e {
        ArchiveError::NotFound(key) => {
            format!("Not in archive: {key}")
        }
        other => format!("Error: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::MetaValue;
    use std::sync::mpsc;

    fn curve(array: &str) -> LightCurve {
        LightCurve {
            time: vec![0.0, 1.0],
            flux: vec![1.0, 2.0],
            flux_uncertainty: vec![0.1, 0.2],
            weight: vec![1.0, 1.0],
            metadata: [("array".to_string(), MetaValue::String(array.to_string()))]
                .into_iter()
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn add_curve_resets_filters_and_visibility() {
        let mut state = AppState::default();
        state.add_curve(curve("pa4"));
        state.add_curve(curve("pa5"));

        assert_eq!(state.visible_indices, vec![0, 1]);
        assert_eq!(state.color_column.as_deref(), Some("array"));
        assert!(state.color_map.is_some());
    }

    #[test]
    fn select_none_then_all_roundtrips_visibility() {
        let mut state = AppState::default();
        state.add_curve(curve("pa4"));
        state.add_curve(curve("pa5"));

        state.select_none("array");
        assert!(state.visible_indices.is_empty());

        state.select_all("array");
        assert_eq!(state.visible_indices, vec![0, 1]);
    }

    #[test]
    fn poll_fetch_ingests_a_successful_outcome() {
        let mut state = AppState::default();
        let (tx, rx) = mpsc::channel();
        state.fetch_rx = Some(rx);
        state.loading = true;

        tx.send(FetchOutcome {
            key: LightCurveKey::new("ceres", "pa5", "f150"),
            result: Ok(curve("pa5")),
        })
        .unwrap();

        state.poll_fetch();
        assert!(!state.loading);
        assert!(state.fetch_rx.is_none());
        assert_eq!(state.curves.len(), 1);
    }

    #[test]
    fn poll_fetch_surfaces_not_found() {
        let mut state = AppState::default();
        let (tx, rx) = mpsc::channel();
        state.fetch_rx = Some(rx);
        state.loading = true;

        tx.send(FetchOutcome {
            key: LightCurveKey::new("nonexistent", "pa5", "f150"),
            result: Err(ArchiveError::NotFound("nonexistent_lc_pa5_f150.fits".into())),
        })
        .unwrap();

        state.poll_fetch();
        assert!(!state.loading);
        assert!(state
            .status_message
            .as_deref()
            .unwrap()
            .contains("Not in archive"));
        assert!(state.curves.is_empty());
    }

    #[test]
    fn poll_fetch_recovers_from_a_dead_worker() {
        let mut state = AppState::default();
        let (tx, rx) = mpsc::channel::<FetchOutcome>();
        state.fetch_rx = Some(rx);
        state.loading = true;
        drop(tx);

        state.poll_fetch();
        assert!(!state.loading);
        assert!(state.status_message.is_some());
    }

    #[test]
    fn clear_resets_everything() {
        let mut state = AppState::default();
        state.add_curve(curve("pa4"));
        state.clear();

        assert!(state.curves.is_empty());
        assert!(state.visible_indices.is_empty());
        assert!(state.color_map.is_none());
    }
}
