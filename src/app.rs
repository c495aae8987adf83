use eframe::egui;

use crate::state::AppState;
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RustyCeresApp {
    pub state: AppState,
}

impl eframe::App for RustyCeresApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Pick up any finished archive fetch before drawing.
        self.state.poll_fetch();
        if self.state.loading {
            // Keep painting while the worker runs so its result lands promptly.
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }

        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: archive fetch + filters ----
        egui::SidePanel::left("archive_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: light-curve plot ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::lightcurve_plot(ui, &self.state);
        });
    }
}
