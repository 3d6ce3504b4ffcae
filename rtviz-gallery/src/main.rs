//! rtviz Gallery - every library sample in one window
//!
//! Pick a sample on the left, drag its sliders and watch the scene, plots
//! and readout follow along.

use eframe::egui;

use rtviz::egui_host::{readout_panel, RepaintScheduler};
use rtviz::prelude::*;

const SCENE_HEIGHT: f32 = 320.0;
const PLOT_HEIGHT: f32 = 220.0;

// ============================================================================
// Native entry point
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
fn main() -> eframe::Result<()> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title("rtviz Gallery"),
        ..Default::default()
    };

    eframe::run_native(
        "rtviz Gallery",
        options,
        Box::new(|cc| Ok(Box::new(GalleryApp::new(cc)))),
    )
}

// ============================================================================
// WASM entry point
// ============================================================================

#[cfg(target_arch = "wasm32")]
fn main() {
    use wasm_bindgen::JsCast;

    // Redirect panic messages to console.error
    console_error_panic_hook::set_once();

    wasm_bindgen_futures::spawn_local(async {
        let document = web_sys::window()
            .expect("No window")
            .document()
            .expect("No document");

        let canvas = document
            .get_element_by_id("rtviz-canvas")
            .expect("No canvas element with id 'rtviz-canvas'")
            .dyn_into::<web_sys::HtmlCanvasElement>()
            .expect("Element is not a canvas");

        eframe::WebRunner::new()
            .start(
                canvas,
                eframe::WebOptions::default(),
                Box::new(|cc| Ok(Box::new(GalleryApp::new(cc)))),
            )
            .await
            .expect("Failed to start eframe");
    });
}

struct GalleryApp {
    ctx: egui::Context,
    /// Index into `rtviz::samples::IDS`
    selected: usize,
    shell: Option<SampleShell>,
    host: EguiHost,
    /// Mount failure shown instead of the sample
    status: Option<String>,
}

impl GalleryApp {
    fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let mut app = Self {
            ctx: cc.egui_ctx.clone(),
            selected: 0,
            shell: None,
            host: EguiHost::new(),
            status: None,
        };
        app.select(0);
        app
    }

    /// Unmount the current sample and mount the one at `index`.
    fn select(&mut self, index: usize) {
        if let Some(mut shell) = self.shell.take() {
            shell.teardown(&mut self.host);
        }
        self.host = EguiHost::new();
        self.selected = index;
        self.status = None;

        let Some(sample) = rtviz::samples::IDS.get(index).and_then(|id| rtviz::samples::by_id(id)) else {
            self.status = Some(format!("no sample at index {index}"));
            return;
        };
        if let Some(readout) = &sample.schema.layout.readout {
            self.host.add_readout(&readout.container);
        }
        match SampleShell::mount(sample) {
            Ok(mut shell) => {
                shell.set_scheduler(Box::new(RepaintScheduler::new(self.ctx.clone())));
                self.shell = Some(shell);
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to mount sample");
                self.status = Some(format!("Failed to mount sample: {e}"));
            }
        }
    }

    fn sidebar(&mut self, ui: &mut egui::Ui) {
        ui.heading("Samples");
        let mut pick = None;
        for (i, id) in rtviz::samples::IDS.iter().enumerate() {
            if ui.selectable_label(i == self.selected, *id).clicked() && i != self.selected {
                pick = Some(i);
            }
        }
        if let Some(i) = pick {
            self.select(i);
        }

        let Some(shell) = self.shell.as_mut() else {
            return;
        };

        ui.separator();
        ui.heading("Parameters");
        if let Err(e) = parameter_controls(ui, shell.store_mut()) {
            tracing::warn!(error = %e, "parameter edit rejected");
        }

        ui.separator();
        let controls = shell.schema().controls.clone();
        ui.horizontal(|ui| {
            if controls.pause {
                let label = match shell.state() {
                    DriverState::Running => "Pause",
                    _ => "Play",
                };
                if ui.button(label).clicked() {
                    shell.toggle_pause();
                }
            }
            if controls.reset && ui.button("Reset").clicked() {
                shell.reset();
            }
        });
        for control in &controls.custom {
            if ui.button(&control.label).clicked() {
                if let Err(e) = shell.press(&control.id) {
                    tracing::warn!(control = %control.id, error = %e, "control failed");
                }
            }
        }
    }

    fn sample_view(&mut self, ui: &mut egui::Ui) {
        if let Some(status) = &self.status {
            ui.colored_label(ui.visuals().error_fg_color, status);
        }
        let Some(shell) = self.shell.as_mut() else {
            return;
        };

        ui.heading(shell.title());
        if let Some(description) = &shell.schema().description {
            ui.label(description);
        }

        // Painters are bound before the tick so this frame's draw calls
        // land in the canvases allocated below.
        let pixel_ratio = ui.ctx().pixels_per_point();
        let width = ui.available_width();
        let canvases: Vec<(String, f32)> = shell
            .schema()
            .layout
            .scenes
            .iter()
            .map(|s| (s.canvas_id.clone(), SCENE_HEIGHT))
            .chain(shell.schema().layout.plots.iter().map(|p| (p.canvas_id.clone(), PLOT_HEIGHT)))
            .collect();
        for (id, height) in &canvases {
            let (_, painter) = ui.allocate_painter(egui::vec2(width, *height), egui::Sense::hover());
            self.host.begin_canvas(id, painter, pixel_ratio);
        }

        let now = ui.ctx().input(|i| i.time);
        shell.frame(now, &mut self.host);

        ui.separator();
        let container = shell.schema().layout.readout.as_ref().map(|r| r.container.clone());
        readout_panel(ui, container.as_deref().and_then(|id| self.host.text(id)));
        if let Some(diagnostic) = shell.diagnostic() {
            ui.colored_label(ui.visuals().error_fg_color, diagnostic);
        }
    }
}

impl eframe::App for GalleryApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let minimized = ctx.input(|i| i.viewport().minimized.unwrap_or(false));
        if let Some(shell) = self.shell.as_mut() {
            shell.set_visible(!minimized);
        }

        egui::SidePanel::left("samples")
            .resizable(true)
            .default_width(280.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| self.sidebar(ui));
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| self.sample_view(ui));
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Some(mut shell) = self.shell.take() {
            shell.teardown(&mut self.host);
        }
    }
}
