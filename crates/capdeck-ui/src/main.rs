#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod context;
mod helpers;
mod modules;
mod theme;

fn main() -> eframe::Result {
    let native_options = eframe::NativeOptions {
        centered: true,
        viewport: egui::ViewportBuilder::default()
            .with_title("⏺ CapDeck")
            .with_inner_size([1080.0, 720.0])
            .with_min_inner_size([760.0, 520.0])
            .with_resizable(true),
        ..Default::default()
    };

    eframe::run_native(
        "CapDeck",
        native_options,
        Box::new(|cc| Ok(Box::new(app::CapDeckApp::new(cc)))),
    )
}
