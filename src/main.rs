#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod api;
mod app;
mod config;
mod grid;
mod interact;
mod io;
mod model;
mod ui;

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_min_inner_size([800.0, 400.0])
            .with_title("Planboard"),
        ..Default::default()
    };

    eframe::run_native(
        "Planboard",
        options,
        Box::new(|cc| Ok(Box::new(app::BoardApp::new(cc)))),
    )
}
