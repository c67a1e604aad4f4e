// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod config;
mod drivers;
mod engine;
mod gui;
mod recorder;
mod types;
use anyhow::Context;
use eframe::egui;
use env_logger::Env;
use log::info;
use crate::config::AppConfig;
// 入口函数
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let config = AppConfig::load().context("loading configuration")?;
    info!("Default port: {}", config.port.as_deref().unwrap_or("(none)"));
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1280.0, 800.0])
        .with_min_inner_size([960.0, 600.0])
        .with_title("DPScope");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        "DPScope",
        options,
        Box::new(|_cc| Box::new(gui::DpScopeApp::new(config))),
    )
    .map_err(|e| anyhow::anyhow!("GUI failed: {e}"))
}
