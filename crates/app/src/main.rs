//! Opens an 800x600 window and renders a triangle until it is closed.
//!
//! Takes no command-line arguments. Settings come from an optional
//! `trigon.toml` in the working directory.

use std::process::ExitCode;

use anyhow::Result;
use tracing::info;

use trigon_app::Application;
use trigon_core::AppConfig;

fn run() -> Result<()> {
    let config = AppConfig::load()?;

    let mut app = Application::new(&config)?;
    app.run(config.debug.frame_limit)?;

    Ok(())
}

fn main() -> ExitCode {
    trigon_core::init_logging();
    info!("Starting triangle renderer");

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("FATAL ERROR: {e:#}");
            ExitCode::FAILURE
        }
    }
}
