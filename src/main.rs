// Entrypoint for the CLI application.
// - Keeps `main` small: build the configuration and client, then hand
//   off to the UI loop.
// - Returns `anyhow::Result` so setup failures print with context.

use aidreport_cli::{api::ReportClient, config::Config, ui::main_menu};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Attempt narration goes through `tracing`; default to info unless
    // RUST_LOG says otherwise.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let client = ReportClient::from_config(config)?;

    // Start the interactive menu. This call blocks until the user exits.
    main_menu(client)?;
    Ok(())
}
