// Entrypoint for the CLI application.
// - Keeps `main` small: load configuration, set up logging, dispatch.
// - Returns `anyhow::Result`; failures are printed and exit with code 1.

use clap::Parser;
use vmfleet_cli::cli::{self, Cli};
use vmfleet_cli::config::Config;
use vmfleet_cli::logging::init_tracing;

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // dotenv files first, then the process environment.
    let mut config = Config::load()?;
    if let Some(url) = &args.base_url {
        anyhow::ensure!(url.starts_with("http"), "--base-url must start with http: {url}");
        config.base_url = url.trim_end_matches('/').to_string();
    }

    let level = if args.verbose { "debug" } else { config.tracing_level() };
    init_tracing(level, args.log_json);
    tracing::debug!(?config, "configuration loaded");

    if let Err(e) = cli::run(args, config) {
        vmfleet_cli::ui::failure(&format!("{e:#}"));
        std::process::exit(1);
    }
    Ok(())
}
