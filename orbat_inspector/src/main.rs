use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use orbat_core::{load_scenario_file, load_store_config_from_env};
use orbat_runtime::{parse_command_line, parse_script};
use tracing::{info, warn};

mod app;

use app::InspectorApp;

#[derive(Parser, Debug)]
#[command(author, version, about = "ORBAT scenario inspector", long_about = None)]
struct Cli {
    /// Scenario document to load.
    #[arg(long)]
    scenario: PathBuf,
    /// Initial time (epoch milliseconds or RFC 3339); defaults to the scenario start.
    #[arg(long)]
    at: Option<String>,
    /// File with one command per line. Commands are read from stdin when omitted.
    #[arg(long)]
    script: Option<PathBuf>,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let (config, metadata) = load_store_config_from_env();
    if let Some(path) = metadata.path() {
        info!(target: "orbat::inspector", path = %path.display(), "inspector.config");
    }

    let store = load_scenario_file(&cli.scenario, config)
        .wrap_err_with(|| format!("failed to load {}", cli.scenario.display()))?;
    info!(
        target: "orbat::inspector",
        scenario = %cli.scenario.display(),
        units = store.state().unit_map.len(),
        "inspector.loaded"
    );

    let mut app = InspectorApp::new(store);
    if let Some(at) = &cli.at {
        let timestamp = orbat_schema::parse_timestamp(at)
            .wrap_err_with(|| format!("invalid --at value '{at}'"))?;
        app.set_time(timestamp);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", serde_json::to_string(&app.summary())?)?;

    match &cli.script {
        Some(path) => {
            let script = fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read script {}", path.display()))?;
            for command in parse_script(&script)? {
                let output = app.execute(&command)?;
                writeln!(out, "{}", serde_json::to_string(&output)?)?;
            }
        }
        None => {
            for line in io::stdin().lock().lines() {
                let line = line?;
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                if matches!(trimmed, "quit" | "exit") {
                    break;
                }
                match parse_command_line(trimmed) {
                    Ok(command) => {
                        let output = app.execute(&command)?;
                        writeln!(out, "{}", serde_json::to_string(&output)?)?;
                    }
                    Err(err) => warn!(target: "orbat::inspector", error = %err, "command.rejected"),
                }
                out.flush()?;
            }
        }
    }

    Ok(())
}
