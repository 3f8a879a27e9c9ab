//! Headless labcraft authority.
//!
//! Loads a session directory, plays its intent script and verifies that
//! every observer mirror stays identical to the authority.
//!
//! # Usage
//!
//! ```bash
//! # Run the bundled lab with its own script
//! cargo run -p labcraft-headless -- crates/labcraft-headless/sessions/teaching_lab
//!
//! # Longer run, three observers, one joining late, JSON report on stdout
//! cargo run -p labcraft-headless -- <dir> --ticks 600 --observers 3 --late-join 120 --json
//! ```
//!
//! Logs go to stderr; `RUST_LOG` overrides the level picked by `--verbose`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use labcraft_core::fixed::fixed64_to_f64;
use labcraft_headless::runner::{RunConfig, RunReport, Runner};
use labcraft_headless::script::Script;

#[derive(Parser)]
#[command(name = "labcraft-headless")]
#[command(about = "Run a labcraft session headless and check replication")]
#[command(version)]
struct Cli {
    /// Session directory containing a session.ron / .toml / .json file
    session: PathBuf,

    /// Intent script (defaults to script.ron in the session directory)
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Number of authority steps (defaults to the script's own length, else 300)
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Observer mirrors present from the first tick
    #[arg(short, long, default_value = "1")]
    observers: usize,

    /// Add an observer that joins from a snapshot at this tick
    #[arg(long)]
    late_join: Option<u64>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match run(&cli) {
        Ok(report) => {
            print_report(&report, cli.json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<RunReport, Box<dyn std::error::Error>> {
    let session = labcraft_data::load_session(&cli.session)?;
    let script_path = cli
        .script
        .clone()
        .unwrap_or_else(|| cli.session.join("script.ron"));
    let script = Script::load(&script_path)?;
    let steps = script.resolve(&session)?;

    let config = RunConfig {
        ticks: cli.ticks.or(script.ticks).unwrap_or(300),
        observers: cli.observers,
        late_observer_at: cli.late_join,
    };
    tracing::info!(
        session = %session.source.display(),
        script = %script_path.display(),
        ticks = config.ticks,
        tick_rate = session.tick_rate,
        steps = steps.len(),
        "starting run"
    );

    let mut runner = Runner::new(session, steps, &config);
    Ok(runner.run(config.ticks)?)
}

fn print_report(report: &RunReport, json: bool) {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(text) => println!("{text}"),
            Err(e) => tracing::error!("failed to serialize report: {e}"),
        }
        return;
    }

    println!("ticks:        {}", report.ticks);
    println!("events:       {}", report.events);
    println!("frames:       {} ({} bytes)", report.frames, report.bytes);
    println!("observers:    {} ({} resyncs)", report.observers, report.resyncs);
    println!("participants: {}", report.participants);
    for (name, count) in &report.deliveries {
        println!("delivered:    {name} = {count}");
    }
    if let Some(goal) = &report.goal {
        let status = match (goal.active, goal.is_complete()) {
            (false, _) => "time up",
            (true, true) => "complete",
            (true, false) => "running",
        };
        println!(
            "goal:         {}/{} in {:.1}s ({status})",
            goal.delivered,
            goal.target,
            fixed64_to_f64(goal.elapsed)
        );
    }
    if report.paused {
        println!("paused:       yes");
    }
    println!("state hash:   {:#018x}", report.state_hash);
    println!("replication:  PASS");
}
