// reftty: Time-Travel Ownership and Dispatch Sandbox

use std::io;

use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use reftty::config::SandboxConfig;
use reftty::scenario::{library, Session};
use reftty::ui::App;

/// Step through ownership and dispatch scenarios one line at a time
#[derive(Debug, Parser)]
#[command(name = "reftty", version, about)]
struct Cli {
    /// Scenario to run (defaults to the first built-in scenario)
    scenario: Option<String>,

    /// List the built-in scenarios and exit
    #[arg(long)]
    list: bool,

    /// Print the terminal transcript instead of opening the TUI
    #[arg(long)]
    headless: bool,

    /// Snapshot history limit in megabytes
    #[arg(long, value_name = "MB")]
    snapshot_limit_mb: Option<usize>,

    /// Maximum number of simultaneously live heap nodes
    #[arg(long, value_name = "N")]
    max_nodes: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.list {
        for scenario in library::builtin() {
            println!("{:<16} {}", scenario.name, scenario.title);
        }
        return Ok(());
    }

    let mut config = SandboxConfig::default();
    if let Some(mb) = cli.snapshot_limit_mb {
        config = config.with_snapshot_limit(mb.saturating_mul(1024 * 1024));
    }
    if let Some(max_nodes) = cli.max_nodes {
        config = config.with_max_nodes(max_nodes);
    }

    let scenario = match cli.scenario.as_deref() {
        Some(name) => match library::find(name) {
            Some(scenario) => scenario,
            None => {
                eprintln!("Error: Unknown scenario '{}'", name);
                eprintln!();
                eprintln!("Available scenarios:");
                for scenario in library::builtin() {
                    eprintln!("  {}", scenario.name);
                }
                std::process::exit(1);
            }
        },
        None => match library::builtin().into_iter().next() {
            Some(scenario) => scenario,
            None => return Err("no built-in scenarios".into()),
        },
    };

    // Run the whole scenario up front to build history
    let mut session = Session::new(scenario, &config);
    if let Err(err) = session.run() {
        warn!(error = %err, "scenario halted");
        if !cli.headless {
            eprintln!("Scenario halted: {}", err);
            eprintln!("Entering TUI with partial history...");
        }
    }

    if cli.headless {
        for line in session.transcript() {
            println!("{}", line);
        }
        return match session.error() {
            Some(err) => Err(err.clone().into()),
            None => Ok(()),
        };
    }

    // Start the viewer before the first step
    if let Err(err) = session.rewind_to_start() {
        eprintln!("Warning: Failed to rewind to start: {}", err);
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(session);
    let res = app.run(&mut terminal);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}
