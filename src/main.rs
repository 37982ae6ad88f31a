use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod domain;
mod inputter;
mod model;
mod source;
mod ui;

use controller::Controller;
use domain::{RosterConfig, RosterError};
use model::{Model, Status};
use ui::DashboardUI;

#[derive(Parser, Debug)]
#[command(name = "roster", about = "A tui based student records dashboard.")]
struct Cli {
    /// Roster file (csv, parquet or arrow); a built-in demo roster is shown when omitted
    roster: Option<String>,

    /// Records per page
    #[arg(long, default_value_t = 5)]
    page_size: usize,

    /// Write logs to this file (the terminal itself is owned by the UI)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<(), RosterError> {
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = std::fs::File::create(path)?;
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file)
                .with_ansi(false),
        )
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

fn run() -> Result<(), RosterError> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;

    let roster_path = match &cli.roster {
        Some(raw) => Some(PathBuf::from(
            shellexpand::full(raw)
                .map_err(|e| RosterError::LoadingFailed(e.to_string()))?
                .into_owned(),
        )),
        None => None,
    };
    let config = RosterConfig {
        roster_path,
        page_size: cli.page_size,
        event_poll_time: 100,
    };

    // A failing record source is retryable, never fatal: fall back to
    // the demo roster and tell the user on the status line.
    let (students, load_message) = match &config.roster_path {
        Some(path) => match source::load_roster(path.clone()) {
            Ok(students) => {
                let message = format!("Loaded {} records from {}", students.len(), path.display());
                (students, message)
            }
            Err(e) => (
                source::fixture_roster(),
                format!(
                    "Unable to load {} ({:?}), showing the demo roster. Retry with a valid file.",
                    path.display(),
                    e
                ),
            ),
        },
        None => (source::fixture_roster(), "Loaded demo roster".to_string()),
    };

    let mut model = Model::init(&config, students);
    model.set_status_message(load_message);

    let ui = DashboardUI::new();
    let controller = Controller::new(&config);
    let mut terminal = ratatui::init();

    info!("Starting roster!");
    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        if let Some(message) = controller.handle_event(&model)? {
            model.update(message)?;
        }
    }

    Ok(())
}
