//! `relayctl` command-line entry point.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use clap::{Parser, Subcommand};
use crossbeam_channel::Sender;
use relaybank_host::{ConnectionStatus, NotesStore, PortOpener, Supervisor, SystemClock, SystemPortOpener};
use relaybank_runner::emulate::run_emulator;
use relaybank_runner::logging::init_logging;
use relaybank_runner::{Console, RunnerConfig, RunnerError};

#[derive(Parser, Debug)]
#[command(name = "relayctl", version, about = "Discover and drive a serial relay controller")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List serial ports visible to the OS
    Ports,

    /// Find the relay controller and open the console
    Run {
        /// YAML config file (default: relayctl.yaml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Notes file (overrides notes_path from the config)
        #[arg(short, long)]
        notes: Option<PathBuf>,
    },

    /// Act as a relay controller on a serial port
    Emulate {
        /// Serial port to serve, e.g. one end of a pty pair
        port: String,

        /// YAML config file; its `device` section is the relay table
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Baud rate (default: from config)
        #[arg(short, long)]
        baud: Option<u32>,
    },
}

/// Everything the console loop reacts to.
enum Event {
    Status(ConnectionStatus),
    Line(String),
    Quit,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Ports => list_ports(),
        Commands::Run { config, notes } => run_console(config, notes),
        Commands::Emulate { port, config, baud } => emulate(&port, config, baud),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn list_ports() -> Result<(), RunnerError> {
    let ports = SystemPortOpener.list()?;
    let mut out = io::stdout().lock();
    if ports.is_empty() {
        writeln!(out, "no serial ports found")?;
    }
    for port in ports {
        writeln!(out, "{}", port)?;
    }
    Ok(())
}

fn emulate(port: &str, config: Option<PathBuf>, baud: Option<u32>) -> Result<(), RunnerError> {
    let config = RunnerConfig::load_or_default(config.as_deref())?;
    let baud_rate = baud.unwrap_or(config.discovery.baud_rate);
    run_emulator(port, baud_rate, &config.device)
}

fn run_console(config: Option<PathBuf>, notes: Option<PathBuf>) -> Result<(), RunnerError> {
    let config = RunnerConfig::load_or_default(config.as_deref())?;
    install_metrics(&config)?;

    let notes = NotesStore::load(notes.unwrap_or_else(|| config.notes_path.clone()))?;

    let supervisor = Supervisor::new(
        config.supervisor_config(),
        Arc::new(SystemPortOpener),
        Arc::new(SystemClock),
    );
    let (events_tx, events) = crossbeam_channel::unbounded();
    let status_tx = events_tx.clone();
    supervisor.add_listener(Arc::new(move |status: &ConnectionStatus| {
        let _ = status_tx.send(Event::Status(status.clone()));
    }));

    let quit_tx = events_tx.clone();
    ctrlc::set_handler(move || {
        let _ = quit_tx.send(Event::Quit);
    })?;

    spawn_stdin_reader(events_tx)?;
    let handle = supervisor.spawn()?;
    let mut console = Console::new(handle.client(), notes);

    println!("relayctl: type 'help' for commands");
    for event in events.iter() {
        let mut out = io::stdout().lock();
        match event {
            Event::Status(status) => console.on_status(&status, &mut out)?,
            Event::Line(line) => {
                if !console.handle_line(&line, &mut out)? {
                    break;
                }
            }
            Event::Quit => break,
        }
    }

    tracing::info!("shutting down");
    handle.shutdown();
    Ok(())
}

#[cfg(feature = "prometheus")]
fn install_metrics(config: &RunnerConfig) -> Result<(), RunnerError> {
    if let Some(addr) = config.metrics_listen {
        relaybank_metrics::install_prometheus(addr)
            .map_err(|e| RunnerError::InvalidConfig(format!("metrics_listen {}: {}", addr, e)))?;
        tracing::info!(%addr, "serving metrics");
    }
    Ok(())
}

#[cfg(not(feature = "prometheus"))]
fn install_metrics(config: &RunnerConfig) -> Result<(), RunnerError> {
    if config.metrics_listen.is_some() {
        tracing::warn!("metrics_listen ignored: built without the prometheus feature");
    }
    Ok(())
}

/// Forward stdin lines as events. EOF is a quit.
fn spawn_stdin_reader(events: Sender<Event>) -> io::Result<()> {
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if events.send(Event::Line(line)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
            let _ = events.send(Event::Quit);
        })?;
    Ok(())
}
