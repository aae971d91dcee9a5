//! CAN Monitor CLI Application
//!
//! Opens a SocketCAN channel, decodes every frame against a DBC or JSON signal
//! database and shows the latest value of each message in the terminal.

use anyhow::{Context, Result};
use can_monitor::config::{self, AppConfig, Overrides, Settings};
use can_monitor::ingest::{IngestionLoop, PauseGate};
use can_monitor::render::{ExitReason, RenderLoop, SessionInfo};
use can_monitor::spinner::{SpinnerSequence, SpinnerStyle};
use can_monitor::state::MessageStore;
use can_monitor::terminal::{Painter, TerminalGuard};
use can_monitor::transport;
use can_monitor::view::ViewState;
use can_monitor_decoder::Decoder;
use clap::Parser;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// CAN Monitor - Live decoded view of a CAN bus
#[derive(Parser, Debug)]
#[command(name = "can-monitor")]
#[command(about = "Live decoded view of a SocketCAN bus", long_about = None)]
#[command(version)]
struct Args {
    /// CAN channel to listen on (e.g. can0, vcan0)
    #[arg(short, long, value_name = "NAME")]
    channel: Option<String>,

    /// Signal database: .dbc, or .json from a DBC converter
    #[arg(short, long, value_name = "FILE")]
    database: Option<PathBuf>,

    /// Refresh interval in ms (100-25500, multiple of 100) [default: 100]
    #[arg(short, long, value_name = "MS")]
    interval: Option<u64>,

    /// Show message rows in bold
    #[arg(short, long)]
    bold: bool,

    /// Open a CAN FD socket (payloads up to 64 bytes)
    #[arg(long)]
    fd: bool,

    /// Liveness spinner style
    #[arg(long, value_enum, value_name = "STYLE")]
    spinner: Option<SpinnerStyle>,

    /// Path to configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Convert the DBC database to JSON with this command at startup
    #[arg(long, value_name = "CMD")]
    dbc2json: Option<String>,

    /// Write log records to this file while the dashboard is shown
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            channel: self.channel.clone(),
            database: self.database.clone(),
            converter: self.dbc2json.clone(),
            interval_ms: self.interval,
            bold: self.bold,
            fd: self.fd,
            spinner: self.spinner,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet, args.log_file.as_deref())?;

    log::info!("CAN Monitor v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", can_monitor_decoder::VERSION);

    let file_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    let settings = file_config.merge(args.overrides())?;

    monitor(&settings)
}

/// Load the database, start ingestion and run the dashboard until it ends
fn monitor(settings: &Settings) -> Result<()> {
    let decoder = load_decoder(settings)?;
    let stats = decoder.database_stats();
    log::info!(
        "Signal database: {} messages, {} signals",
        stats.num_messages,
        stats.num_signals
    );

    let transport = transport::open_channel(&settings.channel, settings.fd)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown))
            .with_context(|| format!("Failed to register handler for signal {}", signal))?;
    }

    let store = Arc::new(MessageStore::new());
    let pause = Arc::new(PauseGate::default());
    let ingestion = IngestionLoop::new(Arc::clone(&store), Arc::new(decoder), Arc::clone(&pause))
        .spawn(transport)
        .context("Failed to start ingestion thread")?;

    let guard = TerminalGuard::enter().context("Failed to set up terminal")?;
    let (cols, rows) = TerminalGuard::size().context("Failed to read terminal size")?;

    let mut view = ViewState::new(pause, cols, rows);
    view.bold = settings.bold;
    view.show_signals = settings.show_signals;

    let mut render = RenderLoop::new(
        store,
        view,
        SpinnerSequence::new(settings.spinner),
        Painter::new(BufWriter::new(io::stdout())),
        SessionInfo::new(settings.channel.clone(), stats.num_messages),
        settings.interval,
    )
    .with_shutdown_flag(shutdown)
    .watch_ingestion(ingestion);

    let outcome = render.run();

    // Errors are printed on the normal screen
    drop(render);
    drop(guard);

    match outcome? {
        ExitReason::Quit | ExitReason::Interrupted => {
            log::info!("Exiting");
            Ok(())
        }
        ExitReason::IngestionFailed(e) => {
            Err(anyhow::Error::new(e).context(format!("Monitoring {} stopped", settings.channel)))
        }
    }
}

fn load_decoder(settings: &Settings) -> Result<Decoder> {
    let path = &settings.database;
    let mut decoder = Decoder::new();

    match &settings.converter {
        Some(converter) => decoder.add_converted_dbc(converter, path),
        None => decoder.add_database(path),
    }
    .with_context(|| format!("Failed to load signal database {:?}", path))?;

    Ok(decoder)
}

/// Initialize logging based on verbosity level
///
/// The dashboard owns the terminal, so records only go to `log_file`. Without
/// one logging is off; failures still reach the user as the returned error once
/// the terminal is restored.
fn init_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    use env_logger::{Builder, Target};
    use std::io::Write;

    let level = config::log_level(verbose, quiet, log_file.is_some());

    let mut builder = Builder::new();
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{} {}] {}",
            record.level(),
            record.target(),
            record.args()
        )
    });

    builder.filter_level(level);
    if let Some(path) = log_file {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create log file: {:?}", path))?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}
