//! enviromon: environment monitor for the Raspberry Pi Enviro+ board
//!
//! Polls temperature, pressure and humidity, shows them on the LCD and
//! uploads them to Adafruit IO at a fixed interval.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::watch;
use tracing_subscriber::{filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// === Modules ===

mod config;
mod display;
mod monitor;
mod sensors;
mod shared;
mod telemetry;
mod units;
mod window;

use config::{LogLevel, Overrides, Settings};
use display::console::Console;
use display::lcd::LcdDisplay;
use display::terminal::TerminalDisplay;
use display::{DisplayMode, DisplaySink};
use monitor::{Monitor, RunSummary};
use sensors::enviro::{EnviroBoard, I2C_BUS};
use sensors::iio::IioSensor;
use sensors::simulated::SimulatedSensor;
use sensors::SensorSource;
use telemetry::adafruit::AdafruitIo;

// === CLI ===

#[derive(Parser)]
#[command(name = "enviromon", version)]
#[command(about = "Environment monitor with LCD display and Adafruit IO uploads")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Settings file (default: ./settings.toml, then ~/.config/enviromon/settings.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Stop after this many uploads
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    uploads: Option<u32>,

    /// Upload once and exit
    #[arg(long, conflicts_with = "uploads")]
    cron: bool,

    /// Show upload progress on the LCD
    #[arg(long)]
    progress: bool,

    /// Initial display mode: all, temperature, pressure, humidity or sparkles
    #[arg(long, value_name = "MODE")]
    dmode: Option<DisplayMode>,

    /// Do not print the status line
    #[arg(long = "noCLI")]
    no_cli: bool,

    /// Do not drive the LCD
    #[arg(long = "noLED")]
    no_led: bool,

    /// Log at debug level
    #[arg(short, long)]
    debug: bool,

    /// Append log output to this file
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Use simulated readings instead of the sensor board
    #[arg(long)]
    simulate: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the settings file in your editor
    Config,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            display: self.dmode,
            progress: self.progress,
            debug: self.debug,
            log_file: self.log.clone(),
        }
    }

    fn upload_limit(&self) -> Option<u32> {
        if self.cron {
            Some(1)
        } else {
            self.uploads
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Config) = cli.command {
        return run_config_command(cli.config.as_deref());
    }

    let path = Settings::locate(cli.config.as_deref());
    let settings = Settings::load(path.as_deref())?.apply(cli.overrides());
    init_logging(&settings)?;

    match &path {
        Some(path) => tracing::info!("Loaded settings from {:?}", path),
        None => tracing::info!("No settings file found, using defaults"),
    }

    let summary = run_monitor(&cli, settings).await?;
    print_summary(&summary);
    Ok(())
}

fn init_logging(settings: &Settings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.as_filter()));

    let file_layer = match &settings.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("could not open log file {}", path.display()))?;
            Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        }
        None => None,
    };

    // the log file gets everything, the terminal only errors
    let stderr_level = if file_layer.is_some() && settings.log_level != LogLevel::Debug {
        LevelFilter::ERROR
    } else {
        LevelFilter::TRACE
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(fmt::layer().with_writer(std::io::stderr).with_filter(stderr_level))
        .init();
    Ok(())
}

/// Wire up sensors, display and uploads, then run until done
async fn run_monitor(cli: &Cli, settings: Settings) -> anyhow::Result<RunSummary> {
    tracing::info!("Starting enviromon {}", env!("CARGO_PKG_VERSION"));
    log_settings(&settings);
    settings.check_upload_limit(cli.upload_limit())?;

    // Local hardware first so a missing board fails before any feed is created
    let sensors = open_sensors(cli.simulate)?;
    let display = if cli.no_led { None } else { Some(open_display(cli.simulate)) };

    let sink = match settings.credentials()? {
        Some((username, key)) => Some(AdafruitIo::new(username, key)?),
        None => None,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let mut monitor: Monitor<_, Box<dyn DisplaySink>, AdafruitIo> =
        Monitor::connect(settings, sensors, sink, shutdown_rx)
            .await
            .context("feed setup failed")?
            .with_upload_limit(cli.upload_limit());
    if let Some(display) = display {
        monitor = monitor.with_display(display);
    }
    if !cli.no_cli {
        monitor = monitor.with_console(Console::stdout());
    }

    Ok(monitor.run().await)
}

/// The Enviro board over I2C, else the kernel IIO drivers
fn open_sensors(simulate: bool) -> anyhow::Result<Box<dyn SensorSource>> {
    if simulate {
        tracing::info!("Using simulated sensor readings");
        let seed = chrono::Utc::now().timestamp_millis() as u64;
        return Ok(Box::new(SimulatedSensor::new(seed)));
    }

    match EnviroBoard::open(I2C_BUS) {
        Ok(board) => Ok(Box::new(board)),
        Err(e) => {
            tracing::warn!("Enviro board not reachable over I2C ({}), trying IIO", e);
            let iio = IioSensor::discover().context("no sensor board found (try --simulate)")?;
            Ok(Box::new(iio))
        }
    }
}

/// The LCD, or the terminal when simulating or when the panel is missing
fn open_display(simulate: bool) -> Box<dyn DisplaySink> {
    if simulate {
        return Box::new(TerminalDisplay::stdout());
    }
    match LcdDisplay::open() {
        Ok(lcd) => Box::new(lcd),
        Err(e) => {
            tracing::warn!("LCD unavailable ({}), drawing in the terminal instead", e);
            Box::new(TerminalDisplay::stdout())
        }
    }
}

fn log_settings(settings: &Settings) {
    tracing::debug!("Device ID:  {}", shared::device_id());
    tracing::debug!("Upload:     {}", settings.aio_upload);
    tracing::debug!("Units:      {}", settings.units_temps);
    tracing::debug!("Rotation:   {}", settings.rotation.degrees());
    tracing::debug!("Mode:       {}", settings.display);
    tracing::debug!("Progress:   {}", settings.progress.0);
    tracing::debug!("Sleep:      {}s", settings.sleep);
    tracing::debug!("Delay:      {}s", settings.delay);
    tracing::debug!("Freq:       {}s", settings.freq().as_secs());
    tracing::debug!("Wait:       {}s", settings.wait);
    tracing::debug!("Throttle:   {}s", settings.throttle);
}

fn print_summary(summary: &RunSummary) {
    let elapsed = (summary.finished - summary.started).num_seconds().max(0) as u64;
    println!();
    println!("Num uploads: {}", summary.uploads);
    println!("Cycles:      {}", summary.cycles);
    println!("Started:     {}", summary.started.format("%a %b %-d %Y %H:%M:%S"));
    println!("Ended:       {}", summary.finished.format("%a %b %-d %Y %H:%M:%S"));
    println!("Run time:    {}", shared::format_duration(elapsed));
}

/// Open the settings file in the user's editor
fn run_config_command(explicit: Option<&Path>) -> anyhow::Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => Settings::path().context("could not determine config directory")?,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        let template = include_str!("../settings.toml.example");
        std::fs::write(&path, template)?;
        println!("Created settings file: {}", path.display());
    }

    let editor = std::env::var("EDITOR")
        .or_else(|_| std::env::var("VISUAL"))
        .unwrap_or_else(|_| "nano".to_string());

    println!("Opening {} with {}", path.display(), editor);
    std::process::Command::new(&editor).arg(&path).status()?;

    Ok(())
}
