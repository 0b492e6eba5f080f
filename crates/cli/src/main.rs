use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use presence_core::identity::domain::identity_resolver::{IdentityResolver, NullIdentityResolver};
use presence_core::identity::infrastructure::directory_resolver::DirectoryResolver;
use presence_core::identity::infrastructure::logging_session_hook::LoggingSessionHook;
use presence_core::pipeline::infrastructure::threaded_replay_executor::ThreadedReplayExecutor;
use presence_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use presence_core::pipeline::replay_executor::{ReplayConfig, ReplayExecutor};
use presence_core::pipeline::track_presence_use_case::TrackPresenceUseCase;
use presence_core::replay::domain::cycle_writer::CycleWriter;
use presence_core::replay::domain::frame_source::FrameSource;
use presence_core::replay::infrastructure::json_lines_cycle_writer::JsonLinesCycleWriter;
use presence_core::replay::infrastructure::json_lines_frame_reader::JsonLinesFrameReader;
use presence_core::session::domain::session_sink::SessionSink;
use presence_core::session::infrastructure::json_lines_session_sink::JsonLinesSessionSink;
use presence_core::session::infrastructure::logging_session_sink::LoggingSessionSink;
use presence_core::shared::tracker_config::TrackerConfig;

const STDIO_PATH: &str = "-";

/// Replays a log of detection batches through the presence tracker.
#[derive(Parser)]
#[command(name = "presence")]
struct Cli {
    /// JSON-lines file of detection batches ("-" for stdin).
    input: PathBuf,

    /// Write one JSON line per tracking cycle here ("-" for stdout).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Append finalized session records to this JSON-lines file.
    #[arg(long)]
    sessions_out: Option<PathBuf>,

    /// JSON map of known names to identity records.
    #[arg(long)]
    directory: Option<PathBuf>,

    /// Tracker config file (defaults to the platform config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Center distance in pixels under which two detections are duplicates.
    #[arg(long)]
    dedup_distance: Option<f64>,

    /// Center distance in pixels under which a detection continues a session.
    #[arg(long)]
    proximity_threshold: Option<f64>,

    /// Seconds without a detection before a session is finalized.
    #[arg(long)]
    session_timeout: Option<f64>,

    /// Finalize every still-active session when the input ends.
    #[arg(long)]
    flush_on_exit: bool,

    /// Log progress every N cycles.
    #[arg(long, default_value = "100")]
    progress_every: usize,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = build_config(&cli)?;
    log::info!(
        "Tracking with dedup {}px, proximity {}px, timeout {}s",
        config.dedup_distance,
        config.proximity_threshold,
        config.session_timeout_secs
    );

    let mut tracker = TrackPresenceUseCase::new(
        &config,
        build_resolver(cli.directory.as_deref())?,
        build_sink(cli.sessions_out.as_deref())?,
        Box::new(LoggingSessionHook::new()),
        Box::new(StdoutPipelineLogger::new(cli.progress_every)),
    );

    let source = open_source(&cli.input)?;
    let writer = open_writer(cli.output.as_deref())?;
    let replay_config = ReplayConfig {
        flush_on_exit: cli.flush_on_exit,
        ..ReplayConfig::default()
    };

    let summary =
        ThreadedReplayExecutor::new().execute(source, writer, &mut tracker, replay_config)?;
    tracker.summary();

    log::info!(
        "Replayed {} cycles: {} sessions finalized, {} still active, {} detections dropped",
        summary.cycles,
        summary.sessions_finalized,
        tracker.active_sessions().len(),
        summary.detections_dropped
    );
    if summary.sink_failures > 0 {
        log::warn!(
            "{} session records could not be delivered",
            summary.sink_failures
        );
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<TrackerConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::load_default()?,
    };
    if let Some(v) = cli.dedup_distance {
        config.dedup_distance = v;
    }
    if let Some(v) = cli.proximity_threshold {
        config.proximity_threshold = v;
    }
    if let Some(v) = cli.session_timeout {
        config.session_timeout_secs = v;
    }
    config.validate()?;
    Ok(config)
}

fn build_resolver(
    directory: Option<&Path>,
) -> Result<Box<dyn IdentityResolver>, Box<dyn std::error::Error>> {
    match directory {
        Some(path) => {
            let resolver = DirectoryResolver::load(path)?;
            log::info!(
                "Loaded {} directory entries from {}",
                resolver.len(),
                path.display()
            );
            Ok(Box::new(resolver))
        }
        None => Ok(Box::new(NullIdentityResolver)),
    }
}

fn build_sink(path: Option<&Path>) -> Result<Box<dyn SessionSink>, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(Box::new(JsonLinesSessionSink::open(path)?)),
        None => Ok(Box::new(LoggingSessionSink)),
    }
}

fn open_source(input: &Path) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
    if is_stdio(input) {
        Ok(Box::new(JsonLinesFrameReader::new(BufReader::new(
            std::io::stdin(),
        ))))
    } else {
        Ok(Box::new(JsonLinesFrameReader::open(input)?))
    }
}

fn open_writer(output: Option<&Path>) -> Result<Box<dyn CycleWriter>, Box<dyn std::error::Error>> {
    match output {
        Some(path) if is_stdio(path) => Ok(boxed_writer(std::io::stdout())),
        Some(path) => Ok(Box::new(JsonLinesCycleWriter::create(path)?)),
        None => Ok(boxed_writer(std::io::sink())),
    }
}

fn boxed_writer<W: Write + Send + 'static>(out: W) -> Box<dyn CycleWriter> {
    Box::new(JsonLinesCycleWriter::new(out))
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == STDIO_PATH
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !is_stdio(&cli.input) && !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if let Some(dir) = &cli.directory {
        if !dir.exists() {
            return Err(format!("Directory file not found: {}", dir.display()).into());
        }
    }
    if let Some(config) = &cli.config {
        if !config.exists() {
            return Err(format!("Config file not found: {}", config.display()).into());
        }
    }
    if cli.progress_every == 0 {
        return Err("--progress-every must be at least 1".into());
    }
    if let (Some(sessions), Some(output)) = (&cli.sessions_out, &cli.output) {
        if sessions == output {
            return Err("--sessions-out and --output must be different files".into());
        }
    }
    Ok(())
}
