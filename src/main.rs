use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use mjpegwatch::config::AppConfig;
use mjpegwatch::core::grabber::GrabberStatus;
use mjpegwatch::core::selfpipe::{self, SelfPipeReader, SelfPipeWriter};
use mjpegwatch::events::EventBus;
use mjpegwatch::filename;
use mjpegwatch::recovery::{RecoveryAction, RecoveryManager};
use mjpegwatch::worker::{Worker, WorkerConfig};

#[derive(Parser, Debug)]
#[command(name = "mjpegwatch")]
#[command(about = "Grabs JPEG frames out of multipart/x-mixed-replace MJPEG streams and recorded files")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "mjpegwatch.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the system")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - load and validate configuration, then exit
    #[arg(long, help = "Load and validate configuration but don't start any workers")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Directory to dump captured frames into, named via a filename pattern
    #[arg(long, value_name = "DIR", help = "Directory to write captured frames to")]
    dump_dir: Option<PathBuf>,

    /// Filename pattern for --dump-dir, supporting %n (source name) and %f (frame number)
    #[arg(long, default_value = "%n-%f.jpg", help = "Filename pattern used with --dump-dir")]
    dump_pattern: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config();
        return Ok(());
    }

    init_logging(&args)?;

    info!("starting mjpegwatch v{}", env!("CARGO_PKG_VERSION"));
    info!(config_file = %args.config, "loading configuration");

    let config = match AppConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!(error = %e, "configuration validation failed");
        if args.validate_config {
            eprintln!("configuration is invalid: {e}");
            std::process::exit(1);
        }
        return Err(e.into());
    }

    if args.validate_config {
        println!("configuration is valid");
        return Ok(());
    }

    if args.dry_run {
        info!(sources = config.sources.len(), "dry run: configuration loaded and validated");
        println!("dry run completed: {} source(s) configured", config.sources.len());
        return Ok(());
    }

    if let Some(dir) = &args.dump_dir {
        std::fs::create_dir_all(dir)?;
    }

    let events = Arc::new(EventBus::new());
    let recovery = Arc::new(tokio::sync::Mutex::new(RecoveryManager::new()));

    let mut handles = Vec::new();
    let mut cancel_writers: Vec<Arc<SelfPipeWriter>> = Vec::new();

    for source_config in config.sources.clone() {
        let (reader, writer) = selfpipe::pair_shared()?;
        cancel_writers.push(writer);

        let (history_override, framerate_override) = match &source_config {
            mjpegwatch::config::SourceConfig::File {
                history_capacity,
                framerate_memory,
                ..
            }
            | mjpegwatch::config::SourceConfig::Network {
                history_capacity,
                framerate_memory,
                ..
            } => (*history_capacity, *framerate_memory),
        };
        let worker_config = WorkerConfig {
            history_capacity: history_override.unwrap_or(config.system.history_capacity),
            framerate_memory: framerate_override.unwrap_or(config.system.framerate_memory),
            buffer_size: config.grabber.buffer_size,
            idle_timeout: std::time::Duration::from_secs(config.grabber.idle_timeout_secs),
        };
        let worker = Worker::new(source_config, worker_config, Arc::clone(&events));
        let recovery = Arc::clone(&recovery);
        let dump_dir = args.dump_dir.clone();
        let dump_pattern = args.dump_pattern.clone();

        handles.push(tokio::spawn(run_source(worker, reader, recovery, dump_dir, dump_pattern)));
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received interrupt, shutting down workers");
        }
    }

    for writer in &cancel_writers {
        writer.signal_and_close();
    }

    for handle in handles {
        let _ = handle.await;
    }

    info!("mjpegwatch exited cleanly");
    Ok(())
}

/// Drives one source's reconnect loop: run the grabber to a terminal
/// status, then either stop (on cancellation) or wait out a backoff
/// delay before trying again, per the shared [`RecoveryManager`].
async fn run_source(
    worker: Worker,
    cancel: Arc<SelfPipeReader>,
    recovery: Arc<tokio::sync::Mutex<RecoveryManager>>,
    dump_dir: Option<PathBuf>,
    dump_pattern: String,
) {
    let name = worker.name().to_string();
    let frame_count = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0));

    loop {
        let dump_dir = dump_dir.clone();
        let dump_pattern = dump_pattern.clone();
        let name_for_dump = name.clone();
        let frame_count = std::sync::Arc::clone(&frame_count);

        let on_frame = move |frame: &mjpegwatch::core::frame::FrameRecord| {
            let Some(dir) = dump_dir.as_ref() else {
                return;
            };
            let n = frame_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
            let filename = filename::forge(&name_for_dump, n, &dump_pattern);
            let path = dir.join(filename);
            if let Err(e) = std::fs::write(&path, frame.bytes()) {
                warn!(source = %name_for_dump, error = %e, "failed to write dumped frame");
                return;
            }
            if let Ok(duration) = frame.timestamp().duration_since(std::time::UNIX_EPOCH) {
                let stamp = filetime::FileTime::from_unix_time(
                    duration.as_secs() as i64,
                    duration.subsec_nanos(),
                );
                let _ = filetime::set_file_times(&path, stamp, stamp);
            }
        };

        let result = worker.run_once(Some(Arc::clone(&cancel)), on_frame).await;

        match result {
            Ok(GrabberStatus::Canceled) => {
                info!(source = %name, "canceled, stopping reconnect loop");
                break;
            }
            Ok(GrabberStatus::Success) => {
                // The grabber never emits this in practice for an
                // unbounded multipart stream, but treat it like any other
                // clean disconnect: reconnect without counting a failure.
                recovery.lock().await.on_success(&name);
                continue;
            }
            Ok(_status) => {
                let action = recovery.lock().await.on_failure(&name);
                match action {
                    RecoveryAction::Retry => continue,
                    RecoveryAction::RetryAfterDelay(delay) => {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = cancel.canceled() => {
                                info!(source = %name, "canceled during backoff");
                                break;
                            }
                        }
                    }
                    RecoveryAction::GiveUp => {
                        error!(source = %name, "giving up reconnecting");
                        break;
                    }
                }
            }
            Err(e) => {
                error!(source = %name, error = %e, "worker failed to start");
                let action = recovery.lock().await.on_failure(&name);
                match action {
                    RecoveryAction::Retry => continue,
                    RecoveryAction::RetryAfterDelay(delay) => {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = cancel.canceled() => break,
                        }
                    }
                    RecoveryAction::GiveUp => break,
                }
            }
        }
    }
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mjpegwatch={log_level}")));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer().json().with_target(true).boxed(),
        Some("compact") => fmt::layer().compact().with_target(false).boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("warning: unknown log format '{format}', using default");
            fmt::layer().with_target(true).boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

fn print_default_config() {
    println!("# mjpegwatch configuration file");
    println!("# These are the built-in defaults; override in TOML or environment variables");
    println!();

    let default_config = AppConfig::default();
    match toml::to_string_pretty(&default_config) {
        Ok(toml_str) => println!("{toml_str}"),
        Err(e) => eprintln!("failed to render default config: {e}"),
    }
}
