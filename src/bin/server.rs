//! walkv Server Binary
//!
//! Replays the WAL, then serves the line protocol over TCP until `exit` is
//! typed on stdin.

use std::fs::OpenOptions;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use walkv::config::LoggingConfig;
use walkv::network::{Server, ShutdownHandle};
use walkv::{Config, Engine};

/// walkv Server
#[derive(Parser, Debug)]
#[command(name = "walkv-server")]
#[command(about = "Key-value store with a group-commit write-ahead log")]
#[command(version)]
struct Args {
    /// Path to the TOML config file (defaults are used if it does not exist)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Listen address (host:port), overrides network.address
    #[arg(short, long)]
    listen: Option<String>,

    /// WAL directory, overrides wal.data_directory
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Disable the WAL (writes are not persisted)
    #[arg(long)]
    no_wal: bool,
}

fn main() {
    let args = Args::parse();

    let mut config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(listen) = args.listen {
        config.network.address = listen;
    }
    if let Some(dir) = args.data_dir {
        config.wal.data_directory = dir;
    }
    if args.no_wal {
        config.wal.enabled = false;
    }
    if let Err(e) = config.validate() {
        eprintln!("Invalid config: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    tracing::info!("walkv Server v{}", walkv::VERSION);
    tracing::info!("Config file: {}", args.config.display());
    tracing::info!("WAL directory: {}", config.wal.data_directory.display());

    // Replay happens here, before the listener exists
    let engine = match Engine::open(&config.wal) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Engine initialized successfully");

    let server = match Server::bind(&config.network, Arc::clone(&engine)) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start TCP server: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = server.shutdown_handle();
    std::thread::spawn(move || wait_for_exit(shutdown));

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
    }

    // Drain the WAL: every acknowledged write is on disk after this
    if let Err(e) = engine.close() {
        tracing::error!("Failed to close engine: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Shutdown complete");
}

/// Install the tracing subscriber. `RUST_LOG` wins over `logging.level`.
fn init_logging(config: &LoggingConfig) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| format!("invalid log level '{}': {}", config.level, e))?;

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    match config.output.as_str() {
        "stdout" => builder.init(),
        "stderr" => builder.with_writer(std::io::stderr).init(),
        path => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("cannot open log file '{}': {}", path, e))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
    }

    Ok(())
}

/// Block on stdin until `exit` is typed, then signal shutdown.
///
/// If stdin is closed the server keeps running.
fn wait_for_exit(shutdown: ShutdownHandle) {
    println!("Type 'exit' to stop server");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        match line {
            Ok(line) if line.trim().eq_ignore_ascii_case("exit") => {
                tracing::info!("Stopping server...");
                shutdown.shutdown();
                return;
            }
            Ok(_) => println!("Type 'exit' to stop server"),
            Err(e) => {
                tracing::error!("Failed to read exit command: {}", e);
                return;
            }
        }
    }
}
