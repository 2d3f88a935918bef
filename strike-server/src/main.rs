//! strikefeed: lightning feed ingest daemon, live map dashboard, and CLI.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use strike_core::{codec, config};

mod db;
mod feed;
mod relay;
mod web;

#[derive(Parser)]
#[command(
    name = "strikefeed",
    version,
    about = "Lightning strike feed ingester and live map"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingest daemon and live dashboard
    Serve {
        /// Feed endpoint URL
        #[arg(long, env = "STRIKEFEED_URL")]
        url: Option<String>,

        /// SQLite database path
        #[arg(long, env = "STRIKEFEED_DB")]
        db_path: Option<String>,

        /// Dashboard bind host
        #[arg(long)]
        host: Option<String>,

        /// Dashboard port
        #[arg(long)]
        port: Option<u16>,

        /// Relay drain tick, milliseconds
        #[arg(long)]
        tick_ms: Option<u64>,

        /// Reconnect delay, seconds
        #[arg(long)]
        reconnect_secs: Option<u64>,
    },

    /// Decode captured frames from a file and print the recovered JSON
    Decode {
        /// Path to file containing frames (one per line), or `-` for stdin
        file: PathBuf,
    },

    /// Show database statistics
    Stats {
        /// SQLite database path
        #[arg(long, env = "STRIKEFEED_DB")]
        db_path: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            url,
            db_path,
            host,
            port,
            tick_ms,
            reconnect_secs,
        } => cmd_serve(url, db_path, host, port, tick_ms, reconnect_secs).await,
        Commands::Decode { file } => cmd_decode(file),
        Commands::Stats { db_path } => cmd_stats(db_path),
    }
}

async fn cmd_serve(
    url: Option<String>,
    db_path: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    tick_ms: Option<u64>,
    reconnect_secs: Option<u64>,
) {
    let mut cfg = config::load_config();
    if let Some(v) = url {
        cfg.feed.url = v;
    }
    if let Some(v) = db_path {
        cfg.database.path = v;
    }
    if let Some(v) = host {
        cfg.dashboard.host = v;
    }
    if let Some(v) = port {
        cfg.dashboard.port = v;
    }
    if let Some(v) = tick_ms {
        cfg.relay.tick_ms = v;
    }
    if let Some(v) = reconnect_secs {
        cfg.feed.reconnect_secs = v;
    }

    // The writer connection is opened up front so schema errors fail fast;
    // it then belongs to the feed client for the life of the process.
    let store = db::Store::open(&cfg.database.path).unwrap_or_else(|e| {
        eprintln!("Error opening database {}: {e}", cfg.database.path);
        std::process::exit(1);
    });
    eprintln!("[db] database ready at {}", cfg.database.path);

    let relay_buffer = Arc::new(relay::RelayBuffer::new());
    let broadcaster = web::live::WsBroadcaster::new(64);

    let client = feed::FeedClient::new(
        feed::WsTransport::new(cfg.feed.url.clone()),
        cfg.feed.handshake.clone(),
        Duration::from_secs(cfg.feed.reconnect_secs),
        store,
        Arc::clone(&relay_buffer),
    );
    eprintln!("[feed] subscribing to {}", cfg.feed.url);
    tokio::spawn(client.run());

    tokio::spawn(relay::run_drain_loop(
        Arc::clone(&relay_buffer),
        broadcaster.clone(),
        Duration::from_millis(cfg.relay.tick_ms),
    ));

    let state = Arc::new(web::AppState {
        db_path: cfg.database.path,
        broadcaster,
        relay: relay_buffer,
    });
    web::serve(state, cfg.dashboard.host, cfg.dashboard.port).await;
}

fn cmd_decode(file: PathBuf) {
    let reader: Box<dyn BufRead> = if file.to_str() == Some("-") {
        Box::new(io::stdin().lock())
    } else {
        let f = std::fs::File::open(&file).unwrap_or_else(|e| {
            eprintln!("Error opening {}: {e}", file.display());
            std::process::exit(1);
        });
        Box::new(io::BufReader::new(f))
    };

    let mut frames = 0u64;
    let mut failed = 0u64;

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => continue,
        };
        if line.is_empty() {
            continue;
        }

        frames += 1;
        match codec::decode(&line) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                failed += 1;
                eprintln!("frame {frames}: {e}");
            }
        }
    }

    eprintln!("{frames} frames, {} decoded, {failed} failed", frames - failed);
}

fn cmd_stats(db_path: Option<String>) {
    let path = db_path.unwrap_or_else(|| config::load_config().database.path);

    let store = db::Store::open(&path).unwrap_or_else(|e| {
        eprintln!("Error opening database {path}: {e}");
        std::process::exit(1);
    });

    let stats = store.stats();

    println!();
    println!("Database: {path}");
    println!();
    println!("  Strikes:  {}", stats.strikes);
    match stats.last_received_at {
        Some(ts) => println!("  Last received at: {ts:.3} (unix)"),
        None => println!("  Last received at: never"),
    }
    println!();
}
