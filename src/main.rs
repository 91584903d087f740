//! LED status daemon.
//!
//! Runs the lighting zones and talks JSON lines over stdio. Each input line
//! is either a printer property change or a service call; each call gets
//! one reply line on stdout.
//!
//! ## Architecture
//! - **Zone tasks** (tokio): one per light zone, ticking frames into the sink
//! - **Main task**: reads stdin, publishes printer events, dispatches calls
//!
//! ## Rust concepts
//! - `#[tokio::main]` async entry point
//! - `tokio::select!` between stdin and a shutdown poll
//! - `Box<dyn Error>` so `?` works for every error type in `main`
//!
//! ## Usage
//! ```sh
//! printer-events | ./target/release/led-status-rs --preferences /var/lib/led/main_lighting.json
//! echo '{"method": "get_main_lighting_hue"}' | ./target/release/led-status-rs
//! ```

use clap::Parser;
use led_status_rs::printer::PrinterSnapshot;
use led_status_rs::service::{Inbound, LedService};
use led_status_rs::sink::LogSink;
use led_status_rs::{ServiceConfig, is_running, setup_signal_handler};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Printer status lighting service
#[derive(Parser)]
#[command(name = "led-status-rs")]
#[command(about = "Drives printer status lighting from printer state events")]
#[command(version)]
struct Args {
    /// File holding the persisted lighting settings
    #[arg(long, default_value = "main_lighting.json")]
    preferences: PathBuf,

    /// Frames per second for every zone
    #[arg(long, default_value = "25")]
    fps: u32,

    /// The machine has no button ring
    #[arg(long)]
    no_button_ring: bool,

    /// Number of print head slot indicators
    #[arg(long, default_value = "2")]
    head_slots: u8,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    let running = setup_signal_handler()?;

    let config = ServiceConfig {
        frame_rate: args.fps,
        button_ring: !args.no_button_ring,
        head_slots: args.head_slots,
        preferences: Some(args.preferences),
    };

    tracing::info!("LED status service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Frame rate: {} fps", config.frame_rate);
    tracing::info!("Button ring: {}", config.button_ring);
    tracing::info!("Head slots: {}", config.head_slots);

    // The printer is assumed to be booting until it says otherwise.
    let service = LedService::new(config, Arc::new(LogSink), PrinterSnapshot::default())?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut shutdown_poll = tokio::time::interval(Duration::from_millis(100));

    while is_running(&running) {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if let Some(reply) = handle_line(&service, &line).await {
                        stdout.write_all(reply.as_bytes()).await?;
                        stdout.write_all(b"\n").await?;
                        stdout.flush().await?;
                    }
                }
                None => {
                    tracing::info!("Input closed");
                    break;
                }
            },
            _ = shutdown_poll.tick() => {}
        }
    }

    tracing::info!("Shutting down");
    service.shutdown().await;
    Ok(())
}

/// Handle one input line. Returns the reply to print, if any.
async fn handle_line(service: &LedService, line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<Inbound>(line) {
        Ok(Inbound::Event(event)) => {
            if let Err(e) = service.publish(event) {
                tracing::error!("Could not start lighting zones: {}", e);
            }
            None
        }
        Ok(Inbound::Call(call)) => {
            let reply = service.dispatch(call).await;
            match serde_json::to_string(&reply) {
                Ok(json) => Some(json),
                Err(e) => {
                    tracing::error!("Could not encode reply: {}", e);
                    None
                }
            }
        }
        Err(e) => {
            tracing::warn!("Ignoring malformed input: {}", e);
            None
        }
    }
}
