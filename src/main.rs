//! perchcam command-line driver
//!
//! Starts the broadcast server and drives the camera setup wizard from
//! single-line commands on stdin.
//!
//! ```bash
//! perchcam                          # port from the saved config, or 8080
//! perchcam --port 9000 --verbosity debug
//! RUST_LOG=perchcam=debug perchcam  # also mirror events to stderr
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use perchcam::config::{ConfigStore, JsonConfigStore};
use perchcam::device::{FrameSource, TestPatternSource};
use perchcam::logging::{self, FunnelConfig, LogFunnel, Verbosity};
use perchcam::server::{BroadcastServer, ServerConfig};
use perchcam::session::{CameraSession, SessionEvent};

/// Camera setup wizard and websocket frame broadcaster
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// HTTP port (overrides the saved config)
    #[arg(short, long, env = "PERCHCAM_PORT")]
    port: Option<u16>,

    /// IP address to bind
    #[arg(short, long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    /// Config file path [default: <user config dir>/perchcam/config.json]
    #[arg(short, long, env = "PERCHCAM_CONFIG")]
    config: Option<PathBuf>,

    /// Display log verbosity: error, info or debug
    #[arg(long, default_value = "info")]
    verbosity: Verbosity,

    /// Minimum milliseconds between display log refreshes
    #[arg(long, default_value_t = 200)]
    log_interval_ms: u64,

    /// Per-subscriber frame write deadline in milliseconds
    #[arg(long, default_value_t = 500)]
    write_timeout_ms: u64,
}

enum Command {
    Event(SessionEvent),
    CycleVerbosity,
    ToggleServer,
    SetPort(Option<u16>),
    CloseDevice,
    Logs,
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    let mut words = line.split_whitespace();
    let word = words.next().unwrap_or("");

    match word.to_ascii_lowercase().as_str() {
        "c" | "scan" => Command::Event(SessionEvent::Scan),
        "k" | "up" => Command::Event(SessionEvent::Up),
        "j" | "down" => Command::Event(SessionEvent::Down),
        "" | "enter" | "ok" => Command::Event(SessionEvent::Confirm),
        "b" | "back" => Command::Event(SessionEvent::Back),
        "r" | "reset" => Command::Event(SessionEvent::Reset),
        "v" => Command::CycleVerbosity,
        "s" => Command::ToggleServer,
        "p" | "port" => Command::SetPort(words.next().and_then(|p| p.parse().ok())),
        "x" | "close" => Command::CloseDevice,
        "l" | "logs" => Command::Logs,
        "h" | "help" | "?" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(line.trim().to_string()),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  c          scan for cameras");
    println!("  up / down  move the selection");
    println!("  <enter>    confirm the current step");
    println!("  b          back");
    println!("  r          reset the camera setup");
    println!("  x          close the open camera");
    println!("  s          start or stop the server");
    println!("  p <port>   change the server port (server must be stopped)");
    println!("  v          cycle log verbosity");
    println!("  l          show recent log entries");
    println!("  q          save and quit");
}

async fn render(session: &CameraSession) {
    println!();
    println!("== Camera: {} ==", session.step());
    println!("Status: {}", session.status());

    if session.step() == perchcam::SetupStep::SelectingDevice {
        for device in session.devices() {
            let marker = if session.selected() == Some(device) { ">" } else { " " };
            println!(" {} {} [{}]", marker, device, device.device_type);
        }
    }

    if let Some(id) = session.open_device() {
        let live = if session.is_streaming() { "streaming" } else { "not streaming" };
        println!("Open camera: {} ({})", id, live);
    }
    if let Some(error) = session.last_stream_error() {
        println!("Stream error: {}", error);
    }
    if let Some(message) = session.camera_messages().last() {
        let kind = if message.is_error { "!" } else { "-" };
        println!("{} {} {}", kind, message.timestamp.format("%H:%M:%S"), message.text);
    }

    let server = session.server();
    match server.local_addr().await {
        Some(addr) => {
            let stats = server.registry().stats();
            println!(
                "Server: running on {} | clients {} | frames {} | {} kbps",
                addr,
                stats.connections_active,
                stats.frames,
                stats.bitrate() / 1000
            );
        }
        None => println!("Server: stopped (port {})", server.port()),
    }
}

/// Print entries flushed after sequence number `last`, returning the newest
fn print_new_entries(funnel: &LogFunnel, last: u64) -> u64 {
    let mut newest = last;
    for entry in funnel.entries_after(last) {
        println!("  {}", entry);
        newest = entry.seq;
    }
    newest
}

#[tokio::main]
async fn main() -> perchcam::Result<()> {
    let args = Args::parse();

    let funnel = LogFunnel::with_config(
        FunnelConfig::default()
            .flush_interval(Duration::from_millis(args.log_interval_ms))
            .verbosity(args.verbosity),
    );
    logging::init(&funnel)?;
    let flusher = funnel.spawn_flush_task();

    let store: Arc<dyn ConfigStore> = Arc::new(match args.config {
        Some(path) => JsonConfigStore::new(path),
        None => JsonConfigStore::default_location()?,
    });
    let app_config = match store.load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Error loading config");
            return Err(e.into());
        }
    };

    let port = args.port.unwrap_or(app_config.server_port);
    let server_config = ServerConfig::with_addr(SocketAddr::new(args.bind, port))
        .write_timeout(Duration::from_millis(args.write_timeout_ms));
    let server = Arc::new(BroadcastServer::new(server_config));

    if let Err(e) = server.start().await {
        tracing::error!(error = %e, "Error starting server");
        // Make startup failures visible before the first refresh
        funnel.flush();
    }

    let source: Arc<dyn FrameSource> = Arc::new(TestPatternSource::new());
    let mut session = CameraSession::new(source, Arc::clone(&server), store, app_config);

    print_help();
    render(&session).await;

    let mut refresh = funnel.subscribe();
    let mut last_printed = print_new_entries(&funnel, 0);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            changed = refresh.changed() => {
                if changed.is_ok() {
                    last_printed = print_new_entries(&funnel, last_printed);
                }
                continue;
            }
            _ = tokio::signal::ctrl_c() => None,
        };

        // EOF and Ctrl-C both quit
        let Some(line) = line else {
            break;
        };

        match parse_command(&line) {
            Command::Event(event) => {
                session.handle(event);
            }
            Command::CycleVerbosity => {
                let verbosity = funnel.cycle_verbosity();
                println!("Verbosity: {}", verbosity);
            }
            Command::ToggleServer => {
                session.toggle_server().await;
            }
            Command::SetPort(Some(port)) => match server.set_port(port).await {
                Ok(()) => println!("Port set to {}", port),
                Err(e) => println!("Error: {}", e),
            },
            Command::SetPort(None) => println!("Usage: p <port>"),
            Command::CloseDevice => session.close_device(),
            Command::Logs => {
                for entry in funnel.recent(20) {
                    println!("  {}", entry);
                }
                continue;
            }
            Command::Help => {
                print_help();
                continue;
            }
            Command::Quit => break,
            Command::Unknown(text) => {
                println!("Unknown command: {} (h for help)", text);
                continue;
            }
        }

        render(&session).await;
    }

    let result = session.quit().await;
    flusher.abort();
    funnel.flush();
    print_new_entries(&funnel, last_printed);
    result
}
