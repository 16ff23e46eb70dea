//! PI STAT console entry point.
//!
//! Reads commands from stdin, runs the console loop once per frame (waking
//! early when a hold falls due) and prints the visible scrollback to
//! stdout. The config path comes from the first argument or `PISTAT_CONFIG`;
//! `PISTAT_CONTROLLER` overrides the controller address. End of input
//! (Ctrl-D) shuts the console down.

mod render;

use std::io::{self, BufRead};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use pistat_net::{EventChannel, OfflineChannel, StreamChannel, TcpBackend};
use pistat_terminal::Console;
use pistat_types::config::ConsoleConfig;
use pistat_types::time::SystemTimeService;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    log::info!(
        "Starting PI STAT console (controller: {})",
        config.controller.as_deref().unwrap_or("none")
    );

    let remote = open_remote(&config)?;
    let frame_ms = config.tick_interval_ms.max(1);
    let mut console = Console::new(config, Box::new(SystemTimeService::new()), remote);
    console.boot();

    let input = spawn_stdin_reader();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    'running: loop {
        loop {
            match input.try_recv() {
                Ok(line) => console.submit(&line),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break 'running,
            }
        }

        console.tick();
        if let Some(update) = console.take_render() {
            render::draw(&mut out, &update)?;
        }
        thread::sleep(Duration::from_millis(console.sleep_budget_ms(frame_ms)));
    }

    console.shutdown();
    if let Some(update) = console.take_render() {
        render::draw(&mut out, &update)?;
    }
    log::info!("PI STAT console shut down cleanly");
    Ok(())
}

fn load_config() -> Result<ConsoleConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PISTAT_CONFIG").ok());
    let mut config = match path {
        Some(ref p) => ConsoleConfig::load(Path::new(p))
            .with_context(|| format!("failed to load config {p}"))?,
        None => ConsoleConfig::default(),
    };
    if let Ok(addr) = std::env::var("PISTAT_CONTROLLER") {
        if !addr.trim().is_empty() {
            config.controller = Some(addr.trim().to_string());
        }
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn open_remote(config: &ConsoleConfig) -> Result<Box<dyn EventChannel>> {
    match config.controller_endpoint()? {
        Some((host, port)) => {
            log::info!("Controller link {host}:{port}");
            Ok(Box::new(StreamChannel::new(
                Box::new(TcpBackend::new()),
                &host,
                port,
                config.reconnect_interval_ms,
            )))
        },
        None => {
            log::info!("No controller configured, running offline");
            Ok(Box::new(OfflineChannel))
        },
    }
}

/// Forward stdin lines to the main loop. The channel disconnects at EOF.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                },
                Err(e) => {
                    log::error!("stdin read failed: {e}");
                    break;
                },
            }
        }
    });
    rx
}
