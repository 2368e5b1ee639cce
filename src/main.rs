//! MPD Control - command line front end
//!
//! Usage:
//!   mpd-control <verb> [args...]      run one command, print the result as JSON
//!   mpd-control idle [subsystems...]  wait for the next change(s)
//!   mpd-control watch [subsystems...] stream change events until interrupted
//!   mpd-control connection            connection status
//!   mpd-control verbs                 list known verbs

use std::env;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::signal;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mpd_control::bus::BusEvent;
use mpd_control::client::{IdleWatcher, MpdClient, Verb};
use mpd_control::{bus, config};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries JSON only
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mpd_control=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        print_usage();
        process::exit(1);
    };

    match command.as_str() {
        "help" | "--help" | "-h" => {
            print_usage();
            return Ok(());
        }
        "--version" | "-V" => {
            println!("mpd-control {} ({})", env!("MPDC_VERSION"), env!("MPDC_GIT_SHA"));
            return Ok(());
        }
        "verbs" => {
            for verb in Verb::ALL {
                println!("{}", verb);
            }
            return Ok(());
        }
        _ => {}
    }

    tracing::debug!("mpd-control v{}", env!("MPDC_VERSION"));

    let config = config::load_config().context("Failed to load configuration")?;
    let bus = bus::create_bus();
    let client = Arc::new(MpdClient::new(config.client_settings()).with_bus(bus.clone()));

    let result = match command.as_str() {
        "idle" => {
            let outcome = client.idle(rest).await?;
            print_json(&outcome)
        }
        "watch" => {
            let shutdown = CancellationToken::new();
            let rx = bus.subscribe();
            let watcher = IdleWatcher::new(client.clone(), bus.clone()).subsystems(rest.to_vec());
            let task = tokio::spawn(watcher.run(shutdown.clone()));

            tokio::select! {
                _ = shutdown_signal() => {}
                res = print_events(rx) => {
                    res?;
                }
            }
            shutdown.cancel();
            task.await.context("Idle watcher panicked")?;
            Ok(())
        }
        "connection" => {
            // A failed connect still leaves a snapshot worth printing
            if let Err(e) = client.connect().await {
                tracing::warn!("{}", e);
            }
            print_json(&client.status_snapshot().await)
        }
        name => {
            let value = client
                .call(name, rest)
                .await
                .with_context(|| format!("{} failed", name))?;
            print_json(&value)
        }
    };

    if command != "watch" {
        client.disconnect().await;
    }
    result
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

/// Print bus events as JSON lines until the bus closes. Returns how many were printed.
async fn print_events(mut rx: broadcast::Receiver<BusEvent>) -> Result<usize> {
    let mut printed = 0;
    loop {
        match rx.recv().await {
            Ok(event) => {
                print_json(&event)?;
                printed += 1;
            }
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!("Printer fell behind, {} event(s) skipped", missed);
            }
            Err(RecvError::Closed) => return Ok(printed),
        }
    }
}

fn print_usage() {
    eprintln!("mpd-control - talk to a Music Player Daemon");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  mpd-control <verb> [args...]");
    eprintln!("  mpd-control idle [subsystems...]");
    eprintln!("  mpd-control watch [subsystems...]");
    eprintln!("  mpd-control connection");
    eprintln!("  mpd-control verbs");
    eprintln!();
    eprintln!("Connection: MPD_HOST=[password@]host, MPD_PORT, or MPDC_* / config.toml");
    eprintln!("Logging:    RUST_LOG=mpd_control=debug");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
