/*
 *  main.rs
 *
 *  digilcd - every digit counts
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use std::path::PathBuf;
use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{interval, Interval, MissedTickBehavior};

use digilcd::config::{self, Cli, ConfigWatcher, Settings};
use digilcd::display::drivers::dry_run::DryRunTransport;
use digilcd::display::{BoxedTransport, DisplayManager, TransportFactory};
use digilcd::metrics::MetricsCollector;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Asynchronously waits for a SIGINT, SIGTERM, or SIGHUP signal.
async fn signal_handler() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

fn dry_run_factory() -> TransportFactory {
    Box::new(|_, _| Ok(Box::new(DryRunTransport::new()) as BoxedTransport))
}

#[cfg(feature = "hid")]
fn transport_factory(dry_run: bool) -> TransportFactory {
    use digilcd::display::drivers::hid::HidTransport;

    if dry_run {
        return dry_run_factory();
    }
    Box::new(|vid, pid| Ok(Box::new(HidTransport::open(vid, pid)?) as BoxedTransport))
}

#[cfg(not(feature = "hid"))]
fn transport_factory(dry_run: bool) -> TransportFactory {
    if !dry_run {
        warn!("Built without the hid feature, running dry");
    }
    dry_run_factory()
}

fn ticker(period: std::time::Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (cfg, path) = config::load(&cli).context("Failed to load configuration")?;

    if cli.dump_config {
        println!("{}", config::dump(&cfg)?);
        return Ok(());
    }

    let level = cfg.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();

    info!("{} - every digit counts", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);
    match path.as_ref() {
        Some(p) => info!("Using config {}", p.display()),
        None => info!("No config file found, using defaults"),
    }

    let settings = Settings::from_config(&cfg).context("Invalid configuration")?;
    if cli.test {
        info!("Digit test mode: 111 .. 999 on every field, two seconds each");
    }

    run(cli, path, settings).await
}

async fn run(cli: Cli, path: Option<PathBuf>, settings: Settings) -> Result<()> {
    let telemetry = Box::new(MetricsCollector::system(settings.metrics_update_interval));
    let watcher = ConfigWatcher::new(cli.clone(), path);
    let mut manager = DisplayManager::new(settings, telemetry, transport_factory(cli.dry_run), cli.test)
        .with_watcher(watcher);

    let mut period = manager.settings().update_interval;
    let mut frames = ticker(period);

    let shutdown = signal_handler();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            res = &mut shutdown => {
                if let Err(e) = res {
                    error!("Signal handler failed: {}", e);
                }
                break;
            }
            _ = frames.tick() => {
                // a pass runs to completion before the next select
                manager.tick(&Local::now());

                let wanted = manager.settings().update_interval;
                if wanted != period {
                    info!("Update interval now {:?}", wanted);
                    period = wanted;
                    frames = ticker(period);
                }
            }
        }
    }

    if let Err(e) = manager.blank() {
        warn!("Could not blank the display: {}", e);
    }
    let stats = manager.stats();
    info!(
        "Stopped after {} frames ({} write failures, {} failed opens)",
        stats.frames_sent, stats.write_failures, stats.open_failures
    );
    Ok(())
}
