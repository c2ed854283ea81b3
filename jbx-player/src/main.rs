//! JBX player binary
//!
//! Plays the files given on the command line (or the resumed queue from
//! the last session) on the default output device, with crossfades and
//! auto-volume. Ctrl-C saves the resume snapshot and settings.

use anyhow::Context;
use clap::Parser;
use jbx_player::backend::device::CpalBackend;
use jbx_player::library::{NoAutoControl, NullLibrary};
use jbx_player::queue::MemoryQueue;
use jbx_player::{Player, PlayerSettings};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "jbx-player", about = "JBX jukebox audio player", version)]
struct Args {
    /// Files or file:// URLs to play; empty resumes the last session
    files: Vec<String>,

    /// Data directory for settings and the resume snapshot
    #[arg(long, env = "JBX_DATA_DIR")]
    data_dir: Option<String>,

    /// Main volume 0..=255, overriding the saved value
    #[arg(long)]
    volume: Option<u8>,

    /// Crossfade duration in ms, overriding the saved value
    #[arg(long)]
    crossfade_ms: Option<u64>,

    /// Disable automatic crossfades for this run
    #[arg(long)]
    no_crossfade: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    jbx_common::logging::init("jbx_player=info,jbx_common=info");

    let data_dir = jbx_common::config::resolve_data_dir(args.data_dir.as_deref(), "JBX_DATA_DIR")
        .context("could not resolve data directory")?;
    let settings_path = jbx_common::config::settings_file(&data_dir);
    let resume_path = jbx_common::config::resume_file(&data_dir);

    let mut settings = PlayerSettings::load(&settings_path)?;
    if let Some(volume) = args.volume {
        settings.volume = volume;
    }
    if let Some(ms) = args.crossfade_ms {
        settings.auto_crossfade_ms = ms;
    }
    if args.no_crossfade {
        settings.auto_crossfade = false;
    }

    let resume_session = args.files.is_empty();
    let queue = MemoryQueue::from_urls(args.files);

    let mut player = Player::new(
        Box::new(CpalBackend::new("audioout")),
        Box::new(queue),
        Arc::new(NullLibrary),
        Box::new(NoAutoControl),
        settings,
    );

    if resume_session {
        player
            .load_resume(&resume_path)
            .context("could not load resume snapshot")?;
    }

    // Log outward events the way a display shell would consume them.
    let mut events = player.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(?event, "player event");
        }
    });

    if player.is_stopped() {
        player.play(0)?;
    }
    if player.is_stopped() {
        info!("nothing to play");
        return Ok(());
    }

    let mut signals = player
        .take_signal_receiver()
        .context("signal receiver already taken")?;
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                player.one_second_tick();
                let time = player.time();
                debug!(
                    elapsed = %jbx_common::human_time::format_opt_ms(time.elapsed_ms),
                    total = %jbx_common::human_time::format_opt_ms(time.total_ms),
                    "position"
                );
                if player.is_stopped() {
                    info!("playback finished");
                    break;
                }
            }
            signal = signals.recv() => {
                match signal {
                    Some(signal) => player.receive_signal(signal),
                    None => break,
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(error = %e, "failed to listen for shutdown signal");
                }
                info!("shutting down");
                break;
            }
        }
    }

    if let Err(e) = player.save_resume(&resume_path) {
        error!(error = %e, "could not save resume snapshot");
    }
    if let Err(e) = player.save_settings(&settings_path) {
        error!(error = %e, "could not save settings");
    }
    player.shutdown();
    Ok(())
}
