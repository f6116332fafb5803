use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use drm_common::channel::{Command, CommandChannel};
use drm_common::Secrets;
use drm_controller::controller::Controller;
use drm_controller::error::Error as ControllerError;
use drm_controller::hw::SimHardware;

/// Audio DRM controller: a standalone entry point that loads the secrets
/// table, wires up a simulated DMA/FIFO/LED hardware surface, and — if a
/// song container is given — issues a single `PLAY` command against it,
/// the way the production firmware's host player would over the shared
/// command channel.
#[derive(Parser, Debug)]
#[command(name = "drm-controller", version, about)]
struct Args {
    /// Path to the TOML secrets table (regions, users, symmetric keys).
    #[arg(long)]
    secrets: PathBuf,

    /// Path to a song container to play on startup. Its first byte is the
    /// metadata block's `md_size`, per `drm_common::song`'s on-wire layout.
    #[arg(long)]
    song: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env().add_directive("drm_controller=info".parse()?)).init();

    let args = Args::parse();

    let secrets_text = std::fs::read_to_string(&args.secrets)
        .map_err(|e| ControllerError::InitFailed(format!("reading secrets file {}: {e}", args.secrets.display())))?;
    let secrets = Secrets::load_toml(&secrets_text)
        .map_err(|e| ControllerError::InitFailed(format!("loading secrets: {e}")))?;
    tracing::info!(regions = secrets.regions.len(), users = secrets.users.len(), "loaded secrets table");

    let mut controller = Controller::new(secrets, SimHardware::new());
    let channel = Arc::new(Mutex::new(CommandChannel::default()));
    let interrupt = Arc::new(AtomicBool::new(false));

    let Some(song_path) = args.song else {
        tracing::info!("no --song given; controller initialized and idle");
        return Ok(());
    };

    let bytes = std::fs::read(&song_path).map_err(|e| anyhow::anyhow!("reading song file {}: {e}", song_path.display()))?;
    let md_size = *bytes.first().ok_or_else(|| anyhow::anyhow!("song file {} is empty", song_path.display()))? as usize;
    if bytes.len() < md_size {
        anyhow::bail!("song file {} is shorter than its own declared metadata size", song_path.display());
    }
    let (md_bytes, payload) = bytes.split_at(md_size);

    {
        let mut ch = channel.lock().expect("command channel mutex poisoned");
        ch.song.md_bytes = md_bytes.to_vec();
        ch.song.payload = payload.to_vec();
        ch.song.file_size = bytes.len() as u32;
        ch.cmd = Command::Play.as_raw();
    }
    interrupt.store(true, Ordering::Release);

    controller.step(&channel, &interrupt);

    let wav_size = channel.lock().expect("command channel mutex poisoned").song.wav_size;
    tracing::info!(wav_size, "playback finished");
    Ok(())
}
