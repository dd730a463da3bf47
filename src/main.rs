//! dicecast - dice roll overlay for one character
//!
//! Usage: `dicecast <character-id> [--config <path>]`
//!
//! Serves the HTTP relay, joins the character's dice channel and redraws the
//! terminal every time the roll on screen changes. Logs go to stderr so the
//! overlay owns stdout.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use dicecast::channel::Hub;
use dicecast::config::Config;
use dicecast::db::Database;
use dicecast::overlay::Overlay;
use dicecast::paths::{self, Paths};
use dicecast::render;
use dicecast::sequencer::DisplaySnapshot;
use dicecast::{relay, OverlayError};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dicecast=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((raw_id, config_path)) = parse_args(&args) else {
        eprintln!("Usage: dicecast <character-id> [--config <path>]");
        std::process::exit(2);
    };

    let config = Config::load(&config_path).context("failed to load config")?;
    let paths = Paths::for_config(config_path, config.db_path.as_deref());
    paths.log();
    paths.ensure_db_dir()?;
    let db = Database::open(&paths.db).context("failed to open database")?;
    let hub = Arc::new(Hub::new(config.room_capacity));
    let shutdown = CancellationToken::new();

    let relay_task = if config.relay_enabled {
        let (addr, task) =
            relay::start_relay(config.relay_addr, hub.clone(), shutdown.clone()).await?;
        info!(%addr, "relay started");
        Some(task)
    } else {
        None
    };

    let mut stdout = std::io::stdout();

    match Overlay::mount(&db, &hub, config.display.sequencer(), &raw_id) {
        Ok(overlay) => {
            run_overlay(overlay, &mut stdout).await?;
        }
        Err(OverlayError::CharacterNotFound(id)) => {
            warn!(id = %id, "no character for id, nothing to show");
            let frame = render::frame(None, &DisplaySnapshot::default());
            write!(stdout, "{}{}", render::screen(&frame), render::ctrl::CRLF)?;
            stdout.flush()?;
        }
        Err(e) => return Err(e.into()),
    }

    shutdown.cancel();
    if let Some(task) = relay_task {
        relay::join_relay(task).await;
    }

    info!("dicecast stopped");
    Ok(())
}

fn parse_args(args: &[String]) -> Option<(String, PathBuf)> {
    let mut raw_id = None;
    let mut explicit_config = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => explicit_config = Some(PathBuf::from(iter.next()?)),
            "--help" | "-h" => return None,
            _ if raw_id.is_none() => raw_id = Some(arg.clone()),
            _ => return None,
        }
    }

    raw_id.map(|id| (id, paths::config_file(explicit_config)))
}

/// Redraw on every display change until ctrl-c
async fn run_overlay(overlay: Overlay, stdout: &mut std::io::Stdout) -> Result<()> {
    let mut display = overlay.display();
    let character = overlay.character().clone();

    write!(stdout, "{}", render::ctrl::hide_cursor())?;
    draw(stdout, &character, &display.borrow_and_update())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            changed = display.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = display.borrow_and_update().clone();
                draw(stdout, &character, &snapshot)?;
            }
        }
    }

    overlay.unmount().await;
    write!(stdout, "{}{}", render::ctrl::show_cursor(), render::ctrl::CRLF)?;
    stdout.flush()?;
    Ok(())
}

fn draw(
    stdout: &mut std::io::Stdout,
    character: &dicecast::db::Character,
    snapshot: &DisplaySnapshot,
) -> Result<()> {
    let frame = render::frame(Some(character), snapshot);
    write!(stdout, "{}", render::screen(&frame))?;
    stdout.flush().context("failed to flush overlay frame")?;
    Ok(())
}
