//! dicecast-admin - CLI for managing dicecast characters
//!
//! Usage:
//!   dicecast-admin add <name>
//!   dicecast-admin rename <id> <name>
//!   dicecast-admin remove <id>
//!   dicecast-admin list

use anyhow::{Context, Result};
use std::env;

use dicecast::channel::dice_channel;
use dicecast::config::Config;
use dicecast::db::{format_timestamp, parse_character_id, Database};
use dicecast::paths::{self, Paths};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let paths = resolve_paths()?;
    paths.ensure_db_dir()?;
    let db = Database::open(&paths.db).context("failed to open database")?;

    match args[1].as_str() {
        "add" => cmd_add(&db, &args[2..])?,
        "rename" => cmd_rename(&db, &args[2..])?,
        "remove" => cmd_remove(&db, &args[2..])?,
        "list" => cmd_list(&db)?,
        "help" | "--help" | "-h" => print_usage(),
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Same database the overlay would open, including a config's `db_path`
fn resolve_paths() -> Result<Paths> {
    let config_path = paths::config_file(None);
    let config = Config::load(&config_path).context("failed to load config")?;
    Ok(Paths::for_config(config_path, config.db_path.as_deref()))
}

fn print_usage() {
    let resolved = resolve_paths();
    let (config, db) = match &resolved {
        Ok(p) => (p.config.display().to_string(), p.db.display().to_string()),
        Err(e) => (format!("unreadable ({:#})", e), "unknown".to_string()),
    };

    eprintln!(
        r#"dicecast-admin - Manage dicecast characters

Usage:
  dicecast-admin add <name>
  dicecast-admin rename <id> <name>
  dicecast-admin remove <id>
  dicecast-admin list

Environment:
  DICECAST_CONFIG  Override config file
  DICECAST_DB      Override database path (wins over db_path in the config)

Paths:
  Config: {config}
  DB:     {db}

Examples:
  dicecast-admin add "Ayla Stormborn"
  dicecast-admin list
  dicecast 1
"#,
        config = config,
        db = db,
    );
}

fn parse_id(raw: &str) -> Result<i64> {
    parse_character_id(raw).with_context(|| format!("invalid character id: {}", raw))
}

fn cmd_add(db: &Database, args: &[String]) -> Result<()> {
    if args.is_empty() {
        anyhow::bail!("Usage: dicecast-admin add <name>");
    }

    let name = args.join(" ");
    let character = db.insert_character(&name)?;

    println!("Added {} (id {})", character.name, character.id);
    println!("  Channel: {}", dice_channel(character.id));

    Ok(())
}

fn cmd_rename(db: &Database, args: &[String]) -> Result<()> {
    if args.len() < 2 {
        anyhow::bail!("Usage: dicecast-admin rename <id> <name>");
    }

    let id = parse_id(&args[0])?;
    let name = args[1..].join(" ");

    if db.rename_character(id, &name)? {
        println!("Renamed {} to {}", id, name);
    } else {
        println!("Character {} not found", id);
    }

    Ok(())
}

fn cmd_remove(db: &Database, args: &[String]) -> Result<()> {
    if args.is_empty() {
        anyhow::bail!("Usage: dicecast-admin remove <id>");
    }

    let id = parse_id(&args[0])?;

    if db.delete_character(id)? {
        println!("Removed character {}", id);
    } else {
        println!("Character {} not found", id);
    }

    Ok(())
}

fn cmd_list(db: &Database) -> Result<()> {
    let characters = db.list_characters()?;

    if characters.is_empty() {
        println!("No characters registered");
        return Ok(());
    }

    println!("Characters:");
    for character in characters {
        println!(
            "  {:>4}  {} (channel {}, added {})",
            character.id,
            character.name,
            dice_channel(character.id),
            format_timestamp(character.created_at)
        );
    }

    Ok(())
}
