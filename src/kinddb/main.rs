use anyhow::{bail, Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use kinddb::config::{StoreConfig, CONFIG_FILENAME};
use kinddb::{Datastore, Key, KeyValueStore, KindError, Value};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod args;
use args::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_dir = resolve_config_dir(cli.config_dir.as_deref());
    match cli.command {
        Commands::Keys { kind } => handle_keys(&config_dir, kind.as_deref()),
        Commands::Show { token } => handle_show(&config_dir, &token),
        Commands::Encode { parts } => handle_encode(&parts),
        Commands::Decode { token } => handle_decode(&token),
        Commands::Init => handle_init(&config_dir),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("KINDDB_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    ProjectDirs::from("org", "kinddb", "kinddb")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn open(config_dir: &Path) -> Result<Datastore> {
    let config = StoreConfig::load(config_dir)
        .with_context(|| format!("reading {}", config_dir.join(CONFIG_FILENAME).display()))?;
    Ok(Datastore::from_config(&config, config_dir)?)
}

fn handle_keys(config_dir: &Path, kind: Option<&str>) -> Result<()> {
    let ds = open(config_dir)?;
    for key in ds.keys()? {
        if kind.is_some_and(|k| k != key.kind()) {
            continue;
        }
        println!("{}\t{}", key.urlsafe(), key);
    }
    Ok(())
}

fn handle_show(config_dir: &Path, token: &str) -> Result<()> {
    let key = Key::from_urlsafe(token)?;
    let ds = open(config_dir)?;
    let record = ds
        .store()
        .get(&key)?
        .ok_or_else(|| KindError::NotFound(key.clone()))?;
    println!("{}", key);
    for (name, value) in &record {
        println!("  {} = {}", name, value);
    }
    Ok(())
}

fn handle_encode(parts: &[String]) -> Result<()> {
    if parts.len() % 2 != 0 {
        bail!("expected kind/id pairs, got {} arguments", parts.len());
    }
    let flat = parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            if i % 2 == 0 {
                Some(Value::from(part.as_str()))
            } else {
                Some(parse_id(part))
            }
        })
        .collect();
    let key = Key::from_flat(flat)?;
    println!("{}", key.urlsafe());
    Ok(())
}

/// Integers become integer ids, anything else a name.
fn parse_id(raw: &str) -> Value {
    match raw.parse::<i64>() {
        Ok(i) => Value::Integer(i),
        Err(_) => Value::from(raw),
    }
}

fn handle_decode(token: &str) -> Result<()> {
    let key = Key::from_urlsafe(token)?;
    println!("{}", key);
    Ok(())
}

fn handle_init(config_dir: &Path) -> Result<()> {
    let path = config_dir.join(CONFIG_FILENAME);
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    StoreConfig::default().save(config_dir)?;
    println!("Wrote {}", path.display());
    Ok(())
}
