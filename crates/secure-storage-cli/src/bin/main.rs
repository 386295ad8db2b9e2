//! secure-storage CLI
//!
//! Stores values through the strongest backend available on this machine.
//! Settings, records and the shared key file live in the data directory;
//! keystore keys live in the OS keychain.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, Level};

use secure_storage_cli::StdioHost;
use secure_storage_core::{
    build_registry, default_data_dir, CipherIdentity, FileRecordStore, SecureStorageFacade,
    SecureStore, SecurityLevel, SettingsManager,
};

/// Secure storage - encrypt values with the strongest available backend
#[derive(Parser, Debug)]
#[command(name = "secure-storage")]
#[command(author = "Symbia Labs")]
#[command(version = "0.1.0")]
#[command(about = "Secure storage - pluggable cipher backends selected by security level")]
struct Args {
    /// Data directory (defaults to the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Required security level (ANY, SECURE_SOFTWARE, SECURE_HARDWARE)
    #[arg(long, global = true)]
    level: Option<SecurityLevel>,

    /// Passphrase for the shared key instead of a key file
    #[arg(long, global = true, env = "SECURE_STORAGE_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,

    /// Prompt for the passphrase
    #[arg(long, global = true, conflicts_with = "passphrase")]
    ask_passphrase: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encrypt and store a value
    Set { key: String, value: String },
    /// Print a stored value
    Get { key: String },
    /// Print whether a key is stored
    Exists { key: String },
    /// List stored keys
    Keys,
    /// Remove values and their keys
    Remove {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Remove every value in the namespace
    Clear,
    /// Show registered backends and the one a request would use
    Backends,
    /// Serve line-delimited JSON requests on stdin/stdout
    Request,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BackendReport {
    platform_version: u32,
    requested: SecurityLevel,
    selected: Option<&'static str>,
    backends: Vec<CipherIdentity>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Logs go to stderr so stdout stays clean for values and responses
    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    debug!("Using data directory {:?}", data_dir);

    let manager = SettingsManager::new(&data_dir)
        .with_context(|| format!("Failed to load settings from {:?}", data_dir))?;
    let settings = manager.get();
    let level = args.level.unwrap_or(settings.default_level);

    let passphrase = if args.ask_passphrase {
        Some(rpassword::prompt_password("Passphrase: ")?)
    } else {
        args.passphrase
    };

    let registry = build_registry(settings, &data_dir, passphrase)
        .context("Failed to configure backends")?;
    let facade = SecureStorageFacade::new(registry);

    let store = || -> anyhow::Result<SecureStore> {
        let records = FileRecordStore::with_dir(&data_dir)
            .with_context(|| format!("Failed to open records in {:?}", data_dir))?;
        Ok(SecureStore::new(
            facade.clone(),
            Arc::new(records),
            settings.namespace.clone(),
        )?)
    };

    match args.command {
        Command::Set { key, value } => {
            store()?.set(&key, &value, level)?;
        }
        Command::Get { key } => match store()?.get(&key)? {
            Some(value) => println!("{}", value),
            None => {
                eprintln!("Key not found: {}", key);
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::Exists { key } => {
            println!("{}", store()?.exists(&key)?);
        }
        Command::Keys => {
            for key in store()?.keys()? {
                println!("{}", key);
            }
        }
        Command::Remove { keys } => {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            let failed = store()?.multi_remove(&keys);
            if !failed.is_empty() {
                bail!("Could not remove: {}", failed.join(", "));
            }
        }
        Command::Clear => {
            let failed = store()?.clear()?;
            if !failed.is_empty() {
                bail!("Could not remove: {}", failed.join(", "));
            }
        }
        Command::Backends => {
            let registry = facade.registry();
            let report = BackendReport {
                platform_version: registry.platform_version(),
                requested: level,
                selected: registry.select(level).ok().map(|b| b.name()),
                backends: registry.identities(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Request => {
            StdioHost::new(facade.clone()).run()?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
