//! Dexcom-OSC bridge entry point.
//!
//! Shows the latest Dexcom Share glucose reading in the VRChat chatbox of a
//! headset on the local network.
//!
//! # Usage
//!
//! ```text
//! dexcom-osc-bridge [--cred-file PATH] [--config PATH] setup
//!     [--region us|ous|jp] [--username U] [--show-password] [--machine-key]
//!
//! dexcom-osc-bridge [--cred-file PATH] [--config PATH] run
//!     [--host auto|HOST] [--port 9000] [--interval SECS] [--min-delta N]
//! ```
//!
//! `setup` asks for the Share account, checks it against the service, and
//! stores it encrypted.  `run` unlocks the stored account and polls until
//! Ctrl+C.
//!
//! # Environment variable overrides
//!
//! | Variable             | Flag            |
//! |----------------------|-----------------|
//! | `DEXOSC_CRED_FILE`   | `--cred-file`   |
//! | `DEXOSC_CONFIG`      | `--config`      |
//! | `DEXOSC_REGION`      | `--region`      |
//! | `DEXOSC_USERNAME`    | `--username`    |
//! | `DEXOSC_HOST`        | `--host`        |
//! | `DEXOSC_PORT`        | `--port`        |
//! | `DEXOSC_INTERVAL`    | `--interval`    |
//! | `DEXOSC_MIN_DELTA`   | `--min-delta`   |
//!
//! Log verbosity comes from `RUST_LOG`, then `[logging] level` in the
//! settings file, then `info`.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gluco_bridge::application::poll_engine::PollingEngine;
use gluco_bridge::application::ports::ShareError;
use gluco_bridge::infrastructure::endpoint::{BrowseQuery, Destination, MdnsBrowser, Resolver};
use gluco_bridge::infrastructure::network::OscSender;
use gluco_bridge::infrastructure::share::{ShareClient, ShareClientConfig};
use gluco_bridge::infrastructure::storage::config::{
    load_settings, settings_file_path, BridgeSettings,
};
use gluco_bridge::infrastructure::vault::{CredentialVault, KeySource, KeySourceKind};
use gluco_core::{Credentials, Region};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Dexcom Share to VRChat chatbox bridge.
#[derive(Debug, Parser)]
#[command(
    name = "dexcom-osc-bridge",
    about = "Shows Dexcom Share glucose readings in the VRChat chatbox over OSC",
    version
)]
struct Cli {
    /// Encrypted credential file.  Defaults to the per-user config directory.
    #[arg(long, global = true, env = "DEXOSC_CRED_FILE")]
    cred_file: Option<PathBuf>,

    /// Settings file.  Defaults to `config.toml` in the per-user config
    /// directory; a missing file means built-in defaults.
    #[arg(long, global = true, env = "DEXOSC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Enter, verify and save the Share account credentials.
    Setup(SetupArgs),
    /// Poll the Share service and forward readings to the chatbox.
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct SetupArgs {
    /// Share region: us, ous (outside US) or jp.  Prompted for if absent.
    #[arg(long, env = "DEXOSC_REGION")]
    region: Option<Region>,

    /// Share account name (user name, e-mail or phone).  Prompted for if absent.
    #[arg(long, env = "DEXOSC_USERNAME")]
    username: Option<String>,

    /// Echo the password while typing it.
    #[arg(long)]
    show_password: bool,

    /// Bind the saved credentials to this machine instead of a passphrase,
    /// so `run` can start without a prompt.
    #[arg(long)]
    machine_key: bool,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Headset address, or `auto` to find it with mDNS.
    #[arg(long, default_value = "auto", env = "DEXOSC_HOST")]
    host: String,

    /// Headset OSC input port.  Ignored with `--host auto`.
    #[arg(long, default_value_t = 9000, env = "DEXOSC_PORT")]
    port: u16,

    /// Seconds between polls.  Overrides the settings file; minimum 10.
    #[arg(long, env = "DEXOSC_INTERVAL")]
    interval: Option<u64>,

    /// Minimum mg/dL change worth sending.  Overrides the settings file.
    #[arg(long, env = "DEXOSC_MIN_DELTA")]
    min_delta: Option<u16>,
}

impl Cli {
    fn vault(&self) -> anyhow::Result<CredentialVault> {
        let path = match &self.cred_file {
            Some(p) => p.clone(),
            None => CredentialVault::default_path()
                .context("cannot locate the credential file; pass --cred-file")?,
        };
        Ok(CredentialVault::new(path))
    }

    fn settings(&self) -> anyhow::Result<BridgeSettings> {
        let path = match &self.config {
            Some(p) => p.clone(),
            None => match settings_file_path() {
                Ok(p) => p,
                // No config directory at all: nothing to read.
                Err(_) => return Ok(BridgeSettings::default()),
            },
        };
        load_settings(&path).with_context(|| format!("invalid settings file {}", path.display()))
    }
}

impl RunArgs {
    /// Applies command-line overrides on top of the settings file.
    fn apply_to(&self, settings: &mut BridgeSettings) {
        if let Some(secs) = self.interval {
            settings.polling.interval_secs = secs;
        }
        if let Some(delta) = self.min_delta {
            settings.polling.min_delta = delta;
        }
    }

    fn destination(&self) -> anyhow::Result<Destination> {
        Destination::from_host_port(&self.host, self.port)
            .with_context(|| format!("invalid --host/--port '{}:{}'", self.host, self.port))
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings()?;

    // `RUST_LOG` wins; otherwise the settings file level, otherwise `info`.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::try_new(&settings.logging.level).unwrap_or_else(|_| EnvFilter::new("info"))
        }))
        .init();

    match &cli.command {
        Command::Setup(args) => setup(&cli, args, &settings).await,
        Command::Run(args) => run(&cli, args, settings).await,
    }
}

// ── setup ─────────────────────────────────────────────────────────────────────

async fn setup(cli: &Cli, args: &SetupArgs, settings: &BridgeSettings) -> anyhow::Result<()> {
    let vault = cli.vault()?;
    let credentials = collect_credentials(args)?;

    println!("Checking the account with Dexcom Share ...");
    let mut client = ShareClient::new(credentials.clone(), share_config(settings))
        .context("failed to initialise the HTTP client")?;
    match client.verify_login().await {
        Ok(()) => println!("Login OK."),
        Err(ShareError::Auth(code)) => bail!(
            "Dexcom Share rejected the login ({code}). Check the user name, password and \
             region, and that sharing is enabled in the Dexcom app. Nothing was saved."
        ),
        Err(ShareError::Transient(detail)) => bail!(
            "could not reach Dexcom Share ({detail}). Check the network and try again. \
             Nothing was saved."
        ),
    }

    let key = if args.machine_key {
        KeySource::Machine
    } else {
        prompt_new_passphrase()?
    };
    vault
        .save(&credentials, &key)
        .with_context(|| format!("failed to save credentials to {}", vault.path().display()))?;

    println!("Saved encrypted credentials to {}", vault.path().display());
    Ok(())
}

fn collect_credentials(args: &SetupArgs) -> anyhow::Result<Credentials> {
    let region = match args.region {
        Some(r) => r,
        None => loop {
            let answer = prompt_line("Region [us / ous / jp]: ")?;
            match answer.parse::<Region>() {
                Ok(r) => break r,
                Err(e) => eprintln!("{e}"),
            }
        },
    };

    let username = match &args.username {
        Some(u) if !u.trim().is_empty() => u.trim().to_string(),
        _ => loop {
            let answer = prompt_line("Dexcom user name / e-mail / phone: ")?;
            if !answer.is_empty() {
                break answer;
            }
        },
    };

    let password = if args.show_password {
        prompt_line("Dexcom password (visible): ")?
    } else {
        rpassword::prompt_password("Dexcom password: ").context("failed to read password")?
    };
    if password.is_empty() {
        bail!("the password must not be empty");
    }

    Ok(Credentials::new(username, password, region))
}

fn prompt_new_passphrase() -> anyhow::Result<KeySource> {
    let first = rpassword::prompt_password("Choose a passphrase for the credential file: ")
        .context("failed to read passphrase")?;
    if first.is_empty() {
        bail!("the passphrase must not be empty (or use --machine-key)");
    }
    let second =
        rpassword::prompt_password("Repeat the passphrase: ").context("failed to read passphrase")?;
    if first != second {
        bail!("the passphrases do not match; nothing was saved");
    }
    Ok(KeySource::passphrase(first))
}

fn prompt_line(prompt: &str) -> anyhow::Result<String> {
    let mut stdout = std::io::stdout();
    stdout.write_all(prompt.as_bytes())?;
    stdout.flush()?;
    let mut line = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from the terminal")?;
    if read == 0 {
        bail!("input closed before setup finished");
    }
    Ok(line.trim().to_string())
}

// ── run ───────────────────────────────────────────────────────────────────────

async fn run(cli: &Cli, args: &RunArgs, mut settings: BridgeSettings) -> anyhow::Result<()> {
    args.apply_to(&mut settings);
    let destination = args.destination()?;

    let vault = cli.vault()?;
    let key = match vault.peek_key_source().context("cannot read saved credentials")? {
        KeySourceKind::Machine => KeySource::Machine,
        KeySourceKind::Passphrase => KeySource::passphrase(
            rpassword::prompt_password("Credential file passphrase: ")
                .context("failed to read passphrase")?,
        ),
    };
    let credentials = vault
        .load(&key)
        .context("cannot unlock saved credentials; re-run `dexcom-osc-bridge setup` if needed")?;
    info!("loaded {} Share account", credentials.region);

    let share = ShareClient::new(credentials, share_config(&settings))
        .context("failed to initialise the HTTP client")?;
    let resolver = Resolver::new(
        destination,
        MdnsBrowser::new(),
        BrowseQuery {
            service_type: settings.discovery.service_type.clone(),
            instance_prefix: settings.discovery.instance_prefix.clone(),
            timeout: Duration::from_millis(settings.discovery.browse_timeout_ms),
        },
        Duration::from_secs(settings.discovery.ttl_secs),
    );
    match resolver.destination() {
        Destination::Fixed(addr) => info!("sending to fixed OSC endpoint {addr}"),
        Destination::Auto => info!(
            "discovering OSC endpoint via mDNS ({} {}*)",
            settings.discovery.service_type, settings.discovery.instance_prefix
        ),
    }
    let sender = OscSender::bind(settings.chatbox.notify)
        .await
        .context("failed to open a UDP socket")?;

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, stopping");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    let mut engine = PollingEngine::new(
        share,
        resolver,
        sender,
        settings.poll_settings(),
        running,
    );
    engine.run().await?;

    info!("bridge stopped");
    Ok(())
}

fn share_config(settings: &BridgeSettings) -> ShareClientConfig {
    ShareClientConfig {
        connect_timeout: Duration::from_secs(settings.share.connect_timeout_secs),
        request_timeout: Duration::from_secs(settings.share.request_timeout_secs),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
