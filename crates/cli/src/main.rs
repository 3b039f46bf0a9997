//! AliasSync command-line tool.
//!
//! Reconciles one entity alias, declared in a TOML manifest, against the
//! identity backend and records the result in a JSON state file.

mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use aliassync_core::config::AppConfig;
use aliassync_core::identity::ReadRetryPolicy;
use aliassync_core::state::{AliasManifest, StateFile};
use aliassync_core::{Diagnostics, EntityAliasResource, MutexRegistry, VaultClient};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// AliasSync command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "aliassync",
    version,
    about = "Create, refresh, update and delete an identity entity alias"
)]
struct Cli {
    /// Path to the TOML configuration file
    /// (default: <config dir>/aliassync/config.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the log level from the config file (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./aliassync.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,

    /// Create the alias if it is not tracked yet, otherwise update it.
    Apply {
        /// Alias manifest (TOML).
        #[arg(short, long, default_value = "./alias.toml")]
        manifest: PathBuf,

        #[command(flatten)]
        state: StateArg,
    },

    /// Re-read the tracked alias from the backend.
    Refresh {
        #[command(flatten)]
        state: StateArg,
    },

    /// Delete the tracked alias from the backend.
    Destroy {
        #[command(flatten)]
        state: StateArg,
    },

    /// Start tracking an existing alias by ID.
    Import {
        /// Backend ID of the alias.
        id: String,

        #[command(flatten)]
        state: StateArg,
    },

    /// Print the tracked alias as JSON.
    Show {
        #[command(flatten)]
        state: StateArg,
    },
}

#[derive(clap::Args, Debug)]
struct StateArg {
    /// State file (JSON).
    #[arg(short = 's', long = "state", default_value = "./alias.state.json")]
    path: PathBuf,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}

/// Run one command. `Ok(false)` means the command reported error
/// diagnostics.
async fn run(cli: Cli) -> Result<bool> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    match cli.command {
        Commands::Init { output } => {
            init_tracing(cli.log_level.as_deref().unwrap_or("warn"));
            cmd_init(&output).map(|()| true)
        }
        Commands::Validate => {
            init_tracing(cli.log_level.as_deref().unwrap_or("warn"));
            cmd_validate(&config_path).map(|()| true)
        }
        Commands::Show { state } => {
            init_tracing(cli.log_level.as_deref().unwrap_or("warn"));
            cmd_show(&state.path).map(|()| true)
        }
        command => {
            let config = load_config(&config_path)?;
            init_tracing(
                cli.log_level
                    .as_deref()
                    .unwrap_or(&config.logging.log_level),
            );
            let session = Session::new(&config)?;

            match command {
                Commands::Apply { manifest, state } => session.apply(&manifest, &state.path).await,
                Commands::Refresh { state } => session.refresh(&state.path).await,
                Commands::Destroy { state } => session.destroy(&state.path).await,
                Commands::Import { id, state } => session.import(&id, &state.path).await,
                Commands::Init { .. } | Commands::Validate | Commands::Show { .. } => {
                    unreachable!("handled above")
                }
            }
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("aliassync")
        .join("config.toml")
}

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load_and_resolve(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

// ---------------------------------------------------------------------------
// Backend-facing commands
// ---------------------------------------------------------------------------

/// A configured backend client plus the alias reconciler.
struct Session {
    client: VaultClient,
    resource: EntityAliasResource,
}

impl Session {
    fn new(config: &AppConfig) -> Result<Self> {
        let client = VaultClient::from_config(&config.vault).context("failed to create API client")?;
        let locks = Arc::new(MutexRegistry::new());
        let resource = EntityAliasResource::new(locks)
            .with_read_retry(ReadRetryPolicy::from(&config.vault.read_retry));
        debug!(address = client.address(), "backend client ready");
        Ok(Self { client, resource })
    }

    async fn apply(&self, manifest_path: &Path, state_path: &Path) -> Result<bool> {
        let manifest = AliasManifest::load(manifest_path).context("failed to load manifest")?;
        let tracked = StateFile::load(state_path).context("failed to load state")?;

        let updating = tracked.is_some();
        let mut state = tracked.unwrap_or_default();
        manifest.apply_to(&mut state);

        let (diags, verb) = if updating {
            (self.resource.update(&self.client, &mut state).await, "updated")
        } else {
            (self.resource.create(&self.client, &mut state).await, "created")
        };

        // A failed update keeps the last known good record. A create whose
        // read-back failed still has an ID and must be recorded.
        if diags.has_error() && updating {
            return Ok(report(&diags, None));
        }
        StateFile::save(state_path, &state).context("failed to save state")?;
        Ok(report(
            &diags,
            Some(format!("entity alias {:?} {} (id {})", state.name, verb, state.id)),
        ))
    }

    async fn refresh(&self, state_path: &Path) -> Result<bool> {
        let Some(mut state) = StateFile::load(state_path).context("failed to load state")? else {
            println!("No alias is tracked in {}", state_path.display());
            return Ok(true);
        };
        let id = state.id.clone();

        let diags = self.resource.read(&self.client, &mut state).await;
        if diags.has_error() {
            return Ok(report(&diags, None));
        }
        StateFile::save(state_path, &state).context("failed to save state")?;

        let msg = if state.exists() {
            format!("entity alias {:?} is up to date", id)
        } else {
            format!("entity alias {:?} no longer exists, stopped tracking it", id)
        };
        Ok(report(&diags, Some(msg)))
    }

    async fn destroy(&self, state_path: &Path) -> Result<bool> {
        let Some(mut state) = StateFile::load(state_path).context("failed to load state")? else {
            println!("No alias is tracked in {}", state_path.display());
            return Ok(true);
        };
        let id = state.id.clone();

        let diags = self.resource.delete(&self.client, &mut state).await;
        if diags.has_error() {
            return Ok(report(&diags, None));
        }
        StateFile::save(state_path, &state).context("failed to save state")?;
        Ok(report(&diags, Some(format!("entity alias {:?} deleted", id))))
    }

    async fn import(&self, id: &str, state_path: &Path) -> Result<bool> {
        if StateFile::load(state_path)
            .context("failed to load state")?
            .is_some()
        {
            anyhow::bail!(
                "{} already tracks an alias; destroy it or use a different --state path",
                state_path.display()
            );
        }

        let (state, diags) = self.resource.import(&self.client, id).await;
        if diags.has_error() {
            return Ok(report(&diags, None));
        }
        StateFile::save(state_path, &state).context("failed to save state")?;
        Ok(report(
            &diags,
            Some(format!(
                "imported entity alias {:?} ({:?} on {:?})",
                state.id, state.name, state.mount_accessor
            )),
        ))
    }
}

/// Print diagnostics and, if there were no errors, the success message.
fn report(diags: &Diagnostics, success: Option<String>) -> bool {
    style::print_diagnostics(diags);
    if diags.has_error() {
        return false;
    }
    if let Some(msg) = success {
        println!("{}", style::success(&msg));
    }
    true
}

// ---------------------------------------------------------------------------
// Local commands
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, AppConfig::sample()).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file with your backend address");
    println!("  2. Export the token variable it references (VAULT_TOKEN by default)");
    println!(
        "  3. Validate with: aliassync validate --config {}",
        output.display()
    );
    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    let token_status = match config.resolve_env_vars() {
        Ok(()) => "set",
        Err(_) => "NOT SET",
    };
    println!("  [OK] Environment variable references processed");

    match config.validate() {
        Ok(()) => println!("  [OK] All required fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    println!("  Address       : {}", config.vault.address);
    println!(
        "  Namespace     : {}",
        config.vault.namespace.as_deref().unwrap_or("(none)")
    );
    println!("  Token ({}) : {}", config.vault.token_env, token_status);
    println!("  Timeout       : {}s", config.vault.timeout_secs);
    println!("  Log level     : {}", config.logging.log_level);
    Ok(())
}

fn cmd_show(state_path: &Path) -> Result<()> {
    match StateFile::load(state_path).context("failed to load state")? {
        Some(state) => {
            let json = serde_json::to_string_pretty(&state).context("failed to render state")?;
            println!("{}", json);
        }
        None => println!("No alias is tracked in {}", state_path.display()),
    }
    Ok(())
}
