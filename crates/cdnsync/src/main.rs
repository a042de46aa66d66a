// # cdnsync - CDN configuration driver
//
// This binary is a THIN integration layer:
// - Reading configuration from flags and environment variables
// - Initializing logging and the runtime
// - Registering providers
// - Deciding which lifecycle operation runs (create, update, read, delete)
//
// All reconciliation logic lives in cdnsync-core.
//
// ## Configuration
//
// - `CDNSYNC_API_KEY`: Fastly API key (required)
// - `CDNSYNC_API_URL`: API endpoint override
// - `CDNSYNC_STATE_PATH`: State file (default: cdnsync-state.json)
// - `CDNSYNC_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
// - `CDNSYNC_SETTLE_DELAY_MS`: Fixed wait after cloning a version
// - `CDNSYNC_SETTLE_POLL_ATTEMPTS`: Readiness polls after cloning (0 disables)
// - `CDNSYNC_SETTLE_POLL_INTERVAL_MS`: Wait between readiness polls
//
// ## Example
//
// ```bash
// export CDNSYNC_API_KEY=your_key
// export CDNSYNC_STATE_PATH=/var/lib/cdnsync/state.json
//
// cdnsync apply web.json
// cdnsync show SU1Z0isxPaozGVKXdv0eY
// cdnsync destroy web --force
// ```

mod commands;

use anyhow::Result;
use cdnsync_core::{EngineConfig, ProviderConfig, StateStoreConfig, SyncConfig};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, error};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy)]
enum CdnsyncExitCode {
    /// Operation completed
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Remote or state failure
    RuntimeError = 2,
    /// The remote system rejected the new version during validation
    Rejected = 3,
}

impl From<CdnsyncExitCode> for ExitCode {
    fn from(code: CdnsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Declarative configuration for versioned CDN services
#[derive(Debug, Parser)]
#[command(name = "cdnsync", version)]
struct Cli {
    #[command(flatten)]
    settings: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Fastly API key
    #[arg(long, env = "CDNSYNC_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// API endpoint override
    #[arg(long, env = "CDNSYNC_API_URL", global = true)]
    api_url: Option<String>,

    /// State file remembering what was last applied
    #[arg(
        long,
        env = "CDNSYNC_STATE_PATH",
        default_value = "cdnsync-state.json",
        global = true
    )]
    state_path: String,

    /// Log level
    #[arg(
        long,
        env = "CDNSYNC_LOG_LEVEL",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"],
        global = true
    )]
    log_level: String,

    /// Fixed wait after cloning a version (ms)
    #[arg(long, env = "CDNSYNC_SETTLE_DELAY_MS", default_value_t = 0, global = true)]
    settle_delay_ms: u64,

    /// Readiness polls after cloning a version (0 disables polling)
    #[arg(
        long,
        env = "CDNSYNC_SETTLE_POLL_ATTEMPTS",
        default_value_t = 10,
        global = true
    )]
    settle_poll_attempts: u32,

    /// Wait between readiness polls (ms)
    #[arg(
        long,
        env = "CDNSYNC_SETTLE_POLL_INTERVAL_MS",
        default_value_t = 1000,
        global = true
    )]
    settle_poll_interval_ms: u64,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create or update a service from a JSON declaration
    Apply {
        /// Declaration file
        file: PathBuf,

        /// Name the service is tracked under in the state file
        /// (defaults to the service name)
        #[arg(long)]
        resource: Option<String>,
    },

    /// Print the observed state of a service as JSON
    Show {
        /// Remote service id
        service_id: String,
    },

    /// Delete a managed service
    Destroy {
        /// Name the service is tracked under in the state file
        resource: String,

        /// Deactivate the active version first
        #[arg(long)]
        force: bool,
    },
}

impl GlobalArgs {
    /// Build and validate the library configuration
    fn sync_config(&self) -> Result<SyncConfig> {
        let api_key = self.api_key.clone().unwrap_or_default();
        if api_key.is_empty() {
            anyhow::bail!(
                "CDNSYNC_API_KEY is required. \
                Set it via: export CDNSYNC_API_KEY=your_key"
            );
        }

        // Check for obvious placeholder keys (common mistake)
        let key_lower = api_key.to_lowercase();
        if key_lower.contains("your_key") || key_lower.contains("replace_me") {
            anyhow::bail!(
                "CDNSYNC_API_KEY appears to be a placeholder. \
                Use an actual API key from your Fastly account."
            );
        }

        if self.state_path.is_empty() {
            anyhow::bail!("CDNSYNC_STATE_PATH cannot be empty");
        }

        // Check parent directory exists
        if let Some(parent) = std::path::Path::new(&self.state_path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "CDNSYNC_STATE_PATH parent directory does not exist: {}. \
                Create it first: mkdir -p {}",
                parent.display(),
                parent.display()
            );
        }

        let config = SyncConfig {
            provider: ProviderConfig::Fastly {
                api_key,
                base_url: self.api_url.clone().filter(|u| !u.is_empty()),
            },
            state_store: StateStoreConfig::File {
                path: self.state_path.clone(),
            },
            engine: EngineConfig {
                settle_delay_ms: self.settle_delay_ms,
                settle_poll_attempts: self.settle_poll_attempts,
                settle_poll_interval_ms: self.settle_poll_interval_ms,
                ..EngineConfig::default()
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn log_level(&self) -> Level {
        match self.log_level.as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.settings.sync_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return CdnsyncExitCode::ConfigError.into();
        }
    };

    // Logs go to stderr; stdout carries JSON output
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.settings.log_level())
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return CdnsyncExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return CdnsyncExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run(config, cli.command).await {
            Ok(()) => CdnsyncExitCode::Success,
            Err(e) => {
                error!("{:#}", e);
                exit_code_for(&e)
            }
        }
    });

    result.into()
}

async fn run(config: SyncConfig, command: Command) -> Result<()> {
    let ctx = commands::Context::build(&config).await?;

    match command {
        Command::Apply { file, resource } => commands::apply(&ctx, &file, resource.as_deref()).await,
        Command::Show { service_id } => commands::show(&ctx, &service_id).await,
        Command::Destroy { resource, force } => commands::destroy(&ctx, &resource, force).await,
    }
}

fn exit_code_for(err: &anyhow::Error) -> CdnsyncExitCode {
    match err.downcast_ref::<cdnsync_core::Error>().map(|e| e.root()) {
        Some(cdnsync_core::Error::Validation { .. }) => CdnsyncExitCode::Rejected,
        Some(cdnsync_core::Error::Config(_) | cdnsync_core::Error::InvalidInput(_)) => {
            CdnsyncExitCode::ConfigError
        }
        _ => CdnsyncExitCode::RuntimeError,
    }
}
