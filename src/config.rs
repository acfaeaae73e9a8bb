use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::{env, path::PathBuf, str::FromStr, time::Duration};

use crate::services::retry::RetryPolicy;

const MIB: u64 = 1024 * 1024;

/// The server refuses anything larger.
pub const MAX_FILE_SIZE: u64 = 4 * 1024 * MIB;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_url: String,
    pub csrf_token: Option<String>,
    pub request_timeout: Duration,
    pub upload: UploadSettings,
}

/// Knobs of a single upload session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    pub chunk_size: u64,
    pub parallelism: usize,
    pub chunk_retry: RetryPolicy,
    pub resolve_retry: RetryPolicy,
    pub probe_chunks: bool,
    pub verify_checksum: bool,
    pub max_file_size: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            chunk_size: MIB,
            parallelism: 3,
            chunk_retry: RetryPolicy::new(3, Duration::from_millis(500), Duration::from_secs(8)),
            resolve_retry: RetryPolicy::new(6, Duration::from_millis(250), Duration::from_secs(4)),
            probe_chunks: true,
            verify_checksum: true,
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Chunked upload client")]
pub struct Args {
    /// Server base URL (overrides FLOW_UPLOADER_BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// CSRF token (overrides FLOW_UPLOADER_CSRF_TOKEN)
    #[arg(long)]
    pub csrf_token: Option<String>,

    /// Chunk size in bytes (overrides FLOW_UPLOADER_CHUNK_SIZE)
    #[arg(long)]
    pub chunk_size: Option<u64>,

    /// Chunks in flight at once (overrides FLOW_UPLOADER_PARALLELISM)
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Attempts per chunk, first try included (overrides FLOW_UPLOADER_MAX_ATTEMPTS)
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Request timeout in seconds (overrides FLOW_UPLOADER_TIMEOUT_SECS)
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Send every chunk without checking it first. The server only creates
    /// the upload record when a chunk is checked, so against it every chunk
    /// is refused and the upload fails.
    #[arg(long)]
    pub no_probe: bool,

    /// Skip the local MD5 comparison
    #[arg(long)]
    pub no_verify: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Upload a file in chunks
    Upload {
        path: PathBuf,
        /// Re-attach to an earlier session id
        #[arg(long)]
        resume: Option<String>,
    },
    /// Register an upload record without sending any content
    Create { name: String },
    /// List upload records
    List,
    /// Show one upload record
    Get { id: String },
    /// Delete an upload record
    Delete { id: String },
    /// Change the display name of an upload
    Rename { id: String, name: String },
    ChangePassword { password: String },
    ResetPasswordInit { email: String },
    ResetPasswordFinish { key: String, password: String },
    /// Show the service and container the server runs in
    CloudInfo,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the command to run.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        Self::merge(Args::parse(), |name| env::var(name))
    }

    fn merge(
        args: Args,
        lookup: impl Fn(&str) -> Result<String, env::VarError>,
    ) -> Result<(Self, Command)> {
        let defaults = UploadSettings::default();

        // --- Environment fallback ---
        let env_base_url = env_or(
            &lookup,
            "FLOW_UPLOADER_BASE_URL",
            "http://localhost:8080/".to_string(),
        )?;
        let env_token = match lookup("FLOW_UPLOADER_CSRF_TOKEN") {
            Ok(token) => Some(token),
            Err(env::VarError::NotPresent) => None,
            Err(err) => return Err(err).context("reading FLOW_UPLOADER_CSRF_TOKEN"),
        };
        let env_chunk_size = env_or(&lookup, "FLOW_UPLOADER_CHUNK_SIZE", defaults.chunk_size)?;
        let env_parallelism = env_or(&lookup, "FLOW_UPLOADER_PARALLELISM", defaults.parallelism)?;
        let env_attempts = env_or(
            &lookup,
            "FLOW_UPLOADER_MAX_ATTEMPTS",
            defaults.chunk_retry.max_attempts,
        )?;
        let env_timeout = env_or(&lookup, "FLOW_UPLOADER_TIMEOUT_SECS", 30u64)?;

        // --- Merge ---
        let chunk_size = args.chunk_size.unwrap_or(env_chunk_size);
        let parallelism = args.parallelism.unwrap_or(env_parallelism);
        let max_attempts = args.max_attempts.unwrap_or(env_attempts);
        if chunk_size == 0 {
            bail!("chunk size must be at least one byte");
        }
        if parallelism == 0 {
            bail!("parallelism must be at least 1");
        }
        if max_attempts == 0 {
            bail!("max attempts must be at least 1");
        }

        let cfg = Self {
            base_url: args.base_url.unwrap_or(env_base_url),
            csrf_token: args.csrf_token.or(env_token),
            request_timeout: Duration::from_secs(args.timeout_secs.unwrap_or(env_timeout)),
            upload: UploadSettings {
                chunk_size,
                parallelism,
                chunk_retry: RetryPolicy {
                    max_attempts,
                    ..defaults.chunk_retry
                },
                probe_chunks: !args.no_probe,
                verify_checksum: !args.no_verify,
                ..defaults
            },
        };

        Ok((cfg, args.command))
    }
}

fn env_or<T>(
    lookup: &impl Fn(&str) -> Result<String, env::VarError>,
    name: &str,
    default: T,
) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
