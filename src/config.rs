use crate::services::storage_service::DEFAULT_MAX_UPLOAD_BYTES;
use anyhow::{Context, Result};
use clap::Parser;
use std::{
    env::{self, VarError},
    path::{Path, PathBuf},
};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Image upload and listing API")]
pub struct Args {
    /// Host to bind to (overrides HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploaded images are stored (overrides UPLOAD_DIR).
    /// Relative paths are resolved against the executable's directory.
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Largest accepted upload in bytes (overrides MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<u64>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();
        let exe_dir = env::current_exe()
            .context("locating the running executable")?
            .parent()
            .map(Path::to_path_buf)
            .context("executable has no parent directory")?;

        Self::resolve(args, read_env, &exe_dir)
    }

    /// Merge parsed args over values from `lookup`, falling back to defaults.
    pub fn resolve(
        args: Args,
        lookup: impl Fn(&str) -> Result<Option<String>>,
        exe_dir: &Path,
    ) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = lookup("HOST")?.unwrap_or_else(|| "0.0.0.0".into());
        let env_port = match lookup("PORT")? {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing PORT value `{}`", value))?,
            None => 3000,
        };
        let env_upload_dir = lookup("UPLOAD_DIR")?.unwrap_or_else(|| "uploads".into());
        let env_max = match lookup("MAX_UPLOAD_BYTES")? {
            Some(value) => value
                .parse::<u64>()
                .with_context(|| format!("parsing MAX_UPLOAD_BYTES value `{}`", value))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        // --- Merge ---
        let upload_dir = args.upload_dir.unwrap_or(env_upload_dir);
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            upload_dir: exe_dir.join(upload_dir),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Unset variables fall back to defaults; set but non-UTF-8 ones are errors.
fn read_env(key: &str) -> Result<Option<String>> {
    match env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}
