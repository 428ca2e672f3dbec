use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr, time::Duration};

use crate::services::{completion::DEFAULT_RECENCY_HOURS, retention::DEFAULT_DELETE_DELAY};

pub const B2_AUTHORIZE_URL: &str = "https://api.backblazeb2.com/b2api/v2/b2_authorize_account";
pub const MUX_API_URL: &str = "https://api.mux.com";
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Staging directory for multipart form files before they are pushed to storage.
    pub upload_dir: String,
    pub production: bool,
    /// Skip any configured HTTP proxy for outbound storage/transcode calls.
    pub bypass_proxy: bool,
    pub storage: StorageConfig,
    pub transcode: TranscodeConfig,
    pub auth: AuthProviderConfig,
    /// Path segment under `/api/` that receives transcode webhooks.
    pub webhook_endpoint: String,
    pub delete_delay: Duration,
    pub webhook_recency: chrono::Duration,
}

#[derive(Clone)]
pub struct StorageConfig {
    pub account_id: String,
    pub application_key: String,
    pub bucket: String,
    pub authorize_url: String,
}

#[derive(Clone)]
pub struct TranscodeConfig {
    pub token_id: String,
    pub token_secret: String,
    pub api_url: String,
}

#[derive(Clone)]
pub struct AuthProviderConfig {
    pub url: String,
    pub anon_key: String,
    pub register_redirect: Option<String>,
    pub github_api_url: String,
}

// Secrets stay out of the startup log line.
impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("account_id", &self.account_id)
            .field("bucket", &self.bucket)
            .field("authorize_url", &self.authorize_url)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for TranscodeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscodeConfig")
            .field("token_id", &self.token_id)
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for AuthProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthProviderConfig")
            .field("url", &self.url)
            .field("register_redirect", &self.register_redirect)
            .field("github_api_url", &self.github_api_url)
            .finish_non_exhaustive()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Post and video media backend")]
pub struct Args {
    /// Host to bind to (overrides MEDIA_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides MEDIA_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Staging directory for uploaded form files (overrides MEDIA_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Force proxy bypass for outbound calls (default: on outside production)
    #[arg(long)]
    pub bypass_proxy: Option<bool>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let production = env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        let env_host = env::var("MEDIA_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("MEDIA_PORT", 4000u16)?;
        let env_db = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/media.db".into());
        let env_upload_dir =
            env::var("MEDIA_UPLOAD_DIR").unwrap_or_else(|_| "./data/uploads".into());
        let env_bypass = parse_env("BYPASS_PROXY", !production)?;

        let storage = StorageConfig {
            account_id: required_env("BACKBLAZE_ACCOUNT_ID")?,
            application_key: required_env("BACKBLAZE_ACCOUNT_AUTH_TOKEN")?,
            bucket: required_env("BACKBLAZE_BUCKET_NAME")?,
            authorize_url: env::var("BACKBLAZE_AUTHORIZE_URL")
                .unwrap_or_else(|_| B2_AUTHORIZE_URL.into()),
        };
        let transcode = TranscodeConfig {
            token_id: required_env("MUX_TOKEN_ID")?,
            token_secret: required_env("MUX_TOKEN_SECRET")?,
            api_url: env::var("MUX_API_URL").unwrap_or_else(|_| MUX_API_URL.into()),
        };
        let auth = AuthProviderConfig {
            url: required_env("SUPABASE_URL")?,
            anon_key: required_env("SUPABASE_ANON_KEY")?,
            register_redirect: env::var("REGISTER_REDIRECT").ok(),
            github_api_url: env::var("GITHUB_API_URL").unwrap_or_else(|_| GITHUB_API_URL.into()),
        };

        let webhook_endpoint =
            env::var("MUX_WEBHOOK_ENDPOINT").unwrap_or_else(|_| "mux-webhook".into());
        let delete_delay = Duration::from_millis(parse_env(
            "STORAGE_DELETE_DELAY_MS",
            DEFAULT_DELETE_DELAY.as_millis() as u64,
        )?);
        let webhook_recency =
            chrono::Duration::hours(parse_env("WEBHOOK_RECENCY_HOURS", DEFAULT_RECENCY_HOURS)?);

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            upload_dir: args.upload_dir.unwrap_or(env_upload_dir),
            production,
            bypass_proxy: args.bypass_proxy.unwrap_or(env_bypass),
            storage,
            transcode,
            auth,
            webhook_endpoint: webhook_endpoint.trim_matches('/').to_string(),
            delete_delay,
            webhook_recency,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required_env(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("reading required variable {name}"))
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {name}")),
    }
}
