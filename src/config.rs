use crate::services::storage_service::DEFAULT_ALLOWED_EXTENSIONS;
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, str::FromStr};

/// 100 MiB, the largest request body accepted by default.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 100 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub max_request_bytes: usize,
    pub allowed_extensions: Vec<String>,
    pub public_url: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Lightweight HTTP file upload gateway")]
pub struct Args {
    /// Host to bind to (overrides FILE_GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILE_GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Storage root for uploaded files (overrides FILE_GATEWAY_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Maximum request body size in bytes (overrides FILE_GATEWAY_MAX_REQUEST_BYTES)
    #[arg(long)]
    pub max_request_bytes: Option<usize>,

    /// Comma-separated upload extensions (overrides FILE_GATEWAY_ALLOWED_EXTENSIONS)
    #[arg(long)]
    pub allowed_extensions: Option<String>,

    /// Base URL used in returned download links (overrides FILE_GATEWAY_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_sources(Args::parse(), |key| env::var(key))
    }

    /// Merge CLI args over values read through `lookup`, then defaults.
    fn from_sources<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        // --- Environment fallback ---
        let env_host = lookup("FILE_GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_var(&lookup, "FILE_GATEWAY_PORT", 5000u16)?;
        let env_storage =
            lookup("FILE_GATEWAY_STORAGE_DIR").unwrap_or_else(|_| "./data/files".into());
        let env_max = parse_var(
            &lookup,
            "FILE_GATEWAY_MAX_REQUEST_BYTES",
            DEFAULT_MAX_REQUEST_BYTES,
        )?;
        let env_extensions = lookup("FILE_GATEWAY_ALLOWED_EXTENSIONS").ok();
        let env_public_url = lookup("FILE_GATEWAY_PUBLIC_URL").ok();

        // --- Merge ---
        let allowed_extensions = match args.allowed_extensions.or(env_extensions) {
            Some(raw) => parse_extensions(&raw),
            None => DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        };
        if allowed_extensions.is_empty() {
            bail!("allowed extension list is empty");
        }

        let public_url = args
            .public_url
            .or(env_public_url)
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            max_request_bytes: args.max_request_bytes.unwrap_or(env_max),
            allowed_extensions,
            public_url,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Result<String, env::VarError>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

/// Split a comma list into lowercase extensions without leading dots.
fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(
        vars: &[(&str, &str)],
    ) -> impl Fn(&str) -> Result<String, env::VarError> + use<> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned().ok_or(env::VarError::NotPresent)
    }

    #[test]
    fn defaults_apply_without_args_or_env() {
        let cfg = AppConfig::from_sources(Args::default(), lookup_from(&[])).unwrap();

        assert_eq!(cfg.addr(), "0.0.0.0:5000");
        assert_eq!(cfg.storage_dir, "./data/files");
        assert_eq!(cfg.max_request_bytes, 100 * 1024 * 1024);
        assert_eq!(cfg.allowed_extensions.len(), 12);
        assert!(cfg.public_url.is_none());
    }

    #[test]
    fn env_overrides_defaults_and_args_override_env() {
        let env = lookup_from(&[
            ("FILE_GATEWAY_HOST", "127.0.0.1"),
            ("FILE_GATEWAY_PORT", "8080"),
            ("FILE_GATEWAY_STORAGE_DIR", "/srv/files"),
            ("FILE_GATEWAY_ALLOWED_EXTENSIONS", "txt"),
        ]);
        let args = Args::parse_from([
            "file-gateway",
            "--port",
            "9000",
            "--allowed-extensions",
            ".PDF, png ,",
            "--public-url",
            "https://files.example.com/",
        ]);

        let cfg = AppConfig::from_sources(args, env).unwrap();

        assert_eq!(cfg.addr(), "127.0.0.1:9000");
        assert_eq!(cfg.storage_dir, "/srv/files");
        assert_eq!(cfg.allowed_extensions, vec!["pdf", "png"]);
        assert_eq!(cfg.public_url.as_deref(), Some("https://files.example.com"));
    }

    #[test]
    fn unparseable_numbers_are_errors() {
        let err = AppConfig::from_sources(
            Args::default(),
            lookup_from(&[("FILE_GATEWAY_MAX_REQUEST_BYTES", "lots")]),
        )
        .unwrap_err();

        assert!(err.to_string().contains("FILE_GATEWAY_MAX_REQUEST_BYTES"));
    }

    #[test]
    fn empty_extension_list_is_rejected() {
        let result = AppConfig::from_sources(
            Args::default(),
            lookup_from(&[("FILE_GATEWAY_ALLOWED_EXTENSIONS", " , ")]),
        );

        assert!(result.is_err());
    }
}
