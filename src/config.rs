use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_SESSION_SECRET: &str = "dev-secret-key-change-in-production";

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub connection_string: String,
    pub pool_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; an entry may contain a single `*` wildcard.
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "remote" or "ollama"
    pub model: String,
    pub api_key: Option<String>,
    /// Endpoint override; each backend has its own default.
    pub api_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub session_secret: String,
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// DuckDB database file (or `:memory:`)
    #[arg(long)]
    pub database: Option<String>,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config_builder = defaults(Config::builder())?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            let default_locations = [
                "config.toml",
                "config/config.toml",
                "/etc/sqlsense/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        config_builder = config_builder.add_source(
            Environment::with_prefix("SQLSENSE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        config.apply_well_known_env(|key| std::env::var(key).ok());
        config.apply_args(args);

        Ok(config)
    }

    /// Applies the unprefixed variables the service has always honoured.
    fn apply_well_known_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(api_key) = lookup("OPENROUTER_API_KEY").filter(|v| !v.is_empty()) {
            self.llm.api_key = Some(api_key);
        }
        if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
            self.database.connection_string = url;
        }
        if let Some(secret) = lookup("SESSION_SECRET").filter(|v| !v.is_empty()) {
            self.session_secret = secret;
        }
    }

    fn apply_args(&mut self, args: &CliArgs) {
        if let Some(host) = &args.host {
            self.web.host = host.clone();
        }
        if let Some(port) = args.port {
            self.web.port = port;
        }
        if let Some(database) = &args.database {
            self.database.connection_string = database.clone();
        }
    }

    pub fn uses_default_secret(&self) -> bool {
        self.session_secret == DEFAULT_SESSION_SECRET
    }
}

fn defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    let fallback = AppConfig::default();
    builder
        .set_default("database.connection_string", fallback.database.connection_string)?
        .set_default("database.pool_size", fallback.database.pool_size as u64)?
        .set_default("web.host", fallback.web.host)?
        .set_default("web.port", fallback.web.port as u64)?
        .set_default("web.cors_origins", fallback.web.cors_origins)?
        .set_default("llm.backend", fallback.llm.backend)?
        .set_default("llm.model", fallback.llm.model)?
        .set_default("llm.timeout_secs", fallback.llm.timeout_secs)?
        .set_default("session_secret", fallback.session_secret)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                connection_string: "sqlsense.duckdb".to_string(),
                pool_size: 5,
            },
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "https://*.vercel.app".to_string(),
                ],
            },
            llm: LlmConfig {
                backend: "remote".to_string(),
                model: "moonshotai/kimi-k2:free".to_string(),
                api_key: None,
                api_url: None,
                timeout_secs: 30,
            },
            session_secret: DEFAULT_SESSION_SECRET.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_load_without_file() {
        let config: AppConfig = defaults(Config::builder())
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.web.port, 5000);
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.llm.backend, "remote");
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.web.cors_origins.len(), 2);
        assert!(config.uses_default_secret());
    }

    #[test]
    fn test_file_overrides_defaults_and_args_override_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[web]\nport = 8080\n\n[llm]\nbackend = \"ollama\"\nmodel = \"llama3\""
        )
        .unwrap();

        let args = CliArgs {
            config: Some(file.path().to_path_buf()),
            port: Some(9090),
            database: Some(":memory:".to_string()),
            ..CliArgs::default()
        };
        let config = AppConfig::new(&args).unwrap();

        assert_eq!(config.web.port, 9090);
        assert_eq!(config.web.host, "127.0.0.1");
        assert_eq!(config.llm.backend, "ollama");
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.database.connection_string, ":memory:");
    }

    #[test]
    fn test_well_known_env_vars() {
        let vars: HashMap<&str, &str> = [
            ("OPENROUTER_API_KEY", "sk-test"),
            ("DATABASE_URL", "other.duckdb"),
            ("SESSION_SECRET", ""),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_well_known_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.database.connection_string, "other.duckdb");
        // empty values are ignored
        assert!(config.uses_default_secret());
    }
}
