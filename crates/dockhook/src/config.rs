//! Configuration loading and types
//!
//! Settings come from built-in defaults, then an optional `dockhook.toml`,
//! then command line flags (each of which can also be set through a
//! `DOCKHOOK_*` environment variable).

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, ValueEnum};
use dockhook_core::{RegistryConfig, parse_filters};
use eyre::WrapErr;
use serde::{Deserialize, Serialize};

/// Environment variables understood by the command line
pub const ENV_VARS: &[&str] = &[
    "DOCKHOOK_CONFIG",
    "DOCKHOOK_ADDR",
    "DOCKHOOK_BASE",
    "DOCKHOOK_LEVEL",
    "DOCKHOOK_LOG_FORMAT",
    "DOCKHOOK_HOSTNAME",
    "DOCKHOOK_FILTER",
    "DOCKHOOK_REMOTE_HOST",
    "DOCKHOOK_WAIT_FOR_DOCKER_SECONDS",
    "DOCKHOOK_CERTS_DIR",
    "DOCKHOOK_WEBHOOKS_FILE",
    "DOCKHOOK_REGISTRY_USER",
    "DOCKHOOK_REGISTRY_TOKEN",
    "DOCKHOOK_AUTH_PROVIDER",
    "DOCKHOOK_USERS_FILE",
    "DOCKHOOK_PASSWORD",
];

/// `DOCKHOOK_*` variables in `vars` that nothing reads
pub fn unknown_env_vars(vars: impl IntoIterator<Item = String>) -> Vec<String> {
    vars.into_iter()
        .filter(|name| name.starts_with("DOCKHOOK_") && !ENV_VARS.contains(&name.as_str()))
        .collect()
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// How HTTP requests are authenticated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    /// Every route is public
    None,
    /// HTTP basic authentication against the users file
    #[default]
    Basic,
}

/// Flags shared by every subcommand
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// Path to the configuration file
    #[arg(long, env = "DOCKHOOK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Address to listen on (`:8080` binds all interfaces)
    #[arg(long, env = "DOCKHOOK_ADDR", global = true)]
    pub addr: Option<String>,

    /// Base path all routes are served under
    #[arg(long, env = "DOCKHOOK_BASE", global = true)]
    pub base: Option<String>,

    /// Log level or filter directive
    #[arg(long, env = "DOCKHOOK_LEVEL", global = true)]
    pub level: Option<String>,

    /// Log output format
    #[arg(long, env = "DOCKHOOK_LOG_FORMAT", value_enum, global = true)]
    pub log_format: Option<LogFormat>,

    /// Display name of the local engine
    #[arg(long, env = "DOCKHOOK_HOSTNAME", global = true)]
    pub hostname: Option<String>,

    /// Container filter `key=value`, repeatable
    #[arg(long = "filter", env = "DOCKHOOK_FILTER", value_delimiter = ',', global = true)]
    pub filters: Vec<String>,

    /// Remote engine `tcp://host:port[|name]`, repeatable
    #[arg(
        long = "remote-host",
        env = "DOCKHOOK_REMOTE_HOST",
        value_delimiter = ',',
        global = true
    )]
    pub remote_hosts: Vec<String>,

    /// Seconds to keep retrying the local engine at startup
    #[arg(long, env = "DOCKHOOK_WAIT_FOR_DOCKER_SECONDS", global = true)]
    pub wait_for_docker_seconds: Option<u64>,

    /// Directory holding per-host TLS certificates
    #[arg(long, env = "DOCKHOOK_CERTS_DIR", global = true)]
    pub certs_dir: Option<PathBuf>,

    /// Webhook database file
    #[arg(long, env = "DOCKHOOK_WEBHOOKS_FILE", global = true)]
    pub webhooks_file: Option<PathBuf>,

    /// Authentication for the HTTP API
    #[arg(long, env = "DOCKHOOK_AUTH_PROVIDER", value_enum, global = true)]
    pub auth_provider: Option<AuthProvider>,

    /// Users file for basic authentication
    #[arg(long, env = "DOCKHOOK_USERS_FILE", global = true)]
    pub users_file: Option<PathBuf>,
}

/// Top-level configuration for the dockhook daemon
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub data: DataConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address and port to bind to
    #[serde(default = "default_addr")]
    pub addr: String,
    /// Base path for all routes
    #[serde(default = "default_base")]
    pub base: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub auth_provider: AuthProvider,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            base: default_base(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            auth_provider: AuthProvider::default(),
        }
    }
}

fn default_addr() -> String {
    ":8080".to_string()
}

fn default_base() -> String {
    "/".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Engine connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Display name for the local engine
    #[serde(default)]
    pub hostname: Option<String>,
    /// Container filters, `key=value`
    #[serde(default)]
    pub filter: Vec<String>,
    /// Remote engines, `tcp://host:port[|name]`
    #[serde(default)]
    pub remote_host: Vec<String>,
    #[serde(default)]
    pub wait_for_docker_seconds: u64,
    #[serde(default = "default_certs_dir")]
    pub certs_dir: PathBuf,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            filter: Vec::new(),
            remote_host: Vec::new(),
            wait_for_docker_seconds: 0,
            certs_dir: default_certs_dir(),
        }
    }
}

fn default_certs_dir() -> PathBuf {
    PathBuf::from("./certs")
}

/// Persistent data locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_webhooks")]
    pub webhooks: PathBuf,
    #[serde(default = "default_users")]
    pub users: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            webhooks: default_webhooks(),
            users: default_users(),
        }
    }
}

fn default_webhooks() -> PathBuf {
    PathBuf::from("./data/webhooks.toml")
}

fn default_users() -> PathBuf {
    PathBuf::from("./data/users.toml")
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Load from the first default path that exists
    ///
    /// Returns the path that was used, `None` when running on defaults.
    ///
    /// # Errors
    /// Returns error if a found file cannot be read or parsed
    pub fn load_default() -> eyre::Result<(Self, Option<PathBuf>)> {
        let paths = [
            Some(PathBuf::from("dockhook.toml")),
            Some(PathBuf::from("/etc/dockhook/dockhook.toml")),
            dirs::config_dir().map(|p| p.join("dockhook/dockhook.toml")),
        ];

        for path in paths.into_iter().flatten() {
            if path.exists() {
                return Ok((Self::load(&path)?, Some(path)));
            }
        }

        Ok((Config::default(), None))
    }

    /// Load the file named by `args` (or a default one) and apply the flags
    ///
    /// # Errors
    /// Returns error if the configuration file cannot be read or parsed
    pub fn resolve(args: &GlobalArgs) -> eyre::Result<(Self, Option<PathBuf>)> {
        let (mut config, source) = match &args.config {
            Some(path) => (Self::load(path)?, Some(path.clone())),
            None => Self::load_default()?,
        };
        config.apply_args(args);
        Ok((config, source))
    }

    /// Override file values with flags that were given
    pub fn apply_args(&mut self, args: &GlobalArgs) {
        if let Some(addr) = &args.addr {
            self.server.addr.clone_from(addr);
        }
        if let Some(base) = &args.base {
            self.server.base.clone_from(base);
        }
        if let Some(level) = &args.level {
            self.server.log_level.clone_from(level);
        }
        if let Some(format) = args.log_format {
            self.server.log_format = format;
        }
        if let Some(hostname) = &args.hostname {
            self.docker.hostname = Some(hostname.clone());
        }
        if !args.filters.is_empty() {
            self.docker.filter.clone_from(&args.filters);
        }
        if !args.remote_hosts.is_empty() {
            self.docker.remote_host.clone_from(&args.remote_hosts);
        }
        if let Some(seconds) = args.wait_for_docker_seconds {
            self.docker.wait_for_docker_seconds = seconds;
        }
        if let Some(dir) = &args.certs_dir {
            self.docker.certs_dir.clone_from(dir);
        }
        if let Some(path) = &args.webhooks_file {
            self.data.webhooks.clone_from(path);
        }
        if let Some(provider) = args.auth_provider {
            self.server.auth_provider = provider;
        }
        if let Some(path) = &args.users_file {
            self.data.users.clone_from(path);
        }
    }

    /// Address in a form `TcpListener::bind` accepts
    #[must_use]
    pub fn bind_addr(&self) -> String {
        let addr = self.server.addr.trim();
        if addr.starts_with(':') {
            format!("0.0.0.0{addr}")
        } else {
            addr.to_string()
        }
    }

    /// Base path with a leading `/` and no trailing `/`, empty for the root
    #[must_use]
    pub fn base_path(&self) -> String {
        let trimmed = self.server.base.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        }
    }

    /// Settings for building the client registry
    ///
    /// # Errors
    /// Returns error for a filter without `=`
    pub fn registry_config(&self) -> eyre::Result<RegistryConfig> {
        Ok(RegistryConfig {
            hostname: self.docker.hostname.clone(),
            filters: parse_filters(&self.docker.filter)?,
            remote_hosts: self.docker.remote_host.clone(),
            wait_for_docker: Duration::from_secs(self.docker.wait_for_docker_seconds),
            certs_dir: self.docker.certs_dir.clone(),
            ..Default::default()
        })
    }
}
