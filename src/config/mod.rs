use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::service::ProjectConnection;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_AGENT_NAME: &str = "my-assistant";
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful assistant";
pub const DEFAULT_API_VERSION: &str = "2024-07-01-preview";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub endpoint: String,
    pub api_token: Option<String>,
    pub model: String,
    pub agent_name: String,
    pub instructions: String,
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub api_version: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub read_idle_timeout_ms: u64,
    pub max_retries: usize,
    pub retry_base_ms: u64,
    pub retry_jitter_ms: u64,
    pub respect_retry_after: bool,
    /// Upper bound on a server-requested `Retry-After` wait.
    pub max_retry_after_ms: u64,
    pub tool_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            connect_timeout_ms: 5_000,
            request_timeout_ms: 60_000,
            read_idle_timeout_ms: 120_000,
            max_retries: 3,
            retry_base_ms: 1000,
            retry_jitter_ms: 500,
            respect_retry_after: true,
            max_retry_after_ms: 30_000,
            tool_timeout_ms: 60_000,
        }
    }
}

/// One configuration layer. Every field is optional; layers are merged field by field.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FileConfig {
    pub endpoint: Option<String>,
    pub connection_string: Option<String>,
    pub api_token: Option<String>,
    pub model: Option<String>,
    pub agent_name: Option<String>,
    pub instructions: Option<String>,
    pub service: Option<PartialServiceConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PartialServiceConfig {
    pub api_version: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub read_idle_timeout_ms: Option<u64>,
    pub max_retries: Option<usize>,
    pub retry_base_ms: Option<u64>,
    pub retry_jitter_ms: Option<u64>,
    pub respect_retry_after: Option<bool>,
    pub max_retry_after_ms: Option<u64>,
    pub tool_timeout_ms: Option<u64>,
}

impl PartialServiceConfig {
    /// Field-wise merge; `self` wins over `other`.
    fn or(self, other: PartialServiceConfig) -> PartialServiceConfig {
        PartialServiceConfig {
            api_version: self.api_version.or(other.api_version),
            connect_timeout_ms: self.connect_timeout_ms.or(other.connect_timeout_ms),
            request_timeout_ms: self.request_timeout_ms.or(other.request_timeout_ms),
            read_idle_timeout_ms: self.read_idle_timeout_ms.or(other.read_idle_timeout_ms),
            max_retries: self.max_retries.or(other.max_retries),
            retry_base_ms: self.retry_base_ms.or(other.retry_base_ms),
            retry_jitter_ms: self.retry_jitter_ms.or(other.retry_jitter_ms),
            respect_retry_after: self.respect_retry_after.or(other.respect_retry_after),
            max_retry_after_ms: self.max_retry_after_ms.or(other.max_retry_after_ms),
            tool_timeout_ms: self.tool_timeout_ms.or(other.tool_timeout_ms),
        }
    }

    fn resolve(self) -> ServiceConfig {
        let d = ServiceConfig::default();
        ServiceConfig {
            api_version: self.api_version.unwrap_or(d.api_version),
            connect_timeout_ms: self.connect_timeout_ms.unwrap_or(d.connect_timeout_ms),
            request_timeout_ms: self.request_timeout_ms.unwrap_or(d.request_timeout_ms),
            read_idle_timeout_ms: self.read_idle_timeout_ms.unwrap_or(d.read_idle_timeout_ms),
            max_retries: self.max_retries.unwrap_or(d.max_retries),
            retry_base_ms: self.retry_base_ms.unwrap_or(d.retry_base_ms),
            retry_jitter_ms: self.retry_jitter_ms.unwrap_or(d.retry_jitter_ms),
            respect_retry_after: self.respect_retry_after.unwrap_or(d.respect_retry_after),
            max_retry_after_ms: self.max_retry_after_ms.unwrap_or(d.max_retry_after_ms),
            tool_timeout_ms: self.tool_timeout_ms.unwrap_or(d.tool_timeout_ms),
        }
    }
}

impl FileConfig {
    /// The environment layer: `AGENTS_ENDPOINT`, `PROJECT_CONNECTION_STRING`,
    /// `AGENTS_API_TOKEN` and `AGENTS_MODEL`.
    pub fn from_env() -> Self {
        Self {
            endpoint: env("AGENTS_ENDPOINT"),
            connection_string: env("PROJECT_CONNECTION_STRING"),
            api_token: env("AGENTS_API_TOKEN"),
            model: env("AGENTS_MODEL"),
            ..Self::default()
        }
    }

    /// Endpoint named by this layer alone. An explicit URL beats a connection
    /// string given in the same layer.
    fn layer_endpoint(&self) -> Result<Option<String>> {
        if let Some(e) = &self.endpoint {
            return Ok(Some(e.clone()));
        }
        match &self.connection_string {
            Some(c) => {
                let conn: ProjectConnection =
                    c.parse().context("parse project connection string")?;
                Ok(Some(conn.endpoint()))
            }
            None => Ok(None),
        }
    }

    fn or(self, other: FileConfig) -> FileConfig {
        let service = match (self.service, other.service) {
            (Some(a), Some(b)) => Some(a.or(b)),
            (a, b) => a.or(b),
        };
        FileConfig {
            endpoint: self.endpoint.or(other.endpoint),
            connection_string: self.connection_string.or(other.connection_string),
            api_token: self.api_token.or(other.api_token),
            model: self.model.or(other.model),
            agent_name: self.agent_name.or(other.agent_name),
            instructions: self.instructions.or(other.instructions),
            service,
        }
    }
}

/// Values taken from the command line; `None` falls through to env and files.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub endpoint: Option<String>,
    pub connection_string: Option<String>,
    pub api_token: Option<String>,
    pub model: Option<String>,
}

impl From<CliOverrides> for FileConfig {
    fn from(cli: CliOverrides) -> Self {
        Self {
            endpoint: cli.endpoint,
            connection_string: cli.connection_string,
            api_token: cli.api_token,
            model: cli.model,
            ..Self::default()
        }
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Log filter from `--log-level`, else `ARELAY_LOG`, else `info`. Read before
/// any file is loaded so that config loading itself is logged.
pub fn log_level(cli: Option<String>) -> String {
    cli.or_else(|| env("ARELAY_LOG"))
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

impl AppConfig {
    pub fn from_cli(cli: CliOverrides) -> Result<Self> {
        let project_root = std::env::current_dir().context("resolve current dir")?;
        let project_cfg = load_project_config(&project_root)?;
        let file_cfg = load_file_config()?;
        Self::resolve(cli, FileConfig::from_env(), project_cfg, file_cfg)
    }

    /// Priority: CLI > environment > project file > global file > defaults.
    ///
    /// The endpoint comes from the highest layer naming either an endpoint or a
    /// connection string; lower layers never override it.
    pub fn resolve(
        cli: CliOverrides,
        env_cfg: FileConfig,
        project_cfg: FileConfig,
        file_cfg: FileConfig,
    ) -> Result<Self> {
        let layers = [FileConfig::from(cli), env_cfg, project_cfg, file_cfg];

        let mut endpoint = None;
        for layer in &layers {
            if let Some(e) = layer.layer_endpoint()? {
                endpoint = Some(e);
                break;
            }
        }
        let endpoint = endpoint.context(
            "no agent service endpoint: set --endpoint, --connection-string, AGENTS_ENDPOINT or PROJECT_CONNECTION_STRING",
        )?;

        let merged = layers
            .into_iter()
            .reduce(FileConfig::or)
            .unwrap_or_default();

        Ok(Self {
            endpoint,
            api_token: merged.api_token,
            model: merged.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            agent_name: merged
                .agent_name
                .unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string()),
            instructions: merged
                .instructions
                .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            service: merged.service.unwrap_or_default().resolve(),
        })
    }
}

/// Parse one config file. A missing file is not an error; an unreadable or
/// malformed one is.
fn read_config_file(path: &Path) -> Result<Option<FileConfig>> {
    if !path.is_file() {
        return Ok(None);
    }
    let s = fs::read_to_string(path)
        .with_context(|| format!("read config file: {}", path.display()))?;
    let cfg = toml::from_str::<FileConfig>(&s)
        .with_context(|| format!("parse config file: {}", path.display()))?;
    info!(path = %path.display(), "loaded config file");
    Ok(Some(cfg))
}

/// Global config locations, most specific first.
fn global_config_paths() -> Vec<PathBuf> {
    let mut v = Vec::new();
    if let Some(p) = env("ARELAY_CONFIG") {
        v.push(PathBuf::from(p));
    }
    if let Some(xdg_home) = env("XDG_CONFIG_HOME") {
        v.push(Path::new(&xdg_home).join("arelay/config.toml"));
    } else if let Some(home) = env("HOME") {
        v.push(Path::new(&home).join(".config/arelay/config.toml"));
    }
    if let Some(dirs) = env("XDG_CONFIG_DIRS") {
        v.extend(
            dirs.split(':')
                .filter(|d| !d.is_empty())
                .map(|d| Path::new(d).join("arelay/config.toml")),
        );
    }
    v
}

/// First global config file found, or an empty layer.
pub fn load_file_config() -> Result<FileConfig> {
    for p in global_config_paths() {
        if let Some(cfg) = read_config_file(&p)? {
            return Ok(cfg);
        }
    }
    Ok(FileConfig::default())
}

/// Project layer from `<root>/.arelay/config.toml`.
pub fn load_project_config(project_root: &Path) -> Result<FileConfig> {
    let path = project_root.join(".arelay").join("config.toml");
    Ok(read_config_file(&path)?.unwrap_or_default())
}

#[cfg(test)]
mod tests;
