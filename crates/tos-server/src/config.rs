use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tos_core::GateConfig;

/// Top-level `tos.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TosConfig {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub gate: GateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address
    pub http_addr: SocketAddr,
    /// Directory holding `tos.redb`
    pub data_dir: PathBuf,
    /// Cookie carrying the session id
    pub session_cookie: String,
    /// Sessions idle this long are dropped
    pub session_idle_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 9191)),
            data_dir: PathBuf::from("./data"),
            session_cookie: "tos_session".to_string(),
            session_idle_secs: 14 * 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Require a bearer token on `/admin` routes.
    pub auth_enabled: bool,
    /// Admin token. `TOS_ADMIN_TOKEN` takes precedence.
    pub admin_token: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            auth_enabled: true,
            admin_token: None,
        }
    }
}

impl SecurityConfig {
    pub fn resolved_token(&self) -> Option<String> {
        std::env::var("TOS_ADMIN_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .or_else(|| self.admin_token.clone())
    }
}

impl TosConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))
    }

    pub fn db_path(&self) -> PathBuf {
        self.server.data_dir.join("tos.redb")
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.gate.acceptance_path.starts_with('/') {
            anyhow::bail!(
                "[gate] acceptance_path must be an absolute path, got {:?}",
                self.gate.acceptance_path
            );
        }
        if !self.server.data_dir.exists() {
            std::fs::create_dir_all(&self.server.data_dir)?;
        }
        Ok(())
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.server.session_idle_secs.max(1))
    }
}
