//! Configuration storage
//!
//! Connection settings and agent identity, serialized as TOML under the
//! platform config directory. The library itself never touches disk; the
//! binary loads this and hands the pieces to the components.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::ClientError;
use crate::session::SessionContext;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend REST base URL, e.g. `https://crm.example.com/api`
    pub api_base_url: Option<String>,
    /// WebSocket base URL override. When unset, derived from `api_base_url`
    /// by swapping the scheme to ws/wss.
    pub ws_base_url: Option<String>,
    /// Tenant the signed-in agent belongs to
    pub tenant_id: Option<String>,
    /// Department scope for the inbox
    pub department_id: Option<String>,
    /// Agent user id used for joins and outgoing messages
    pub user_id: Option<String>,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "wadesk", "wadesk")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        // Keep the agent identity private to the local user
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// REST base URL with trailing slashes stripped.
    pub fn api_base(&self) -> std::result::Result<String, ClientError> {
        let base = self
            .api_base_url
            .as_deref()
            .ok_or_else(|| ClientError::Config("api_base_url is not set; run 'wadesk init'".into()))?;
        let base = base.trim_end_matches('/');
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(ClientError::Config(format!(
                "api_base_url must start with http:// or https://: {}",
                base
            )));
        }
        Ok(base.to_string())
    }

    /// WebSocket base URL: the explicit override, or the REST base with the
    /// scheme swapped to ws/wss.
    pub fn ws_base(&self) -> std::result::Result<String, ClientError> {
        if let Some(ws) = self.ws_base_url.as_deref() {
            let ws = ws.trim_end_matches('/');
            if !ws.starts_with("ws://") && !ws.starts_with("wss://") {
                return Err(ClientError::Config(format!(
                    "ws_base_url must start with ws:// or wss://: {}",
                    ws
                )));
            }
            return Ok(ws.to_string());
        }
        let base = self.api_base()?;
        Ok(base
            .replace("https://", "wss://")
            .replace("http://", "ws://"))
    }

    /// Session identity, erroring on whichever field is missing.
    pub fn session(&self) -> std::result::Result<SessionContext, ClientError> {
        let field = |v: &Option<String>, name: &str| {
            v.clone()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ClientError::Config(format!("{} is not set; run 'wadesk init'", name)))
        };
        Ok(SessionContext::new(
            field(&self.tenant_id, "tenant_id")?,
            field(&self.department_id, "department_id")?,
            field(&self.user_id, "user_id")?,
        ))
    }
}
