use anyhow::{anyhow, Context, Result};
use auproxy_client::{ClientConfig, MirrorConfig};
use auproxy_core::encode_code;
use auproxy_net::{ConnectionConfig, Region, DEFAULT_CLIENT_VERSION};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::{SocketAddr, ToSocketAddrs},
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/auproxy.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Region whose master server is used when `server` is unset.
    pub region: Region,
    /// Explicit `host:port`, overriding the region.
    pub server: Option<String>,
    /// Six-letter room code to mirror.
    pub game_code: String,
    pub username: String,
    pub client_version: i32,
    /// Re-send interval for unacknowledged reliable packets.
    pub ack_interval_ms: u64,
    pub disconnect_timeout_ms: u64,
    pub response_timeout_ms: u64,
    /// How long the first join may take to deliver spawns and settings.
    pub settle_timeout_ms: u64,
    pub max_join_attempts: u32,
    pub max_redirects: u32,
    /// JSONL file that receives every mirror event.
    pub event_log: Option<PathBuf>,
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Log every datagram sent and received.
    pub packets: bool,
    /// Extra `tracing` filter directives, e.g. `auproxy_client=debug`.
    pub log_filter: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            region: Region::Na,
            server: None,
            game_code: String::new(),
            username: "auproxy".to_string(),
            client_version: DEFAULT_CLIENT_VERSION,
            ack_interval_ms: 1500,
            disconnect_timeout_ms: 5000,
            response_timeout_ms: 10_000,
            settle_timeout_ms: 30_000,
            max_join_attempts: 5,
            max_redirects: 3,
            event_log: None,
            debug: DebugConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Read and parse `path`.
    pub fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match Self::read(path) {
            Ok(config) => config,
            Err(err) => {
                warn!("{err:#}. Using defaults");
                ProxyConfig::default()
            }
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        Ok(())
    }

    /// Filter used when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> String {
        let mut directives = vec!["warn".to_string()];
        if self.debug.packets {
            directives.push("auproxy_net::transport=trace".to_string());
        }
        if let Some(extra) = &self.debug.log_filter {
            directives.push(extra.clone());
        }
        directives.join(",")
    }

    pub fn server_addr(&self) -> Result<SocketAddr> {
        match &self.server {
            Some(server) => server
                .to_socket_addrs()
                .with_context(|| format!("Invalid server address {server:?}"))?
                .next()
                .ok_or_else(|| anyhow!("Server address {server:?} did not resolve")),
            None => Ok(self.region.default_server()),
        }
    }

    pub fn room_code(&self) -> Result<i32> {
        encode_code(&self.game_code)
            .with_context(|| format!("Invalid game code {:?}", self.game_code))
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            connection: ConnectionConfig {
                ack_interval: Duration::from_millis(self.ack_interval_ms),
                client_version: self.client_version,
                disconnect_timeout: Duration::from_millis(self.disconnect_timeout_ms),
            },
            max_redirects: self.max_redirects,
            response_timeout: Duration::from_millis(self.response_timeout_ms),
        }
    }

    pub fn mirror_config(&self) -> Result<MirrorConfig> {
        let mut mirror = MirrorConfig::new(self.server_addr()?, self.room_code()?);
        mirror.username = self.username.clone();
        mirror.max_join_attempts = self.max_join_attempts;
        mirror.settle_timeout = Duration::from_millis(self.settle_timeout_ms);
        mirror.client = self.client_config();
        Ok(mirror)
    }
}
