//! Service configuration
//!
//! Handles:
//! - MQTT broker settings and RPC topics
//! - Filesystem locations of every source the handlers read
//! - External commands for process and log snapshots
//! - Log tail sizes

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::logread::{TailLimits, DEFAULT_LOG_SIZE, MAX_LOG_SIZE};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "SYMBION_RPCD_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub mqtt: MqttConfig,
    pub sources: SourcePaths,
    pub commands: CommandConfig,
    pub logs: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: Option<String>,
    pub keep_alive_secs: u16,
    pub call_topic: String,
    pub reply_topic: String,
}

/// Where each OS artifact is read from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcePaths {
    pub init_dir: PathBuf,
    pub rc_dir: PathBuf,
    pub authorized_keys: PathBuf,
    pub arp_table: PathBuf,
    pub route_table: PathBuf,
    pub route6_table: PathBuf,
    pub conntrack_table: PathBuf,
    pub conntrack_count: PathBuf,
    pub conntrack_max: PathBuf,
    pub relay_leases: PathBuf,
    pub uci_dir: PathBuf,
}

/// argv of the external snapshot commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub process_snapshot: Vec<String>,
    pub kernel_log: Vec<String>,
    pub system_log: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub default_size: usize,
    pub max_size: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "127.0.0.1".to_string(),
            broker_port: 1883,
            client_id: None,
            keep_alive_secs: 30,
            call_topic: "symbion/rpc/call@v1".to_string(),
            reply_topic: "symbion/rpc/response@v1".to_string(),
        }
    }
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            init_dir: PathBuf::from("/etc/init.d"),
            rc_dir: PathBuf::from("/etc/rc.d"),
            authorized_keys: PathBuf::from("/etc/dropbear/authorized_keys"),
            arp_table: PathBuf::from("/proc/net/arp"),
            route_table: PathBuf::from("/proc/net/route"),
            route6_table: PathBuf::from("/proc/net/ipv6_route"),
            conntrack_table: PathBuf::from("/proc/net/nf_conntrack"),
            conntrack_count: PathBuf::from("/proc/sys/net/netfilter/nf_conntrack_count"),
            conntrack_max: PathBuf::from("/proc/sys/net/netfilter/nf_conntrack_max"),
            relay_leases: PathBuf::from("/tmp/hosts/6relayd"),
            uci_dir: PathBuf::from("/etc/config"),
        }
    }
}

impl SourcePaths {
    /// Same layout rooted somewhere else (fixtures, chroots)
    pub fn rooted_at<P: Into<PathBuf>>(root: P) -> Self {
        let root = root.into();
        let defaults = Self::default();
        let reroot = |path: PathBuf| match path.strip_prefix("/") {
            Ok(relative) => root.join(relative),
            Err(_) => root.join(path),
        };

        Self {
            init_dir: reroot(defaults.init_dir),
            rc_dir: reroot(defaults.rc_dir),
            authorized_keys: reroot(defaults.authorized_keys),
            arp_table: reroot(defaults.arp_table),
            route_table: reroot(defaults.route_table),
            route6_table: reroot(defaults.route6_table),
            conntrack_table: reroot(defaults.conntrack_table),
            conntrack_count: reroot(defaults.conntrack_count),
            conntrack_max: reroot(defaults.conntrack_max),
            relay_leases: reroot(defaults.relay_leases),
            uci_dir: reroot(defaults.uci_dir),
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            process_snapshot: vec!["/bin/busybox".into(), "top".into(), "-bn1".into()],
            kernel_log: vec!["dmesg".into()],
            system_log: vec!["logread".into()],
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_LOG_SIZE,
            max_size: MAX_LOG_SIZE,
        }
    }
}

impl LogConfig {
    pub fn tail_limits(&self) -> TailLimits {
        TailLimits {
            default_size: self.default_size,
            max_size: self.max_size,
        }
    }
}

impl AgentConfig {
    /// Load config from `$SYMBION_RPCD_CONFIG` or the OS config directory
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;

        if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            let config = Self::from_toml(&content)
                .with_context(|| format!("Invalid config in {}", config_path.display()))?;

            info!("Loaded configuration from {}", config_path.display());
            Ok(config)
        } else {
            info!("No config at {}, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get config file path, honouring the environment override
    pub fn config_file_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }

        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;

        path.push("symbion-rpcd");
        path.push("config.toml");
        Ok(path)
    }

    /// MQTT client id, derived from the hostname when not configured
    pub fn client_id(&self) -> String {
        self.mqtt.client_id.clone().unwrap_or_else(|| {
            format!(
                "symbion-rpcd-{}",
                gethostname::gethostname().to_string_lossy()
            )
        })
    }
}
