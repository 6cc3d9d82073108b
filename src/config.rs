use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SOURCE: &str = "/opt/hud35/song_counts.bin";
pub const DEFAULT_DATABASE: &str = "/opt/hud35/song_stats.db";

pub const WIFI_INTERFACE: &str = "wlan0";
pub const AP_IP: &str = "192.168.42.1";
pub const AP_SSID: &str = "WiFi-Manager";
pub const HOSTAPD_CONF: &str = "/tmp/hostapd.conf";
pub const DNSMASQ_CONF: &str = "/tmp/dnsmasq.conf";
pub const IP_FORWARD_PATH: &str = "/proc/sys/net/ipv4/ip_forward";
pub const HTTP_PORT: u16 = 80;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Hud35Config {
    #[serde(default)]
    pub migrate: MigrateConfig,
    #[serde(default)]
    pub wifi: WifiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    pub source: PathBuf,
    pub database: PathBuf,
    pub backup: bool,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from(DEFAULT_SOURCE),
            database: PathBuf::from(DEFAULT_DATABASE),
            backup: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiConfig {
    pub interface: String,
    pub ap_ip: String,
    pub ap_ssid: String,
    pub hostapd_conf: PathBuf,
    pub dnsmasq_conf: PathBuf,
    pub ip_forward_path: PathBuf,
    pub port: u16,
    /// Prefix every external command with `sudo`
    pub use_sudo: bool,
    pub max_ap_attempts: u32,
    pub retry_backoff_secs: u64,
    pub command_timeout_secs: u64,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            interface: WIFI_INTERFACE.to_string(),
            ap_ip: AP_IP.to_string(),
            ap_ssid: AP_SSID.to_string(),
            hostapd_conf: PathBuf::from(HOSTAPD_CONF),
            dnsmasq_conf: PathBuf::from(DNSMASQ_CONF),
            ip_forward_path: PathBuf::from(IP_FORWARD_PATH),
            port: HTTP_PORT,
            use_sudo: true,
            max_ap_attempts: 3,
            retry_backoff_secs: 2,
            command_timeout_secs: 15,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("hud35.toml")
}

/// Load the config file. An explicitly named file must exist; the default
/// `hud35.toml` is optional.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<Hud35Config>> {
    let explicit = path.is_some();
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        if explicit {
            anyhow::bail!("config file not found: {}", path.display());
        }
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: Hud35Config = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
