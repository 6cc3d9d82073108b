//! Client / access-point mode switching for the wireless interface.
//!
//! Association and DHCP are left to NetworkManager, `hostapd` and `dnsmasq`;
//! this module only sequences them.

pub mod command;
pub mod orchestrator;
pub mod shutdown;
pub mod templates;

use std::path::PathBuf;
use std::time::Duration;

use crate::config::WifiConfig;

pub use command::{CommandOutput, CommandRunner, SystemCommand, SystemRunner};
pub use orchestrator::{Delays, DeviceMode, Orchestrator, RetryPolicy};
pub use shutdown::ShutdownFlag;

/// Interface and access-point parameters used by the orchestrator
#[derive(Debug, Clone)]
pub struct WifiSettings {
    pub interface: String,
    pub ap_ip: String,
    pub ap_ssid: String,
    pub hostapd_conf: PathBuf,
    pub dnsmasq_conf: PathBuf,
    pub ip_forward_path: PathBuf,
}

impl From<&WifiConfig> for WifiSettings {
    fn from(config: &WifiConfig) -> Self {
        Self {
            interface: config.interface.clone(),
            ap_ip: config.ap_ip.clone(),
            ap_ssid: config.ap_ssid.clone(),
            hostapd_conf: config.hostapd_conf.clone(),
            dnsmasq_conf: config.dnsmasq_conf.clone(),
            ip_forward_path: config.ip_forward_path.clone(),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &WifiConfig) -> Self {
        Self {
            max_attempts: config.max_ap_attempts.max(1),
            backoff: Duration::from_secs(config.retry_backoff_secs),
        }
    }
}
