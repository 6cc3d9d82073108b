//! Access-point daemon configuration files

use std::path::Path;

use super::WifiSettings;
use crate::{Error, Result};

pub const DHCP_RANGE: &str = "192.168.42.10,192.168.42.100,255.255.255.0,12h";
pub const UPSTREAM_DNS: &str = "8.8.8.8";
pub const CHANNEL: u8 = 6;
pub const COUNTRY_CODE: &str = "US";

/// Open network on 2.4 GHz
pub fn hostapd_conf(settings: &WifiSettings) -> String {
    format!(
        "interface={interface}\n\
         driver=nl80211\n\
         ssid={ssid}\n\
         hw_mode=g\n\
         channel={channel}\n\
         macaddr_acl=0\n\
         auth_algs=1\n\
         ignore_broadcast_ssid=0\n\
         country_code={country}\n",
        interface = settings.interface,
        ssid = settings.ap_ssid,
        channel = CHANNEL,
        country = COUNTRY_CODE,
    )
}

pub fn dnsmasq_conf(settings: &WifiSettings) -> String {
    format!(
        "interface={interface}\n\
         listen-address={ip}\n\
         bind-interfaces\n\
         server={dns}\n\
         domain-needed\n\
         bogus-priv\n\
         dhcp-range={range}\n",
        interface = settings.interface,
        ip = settings.ap_ip,
        dns = UPSTREAM_DNS,
        range = DHCP_RANGE,
    )
}

pub async fn write_file(path: &Path, contents: &str) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| Error::ConfigWrite {
            path: path.to_path_buf(),
            source,
        })
}

/// Write both daemon configs to their configured paths
pub async fn write_ap_configs(settings: &WifiSettings) -> Result<()> {
    write_file(&settings.hostapd_conf, &hostapd_conf(settings)).await?;
    write_file(&settings.dnsmasq_conf, &dnsmasq_conf(settings)).await?;
    Ok(())
}
