//! Mode-switch orchestration.
//!
//! The device is either joined to a client network or broadcasting its own
//! open access point. Sequences are serialised by an async mutex, every
//! step rechecks the shutdown flag, and access-point setup retries are
//! capped by a [`RetryPolicy`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

use super::command::{CommandOutput, CommandRunner, SystemCommand};
use super::shutdown::ShutdownFlag;
use super::templates;
use super::WifiSettings;
use crate::{Error, Result};

const RESCAN_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeviceMode {
    /// Nothing configured yet, or after cleanup
    Unconfigured,
    /// A connect or access-point sequence is running
    Transitioning,
    Client { ssid: String },
    AccessPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wait before the second attempt; doubled for each later one
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before `attempt` (1-based). The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let doublings = (attempt - 2).min(16);
        self.backoff.saturating_mul(1 << doublings)
    }
}

/// Settle times between interface steps
#[derive(Debug, Clone, Copy)]
pub struct Delays {
    pub short: Duration,
    pub medium: Duration,
    pub long: Duration,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            short: Duration::from_secs(1),
            medium: Duration::from_secs(2),
            long: Duration::from_secs(3),
        }
    }
}

impl Delays {
    pub fn none() -> Self {
        Self {
            short: Duration::ZERO,
            medium: Duration::ZERO,
            long: Duration::ZERO,
        }
    }
}

pub struct Orchestrator {
    settings: WifiSettings,
    runner: Arc<dyn CommandRunner>,
    shutdown: ShutdownFlag,
    retry: RetryPolicy,
    delays: Delays,
    mode: Mutex<DeviceMode>,
    sequence: tokio::sync::Mutex<()>,
}

impl Orchestrator {
    pub fn new(settings: WifiSettings, runner: Arc<dyn CommandRunner>, shutdown: ShutdownFlag) -> Self {
        Self {
            settings,
            runner,
            shutdown,
            retry: RetryPolicy::default(),
            delays: Delays::default(),
            mode: Mutex::new(DeviceMode::Unconfigured),
            sequence: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_delays(mut self, delays: Delays) -> Self {
        self.delays = delays;
        self
    }

    pub fn settings(&self) -> &WifiSettings {
        &self.settings
    }

    pub fn shutdown(&self) -> &ShutdownFlag {
        &self.shutdown
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_mode(&self, next: DeviceMode) {
        let mut mode = self.mode.lock().unwrap_or_else(|e| e.into_inner());
        if *mode != next {
            tracing::debug!("Mode {:?} -> {:?}", *mode, next);
            *mode = next;
        }
    }

    /// Join `ssid`, falling back to the access point on any failure.
    ///
    /// The connect error is returned after the fallback has run.
    pub async fn attempt_client_connect(&self, ssid: &str, password: &str) -> Result<()> {
        self.ensure_running()?;
        let _guard = self.sequence.lock().await;
        self.ensure_running()?;

        tracing::info!("Attempting to connect to: {}", ssid);
        self.set_mode(DeviceMode::Transitioning);
        match self.connect_sequence(ssid, password).await {
            Ok(()) => {
                tracing::info!("Connected to {}", ssid);
                self.set_mode(DeviceMode::Client { ssid: ssid.to_string() });
                Ok(())
            }
            Err(Error::ShuttingDown) => {
                self.set_mode(DeviceMode::Unconfigured);
                Err(Error::ShuttingDown)
            }
            Err(e) => {
                tracing::warn!("Connection failed: {}", e);
                if let Err(fallback) = self.start_access_point_locked().await {
                    tracing::error!("Access point fallback failed: {}", fallback);
                }
                Err(e)
            }
        }
    }

    /// Bring up the open access point, retrying with cleanup in between.
    pub async fn start_access_point(&self) -> Result<()> {
        self.ensure_running()?;
        let _guard = self.sequence.lock().await;
        self.start_access_point_locked().await
    }

    /// Best-effort teardown restoring client networking. Never fails and
    /// ignores the shutdown flag, since it is what shutdown runs.
    pub async fn cleanup(&self) {
        let _guard = self.sequence.lock().await;
        self.cleanup_locked().await;
    }

    async fn connect_sequence(&self, ssid: &str, password: &str) -> Result<()> {
        let iface = self.settings.interface.as_str();

        self.step(SystemCommand::new("pkill", ["-f", "hostapd"])).await?;
        self.step(SystemCommand::new("pkill", ["-f", "dnsmasq"])).await?;
        self.settle(self.delays.short).await?;
        self.step(SystemCommand::new("ip", ["link", "set", iface, "down"])).await?;
        self.step(SystemCommand::new("ip", ["addr", "flush", "dev", iface])).await?;
        self.settle(self.delays.short).await?;
        self.step(SystemCommand::new("systemctl", ["start", "NetworkManager"])).await?;
        self.settle(self.delays.medium).await?;

        let rescan = SystemCommand::new("nmcli", ["device", "wifi", "rescan", "ifname", iface])
            .with_timeout(RESCAN_TIMEOUT);
        match self.step(rescan).await {
            Err(Error::ShuttingDown) => return Err(Error::ShuttingDown),
            Err(e) => tracing::warn!("Rescan failed, connecting anyway: {}", e),
            Ok(_) => {}
        }
        self.settle(self.delays.medium).await?;

        self.ensure_running()?;
        let connect = SystemCommand::new(
            "nmcli",
            ["device", "wifi", "connect", ssid, "password", password, "ifname", iface],
        )
        .with_timeout(CONNECT_TIMEOUT)
        .redacted();
        self.runner.run(&connect).await?.check("nmcli")?;
        Ok(())
    }

    async fn start_access_point_locked(&self) -> Result<()> {
        let mut attempt = 1;
        loop {
            self.ensure_running()?;
            tracing::info!("Creating access point (attempt {}/{})", attempt, self.retry.max_attempts);
            self.set_mode(DeviceMode::Transitioning);

            let err = match self.access_point_sequence().await {
                Ok(()) => {
                    tracing::info!(
                        "Access point ready! Connect to '{}' at {}",
                        self.settings.ap_ssid,
                        self.settings.ap_ip
                    );
                    self.set_mode(DeviceMode::AccessPoint);
                    return Ok(());
                }
                Err(Error::ShuttingDown) => {
                    self.set_mode(DeviceMode::Unconfigured);
                    return Err(Error::ShuttingDown);
                }
                Err(e) => e,
            };

            tracing::warn!("AP creation error: {}", err);
            self.cleanup_locked().await;
            if attempt >= self.retry.max_attempts || !err.is_retryable() {
                return Err(Error::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            attempt += 1;
            self.settle(self.retry.delay_before(attempt)).await?;
        }
    }

    async fn access_point_sequence(&self) -> Result<()> {
        let iface = self.settings.interface.as_str();
        let cidr = format!("{}/24", self.settings.ap_ip);

        self.step(SystemCommand::new("systemctl", ["stop", "NetworkManager"])).await?;
        self.step(SystemCommand::new("pkill", ["-f", "hostapd"])).await?;
        self.step(SystemCommand::new("pkill", ["-f", "dnsmasq"])).await?;
        self.step(SystemCommand::new("ip", ["link", "set", iface, "down"])).await?;
        self.step(SystemCommand::new("ip", ["addr", "flush", "dev", iface])).await?;
        self.settle(self.delays.short).await?;
        self.step(SystemCommand::new("iw", [iface, "set", "type", "__ap"])).await?;
        self.step(SystemCommand::new("ip", ["link", "set", iface, "up"])).await?;
        self.settle(self.delays.medium).await?;

        templates::write_ap_configs(&self.settings).await?;
        self.step(SystemCommand::new("ip", ["addr", "add", cidr.as_str(), "dev", iface])).await?;
        self.step(SystemCommand::new("ip", ["link", "set", iface, "up"])).await?;
        templates::write_file(&self.settings.ip_forward_path, "1").await?;

        let hostapd_conf = self.settings.hostapd_conf.display().to_string();
        self.spawn_daemon(SystemCommand::new("hostapd", ["-B", hostapd_conf.as_str()])).await?;
        self.settle(self.delays.long).await?;
        let dnsmasq_conf = self.settings.dnsmasq_conf.display().to_string();
        self.spawn_daemon(SystemCommand::new("dnsmasq", ["-C", dnsmasq_conf.as_str()])).await?;
        self.settle(self.delays.medium).await?;
        Ok(())
    }

    async fn cleanup_locked(&self) {
        tracing::info!("Performing cleanup");
        let iface = self.settings.interface.as_str();

        self.best_effort(SystemCommand::new("pkill", ["-f", "hostapd"])).await;
        self.best_effort(SystemCommand::new("pkill", ["-f", "dnsmasq"])).await;
        self.best_effort(SystemCommand::new("ip", ["link", "set", iface, "down"])).await;
        self.best_effort(SystemCommand::new("ip", ["addr", "flush", "dev", iface])).await;
        self.best_effort(SystemCommand::new("systemctl", ["start", "NetworkManager"])).await;
        if !self.delays.medium.is_zero() {
            tokio::time::sleep(self.delays.medium).await;
        }
        self.best_effort(SystemCommand::new("ip", ["link", "set", iface, "up"])).await;

        self.set_mode(DeviceMode::Unconfigured);
        tracing::info!("Cleanup complete");
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shutdown.is_set() {
            return Err(Error::ShuttingDown);
        }
        Ok(())
    }

    /// Run a command whose exit status is informational only
    async fn step(&self, cmd: SystemCommand) -> Result<CommandOutput> {
        self.ensure_running()?;
        let output = self.runner.run(&cmd).await?;
        if !output.success() {
            tracing::debug!("`{}` exited with {:?}: {}", cmd.log_line(), output.code, output.message());
        }
        Ok(output)
    }

    async fn spawn_daemon(&self, cmd: SystemCommand) -> Result<()> {
        self.ensure_running()?;
        self.runner.spawn_detached(&cmd).await
    }

    async fn best_effort(&self, cmd: SystemCommand) {
        if let Err(e) = self.runner.run(&cmd).await {
            tracing::warn!("Cleanup step `{}` failed (non-critical): {}", cmd.log_line(), e);
        }
    }

    async fn settle(&self, delay: Duration) -> Result<()> {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.ensure_running()
    }
}
