//! Maintenance mode: a process-wide flag written by a background health
//! checker and read by every request.
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct MaintenanceFlag {
    enabled: Arc<AtomicBool>,
}

impl MaintenanceFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Returns the previous value.
    pub fn set(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::AcqRel)
    }

    /// `"1"` while in maintenance, `"0"` otherwise.
    pub fn as_str(&self) -> &'static str {
        if self.is_enabled() { "1" } else { "0" }
    }

    /// Accepts `"1"` / `"0"`; anything else leaves the flag unchanged.
    pub fn set_str(&self, value: &str) -> bool {
        match value.trim() {
            "1" => {
                self.set(true);
                true
            }
            "0" => {
                self.set(false);
                true
            }
            _ => false,
        }
    }

    /// Fold one probe result into the flag: only 200 counts as healthy.
    pub fn apply_status(&self, status: Option<u16>) {
        let degraded = status != Some(200);
        let was = self.set(degraded);
        if was != degraded {
            if degraded {
                warn!(status = ?status, "health probe degraded, entering maintenance mode");
            } else {
                info!("health probe recovered, leaving maintenance mode");
            }
        }
    }
}

/// Something that reports the backend's health as an HTTP status.
///
/// `None` means the probe could not get an answer at all.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> Option<u16>;
}

pub struct HttpHealthProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpHealthProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn probe(&self) -> Option<u16> {
        match self.client.get(&self.url).send().await {
            Ok(res) => Some(res.status().as_u16()),
            Err(e) => {
                debug!(error = %e, url = %self.url, "health probe request failed");
                None
            }
        }
    }
}

/// Poll `probe` every `interval` and keep `flag` in step with it.
pub fn spawn_health_checker(
    probe: Arc<dyn HealthProbe>,
    flag: MaintenanceFlag,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            flag.apply_status(probe.probe().await);
        }
    })
}
