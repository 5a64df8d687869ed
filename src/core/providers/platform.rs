use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{
    error::ProviderError,
    traits::InfoProvider,
    types::{HealthContext, ProviderResult},
};

/// Key under which platform info appears in every aggregated report.
///
/// Components cannot register under this name.
pub const PLATFORM_KEY: &str = "platform";

const UPTIME_PATH: &str = "/proc/uptime";
const CONTAINER_MARKERS: [&str; 2] = ["/.dockerenv", "/run/.containerenv"];

/// Baseline facts about the host and the running process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformInfo {
    /// Version of this binary.
    pub version: String,
    pub os_name: String,
    pub os_family: String,
    pub arch: String,
    pub pid: u32,
    /// Whether a container runtime marker file is present.
    pub containerized: bool,
    /// Seconds since boot, from `/proc/uptime` where available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<f64>,
    /// Unix timestamp of the last boot, derived from the uptime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_time_seconds: Option<i64>,
}

/// Uptime fields parsed from `/proc/uptime`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uptime {
    pub uptime_seconds: f64,
    pub boot_time_seconds: i64,
}

/// Parses the contents of `/proc/uptime`.
///
/// Only the first field is required; `now` is the current Unix time in
/// seconds and is used to derive the boot timestamp.
pub fn parse_uptime(content: &str, now: i64) -> ProviderResult<Uptime> {
    let first = content
        .split_whitespace()
        .next()
        .ok_or_else(|| ProviderError::InvalidFormat {
            location: UPTIME_PATH.to_string(),
            reason: "Expected at least 1 field".to_string(),
        })?;

    let invalid = || ProviderError::ParseError {
        field: "uptime_seconds".to_string(),
        location: UPTIME_PATH.to_string(),
        reason: format!("invalid value: {}", first),
    };

    let uptime_seconds = first.parse::<f64>().map_err(|_| invalid())?;
    if !uptime_seconds.is_finite() || uptime_seconds < 0.0 {
        return Err(invalid());
    }

    Ok(Uptime {
        uptime_seconds,
        boot_time_seconds: now.saturating_sub(uptime_seconds as i64),
    })
}

fn unix_now() -> ProviderResult<i64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .map_err(|_| ProviderError::msg("System clock is before the Unix epoch"))
}

async fn read_uptime_from(path: &str) -> ProviderResult<Uptime> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ProviderError::FileRead {
            path: path.to_string(),
            source,
        })?;
    parse_uptime(&content, unix_now()?)
}

/// Uptime is optional: a restricted or odd `/proc` only drops those fields.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
async fn uptime_or_none(path: &str) -> Option<Uptime> {
    read_uptime_from(path)
        .await
        .inspect_err(|e| warn!("Uptime unavailable: {}", e))
        .ok()
}

#[cfg(target_os = "linux")]
async fn read_uptime() -> Option<Uptime> {
    uptime_or_none(UPTIME_PATH).await
}

#[cfg(not(target_os = "linux"))]
async fn read_uptime() -> Option<Uptime> {
    None
}

async fn is_containerized() -> bool {
    for marker in CONTAINER_MARKERS {
        if tokio::fs::try_exists(marker).await.unwrap_or(false) {
            return true;
        }
    }
    false
}

/// Built-in provider for the reserved [`PLATFORM_KEY`] entry.
#[derive(Debug, Clone, Default)]
pub struct PlatformInfoProvider;

impl PlatformInfoProvider {
    pub fn new() -> Self {
        PlatformInfoProvider
    }
}

#[async_trait::async_trait]
impl InfoProvider for PlatformInfoProvider {
    type Output = PlatformInfo;

    async fn info(&self, _ctx: &HealthContext) -> ProviderResult<PlatformInfo> {
        let uptime = read_uptime().await;

        Ok(PlatformInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            os_name: std::env::consts::OS.to_string(),
            os_family: std::env::consts::FAMILY.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            pid: std::process::id(),
            containerized: is_containerized().await,
            uptime_seconds: uptime.map(|u| u.uptime_seconds),
            boot_time_seconds: uptime.map(|u| u.boot_time_seconds),
        })
    }
}
