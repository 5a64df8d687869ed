use serde::{Deserialize, Serialize};

use super::{
    error::ProviderError,
    traits::InfoProvider,
    types::{HealthContext, ProviderResult},
};

const LOADAVG_PATH: &str = "/proc/loadavg";

/// System load average over the standard kernel windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadAverage {
    pub one_minute: f64,
    pub five_minutes: f64,
    pub fifteen_minutes: f64,
    /// Runnable scheduling entities at the time of reading.
    pub running_processes: u32,
    pub total_processes: u32,
}

fn parse_field<T: std::str::FromStr>(value: &str, field: &str) -> ProviderResult<T> {
    value.parse::<T>().map_err(|_| ProviderError::ParseError {
        field: field.to_string(),
        location: LOADAVG_PATH.to_string(),
        reason: format!("invalid value: {}", value),
    })
}

/// Parses `/proc/loadavg`, e.g. `"1.23 1.45 1.67 1/234 12345"`.
pub fn parse_loadavg(content: &str) -> ProviderResult<LoadAverage> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 5 {
        return Err(ProviderError::InvalidFormat {
            location: LOADAVG_PATH.to_string(),
            reason: "Expected at least 5 fields".to_string(),
        });
    }

    let (running, total) =
        parts[3]
            .split_once('/')
            .ok_or_else(|| ProviderError::InvalidFormat {
                location: LOADAVG_PATH.to_string(),
                reason: "process field must be in format 'running/total'".to_string(),
            })?;

    Ok(LoadAverage {
        one_minute: parse_field(parts[0], "one_minute")?,
        five_minutes: parse_field(parts[1], "five_minutes")?,
        fifteen_minutes: parse_field(parts[2], "fifteen_minutes")?,
        running_processes: parse_field(running, "running_processes")?,
        total_processes: parse_field(total, "total_processes")?,
    })
}

/// Component provider reporting the host load average.
#[derive(Debug, Clone, Default)]
pub struct LoadAverageProvider;

#[cfg(all(feature = "provider-loadavg", target_os = "linux"))]
#[async_trait::async_trait]
impl InfoProvider for LoadAverageProvider {
    type Output = LoadAverage;

    async fn info(&self, _ctx: &HealthContext) -> ProviderResult<LoadAverage> {
        let content = tokio::fs::read_to_string(LOADAVG_PATH)
            .await
            .map_err(|source| ProviderError::FileRead {
                path: LOADAVG_PATH.to_string(),
                source,
            })?;
        parse_loadavg(&content)
    }
}

#[cfg(all(feature = "provider-loadavg", target_os = "linux"))]
crate::register_info_provider!(LoadAverageProvider, "load_average");

#[cfg(not(all(feature = "provider-loadavg", target_os = "linux")))]
#[async_trait::async_trait]
impl InfoProvider for LoadAverageProvider {
    type Output = LoadAverage;

    async fn info(&self, _ctx: &HealthContext) -> ProviderResult<LoadAverage> {
        Err(ProviderError::Unsupported(
            "Load average provider not enabled or not supported on this platform".to_string(),
        ))
    }
}
