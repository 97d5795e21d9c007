use anyhow::{Context, Result};
use std::time::Duration;
use url::Url;

/// Fixed number of points kept in the rolling chart.
pub const MAX_CHART_POINTS: usize = 20;

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub base_url: String,
    pub status_path: String,
    pub poll_ms: u64,
    /// None leaves the transport's own timeout in charge.
    pub request_timeout_ms: Option<u64>,
    pub replay_addr: String,
    pub replay_file: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            status_path: "/api/simulation_status".to_string(),
            poll_ms: 2000,
            request_timeout_ms: None,
            replay_addr: "127.0.0.1:5000".to_string(),
            replay_file: "snapshots.jsonl".to_string(),
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            base_url: std::env::var("DASHBOARD_BASE_URL").unwrap_or(d.base_url),
            status_path: std::env::var("STATUS_PATH").unwrap_or(d.status_path),
            poll_ms: std::env::var("POLL_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(d.poll_ms),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok()),
            replay_addr: std::env::var("REPLAY_ADDR").unwrap_or(d.replay_addr),
            replay_file: std::env::var("REPLAY_FILE").unwrap_or(d.replay_file),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Full status endpoint URL: base and path joined by exactly one `/`.
    pub fn status_url(&self) -> Result<Url> {
        let base = format!("{}/", self.base_url.trim_end_matches('/'));
        let base = Url::parse(&base)
            .with_context(|| format!("invalid base url '{}'", self.base_url))?;
        base.join(self.status_path.trim_start_matches('/'))
            .with_context(|| format!("invalid status path '{}'", self.status_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = DashboardConfig::default();
        assert_eq!(cfg.poll_interval(), Duration::from_millis(2000));
        assert!(cfg.request_timeout().is_none());
        assert_eq!(
            cfg.status_url().unwrap().as_str(),
            "http://127.0.0.1:5000/api/simulation_status"
        );
    }

    #[test]
    fn test_status_url_slashes() {
        let cfg = DashboardConfig {
            base_url: "http://localhost:8080/sim/".to_string(),
            status_path: "api/simulation_status".to_string(),
            ..Default::default()
        };
        assert_eq!(
            cfg.status_url().unwrap().as_str(),
            "http://localhost:8080/sim/api/simulation_status"
        );
    }

    #[test]
    fn test_bad_base_url() {
        let cfg = DashboardConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(cfg.status_url().is_err());
    }
}
