use std::sync::Arc;

use crate::client::StatusSource;
use crate::config::DashboardConfig;
use crate::display::{ChartSurface, DisplaySurface};
use crate::logging::{log, obj, v_num, v_str, Domain, Level};
use crate::poller::StatusPoller;

/// Owned dashboard instance: `init` builds and starts polling,
/// `shutdown` stops the timer and releases the chart.
pub struct Dashboard {
    poller: StatusPoller,
}

impl Dashboard {
    /// Must be called from within a tokio runtime.
    pub fn init(
        cfg: &DashboardConfig,
        source: Arc<dyn StatusSource>,
        display: Box<dyn DisplaySurface + Send>,
        chart: Option<Box<dyn ChartSurface + Send>>,
    ) -> Self {
        log(
            Level::Info,
            Domain::System,
            "dashboard_init",
            obj(&[
                ("source", v_str(&source.describe())),
                ("poll_ms", v_num(cfg.poll_ms as f64)),
                ("chart", serde_json::json!(chart.is_some())),
            ]),
        );
        let mut poller = StatusPoller::new(source, display, chart, cfg.poll_interval());
        poller.start();
        Self { poller }
    }

    pub fn poller(&self) -> &StatusPoller {
        &self.poller
    }

    /// Resolves when polling ends on its own (terminal snapshot).
    pub async fn wait(&self) {
        self.poller.wait().await;
    }

    pub fn shutdown(mut self) {
        self.poller.stop();
        self.poller.release_chart();
        log(
            Level::Info,
            Domain::System,
            "dashboard_shutdown",
            obj(&[("chart_points", v_num(self.poller.chart_len() as f64))]),
        );
    }
}
