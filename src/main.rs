use anyhow::Result;
use std::sync::Arc;

use strategy_dashboard::client::HttpStatusSource;
use strategy_dashboard::config::DashboardConfig;
use strategy_dashboard::dashboard::Dashboard;
use strategy_dashboard::logging::{log, obj, v_str, Domain, Level};
use strategy_dashboard::terminal;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = DashboardConfig::from_env();
    let source = Arc::new(HttpStatusSource::new(&cfg)?);
    let (display, chart) = terminal::stdout_pair();

    let dashboard = Dashboard::init(&cfg, source, Box::new(display), Some(Box::new(chart)));

    let reason = tokio::select! {
        _ = dashboard.wait() => "simulation complete",
        res = tokio::signal::ctrl_c() => match res {
            Ok(()) => "interrupted",
            Err(err) => {
                log(
                    Level::Warn,
                    Domain::System,
                    "signal_error",
                    obj(&[("error", v_str(&err.to_string()))]),
                );
                "signal handler failed"
            }
        },
    };

    log(Level::Info, Domain::System, "exit", obj(&[("reason", v_str(reason))]));
    dashboard.shutdown();
    Ok(())
}
