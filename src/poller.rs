//! Status poller: one cancellable periodic task that fetches a snapshot,
//! renders it, feeds the rolling chart and stops itself once the
//! simulation reports completion.
//!
//! Ticks run one after another inside the task, so a slow fetch delays the
//! next tick instead of overlapping it; missed intervals are skipped.

use chrono::Local;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::chart::{ChartBuffer, ChartData};
use crate::client::{FetchError, StatusSource};
use crate::display::{ChartSurface, DisplaySurface};
use crate::logging::{
    log_bot_counters, log_poller_state, log_render, log_server_error, log_tick_failure,
};
use crate::render::{apply, format_elapsed, project};
use crate::snapshot::StatusSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Rendered,
    /// Rendered, and the snapshot was the terminal one.
    Completed,
    /// Nothing rendered; `kind` is the failure class that was logged.
    Skipped { kind: &'static str },
}

struct View {
    display: Box<dyn DisplaySurface + Send>,
    chart: Option<Box<dyn ChartSurface + Send>>,
    buffer: ChartBuffer,
}

struct Shared {
    source: Arc<dyn StatusSource>,
    view: Mutex<View>,
    active: watch::Sender<bool>,
    /// Bumped by every `start`; only the newest task may clear `active`.
    generation: AtomicU64,
    clock: fn() -> String,
}

/// Lives inside the spawned task. However the task ends (return, abort or
/// a panicking surface) the poller stops reporting itself active.
struct TaskExit {
    shared: Arc<Shared>,
    generation: u64,
}

impl Drop for TaskExit {
    fn drop(&mut self) {
        if self.shared.generation.load(Ordering::SeqCst) == self.generation {
            self.shared.deactivate("poller task exited");
        }
    }
}

fn wall_clock_label() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

impl Shared {
    fn view(&self) -> MutexGuard<'_, View> {
        // a panicking surface must not wedge later ticks
        match self.view.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    fn deactivate(&self, reason: &str) {
        if self.active.send_replace(false) {
            log_poller_state("stopped", reason);
        }
    }

    async fn tick(&self) -> TickOutcome {
        match self.source.fetch().await {
            Ok(snapshot) => {
                if self.render(&snapshot) {
                    TickOutcome::Completed
                } else {
                    TickOutcome::Rendered
                }
            }
            Err(FetchError::Server { status, message }) => {
                log_server_error(&self.source.describe(), status, &message);
                TickOutcome::Skipped { kind: "server" }
            }
            Err(err) => {
                log_tick_failure(&self.source.describe(), err.kind(), &err.to_string());
                TickOutcome::Skipped { kind: err.kind() }
            }
        }
    }

    fn render(&self, snapshot: &StatusSnapshot) -> bool {
        let projection = project(snapshot);
        let mut view = self.view();
        let View { display, chart, buffer } = &mut *view;

        apply(&projection, display.as_mut());
        if let Some((twap, smart)) = projection.sample {
            buffer.append((self.clock)(), twap, smart);
            if let Some(chart) = chart.as_mut() {
                chart.update(&buffer.data());
            }
        }
        display.commit();

        log_render(
            snapshot.running,
            projection.progress,
            &format_elapsed(snapshot.elapsed_minutes),
            buffer.len(),
        );
        for (bot, stats) in [("twap", &snapshot.twap_stats), ("smart", &snapshot.smart_stats)] {
            if let Some(s) = stats {
                log_bot_counters(bot, s.successful_trades, s.failed_trades, s.trades_skipped);
            }
        }
        drop(view);

        if projection.complete {
            self.deactivate("simulation complete");
        }
        projection.complete
    }
}

pub struct StatusPoller {
    shared: Arc<Shared>,
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl StatusPoller {
    pub fn new(
        source: Arc<dyn StatusSource>,
        display: Box<dyn DisplaySurface + Send>,
        chart: Option<Box<dyn ChartSurface + Send>>,
        interval: Duration,
    ) -> Self {
        let (active, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                source,
                view: Mutex::new(View {
                    display,
                    chart,
                    buffer: ChartBuffer::new(),
                }),
                active,
                generation: AtomicU64::new(0),
                clock: wall_clock_label,
            }),
            interval: interval.max(Duration::from_millis(1)),
            task: None,
        }
    }

    /// Replace the chart label clock. Only valid before the first `start`.
    pub fn with_clock(mut self, clock: fn() -> String) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.clock = clock;
        }
        self
    }

    /// Fetch and render now, then again every interval until stopped.
    /// A poller that is already running is left alone. Must be called
    /// from within a tokio runtime.
    pub fn start(&mut self) {
        let running = self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false);
        if running && self.shared.is_active() {
            return;
        }
        if let Some(stale) = self.task.take() {
            stale.abort();
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.active.send_replace(true);
        log_poller_state("started", &format!("every {}ms", self.interval.as_millis()));

        let exit = TaskExit {
            shared: self.shared.clone(),
            generation,
        };
        let period = self.interval;
        self.task = Some(tokio::spawn(async move {
            let shared = &exit.shared;
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                // first tick completes immediately
                ticker.tick().await;
                if !shared.is_active() {
                    break;
                }
                if shared.tick().await == TickOutcome::Completed {
                    break;
                }
            }
        }));
    }

    /// Cancel the periodic task. No-op when already stopped.
    pub fn stop(&mut self) {
        self.shared.deactivate("stop requested");
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    /// Resolves once the poller is no longer active.
    pub async fn wait(&self) {
        let mut rx = self.shared.active.subscribe();
        let _ = rx.wait_for(|active| !*active).await;
    }

    /// One fetch-and-render cycle, outside the timer.
    pub async fn tick(&self) -> TickOutcome {
        self.shared.tick().await
    }

    /// Project a snapshot onto the surfaces. Returns true for the terminal
    /// snapshot, which also deactivates the poller. Safe after `stop`.
    pub fn render(&self, snapshot: &StatusSnapshot) -> bool {
        self.shared.render(snapshot)
    }

    pub fn chart_len(&self) -> usize {
        self.shared.view().buffer.len()
    }

    pub fn chart_data(&self) -> ChartData {
        self.shared.view().buffer.data()
    }

    /// Release the chart surface; later samples still land in the buffer.
    pub fn release_chart(&self) {
        if let Some(mut chart) = self.shared.view().chart.take() {
            chart.release();
        }
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ScriptedSource;
    use crate::display::{ChartRecorder, Slot, SlotBoard};
    use crate::snapshot::BotStats;

    fn fixed_clock() -> String {
        "12:00:00".to_string()
    }

    fn running(output: f64) -> StatusSnapshot {
        StatusSnapshot {
            running: true,
            elapsed_minutes: 1.0,
            progress_percent: 10.0,
            twap_stats: Some(BotStats { total_output_received: output, ..Default::default() }),
            smart_stats: Some(BotStats {
                total_output_received: output * 2.0,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn complete() -> StatusSnapshot {
        StatusSnapshot { running: false, progress_percent: 100.0, ..Default::default() }
    }

    type Parts = (
        StatusPoller,
        Arc<ScriptedSource>,
        Arc<Mutex<SlotBoard>>,
        Arc<Mutex<ChartRecorder>>,
    );

    fn build(script: Vec<Result<StatusSnapshot, FetchError>>) -> Parts {
        let source = Arc::new(ScriptedSource::new(script));
        let board = Arc::new(Mutex::new(SlotBoard::new()));
        let chart = Arc::new(Mutex::new(ChartRecorder::new()));
        let poller = StatusPoller::new(
            source.clone(),
            Box::new(board.clone()),
            Some(Box::new(chart.clone())),
            Duration::from_millis(2000),
        )
        .with_clock(fixed_clock);
        (poller, source, board, chart)
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_fetches_immediately_then_every_interval() {
        let (mut poller, source, board, _) = build(vec![Ok(running(1.0)), Ok(running(2.0))]);
        poller.start();
        advance(10).await;
        assert_eq!(source.calls(), 1);
        assert_eq!(board.lock().unwrap().text(Slot::StatusText), Some("Running"));

        advance(2000).await;
        assert_eq!(source.calls(), 2);
        assert_eq!(poller.chart_len(), 2);
        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_keeps_one_timer() {
        let (mut poller, source, _, _) = build(vec![Ok(running(1.0))]);
        poller.start();
        poller.start();
        advance(10).await;
        assert_eq!(source.calls(), 1);
        advance(2000).await;
        assert_eq!(source.calls(), 2);
        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_snapshot_stops_polling() {
        let (mut poller, source, board, _) = build(vec![Ok(running(1.0)), Ok(complete())]);
        poller.start();
        advance(10).await;
        advance(2000).await;
        assert_eq!(source.calls(), 2);
        assert!(!poller.is_active());
        assert_eq!(board.lock().unwrap().text(Slot::ProgressPercent), Some("100.0%"));

        advance(20_000).await;
        assert_eq!(source.calls(), 2);
        poller.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_the_timer() {
        let (mut poller, source, board, _) = build(vec![
            Err(FetchError::Transport("connection refused".to_string())),
            Err(FetchError::Server { status: 500, message: "boom".to_string() }),
            Ok(running(3.0)),
        ]);
        poller.start();
        advance(10).await;
        advance(2000).await;
        assert_eq!(source.calls(), 2);
        assert!(poller.is_active());
        assert!(board.lock().unwrap().is_blank());

        advance(2000).await;
        assert_eq!(source.calls(), 3);
        assert_eq!(board.lock().unwrap().text(Slot::TwapOutput), Some("3.00"));
        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_future_ticks_and_is_idempotent() {
        let (mut poller, source, _, _) = build(vec![Ok(running(1.0)), Ok(running(1.0))]);
        poller.start();
        advance(10).await;
        poller.stop();
        poller.stop();
        advance(10_000).await;
        assert_eq!(source.calls(), 1);
        assert!(!poller.is_active());
    }

    #[tokio::test]
    async fn test_tick_outcomes() {
        let (poller, _, _, _) = build(vec![
            Ok(running(1.0)),
            Err(FetchError::Transport("down".to_string())),
            Err(FetchError::Server { status: 503, message: "busy".to_string() }),
            Ok(complete()),
        ]);
        assert_eq!(poller.tick().await, TickOutcome::Rendered);
        assert_eq!(poller.tick().await, TickOutcome::Skipped { kind: "transport" });
        assert_eq!(poller.tick().await, TickOutcome::Skipped { kind: "server" });
        assert_eq!(poller.tick().await, TickOutcome::Completed);
    }

    #[test]
    fn test_render_feeds_chart_surface() {
        let (poller, _, _, chart) = build(vec![]);
        poller.render(&running(1.5));
        poller.render(&complete());

        let chart = chart.lock().unwrap();
        assert_eq!(chart.frames.len(), 1);
        let last = chart.last().unwrap();
        assert_eq!(last.labels, vec!["12:00:00"]);
        assert_eq!(last.datasets[0].data, vec![1.5]);
        assert_eq!(last.datasets[1].data, vec![3.0]);
    }

    #[test]
    fn test_render_after_stop_is_tolerated() {
        let (mut poller, _, board, _) = build(vec![]);
        poller.stop();
        assert!(!poller.render(&running(1.0)));
        assert_eq!(board.lock().unwrap().text(Slot::StatusText), Some("Running"));
        assert_eq!(poller.chart_len(), 1);
    }

    #[test]
    fn test_chart_capped_at_twenty() {
        let (poller, _, _, _) = build(vec![]);
        for i in 0..30 {
            let before = poller.chart_len();
            poller.render(&running(i as f64));
            assert_eq!(poller.chart_len(), (before + 1).min(20));
        }
        let data = poller.chart_data();
        assert_eq!(data.datasets[0].data.first(), Some(&10.0));
    }

    #[test]
    fn test_release_chart() {
        let (poller, _, _, chart) = build(vec![]);
        poller.render(&running(1.0));
        poller.release_chart();
        assert!(chart.lock().unwrap().released);

        // buffer keeps going without a surface
        poller.render(&running(2.0));
        assert_eq!(poller.chart_len(), 2);
        assert!(chart.lock().unwrap().frames.is_empty());
    }

    struct PanicOnCommit;

    impl DisplaySurface for PanicOnCommit {
        fn set_text(&mut self, _: Slot, _: &str) {}
        fn set_state(&mut self, _: Slot, _: crate::display::VisualState) {}
        fn set_width(&mut self, _: Slot, _: f64) {}
        fn commit(&mut self) {
            panic!("surface gone");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_surface_deactivates() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(running(1.0))]));
        let mut poller = StatusPoller::new(
            source.clone(),
            Box::new(PanicOnCommit),
            None,
            Duration::from_millis(2000),
        );
        poller.start();
        let waited = tokio::time::timeout(Duration::from_secs(5), poller.wait()).await;
        assert!(waited.is_ok());
        assert!(!poller.is_active());

        advance(10_000).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_survives_aborted_task() {
        let (mut poller, source, _, _) = build(vec![Ok(running(1.0)), Ok(running(2.0))]);
        poller.start();
        advance(10).await;
        poller.stop();
        poller.start();
        advance(2010).await;
        // the aborted task from the first start must not clear the second
        assert!(poller.is_active());
        assert_eq!(source.calls(), 3);
        poller.stop();
    }
}
