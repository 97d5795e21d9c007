use std::io::{self, Stdout, Write};
use std::sync::{Arc, Mutex};

use crate::chart::ChartData;
use crate::display::{ChartSurface, DisplaySurface, Slot, SlotBoard, VisualState};

const SPARKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const BAR_WIDTH: usize = 40;

type ChartView = Arc<Mutex<Option<ChartData>>>;

/// Text frame on a writer (stdout by default), redrawn on every commit.
pub struct TerminalDisplay<W: Write = Stdout> {
    board: SlotBoard,
    chart: ChartView,
    out: W,
    clear: bool,
}

/// Chart half of the terminal pair; hands its data to the display frame.
pub struct TerminalChart {
    chart: ChartView,
}

/// Display and chart surfaces sharing one frame on stdout.
pub fn stdout_pair() -> (TerminalDisplay, TerminalChart) {
    pair(io::stdout(), true)
}

pub fn pair<W: Write>(out: W, clear: bool) -> (TerminalDisplay<W>, TerminalChart) {
    let chart: ChartView = Arc::new(Mutex::new(None));
    (
        TerminalDisplay {
            board: SlotBoard::new(),
            chart: chart.clone(),
            out,
            clear,
        },
        TerminalChart { chart },
    )
}

fn sparkline(values: &[f64], lo: f64, hi: f64) -> String {
    let span = hi - lo;
    values
        .iter()
        .map(|v| {
            if span <= f64::EPSILON {
                SPARKS[0]
            } else {
                let idx = ((v - lo) / span * (SPARKS.len() - 1) as f64).round() as usize;
                SPARKS[idx.min(SPARKS.len() - 1)]
            }
        })
        .collect()
}

fn chart_lines(data: &ChartData) -> Vec<String> {
    let all = data.datasets.iter().flat_map(|d| d.data.iter().copied());
    let (lo, hi) = all.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let mut lines = Vec::with_capacity(data.datasets.len() + 1);
    if let (Some(first), Some(last)) = (data.labels.first(), data.labels.last()) {
        lines.push(format!("  {} .. {} ({} pts)", first, last, data.labels.len()));
    }
    for set in &data.datasets {
        let latest = set.data.last().copied().unwrap_or(0.0);
        lines.push(format!(
            "  {:<18} {} {:.4}",
            set.label,
            sparkline(&set.data, lo, hi),
            latest
        ));
    }
    lines
}

impl<W: Write> TerminalDisplay<W> {
    pub fn board(&self) -> &SlotBoard {
        &self.board
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn slot(&self, slot: Slot) -> &str {
        self.board.text(slot).unwrap_or("-")
    }

    fn progress_bar(&self) -> String {
        let pct = self.board.width(Slot::ProgressBar).unwrap_or(0.0).clamp(0.0, 100.0);
        let filled = ((pct / 100.0) * BAR_WIDTH as f64).round() as usize;
        let fill = match self.board.state(Slot::ProgressBar) {
            Some(VisualState::Progress { complete: true, .. }) => '#',
            _ => '=',
        };
        format!(
            "[{}{}] {}",
            fill.to_string().repeat(filled),
            " ".repeat(BAR_WIDTH - filled.min(BAR_WIDTH)),
            self.slot(Slot::ProgressBar)
        )
    }

    /// Current frame as text.
    pub fn frame(&self) -> String {
        let icon = match self.board.state(Slot::StatusIcon) {
            Some(VisualState::Running) => '●',
            Some(VisualState::Stopped) => '○',
            _ => ' ',
        };
        let mut lines = vec![
            format!(
                "{} {}   elapsed {} / {}",
                icon,
                self.slot(Slot::StatusText),
                self.slot(Slot::ElapsedTime),
                self.slot(Slot::Duration)
            ),
            self.progress_bar(),
            format!("total trades {}", self.slot(Slot::TotalTrades)),
            String::new(),
            format!(
                "{:<8} {:>8} {:>12} {:>12} {:>10} {:>8}",
                "bot", "trades", "input", "output", "slippage", "exec"
            ),
            format!(
                "{:<8} {:>8} {:>12} {:>12} {:>10} {:>8}",
                "TWAP",
                self.slot(Slot::TwapTrades),
                self.slot(Slot::TwapInput),
                self.slot(Slot::TwapOutput),
                self.slot(Slot::TwapSlippage),
                "",
            ),
            format!(
                "{:<8} {:>8} {:>12} {:>12} {:>10} {:>8}",
                "Smart",
                self.slot(Slot::SmartTrades),
                self.slot(Slot::SmartInput),
                self.slot(Slot::SmartOutput),
                self.slot(Slot::SmartSlippage),
                self.slot(Slot::SmartExecutionRate),
            ),
        ];
        if let Ok(chart) = self.chart.lock() {
            if let Some(data) = chart.as_ref() {
                lines.push(String::new());
                lines.extend(chart_lines(data));
            }
        }
        lines.join("\n")
    }
}

impl<W: Write> DisplaySurface for TerminalDisplay<W> {
    fn set_text(&mut self, slot: Slot, text: &str) {
        self.board.set_text(slot, text);
    }

    fn set_state(&mut self, slot: Slot, state: VisualState) {
        self.board.set_state(slot, state);
    }

    fn set_width(&mut self, slot: Slot, percent: f64) {
        self.board.set_width(slot, percent);
    }

    fn commit(&mut self) {
        self.board.commit();
        let frame = self.frame();
        if self.clear {
            let _ = write!(self.out, "\x1b[2J\x1b[H");
        }
        let _ = writeln!(self.out, "{}", frame);
        let _ = self.out.flush();
    }
}

impl ChartSurface for TerminalChart {
    fn update(&mut self, data: &ChartData) {
        if let Ok(mut chart) = self.chart.lock() {
            *chart = Some(data.clone());
        }
    }

    fn release(&mut self) {
        if let Ok(mut chart) = self.chart.lock() {
            *chart = None;
        }
    }
}
