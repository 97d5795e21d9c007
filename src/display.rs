//! Display seams: named slots the render step writes into, and the chart
//! surface it redraws. Concrete surfaces live in `terminal`; `SlotBoard`
//! is the in-memory board both tests and the terminal frame read from.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::chart::ChartData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    StatusIcon,
    StatusText,
    ElapsedTime,
    Duration,
    ProgressPercent,
    ProgressBar,
    TotalTrades,
    TwapTrades,
    TwapInput,
    TwapOutput,
    TwapSlippage,
    SmartTrades,
    SmartInput,
    SmartOutput,
    SmartSlippage,
    SmartExecutionRate,
}

impl Slot {
    pub fn id(&self) -> &'static str {
        match self {
            Slot::StatusIcon => "status-icon",
            Slot::StatusText => "status-text",
            Slot::ElapsedTime => "elapsed-time",
            Slot::Duration => "duration",
            Slot::ProgressPercent => "progress-percent",
            Slot::ProgressBar => "progress-bar",
            Slot::TotalTrades => "total-trades",
            Slot::TwapTrades => "twap-trades",
            Slot::TwapInput => "twap-input",
            Slot::TwapOutput => "twap-output",
            Slot::TwapSlippage => "twap-slippage",
            Slot::SmartTrades => "smart-trades",
            Slot::SmartInput => "smart-input",
            Slot::SmartOutput => "smart-output",
            Slot::SmartSlippage => "smart-slippage",
            Slot::SmartExecutionRate => "smart-execution-rate",
        }
    }
}

/// Visual state of a slot that is more than text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualState {
    Running,
    Stopped,
    Progress { animated: bool, complete: bool },
}

impl VisualState {
    pub fn class_name(&self) -> String {
        match self {
            VisualState::Running => "fas fa-circle fa-2x text-success".to_string(),
            VisualState::Stopped => "fas fa-circle fa-2x text-secondary".to_string(),
            VisualState::Progress { animated, complete } => {
                let mut class = String::from("progress-bar progress-bar-striped");
                if *animated {
                    class.push_str(" progress-bar-animated");
                }
                if *complete {
                    class.push_str(" bg-success");
                }
                class
            }
        }
    }
}

pub trait DisplaySurface {
    fn set_text(&mut self, slot: Slot, text: &str);
    fn set_state(&mut self, slot: Slot, state: VisualState);
    fn set_width(&mut self, slot: Slot, percent: f64);
    /// Called once after every render pass.
    fn commit(&mut self) {}
}

pub trait ChartSurface {
    /// Redraw from the given data, without animation.
    fn update(&mut self, data: &ChartData);
    /// Free whatever the surface holds; called on teardown.
    fn release(&mut self) {}
}

impl<T: DisplaySurface> DisplaySurface for Arc<Mutex<T>> {
    fn set_text(&mut self, slot: Slot, text: &str) {
        if let Ok(mut inner) = self.lock() {
            inner.set_text(slot, text);
        }
    }

    fn set_state(&mut self, slot: Slot, state: VisualState) {
        if let Ok(mut inner) = self.lock() {
            inner.set_state(slot, state);
        }
    }

    fn set_width(&mut self, slot: Slot, percent: f64) {
        if let Ok(mut inner) = self.lock() {
            inner.set_width(slot, percent);
        }
    }

    fn commit(&mut self) {
        if let Ok(mut inner) = self.lock() {
            inner.commit();
        }
    }
}

impl<T: ChartSurface> ChartSurface for Arc<Mutex<T>> {
    fn update(&mut self, data: &ChartData) {
        if let Ok(mut inner) = self.lock() {
            inner.update(data);
        }
    }

    fn release(&mut self) {
        if let Ok(mut inner) = self.lock() {
            inner.release();
        }
    }
}

/// In-memory display: remembers the last value written to each slot.
#[derive(Debug, Clone, Default)]
pub struct SlotBoard {
    text: BTreeMap<Slot, String>,
    state: BTreeMap<Slot, VisualState>,
    width: BTreeMap<Slot, f64>,
    commits: u64,
}

impl SlotBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self, slot: Slot) -> Option<&str> {
        self.text.get(&slot).map(String::as_str)
    }

    pub fn state(&self, slot: Slot) -> Option<VisualState> {
        self.state.get(&slot).copied()
    }

    pub fn width(&self, slot: Slot) -> Option<f64> {
        self.width.get(&slot).copied()
    }

    pub fn commits(&self) -> u64 {
        self.commits
    }

    pub fn is_blank(&self) -> bool {
        self.text.is_empty() && self.state.is_empty() && self.width.is_empty()
    }
}

impl DisplaySurface for SlotBoard {
    fn set_text(&mut self, slot: Slot, text: &str) {
        self.text.insert(slot, text.to_string());
    }

    fn set_state(&mut self, slot: Slot, state: VisualState) {
        self.state.insert(slot, state);
    }

    fn set_width(&mut self, slot: Slot, percent: f64) {
        self.width.insert(slot, percent);
    }

    fn commit(&mut self) {
        self.commits += 1;
    }
}

/// Chart surface that keeps every redraw it was asked for.
#[derive(Debug, Clone, Default)]
pub struct ChartRecorder {
    pub frames: Vec<ChartData>,
    pub released: bool,
}

impl ChartRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&ChartData> {
        self.frames.last()
    }
}

impl ChartSurface for ChartRecorder {
    fn update(&mut self, data: &ChartData) {
        self.frames.push(data.clone());
    }

    fn release(&mut self) {
        self.frames.clear();
        self.released = true;
    }
}
