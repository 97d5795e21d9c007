//! Snapshot → display projection.
//!
//! `project` is pure: it turns one snapshot into the list of slot writes,
//! the chart sample to append (if any) and the terminal flag. `apply`
//! replays the slot writes onto a surface.

use crate::display::{DisplaySurface, Slot, VisualState};
use crate::snapshot::{BotStats, StatusSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub enum SlotUpdate {
    Text(Slot, String),
    State(Slot, VisualState),
    Width(Slot, f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub updates: Vec<SlotUpdate>,
    /// (twap output, smart output) to append, only while running.
    pub sample: Option<(f64, f64)>,
    /// Clamped progress used for both display and the stop decision.
    pub progress: f64,
    pub complete: bool,
}

impl Projection {
    pub fn text(&self, slot: Slot) -> Option<&str> {
        self.updates.iter().rev().find_map(|u| match u {
            SlotUpdate::Text(s, t) if *s == slot => Some(t.as_str()),
            _ => None,
        })
    }
}

/// `m:ss` from fractional minutes.
pub fn format_elapsed(elapsed_minutes: f64) -> String {
    let elapsed = if elapsed_minutes.is_finite() { elapsed_minutes.max(0.0) } else { 0.0 };
    let minutes = elapsed.floor();
    let seconds = ((elapsed - minutes) * 60.0).floor();
    format!("{}:{:02}", minutes as u64, seconds as u64)
}

/// Fixed-point text with ties rounded away from zero (12.25 -> "12.3"),
/// where plain `{:.N}` would round them to even.
fn fixed(v: f64, digits: usize) -> String {
    let scale = 10f64.powi(digits as i32);
    let scaled = v * scale;
    let rounded = if scaled.is_finite() { scaled.round() / scale } else { v };
    format!("{:.*}", digits, rounded)
}

pub fn format_progress(progress: f64) -> String {
    format!("{}%", fixed(progress, 1))
}

pub fn format_amount(v: f64) -> String {
    fixed(v, 2)
}

pub fn format_slippage(v: f64) -> String {
    format!("{}%", fixed(v, 3))
}

pub fn format_rate(v: f64) -> String {
    format!("{}%", fixed(v, 2))
}

fn bot_updates(out: &mut Vec<SlotUpdate>, stats: &BotStats, slots: [Slot; 4]) {
    let [trades, input, output, slippage] = slots;
    out.push(SlotUpdate::Text(trades, stats.total_trades.to_string()));
    out.push(SlotUpdate::Text(input, format_amount(stats.total_input_traded)));
    out.push(SlotUpdate::Text(output, format_amount(stats.total_output_received)));
    out.push(SlotUpdate::Text(slippage, format_slippage(stats.average_slippage)));
}

pub fn project(snapshot: &StatusSnapshot) -> Projection {
    let mut updates = Vec::with_capacity(20);

    if snapshot.running {
        updates.push(SlotUpdate::State(Slot::StatusIcon, VisualState::Running));
        updates.push(SlotUpdate::Text(Slot::StatusText, "Running".to_string()));
    } else {
        updates.push(SlotUpdate::State(Slot::StatusIcon, VisualState::Stopped));
        updates.push(SlotUpdate::Text(Slot::StatusText, "Stopped".to_string()));
    }

    updates.push(SlotUpdate::Text(
        Slot::ElapsedTime,
        format_elapsed(snapshot.elapsed_minutes),
    ));
    if let Some(duration) = snapshot.duration_minutes {
        updates.push(SlotUpdate::Text(Slot::Duration, format_elapsed(duration)));
    }

    let progress = snapshot.clamped_progress();
    let progress_text = format_progress(progress);
    updates.push(SlotUpdate::Text(Slot::ProgressPercent, progress_text.clone()));
    updates.push(SlotUpdate::Width(Slot::ProgressBar, progress));
    updates.push(SlotUpdate::Text(Slot::ProgressBar, progress_text));
    updates.push(SlotUpdate::State(
        Slot::ProgressBar,
        VisualState::Progress {
            animated: snapshot.running,
            complete: progress >= 100.0,
        },
    ));

    if let (Some(twap), Some(smart)) = (&snapshot.twap_stats, &snapshot.smart_stats) {
        let total = twap.total_trades.saturating_add(smart.total_trades);
        updates.push(SlotUpdate::Text(Slot::TotalTrades, total.to_string()));
    }

    if let Some(twap) = &snapshot.twap_stats {
        bot_updates(
            &mut updates,
            twap,
            [Slot::TwapTrades, Slot::TwapInput, Slot::TwapOutput, Slot::TwapSlippage],
        );
    }

    if let Some(smart) = &snapshot.smart_stats {
        bot_updates(
            &mut updates,
            smart,
            [Slot::SmartTrades, Slot::SmartInput, Slot::SmartOutput, Slot::SmartSlippage],
        );
        updates.push(SlotUpdate::Text(
            Slot::SmartExecutionRate,
            format_rate(smart.execution_rate),
        ));
    }

    let sample = snapshot.running.then(|| {
        let out = |s: &Option<BotStats>| s.as_ref().map(|b| b.total_output_received).unwrap_or(0.0);
        (out(&snapshot.twap_stats), out(&snapshot.smart_stats))
    });

    Projection {
        updates,
        sample,
        progress,
        complete: !snapshot.running && progress >= 100.0,
    }
}

pub fn apply(projection: &Projection, display: &mut dyn DisplaySurface) {
    for update in &projection.updates {
        match update {
            SlotUpdate::Text(slot, text) => display.set_text(*slot, text),
            SlotUpdate::State(slot, state) => display.set_state(*slot, *state),
            SlotUpdate::Width(slot, pct) => display.set_width(*slot, *pct),
        }
    }
}
