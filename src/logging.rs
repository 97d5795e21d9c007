//! Structured logging for the dashboard.
//!
//! Every record is one JSON object per line:
//! `{"ts", "run_id", "seq", "lvl", "component", "event", "msg", "data"}`.
//! Records go to `$LOG_DIR/$RUN_ID/events.jsonl` (trace/debug to
//! `trace.jsonl`) and are echoed to stderr, leaving stdout to the
//! terminal frame.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            Ok("fatal") => Level::Fatal,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains (categories for filtering)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Poll,   // Fetches, transport and server failures
    Render, // Snapshot projection onto display slots
    Chart,  // Rolling chart buffer
    System, // Startup, shutdown, poller lifecycle
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Poll => "poll",
            Domain::Render => "render",
            Domain::Chart => "chart",
            Domain::System => "system",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS: comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Option<Mutex<BufWriter<File>>>,
    trace: Option<Mutex<BufWriter<File>>>,
}

fn open_sink(path: PathBuf) -> Option<Mutex<BufWriter<File>>> {
    match File::create(&path) {
        Ok(file) => Some(Mutex::new(BufWriter::new(file))),
        Err(err) => {
            eprintln!("[log] failed to create {}: {}", path.display(), err);
            None
        }
    }
}

/// Base directory for the JSONL sinks. `LOG_DIR=off` keeps stderr only;
/// unit-test builds also default to stderr only unless `LOG_DIR` is set.
fn resolve_log_dir(var: Option<String>) -> Option<PathBuf> {
    match var {
        Some(dir) if dir == "off" => None,
        Some(dir) => Some(PathBuf::from(dir)),
        None if cfg!(test) => None,
        None => Some(PathBuf::from("out/runs")),
    }
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("d-{}-{}", ts_epoch_ms(), process::id()));
        let Some(mut run_dir) = resolve_log_dir(std::env::var("LOG_DIR").ok()) else {
            return RunContext {
                run_id,
                events: None,
                trace: None,
            };
        };

        run_dir.push(&run_id);
        if let Err(err) = create_dir_all(&run_dir) {
            eprintln!("[log] failed to create run dir: {}", err);
        }
        let _ = std::fs::write(
            run_dir.join("manifest.json"),
            json!({
                "run_id": run_id,
                "ts": ts_now(),
                "pid": process::id(),
                "log_dir": run_dir.to_string_lossy(),
            })
            .to_string(),
        );

        RunContext {
            events: open_sink(run_dir.join("events.jsonl")),
            trace: open_sink(run_dir.join("trace.jsonl")),
            run_id,
        }
    })
}

fn write_line(writer: &Option<Mutex<BufWriter<File>>>, line: &str) {
    if let Some(Ok(mut w)) = writer.as_ref().map(|m| m.lock()) {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    emit_record(level, domain.as_str(), event, fields);
}

/// Build the JSON line for one record. Split out so the layout is testable
/// without touching the run directory.
fn format_record(
    run_id: &str,
    seq: u64,
    level: Level,
    component: &str,
    event: &str,
    mut fields: Map<String, Value>,
) -> String {
    let msg = fields.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(run_id));
    entry.insert("seq".to_string(), json!(seq));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    entry.insert("data".to_string(), Value::Object(fields));
    Value::Object(entry).to_string()
}

fn emit_record(level: Level, component: &str, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let line = format_record(&ctx.run_id, next_seq(), level, component, event, fields);
    match level {
        Level::Trace | Level::Debug => write_line(&ctx.trace, &line),
        _ => write_line(&ctx.events, &line),
    }
    eprintln!("{}", line);
}

// =============================================================================
// Domain-Specific Logging Helpers
// =============================================================================

/// Tick skipped because the request or the body decode failed.
pub fn log_tick_failure(url: &str, kind: &str, error: &str) {
    log(
        Level::Error,
        Domain::Poll,
        "tick_failed",
        obj(&[
            ("msg", v_str("Error updating status")),
            ("url", v_str(url)),
            ("kind", v_str(kind)),
            ("error", v_str(error)),
        ]),
    );
}

/// Tick skipped because the server reported an application error.
pub fn log_server_error(url: &str, status: u16, error: &str) {
    log(
        Level::Error,
        Domain::Poll,
        "server_error",
        obj(&[
            ("msg", v_str("Error fetching status")),
            ("url", v_str(url)),
            ("status", json!(status)),
            ("error", v_str(error)),
        ]),
    );
}

pub fn log_render(running: bool, progress: f64, elapsed: &str, chart_len: usize) {
    log(
        Level::Debug,
        Domain::Render,
        "render",
        obj(&[
            ("running", json!(running)),
            ("progress", v_num(progress)),
            ("elapsed", v_str(elapsed)),
            ("chart_len", json!(chart_len)),
        ]),
    );
}

pub fn log_bot_counters(bot: &str, successful: u64, failed: u64, skipped: u64) {
    log(
        Level::Trace,
        Domain::Render,
        "bot_counters",
        obj(&[
            ("bot", v_str(bot)),
            ("successful_trades", json!(successful)),
            ("failed_trades", json!(failed)),
            ("trades_skipped", json!(skipped)),
        ]),
    );
}

pub fn log_chart_evict(label: &str, len: usize) {
    log(
        Level::Trace,
        Domain::Chart,
        "evict",
        obj(&[("label", v_str(label)), ("len", json!(len))]),
    );
}

pub fn log_poller_state(state: &str, reason: &str) {
    log(
        Level::Info,
        Domain::System,
        "poller",
        obj(&[("state", v_str(state)), ("reason", v_str(reason))]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn test_obj_helper() {
        let m = obj(&[("key", v_str("value")), ("num", v_num(42.0))]);
        assert_eq!(m.get("key").unwrap(), "value");
        assert_eq!(m.get("num").unwrap(), 42.0);
    }

    #[test]
    fn test_seq_increments() {
        let s1 = next_seq();
        let s2 = next_seq();
        assert!(s2 > s1);
    }

    #[test]
    fn test_log_dir_resolution() {
        // unit tests never write out/runs unless asked to
        assert_eq!(resolve_log_dir(None), None);
        assert_eq!(resolve_log_dir(Some("off".to_string())), None);
        assert_eq!(
            resolve_log_dir(Some("/tmp/dash-logs".to_string())),
            Some(PathBuf::from("/tmp/dash-logs"))
        );
    }

    #[test]
    fn test_record_layout() {
        let line = format_record(
            "run-1",
            7,
            Level::Warn,
            "poll",
            "server_error",
            obj(&[("msg", v_str("boom")), ("status", json!(500))]),
        );
        let v: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["run_id"], "run-1");
        assert_eq!(v["seq"], 7);
        assert_eq!(v["lvl"], "WARN");
        assert_eq!(v["component"], "poll");
        assert_eq!(v["event"], "server_error");
        assert_eq!(v["msg"], "boom");
        assert_eq!(v["data"]["status"], 500);
        assert!(v["data"].get("msg").is_none());
    }
}
