use async_trait::async_trait;
use reqwest::Client;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use url::Url;

use crate::config::DashboardConfig;
use crate::snapshot::{StatusReply, StatusSnapshot};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error("failed to decode status body: {0}")]
    Decode(#[source] Box<serde_json::Error>),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Server { .. } => "server",
            FetchError::Decode(_) => "decode",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(error: serde_json::Error) -> Self {
        Self::Decode(Box::new(error))
    }
}

/// Where snapshots come from.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self) -> Result<StatusSnapshot, FetchError>;

    /// Human-readable origin for log records.
    fn describe(&self) -> String;
}

/// Polls the simulation's HTTP status endpoint.
pub struct HttpStatusSource {
    client: Client,
    url: Url,
}

impl HttpStatusSource {
    pub fn new(cfg: &DashboardConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = cfg.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            url: cfg.status_url()?,
        })
    }
}

/// Map one HTTP response onto the fetch result.
pub fn interpret(status: u16, body: &[u8]) -> Result<StatusSnapshot, FetchError> {
    let success = (200..300).contains(&status);
    match StatusReply::decode(body) {
        Ok(StatusReply::Snapshot(snapshot)) if success => Ok(snapshot),
        Ok(StatusReply::Error(message)) => Err(FetchError::Server { status, message }),
        Err(err) if success => Err(err.into()),
        // non-2xx without a usable error field
        Ok(StatusReply::Snapshot(_)) | Err(_) => Err(FetchError::Server {
            status,
            message: format!("HTTP {}", status),
        }),
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch(&self) -> Result<StatusSnapshot, FetchError> {
        let resp = self.client.get(self.url.clone()).send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?;
        interpret(status, &body)
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}

/// Replays a fixed list of fetch results in order, one per call. Once the
/// script runs out every further call is a transport failure.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<StatusSnapshot, FetchError>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<StatusSnapshot, FetchError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch(&self) -> Result<StatusSnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| Err(FetchError::Transport("script exhausted".to_string())))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpret_success() {
        let snap = interpret(200, br#"{"running": true, "progress_percent": 12.5}"#).unwrap();
        assert!(snap.running);
        assert_eq!(snap.progress_percent, 12.5);
    }

    #[test]
    fn test_interpret_server_error_field() {
        let err = interpret(500, br#"{"error": "simulation crashed"}"#).unwrap_err();
        match err {
            FetchError::Server { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "simulation crashed");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_interpret_ok_status_with_error_field() {
        let err = interpret(200, br#"{"running": false, "error": "No simulation initialized"}"#)
            .unwrap_err();
        assert_eq!(err.kind(), "server");
        assert!(err.to_string().contains("No simulation initialized"));
    }

    #[test]
    fn test_interpret_non_json_failure() {
        let err = interpret(502, b"Bad Gateway").unwrap_err();
        assert_eq!(err.kind(), "server");
        assert_eq!(err.to_string(), "server returned 502: HTTP 502");
    }

    #[test]
    fn test_interpret_decode_failure() {
        let err = interpret(200, b"not json").unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[tokio::test]
    async fn test_scripted_source_order_and_exhaustion() {
        let src = ScriptedSource::new(vec![
            Ok(StatusSnapshot { running: true, ..Default::default() }),
            Err(FetchError::Transport("down".to_string())),
        ]);
        assert!(src.fetch().await.unwrap().running);
        assert_eq!(src.fetch().await.unwrap_err().kind(), "transport");
        assert!(src.fetch().await.is_err());
        assert_eq!(src.calls(), 3);
    }

    #[test]
    fn test_http_source_builds_url() {
        let cfg = DashboardConfig {
            base_url: "http://localhost:9999".to_string(),
            request_timeout_ms: Some(500),
            ..Default::default()
        };
        let src = HttpStatusSource::new(&cfg).unwrap();
        assert_eq!(src.describe(), "http://localhost:9999/api/simulation_status");
    }
}
