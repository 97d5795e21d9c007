//! Replay status server.
//!
//! Serves recorded snapshots (one JSON document per line) on the status
//! path, one per request, repeating the last once the recording runs out.
//! Plain `std::net` and one request per connection; it exists to drive the
//! dashboard without a live simulation.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;

use crate::logging::{log, obj, v_str, Domain, Level};

/// Load a JSONL recording, skipping blank lines and `#` comments.
pub fn load_recording(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut out = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let value: Value = serde_json::from_str(trimmed)
            .with_context(|| format!("{}:{}: not a JSON document", path.display(), idx + 1))?;
        out.push(value.to_string());
    }
    Ok(out)
}

pub struct ReplayServer {
    snapshots: Vec<String>,
    cursor: usize,
    status_path: String,
}

impl ReplayServer {
    pub fn new(snapshots: Vec<String>, status_path: &str) -> Self {
        Self {
            snapshots,
            cursor: 0,
            status_path: format!("/{}", status_path.trim_start_matches('/')),
        }
    }

    fn next_snapshot(&mut self) -> String {
        match self.snapshots.get(self.cursor) {
            Some(body) => {
                self.cursor += 1;
                body.clone()
            }
            None => match self.snapshots.last() {
                Some(last) => last.clone(),
                None => json!({"running": false, "error": "No simulation initialized"}).to_string(),
            },
        }
    }

    /// (status line, content type, body) for one request line.
    pub fn route(&mut self, request_line: &str) -> (&'static str, &'static str, String) {
        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or("");
        let path = parts.next().unwrap_or("").split('?').next().unwrap_or("");

        if method != "GET" {
            let body = json!({"error": "Method Not Allowed"}).to_string();
            return ("405 METHOD NOT ALLOWED", "application/json", body);
        }
        if path == self.status_path {
            ("200 OK", "application/json", self.next_snapshot())
        } else if path == "/api/health" {
            ("200 OK", "application/json", r#"{"status":"ok"}"#.to_string())
        } else {
            ("404 NOT FOUND", "application/json", json!({"error": "Not Found"}).to_string())
        }
    }

    fn handle(&mut self, stream: &mut TcpStream) -> Result<()> {
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut request_line = String::new();
        reader.read_line(&mut request_line)?;
        // drain headers so closing the socket does not reset the client
        let mut header = String::new();
        loop {
            header.clear();
            if reader.read_line(&mut header)? == 0 || header.trim().is_empty() {
                break;
            }
        }

        let (status, content_type, body) = self.route(request_line.trim());
        log(
            Level::Debug,
            Domain::Poll,
            "replay_request",
            obj(&[("request", v_str(request_line.trim())), ("status", v_str(status))]),
        );
        let response = format!(
            "HTTP/1.1 {}\r\n\
             Content-Type: {}\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Connection: close\r\n\
             Content-Length: {}\r\n\r\n{}",
            status,
            content_type,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes())?;
        stream.flush()?;
        Ok(())
    }

    /// Accept connections until `max_requests` have been answered (forever
    /// when None).
    pub fn serve(&mut self, listener: TcpListener, max_requests: Option<usize>) {
        let mut served = 0usize;
        for stream in listener.incoming() {
            let mut stream = match stream {
                Ok(s) => s,
                Err(_) => continue,
            };
            if let Err(err) = self.handle(&mut stream) {
                log(
                    Level::Warn,
                    Domain::Poll,
                    "replay_error",
                    obj(&[("error", v_str(&err.to_string()))]),
                );
            }
            served += 1;
            if max_requests.is_some_and(|max| served >= max) {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_walks_recording_then_repeats_last() {
        let mut server = ReplayServer::new(
            vec![r#"{"running":true}"#.to_string(), r#"{"running":false}"#.to_string()],
            "api/simulation_status",
        );
        let req = "GET /api/simulation_status HTTP/1.1";
        assert_eq!(server.route(req).2, r#"{"running":true}"#);
        assert_eq!(server.route(req).2, r#"{"running":false}"#);
        assert_eq!(server.route(req).2, r#"{"running":false}"#);
    }

    #[test]
    fn test_route_empty_recording_reports_error() {
        let mut server = ReplayServer::new(vec![], "/api/simulation_status");
        let (status, _, body) = server.route("GET /api/simulation_status?x=1 HTTP/1.1");
        assert_eq!(status, "200 OK");
        assert!(body.contains("No simulation initialized"));
    }

    #[test]
    fn test_route_other_paths() {
        let mut server = ReplayServer::new(vec![], "/api/simulation_status");
        assert_eq!(server.route("GET /api/health HTTP/1.1").0, "200 OK");
        assert_eq!(server.route("GET /nope HTTP/1.1").0, "404 NOT FOUND");
        let post = server.route("POST /api/simulation_status HTTP/1.1");
        assert_eq!(post.0, "405 METHOD NOT ALLOWED");
    }

    #[test]
    fn test_load_recording_skips_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# recorded run").unwrap();
        writeln!(file, r#"{{"running": true, "progress_percent": 10}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"running": false, "progress_percent": 100}}"#).unwrap();
        let lines = load_recording(file.path()).unwrap();
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_load_recording_rejects_bad_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{not json").unwrap();
        let err = load_recording(file.path()).unwrap_err();
        assert!(err.to_string().contains(":1:"));
    }
}
