//! SeekShell RPC server: JSON-RPC over stdin/stdout for the presentation layer.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"tabs.create", "params":{"url":"..."}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//! Event:    {"event":"tabs:state", "payload":{...}}

use std::path::PathBuf;
use std::time::Instant;

use seekshell::app::Shell;
use seekshell::platform;
use seekshell::rpc_handler::handle_method;

use serde_json::{json, Value};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Simple rate limiter: max requests per second.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self { window_start: Instant::now(), request_count: 0, max_per_second }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        let elapsed = self.window_start.elapsed();
        if elapsed.as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SEEKSHELL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn data_dir() -> PathBuf {
    match std::env::var("SEEKSHELL_DATA_DIR") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => platform::get_data_dir(),
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let data_dir = data_dir();
    let (shell, mut events) = match Shell::open(&data_dir, None) {
        Ok(opened) => opened,
        Err(e) => {
            error!(error = %e, data_dir = %data_dir.display(), "failed to initialize shell");
            std::process::exit(1);
        }
    };

    // Single writer so responses and events never interleave mid-line.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        let mut stdout = io::stdout();
        while let Some(line) = out_rx.recv().await {
            let written = async {
                stdout.write_all(line.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await
            };
            if let Err(e) = written.await {
                warn!(error = %e, "stdout closed");
                break;
            }
        }
    });

    let event_tx = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => {
                    if event_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "failed to encode event"),
            }
        }
    });

    shell.startup();
    let _ = out_tx.send(json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")}).to_string());
    info!(data_dir = %data_dir.display(), "rpc server ready");

    // Max 200 RPC requests per second.
    let mut rate_limiter = RateLimiter::new(200);

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "failed to read stdin");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                let _ = out_tx.send(json!({"id": null, "error": format!("parse error: {}", e)}).to_string());
                continue;
            }
        };

        let id = req.get("id").cloned().unwrap_or(Value::Null);

        if !rate_limiter.check() {
            let _ = out_tx.send(json!({"id": id, "error": "rate limit exceeded"}).to_string());
            continue;
        }

        let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
        let params = req.get("params").cloned().unwrap_or(json!({}));
        debug!(method, "rpc request");

        let response = match handle_method(&shell, method, &params).await {
            Ok(val) => json!({"id": id, "result": val}),
            Err(err) => json!({"id": id, "error": err}),
        };
        let _ = out_tx.send(response.to_string());
    }

    info!("stdin closed; shutting down");
    shell.shutdown();
    drop(shell);
    let _ = forwarder.await;
    drop(out_tx);
    let _ = writer.await;
}
