//! Line-delimited JSON protocol over stdio.
//!
//! Each input line is one command:
//!
//! ```text
//! {"id": 1, "signal": "install"}
//! {"id": 2, "signal": "activate"}
//! {"id": 3, "signal": "fetch", "method": "GET", "url": "/static/sw.js"}
//! {"id": 4, "signal": "state"}
//! ```
//!
//! Every command runs on its own task; replies carry the command's `id` and
//! may arrive out of order. Response bodies are base64-encoded.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use pwa_cache_core::{Error, Request, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::agent::FetchOutcome;
use crate::host::WorkerHost;

#[derive(Debug, Deserialize)]
#[serde(tag = "signal", rename_all = "lowercase")]
enum Command {
    Install,
    Activate,
    Fetch {
        #[serde(default = "default_method")]
        method: String,
        url: String,
        #[serde(default)]
        headers: Vec<(String, String)>,
        #[serde(default)]
        body: Option<String>,
    },
    State,
}

fn default_method() -> String {
    "GET".into()
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Value,
    #[serde(flatten)]
    command: Command,
}

fn encode_response(response: &Response) -> Value {
    json!({
        "url": response.url,
        "status": response.status,
        "status_text": response.status_text,
        "type": response.response_type,
        "redirected": response.redirected,
        "headers": response.headers,
        "body_base64": STANDARD.encode(&response.body),
    })
}

fn error_reply(id: Value, err: &Error) -> Value {
    json!({ "id": id, "ok": false, "error": err.to_string() })
}

/// Execute one protocol line against the host and build its reply.
pub async fn handle_line(host: &WorkerHost, line: &str) -> Value {
    let envelope: Envelope = match serde_json::from_str(line) {
        Ok(envelope) => envelope,
        Err(e) => return error_reply(Value::Null, &Error::InvalidInput(format!("malformed command: {e}"))),
    };
    let id = envelope.id;

    match envelope.command {
        Command::Install => match host.install().await {
            Ok(outcome) => json!({ "id": id, "ok": true, "install": outcome, "state": host.state().await }),
            Err(e) => error_reply(id, &e),
        },
        Command::Activate => match host.activate().await {
            Ok(outcome) => json!({ "id": id, "ok": true, "activate": outcome, "state": host.state().await }),
            Err(e) => error_reply(id, &e),
        },
        Command::Fetch { method, url, headers, body } => {
            let mut request = Request::new(method, url);
            request.headers = headers;
            request.body = body.map(Bytes::from);

            let outcome = host.fetch(request).await;
            let response = outcome.response().map(encode_response);
            json!({
                "id": id,
                "ok": !matches!(outcome, FetchOutcome::Unavailable),
                "source": outcome.source(),
                "response": response,
            })
        }
        Command::State => json!({
            "id": id,
            "ok": true,
            "state": host.state().await,
            "controlling": host.is_controlling(),
        }),
    }
}

/// Serve commands from `reader` until EOF, writing replies to `writer`.
///
/// A line that cannot be decoded gets an error reply; serving continues.
/// Returns once every reply has been written.
pub async fn serve<R, W>(host: Arc<WorkerHost>, reader: R, mut writer: W) -> Result<(), Error>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
    let mut reader = BufReader::new(reader);

    let read = async move {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim().to_string(),
                Err(e) => {
                    let _ = tx.send(error_reply(
                        Value::Null,
                        &Error::InvalidInput(format!("command is not valid UTF-8: {e}")),
                    ));
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            let host = Arc::clone(&host);
            let tx = tx.clone();
            tokio::spawn(async move {
                let reply = handle_line(&host, &line).await;
                let _ = tx.send(reply);
            });
        }
        Ok::<(), Error>(())
    };

    let write = async move {
        while let Some(reply) = rx.recv().await {
            let mut line = reply.to_string();
            line.push('\n');
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await?;
        }
        Ok::<(), Error>(())
    };

    let (read, write) = tokio::join!(read, write);
    read.and(write)
}
