//! MCP client over a line-delimited stdio pipe.
//!
//! One I/O task owns both ends of the pipe. Callers hand it serialized
//! requests through a channel and wait on a `oneshot` keyed by request id.
//! When the server's output closes, every waiting caller and every later
//! request gets [`McpError::ConnectionClosed`].

use crate::error::McpError;
use crate::protocol::{
    CallToolParams, CallToolResult, Incoming, InitializeParams, InitializeResult,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, McpTool,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

type ResponseTx = oneshot::Sender<Result<JsonValue, McpError>>;

/// A message queued for the server.
struct Outbound {
    line: String,
    waiter: Option<(u64, ResponseTx)>,
}

/// Client for one MCP server.
pub struct McpClient {
    outbound: mpsc::Sender<Outbound>,
    next_id: AtomicU64,
    request_timeout: Duration,
    _child: Option<Child>,
}

impl McpClient {
    /// Starts `command` with `args` and `env` and connects to its stdio.
    ///
    /// The child is killed when the client is dropped. Its stderr is
    /// forwarded to the log at debug level.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started.
    pub fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        request_timeout: Duration,
    ) -> Result<Self, McpError> {
        let spawn_error = |reason: String| McpError::Spawn {
            command: command.to_string(),
            reason,
        };

        let mut child = Command::new(command)
            .args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_error("stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error("stdout not captured".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr));
        }

        info!(command, pid = ?child.id(), "started MCP server");

        let mut client = Self::from_stdio(stdout, stdin, request_timeout);
        client._child = Some(child);
        Ok(client)
    }

    /// Connects to a server over an existing reader/writer pair.
    pub fn from_stdio<R, W>(reader: R, writer: W, request_timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (outbound, outbound_rx) = mpsc::channel(32);
        tokio::spawn(io_loop(reader, writer, outbound_rx));

        Self {
            outbound,
            next_id: AtomicU64::new(1),
            request_timeout,
            _child: None,
        }
    }

    /// Performs the `initialize` handshake and sends
    /// `notifications/initialized`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects or never answers the handshake.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<InitializeResult, McpError> {
        let result: InitializeResult = self
            .request("initialize", Some(to_params(&InitializeParams::default())?))
            .await?;

        self.notify("notifications/initialized", None).await?;

        info!(
            protocol_version = %result.protocol_version,
            server = result.server_info.as_ref().map_or("unknown", |s| s.name.as_str()),
            "MCP session initialized"
        );
        Ok(result)
    }

    /// Lists every tool the server offers, following `nextCursor`.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails.
    #[instrument(skip(self))]
    pub async fn list_tools(&self) -> Result<Vec<McpTool>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor
                .as_ref()
                .map(|c| serde_json::json!({ "cursor": c }));
            let page: ListToolsResult = self.request("tools/list", params).await?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => break,
            }
        }

        debug!(count = tools.len(), "listed MCP tools");
        Ok(tools)
    }

    /// Calls a tool.
    ///
    /// A result with `is_error` set is still `Ok`; the caller decides what
    /// it means.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a JSON-RPC error response.
    #[instrument(skip(self, arguments))]
    pub async fn call_tool(&self, name: &str, arguments: JsonValue) -> Result<CallToolResult, McpError> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        self.request("tools/call", Some(to_params(&params)?)).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<JsonValue>,
    ) -> Result<T, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = encode(&JsonRpcRequest::new(id, method, params))?;

        let (tx, rx) = oneshot::channel();
        self.outbound
            .send(Outbound {
                line,
                waiter: Some((id, tx)),
            })
            .await
            .map_err(|_| McpError::ConnectionClosed)?;

        let result = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => return Err(McpError::ConnectionClosed),
            Err(_) => {
                return Err(McpError::Timeout {
                    method: method.to_string(),
                });
            }
        };

        serde_json::from_value(result).map_err(|e| McpError::InvalidResponse {
            method: method.to_string(),
            reason: e.to_string(),
        })
    }

    async fn notify(&self, method: &str, params: Option<JsonValue>) -> Result<(), McpError> {
        let line = encode(&JsonRpcNotification::new(method, params))?;
        self.outbound
            .send(Outbound { line, waiter: None })
            .await
            .map_err(|_| McpError::ConnectionClosed)
    }
}

fn encode<T: Serialize>(message: &T) -> Result<String, McpError> {
    serde_json::to_string(message).map_err(|e| McpError::Io {
        reason: e.to_string(),
    })
}

fn to_params<T: Serialize>(params: &T) -> Result<JsonValue, McpError> {
    serde_json::to_value(params).map_err(|e| McpError::Io {
        reason: e.to_string(),
    })
}

/// Owns the pipe: writes queued messages, routes responses to waiters.
async fn io_loop<R, W>(reader: R, mut writer: W, mut outbound: mpsc::Receiver<Outbound>)
where
    R: AsyncRead + Send + Unpin,
    W: AsyncWrite + Send + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut pending: HashMap<u64, ResponseTx> = HashMap::new();

    loop {
        tokio::select! {
            Some(message) = outbound.recv() => {
                if let Err(e) = write_line(&mut writer, &message.line).await {
                    warn!(error = %e, "failed to write to MCP server");
                    if let Some((_, tx)) = message.waiter {
                        let _ = tx.send(Err(McpError::Io { reason: e.to_string() }));
                    }
                    continue;
                }
                if let Some((id, tx)) = message.waiter {
                    track(&mut pending, id, tx);
                }
            }
            read = reader.read_until(b'\n', &mut buf) => match read {
                Ok(0) => {
                    debug!("MCP server closed its output");
                    break;
                }
                Ok(_) => {
                    route(&String::from_utf8_lossy(&buf), &mut pending);
                    buf.clear();
                }
                Err(e) => {
                    warn!(error = %e, "failed to read from MCP server");
                    break;
                }
            }
        }
    }

    for (_, tx) in pending.drain() {
        let _ = tx.send(Err(McpError::ConnectionClosed));
    }
}

/// Registers a waiter, dropping those whose caller gave up.
fn track(pending: &mut HashMap<u64, ResponseTx>, id: u64, tx: ResponseTx) {
    pending.retain(|_, waiter| !waiter.is_closed());
    pending.insert(id, tx);
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

fn route(line: &str, pending: &mut HashMap<u64, ResponseTx>) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    match Incoming::parse(line) {
        Ok(Incoming::Response(response)) => deliver(response, pending),
        Ok(Incoming::Notification { method }) => {
            debug!(method = %method, "ignoring MCP notification");
        }
        Ok(Incoming::Request { id, method }) => {
            warn!(id = %id, method = %method, "ignoring request from MCP server");
        }
        Err(_) => debug!(line, "ignoring non-JSON-RPC output from MCP server"),
    }
}

fn deliver(response: JsonRpcResponse, pending: &mut HashMap<u64, ResponseTx>) {
    let Some(tx) = response.id.as_u64().and_then(|id| pending.remove(&id)) else {
        warn!(id = %response.id, "response for unknown request id");
        return;
    };

    let outcome = match (response.error, response.result) {
        (Some(error), _) => Err(McpError::Rpc {
            code: error.code,
            message: error.message,
        }),
        (None, result) => Ok(result.unwrap_or(JsonValue::Null)),
    };
    let _ = tx.send(outcome);
}

async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "relaybot_mcp::server", "{line}");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

    /// Received request lines, shared with the test.
    pub(crate) type Received = Arc<Mutex<Vec<JsonValue>>>;

    /// Runs a fake server that answers each request with `handler`.
    ///
    /// Returning `None` leaves the request unanswered. The server stops
    /// when `handler` has been called `stop_after` times, if given.
    pub(crate) fn fake_server<F>(handler: F, stop_after: Option<usize>) -> (McpClient, Received)
    where
        F: Fn(&str, &JsonValue) -> Option<JsonValue> + Send + 'static,
    {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (client_read, client_write) = tokio::io::split(client_io);
        let received: Received = Arc::new(Mutex::new(Vec::new()));

        tokio::spawn(serve(server_io, handler, stop_after, received.clone()));

        (
            McpClient::from_stdio(client_read, client_write, Duration::from_secs(5)),
            received,
        )
    }

    async fn serve<F>(io: DuplexStream, handler: F, stop_after: Option<usize>, received: Received)
    where
        F: Fn(&str, &JsonValue) -> Option<JsonValue>,
    {
        let (read, mut write): (ReadHalf<DuplexStream>, WriteHalf<DuplexStream>) =
            tokio::io::split(io);
        let mut lines = BufReader::new(read).lines();
        let mut handled = 0;

        while let Ok(Some(line)) = lines.next_line().await {
            let message: JsonValue = serde_json::from_str(&line).unwrap();
            received.lock().unwrap().push(message.clone());

            let Some(id) = message.get("id").cloned() else {
                continue;
            };
            let method = message["method"].as_str().unwrap().to_string();
            if let Some(reply) = handler(&method, &message["params"]) {
                let mut envelope = json!({"jsonrpc": "2.0", "id": id});
                if reply.get("code").is_some() && reply.get("message").is_some() {
                    envelope["error"] = reply;
                } else {
                    envelope["result"] = reply;
                }
                write_line(&mut write, &envelope.to_string()).await.unwrap();
            }

            handled += 1;
            if stop_after == Some(handled) {
                return;
            }
        }
    }

    pub(crate) fn handshake_reply() -> JsonValue {
        json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "fake", "version": "0.0.1"}
        })
    }

    #[tokio::test]
    async fn initialize_sends_handshake_and_notification() {
        let (client, received) = fake_server(
            |method, _| (method == "initialize").then(handshake_reply),
            None,
        );

        let result = client.initialize().await.expect("initialize");
        assert_eq!(result.protocol_version, "2024-11-05");
        assert_eq!(result.server_info.expect("server info").name, "fake");

        tokio::time::sleep(Duration::from_millis(50)).await;

        let received = received.lock().unwrap().clone();
        assert_eq!(received[0]["method"], "initialize");
        assert_eq!(received[0]["params"]["clientInfo"]["name"], "relaybot");
        assert_eq!(received[1]["method"], "notifications/initialized");
        assert!(received[1].get("id").is_none());
    }

    #[tokio::test]
    async fn list_tools_follows_cursor() {
        let (client, received) = fake_server(
            |method, params| match (method, params.get("cursor").and_then(JsonValue::as_str)) {
                ("tools/list", None) => Some(json!({
                    "tools": [{"name": "search", "description": "Search pages"}],
                    "nextCursor": "page-2"
                })),
                ("tools/list", Some("page-2")) => Some(json!({
                    "tools": [{"name": "query_db", "inputSchema": {"type": "object", "properties": {}}}]
                })),
                _ => None,
            },
            None,
        );

        let tools = client.list_tools().await.expect("list");
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["search", "query_db"]);
        assert_eq!(received.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn call_tool_returns_content_and_error_flag() {
        let (client, received) = fake_server(
            |method, params| {
                (method == "tools/call").then(|| {
                    json!({
                        "content": [{"type": "text", "text": format!("ran {}", params["name"])}],
                        "isError": params["name"] == "broken"
                    })
                })
            },
            None,
        );

        let ok = client
            .call_tool("search", json!({"query": "roadmap"}))
            .await
            .expect("call");
        assert!(!ok.is_error);
        assert_eq!(ok.text(), "ran \"search\"");

        let failed = client.call_tool("broken", json!({})).await.expect("call");
        assert!(failed.is_error);

        let first = received.lock().unwrap()[0].clone();
        assert_eq!(first["params"]["arguments"]["query"], "roadmap");
    }

    #[tokio::test]
    async fn rpc_error_is_reported() {
        let (client, _) = fake_server(
            |_, _| Some(json!({"code": -32601, "message": "Method not found"})),
            None,
        );

        let err = client.call_tool("anything", json!({})).await.unwrap_err();
        assert_eq!(
            err,
            McpError::Rpc {
                code: -32601,
                message: "Method not found".to_string()
            }
        );
    }

    #[tokio::test]
    async fn closed_server_fails_pending_and_later_requests() {
        let (client, _) = fake_server(|_, _| None, Some(1));

        let err = client.call_tool("search", json!({})).await.unwrap_err();
        assert_eq!(err, McpError::ConnectionClosed);

        let err = client.call_tool("search", json!({})).await.unwrap_err();
        assert_eq!(err, McpError::ConnectionClosed);
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let (client_io, _server_io) = tokio::io::duplex(1024);
        let (read, write) = tokio::io::split(client_io);
        let client = McpClient::from_stdio(read, write, Duration::from_millis(20));

        let err = client.list_tools().await.unwrap_err();
        assert_eq!(
            err,
            McpError::Timeout {
                method: "tools/list".to_string()
            }
        );
    }

    #[tokio::test]
    async fn invalid_utf8_output_is_skipped() {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (read, write) = tokio::io::split(client_io);
        let client = McpClient::from_stdio(read, write, Duration::from_secs(5));

        tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server_io);
            let mut lines = BufReader::new(read).lines();
            let line = lines.next_line().await.unwrap().unwrap();
            let request: JsonValue = serde_json::from_str(&line).unwrap();

            write.write_all(b"\xff\xfe npm warn\n").await.unwrap();
            let reply = json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "result": {"tools": [{"name": "search"}]}
            });
            write_line(&mut write, &reply.to_string()).await.unwrap();
            let _ = lines.next_line().await;
        });

        let tools = client.list_tools().await.expect("list");
        assert_eq!(tools[0].name, "search");
    }

    #[test]
    fn abandoned_waiters_are_pruned() {
        let mut pending = HashMap::new();
        let (timed_out, rx) = oneshot::channel();
        drop(rx);
        let (waiting, _waiting_rx) = oneshot::channel();
        track(&mut pending, 1, timed_out);
        track(&mut pending, 2, waiting);

        let (next, _next_rx) = oneshot::channel();
        track(&mut pending, 3, next);

        let mut ids: Vec<_> = pending.keys().copied().collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn out_of_order_responses_reach_their_callers() {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (read, write) = tokio::io::split(client_io);
        let client = Arc::new(McpClient::from_stdio(read, write, Duration::from_secs(5)));

        tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server_io);
            let mut lines = BufReader::new(read).lines();
            let mut requests = Vec::new();
            while requests.len() < 2 {
                let line = lines.next_line().await.unwrap().unwrap();
                requests.push(serde_json::from_str::<JsonValue>(&line).unwrap());
            }
            for request in requests.iter().rev() {
                let reply = json!({
                    "jsonrpc": "2.0",
                    "id": request["id"],
                    "result": {"content": [{"type": "text", "text": request["params"]["name"]}]}
                });
                write_line(&mut write, &reply.to_string()).await.unwrap();
            }
            // Keep the pipe open until the client is done.
            let _ = lines.next_line().await;
        });

        let (a, b) = tokio::join!(
            client.call_tool("alpha", json!({})),
            client.call_tool("beta", json!({}))
        );
        assert_eq!(a.expect("alpha").text(), "alpha");
        assert_eq!(b.expect("beta").text(), "beta");
    }
}
