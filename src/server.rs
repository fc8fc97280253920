//! MCP method table and newline-delimited JSON-RPC transport

use crate::gateway::{Dispatcher, GatewayError};
use jsonrpc_core::{Error as RpcError, ErrorCode, IoHandler, Params, Response, Value, Version};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// MCP protocol revision this server speaks
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name reported during initialization
pub const SERVER_NAME: &str = "devbox-mcp";

/// Application error code for policy, execution and configuration failures
pub const GATEWAY_ERROR_CODE: i64 = -32000;

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

/// Map a gateway error onto a JSON-RPC error
pub fn to_rpc_error(err: GatewayError) -> RpcError {
    if err.is_invalid_params() {
        RpcError::invalid_params(err.to_string())
    } else {
        RpcError {
            code: ErrorCode::ServerError(GATEWAY_ERROR_CODE),
            message: err.to_string(),
            data: None,
        }
    }
}

async fn initialize(_params: Params) -> jsonrpc_core::Result<Value> {
    Ok(json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        },
    }))
}

async fn list_tools(dispatcher: Arc<Dispatcher>) -> jsonrpc_core::Result<Value> {
    let tools = dispatcher.list_tools().map_err(to_rpc_error)?;
    Ok(json!({ "tools": tools }))
}

async fn call_tool(dispatcher: Arc<Dispatcher>, params: Params) -> jsonrpc_core::Result<Value> {
    let call: CallToolParams = params.parse()?;
    let response = dispatcher
        .call_tool(&call.name, call.arguments)
        .await
        .map_err(|e| {
            info!(tool = %call.name, "Tool call refused: {}", e);
            to_rpc_error(e)
        })?;
    Ok(response.to_mcp())
}

/// Build the JSON-RPC method table around a dispatcher
pub fn build_handler(dispatcher: Arc<Dispatcher>) -> IoHandler {
    let mut io = IoHandler::new();

    io.add_method("initialize", initialize);
    io.add_method("ping", |_params: Params| async { Ok::<_, RpcError>(json!({})) });

    let tools_dispatcher = dispatcher.clone();
    io.add_method("tools/list", move |_params: Params| {
        list_tools(tools_dispatcher.clone())
    });

    io.add_method("tools/call", move |params: Params| {
        call_tool(dispatcher.clone(), params)
    });

    io.add_notification("notifications/initialized", |_params: Params| {
        info!("Client initialized");
    });

    io
}

/// JSON-RPC parse error for a line that could not be decoded
fn parse_error_response() -> Option<String> {
    let response = Response::from(RpcError::parse_error(), Some(Version::V2));
    serde_json::to_string(&response).ok()
}

/// Serve newline-delimited JSON-RPC until the reader reaches EOF
///
/// Each request runs on its own task so slow commands do not block other
/// calls; responses are written by a single writer in completion order.
pub async fn serve<R, W>(io: IoHandler, reader: R, writer: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let io = Arc::new(io);
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(response) = rx.recv().await {
            writer.write_all(response.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut reader = reader;
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer).await? == 0 {
            break;
        }

        let line = match std::str::from_utf8(&buffer) {
            Ok(line) => line.trim().to_string(),
            Err(e) => {
                warn!("Discarding request that is not valid UTF-8: {}", e);
                if let Some(response) = parse_error_response() {
                    if tx.send(response).is_err() {
                        error!("Response channel closed");
                    }
                }
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        debug!("Request: {}", line);
        let io = io.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Some(response) = io.handle_request(&line).await {
                if tx.send(response).is_err() {
                    error!("Response channel closed");
                }
            }
        });
    }

    info!("Input closed, waiting for in-flight requests");
    drop(tx);
    writer_task.await??;
    Ok(())
}
