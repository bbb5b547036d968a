//! Pipe transport (§4.E): line-delimited JSON-RPC on stdin/stdout, a
//! single peer, lifetime equal to the process. There is exactly one
//! session handle — the process itself — so the email-resolution chain's
//! middle link (session-attached email) is always `None` here; the pipe
//! has no per-connection header to carry one.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use sa_mcp_protocol::{error_codes, CallToolParams, JsonRpcRequest, JsonRpcResponse, ListToolsParams};

use crate::ServerContext;

/// Run the pipe transport to completion (until stdin closes).
pub async fn serve_stdio(ctx: &ServerContext) -> std::io::Result<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // stdin closed
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "pipe transport: unparseable frame, skipping");
                continue;
            }
        };

        let response = handle(ctx, request).await;
        let mut out = serde_json::to_string(&response)?;
        out.push('\n');
        stdout.write_all(out.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}

async fn handle(ctx: &ServerContext, req: JsonRpcRequest) -> JsonRpcResponse {
    match req.method.as_str() {
        "initialize" => JsonRpcResponse::ok(
            req.id,
            serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": { "tools": {} },
                "serverInfo": { "name": "db-mcp-bridge", "version": env!("CARGO_PKG_VERSION") },
            }),
        ),
        "tools/list" => {
            let params: ListToolsParams = req
                .params
                .clone()
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default();
            match ctx.list_tools(params.meta.as_ref(), None).await {
                Ok(result) => JsonRpcResponse::ok(
                    req.id,
                    serde_json::to_value(result).unwrap_or(serde_json::Value::Null),
                ),
                Err(e) => JsonRpcResponse::err(req.id, error_codes::INTERNAL_ERROR, e.to_string()),
            }
        }
        "tools/call" => {
            let params: CallToolParams = match req
                .params
                .clone()
                .ok_or(())
                .and_then(|v| serde_json::from_value(v).map_err(|_| ()))
            {
                Ok(p) => p,
                Err(_) => {
                    return JsonRpcResponse::err(
                        req.id,
                        error_codes::INVALID_PARAMS,
                        "tools/call requires {name, arguments}",
                    )
                }
            };
            let result = ctx
                .call_tool(&params.name, params.arguments, params.meta.as_ref(), None)
                .await;
            JsonRpcResponse::ok(
                req.id,
                serde_json::to_value(result).unwrap_or(serde_json::Value::Null),
            )
        }
        other => JsonRpcResponse::err(
            req.id,
            error_codes::METHOD_NOT_FOUND,
            format!("unknown method: {other}"),
        ),
    }
}
