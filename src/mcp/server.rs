// MCP server implementation

use std::collections::HashMap;
use std::io::{self, BufRead, Write};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::state::ServiceState;
use super::tools;

/// JSON-RPC message
#[derive(Debug, Serialize, Deserialize)]
struct JsonRpcMessage {
    jsonrpc: String,
    id: Option<Value>,
    method: Option<String>,
    params: Option<Value>,
}

/// MCP tool definition
#[derive(Debug, Serialize, Deserialize)]
struct Tool {
    name: String,
    description: String,
    #[serde(rename = "inputSchema")]
    input_schema: Value,
}

/// MCP server info
#[derive(Debug, Serialize, Deserialize)]
struct ServerInfo {
    name: String,
    version: String,
}

/// MCP initialize result
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeResult {
    protocol_version: String,
    capabilities: Value,
    server_info: ServerInfo,
}

fn success(id: Option<Value>, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn failure(id: Option<Value>, code: i32, message: String) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}

/// MCP server over stdio; clones share the same state.
#[derive(Clone)]
pub struct McpServer {
    state: ServiceState,
}

impl McpServer {
    pub fn new(state: ServiceState) -> Self {
        Self { state }
    }

    /// Run the MCP server until stdin closes
    pub async fn run(self) -> Result<()> {
        info!("Starting MCP server");

        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        // stdin is blocking; read it on its own thread
        std::thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error reading from stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let writer = tokio::spawn(write_responses(out_rx, io::stdout()));
        self.serve(line_rx, out_tx).await;
        writer.await??;

        info!("stdin closed, MCP server stopping");
        Ok(())
    }

    /// Handle every line on its own task so a long crawl or answer never
    /// holds up other requests. Responses are sent in completion order;
    /// returns once `lines` closes and every in-flight request has replied.
    pub async fn serve(
        self,
        mut lines: mpsc::UnboundedReceiver<String>,
        out: mpsc::UnboundedSender<Value>,
    ) {
        let mut tasks = JoinSet::new();

        while let Some(line) = lines.recv().await {
            if line.trim().is_empty() {
                continue;
            }
            debug!("Received: {}", line);

            let server = self.clone();
            let out = out.clone();
            tasks.spawn(async move {
                let response = match server.handle_message(&line).await {
                    Ok(response) => response,
                    Err(e) => {
                        error!("Error handling message: {}", e);
                        Some(failure(None, -32700, format!("Parse error: {}", e)))
                    }
                };
                if let Some(response) = response {
                    if out.send(response).is_err() {
                        warn!("Response writer closed, dropping reply");
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Request task failed: {}", e);
            }
        }
    }

    /// Handle one JSON-RPC line. Notifications (no id) get no reply.
    async fn handle_message(&self, message: &str) -> Result<Option<Value>> {
        let msg: JsonRpcMessage = serde_json::from_str(message)?;
        let Some(id) = msg.id else {
            debug!("Notification: {:?}", msg.method);
            return Ok(None);
        };
        let id = Some(id);

        let response = match msg.method.as_deref() {
            Some("initialize") => {
                let result = InitializeResult {
                    protocol_version: "2024-11-05".to_string(),
                    capabilities: json!({ "tools": {} }),
                    server_info: ServerInfo {
                        name: "coderag".to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                };
                success(id, serde_json::to_value(result)?)
            }

            Some("tools/list") => success(id, json!({ "tools": list_tools() })),

            Some("tools/call") => match &msg.params {
                Some(params) => match self.call_tool(params).await {
                    Ok(result) => success(id, result),
                    Err(e) => {
                        warn!("Tool call failed: {:#}", e);
                        failure(id, -32000, format!("{:#}", e))
                    }
                },
                None => failure(id, -32602, "Invalid params".to_string()),
            },

            Some("shutdown") => {
                info!("Received shutdown request");
                success(id, Value::Null)
            }

            _ => failure(id, -32601, "Method not found".to_string()),
        };

        Ok(Some(response))
    }

    /// Dispatch a tools/call request
    async fn call_tool(&self, params: &Value) -> Result<Value> {
        let tool_name = params["name"]
            .as_str()
            .ok_or_else(|| anyhow!("Missing tool name"))?;
        let args: HashMap<String, Value> = match params.get("arguments") {
            None | Some(Value::Null) => HashMap::new(),
            Some(Value::Object(map)) => map.clone().into_iter().collect(),
            Some(_) => return Err(anyhow!("Invalid arguments")),
        };

        let state = &self.state;
        match tool_name {
            "coderag_process" => tools::process(state, &args).await,
            "coderag_process_requirements" => tools::process_requirements(state, &args).await,
            "coderag_query" => tools::query(state, &args).await,
            "coderag_similarity_matrix" => tools::similarity_matrix(state, &args).await,
            "coderag_dependency_graph" => tools::dependency_graph(state, &args).await,
            "coderag_ask" => tools::ask(state, &args).await,
            "coderag_stats" => tools::stats(state, &args).await,
            _ => Err(anyhow!("Unknown tool: {}", tool_name)),
        }
    }
}

/// Single writer so concurrent replies never interleave on one line
async fn write_responses<W: Write>(
    mut responses: mpsc::UnboundedReceiver<Value>,
    mut writer: W,
) -> Result<()> {
    while let Some(response) = responses.recv().await {
        writeln!(writer, "{}", serde_json::to_string(&response)?)?;
        writer.flush()?;
    }
    Ok(())
}

/// List available tools
fn list_tools() -> Vec<Tool> {
    vec![
        Tool {
            name: "coderag_process".to_string(),
            description: "Crawl a root directory of repositories, embed every code element and rebuild the dependency graphs".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "root_dir": {
                        "type": "string",
                        "description": "Directory whose immediate subdirectories are repositories"
                    },
                    "requirements_csv": {
                        "type": "string",
                        "description": "Optional CSV with 'Project ID' and 'Description' columns"
                    }
                },
                "required": ["root_dir"]
            }),
        },
        Tool {
            name: "coderag_process_requirements".to_string(),
            description: "Embed a requirements CSV into the current index without re-crawling".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "requirements_csv": {
                        "type": "string",
                        "description": "CSV with 'Project ID' and 'Description' columns"
                    }
                },
                "required": ["requirements_csv"]
            }),
        },
        Tool {
            name: "coderag_query".to_string(),
            description: "Rank code elements and requirements against a natural-language query".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Natural-language query"
                    },
                    "top_k": {
                        "type": "integer",
                        "description": "Number of results"
                    },
                    "mode": {
                        "type": "string",
                        "enum": ["flat", "layered"],
                        "default": "flat",
                        "description": "Flat top-k or repository-diverse layered views"
                    },
                    "min_repos": {
                        "type": "integer",
                        "description": "Distinct repositories required in layered mode"
                    }
                },
                "required": ["query"]
            }),
        },
        Tool {
            name: "coderag_similarity_matrix".to_string(),
            description: "Top matching code elements for every requirement".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "top_n": {
                        "type": "integer",
                        "description": "Matches per requirement"
                    }
                }
            }),
        },
        Tool {
            name: "coderag_dependency_graph".to_string(),
            description: "File dependency graph restricted to the given files or result keys".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file_paths": {
                        "type": "array",
                        "items": { "type": "string" }
                    },
                    "keys": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Embedding keys from a previous query"
                    }
                }
            }),
        },
        Tool {
            name: "coderag_ask".to_string(),
            description: "Answer a question from graph-expanded, summarized code context".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Question about the indexed code"
                    },
                    "top_k": {
                        "type": "integer",
                        "description": "Initial retrieval size"
                    },
                    "max_depth": {
                        "type": "integer",
                        "description": "Graph hops to expand from the initial files"
                    }
                },
                "required": ["query"]
            }),
        },
        Tool {
            name: "coderag_stats".to_string(),
            description: "Get index statistics".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::index::snapshot::{IndexSnapshot, SnapshotHandle};
    use crate::provider::mock::{MockEmbedder, MockGenerator};
    use crate::provider::{GenerationProvider, ProviderError};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    fn server() -> McpServer {
        McpServer::new(ServiceState::with_providers(
            Config::default(),
            SnapshotHandle::new(IndexSnapshot::default()),
            Arc::new(MockEmbedder::constant(vec![1.0])),
            Arc::new(MockGenerator::default()),
        ))
    }

    async fn send(server: &McpServer, message: Value) -> Option<Value> {
        server.handle_message(&message.to_string()).await.unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let response = send(
            &server(),
            json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }),
        )
        .await
        .unwrap();
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["serverInfo"]["name"], "coderag");
        assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
    }

    #[tokio::test]
    async fn test_tools_list() {
        let response = send(&server(), json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }))
            .await
            .unwrap();
        let names: Vec<&str> = response["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names.len(), 7);
        assert!(names.contains(&"coderag_ask"));
        assert!(response["result"]["tools"][0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn test_stats_call_on_empty_index() {
        let response = send(
            &server(),
            json!({
                "jsonrpc": "2.0", "id": "s", "method": "tools/call",
                "params": { "name": "coderag_stats" }
            }),
        )
        .await
        .unwrap();
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        let stats: Value = serde_json::from_str(text).unwrap();
        assert_eq!(stats["files"], 0);
    }

    #[tokio::test]
    async fn test_tool_error_keeps_id() {
        let response = send(
            &server(),
            json!({
                "jsonrpc": "2.0", "id": 7, "method": "tools/call",
                "params": { "name": "coderag_process", "arguments": {} }
            }),
        )
        .await
        .unwrap();
        assert_eq!(response["id"], 7);
        assert!(response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("root_dir is required"));
    }

    #[tokio::test]
    async fn test_unknown_method_and_notifications() {
        let server = server();
        let response = send(&server, json!({ "jsonrpc": "2.0", "id": 3, "method": "nope" }))
            .await
            .unwrap();
        assert_eq!(response["error"]["code"], -32601);

        let none = send(
            &server,
            json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
        )
        .await;
        assert!(none.is_none());
    }

    /// Holds every generation until the gate opens
    struct GatedGenerator {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl GenerationProvider for GatedGenerator {
        async fn generate(&self, _prompt: &str, _model: &str) -> Result<String, ProviderError> {
            let _permit = self.gate.acquire().await.map_err(|e| ProviderError::Malformed(e.to_string()))?;
            Ok("answer".to_string())
        }
    }

    async fn next_reply(out: &mut mpsc::UnboundedReceiver<Value>) -> Value {
        tokio::time::timeout(Duration::from_secs(5), out.recv())
            .await
            .expect("reply timed out")
            .expect("writer channel closed")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_call_does_not_block_other_requests() {
        let gate = Arc::new(Semaphore::new(0));
        let server = McpServer::new(ServiceState::with_providers(
            Config::default(),
            SnapshotHandle::new(IndexSnapshot::default()),
            Arc::new(MockEmbedder::constant(vec![1.0])),
            Arc::new(GatedGenerator { gate: gate.clone() }),
        ));

        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let serving = tokio::spawn(server.serve(line_rx, out_tx));

        let ask = json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": { "name": "coderag_ask", "arguments": { "query": "what?" } }
        });
        let stats = json!({
            "jsonrpc": "2.0", "id": 2, "method": "tools/call",
            "params": { "name": "coderag_stats" }
        });
        line_tx.send(ask.to_string()).unwrap();
        line_tx.send(stats.to_string()).unwrap();

        let first = next_reply(&mut out_rx).await;
        assert_eq!(first["id"], 2);

        gate.add_permits(10);
        let second = next_reply(&mut out_rx).await;
        assert_eq!(second["id"], 1);
        assert!(second["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("answer"));

        drop(line_tx);
        serving.await.unwrap();
        assert!(out_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_responses_are_written_one_per_line() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(json!({ "id": 1 })).unwrap();
        tx.send(json!({ "id": 2 })).unwrap();
        drop(tx);

        let mut buffer = Vec::new();
        write_responses(rx, &mut buffer).await.unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![r#"{"id":1}"#, r#"{"id":2}"#]);
    }

    #[tokio::test]
    async fn test_malformed_json_is_an_error() {
        assert!(server().handle_message("{not json").await.is_err());
    }
}
