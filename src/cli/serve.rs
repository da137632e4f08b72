use anyhow::Result;
use tracing::{info, warn};

use crate::config::Config;
use crate::mcp::server::McpServer;
use crate::mcp::state::ServiceState;

/// Start the MCP server with stdio transport
pub async fn serve_stdio(config: Config) -> Result<()> {
    info!("MCP server (stdio), data dir {}", config.data_dir().display());

    let state = ServiceState::open(config)?;
    if state.snapshot.current().is_empty() {
        // stdout carries the protocol
        warn!("No index loaded. Call coderag_process or run 'coderag process' first.");
    }

    McpServer::new(state).run().await
}
