// MCP stdio service

pub mod server;
pub mod state;
pub mod tools;
