//! devbox MCP server
//!
//! Exposes a repository's allowlisted commands, logs and files to MCP
//! clients, refusing anything outside the repository's declared policy.

pub mod gateway;
pub mod platform_dirs;
pub mod server;
