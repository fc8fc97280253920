/// Cross-platform directory management for the devbox MCP server
///
/// Uses the `dirs` crate to handle platform-specific data directories
/// following OS conventions:
/// - Linux/Unix: XDG Base Directory Specification
/// - macOS: Apple directory guidelines
/// - Windows: Windows directory standards
use anyhow::{anyhow, Result};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "devbox-mcp";

/// Get the data directory for the server
///
/// Returns platform-specific data directory:
/// - Linux: `$XDG_DATA_HOME/devbox-mcp` or `~/.local/share/devbox-mcp`
/// - macOS: `~/Library/Application Support/devbox-mcp`
/// - Windows: `%LOCALAPPDATA%\devbox-mcp`
pub fn data_dir() -> Result<PathBuf> {
    let base_dir =
        dirs::data_local_dir().ok_or_else(|| anyhow!("Unable to determine data directory"))?;
    Ok(base_dir.join(APP_DIR))
}

/// Get the directory the server writes its own log files to
pub fn log_dir() -> Result<PathBuf> {
    Ok(data_dir()?.join("logs"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}
