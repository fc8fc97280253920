//! Policy-gated execution and read access
//!
//! This module enforces a declarative policy over three kinds of access:
//! running allowlisted catalog commands, tailing allowlisted logs, and
//! reading allowlisted files. Nothing is cached between calls.

pub mod command_gate;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod logs;
pub mod path_guard;
pub mod runner;
pub mod tools;

// Re-export commonly used types
pub use self::command_gate::{quote_arg, CommandGate, ShellConfig};
pub use self::config::{
    AllowRules, BoxConfig, CommandSpec, ConfigLoader, DocumentFormat, GatewaySettings, Limits,
    PolicyDocument, PolicyMode, RuntimeConfig,
};
pub use self::dispatch::Dispatcher;
pub use self::errors::{GatewayError, GatewayResult};
pub use self::logs::{LogLocator, LogTail};
pub use self::path_guard::{glob_match, PathGuard};
pub use self::runner::{ExecutionResult, ProcessRunner};
pub use self::tools::{
    HealthCheckRequest, ReadFileRequest, ReadLogsRequest, RunCommandRequest, ToolResponse,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        CommandGate, Dispatcher, ExecutionResult, GatewayError, GatewayResult, GatewaySettings,
        LogLocator, PathGuard, PolicyDocument, ProcessRunner,
    };
}
