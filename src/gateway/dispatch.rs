//! Tool dispatch
//!
//! Every call re-reads the policy and catalog, validates its fields,
//! authorizes, executes and formats. Validation and authorization failures
//! return before anything runs or is read.

use crate::gateway::tools::{
    builtin_tools, HealthCheckRequest, ReadFileRequest, ReadLogsRequest, RunCommandRequest,
    ToolResponse, NO_MATCHING_LOGS, TOOL_HEALTH, TOOL_READ_CONTRACT, TOOL_READ_LOGS, TOOL_RUN,
};
use crate::gateway::{
    logs, CommandGate, ConfigLoader, ExecutionResult, GatewayError, GatewayResult,
    GatewaySettings, LogLocator, LogTail, PathGuard, ProcessRunner,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Name of the catalog entry behind `health_check`
pub const HEALTH_COMMAND: &str = "health";

/// Routes tool calls to the gateway components
#[derive(Debug, Clone)]
pub struct Dispatcher {
    guard: PathGuard,
    loader: ConfigLoader,
    runner: ProcessRunner,
    logs: LogLocator,
}

impl Dispatcher {
    /// Create a dispatcher for the given settings
    pub fn new(settings: GatewaySettings) -> Self {
        let guard = PathGuard::new(&settings.root);
        Self {
            loader: ConfigLoader::new(guard.clone(), settings),
            runner: ProcessRunner::new(guard.root()),
            logs: LogLocator::new(guard.clone()),
            guard,
        }
    }

    /// Repository root
    pub fn root(&self) -> &Path {
        self.guard.root()
    }

    /// Run an allowlisted catalog command with quoted extra arguments
    pub async fn run_command(&self, request: RunCommandRequest) -> GatewayResult<ExecutionResult> {
        if request.command.is_empty() {
            return Err(GatewayError::MissingField("command"));
        }

        let catalog = self.loader.load_box()?;
        let policy = self.loader.load_policy()?;

        let run = CommandGate::authorize(&request.command, &policy, &catalog)?;
        let command_line = CommandGate::compose(run, &request.args);

        self.runner
            .run(&command_line, &catalog.runtime.env, policy.limits.max_runtime())
            .await
    }

    /// Run the catalog's `health` command
    pub async fn health_check(&self) -> GatewayResult<ExecutionResult> {
        let catalog = self.loader.load_box()?;
        let policy = self.loader.load_policy()?;

        if !CommandGate::is_allowlisted(HEALTH_COMMAND, &policy) {
            warn!(command = HEALTH_COMMAND, "Command not allowlisted");
            return Err(GatewayError::NotAllowlisted(HEALTH_COMMAND.to_string()));
        }

        let run = CommandGate::resolve_run(HEALTH_COMMAND, &catalog)
            .map_err(|_| GatewayError::MissingCommand(HEALTH_COMMAND.to_string()))?;

        self.runner
            .run(run, &catalog.runtime.env, policy.limits.max_runtime())
            .await
    }

    /// Tail every log matching the glob that the policy lets us read
    ///
    /// Files outside `allow.read_paths` are skipped silently.
    pub fn read_logs(&self, request: ReadLogsRequest) -> GatewayResult<Vec<LogTail>> {
        if request.glob.is_empty() {
            return Err(GatewayError::MissingField("glob"));
        }

        let policy = self.loader.load_policy()?;
        let max_bytes = policy.limits.max_log_bytes();
        let tail_lines = logs::clamp_tail_lines(request.tail_lines);

        let mut tails = Vec::new();
        for path in self.logs.find(&request.glob)? {
            let rel = self.logs.display_path(&path);
            if !self.guard.is_read_allowed(&path, &policy) {
                debug!(path = %rel, "Skipping log outside read paths");
                continue;
            }

            let content = logs::tail(&path, tail_lines, max_bytes, request.contains.as_deref())?;
            tails.push(LogTail { path: rel, content });
        }

        info!(glob = %request.glob, files = tails.len(), "Read logs");
        Ok(tails)
    }

    /// Read an allowlisted file no larger than the byte cap
    pub fn read_file(&self, request: ReadFileRequest) -> GatewayResult<String> {
        if request.path.is_empty() {
            return Err(GatewayError::MissingField("path"));
        }

        let path = self.guard.resolve(&request.path)?;
        let policy = self.loader.load_policy()?;

        if !self.guard.is_read_allowed(&path, &policy) {
            warn!(path = %request.path, "Read denied by policy");
            return Err(GatewayError::NotAllowed(request.path));
        }

        let limit = policy.limits.max_log_bytes();
        let size = std::fs::metadata(&path)?.len();
        if size > limit {
            warn!(path = %request.path, size, limit, "File too large to read");
            return Err(GatewayError::TooLarge { size, limit });
        }

        let mut bytes = Vec::new();
        File::open(&path)?.take(limit).read_to_end(&mut bytes)?;
        info!(path = %request.path, bytes = bytes.len(), "Read file");
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Tool listing: the repository's tool document if present, else the built-in catalog
    pub fn list_tools(&self) -> GatewayResult<Vec<Value>> {
        let path = self.loader.tools_path()?;
        if !path.is_file() {
            return Ok(builtin_tools());
        }

        let content = std::fs::read_to_string(&path)?;
        let document: Value =
            serde_json::from_str(&content).map_err(|e| GatewayError::config(&path, e))?;

        Ok(document
            .get("tools")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Route a tool call by name and format its result as text
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> GatewayResult<ToolResponse> {
        let arguments = arguments.unwrap_or_else(|| Value::Object(Default::default()));
        debug!(tool = %name, "Tool call");

        match name {
            TOOL_RUN => {
                let result = self.run_command(parse_args(arguments)?).await?;
                Ok(ToolResponse {
                    text: format!(
                        "exit_code={}\n\nSTDOUT:\n{}\n\nSTDERR:\n{}",
                        result.exit_code, result.stdout, result.stderr
                    ),
                    is_error: !result.success(),
                })
            }
            TOOL_HEALTH => {
                let _: HealthCheckRequest = parse_args(arguments)?;
                let result = self.health_check().await?;
                let text = if !result.stdout.is_empty() {
                    result.stdout.clone()
                } else {
                    result.stderr.clone()
                };
                Ok(ToolResponse {
                    text,
                    is_error: !result.success(),
                })
            }
            TOOL_READ_LOGS => {
                let tails = self.read_logs(parse_args(arguments)?)?;
                if tails.is_empty() {
                    return Ok(ToolResponse::text(NO_MATCHING_LOGS));
                }

                let text = tails
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n\n");
                Ok(ToolResponse::text(text))
            }
            TOOL_READ_CONTRACT => Ok(ToolResponse::text(self.read_file(parse_args(arguments)?)?)),
            _ => Err(GatewayError::UnknownTool(name.to_string())),
        }
    }
}

fn parse_args<T: DeserializeOwned>(arguments: Value) -> GatewayResult<T> {
    Ok(serde_json::from_value(arguments)?)
}
