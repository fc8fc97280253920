//! Command allowlisting and command line composition

use crate::gateway::{BoxConfig, GatewayError, GatewayResult, PolicyDocument};
use tracing::{debug, warn};

/// Shell used to run composed command lines
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Shell executable
    pub command: String,
    /// Arguments placed before the command line
    pub args: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        if cfg!(windows) {
            Self {
                command: "cmd".to_string(),
                args: vec!["/C".to_string()],
            }
        } else {
            Self {
                command: "sh".to_string(),
                args: vec!["-c".to_string()],
            }
        }
    }
}

/// Quote one argument so the shell sees it as a single literal word
pub fn quote_arg(arg: &str) -> String {
    if cfg!(windows) {
        format!("\"{}\"", arg.replace('"', "\"\""))
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Decides which catalog commands may run
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandGate;

impl CommandGate {
    /// Whether `name` appears in `allow.commands`
    pub fn is_allowlisted(name: &str, policy: &PolicyDocument) -> bool {
        policy.allow.commands.iter().any(|c| c == name)
    }

    /// Run template for `name`; an allowlisted name missing from the catalog is an error
    pub fn resolve_run<'a>(name: &str, catalog: &'a BoxConfig) -> GatewayResult<&'a str> {
        catalog
            .commands
            .get(name)
            .map(|spec| spec.run.as_str())
            .filter(|run| !run.trim().is_empty())
            .ok_or_else(|| GatewayError::UnknownCommand(name.to_string()))
    }

    /// Authorize `name` against the policy and return its run template
    pub fn authorize<'a>(
        name: &str,
        policy: &PolicyDocument,
        catalog: &'a BoxConfig,
    ) -> GatewayResult<&'a str> {
        if !Self::is_allowlisted(name, policy) {
            warn!(command = %name, "Command not allowlisted");
            return Err(GatewayError::NotAllowlisted(name.to_string()));
        }

        let run = Self::resolve_run(name, catalog)?;
        debug!(command = %name, run = %run, "Command authorized");
        Ok(run)
    }

    /// Append quoted arguments to a run template
    ///
    /// Only the template controls shell structure; each argument stays one word.
    pub fn compose(run: &str, args: &[String]) -> String {
        std::iter::once(run.to_string())
            .chain(args.iter().map(|a| quote_arg(a)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
