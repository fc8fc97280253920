//! Declarative documents: the command catalog and the policy
//!
//! Both documents are re-read from disk on every tool call so that a policy
//! edit takes effect on the very next request.

use crate::gateway::{GatewayError, GatewayResult, PathGuard};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default byte cap for log and file reads
pub const DEFAULT_MAX_LOG_BYTES: u64 = 2_000_000;

/// Default wall-clock limit for commands, in seconds
pub const DEFAULT_MAX_RUNTIME_SECONDS: u64 = 900;

/// Command catalog (`.box/box.yaml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoxConfig {
    /// Command name -> run template
    #[serde(default)]
    pub commands: BTreeMap<String, CommandSpec>,

    /// Runtime settings for spawned commands
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// A single catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Shell command line template
    pub run: String,

    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,
}

/// Runtime section of the catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Variables merged into the ambient environment of spawned commands
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Policy document (`.box/policies.yaml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Declared operating mode. Parsed but not enforced.
    #[serde(default)]
    pub mode: Option<PolicyMode>,

    /// Allow rules; absent means deny everything
    #[serde(default)]
    pub allow: AllowRules,

    /// Numeric limits
    #[serde(default)]
    pub limits: Limits,
}

/// Operating mode declared by a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyMode {
    Readonly,
    SafeWrite,
    Admin,
    /// Any other declared value; kept so the rest of the policy still loads
    #[serde(other)]
    Other,
}

/// `allow` section of the policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllowRules {
    /// Command names that may be run
    #[serde(default)]
    pub commands: Vec<String>,

    /// Paths, directory prefixes or globs that may be read
    #[serde(default)]
    pub read_paths: Vec<String>,

    /// Paths that may be written. Parsed but not enforced.
    #[serde(default)]
    pub write_paths: Vec<String>,
}

/// `limits` section of the policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Limits {
    /// Byte cap for log tails and file reads
    #[serde(default)]
    pub max_log_bytes_to_read: Option<f64>,

    /// Wall-clock limit for commands, in seconds; fractions are allowed
    #[serde(default)]
    pub max_runtime_seconds: Option<f64>,
}

impl Limits {
    /// Effective byte cap. Fractions round down, negatives become zero.
    pub fn max_log_bytes(&self) -> u64 {
        match self.max_log_bytes_to_read {
            Some(bytes) if bytes.is_finite() => bytes.max(0.0) as u64,
            _ => DEFAULT_MAX_LOG_BYTES,
        }
    }

    /// Effective command timeout. Non-finite values fall back to the default.
    pub fn max_runtime(&self) -> Duration {
        self.max_runtime_seconds
            .and_then(|seconds| Duration::try_from_secs_f64(seconds.max(0.0)).ok())
            .unwrap_or(Duration::from_secs(DEFAULT_MAX_RUNTIME_SECONDS))
    }
}

/// Serialization format of a declarative document, picked by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Toml,
    Json,
}

impl DocumentFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Parse a document body. An empty body yields the type's default.
    pub fn parse<T: DeserializeOwned + Default>(self, content: &str) -> Result<T, String> {
        if content.trim().is_empty() {
            return Ok(T::default());
        }

        match self {
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

/// Read and parse a document from disk
pub fn load_document<T: DeserializeOwned + Default>(path: &Path) -> GatewayResult<T> {
    let format = DocumentFormat::from_path(path)
        .ok_or_else(|| GatewayError::config(path, "unsupported document extension"))?;

    let content =
        std::fs::read_to_string(path).map_err(|e| GatewayError::config(path, e))?;

    format
        .parse(&content)
        .map_err(|message| GatewayError::config(path, message))
}

/// Where the gateway finds its root and documents
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Repository root
    pub root: PathBuf,

    /// Catalog document, relative to the root
    pub box_file: PathBuf,

    /// Policy document, relative to the root
    pub policy_file: PathBuf,

    /// Tool listing document, relative to the root
    pub tools_file: PathBuf,
}

impl GatewaySettings {
    /// Settings rooted at `root` with the default document locations
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            box_file: PathBuf::from(".box/box.yaml"),
            policy_file: PathBuf::from(".box/policies.yaml"),
            tools_file: PathBuf::from(".box/mcp/server.json"),
        }
    }

    /// Override the catalog location
    pub fn with_box_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.box_file = path.into();
        self
    }

    /// Override the policy location
    pub fn with_policy_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.policy_file = path.into();
        self
    }

    /// Override the tool listing location
    pub fn with_tools_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.tools_file = path.into();
        self
    }
}

/// Loads the catalog and policy for a single request
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    guard: PathGuard,
    settings: GatewaySettings,
}

impl ConfigLoader {
    /// Create a loader for the given settings
    pub fn new(guard: PathGuard, settings: GatewaySettings) -> Self {
        Self { guard, settings }
    }

    /// Load the command catalog
    pub fn load_box(&self) -> GatewayResult<BoxConfig> {
        let path = self.guard.resolve(&self.settings.box_file)?;
        let config: BoxConfig = load_document(&path)?;
        debug!(path = %path.display(), commands = config.commands.len(), "Loaded command catalog");
        Ok(config)
    }

    /// Load the policy document
    pub fn load_policy(&self) -> GatewayResult<PolicyDocument> {
        let path = self.guard.resolve(&self.settings.policy_file)?;
        let policy: PolicyDocument = load_document(&path)?;
        debug!(
            path = %path.display(),
            commands = policy.allow.commands.len(),
            read_paths = policy.allow.read_paths.len(),
            "Loaded policy"
        );
        Ok(policy)
    }

    /// Absolute location of the tool listing document
    pub fn tools_path(&self) -> GatewayResult<PathBuf> {
        self.guard.resolve(&self.settings.tools_file)
    }
}
