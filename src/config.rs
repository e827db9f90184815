//! Pass configuration
//!
//! Every field has a default, so a JSON document only needs to name what it
//! overrides:
//!
//! ```json
//! { "trace": true, "sources": ["fgets", "recv"] }
//! ```

use serde::{Deserialize, Serialize};

use crate::compiler::GuardError;

/// Input-producing functions whose arguments receive attacker-controlled data
pub const DEFAULT_SOURCES: &[&str] = &[
    "scanf",
    "fgets",
    "read",
    "gets",
    "sprintf",
    "vsprintf",
    "strncat",
    "copy_buf",
    "makepath",
    "_splitpath",
    "sscanf",
    "strlen",
    "strncpy",
    "strcpy",
    "read_chunk",
];

/// Library functions that write through a pointer argument
pub const DEFAULT_SINKS: &[&str] = &[
    "memcpy", "memmove", "memset", "strcpy", "strncpy", "strcat", "strncat", "sprintf", "vsprintf",
    "gets",
];

pub const DEFAULT_TAINT_PASS_NAME: &str = "taint-track";
pub const DEFAULT_BOUNDS_PASS_NAME: &str = "bounds-guard";

/// Configuration shared by the taint and bounds passes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Taint-introducing function names
    pub sources: Vec<String>,
    /// Write-targeting function names
    pub sinks: Vec<String>,
    /// Exact-case name matching (ASCII case is folded when false)
    pub case_sensitive: bool,
    /// Emit a debug trace of every taint/bounds fact discovered
    pub trace: bool,
    /// Registration name of the taint pass
    pub taint_pass_name: String,
    /// Registration name of the bounds-and-guard pass
    pub bounds_pass_name: String,
    /// Functions whose pointer parameters arrive raw rather than packed
    pub raw_abi_functions: Vec<String>,
    /// Run the IR verifier after every pass that changed a function
    pub verify_after_pass: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            sources: DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
            sinks: DEFAULT_SINKS.iter().map(|s| s.to_string()).collect(),
            case_sensitive: true,
            trace: false,
            taint_pass_name: DEFAULT_TAINT_PASS_NAME.to_string(),
            bounds_pass_name: DEFAULT_BOUNDS_PASS_NAME.to_string(),
            raw_abi_functions: vec!["main".to_string()],
            verify_after_pass: false,
        }
    }
}

impl GuardConfig {
    /// Parse a (possibly partial) JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self, GuardError> {
        serde_json::from_str(json).map_err(|e| GuardError::Config(e.to_string()))
    }

    pub fn to_json_string(&self) -> Result<String, GuardError> {
        serde_json::to_string_pretty(self).map_err(|e| GuardError::Config(e.to_string()))
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Whether `name` keeps the raw pointer ABI for its parameters
    pub fn is_raw_abi(&self, name: &str) -> bool {
        self.raw_abi_functions.iter().any(|f| f == name)
    }
}
