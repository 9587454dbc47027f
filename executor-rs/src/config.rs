// executor-rs/src/config.rs
// Sandbox configuration loaded from the environment.

use std::fmt;
use std::str::FromStr;

use config_rs::{get_env_var, load_dotenv};

/// How code is isolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxMode {
    /// One throwaway container per run, no network.
    Docker,
    /// A host interpreter on a temporary script file.
    Local,
}

impl FromStr for SandboxMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(SandboxMode::Docker),
            "local" => Ok(SandboxMode::Local),
            other => Err(format!("unknown sandbox mode: {}", other)),
        }
    }
}

impl fmt::Display for SandboxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SandboxMode::Docker => write!(f, "docker"),
            SandboxMode::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SandboxConfig {
    pub mode: SandboxMode,
    pub docker_bin: String,
    pub docker_image: String,
    pub python_bin: String,
    pub memory_limit: String,
    pub cpu_limit: String,
    /// Captured stdout and stderr are each cut to this many bytes.
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            mode: SandboxMode::Docker,
            docker_bin: "docker".to_string(),
            docker_image: "python:3.11-slim".to_string(),
            python_bin: "python3".to_string(),
            memory_limit: "256m".to_string(),
            cpu_limit: "1.0".to_string(),
            max_output_bytes: 64 * 1024,
        }
    }
}

impl SandboxConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        let defaults = Self::default();

        Self {
            mode: get_env_var("SANDBOX_MODE", defaults.mode),
            docker_bin: get_env_var("SANDBOX_DOCKER_BIN", defaults.docker_bin),
            docker_image: get_env_var("SANDBOX_DOCKER_IMAGE", defaults.docker_image),
            python_bin: get_env_var("SANDBOX_PYTHON_BIN", defaults.python_bin),
            memory_limit: get_env_var("SANDBOX_MEMORY_LIMIT", defaults.memory_limit),
            cpu_limit: get_env_var("SANDBOX_CPU_LIMIT", defaults.cpu_limit),
            max_output_bytes: get_env_var("SANDBOX_MAX_OUTPUT_BYTES", defaults.max_output_bytes),
        }
    }

    /// Run scripts with a host interpreter.
    pub fn local(python_bin: impl Into<String>) -> Self {
        Self {
            mode: SandboxMode::Local,
            python_bin: python_bin.into(),
            ..Self::default()
        }
    }
}
