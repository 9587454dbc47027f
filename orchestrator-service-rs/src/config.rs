// orchestrator-service-rs/src/config.rs
// Loop budget and sandbox timeout for repair sessions.

use std::time::Duration;

use config_rs::{get_duration_secs, get_env_var, load_dotenv};
use serde::Serialize;

pub const DEFAULT_MAX_ITERATIONS: u32 = 10;
pub const DEFAULT_EXECUTION_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrchestratorConfig {
    /// Repair attempts allowed per session unless the caller overrides it.
    pub max_iterations: u32,
    /// Timeout for every sandbox run, including the pipeline's validations.
    pub execution_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            execution_timeout: Duration::from_secs(DEFAULT_EXECUTION_TIMEOUT_SECS),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        let max_iterations = get_env_var("REPAIR_MAX_ITERATIONS", DEFAULT_MAX_ITERATIONS);
        if max_iterations == 0 {
            log::warn!("REPAIR_MAX_ITERATIONS must be positive, using 1");
        }

        Self {
            max_iterations: max_iterations.max(1),
            execution_timeout: get_duration_secs(
                "REPAIR_EXECUTION_TIMEOUT_SECS",
                DEFAULT_EXECUTION_TIMEOUT_SECS,
            ),
        }
    }
}
