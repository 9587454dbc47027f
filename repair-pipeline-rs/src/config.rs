// repair-pipeline-rs/src/config.rs
// Pipeline configuration loaded from the environment.

use std::fmt;
use std::str::FromStr;

use config_rs::{get_env_var, load_dotenv};
use serde::{Deserialize, Serialize};

/// Which optional stage runs after a passing validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchPolicy {
    Refine,
    GenerateTests,
    /// Alternate between the two, starting with Refine.
    Alternate,
}

impl FromStr for BranchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "refine" => Ok(BranchPolicy::Refine),
            "tests" | "generate_tests" => Ok(BranchPolicy::GenerateTests),
            "alternate" => Ok(BranchPolicy::Alternate),
            other => Err(format!("unknown branch policy: {}", other)),
        }
    }
}

impl fmt::Display for BranchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchPolicy::Refine => write!(f, "refine"),
            BranchPolicy::GenerateTests => write!(f, "tests"),
            BranchPolicy::Alternate => write!(f, "alternate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub branch_policy: BranchPolicy,
    /// Validation passes allowed per escalation before explaining anyway.
    pub max_passes: u32,
    pub explanation_max_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            branch_policy: BranchPolicy::GenerateTests,
            max_passes: 1,
            explanation_max_chars: 800,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        let defaults = Self::default();

        Self {
            branch_policy: get_env_var("PIPELINE_BRANCH_POLICY", defaults.branch_policy),
            max_passes: get_env_var("PIPELINE_MAX_PASSES", defaults.max_passes).max(1),
            explanation_max_chars: get_env_var(
                "PIPELINE_EXPLANATION_MAX_CHARS",
                defaults.explanation_max_chars,
            ),
        }
    }
}
