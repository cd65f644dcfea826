use crate::error::{Result, WorkflowError};
use crate::names::{is_valid_name, DEFAULT_FALSE_STATE, ERROR_STATE};
use crate::orchestrator::UnknownTransitionPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// OrchestratorConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub unknown_transition: UnknownTransitionPolicy,
    /// State a branching action takes when its criterion does not hold.
    #[serde(default = "default_false_branch_state")]
    pub false_branch_state: String,
    /// Directory of per-entity workflow documents (`<Entity>.json`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflows_dir: Option<PathBuf>,
}

fn default_version() -> u32 {
    1
}

fn default_false_branch_state() -> String {
    DEFAULT_FALSE_STATE.to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            unknown_transition: UnknownTransitionPolicy::default(),
            false_branch_state: default_false_branch_state(),
            workflows_dir: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_yaml_str(data: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(WorkflowError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&data)
    }

    /// Load `path` when given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.version != 1 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!("unsupported config version {}", self.version),
            });
        }

        if !is_valid_name(&self.false_branch_state) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "false_branch_state '{}' is not a valid state name",
                    self.false_branch_state
                ),
            });
        } else if self.false_branch_state == ERROR_STATE {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "false_branch_state is '{ERROR_STATE}'; a false criterion will look like a failure"
                ),
            });
        }

        if let Some(dir) = &self.workflows_dir {
            if !dir.is_dir() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("workflows_dir '{}' does not exist", dir.display()),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
