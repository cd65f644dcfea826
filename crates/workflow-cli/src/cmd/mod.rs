pub mod check;
pub mod simulate;
pub mod table;

use anyhow::Context;
use std::path::Path;
use workflow_core::{
    config::{OrchestratorConfig, WarnLevel},
    definition::{DefinitionWarning, TableDefinition, WorkflowDefinition},
    TransitionTable,
};

pub fn load_config(path: Option<&Path>) -> anyhow::Result<OrchestratorConfig> {
    let config = OrchestratorConfig::load_or_default(path)
        .with_context(|| format!("failed to load config {}", display_opt(path)))?;
    for w in config.validate() {
        match w.level {
            WarnLevel::Error => anyhow::bail!("invalid config: {}", w.message),
            WarnLevel::Warning => tracing::warn!("config: {}", w.message),
        }
    }
    Ok(config)
}

/// Build a table from a definition file: `.json` is a workflow document,
/// anything else a table document.
pub fn load_table(
    path: &Path,
    config: &OrchestratorConfig,
) -> anyhow::Result<(TransitionTable, Vec<DefinitionWarning>)> {
    if is_workflow_document(path) {
        let def = WorkflowDefinition::load(path)
            .with_context(|| format!("failed to read workflow {}", path.display()))?;
        def.to_table(&config.false_branch_state)
            .with_context(|| format!("invalid workflow {}", path.display()))
    } else {
        let table = TableDefinition::load(path)
            .and_then(|def| def.to_table())
            .with_context(|| format!("invalid table definition {}", path.display()))?;
        Ok((table, Vec::new()))
    }
}

pub fn is_workflow_document(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}

fn display_opt(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults)".to_string())
}
