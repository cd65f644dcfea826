use crate::output::print_json;
use anyhow::Context;
use serde::Serialize;
use std::path::Path;
use workflow_core::{
    config::OrchestratorConfig,
    definition::{load_workflow_dir, DefinitionWarning},
};

#[derive(Serialize)]
struct CheckReport {
    entity: String,
    active: bool,
    transitions: usize,
    warnings: Vec<DefinitionWarning>,
}

pub fn run(path: Option<&Path>, config: &OrchestratorConfig, json: bool) -> anyhow::Result<()> {
    let path = path
        .or(config.workflows_dir.as_deref())
        .context("no path given and no workflows_dir configured")?;

    let mut reports = Vec::new();
    if path.is_dir() {
        let workflows = load_workflow_dir(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if workflows.is_empty() {
            anyhow::bail!("no workflow documents found in {}", path.display());
        }
        for (entity, def) in workflows {
            let (table, warnings) = def
                .to_table(&config.false_branch_state)
                .with_context(|| format!("invalid workflow '{entity}'"))?;
            reports.push(CheckReport {
                entity,
                active: def.active,
                transitions: table.len(),
                warnings,
            });
        }
    } else {
        let (table, warnings) = super::load_table(path, config)?;
        let entity = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("workflow")
            .to_string();
        reports.push(CheckReport {
            entity,
            active: true,
            transitions: table.len(),
            warnings,
        });
    }

    if json {
        print_json(&reports)?;
    } else {
        for r in &reports {
            let status = if r.active { "" } else { " (inactive)" };
            println!(
                "{}{}: {} transition(s), {} warning(s)",
                r.entity,
                status,
                r.transitions,
                r.warnings.len()
            );
            for w in &r.warnings {
                println!("  warning: {w}");
            }
        }
    }

    let empty: Vec<&str> = reports
        .iter()
        .filter(|r| r.transitions == 0)
        .map(|r| r.entity.as_str())
        .collect();
    if !empty.is_empty() {
        anyhow::bail!("no runnable transitions in: {}", empty.join(", "));
    }
    Ok(())
}
