use crate::output::print_json;
use crate::stubs;
use anyhow::Context;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;
use workflow_core::{config::OrchestratorConfig, Orchestrator};

pub struct SimulateArgs {
    pub transition: String,
    pub entity_id: Option<String>,
    pub entity: Option<PathBuf>,
    pub fail: Vec<String>,
    pub criteria: Vec<String>,
}

pub fn run(
    file: &Path,
    config: &OrchestratorConfig,
    args: SimulateArgs,
    json: bool,
) -> anyhow::Result<()> {
    let (table, warnings) = super::load_table(file, config)?;
    for w in &warnings {
        tracing::warn!(warning = %w, "definition entry skipped");
    }

    let entity: Value = match &args.entity {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read entity {}", path.display()))?;
            serde_json::from_str(&data)
                .with_context(|| format!("entity {} is not valid JSON", path.display()))?
        }
        None => Value::Object(Default::default()),
    };
    let entity_id = args
        .entity_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let failing: BTreeSet<String> = args.fail.into_iter().collect();
    let forced = stubs::parse_criteria(&args.criteria)?;
    let (processors, criteria) = stubs::registries_for(&table, &failing, &forced);

    let workflow = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("workflow");
    let orchestrator = Orchestrator::new(Arc::new(table), Arc::new(processors), Arc::new(criteria))
        .with_workflow(workflow)
        .with_unknown_transition(config.unknown_transition);

    let report = orchestrator.run_report(&entity_id, &entity, &args.transition);

    if json {
        print_json(&report)?;
    } else {
        println!("{}", report.next_state);
        if let Some(e) = &report.error {
            eprintln!("error: {e}");
        }
    }
    Ok(())
}
