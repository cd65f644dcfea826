use crate::output::{print_json, print_table};
use serde::Serialize;
use std::path::Path;
use workflow_core::{
    config::OrchestratorConfig, definition::DefinitionWarning, NextState, TransitionTable,
};

#[derive(Serialize)]
struct TableOutput<'a> {
    transitions: &'a TransitionTable,
    warnings: &'a [DefinitionWarning],
}

pub fn run(file: &Path, config: &OrchestratorConfig, json: bool) -> anyhow::Result<()> {
    let (table, warnings) = super::load_table(file, config)?;

    if json {
        return print_json(&TableOutput {
            transitions: &table,
            warnings: &warnings,
        });
    }

    if table.is_empty() {
        println!("No transitions defined in {}", file.display());
    } else {
        let rows: Vec<Vec<String>> = table
            .iter()
            .flat_map(|(transition, actions)| {
                actions.iter().map(move |action| {
                    let (criterion, next) = match &action.next {
                        NextState::Fixed { state } => ("-".to_string(), state.clone()),
                        NextState::Branch {
                            criterion,
                            on_true,
                            on_false,
                        } => (criterion.clone(), format!("{on_true} / {on_false}")),
                        NextState::Unchanged => ("-".to_string(), "(unchanged)".to_string()),
                    };
                    vec![
                        transition.to_string(),
                        action.processor().unwrap_or("-").to_string(),
                        criterion,
                        next,
                    ]
                })
            })
            .collect();
        print_table(&["TRANSITION", "PROCESSOR", "CRITERION", "NEXT"], &rows);
    }

    for w in &warnings {
        eprintln!("warning: {w}");
    }
    Ok(())
}
