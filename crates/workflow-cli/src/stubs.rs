//! Stand-in handlers for `workflow simulate`.
//!
//! Real processors and criteria live with the application that embeds the
//! orchestrator. For simulation every name referenced by the table gets a
//! stub: processors succeed unless listed as failing, criteria return the
//! forced value or `true`.

use anyhow::Context;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use workflow_core::{
    Criterion, CriterionError, CriterionRegistry, Processor, ProcessorError, ProcessorRegistry,
    TransitionTable,
};

pub struct StubProcessor {
    name: String,
    fail: bool,
}

impl Processor<Value> for StubProcessor {
    fn execute(&self, entity_id: &str, _entity: &Value) -> Result<(), ProcessorError> {
        if self.fail {
            return Err(ProcessorError::new(format!(
                "{} forced to fail for {entity_id}",
                self.name
            )));
        }
        Ok(())
    }
}

pub struct StubCriterion {
    result: bool,
}

impl Criterion<Value> for StubCriterion {
    fn evaluate(&self, _entity_id: &str, _entity: &Value) -> Result<bool, CriterionError> {
        Ok(self.result)
    }
}

/// Parse `NAME=true|false` pairs.
pub fn parse_criteria(pairs: &[String]) -> anyhow::Result<BTreeMap<String, bool>> {
    pairs
        .iter()
        .map(|pair| -> anyhow::Result<(String, bool)> {
            let (name, value) = pair
                .split_once('=')
                .with_context(|| format!("expected NAME=BOOL, got '{pair}'"))?;
            let value: bool = value
                .trim()
                .parse()
                .with_context(|| format!("criterion '{name}': expected true or false"))?;
            Ok((name.trim().to_string(), value))
        })
        .collect()
}

/// Register a stub for every handler the table references.
pub fn registries_for(
    table: &TransitionTable,
    failing: &BTreeSet<String>,
    forced: &BTreeMap<String, bool>,
) -> (ProcessorRegistry<Value>, CriterionRegistry<Value>) {
    let mut processors = ProcessorRegistry::new();
    for name in table.processor_names() {
        processors.register(
            name,
            StubProcessor {
                name: name.to_string(),
                fail: failing.contains(name),
            },
        );
    }

    let mut criteria = CriterionRegistry::new();
    for name in table.criterion_names() {
        let result = forced.get(name).copied().unwrap_or(true);
        criteria.register(name, StubCriterion { result });
    }

    for name in failing.iter().filter(|n| !processors.contains(n)) {
        tracing::warn!(processor = %name, "--fail names a processor the table never runs");
    }
    for name in forced.keys().filter(|n| !criteria.contains(n)) {
        tracing::warn!(criterion = %name, "--criterion names a criterion the table never evaluates");
    }

    (processors, criteria)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_criteria_pairs() {
        let parsed = parse_criteria(&[
            "IngestionSuccessCriterion=false".to_string(),
            "Other = true".to_string(),
        ])
        .unwrap();
        assert_eq!(parsed.get("IngestionSuccessCriterion"), Some(&false));
        assert_eq!(parsed.get("Other"), Some(&true));
    }

    #[test]
    fn parse_criteria_rejects_garbage() {
        assert!(parse_criteria(&["NoEquals".to_string()]).is_err());
        assert!(parse_criteria(&["C=maybe".to_string()]).is_err());
    }

    #[test]
    fn stubs_cover_table_handlers() {
        let table = TransitionTable::builder()
            .branch("go", "P", "C", "yes", "no")
            .build()
            .unwrap();
        let failing = BTreeSet::from(["P".to_string()]);
        let forced = BTreeMap::from([("C".to_string(), false)]);
        let (processors, criteria) = registries_for(&table, &failing, &forced);

        assert!(processors.get("P").unwrap().execute("e", &Value::Null).is_err());
        assert!(!criteria.get("C").unwrap().evaluate("e", &Value::Null).unwrap());
    }
}
