//! Declarative sources for a [`TransitionTable`].
//!
//! Two formats are understood:
//!
//! - [`TableDefinition`]: a direct `transition → [action]` document, usually
//!   YAML, that maps one-to-one onto the table.
//! - [`WorkflowDefinition`]: the per-entity workflow document (`states` →
//!   `transitions` → `processors` / `criterion`). Entries with invalid names
//!   are skipped, and entries that leave the state unset are kept; both are
//!   reported as [`DefinitionWarning`]s instead of failing the whole load.

use crate::error::{Result, WorkflowError};
use crate::names::is_valid_name;
use crate::table::{Action, NextState, TransitionTable};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

// ---------------------------------------------------------------------------
// TableDefinition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableDefinition {
    #[serde(default)]
    pub transitions: BTreeMap<String, Vec<ActionDefinition>>,
}

/// One action as written in a table document.
///
/// Either `next` (fixed) or `criterion` with `on_true` / `on_false`. The
/// processor may be left out for an action that only branches or moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criterion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_true: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_false: Option<String>,
}

impl ActionDefinition {
    fn to_action(&self, transition: &str) -> Result<Action> {
        let label = self.processor.as_deref().unwrap_or("-");
        let missing = |field: &str| {
            WorkflowError::InvalidDefinition(format!(
                "transition '{transition}': action '{label}' is missing '{field}'"
            ))
        };
        let next = match &self.criterion {
            Some(criterion) => {
                if self.next.is_some() {
                    return Err(WorkflowError::InvalidDefinition(format!(
                        "transition '{transition}': action '{label}' has both 'next' and 'criterion'"
                    )));
                }
                let on_true = self.on_true.clone().ok_or_else(|| missing("on_true"))?;
                let on_false = self.on_false.clone().ok_or_else(|| missing("on_false"))?;
                NextState::Branch {
                    criterion: criterion.clone(),
                    on_true,
                    on_false,
                }
            }
            None => NextState::Fixed {
                state: self.next.clone().ok_or_else(|| missing("next"))?,
            },
        };
        Ok(Action {
            processor: self.processor.clone(),
            next,
        })
    }
}

impl TableDefinition {
    pub fn from_yaml_str(data: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }

    /// Load a table document; `.json` files are read as JSON, anything else as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Ok(serde_json::from_str(&data)?)
        } else {
            Self::from_yaml_str(&data)
        }
    }

    pub fn to_table(&self) -> Result<TransitionTable> {
        let mut transitions = BTreeMap::new();
        for (name, defs) in &self.transitions {
            let actions = defs
                .iter()
                .map(|d| d.to_action(name))
                .collect::<Result<Vec<_>>>()?;
            transitions.insert(name.clone(), actions);
        }
        TransitionTable::from_map(transitions)
    }
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub states: States,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateDefinition {
    #[serde(default)]
    pub transitions: Vec<TransitionDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default)]
    pub manual: bool,
    #[serde(default)]
    pub processors: Vec<ProcessorRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criterion: Option<CriterionRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorRef {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionRef {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionRef {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

impl CriterionRef {
    /// The criterion name when this is a named function criterion.
    pub fn function_name(&self) -> Option<&str> {
        if self.kind != "function" {
            return None;
        }
        self.function
            .as_ref()
            .map(|f| f.name.as_str())
            .filter(|n| !n.is_empty())
    }
}

/// A definition entry that was skipped or downgraded during conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionWarning {
    pub state: String,
    pub transition: String,
    pub message: String,
}

impl fmt::Display for DefinitionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.transition.is_empty() {
            write!(f, "state '{}': {}", self.state, self.message)
        } else {
            write!(
                f,
                "state '{}', transition '{}': {}",
                self.state, self.transition, self.message
            )
        }
    }
}

impl WorkflowDefinition {
    pub fn from_json_str(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    /// Declared states, every `next` target, and the initial state.
    pub fn states_reachable(&self) -> BTreeSet<&str> {
        let mut states = BTreeSet::new();
        if let Some(initial) = self.initial_state.as_deref() {
            states.insert(initial);
        }
        for (name, state) in self.states.iter() {
            states.insert(name);
            for t in &state.transitions {
                if let Some(next) = t.next.as_deref() {
                    states.insert(next);
                }
            }
        }
        states
    }

    /// Convert into a transition table.
    ///
    /// Each entry runs its processors in declaration order and then settles
    /// the state once:
    ///
    /// - a named function criterion with a `next` branches to `next` when it
    ///   holds and to `false_state` otherwise;
    /// - otherwise a `next` is taken unconditionally (criteria of other
    ///   types are not evaluated);
    /// - otherwise the state is left as it was, which for a lone entry is
    ///   the transition name itself.
    ///
    /// A transition name repeated across states chains onto the earlier
    /// entry, so a later entry that sets no state keeps the earlier result.
    pub fn to_table(
        &self,
        false_state: &str,
    ) -> Result<(TransitionTable, Vec<DefinitionWarning>)> {
        let mut transitions: BTreeMap<String, Vec<Action>> = BTreeMap::new();
        let mut warnings = Vec::new();

        for (state_name, state) in self.states.iter() {
            for t in &state.transitions {
                let mut warn = |message: String| {
                    warnings.push(DefinitionWarning {
                        state: state_name.to_string(),
                        transition: t.name.clone(),
                        message,
                    });
                };

                if !is_valid_name(&t.name) {
                    warn(format!("invalid transition name '{}'; skipped", t.name));
                    continue;
                }
                let next = match t.next.as_deref() {
                    Some(next) if !is_valid_name(next) => {
                        warn(format!("invalid next state '{next}'; skipped"));
                        continue;
                    }
                    next => next,
                };

                let settle = match (&t.criterion, next) {
                    (Some(c), next) if c.kind == "function" => match (c.function_name(), next) {
                        (Some(name), _) if !is_valid_name(name) => {
                            warn(format!("invalid criterion name '{name}'; skipped"));
                            continue;
                        }
                        (Some(name), Some(next)) => NextState::Branch {
                            criterion: name.to_string(),
                            on_true: next.to_string(),
                            on_false: false_state.to_string(),
                        },
                        (Some(_), None) => {
                            warn(
                                "criterion without a next state is not evaluated; state unchanged"
                                    .to_string(),
                            );
                            NextState::Unchanged
                        }
                        (None, _) => {
                            warn(
                                "function criterion has no name and is not evaluated; state unchanged"
                                    .to_string(),
                            );
                            NextState::Unchanged
                        }
                    },
                    (_, Some(next)) => NextState::Fixed {
                        state: next.to_string(),
                    },
                    (_, None) => {
                        warn("no next state; state unchanged".to_string());
                        NextState::Unchanged
                    }
                };
                if let Some(c) = t.criterion.as_ref().filter(|c| c.kind != "function") {
                    warn(format!("criterion of type '{}' is not evaluated", c.kind));
                }

                let mut processors = Vec::with_capacity(t.processors.len());
                for p in &t.processors {
                    if is_valid_name(&p.name) {
                        processors.push(p.name.as_str());
                    } else {
                        warn(format!("invalid processor name '{}'; ignored", p.name));
                    }
                }

                if transitions.contains_key(&t.name) {
                    warn("declared more than once; actions chained".to_string());
                }

                let entry = transitions.entry(t.name.clone()).or_default();
                match processors.split_last() {
                    Some((last, leading)) => {
                        entry.extend(leading.iter().map(|p| Action::run(*p)));
                        entry.push(Action {
                            processor: Some(last.to_string()),
                            next: settle,
                        });
                    }
                    None => entry.push(Action {
                        processor: None,
                        next: settle,
                    }),
                }
            }
        }

        let table = TransitionTable::from_map(transitions)?;
        Ok((table, warnings))
    }
}

// ---------------------------------------------------------------------------
// States: document-ordered state map
// ---------------------------------------------------------------------------

/// The `states` object, kept in document order so repeated transition names
/// chain in the order they were written.
#[derive(Debug, Clone, Default)]
pub struct States(Vec<(String, StateDefinition)>);

impl States {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StateDefinition)> {
        self.0.iter().map(|(name, state)| (name.as_str(), state))
    }

    pub fn get(&self, name: &str) -> Option<&StateDefinition> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for States {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, state) in &self.0 {
            map.serialize_entry(name, state)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for States {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct StatesVisitor;

        impl<'de> Visitor<'de> for StatesVisitor {
            type Value = States;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of state name to state definition")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<States, A::Error> {
                let mut states = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, state)) = access.next_entry::<String, StateDefinition>()? {
                    states.push((name, state));
                }
                Ok(States(states))
            }
        }

        deserializer.deserialize_map(StatesVisitor)
    }
}

// ---------------------------------------------------------------------------
// Directory loading
// ---------------------------------------------------------------------------

/// Read every `*.json` workflow document in `dir`, keyed by file stem
/// (the entity name, e.g. `Job.json` → `Job`).
///
/// A missing directory yields an empty map. Files that cannot be read or
/// parsed are logged and skipped.
pub fn load_workflow_dir(dir: &Path) -> Result<BTreeMap<String, WorkflowDefinition>> {
    let mut workflows = BTreeMap::new();
    if !dir.is_dir() {
        tracing::warn!(dir = %dir.display(), "workflow directory does not exist");
        return Ok(workflows);
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(entity) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match WorkflowDefinition::load(&path) {
            Ok(def) => {
                tracing::debug!(file = %path.display(), entity, "read workflow definition");
                workflows.insert(entity.to_string(), def);
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping workflow definition");
            }
        }
    }
    Ok(workflows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
