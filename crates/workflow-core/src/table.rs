//! The transition table: transition name → ordered actions.
//!
//! The table is data, not control flow. It is built once (through
//! [`TableBuilder`], a [`TableDefinition`](crate::definition::TableDefinition)
//! or a workflow document) and never mutated afterwards. Every entry holds at
//! least one action. An action either names its next state for each branch
//! or leaves the state reached so far in place; a transition whose actions
//! never set a state resolves to its own name.

use crate::error::{Result, WorkflowError};
use crate::names::validate_name;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ---------------------------------------------------------------------------
// NextState
// ---------------------------------------------------------------------------

/// How an action picks the state that follows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NextState {
    /// Advance to `state` once the processor succeeds.
    Fixed { state: String },
    /// Evaluate `criterion` after the processor and branch on its result.
    Branch {
        criterion: String,
        on_true: String,
        on_false: String,
    },
    /// Keep the state set by an earlier action, or the transition name.
    Unchanged,
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// One step of a transition. The processor is optional: a workflow document
/// may declare a transition that only evaluates a criterion or only sets a
/// state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor: Option<String>,
    pub next: NextState,
}

impl Action {
    pub fn advance(processor: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            processor: Some(processor.into()),
            next: NextState::Fixed {
                state: state.into(),
            },
        }
    }

    pub fn branch(
        processor: impl Into<String>,
        criterion: impl Into<String>,
        on_true: impl Into<String>,
        on_false: impl Into<String>,
    ) -> Self {
        Self {
            processor: Some(processor.into()),
            next: NextState::Branch {
                criterion: criterion.into(),
                on_true: on_true.into(),
                on_false: on_false.into(),
            },
        }
    }

    /// Run `processor` and leave the state as it is.
    pub fn run(processor: impl Into<String>) -> Self {
        Self {
            processor: Some(processor.into()),
            next: NextState::Unchanged,
        }
    }

    /// Branch on `criterion` without running a processor first.
    pub fn check(
        criterion: impl Into<String>,
        on_true: impl Into<String>,
        on_false: impl Into<String>,
    ) -> Self {
        Self {
            processor: None,
            next: NextState::Branch {
                criterion: criterion.into(),
                on_true: on_true.into(),
                on_false: on_false.into(),
            },
        }
    }

    /// Move to `state` without running anything.
    pub fn goto(state: impl Into<String>) -> Self {
        Self {
            processor: None,
            next: NextState::Fixed {
                state: state.into(),
            },
        }
    }

    pub fn processor(&self) -> Option<&str> {
        self.processor.as_deref()
    }

    pub fn criterion(&self) -> Option<&str> {
        match &self.next {
            NextState::Branch { criterion, .. } => Some(criterion.as_str()),
            NextState::Fixed { .. } | NextState::Unchanged => None,
        }
    }

    /// Every state this action can set. Empty for [`NextState::Unchanged`].
    pub fn states(&self) -> Vec<&str> {
        match &self.next {
            NextState::Fixed { state } => vec![state.as_str()],
            NextState::Branch {
                on_true, on_false, ..
            } => vec![on_true.as_str(), on_false.as_str()],
            NextState::Unchanged => Vec::new(),
        }
    }

    fn validate(&self, transition: &str) -> Result<()> {
        let invalid = |what: &str, name: &str| {
            WorkflowError::InvalidDefinition(format!(
                "transition '{transition}': invalid {what} name '{name}'"
            ))
        };
        if let Some(processor) = &self.processor {
            validate_name(processor).map_err(|_| invalid("processor", processor))?;
        }
        match &self.next {
            NextState::Fixed { state } => {
                validate_name(state).map_err(|_| invalid("state", state))?;
            }
            NextState::Branch {
                criterion,
                on_true,
                on_false,
            } => {
                validate_name(criterion).map_err(|_| invalid("criterion", criterion))?;
                validate_name(on_true).map_err(|_| invalid("state", on_true))?;
                validate_name(on_false).map_err(|_| invalid("state", on_false))?;
            }
            NextState::Unchanged => {}
        }
        Ok(())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(processor) = &self.processor {
            write!(f, "{processor} ")?;
        }
        match &self.next {
            NextState::Fixed { state } => write!(f, "-> {state}"),
            NextState::Branch {
                criterion,
                on_true,
                on_false,
            } => write!(f, "? {criterion} -> {on_true} | {on_false}"),
            NextState::Unchanged => f.write_str("-> (unchanged)"),
        }
    }
}

// ---------------------------------------------------------------------------
// TransitionTable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TransitionTable {
    transitions: BTreeMap<String, Vec<Action>>,
}

impl TransitionTable {
    pub fn builder() -> TableBuilder {
        TableBuilder::default()
    }

    /// Validate and freeze a transition map.
    pub fn from_map(transitions: BTreeMap<String, Vec<Action>>) -> Result<Self> {
        for (name, actions) in &transitions {
            validate_name(name).map_err(|_| {
                WorkflowError::InvalidDefinition(format!("invalid transition name '{name}'"))
            })?;
            if actions.is_empty() {
                return Err(WorkflowError::InvalidDefinition(format!(
                    "transition '{name}' has no actions"
                )));
            }
            for action in actions {
                action.validate(name)?;
            }
        }
        Ok(Self { transitions })
    }

    pub fn lookup(&self, transition: &str) -> Result<&[Action]> {
        self.get(transition)
            .ok_or_else(|| WorkflowError::UnknownTransition(transition.to_string()))
    }

    pub fn get(&self, transition: &str) -> Option<&[Action]> {
        self.transitions.get(transition).map(|v| v.as_slice())
    }

    pub fn contains(&self, transition: &str) -> bool {
        self.transitions.contains_key(transition)
    }

    pub fn transition_names(&self) -> impl Iterator<Item = &str> {
        self.transitions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Action])> {
        self.transitions
            .iter()
            .map(|(name, actions)| (name.as_str(), actions.as_slice()))
    }

    /// States `transition` can resolve to, excluding the error sink.
    ///
    /// The last action that sets a state decides; when none does, the
    /// transition resolves to its own name.
    pub fn next_states(&self, transition: &str) -> BTreeSet<&str> {
        let Some((name, actions)) = self.transitions.get_key_value(transition) else {
            return BTreeSet::new();
        };
        match actions.iter().rev().find(|a| a.next != NextState::Unchanged) {
            Some(action) => action.states().into_iter().collect(),
            None => BTreeSet::from([name.as_str()]),
        }
    }

    /// Every processor name referenced by the table.
    pub fn processor_names(&self) -> BTreeSet<&str> {
        self.transitions
            .values()
            .flatten()
            .filter_map(Action::processor)
            .collect()
    }

    /// Every criterion name referenced by the table.
    pub fn criterion_names(&self) -> BTreeSet<&str> {
        self.transitions
            .values()
            .flatten()
            .filter_map(Action::criterion)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// TableBuilder
// ---------------------------------------------------------------------------

/// Declarative construction of a [`TransitionTable`]. Actions given for the
/// same transition are chained in call order.
#[derive(Debug, Default)]
pub struct TableBuilder {
    transitions: BTreeMap<String, Vec<Action>>,
}

impl TableBuilder {
    pub fn action(mut self, transition: impl Into<String>, action: Action) -> Self {
        self.transitions
            .entry(transition.into())
            .or_default()
            .push(action);
        self
    }

    pub fn advance(
        self,
        transition: impl Into<String>,
        processor: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        self.action(transition, Action::advance(processor, state))
    }

    pub fn branch(
        self,
        transition: impl Into<String>,
        processor: impl Into<String>,
        criterion: impl Into<String>,
        on_true: impl Into<String>,
        on_false: impl Into<String>,
    ) -> Self {
        self.action(
            transition,
            Action::branch(processor, criterion, on_true, on_false),
        )
    }

    pub fn check(
        self,
        transition: impl Into<String>,
        criterion: impl Into<String>,
        on_true: impl Into<String>,
        on_false: impl Into<String>,
    ) -> Self {
        self.action(transition, Action::check(criterion, on_true, on_false))
    }

    pub fn build(self) -> Result<TransitionTable> {
        TransitionTable::from_map(self.transitions)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
