//! The state machine driver.
//!
//! `Orchestrator::run` looks the incoming transition up in the table, runs
//! each action's processor, evaluates its criterion when it branches, and
//! returns the next state. The state starts out as the transition name, so a
//! transition whose actions never set one resolves to its own name. Nothing escapes `run`: unknown handlers, failing
//! handlers and panicking handlers are logged and folded into
//! [`ERROR_STATE`]. The orchestrator holds no per-call state, so one instance
//! serves concurrent calls for different entities.

use crate::config::OrchestratorConfig;
use crate::definition::{DefinitionWarning, WorkflowDefinition};
use crate::error::{CriterionError, ProcessorError, Result, WorkflowError};
use crate::names::ERROR_STATE;
use crate::registry::{CriterionRegistry, ProcessorRegistry};
use crate::table::{Action, NextState, TransitionTable};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

// ---------------------------------------------------------------------------
// UnknownTransitionPolicy
// ---------------------------------------------------------------------------

/// What `run` returns for a transition the table does not know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownTransitionPolicy {
    /// Return the transition name unchanged.
    #[default]
    PassThrough,
    /// Return `error_state`.
    ErrorState,
}

impl fmt::Display for UnknownTransitionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnknownTransitionPolicy::PassThrough => "pass_through",
            UnknownTransitionPolicy::ErrorState => "error_state",
        })
    }
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

/// One completed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criterion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criterion_result: Option<bool>,
    pub next_state: String,
}

/// Everything `run` knows about one call. `run` itself only returns
/// `next_state`; tooling uses the rest for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub workflow: String,
    pub entity_id: String,
    pub transition: String,
    pub next_state: String,
    /// False when the table had no entry for `transition`.
    pub matched: bool,
    pub steps: Vec<StepRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn is_error(&self) -> bool {
        self.next_state == ERROR_STATE
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator<E: ?Sized> {
    workflow: String,
    table: Arc<TransitionTable>,
    processors: Arc<ProcessorRegistry<E>>,
    criteria: Arc<CriterionRegistry<E>>,
    unknown_transition: UnknownTransitionPolicy,
}

impl<E: ?Sized> Orchestrator<E> {
    pub fn new(
        table: Arc<TransitionTable>,
        processors: Arc<ProcessorRegistry<E>>,
        criteria: Arc<CriterionRegistry<E>>,
    ) -> Self {
        Self {
            workflow: "workflow".to_string(),
            table,
            processors,
            criteria,
            unknown_transition: UnknownTransitionPolicy::default(),
        }
    }

    /// Name used in log records, usually the entity type (e.g. `Job`).
    pub fn with_workflow(mut self, workflow: impl Into<String>) -> Self {
        self.workflow = workflow.into();
        self
    }

    pub fn with_unknown_transition(mut self, policy: UnknownTransitionPolicy) -> Self {
        self.unknown_transition = policy;
        self
    }

    pub fn workflow(&self) -> &str {
        &self.workflow
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    pub fn unknown_transition(&self) -> UnknownTransitionPolicy {
        self.unknown_transition
    }

    /// Handler names the table references but the registries lack.
    /// A non-empty result means some transitions can only end in `error_state`.
    pub fn unresolved_handlers(&self) -> Vec<WorkflowError> {
        let processors = self
            .table
            .processor_names()
            .into_iter()
            .filter(|name| !self.processors.contains(name))
            .map(|name| WorkflowError::UnknownProcessor(name.to_string()));
        let criteria = self
            .table
            .criterion_names()
            .into_iter()
            .filter(|name| !self.criteria.contains(name))
            .map(|name| WorkflowError::UnknownCriterion(name.to_string()));
        processors.chain(criteria).collect()
    }

    /// Execute `transition` for one entity and return the state to persist.
    ///
    /// Always returns a non-empty state name; failures yield `error_state`.
    pub fn run(&self, entity_id: &str, entity: &E, transition: &str) -> String {
        self.run_report(entity_id, entity, transition).next_state
    }

    pub fn run_report(&self, entity_id: &str, entity: &E, transition: &str) -> RunReport {
        info!(
            workflow = %self.workflow,
            transition,
            entity_id,
            "running workflow orchestrator"
        );

        let mut report = RunReport {
            workflow: self.workflow.clone(),
            entity_id: entity_id.to_string(),
            transition: transition.to_string(),
            next_state: ERROR_STATE.to_string(),
            matched: false,
            steps: Vec::new(),
            error: None,
        };

        match self.table.get(transition) {
            None => {
                report.next_state = match self.unknown_transition {
                    UnknownTransitionPolicy::PassThrough if !transition.is_empty() => {
                        transition.to_string()
                    }
                    _ => ERROR_STATE.to_string(),
                };
                warn!(
                    workflow = %self.workflow,
                    transition,
                    policy = %self.unknown_transition,
                    next_state = %report.next_state,
                    "no actions defined for transition"
                );
            }
            Some(actions) => {
                report.matched = true;
                match self.execute(transition, entity_id, entity, actions, &mut report.steps) {
                    Ok(next) => report.next_state = next.to_string(),
                    Err(e) => {
                        error!(
                            workflow = %self.workflow,
                            transition,
                            entity_id,
                            error = %e,
                            "error processing transition"
                        );
                        report.error = Some(e.to_string());
                    }
                }
            }
        }

        info!(
            workflow = %self.workflow,
            transition,
            next_state = %report.next_state,
            "transition resolved"
        );
        report
    }

    fn execute<'t>(
        &self,
        transition: &'t str,
        entity_id: &str,
        entity: &E,
        actions: &'t [Action],
        steps: &mut Vec<StepRecord>,
    ) -> Result<&'t str> {
        let mut next = transition;

        for action in actions {
            if let Some(name) = &action.processor {
                let processor = self.processors.get(name)?;
                debug!(processor = %name, entity_id, "executing processor");
                guarded(|| processor.execute(entity_id, entity))
                    .map_err(ProcessorError::new)
                    .and_then(|r| r)
                    .map_err(|source| WorkflowError::ProcessorExecution {
                        processor: name.clone(),
                        source,
                    })?;
            }

            let (criterion, criterion_result) = match &action.next {
                NextState::Fixed { state } => {
                    next = state.as_str();
                    (None, None)
                }
                NextState::Branch {
                    criterion,
                    on_true,
                    on_false,
                } => {
                    let handle = self.criteria.get(criterion)?;
                    let holds = guarded(|| handle.evaluate(entity_id, entity))
                        .map_err(CriterionError::new)
                        .and_then(|r| r)
                        .map_err(|source| WorkflowError::CriterionEvaluation {
                            criterion: criterion.clone(),
                            source,
                        })?;
                    debug!(criterion = %criterion, holds, "criterion evaluated");
                    next = if holds { on_true.as_str() } else { on_false.as_str() };
                    (Some(criterion.clone()), Some(holds))
                }
                NextState::Unchanged => (None, None),
            };

            steps.push(StepRecord {
                processor: action.processor.clone(),
                criterion,
                criterion_result,
                next_state: next.to_string(),
            });
        }

        Ok(next)
    }
}

impl<E: ?Sized> fmt::Debug for Orchestrator<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("workflow", &self.workflow)
            .field("transitions", &self.table.len())
            .field("unknown_transition", &self.unknown_transition)
            .finish()
    }
}

/// Run a handler call, turning a panic into its message.
fn guarded<T>(f: impl FnOnce() -> T) -> std::result::Result<T, String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(&*payload))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("handler panicked: {detail}")
}

// ---------------------------------------------------------------------------
// OrchestratorSet
// ---------------------------------------------------------------------------

/// One orchestrator per entity workflow, all sharing the same registries.
pub struct OrchestratorSet<E: ?Sized> {
    orchestrators: BTreeMap<String, Orchestrator<E>>,
}

impl<E: ?Sized> OrchestratorSet<E> {
    pub fn new() -> Self {
        Self {
            orchestrators: BTreeMap::new(),
        }
    }

    /// Build an orchestrator for every workflow document, keyed by entity name.
    ///
    /// Returns the set together with each document's conversion warnings.
    pub fn from_workflows(
        workflows: &BTreeMap<String, WorkflowDefinition>,
        processors: Arc<ProcessorRegistry<E>>,
        criteria: Arc<CriterionRegistry<E>>,
        config: &OrchestratorConfig,
    ) -> Result<(Self, Vec<(String, DefinitionWarning)>)> {
        let mut set = Self::new();
        let mut warnings = Vec::new();

        for (entity, def) in workflows {
            if !def.active {
                info!(workflow = %entity, "skipping inactive workflow");
                continue;
            }
            let (table, table_warnings) = def.to_table(&config.false_branch_state)?;
            for w in &table_warnings {
                warn!(workflow = %entity, warning = %w, "workflow definition entry skipped");
            }
            warnings.extend(table_warnings.into_iter().map(|w| (entity.clone(), w)));

            let orchestrator =
                Orchestrator::new(Arc::new(table), Arc::clone(&processors), Arc::clone(&criteria))
                    .with_workflow(entity.as_str())
                    .with_unknown_transition(config.unknown_transition);
            set.insert(entity.clone(), orchestrator);
        }
        Ok((set, warnings))
    }

    pub fn insert(&mut self, entity: impl Into<String>, orchestrator: Orchestrator<E>) {
        self.orchestrators.insert(entity.into(), orchestrator);
    }

    pub fn get(&self, entity: &str) -> Option<&Orchestrator<E>> {
        self.orchestrators.get(entity)
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.orchestrators.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.orchestrators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orchestrators.is_empty()
    }

    /// Route to the orchestrator for `entity`; an unknown entity yields `error_state`.
    pub fn run(&self, entity: &str, entity_id: &str, value: &E, transition: &str) -> String {
        match self.orchestrators.get(entity) {
            Some(orchestrator) => orchestrator.run(entity_id, value, transition),
            None => {
                let e = WorkflowError::UnknownEntity(entity.to_string());
                error!(
                    workflow = %entity,
                    transition,
                    entity_id,
                    error = %e,
                    "error processing transition"
                );
                ERROR_STATE.to_string()
            }
        }
    }
}

impl<E: ?Sized> Default for OrchestratorSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
