pub mod config;
pub mod definition;
pub mod error;
pub mod io;
pub mod names;
pub mod orchestrator;
pub mod registry;
pub mod table;

pub use error::{CriterionError, ProcessorError, Result, WorkflowError};
pub use names::{DEFAULT_FALSE_STATE, ERROR_STATE};
pub use orchestrator::{Orchestrator, OrchestratorSet, RunReport, UnknownTransitionPolicy};
pub use registry::{Criterion, CriterionRegistry, Processor, ProcessorRegistry};
pub use table::{Action, NextState, TransitionTable};
