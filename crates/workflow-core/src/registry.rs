//! Name-keyed registries of processors and criteria.
//!
//! Handles are registered once at startup and shared read-only afterwards.
//! The orchestrator resolves them by the names written in the transition
//! table; a missing name surfaces as `UnknownProcessor` / `UnknownCriterion`.

use crate::error::{CriterionError, ProcessorError, Result, WorkflowError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// A side-effecting unit of work run during a transition.
pub trait Processor<E: ?Sized>: Send + Sync {
    fn execute(&self, entity_id: &str, entity: &E) -> std::result::Result<(), ProcessorError>;
}

/// A boolean decision used to pick between two next states.
pub trait Criterion<E: ?Sized>: Send + Sync {
    fn evaluate(&self, entity_id: &str, entity: &E) -> std::result::Result<bool, CriterionError>;
}

/// Adapts a closure into a [`Processor`].
pub struct FnProcessor<F>(pub F);

impl<E, F> Processor<E> for FnProcessor<F>
where
    E: ?Sized,
    F: Fn(&str, &E) -> std::result::Result<(), ProcessorError> + Send + Sync,
{
    fn execute(&self, entity_id: &str, entity: &E) -> std::result::Result<(), ProcessorError> {
        (self.0)(entity_id, entity)
    }
}

/// Adapts a closure into a [`Criterion`].
pub struct FnCriterion<F>(pub F);

impl<E, F> Criterion<E> for FnCriterion<F>
where
    E: ?Sized,
    F: Fn(&str, &E) -> std::result::Result<bool, CriterionError> + Send + Sync,
{
    fn evaluate(&self, entity_id: &str, entity: &E) -> std::result::Result<bool, CriterionError> {
        (self.0)(entity_id, entity)
    }
}

// ---------------------------------------------------------------------------
// ProcessorRegistry
// ---------------------------------------------------------------------------

pub struct ProcessorRegistry<E: ?Sized> {
    processors: HashMap<String, Arc<dyn Processor<E>>>,
}

impl<E: ?Sized> ProcessorRegistry<E> {
    pub fn new() -> Self {
        Self {
            processors: HashMap::new(),
        }
    }

    /// Register `processor` under `name`, replacing any earlier entry.
    pub fn register<P>(&mut self, name: impl Into<String>, processor: P) -> &mut Self
    where
        P: Processor<E> + 'static,
    {
        self.processors.insert(name.into(), Arc::new(processor));
        self
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&str, &E) -> std::result::Result<(), ProcessorError> + Send + Sync + 'static,
    {
        self.register(name, FnProcessor(f))
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Processor<E>>> {
        self.processors
            .get(name)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownProcessor(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.processors.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.processors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl<E: ?Sized> Default for ProcessorRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ?Sized> fmt::Debug for ProcessorRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("processors", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// CriterionRegistry
// ---------------------------------------------------------------------------

pub struct CriterionRegistry<E: ?Sized> {
    criteria: HashMap<String, Arc<dyn Criterion<E>>>,
}

impl<E: ?Sized> CriterionRegistry<E> {
    pub fn new() -> Self {
        Self {
            criteria: HashMap::new(),
        }
    }

    /// Register `criterion` under `name`, replacing any earlier entry.
    pub fn register<C>(&mut self, name: impl Into<String>, criterion: C) -> &mut Self
    where
        C: Criterion<E> + 'static,
    {
        self.criteria.insert(name.into(), Arc::new(criterion));
        self
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&str, &E) -> std::result::Result<bool, CriterionError> + Send + Sync + 'static,
    {
        self.register(name, FnCriterion(f))
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Criterion<E>>> {
        self.criteria
            .get(name)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownCriterion(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.criteria.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.criteria.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

impl<E: ?Sized> Default for CriterionRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ?Sized> fmt::Debug for CriterionRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CriterionRegistry")
            .field("criteria", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProcessor {
        calls: Arc<AtomicUsize>,
    }

    impl Processor<str> for CountingProcessor {
        fn execute(&self, _entity_id: &str, _entity: &str) -> std::result::Result<(), ProcessorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn registered_processor_resolves_and_runs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry: ProcessorRegistry<str> = ProcessorRegistry::new();
        registry.register(
            "JobValidationProcessor",
            CountingProcessor {
                calls: Arc::clone(&calls),
            },
        );

        let processor = registry.get("JobValidationProcessor").unwrap();
        processor.execute("job-1", "{}").unwrap();
        processor.execute("job-1", "{}").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unknown_processor_is_an_error() {
        let registry: ProcessorRegistry<str> = ProcessorRegistry::new();
        assert!(matches!(
            registry.get("Missing"),
            Err(WorkflowError::UnknownProcessor(name)) if name == "Missing"
        ));
    }

    #[test]
    fn unknown_criterion_is_an_error() {
        let registry: CriterionRegistry<str> = CriterionRegistry::new();
        assert!(matches!(
            registry.get("Missing"),
            Err(WorkflowError::UnknownCriterion(name)) if name == "Missing"
        ));
    }

    #[test]
    fn closure_criterion_sees_entity() {
        let mut registry: CriterionRegistry<Vec<u32>> = CriterionRegistry::new();
        registry.register_fn("HasRows", |_id, rows: &Vec<u32>| Ok(!rows.is_empty()));

        let criterion = registry.get("HasRows").unwrap();
        assert!(criterion.evaluate("job-1", &vec![1, 2]).unwrap());
        assert!(!criterion.evaluate("job-1", &Vec::new()).unwrap());
    }

    #[test]
    fn register_replaces_and_names_are_sorted() {
        let mut registry: ProcessorRegistry<str> = ProcessorRegistry::new();
        registry
            .register_fn("b", |_, _| Ok(()))
            .register_fn("a", |_, _| Err(ProcessorError::new("first")))
            .register_fn("a", |_, _| Ok(()));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert!(registry.get("a").unwrap().execute("x", "").is_ok());
        assert!(registry.contains("b"));
        assert!(!registry.contains("c"));
    }
}
