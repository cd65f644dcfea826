use crate::error::{Result, WorkflowError};
use regex::Regex;
use std::sync::OnceLock;

/// Sink state every folded failure resolves to.
pub const ERROR_STATE: &str = "error_state";

/// State a branching action takes when its criterion is false and the
/// definition names no other.
pub const DEFAULT_FALSE_STATE: &str = "failed";

// ---------------------------------------------------------------------------
// Name validation
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").unwrap())
}

/// Validate a transition, state, processor or criterion name.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 128 || !name_re().is_match(name) {
        return Err(WorkflowError::InvalidName(name.to_string()));
    }
    Ok(())
}

pub fn is_valid_name(name: &str) -> bool {
    validate_name(name).is_ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        for name in [
            "validate_and_start_ingesting",
            "JobValidationProcessor",
            "error_state",
            "v1.step-2",
        ] {
            validate_name(name).unwrap_or_else(|_| panic!("expected valid: {name}"));
        }
    }

    #[test]
    fn invalid_names() {
        for name in ["", "has spaces", "tab\there", "semi;colon", "ünïcode"] {
            assert!(validate_name(name).is_err(), "expected invalid: {name}");
        }
    }

    #[test]
    fn overlong_name_rejected() {
        let name = "a".repeat(129);
        assert!(!is_valid_name(&name));
    }
}
