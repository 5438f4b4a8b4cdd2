//! Error taxonomy for the grounder pipeline (§7).
//!
//! The original system raises C++ exceptions and catches `UnsatException`
//! at the grounding boundary. This crate replaces that control-flow-by-
//! exception idiom (design note in §9) with an explicit `Result` threaded
//! through every grounder, cost estimator and propagator call, short-
//! circuiting upwards the ordinary way.

use thiserror::Error;

/// Every fallible operation in the grounder pipeline returns this error.
#[derive(Debug, Error)]
pub enum GroundingError {
    /// An option combination is self-contradictory or requests an
    /// unsupported target (e.g. CP support with non-integer weights).
    /// Fails fast; no partial output is produced.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An internal invariant was violated (BDD kernel ordering broken,
    /// context stack underflow, hash-cons corruption). These should never
    /// happen; surfacing them as a typed error rather than panicking lets
    /// callers at least log which inference failed.
    #[error("internal invariant violation: {0}")]
    InvariantViolation(String),

    /// UNSAT was discovered while grounding (e.g. a rule body reduced to
    /// `_false` inside a context that forces the whole theory false).
    /// The caller is expected to replace the ground theory with the
    /// single empty clause and stop, per §7.
    #[error("unsatisfiable during grounding")]
    Unsat,

    /// The resource monitor (§5) set the termination flag; the inference
    /// must unwind and discard partial results.
    #[error("inference was terminated (time or memory budget exceeded)")]
    Terminated,

    /// A construct recognised by the AST but not supported by this
    /// grounder (aggregates nested inside terms, equivalences appearing
    /// inside BDD construction). Raised synchronously, no degradation.
    #[error("not yet implemented: {0}")]
    NotYetImplemented(String),

    /// The external solver reported a usage error (malformed ECNF
    /// consumed, unsupported directive). Wrapped at the boundary; the
    /// ground theory produced so far is dropped.
    #[error("solver error: {0}")]
    Solver(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GroundingError>;

/// A user-facing warning that does not abort the current inference
/// (infinite range approximated by an integer bound, CP disabled because
/// the chosen propagator cannot back-translate CP variables, ...).
/// Warnings are logged via the `log` facade at `warn` level by the call
/// site; this type exists so callers that want to collect them (e.g. the
/// CLI, or a test asserting a specific warning fired) can do so without
/// depending on log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning(pub String);

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unsat_display() {
        assert_eq!(
            format!("{}", GroundingError::Unsat),
            "unsatisfiable during grounding"
        );
    }

    #[test]
    fn configuration_carries_message() {
        let e = GroundingError::Configuration("CPSUPPORT with float weights".into());
        assert!(format!("{e}").contains("CPSUPPORT"));
    }
}
