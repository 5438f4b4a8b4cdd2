//! Configuration options threaded through an inference call.
//!
//! The original system keeps a global `GlobalData`/`Options` singleton
//! reached from almost every method (flagged in §9 as a design wart). This
//! module instead exposes an explicit, `Clone`-able [`Options`] value that
//! the inference entry point owns and passes down by shared reference;
//! [`Options::scoped`] produces a modified copy for the stack-scoped
//! per-call overrides the design note calls for, without ever mutating a
//! shared global.

use serde::{Deserialize, Serialize};

/// Full option set for one inference call. Defaults mirror §6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Options {
    /// Run bounds propagation (§4.3) before grounding.
    pub ground_with_bounds: bool,
    /// Use propagation results to shrink the structure pre-grounding.
    pub lifted_unit_propagation: bool,
    /// Route integer expressions through CP reifications instead of fully
    /// enumerating them.
    pub cp_support: bool,
    /// Enable lazy grounding (§4.7).
    pub satisfiability_delay: bool,
    /// log2 of the ground-size threshold above which lazy delay is
    /// preferred over eager grounding.
    pub lazy_size_threshold: u32,
    /// Delay Tseitin introduction for Boolean connectives as long as
    /// possible (kept as a knob the grounder factory consults; the
    /// grounders themselves already prefer direct clause emission under a
    /// conjunctive path regardless of this flag).
    pub tseitin_delay: bool,
    /// Expand (ground eagerly) rather than delay, even when a delay was
    /// found, for sentences below this cheapness threshold.
    pub expand_immediately: bool,
    /// Cap on bounds-propagation scheduler steps.
    pub nr_prop_steps: usize,
    /// Multiply `nr_prop_steps` by the number of subformulas
    /// (`RELATIVEPROPAGATIONSTEPS` in the source).
    pub relative_propagation_steps: bool,
    /// Cap used by `longestbranch`-driven heuristics.
    pub longest_branch: usize,
    /// Number of models requested from model expansion (0 = unbounded).
    pub nb_models: usize,
    /// Whether the grounder/solver pair must remain model-equivalent
    /// (vs. merely model-preserving up to Tseitin symbols).
    pub nb_models_equivalent: bool,
    /// Wall-clock timeout in milliseconds (0 = unbounded).
    pub mx_timeout_ms: u64,
    /// Memory budget in megabytes (0 = unbounded).
    pub mx_memoryout_mb: u64,
    /// Seed for heuristic tie-breaking and the reference solver.
    pub random_seed: u64,
    /// Relevance threshold below which a watch is pruned from the lazy
    /// manager's pending set.
    pub watched_relevance: f64,
    /// Use stable-model semantics for definitions instead of well-founded.
    pub stable_semantics: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ground_with_bounds: true,
            lifted_unit_propagation: true,
            cp_support: true,
            satisfiability_delay: false,
            lazy_size_threshold: 20,
            tseitin_delay: true,
            expand_immediately: false,
            nr_prop_steps: 10_000,
            relative_propagation_steps: true,
            longest_branch: 1_000,
            nb_models: 1,
            nb_models_equivalent: false,
            mx_timeout_ms: 0,
            mx_memoryout_mb: 0,
            random_seed: 0,
            watched_relevance: 0.0,
            stable_semantics: false,
        }
    }
}

impl Options {
    /// Produce a scoped copy with `patch` applied; used to override a
    /// handful of options for a single nested call (e.g. disabling
    /// `satisfiability_delay` while grounding a definition) without
    /// touching the caller's copy.
    pub fn scoped(&self, patch: impl FnOnce(&mut Options)) -> Options {
        let mut copy = self.clone();
        patch(&mut copy);
        copy
    }

    /// Validates option combinations that are contradictory or request an
    /// unsupported target, per the "configuration error" category of §7.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.nb_models == 0 && self.nb_models_equivalent {
            return Err(crate::error::GroundingError::Configuration(
                "NBMODELS=0 (unbounded) is incompatible with model-equivalence checking".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let o = Options::default();
        assert!(o.ground_with_bounds);
        assert!(o.cp_support);
        assert!(!o.satisfiability_delay);
        assert_eq!(o.nb_models, 1);
    }

    #[test]
    fn scoped_does_not_mutate_original() {
        let base = Options::default();
        let scoped = base.scoped(|o| o.satisfiability_delay = true);
        assert!(!base.satisfiability_delay);
        assert!(scoped.satisfiability_delay);
    }

    #[test]
    fn validate_rejects_unbounded_equivalent_models() {
        let o = Options {
            nb_models: 0,
            nb_models_equivalent: true,
            ..Options::default()
        };
        assert!(o.validate().is_err());
    }
}
