//! A brute-force reference solver (SPEC_FULL §13), gated behind the
//! `test-solver` feature and used only to exercise the §8 end-to-end
//! scenarios without depending on an external SAT/SMT solver. It is
//! explicitly not production machinery (§1 Non-goals: a real solver is out
//! of scope): no unit propagation, no CP support, and it enumerates every
//! Boolean assignment over the distinct atoms it sees, so it is exponential
//! in the number of Tseitin atoms.

use std::collections::BTreeSet;

use crate::error::{GroundingError, Result};

use super::ecnf::{GroundTheory, RuleLine};
use super::{GroundSolver, Lit, Model, SolveOptions, SolveResult, FALSE_LIT, TRUE_LIT};

/// A simple, correctness-first model enumerator (SPEC_FULL §13). `Rule`
/// lines are treated as plain biconditional clauses (`head <-> body`)
/// rather than given well-founded/stable semantics, a documented
/// simplification appropriate for a reference-only solver, not a
/// well-founded model checker.
#[derive(Debug, Default)]
pub struct BruteForceSolver;

impl BruteForceSolver {
    pub fn new() -> Self {
        Self
    }

    fn atoms(theory: &GroundTheory) -> Vec<Lit> {
        let mut seen = BTreeSet::new();
        for clause in &theory.clauses {
            for lit in clause {
                if *lit != TRUE_LIT && *lit != FALSE_LIT {
                    seen.insert(lit.abs());
                }
            }
        }
        for rule in &theory.rules {
            if rule.head != TRUE_LIT && rule.head != FALSE_LIT {
                seen.insert(rule.head.abs());
            }
            for lit in &rule.body {
                if *lit != TRUE_LIT && *lit != FALSE_LIT {
                    seen.insert(lit.abs());
                }
            }
        }
        for agg in &theory.aggs {
            seen.insert(agg.head.abs());
        }
        for set in &theory.sets {
            for (lit, _) in &set.literals {
                if *lit != TRUE_LIT && *lit != FALSE_LIT {
                    seen.insert(lit.abs());
                }
            }
        }
        seen.into_iter().collect()
    }

    fn holds(lit: Lit, assignment: &BTreeSet<Lit>) -> bool {
        if lit == TRUE_LIT {
            return true;
        }
        if lit == FALSE_LIT {
            return false;
        }
        if lit > 0 {
            assignment.contains(&lit)
        } else {
            !assignment.contains(&lit.abs())
        }
    }

    fn clause_sat(clause: &[Lit], assignment: &BTreeSet<Lit>) -> bool {
        clause.iter().any(|l| Self::holds(*l, assignment))
    }

    fn rule_sat(rule: &RuleLine, assignment: &BTreeSet<Lit>) -> bool {
        let body_true = if rule.conjunctive {
            rule.body.iter().all(|l| Self::holds(*l, assignment))
        } else {
            rule.body.iter().any(|l| Self::holds(*l, assignment))
        };
        Self::holds(rule.head, assignment) == body_true
    }

    fn set_weight(theory: &GroundTheory, set: super::SetId, assignment: &BTreeSet<Lit>) -> f64 {
        let Some(line) = theory.sets.iter().find(|s| s.id == set) else { return 0.0 };
        line.literals.iter().filter(|(l, _)| Self::holds(*l, assignment)).map(|(_, w)| w).sum()
    }

    fn agg_sat(theory: &GroundTheory, agg: &super::ecnf::AggLine, assignment: &BTreeSet<Lit>) -> bool {
        use crate::theory::Sign;
        let weight = Self::set_weight(theory, agg.set, assignment);
        let satisfied = agg.comp.eval(weight, agg.bound);
        let satisfied = match agg.sign {
            Sign::Pos => satisfied,
            Sign::Neg => !satisfied,
        };
        Self::holds(agg.head, assignment) == satisfied
    }

    fn model_sat(theory: &GroundTheory, assignment: &BTreeSet<Lit>) -> bool {
        theory.clauses.iter().all(|c| Self::clause_sat(c, assignment))
            && theory.rules.iter().all(|r| Self::rule_sat(r, assignment))
            && theory.aggs.iter().all(|a| Self::agg_sat(theory, a, assignment))
    }
}

impl GroundSolver for BruteForceSolver {
    fn solve(&mut self, theory: &GroundTheory, options: &SolveOptions) -> Result<SolveResult> {
        if !theory.cps.is_empty() || !theory.int_vars.is_empty() {
            return Err(GroundingError::NotYetImplemented("brute-force reference solver has no CP support".into()));
        }
        let atoms = Self::atoms(theory);
        if atoms.len() > 20 {
            return Err(GroundingError::Solver(format!("reference solver refuses to enumerate {} atoms", atoms.len())));
        }
        let mut models = Vec::new();
        let total: u64 = 1u64 << atoms.len();
        for mask in 0..total {
            let assignment: BTreeSet<Lit> = atoms.iter().enumerate().filter(|(i, _)| mask & (1 << i) != 0).map(|(_, a)| *a).collect();
            if !theory.clauses.is_empty() || !theory.rules.is_empty() || !theory.aggs.is_empty() {
                if !Self::model_sat(theory, &assignment) {
                    continue;
                }
            }
            let unsatisfied_assumptions = options.assumptions.iter().any(|a| !Self::holds(*a, &assignment));
            if unsatisfied_assumptions {
                continue;
            }
            models.push(Model { true_atoms: assignment.into_iter().collect() });
            if models.len() >= options.nb_models && options.nb_models > 0 {
                break;
            }
        }
        let unsat = models.is_empty();
        Ok(SolveResult { models, unsat, optimum: None, explanation: Vec::new() })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_theory_has_one_trivial_model() {
        let theory = GroundTheory::new();
        let mut solver = BruteForceSolver::new();
        let result = solver.solve(&theory, &SolveOptions::default()).unwrap();
        assert!(!result.unsat);
    }

    #[test]
    fn contradictory_unit_clauses_are_unsat() {
        let mut theory = GroundTheory::new();
        theory.add_clause(vec![1]);
        theory.add_clause(vec![-1]);
        let mut solver = BruteForceSolver::new();
        let result = solver.solve(&theory, &SolveOptions::default()).unwrap();
        assert!(result.unsat);
    }

    #[test]
    fn satisfies_simple_clause() {
        let mut theory = GroundTheory::new();
        theory.add_clause(vec![1, 2]);
        theory.add_clause(vec![-1]);
        let mut solver = BruteForceSolver::new();
        let result = solver.solve(&theory, &SolveOptions::default()).unwrap();
        assert!(!result.unsat);
        assert!(result.models[0].true_atoms.contains(&2));
    }
}
