//! Inference entry points (§6 "Public API"; SPEC_FULL §11's
//! `CalculateDefinitions.cpp` supplement lives in [`definitions`]).
//!
//! Three operations sit on top of the lower layers:
//! - [`propagate`] tightens a structure via [`crate::propagation::BoundsPropagator`].
//! - [`modelexpand`] grounds a (optionally bounds-tightened) theory and hands
//!   the result to a [`crate::solver::GroundSolver`].
//! - [`definitions::calculate_definitions`] evaluates a theory's inductive
//!   definitions to fixpoint over an otherwise-fixed structure.

pub mod definitions;

use std::collections::BTreeSet;

use crate::config::Options;
use crate::error::Result;
use crate::fobdd::{BddId, FobddManager};
use crate::generators::bdd::{BddGenData, BddToGenerator};
use crate::generators::DomElemContainer;
use crate::grounding;
use crate::propagation::{BoundsPropagator, BoundValue};
use crate::solver::{GroundSolver, GroundTranslator, SolveOptions, SolveResult};
use crate::structure::{Interpretation, Structure, Tuple};
use crate::termination::TerminationFlag;
use crate::theory::{Theory, Variable};

pub use definitions::{calculate_definitions, DefinitionEvaluator, WellFoundedEvaluator};

/// `propagate(theory, structure)` (§4.3 "Output"): runs bounds propagation to
/// a fixpoint and returns a copy of `structure` tightened with every leaf
/// connector's resulting ct/cf bound, enumerated back into concrete tuples
/// via [`crate::generators::bdd::BddToGenerator`] (per
/// [`crate::propagation::BoundsPropagator::current_structure`]'s doc
/// comment, which names this function as the caller responsible for that
/// enumeration).
pub fn propagate(theory: &Theory, structure: &Structure, options: &Options, flag: &TerminationFlag) -> Result<Structure> {
    let mut prop = BoundsPropagator::prepare(theory, structure, options.clone());
    prop.run(flag)?;
    let mut tightened = prop.current_structure();
    let leaves: Vec<(String, usize)> = prop.leaves().values().map(|leaf| (leaf.name().to_string(), leaf.arity())).collect();
    for (name, arity) in leaves {
        flag.check()?;
        let Some(leaf) = prop.leaves().get(&name).cloned() else { continue };
        let Some(ct_bdd) = prop.leaf_bound(&name, BoundValue::Ct) else { continue };
        let Some(cf_bdd) = prop.leaf_bound(&name, BoundValue::Cf) else { continue };
        let vars = leaf.connector_vars(arity);
        let containers: Vec<DomElemContainer> = vars.iter().map(|_| DomElemContainer::new()).collect();
        let ct_tuples = enumerate_bound(prop.manager_mut(), &vars, &containers, ct_bdd, structure)?;
        let cf_tuples = enumerate_bound(prop.manager_mut(), &vars, &containers, cf_bdd, structure)?;
        tighten(&mut tightened, &name, ct_tuples, cf_tuples)?;
    }
    tightened.check_consistency()?;
    Ok(tightened)
}

/// Enumerates every valuation of `vars` that satisfies `bdd`, given
/// `structure`'s tables (a leaf connector's bound only ever talks about
/// built-in equalities between connector variables and domain constants, so
/// `structure` is consulted here only for completeness, not because these
/// particular BDDs reference user symbols).
fn enumerate_bound(mgr: &mut FobddManager, vars: &[Variable], containers: &[DomElemContainer], bdd: BddId, structure: &Structure) -> Result<Vec<Tuple>> {
    let data = BddGenData { bdd, vars, containers, structure };
    let mut gen = BddToGenerator::create(mgr, &data)?;
    gen.reset();
    let mut out = Vec::new();
    while gen.next() {
        if let Some(tuple) = containers.iter().map(DomElemContainer::get).collect::<Option<Tuple>>() {
            out.push(tuple);
        }
    }
    Ok(out)
}

/// Writes a leaf's enumerated ct/cf tuples back into `structure`
/// (`PredicateInterpretation::tighten_with` for a predicate; `cf` has no
/// counterpart on a [`crate::structure::FunctionInterpretation`], so a
/// function leaf only ever gains `ct` entries, a documented asymmetry, not
/// a bug: the table already has no way to record "this tuple is certainly
/// not in the graph" separately from "not yet looked up").
fn tighten(structure: &mut Structure, name: &str, ct: Vec<Tuple>, cf: Vec<Tuple>) -> Result<()> {
    match structure.interpretation_mut(name) {
        Some(Interpretation::Predicate(pred)) => {
            let ct: BTreeSet<Tuple> = ct.into_iter().collect();
            let cf: BTreeSet<Tuple> = cf.into_iter().collect();
            pred.tighten_with(&ct, &cf)
        }
        Some(Interpretation::Function(func)) => {
            for tuple in ct {
                if let Some((value, args)) = tuple.split_last() {
                    func.set(args.to_vec(), value.clone())?;
                }
            }
            Ok(())
        }
        None => Ok(()),
    }
}

/// `modelexpand(theory, structure, options)` (§6 "Model-expansion
/// public API"): propagates bounds when `options.ground_with_bounds` is set,
/// grounds the resulting theory, and hands the ground theory to `solver`.
pub fn modelexpand(theory: &Theory, structure: &Structure, options: &Options, solver: &mut dyn GroundSolver, flag: &TerminationFlag) -> Result<SolveResult> {
    options.validate()?;
    let base_structure = if options.ground_with_bounds { propagate(theory, structure, options, flag)? } else { structure.clone() };
    flag.check()?;
    let mut translator = GroundTranslator::new();
    let mut grounder = grounding::build(theory, &base_structure)?;
    let ground = grounder.run(&mut translator, &base_structure)?;
    flag.check()?;
    let solve_options = SolveOptions { nb_models: options.nb_models, minimize: None, assumptions: Vec::new() };
    solver.solve(&ground, &solve_options)
}

#[cfg(test)]
mod test {
    use std::rc::Rc;

    use super::*;
    use crate::theory::{Formula, Sign};
    use crate::vocabulary::{DomainElement, Predicate, Sort, SortTable, Symbol};

    #[test]
    fn propagate_tightens_a_ground_atom_already_certainly_true() {
        let sort = Sort::new("N", SortTable::IntRange(1, 1));
        let p = Symbol::Predicate(Rc::new(Predicate::new("p", vec![sort.clone()])));
        let mut theory = Theory::new();
        theory.sentences.push(Formula::Atom { sign: Sign::Pos, symbol: p.clone(), args: vec![crate::theory::Term::Domain(DomainElement::Int(1), sort)] });
        let mut structure = Structure::new();
        structure.declare_symbol(p.clone());
        let options = Options::default();
        let flag = TerminationFlag::new();
        let tightened = propagate(&theory, &structure, &options, &flag).unwrap();
        let Some(Interpretation::Predicate(pred)) = tightened.interpretation("p") else { panic!("p has a predicate interpretation") };
        assert!(pred.is_ct(&vec![DomainElement::Int(1)]));
    }

    #[test]
    fn propagate_on_an_empty_theory_is_a_no_op() {
        let theory = Theory::new();
        let structure = Structure::new();
        let options = Options::default();
        let flag = TerminationFlag::new();
        let tightened = propagate(&theory, &structure, &options, &flag).unwrap();
        assert!(tightened.interpretations().next().is_none());
    }

    #[test]
    fn modelexpand_with_bounds_disabled_grounds_the_untightened_structure() {
        let sort = Sort::new("N", SortTable::IntRange(1, 1));
        let p = Symbol::Predicate(Rc::new(Predicate::new("p", vec![sort.clone()])));
        let mut theory = Theory::new();
        theory.sentences.push(Formula::Atom { sign: Sign::Pos, symbol: p.clone(), args: vec![crate::theory::Term::Domain(DomainElement::Int(1), sort)] });
        let mut structure = Structure::new();
        structure.declare_symbol(p);
        let options = Options { ground_with_bounds: false, ..Options::default() };
        let flag = TerminationFlag::new();
        struct AcceptAll;
        impl GroundSolver for AcceptAll {
            fn solve(&mut self, theory: &crate::solver::ecnf::GroundTheory, _options: &SolveOptions) -> Result<SolveResult> {
                Ok(SolveResult { models: vec![crate::solver::Model::default()], unsat: false, optimum: None, explanation: theory.clauses.iter().flatten().copied().collect() })
            }
        }
        let mut solver = AcceptAll;
        let result = modelexpand(&theory, &structure, &options, &mut solver, &flag).unwrap();
        assert!(!result.unsat);
    }

    /// §8 scenario 2: `#{x : p(x)} = 2` over a 3-element sort with `p` left
    /// open has exactly `C(3,2) = 3` models.
    #[test]
    #[cfg(feature = "test-solver")]
    fn modelexpand_counts_models_of_a_cardinality_constraint() {
        use crate::solver::reference::BruteForceSolver;
        use crate::theory::{QuantSetExpr, Term};
        use crate::vocabulary::{BuiltinFunction, BuiltinPredicate};

        let sort = Sort::new("N", SortTable::IntRange(1, 3));
        let p = Symbol::Predicate(Rc::new(Predicate::new("p", vec![sort.clone()])));
        let x = Variable::new("x", sort.clone());
        let mut theory = Theory::new();
        theory.sentences.push(Formula::AggCompare {
            sign: Sign::Pos,
            term: Box::new(Term::Domain(DomainElement::Int(2), sort.clone())),
            comp: BuiltinPredicate::Eq,
            agg: BuiltinFunction::Card,
            set: QuantSetExpr {
                vars: vec![x.clone()],
                condition: Box::new(Formula::Atom { sign: Sign::Pos, symbol: p.clone(), args: vec![Term::Variable(x)] }),
                weight: Box::new(Term::Domain(DomainElement::Int(1), sort)),
            },
        });
        let mut structure = Structure::new();
        structure.declare_symbol(p);
        let options = Options { ground_with_bounds: false, nb_models: 0, ..Options::default() };
        let flag = TerminationFlag::new();
        let mut solver = BruteForceSolver::new();
        let result = modelexpand(&theory, &structure, &options, &mut solver, &flag).unwrap();
        assert!(!result.unsat);
        assert_eq!(result.models.len(), 3);
    }

    /// §8 scenario 3 (function totality, encoded as an explicit graph
    /// predicate since an open [`crate::vocabulary::Symbol::Function`]'s
    /// denotation routes through the CP sub-theory, which
    /// [`crate::solver::reference::BruteForceSolver`] refuses): `fg` total
    /// and single-valued from a 2-element sort to a 2-element sort has
    /// exactly `2 * 2 = 4` models, one per graph of an actual function.
    #[test]
    #[cfg(feature = "test-solver")]
    fn modelexpand_counts_models_of_a_total_function_graph() {
        use crate::solver::reference::BruteForceSolver;
        use crate::theory::{BoolKind, Quantifier, Term};

        let sort = Sort::new("N", SortTable::IntRange(1, 2));
        let fg = Symbol::Predicate(Rc::new(Predicate::new("fg", vec![sort.clone(), sort.clone()])));
        let a = Variable::new("a", sort.clone());
        let atom = |b: i64| Formula::Atom {
            sign: Sign::Pos,
            symbol: fg.clone(),
            args: vec![Term::Variable(a.clone()), Term::Domain(DomainElement::Int(b), sort.clone())],
        };
        let exists_b = Formula::disj(vec![atom(1), atom(2)]);
        let unique_b = Formula::Bool { sign: Sign::Neg, kind: BoolKind::Conj, subs: vec![atom(1), atom(2)] };
        let totality = Formula::Quant {
            sign: Sign::Pos,
            quant: Quantifier::Forall,
            var: a.clone(),
            body: Box::new(Formula::conj(vec![exists_b, unique_b])),
        };
        let mut theory = Theory::new();
        theory.sentences.push(totality);
        let mut structure = Structure::new();
        structure.declare_symbol(fg);
        let options = Options { ground_with_bounds: false, nb_models: 0, ..Options::default() };
        let flag = TerminationFlag::new();
        let mut solver = BruteForceSolver::new();
        let result = modelexpand(&theory, &structure, &options, &mut solver, &flag).unwrap();
        assert!(!result.unsat);
        assert_eq!(result.models.len(), 4);
    }
}
