//! Builds a [`super::grounders::TheoryGrounder`] from a [`Theory`] (§4.6
//! "Grounder factory"): one recursive descent over the `Formula`/`Term` AST,
//! mirroring `build_formula`/`build_term` rather than the source's visitor
//! dispatch, since this AST is a closed enum instead of an open class
//! hierarchy (§9).
//!
//! Every sentence and rule body is run through
//! [`crate::theory::normalize::remove_eq_chains`] first, so every
//! `Formula::Compare` this module ever sees carries exactly one operator
//! over two terms. `graph_functions`/`graph_aggregates` are deliberately
//! *not* applied here: those rewrites exist to let the FOBDD-backed bounds
//! propagator (§4.3) reason about functions/aggregates as graphed
//! predicates, but this grounder tree evaluates `Term::Func`/`Term::Agg`
//! directly via [`grounders::DenotationGrounder`], so graphing them first
//! would only throw away information the direct evaluator could have used.

use crate::error::{GroundingError, Result};
use crate::generators::{DomElemContainer, Generator, SortGenerator};
use crate::structure::Structure;
use crate::theory::normalize::remove_eq_chains;
use crate::theory::{Definition, Formula, Rule, Term, Theory, Variable};

use super::grounders::{
    AggGrounder, AtomGrounder, Bindings, BoolGrounder, ComparisonGrounder, ConstGrounder, DefinitionGrounder, DenotationGrounder, EquivGrounder, Grounder, QuantGrounder, RuleGrounder, TheoryGrounder,
};

/// Builds the full grounder tree for `theory` (§4.6). `structure` is not
/// consulted here (it is only read once grounding actually runs) but is
/// taken for symmetry with the rest of the pipeline's entry points and so a
/// future cost-driven generator choice (§4.2) has it available without a
/// signature change.
pub fn build(theory: &Theory, _structure: &Structure) -> Result<TheoryGrounder> {
    let empty = Bindings::new();
    let mut sentences = Vec::with_capacity(theory.sentences.len());
    for f in &theory.sentences {
        let normalized = remove_eq_chains(f.clone());
        sentences.push(build_formula(&normalized, &empty)?);
    }
    let mut definitions = Vec::with_capacity(theory.definitions.len());
    for d in &theory.definitions {
        definitions.push(build_definition(d)?);
    }
    Ok(TheoryGrounder::new(sentences, definitions))
}

fn build_term(t: &Term, bindings: &Bindings) -> DenotationGrounder {
    DenotationGrounder::new(t.clone(), bindings.clone())
}

/// One (container, generator) pair per variable, and the `bindings` map
/// extended with all of them: the shape every binder (`Quant`, `AggCompare`
/// set, `Rule`) needs before it can build its body/head under the new scope.
fn bind_vars(vars: &[Variable], bindings: &Bindings) -> Result<(Bindings, Vec<Box<dyn Generator>>)> {
    let mut extended = bindings.clone();
    let mut generators: Vec<Box<dyn Generator>> = Vec::with_capacity(vars.len());
    for v in vars {
        let container = DomElemContainer::new();
        let Some(gen) = SortGenerator::new(&v.sort, container.clone()) else {
            return Err(GroundingError::NotYetImplemented(format!("quantification over the infinite sort {}", v.sort.name)));
        };
        extended.insert(v.name.clone(), container);
        generators.push(Box::new(gen));
    }
    Ok((extended, generators))
}

fn build_formula(f: &Formula, bindings: &Bindings) -> Result<Box<dyn Grounder>> {
    match f {
        Formula::Atom { sign, symbol, args } => {
            let args = args.iter().map(|t| build_term(t, bindings)).collect();
            Ok(Box::new(AtomGrounder::new(*sign, symbol.clone(), args)))
        }
        Formula::Compare { sign, terms, ops } if terms.len() == 2 && ops.len() == 1 => {
            let lhs = build_term(&terms[0], bindings);
            let rhs = build_term(&terms[1], bindings);
            Ok(Box::new(ComparisonGrounder::new(*sign, ops[0], lhs, rhs)))
        }
        Formula::Compare { sign, terms, ops } => {
            // Defensive fallback for a chain that reached here unnormalised
            // (e.g. built directly by a caller of this module rather than
            // through `Theory::sentences`): split it the same way
            // `remove_eq_chains` would.
            let mut conjuncts = Vec::with_capacity(ops.len());
            for i in 0..ops.len() {
                let lhs = build_term(&terms[i], bindings);
                let rhs = build_term(&terms[i + 1], bindings);
                conjuncts.push(Box::new(ComparisonGrounder::new(crate::theory::Sign::Pos, ops[i], lhs, rhs)) as Box<dyn Grounder>);
            }
            Ok(Box::new(BoolGrounder::new(*sign, crate::theory::BoolKind::Conj, conjuncts)))
        }
        Formula::Bool { sign, kind, subs } => {
            let subs = subs.iter().map(|s| build_formula(s, bindings)).collect::<Result<Vec<_>>>()?;
            Ok(Box::new(BoolGrounder::new(*sign, *kind, subs)))
        }
        Formula::Quant { sign, quant, var, body } => {
            let (extended, mut generators) = bind_vars(std::slice::from_ref(var), bindings)?;
            let generator = generators.pop().expect("bind_vars returns exactly one generator per variable");
            let body = build_formula(body, &extended)?;
            Ok(Box::new(QuantGrounder::new(*sign, *quant, generator, body)))
        }
        Formula::Equiv { sign, lhs, rhs } => {
            let lhs = build_formula(lhs, bindings)?;
            let rhs = build_formula(rhs, bindings)?;
            Ok(Box::new(EquivGrounder::new(*sign, lhs, rhs)))
        }
        Formula::AggCompare { sign, term, comp, agg, set } => {
            let (extended, generators) = bind_vars(&set.vars, bindings)?;
            let term = build_term(term, bindings);
            let condition = build_formula(&set.condition, &extended)?;
            let weight = build_term(&set.weight, &extended);
            Ok(Box::new(AggGrounder::new(*sign, term, *comp, *agg, condition, weight, generators)))
        }
        Formula::Bool0 { value } => Ok(Box::new(ConstGrounder::new(*value))),
    }
}

fn build_definition(d: &Definition) -> Result<DefinitionGrounder> {
    let mut rules = Vec::with_capacity(d.rules.len());
    for rule in &d.rules {
        rules.push(build_rule(rule, d.id)?);
    }
    Ok(DefinitionGrounder::new(rules))
}

fn build_rule(rule: &Rule, definition: usize) -> Result<RuleGrounder> {
    let empty = Bindings::new();
    let (extended, generators) = bind_vars(&rule.vars, &empty)?;
    let head_args = rule.head_args.iter().map(|t| build_term(t, &extended)).collect();
    let body = build_formula(&remove_eq_chains(rule.body.clone()), &extended)?;
    Ok(RuleGrounder::new(rule.head_symbol.clone(), head_args, body, generators, definition))
}

#[cfg(test)]
mod test {
    use std::rc::Rc;

    use super::*;
    use crate::solver::GroundTranslator;
    use crate::theory::{BoolKind, Quantifier, Sign};
    use crate::vocabulary::{DomainElement, Predicate, Sort, SortTable, Symbol};

    fn two_elem_sort() -> Rc<Sort> {
        Sort::new("N", SortTable::IntRange(1, 2))
    }

    #[test]
    fn builds_and_grounds_a_ground_atom() {
        let sort = two_elem_sort();
        let p = Symbol::Predicate(Rc::new(Predicate::new("p", vec![sort.clone()])));
        let mut theory = Theory::new();
        theory.sentences.push(Formula::Atom { sign: Sign::Pos, symbol: p, args: vec![Term::Domain(DomainElement::Int(1), sort)] });
        let structure = Structure::new();
        let mut grounder = build(&theory, &structure).unwrap();
        let mut translator = GroundTranslator::new();
        let ground = grounder.run(&mut translator, &structure).unwrap();
        assert_eq!(ground.clauses.len(), 1);
        assert_eq!(ground.clauses[0].len(), 1);
    }

    #[test]
    fn builds_and_grounds_a_universally_quantified_sentence() {
        let sort = two_elem_sort();
        let p = Symbol::Predicate(Rc::new(Predicate::new("p", vec![sort.clone()])));
        let x = Variable::new("x", sort);
        let mut theory = Theory::new();
        theory.sentences.push(Formula::Quant {
            sign: Sign::Pos,
            quant: Quantifier::Forall,
            var: x.clone(),
            body: Box::new(Formula::Atom { sign: Sign::Pos, symbol: p, args: vec![Term::Variable(x)] }),
        });
        let structure = Structure::new();
        let mut grounder = build(&theory, &structure).unwrap();
        let mut translator = GroundTranslator::new();
        let ground = grounder.run(&mut translator, &structure).unwrap();
        // One unit clause per domain element (a 2-element sort, conjunctive top level).
        assert_eq!(ground.clauses.len(), 2);
    }

    #[test]
    fn builds_a_rule_body_for_an_inductive_definition() {
        let sort = two_elem_sort();
        let t = Symbol::Predicate(Rc::new(Predicate::new("t", vec![sort.clone()])));
        let e = Symbol::Predicate(Rc::new(Predicate::new("e", vec![sort.clone()])));
        let x = Variable::new("x", sort);
        let rule = Rule {
            vars: vec![x.clone()],
            head_symbol: t,
            head_args: vec![Term::Variable(x.clone())],
            body: Formula::Atom { sign: Sign::Pos, symbol: e, args: vec![Term::Variable(x)] },
        };
        let def = Definition { id: 0, rules: vec![rule] };
        let mut theory = Theory::new();
        theory.definitions.push(def);
        let structure = Structure::new();
        let mut grounder = build(&theory, &structure).unwrap();
        let mut translator = GroundTranslator::new();
        let ground = grounder.run(&mut translator, &structure).unwrap();
        assert_eq!(ground.rules.len(), 2);
        assert!(ground.rules.iter().all(|r| r.definition == 0));
        let _ = BoolKind::Conj;
    }
}
