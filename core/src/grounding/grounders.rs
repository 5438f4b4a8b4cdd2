//! The grounder tree itself (§4.6): one small struct per formula/term shape,
//! each holding exactly the state it needs to be run again (a generator, a
//! child grounder, the symbol it grounds an atom of), built once by
//! [`super::factory`] and then driven to completion by
//! [`TheoryGrounder::run`].

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{GroundingError, Result};
use crate::generators::{DomElemContainer, Generator, SortGenerator};
use crate::solver::ecnf::{AggLine, GroundTheory, RuleLine, SetLine};
use crate::solver::{CpBound, CpTerm, GroundTerm, GroundTranslator, TsSet};
use crate::structure::Structure;
use crate::theory::{BoolKind, Quantifier, Sign, Term};
use crate::vocabulary::{BuiltinFunction, BuiltinPredicate, DomainElement, Symbol};

use super::context::{conjoin, to_literal, ConjOrDisj, GroundingContext};

/// `Variable name -> container` map shared, by `Rc`-cloning the cells
/// themselves, between a grounder and every child built under it (§4.5).
pub type Bindings = HashMap<String, DomElemContainer>;

/// A term-level grounder (§4.6 `DenotationGrounder`): evaluates a term to a
/// [`GroundTerm`] under the current variable bindings.
pub trait TermGrounder: fmt::Debug {
    fn ground(&mut self, translator: &mut GroundTranslator, structure: &Structure) -> Result<GroundTerm>;
}

/// A formula-level grounder (§4.6): evaluates to a [`ConjOrDisj`] under the
/// current bindings, appending whatever clauses/sets/etc it needed along the
/// way into `theory`.
pub trait Grounder: fmt::Debug {
    fn ground(&mut self, translator: &mut GroundTranslator, theory: &mut GroundTheory, structure: &Structure, ctx: &GroundingContext) -> Result<ConjOrDisj>;
}

/// §4.6 `DenotationGrounder`: the one term evaluator every other grounder
/// delegates to for its arguments.
#[derive(Debug, Clone)]
pub struct DenotationGrounder {
    term: Term,
    bindings: Bindings,
}

impl DenotationGrounder {
    pub fn new(term: Term, bindings: Bindings) -> Self {
        Self { term, bindings }
    }

    fn eval(term: &Term, bindings: &Bindings, translator: &mut GroundTranslator, structure: &Structure) -> Result<GroundTerm> {
        match term {
            Term::Variable(v) => {
                let container = bindings
                    .get(&v.name)
                    .ok_or_else(|| GroundingError::InvariantViolation(format!("variable {} is unbound during grounding", v.name)))?;
                let value = container
                    .get()
                    .ok_or_else(|| GroundingError::InvariantViolation(format!("variable {} read before a generator assigned it", v.name)))?;
                Ok(GroundTerm::Domain(value))
            }
            Term::Domain(d, _sort) => Ok(GroundTerm::Domain(d.clone())),
            Term::Func(symbol, args) => Self::eval_func(symbol, args, bindings, translator, structure),
            Term::Agg(agg_type, set) => Self::eval_agg_term(*agg_type, set, bindings, translator, structure),
        }
    }

    fn eval_func(symbol: &Symbol, args: &[Term], bindings: &Bindings, translator: &mut GroundTranslator, structure: &Structure) -> Result<GroundTerm> {
        let mut grounded = Vec::with_capacity(args.len());
        for a in args {
            grounded.push(Self::eval(a, bindings, translator, structure)?);
        }
        let concrete: Option<Vec<DomainElement>> = grounded.iter().map(|g| g.as_domain().cloned()).collect();
        match symbol {
            Symbol::Function(f) if f.is_builtin() => {
                let elems = concrete.ok_or_else(|| GroundingError::NotYetImplemented("builtin function applied to a lazy (CP) argument".into()))?;
                Ok(GroundTerm::Domain(Self::eval_builtin(f.builtin.expect("is_builtin checked above"), &elems)?))
            }
            Symbol::Function(f) => match concrete {
                Some(elems) => {
                    let interp = structure.interpretation(&f.name).ok_or_else(|| GroundingError::InvariantViolation(format!("no interpretation for {}", f.name)))?;
                    let func_interp = interp
                        .as_function()
                        .ok_or_else(|| GroundingError::InvariantViolation(format!("{} is declared as a function but interpreted as a predicate", f.name)))?;
                    match func_interp.value(&elems) {
                        Some(v) => Ok(GroundTerm::Domain(v.clone())),
                        None => Ok(GroundTerm::Var(translator.get_or_create_var(symbol, grounded, f.output.clone()))),
                    }
                }
                None => Ok(GroundTerm::Var(translator.get_or_create_var(symbol, grounded, f.output.clone()))),
            },
            Symbol::Predicate(_) => Err(GroundingError::InvariantViolation("a predicate symbol cannot be used as a term".into())),
        }
    }

    fn eval_builtin(f: BuiltinFunction, args: &[DomainElement]) -> Result<DomainElement> {
        let as_f64 = |i: usize| -> Result<f64> { args[i].as_f64().ok_or_else(|| GroundingError::InvariantViolation(format!("{:?} expects a numeric argument", f))) };
        let result = match f {
            BuiltinFunction::Plus => as_f64(0)? + as_f64(1)?,
            BuiltinFunction::Minus => as_f64(0)? - as_f64(1)?,
            BuiltinFunction::Times => as_f64(0)? * as_f64(1)?,
            BuiltinFunction::Div => as_f64(0)? / as_f64(1)?,
            BuiltinFunction::UnaryMinus => -as_f64(0)?,
            BuiltinFunction::Abs => as_f64(0)?.abs(),
            BuiltinFunction::Mod => as_f64(0)?.rem_euclid(as_f64(1)?),
            BuiltinFunction::Exp => as_f64(0)?.powf(as_f64(1)?),
            BuiltinFunction::Card | BuiltinFunction::Min | BuiltinFunction::Max | BuiltinFunction::Sum | BuiltinFunction::Prod => {
                return Err(GroundingError::InvariantViolation(format!("{:?} is an aggregate, not a scalar function", f)));
            }
        };
        if matches!(args[0], DomainElement::Int(_)) && matches!(f, BuiltinFunction::Plus | BuiltinFunction::Minus | BuiltinFunction::Times | BuiltinFunction::UnaryMinus | BuiltinFunction::Abs | BuiltinFunction::Mod)
        {
            Ok(DomainElement::Int(result as i64))
        } else {
            Ok(DomainElement::Float(crate::vocabulary::OrdFloat(result)))
        }
    }

    /// §4.8 "Aggregate terms": evaluated directly against the structure,
    /// folding the weight of every ct-true member of the set according to
    /// `agg_type`. Only sound when the set's condition and every member's
    /// weight are already two-valued for every combination; a genuinely
    /// three-valued aggregate nested inside an arbitrary term (rather than
    /// compared directly in an `AggCompare`, which `AggGrounder` handles
    /// with full reification) falls back to `NotYetImplemented` rather than
    /// silently picking an arbitrary value.
    fn eval_agg_term(agg_type: BuiltinFunction, set: &crate::theory::QuantSetExpr, bindings: &Bindings, translator: &mut GroundTranslator, structure: &Structure) -> Result<GroundTerm> {
        let (weights, unknown) = collect_set_members(set, bindings, translator, structure)?;
        if unknown {
            return Err(GroundingError::NotYetImplemented("three-valued aggregate term nested inside an arbitrary function argument".into()));
        }
        let value = match agg_type {
            BuiltinFunction::Card => weights.len() as f64,
            BuiltinFunction::Sum => weights.iter().sum(),
            BuiltinFunction::Prod => weights.iter().product(),
            BuiltinFunction::Min => weights
                .iter()
                .cloned()
                .fold(None, |acc: Option<f64>, w| Some(acc.map_or(w, |a| a.min(w))))
                .ok_or_else(|| GroundingError::NotYetImplemented("min aggregate over an empty set has no value".into()))?,
            BuiltinFunction::Max => weights
                .iter()
                .cloned()
                .fold(None, |acc: Option<f64>, w| Some(acc.map_or(w, |a| a.max(w))))
                .ok_or_else(|| GroundingError::NotYetImplemented("max aggregate over an empty set has no value".into()))?,
            _ => return Err(GroundingError::InvariantViolation(format!("{:?} is not an aggregate function", agg_type))),
        };
        Ok(GroundTerm::Domain(DomainElement::Float(crate::vocabulary::OrdFloat(value))))
    }
}

/// Enumerates every tuple of `set.vars` satisfying `set.condition` and
/// returns `(weight of every ct-true member, saw_an_undetermined_one)`.
fn collect_set_members(set: &crate::theory::QuantSetExpr, bindings: &Bindings, translator: &mut GroundTranslator, structure: &Structure) -> Result<(Vec<f64>, bool)> {
    let mut local = bindings.clone();
    let mut gens: Vec<Box<dyn Generator>> = Vec::with_capacity(set.vars.len());
    for v in &set.vars {
        let container = DomElemContainer::new();
        let Some(g) = SortGenerator::new(&v.sort, container.clone()) else {
            return Err(GroundingError::NotYetImplemented("aggregate set ranging over an infinite sort".into()));
        };
        local.insert(v.name.clone(), container);
        gens.push(Box::new(g));
    }
    let mut weights = Vec::new();
    let mut unknown = false;
    enumerate_nested(&mut gens, 0, &mut |translator, structure| -> Result<()> {
        let cond = DenotationGrounder::eval_condition(&set.condition, &local, translator, structure)?;
        match cond {
            Some(true) => {
                let w = DenotationGrounder::eval(&set.weight, &local, translator, structure)?;
                match w.as_domain().and_then(|d| d.as_f64()) {
                    Some(f) => weights.push(f),
                    None => unknown = true,
                }
            }
            Some(false) => {}
            None => unknown = true,
        }
        Ok(())
    }, translator, structure)?;
    Ok((weights, unknown))
}

/// Drives a stack of independent [`Generator`]s through their full
/// Cartesian product, invoking `visit` once per combination (used only by
/// the small, self-contained aggregate-term evaluator above; the main
/// quantifier grounder instead nests one generator per `QuantGrounder`
/// level so each level can be cost-ordered independently, §4.4).
fn enumerate_nested(gens: &mut [Box<dyn Generator>], idx: usize, visit: &mut dyn FnMut(&mut GroundTranslator, &Structure) -> Result<()>, translator: &mut GroundTranslator, structure: &Structure) -> Result<()> {
    if idx == gens.len() {
        return visit(translator, structure);
    }
    gens[idx].reset();
    while gens[idx].next() {
        enumerate_nested(gens, idx + 1, visit, translator, structure)?;
    }
    Ok(())
}

impl DenotationGrounder {
    /// A formula condition evaluated purely against the structure (no
    /// Tseitin reification): `Some(true)`/`Some(false)` when the atom is
    /// already two-valued for this tuple, `None` otherwise.
    fn eval_condition(f: &crate::theory::Formula, bindings: &Bindings, translator: &mut GroundTranslator, structure: &Structure) -> Result<Option<bool>> {
        use crate::theory::Formula;
        match f {
            Formula::Atom { sign, symbol, args } => {
                let mut elems = Vec::with_capacity(args.len());
                for a in args {
                    match Self::eval(a, bindings, translator, structure)?.as_domain() {
                        Some(d) => elems.push(d.clone()),
                        None => return Ok(None),
                    }
                }
                let Some(interp) = structure.interpretation(symbol.name()) else { return Ok(None) };
                let truth = interp.predicate_view().truth_value(&elems);
                Ok(truth.map(|t| sign.apply(if t { Sign::Pos } else { Sign::Neg }) == Sign::Pos))
            }
            Formula::Bool { sign, kind, subs } => {
                let mut values = Vec::with_capacity(subs.len());
                for s in subs {
                    match Self::eval_condition(s, bindings, translator, structure)? {
                        Some(v) => values.push(v),
                        None => return Ok(None),
                    }
                }
                let combined = match kind {
                    BoolKind::Conj => values.into_iter().all(|v| v),
                    BoolKind::Disj => values.into_iter().any(|v| v),
                };
                Ok(Some(sign.apply(if combined { Sign::Pos } else { Sign::Neg }) == Sign::Pos))
            }
            Formula::Compare { sign, terms, ops } => {
                let mut elems = Vec::with_capacity(terms.len());
                for t in terms {
                    match Self::eval(t, bindings, translator, structure)?.as_domain().and_then(|d| d.as_f64()) {
                        Some(v) => elems.push(v),
                        None => return Ok(None),
                    }
                }
                let mut ok = true;
                for (pair, op) in elems.windows(2).zip(ops.iter()) {
                    ok &= op.eval(pair[0], pair[1]);
                }
                Ok(Some(sign.apply(if ok { Sign::Pos } else { Sign::Neg }) == Sign::Pos))
            }
            _ => Ok(None),
        }
    }
}

impl TermGrounder for DenotationGrounder {
    fn ground(&mut self, translator: &mut GroundTranslator, structure: &Structure) -> Result<GroundTerm> {
        Self::eval(&self.term, &self.bindings, translator, structure)
    }
}

/// §4.6 `AtomGrounder`.
#[derive(Debug)]
pub struct AtomGrounder {
    sign: Sign,
    symbol: Symbol,
    args: Vec<DenotationGrounder>,
}

impl AtomGrounder {
    pub fn new(sign: Sign, symbol: Symbol, args: Vec<DenotationGrounder>) -> Self {
        Self { sign, symbol, args }
    }
}

impl Grounder for AtomGrounder {
    fn ground(&mut self, translator: &mut GroundTranslator, _theory: &mut GroundTheory, structure: &Structure, _ctx: &GroundingContext) -> Result<ConjOrDisj> {
        let mut grounded = Vec::with_capacity(self.args.len());
        for a in &mut self.args {
            grounded.push(a.ground(translator, structure)?);
        }
        let concrete: Option<Vec<DomainElement>> = grounded.iter().map(|g| g.as_domain().cloned()).collect();
        if let Some(elems) = &concrete {
            if let Some(interp) = structure.interpretation(self.symbol.name()) {
                if let Some(truth) = interp.predicate_view().truth_value(elems) {
                    let result = if truth { ConjOrDisj::True } else { ConjOrDisj::False };
                    return Ok(result.apply_sign(self.sign));
                }
            }
        }
        let lit = match concrete {
            Some(elems) => translator.translate_reduced(&self.symbol, &elems),
            None => translator.translate(&self.symbol, &grounded),
        };
        Ok(ConjOrDisj::literal(lit).apply_sign(self.sign))
    }
}

/// §4.6 `ComparisonGrounder`: a 2-term comparison (theories are normalised
/// via `remove_eq_chains` before a grounder tree is built, so every
/// `Formula::Compare` the factory hands this a single operator over).
#[derive(Debug)]
pub struct ComparisonGrounder {
    sign: Sign,
    op: BuiltinPredicate,
    lhs: DenotationGrounder,
    rhs: DenotationGrounder,
}

impl ComparisonGrounder {
    pub fn new(sign: Sign, op: BuiltinPredicate, lhs: DenotationGrounder, rhs: DenotationGrounder) -> Self {
        Self { sign, op, lhs, rhs }
    }
}

impl Grounder for ComparisonGrounder {
    fn ground(&mut self, translator: &mut GroundTranslator, _theory: &mut GroundTheory, structure: &Structure, _ctx: &GroundingContext) -> Result<ConjOrDisj> {
        let lhs = self.lhs.ground(translator, structure)?;
        let rhs = self.rhs.ground(translator, structure)?;
        match (lhs.as_domain().and_then(|d| d.as_f64()), rhs.as_domain().and_then(|d| d.as_f64())) {
            (Some(l), Some(r)) => {
                let result = if self.op.eval(l, r) { ConjOrDisj::True } else { ConjOrDisj::False };
                Ok(result.apply_sign(self.sign))
            }
            _ => {
                let term = match &lhs {
                    GroundTerm::Var(v) => CpTerm::Var(*v),
                    GroundTerm::Domain(d) => CpTerm::Const(d.as_f64().unwrap_or(0.0) as i64),
                };
                let bound = match &rhs {
                    GroundTerm::Var(v) => CpBound::Var(*v),
                    GroundTerm::Domain(d) => CpBound::Const(d.as_f64().unwrap_or(0.0) as i64),
                };
                let lit = translator.reify_cp(term, self.op, bound, crate::solver::TsType::Eq);
                Ok(ConjOrDisj::literal(lit).apply_sign(self.sign))
            }
        }
    }
}

/// §4.6 `BoolGrounder`.
#[derive(Debug)]
pub struct BoolGrounder {
    sign: Sign,
    kind: BoolKind,
    subs: Vec<Box<dyn Grounder>>,
}

impl BoolGrounder {
    pub fn new(sign: Sign, kind: BoolKind, subs: Vec<Box<dyn Grounder>>) -> Self {
        Self { sign, kind, subs }
    }
}

impl Grounder for BoolGrounder {
    fn ground(&mut self, translator: &mut GroundTranslator, theory: &mut GroundTheory, structure: &Structure, ctx: &GroundingContext) -> Result<ConjOrDisj> {
        let child_ctx = ctx.descend_bool(self.kind);
        let mut results = Vec::with_capacity(self.subs.len());
        for s in &mut self.subs {
            results.push(s.ground(translator, theory, structure, &child_ctx)?);
        }
        Ok(conjoin(results, self.kind, translator, theory).apply_sign(self.sign))
    }
}

/// A pre-decided constant (§3 `Formula::Bool0`): produced by simplification
/// passes upstream, not by a hand-authored theory, but valid input
/// everywhere a grounder is expected.
#[derive(Debug)]
pub struct ConstGrounder {
    value: bool,
}

impl ConstGrounder {
    pub fn new(value: bool) -> Self {
        Self { value }
    }
}

impl Grounder for ConstGrounder {
    fn ground(&mut self, _translator: &mut GroundTranslator, _theory: &mut GroundTheory, _structure: &Structure, _ctx: &GroundingContext) -> Result<ConjOrDisj> {
        Ok(if self.value { ConjOrDisj::True } else { ConjOrDisj::False })
    }
}

/// §4.6 `QuantGrounder`: owns the container its body reads `var` through
/// and a generator over `var`'s sort (the AST-level grounder always
/// enumerates the full sort; the cost-ordered, BDD-backed selectivity of
/// §4.4 already lives in `generators::bdd` for the propagation path).
/// The container the generator writes `var`'s current value into lives
/// inside `generator` itself and inside whatever [`Bindings`] map the
/// factory threaded through `body`; `QuantGrounder` only has to drive the
/// generator, not hold the cell separately.
#[derive(Debug)]
pub struct QuantGrounder {
    sign: Sign,
    quant: Quantifier,
    generator: Box<dyn Generator>,
    body: Box<dyn Grounder>,
}

impl QuantGrounder {
    pub fn new(sign: Sign, quant: Quantifier, generator: Box<dyn Generator>, body: Box<dyn Grounder>) -> Self {
        Self { sign, quant, generator, body }
    }
}

impl Grounder for QuantGrounder {
    fn ground(&mut self, translator: &mut GroundTranslator, theory: &mut GroundTheory, structure: &Structure, ctx: &GroundingContext) -> Result<ConjOrDisj> {
        let kind = match self.quant {
            Quantifier::Forall => BoolKind::Conj,
            Quantifier::Exists => BoolKind::Disj,
        };
        let child_ctx = ctx.descend_bool(kind);
        self.generator.reset();
        let mut results = Vec::new();
        while self.generator.next() {
            results.push(self.body.ground(translator, theory, structure, &child_ctx)?);
        }
        Ok(conjoin(results, kind, translator, theory).apply_sign(self.sign))
    }
}

/// §4.6 `EquivGrounder`: `lhs <-> rhs`, expanded as `(lhs ∧ rhs) ∨ (¬lhs ∧
/// ¬rhs)` in terms of the same combinators every other Boolean grounder
/// uses, rather than emitting the two implication clauses directly.
#[derive(Debug)]
pub struct EquivGrounder {
    sign: Sign,
    lhs: Box<dyn Grounder>,
    rhs: Box<dyn Grounder>,
}

impl EquivGrounder {
    pub fn new(sign: Sign, lhs: Box<dyn Grounder>, rhs: Box<dyn Grounder>) -> Self {
        Self { sign, lhs, rhs }
    }
}

impl Grounder for EquivGrounder {
    fn ground(&mut self, translator: &mut GroundTranslator, theory: &mut GroundTheory, structure: &Structure, ctx: &GroundingContext) -> Result<ConjOrDisj> {
        let lhs = self.lhs.ground(translator, theory, structure, ctx)?;
        let rhs = self.rhs.ground(translator, theory, structure, ctx)?;
        let both = conjoin(vec![lhs.clone(), rhs.clone()], BoolKind::Conj, translator, theory);
        let neither = conjoin(vec![lhs.negate(), rhs.negate()], BoolKind::Conj, translator, theory);
        Ok(conjoin(vec![both, neither], BoolKind::Disj, translator, theory).apply_sign(self.sign))
    }
}

/// §4.8 `AggGrounder`: `term <comp> agg{set}`, reified through
/// [`GroundTranslator::reify_agg`] once the weighted set itself has been
/// built and registered.
#[derive(Debug)]
pub struct AggGrounder {
    sign: Sign,
    term: DenotationGrounder,
    comp: BuiltinPredicate,
    agg_type: BuiltinFunction,
    set_condition: Box<dyn Grounder>,
    set_weight: DenotationGrounder,
    set_generators: Vec<Box<dyn Generator>>,
}

impl AggGrounder {
    pub fn new(
        sign: Sign,
        term: DenotationGrounder,
        comp: BuiltinPredicate,
        agg_type: BuiltinFunction,
        set_condition: Box<dyn Grounder>,
        set_weight: DenotationGrounder,
        set_generators: Vec<Box<dyn Generator>>,
    ) -> Self {
        Self { sign, term, comp, agg_type, set_condition, set_weight, set_generators }
    }
}

impl Grounder for AggGrounder {
    fn ground(&mut self, translator: &mut GroundTranslator, theory: &mut GroundTheory, structure: &Structure, ctx: &GroundingContext) -> Result<ConjOrDisj> {
        let bound = self.term.ground(translator, structure)?;
        let bound = bound.as_domain().cloned().ok_or_else(|| GroundingError::NotYetImplemented("aggregate bound term is itself a CP variable".into()))?;
        let bound_f64 = bound.as_f64().unwrap_or(0.0);
        let mut members = Vec::new();
        ground_nested(&mut self.set_generators, 0, &mut |translator, theory| {
            let cond = self.set_condition.ground(translator, theory, structure, ctx)?;
            let lit = to_literal(cond, translator, theory);
            let weight = self.set_weight.ground(translator, structure)?;
            let weight = weight.as_domain().and_then(|d| d.as_f64()).unwrap_or(0.0);
            members.push((lit, weight));
            Ok(())
        }, translator, theory)?;
        let true_weight = members.iter().filter(|(l, _)| *l == crate::solver::TRUE_LIT).map(|(_, w)| w).sum();
        let set_id = translator.fresh_set(TsSet { literals: members.clone(), true_weight });
        theory.sets.push(SetLine { id: set_id, literals: members });
        let lit = translator.reify_agg(self.agg_type, self.comp, Sign::Pos, bound, set_id, ctx.tseitin);
        theory.aggs.push(AggLine { head: lit, set: set_id, agg_type: self.agg_type, comp: self.comp, sign: Sign::Pos, bound: bound_f64 });
        Ok(ConjOrDisj::literal(lit).apply_sign(self.sign))
    }
}

fn ground_nested(gens: &mut [Box<dyn Generator>], idx: usize, visit: &mut dyn FnMut(&mut GroundTranslator, &mut GroundTheory) -> Result<()>, translator: &mut GroundTranslator, theory: &mut GroundTheory) -> Result<()> {
    if idx == gens.len() {
        return visit(translator, theory);
    }
    gens[idx].reset();
    while gens[idx].next() {
        ground_nested(gens, idx + 1, visit, translator, theory)?;
    }
    Ok(())
}

/// §4.6 `RuleGrounder`: grounds one rule of an inductive definition over
/// every combination of its free variables, emitting one [`RuleLine`] per
/// combination.
#[derive(Debug)]
pub struct RuleGrounder {
    head_symbol: Symbol,
    head_args: Vec<DenotationGrounder>,
    body: Box<dyn Grounder>,
    generators: Vec<Box<dyn Generator>>,
    definition: usize,
}

impl RuleGrounder {
    pub fn new(head_symbol: Symbol, head_args: Vec<DenotationGrounder>, body: Box<dyn Grounder>, generators: Vec<Box<dyn Generator>>, definition: usize) -> Self {
        Self { head_symbol, head_args, body, generators, definition }
    }

    pub fn run(&mut self, translator: &mut GroundTranslator, theory: &mut GroundTheory, structure: &Structure, ctx: &GroundingContext) -> Result<()> {
        let rule_ctx = ctx.enter_definition(self.definition);
        ground_nested(
            &mut self.generators,
            0,
            &mut |translator, theory| {
                let mut head_args = Vec::with_capacity(self.head_args.len());
                for a in &mut self.head_args {
                    head_args.push(a.ground(translator, structure)?);
                }
                let concrete: Option<Vec<DomainElement>> = head_args.iter().map(|g| g.as_domain().cloned()).collect();
                let head = match concrete {
                    Some(elems) => translator.translate_reduced(&self.head_symbol, &elems),
                    None => translator.translate(&self.head_symbol, &head_args),
                };
                let body = self.body.ground(translator, theory, structure, &rule_ctx)?;
                let (conjunctive, lits) = match body {
                    ConjOrDisj::True => (true, vec![crate::solver::TRUE_LIT]),
                    ConjOrDisj::False => (true, vec![crate::solver::FALSE_LIT]),
                    ConjOrDisj::Literals(kind, lits) => (kind == BoolKind::Conj, lits),
                };
                theory.rules.push(RuleLine { head, body: lits, conjunctive, definition: self.definition });
                Ok(())
            },
            translator,
            theory,
        )
    }
}

/// §4.6/§4.7 `DefinitionGrounder`: runs every rule of one definition.
#[derive(Debug)]
pub struct DefinitionGrounder {
    rules: Vec<RuleGrounder>,
}

impl DefinitionGrounder {
    pub fn new(rules: Vec<RuleGrounder>) -> Self {
        Self { rules }
    }

    pub fn run(&mut self, translator: &mut GroundTranslator, theory: &mut GroundTheory, structure: &Structure, ctx: &GroundingContext) -> Result<()> {
        for rule in &mut self.rules {
            rule.run(translator, theory, structure, ctx)?;
        }
        Ok(())
    }
}

/// §4.6 `TheoryGrounder`: the root driver. A top-level sentence's
/// [`ConjOrDisj`] result is emitted directly as CNF (§4.6 "top-level
/// emission"): `True` is dropped, `False` short-circuits as the empty
/// clause, a conjunction becomes one unit clause per literal, a disjunction
/// becomes a single clause.
#[derive(Debug)]
pub struct TheoryGrounder {
    sentences: Vec<Box<dyn Grounder>>,
    definitions: Vec<DefinitionGrounder>,
}

impl TheoryGrounder {
    pub fn new(sentences: Vec<Box<dyn Grounder>>, definitions: Vec<DefinitionGrounder>) -> Self {
        Self { sentences, definitions }
    }

    pub fn run(&mut self, translator: &mut GroundTranslator, structure: &Structure) -> Result<GroundTheory> {
        let mut theory = GroundTheory::new();
        let ctx = GroundingContext::root();
        for sentence in &mut self.sentences {
            let result = sentence.ground(translator, &mut theory, structure, &ctx)?;
            match result {
                ConjOrDisj::True => {}
                ConjOrDisj::False => theory.add_clause(vec![]),
                ConjOrDisj::Literals(BoolKind::Conj, lits) => {
                    for l in lits {
                        theory.add_clause(vec![l]);
                    }
                }
                ConjOrDisj::Literals(BoolKind::Disj, lits) => theory.add_clause(lits),
            }
        }
        for def in &mut self.definitions {
            def.run(translator, &mut theory, structure, &ctx)?;
        }
        Ok(theory)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vocabulary::{Predicate, Sort, SortTable};

    fn unit_sort() -> Rc<Sort> {
        Sort::new("N", SortTable::IntRange(1, 2))
    }

    #[test]
    fn atom_grounder_reads_known_truth_value_without_a_literal() {
        let sort = unit_sort();
        let symbol = Symbol::Predicate(Rc::new(Predicate::new("p", vec![sort.clone()])));
        let mut structure = Structure::new();
        structure.declare_symbol(symbol.clone());
        if let Some(crate::structure::Interpretation::Predicate(p)) = structure.interpretation_mut("p") {
            p.make_true(vec![DomainElement::Int(1)]).unwrap();
        }
        let arg = DenotationGrounder::new(Term::Domain(DomainElement::Int(1), sort), Bindings::new());
        let mut grounder = AtomGrounder::new(Sign::Pos, symbol, vec![arg]);
        let mut translator = GroundTranslator::new();
        let mut theory = GroundTheory::new();
        let ctx = GroundingContext::root();
        let result = grounder.ground(&mut translator, &mut theory, &structure, &ctx).unwrap();
        assert_eq!(result, ConjOrDisj::True);
    }

    #[test]
    fn atom_grounder_allocates_a_literal_for_unknown_truth_value() {
        let sort = unit_sort();
        let symbol = Symbol::Predicate(Rc::new(Predicate::new("p", vec![sort.clone()])));
        let mut structure = Structure::new();
        structure.declare_symbol(symbol.clone());
        let arg = DenotationGrounder::new(Term::Domain(DomainElement::Int(1), sort), Bindings::new());
        let mut grounder = AtomGrounder::new(Sign::Pos, symbol, vec![arg]);
        let mut translator = GroundTranslator::new();
        let mut theory = GroundTheory::new();
        let ctx = GroundingContext::root();
        let result = grounder.ground(&mut translator, &mut theory, &structure, &ctx).unwrap();
        assert!(matches!(result, ConjOrDisj::Literals(BoolKind::Disj, _)));
    }

    #[test]
    fn theory_grounder_emits_unit_clauses_for_a_conjunction() {
        let sort = unit_sort();
        let p = Symbol::Predicate(Rc::new(Predicate::new("p", vec![sort.clone()])));
        let q = Symbol::Predicate(Rc::new(Predicate::new("q", vec![sort.clone()])));
        let mut structure = Structure::new();
        structure.declare_symbol(p.clone());
        structure.declare_symbol(q.clone());
        let arg_p = DenotationGrounder::new(Term::Domain(DomainElement::Int(1), sort.clone()), Bindings::new());
        let arg_q = DenotationGrounder::new(Term::Domain(DomainElement::Int(1), sort), Bindings::new());
        let atom_p: Box<dyn Grounder> = Box::new(AtomGrounder::new(Sign::Pos, p, vec![arg_p]));
        let atom_q: Box<dyn Grounder> = Box::new(AtomGrounder::new(Sign::Pos, q, vec![arg_q]));
        let conj: Box<dyn Grounder> = Box::new(BoolGrounder::new(Sign::Pos, BoolKind::Conj, vec![atom_p, atom_q]));
        let mut grounder = TheoryGrounder::new(vec![conj], vec![]);
        let mut translator = GroundTranslator::new();
        let theory = grounder.run(&mut translator, &structure).unwrap();
        assert_eq!(theory.clauses.len(), 2);
        assert!(theory.clauses.iter().all(|c| c.len() == 1));
    }
}
