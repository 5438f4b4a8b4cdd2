//! Lazy grounding manager (§4.7, L4): instead of grounding every sentence
//! eagerly, a sentence may be registered with a **delay** (a conjunction of
//! atoms whose instantiation the manager watches for) and only grounded
//! once the translator actually mints a literal for one of them.
//!
//! Per-argument container matching (the source's `ContainerAtom` carrying a
//! watched *tuple*, not just a watched *symbol*) is not implemented here: a
//! delay in this crate watches a whole symbol becoming non-empty, not a
//! specific argument binding. Tracked as an open question in `DESIGN.md`
//! rather than silently narrowed.

use std::collections::{HashSet, VecDeque};

use crate::error::Result;
use crate::solver::ecnf::GroundTheory;
use crate::solver::{GroundTranslator, Lit};
use crate::structure::{Structure, Tuple};
use crate::theory::{BoolKind, Formula, Sign};
use crate::vocabulary::Symbol;

use super::context::{ConjOrDisj, GroundingContext};
use super::grounders::{Grounder, RuleGrounder};

/// One atom of a delay conjunction (§4.7 `ContainerAtom`, simplified to
/// symbol granularity, see the module doc comment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerAtom {
    pub symbol: Symbol,
    pub watched: bool,
}

pub type Delay = Vec<ContainerAtom>;

/// §4.7/§11 `FormulaUtils::findDelay`: looks for a flat conjunction of atoms
/// (under the polarity/connective implied by `monotone`) whose assignment
/// would short-circuit `f`. Anything deeper than one level of atoms under
/// one Boolean connective is left un-delayed; ground it immediately rather
/// than risk an unsound delay.
pub fn find_delay(f: &Formula) -> Option<Delay> {
    let mut out = Vec::new();
    if collect_delay(f, true, &mut out) && !out.is_empty() {
        Some(out)
    } else {
        None
    }
}

fn collect_delay(f: &Formula, monotone: bool, out: &mut Delay) -> bool {
    match f {
        Formula::Atom { sign, symbol, .. } => {
            let positive_occurrence = (*sign == Sign::Pos) == monotone;
            out.push(ContainerAtom { symbol: symbol.clone(), watched: !positive_occurrence });
            true
        }
        Formula::Bool { sign, kind, subs } if subs.iter().all(|s| matches!(s, Formula::Atom { .. })) => {
            let effective = if *sign == Sign::Neg { kind.flip() } else { *kind };
            if effective != BoolKind::Conj {
                return false;
            }
            let child_monotone = monotone != (*sign == Sign::Neg);
            subs.iter().all(|s| collect_delay(s, child_monotone, out))
        }
        _ => false,
    }
}

#[derive(Debug)]
struct PendingSentence {
    grounder: Box<dyn Grounder>,
    ctx: GroundingContext,
    formula: Formula,
}

#[derive(Debug)]
struct DelayedEntry<T> {
    id: usize,
    item: T,
    delay: Delay,
}

/// §4.7 `LazyGroundingManager`: owns the five queues the source describes
/// and drives them to a fixpoint against a [`GroundTranslator`]'s
/// literal-creation notifications.
#[derive(Debug, Default)]
pub struct LazyGroundingManager {
    tobeinitialized: VecDeque<PendingSentence>,
    to_ground: VecDeque<PendingSentence>,
    formwithdelaytobeinitialized: Vec<DelayedEntry<PendingSentence>>,
    rulegrounderstodelay: Vec<DelayedEntry<RuleGrounder>>,
    rules_to_ground: VecDeque<RuleGrounder>,
    queuedforgrounding: VecDeque<(Symbol, Tuple, Lit)>,
    seen: HashSet<(usize, Lit)>,
    next_id: usize,
}

impl LazyGroundingManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a top-level sentence for delay discovery (§4.7 "the
    /// grounding of the sentence is deferred..."). `ctx` is the context it
    /// would have been grounded under had it run eagerly.
    pub fn enqueue_sentence(&mut self, grounder: Box<dyn Grounder>, ctx: GroundingContext, source: Formula) {
        self.tobeinitialized.push_back(PendingSentence { grounder, ctx, formula: source });
    }

    /// Registers a rule grounder to be delayed on its own head symbol
    /// (§4.7 "rulegrounderstodelay").
    pub fn enqueue_rule(&mut self, rule: RuleGrounder, head_symbol: Symbol) {
        let id = self.fresh_id();
        self.rulegrounderstodelay.push(DelayedEntry { id, item: rule, delay: vec![ContainerAtom { symbol: head_symbol, watched: true }] });
    }

    fn fresh_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Runs delay discovery over everything in `tobeinitialized`, splitting
    /// it into `to_ground` (no delay found) and `formwithdelaytobeinitialized`.
    pub fn initialize(&mut self) {
        while let Some(pending) = self.tobeinitialized.pop_front() {
            match find_delay(&pending.formula) {
                Some(delay) => {
                    let id = self.fresh_id();
                    self.formwithdelaytobeinitialized.push(DelayedEntry { id, item: pending, delay });
                }
                None => self.to_ground.push_back(pending),
            }
        }
    }

    /// §4.7 "Literal-creation notifications": called once per new input
    /// atom minted by the translator.
    pub fn notify_new_literal(&mut self, symbol: Symbol, args: Tuple, lit: Lit) {
        self.queuedforgrounding.push_back((symbol, args, lit));
    }

    /// Pulls every notification queued on `translator` since the last call
    /// into `queuedforgrounding`.
    pub fn drain_translator_notifications(&mut self, translator: &mut GroundTranslator) {
        for (symbol, args, lit) in translator.take_notifications() {
            self.notify_new_literal(symbol, args, lit);
        }
    }

    /// Wakes every delayed entry whose delay mentions `symbol`,
    /// deduplicating per (entry, lit) pair (§4.7 "De-duplication is tracked
    /// per (delayed-sentence, lit) pair").
    fn wake_matching(&mut self, symbol: &Symbol, lit: Lit) {
        let mut i = 0;
        while i < self.formwithdelaytobeinitialized.len() {
            let matches = self.formwithdelaytobeinitialized[i].delay.iter().any(|a| &a.symbol == symbol);
            if matches && self.seen.insert((self.formwithdelaytobeinitialized[i].id, lit)) {
                let entry = self.formwithdelaytobeinitialized.remove(i);
                self.to_ground.push_back(entry.item);
            } else {
                i += 1;
            }
        }
        let mut i = 0;
        while i < self.rulegrounderstodelay.len() {
            let matches = self.rulegrounderstodelay[i].delay.iter().any(|a| &a.symbol == symbol);
            if matches && self.seen.insert((self.rulegrounderstodelay[i].id, lit)) {
                let entry = self.rulegrounderstodelay.remove(i);
                self.rules_to_ground.push_back(entry.item);
            } else {
                i += 1;
            }
        }
    }

    /// Drives every queue to a fixpoint (§5 "all of which is drained before
    /// returning control to the solver"): grounds whatever is immediately
    /// ready, drains translator notifications, wakes whatever those
    /// notifications newly satisfy, and repeats until nothing moves.
    pub fn run_to_fixpoint(&mut self, translator: &mut GroundTranslator, theory: &mut GroundTheory, structure: &Structure) -> Result<()> {
        self.initialize();
        loop {
            while let Some(mut pending) = self.to_ground.pop_front() {
                let result = pending.grounder.ground(translator, theory, structure, &pending.ctx)?;
                emit(theory, result);
            }
            while let Some(mut rule) = self.rules_to_ground.pop_front() {
                rule.run(translator, theory, structure, &GroundingContext::root())?;
            }
            self.drain_translator_notifications(translator);
            if self.queuedforgrounding.is_empty() {
                break;
            }
            while let Some((symbol, _args, lit)) = self.queuedforgrounding.pop_front() {
                self.wake_matching(&symbol, lit);
            }
            if self.to_ground.is_empty() && self.rules_to_ground.is_empty() {
                break;
            }
        }
        Ok(())
    }

    pub fn is_idle(&self) -> bool {
        self.tobeinitialized.is_empty()
            && self.to_ground.is_empty()
            && self.rules_to_ground.is_empty()
            && self.formwithdelaytobeinitialized.is_empty()
            && self.rulegrounderstodelay.is_empty()
            && self.queuedforgrounding.is_empty()
    }
}

/// Top-level CNF emission, shared with [`super::grounders::TheoryGrounder`]
/// (duplicated rather than factored out: the two call sites run at
/// different points in the pipeline and neither should depend on the
/// other's internal layout).
fn emit(theory: &mut GroundTheory, result: ConjOrDisj) {
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

#[cfg(test)]
mod test {
    use std::rc::Rc;

    use super::*;
    use crate::grounding::grounders::{AtomGrounder, Bindings, BoolGrounder, DenotationGrounder};
    use crate::theory::Term;
    use crate::vocabulary::{DomainElement, Predicate, Sort, SortTable};

    fn sort() -> Rc<Sort> {
        Sort::new("N", SortTable::IntRange(1, 1))
    }

    fn atom_formula(symbol: &Symbol, sort: &Rc<Sort>) -> Formula {
        Formula::Atom { sign: Sign::Pos, symbol: symbol.clone(), args: vec![Term::Domain(DomainElement::Int(1), sort.clone())] }
    }

    #[test]
    fn find_delay_finds_a_flat_conjunction_of_atoms() {
        let sort = sort();
        let p = Symbol::Predicate(Rc::new(Predicate::new("p", vec![sort.clone()])));
        let q = Symbol::Predicate(Rc::new(Predicate::new("q", vec![sort.clone()])));
        let f = Formula::conj(vec![atom_formula(&p, &sort), atom_formula(&q, &sort)]);
        let delay = find_delay(&f).unwrap();
        assert_eq!(delay.len(), 2);
        assert!(delay.iter().all(|a| !a.watched));
    }

    #[test]
    fn find_delay_returns_none_for_a_disjunction() {
        let sort = sort();
        let p = Symbol::Predicate(Rc::new(Predicate::new("p", vec![sort.clone()])));
        let q = Symbol::Predicate(Rc::new(Predicate::new("q", vec![sort.clone()])));
        let f = Formula::disj(vec![atom_formula(&p, &sort), atom_formula(&q, &sort)]);
        assert!(find_delay(&f).is_none());
    }

    #[test]
    fn delayed_sentence_grounds_once_its_watched_symbol_fires() {
        let sort = sort();
        let p = Symbol::Predicate(Rc::new(Predicate::new("p", vec![sort.clone()])));
        let q = Symbol::Predicate(Rc::new(Predicate::new("q", vec![sort.clone()])));
        let mut structure = Structure::new();
        structure.declare_symbol(p.clone());
        structure.declare_symbol(q.clone());

        let formula = Formula::conj(vec![atom_formula(&p, &sort), atom_formula(&q, &sort)]);
        let arg_p = DenotationGrounder::new(Term::Domain(DomainElement::Int(1), sort.clone()), Bindings::new());
        let arg_q = DenotationGrounder::new(Term::Domain(DomainElement::Int(1), sort.clone()), Bindings::new());
        let atom_p: Box<dyn Grounder> = Box::new(AtomGrounder::new(Sign::Pos, p.clone(), vec![arg_p]));
        let atom_q: Box<dyn Grounder> = Box::new(AtomGrounder::new(Sign::Pos, q.clone(), vec![arg_q]));
        let conj: Box<dyn Grounder> = Box::new(BoolGrounder::new(Sign::Pos, BoolKind::Conj, vec![atom_p, atom_q]));

        let mut manager = LazyGroundingManager::new();
        manager.enqueue_sentence(conj, GroundingContext::root(), formula);

        let mut translator = GroundTranslator::new();
        let mut theory = GroundTheory::new();
        manager.run_to_fixpoint(&mut translator, &mut theory, &structure).unwrap();
        assert!(theory.clauses.is_empty());
        assert!(!manager.is_idle());

        translator.translate_reduced(&p, &[DomainElement::Int(1)]);
        manager.run_to_fixpoint(&mut translator, &mut theory, &structure).unwrap();
        assert_eq!(theory.clauses.len(), 2);
        assert!(manager.is_idle());
    }

    /// §8 scenario 6: a sentence delayed on `p` terminates (reaches
    /// `is_idle()`) once an otherwise-eager sentence elsewhere in the same
    /// theory mints `p`'s literal, and the resulting ground theory has a
    /// unique two-valued model.
    #[test]
    #[cfg(feature = "test-solver")]
    fn delayed_sentence_terminates_and_yields_the_unique_model() {
        use crate::solver::reference::BruteForceSolver;
        use crate::solver::SolveOptions;

        let sort = sort();
        let p = Symbol::Predicate(Rc::new(Predicate::new("p", vec![sort.clone()])));
        let q = Symbol::Predicate(Rc::new(Predicate::new("q", vec![sort.clone()])));
        let mut structure = Structure::new();
        structure.declare_symbol(p.clone());
        structure.declare_symbol(q.clone());

        let mut translator = GroundTranslator::new();
        let mut theory = GroundTheory::new();

        // An eager sentence `p(1)` grounds immediately, the way
        // `TheoryGrounder::run` would ground any top-level sentence that
        // isn't itself delay-eligible.
        let eager_arg = DenotationGrounder::new(Term::Domain(DomainElement::Int(1), sort.clone()), Bindings::new());
        let mut eager_p: Box<dyn Grounder> = Box::new(AtomGrounder::new(Sign::Pos, p.clone(), vec![eager_arg]));
        let eager_result = eager_p.ground(&mut translator, &mut theory, &structure, &GroundingContext::root()).unwrap();
        emit(&mut theory, eager_result);

        // `p(1) & q(1)` is registered for delay discovery instead of
        // grounding right away.
        let formula = Formula::conj(vec![atom_formula(&p, &sort), atom_formula(&q, &sort)]);
        let arg_p = DenotationGrounder::new(Term::Domain(DomainElement::Int(1), sort.clone()), Bindings::new());
        let arg_q = DenotationGrounder::new(Term::Domain(DomainElement::Int(1), sort.clone()), Bindings::new());
        let atom_p: Box<dyn Grounder> = Box::new(AtomGrounder::new(Sign::Pos, p.clone(), vec![arg_p]));
        let atom_q: Box<dyn Grounder> = Box::new(AtomGrounder::new(Sign::Pos, q.clone(), vec![arg_q]));
        let conj: Box<dyn Grounder> = Box::new(BoolGrounder::new(Sign::Pos, BoolKind::Conj, vec![atom_p, atom_q]));

        let mut manager = LazyGroundingManager::new();
        manager.enqueue_sentence(conj, GroundingContext::root(), formula);

        manager.run_to_fixpoint(&mut translator, &mut theory, &structure).unwrap();
        assert!(manager.is_idle());

        let mut solver = BruteForceSolver::new();
        let result = solver.solve(&theory, &SolveOptions::default()).unwrap();
        assert!(!result.unsat);
        assert_eq!(result.models.len(), 1);
        let p_lit = translator.translate_reduced(&p, &[DomainElement::Int(1)]);
        let q_lit = translator.translate_reduced(&q, &[DomainElement::Int(1)]);
        assert!(result.models[0].true_atoms.contains(&p_lit));
        assert!(result.models[0].true_atoms.contains(&q_lit));
    }
}
