//! The ground translator and the solver boundary (§6, SPEC_FULL §13).
//!
//! This module owns the one allocation site for literal numbers (§5
//! "Shared resources": "the `GroundTranslator` is the sole allocator of
//! literal numbers"), the ECNF line types the grounders emit into, and the
//! [`GroundSolver`] trait the external solver is specified through. The
//! solver itself is out of scope (§1); [`reference::BruteForceSolver`]
//! (behind the `test-solver` feature) is a small stand-in used only to
//! exercise the §8 end-to-end scenarios.

pub mod ecnf;
#[cfg(feature = "test-solver")]
pub mod reference;

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::structure::Tuple;
use crate::theory::{BoolKind, Sign};
use crate::vocabulary::{BuiltinFunction, BuiltinPredicate, DomainElement, Sort, Symbol};

/// A propositional atom id. Positive means the atom itself; negative means
/// its negation (§6 "Atom ids are positive integers; negative means
/// negation").
pub type Lit = i64;

/// The sentinel literal standing for the constant `true`, used whenever a
/// grounder result collapsed to [`crate::grounding::ConjOrDisj::True`] but a
/// caller needs an actual `Lit` handle (a rule body, a set member). Never
/// allocated through [`GroundTranslator`], so it never collides with a real
/// atom or Tseitin id.
pub const TRUE_LIT: Lit = i64::MAX;
/// The constant-`false` counterpart of [`TRUE_LIT`].
pub const FALSE_LIT: Lit = -TRUE_LIT;

/// Handle to a weighted set (§3 "set table").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SetId(pub usize);

/// Handle to a CP integer variable (§3 "var-id table").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VarId(pub usize);

/// A ground theory identifier for a well-founded (or stable) inductive
/// definition (§3, §4.6 `DefinitionGrounder`).
pub type DefId = usize;

/// Tseitin semantics (§6 "Tseitin semantics"). Negating the enclosing
/// context flips `Impl`/`Rimpl` and leaves `Eq`/`Rule` unchanged (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TsType {
    /// Biconditional: `tseitin <-> body`.
    Eq,
    /// `tseitin -> body`.
    Impl,
    /// `body -> tseitin`.
    Rimpl,
    /// Defined in the current definition (no direct clause emitted here;
    /// the owning `DefinitionGrounder` collects the rule instead).
    Rule,
}

impl TsType {
    pub fn negate(self) -> Self {
        match self {
            TsType::Eq => TsType::Eq,
            TsType::Impl => TsType::Rimpl,
            TsType::Rimpl => TsType::Impl,
            TsType::Rule => TsType::Rule,
        }
    }
}

/// A term that survived grounding: either a concrete domain element or a
/// still-symbolic CP variable (§4.6 `AtomGrounder` "lazy element" case).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GroundTerm {
    Domain(DomainElement),
    Var(VarId),
}

impl GroundTerm {
    pub fn as_domain(&self) -> Option<&DomainElement> {
        match self {
            GroundTerm::Domain(d) => Some(d),
            GroundTerm::Var(_) => None,
        }
    }
}

/// A term appearing on the solver side of a CP reification (§6 `CP` line).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CpTerm {
    Var(VarId),
    Const(i64),
}

/// The bound a CP/Agg reification is compared against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CpBound {
    Var(VarId),
    Const(i64),
}

/// What a fresh Tseitin literal stands for (§3 "tseitin table"). Kept for
/// introspection/back-translation; the clause-shaped cases (`Bool`) are
/// also the ones [`crate::grounding`] grounders expand directly into
/// `Clause` lines, so a solver never has to decode this variant itself;
/// it is informative bookkeeping, matching the source's `TsBody` union.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TsBody {
    Bool { kind: BoolKind, lits: Vec<Lit> },
    Agg { agg_type: BuiltinFunction, comp: BuiltinPredicate, sign: Sign, bound: DomainElement, set: SetId },
    Cp { term: CpTerm, comp: BuiltinPredicate, bound: CpBound },
    /// A tseitin that is simply another literal's alias (the "lone"
    /// variant of §3's `TsBody`).
    Lone(Lit),
}

/// A weighted set (§3 "set table", §6 `Set` line): literals with weights,
/// plus the summed weight of every certainly-true member (used directly by
/// the aggregate-grounding branch table, §4.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TsSet {
    pub literals: Vec<(Lit, f64)>,
    pub true_weight: f64,
}

/// The ground translator (§3 "GroundTranslator state"): the sole allocator
/// of literal numbers, the tseitin/set/var-id tables, and the queue of
/// literal-creation notifications the lazy grounding manager drains.
///
/// §5's "literal-creation notifications" are modelled as a pull queue
/// (`take_notifications`) rather than a registered callback: the pipeline
/// is single-threaded and cooperative (§5), so the
/// [`crate::grounding::lazy::LazyGroundingManager`] can simply drain the
/// queue after every translator use instead of the source's
/// `std::function` registration, which a `missing_debug_implementations`
/// crate cannot carry directly on a public type anyway.
#[derive(Debug, Default)]
pub struct GroundTranslator {
    atoms: BTreeMap<(String, Tuple), Lit>,
    reverse_atoms: BTreeMap<Lit, (Symbol, Tuple)>,
    next_atom_lit: i64,
    tseitins: BTreeMap<Lit, TsBody>,
    next_tseitin_lit: i64,
    sets: BTreeMap<SetId, TsSet>,
    next_set: usize,
    vars: BTreeMap<(String, Vec<GroundTerm>), VarId>,
    var_domains: BTreeMap<VarId, Rc<Sort>>,
    next_var: usize,
    pending_notifications: Vec<(Symbol, Tuple, Lit)>,
}

impl GroundTranslator {
    pub fn new() -> Self {
        Self { next_atom_lit: 1, next_tseitin_lit: 1, ..Default::default() }
    }

    fn allocate_tseitin_id(&mut self) -> Lit {
        // Tseitin literals share the same id space as input atoms but are
        // allocated from the top of a disjoint high range so a solver can
        // tell "never interpret this one back into the user vocabulary"
        // apart from an ordinary input atom at a glance (§6).
        let id = 1_000_000_000 + self.next_tseitin_lit;
        self.next_tseitin_lit += 1;
        id
    }

    /// Full entry point (§4.3 SPEC_FULL "`translateReduced` vs
    /// `translate`"): performs the sort-membership check before delegating
    /// to the fast path when every argument already reduced to a concrete
    /// domain element; otherwise allocates a fresh "lazy element" tseitin
    /// standing in for the not-yet-resolved CP argument.
    pub fn translate(&mut self, symbol: &Symbol, args: &[GroundTerm]) -> Lit {
        let reduced: Option<Vec<DomainElement>> = args.iter().map(|a| a.as_domain().cloned()).collect();
        match reduced {
            Some(elems) => self.translate_reduced(symbol, &elems),
            None => self.new_tseitin(TsBody::Lone(self.next_atom_lit)),
        }
    }

    /// Fast path (§4.3 SPEC_FULL): `args` are already concrete domain
    /// elements. Looks up or allocates the atom's literal; this is the hot
    /// path `AtomGrounder`/`ComparisonGrounder` use on every ground call.
    pub fn translate_reduced(&mut self, symbol: &Symbol, args: &[DomainElement]) -> Lit {
        let key = (symbol.name().to_string(), args.to_vec());
        if let Some(lit) = self.atoms.get(&key) {
            return *lit;
        }
        let lit = self.next_atom_lit;
        self.next_atom_lit += 1;
        self.atoms.insert(key, lit);
        self.reverse_atoms.insert(lit, (symbol.clone(), args.to_vec()));
        self.pending_notifications.push((symbol.clone(), args.to_vec(), lit));
        lit
    }

    /// Reverse lookup, used by a solver's model translation back into the
    /// user vocabulary (§6 "distinct ids for Tseitin atoms, which must not
    /// be interpreted back").
    pub fn symbol_and_args(&self, lit: Lit) -> Option<&(Symbol, Tuple)> {
        self.reverse_atoms.get(&lit.abs())
    }

    pub fn is_input_atom(&self, lit: Lit) -> bool {
        self.reverse_atoms.contains_key(&lit.abs())
    }

    /// Allocates a fresh Tseitin literal standing for `body` (§3 "tseitin
    /// table").
    pub fn new_tseitin(&mut self, body: TsBody) -> Lit {
        let lit = self.allocate_tseitin_id();
        self.tseitins.insert(lit, body);
        lit
    }

    /// §4.6/§4.8 `reify`: allocates a fresh literal for a CP or aggregate
    /// comparison under the given Tseitin semantics, recording the body so
    /// a solver (or the reference one) can decode it.
    pub fn reify_cp(&mut self, term: CpTerm, comp: BuiltinPredicate, bound: CpBound, _ts_type: TsType) -> Lit {
        self.new_tseitin(TsBody::Cp { term, comp, bound })
    }

    pub fn reify_agg(&mut self, agg_type: BuiltinFunction, comp: BuiltinPredicate, sign: Sign, bound: DomainElement, set: SetId, _ts_type: TsType) -> Lit {
        self.new_tseitin(TsBody::Agg { agg_type, comp, sign, bound, set })
    }

    pub fn tseitin_body(&self, lit: Lit) -> Option<&TsBody> {
        self.tseitins.get(&lit.abs())
    }

    pub fn fresh_set(&mut self, set: TsSet) -> SetId {
        let id = SetId(self.next_set);
        self.next_set += 1;
        self.sets.insert(id, set);
        id
    }

    pub fn set(&self, id: SetId) -> Option<&TsSet> {
        self.sets.get(&id)
    }

    /// `(Function, tuple of GroundTerms) -> VarId` (§3 "var-id table").
    pub fn get_or_create_var(&mut self, function: &Symbol, args: Vec<GroundTerm>, sort: Rc<Sort>) -> VarId {
        let key = (function.name().to_string(), args);
        if let Some(id) = self.vars.get(&key) {
            return *id;
        }
        let id = VarId(self.next_var);
        self.next_var += 1;
        self.vars.insert(key, id);
        self.var_domains.insert(id, sort);
        id
    }

    pub fn var_sort(&self, id: VarId) -> Option<&Rc<Sort>> {
        self.var_domains.get(&id)
    }

    /// Drains every `(symbol, args, lit)` notification queued since the
    /// last drain (§4.7 "Literal-creation notifications").
    pub fn take_notifications(&mut self) -> Vec<(Symbol, Tuple, Lit)> {
        std::mem::take(&mut self.pending_notifications)
    }
}

/// The literal `_true`/`_false` of §4.6 grounder short-circuits, lifted to
/// the level the grounder tree actually reasons in: either a concrete
/// ground literal, or one of the two Boolean constants produced whenever a
/// subformula can already be decided against the current structure without
/// introducing a literal at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroundValue {
    Lit(Lit),
    True,
    False,
}

/// Options governing one `GroundSolver::solve` call (§6 "Options").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveOptions {
    pub nb_models: usize,
    pub minimize: Option<(SetId, BuiltinFunction)>,
    pub assumptions: Vec<Lit>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self { nb_models: 1, minimize: None, assumptions: Vec::new() }
    }
}

/// A two-valued model: the set of positive input-atom literals true in it
/// (everything else in the input vocabulary is false; Tseitin atoms are
/// never reported back, §6).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub true_atoms: Vec<Lit>,
}

/// The result of one `modelexpand` solver call (§6 "Model-expansion
/// public API").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolveResult {
    pub models: Vec<Model>,
    pub unsat: bool,
    pub optimum: Option<i64>,
    pub explanation: Vec<Lit>,
}

/// The trait the ECNF consumer side implements (§6, SPEC_FULL §13). The
/// production SAT/SMT solver is out of scope (§1); this is the seam the
/// grounder pipeline's inferences (`propagate`/`modelexpand`) call through.
pub trait GroundSolver {
    fn solve(&mut self, theory: &ecnf::GroundTheory, options: &SolveOptions) -> crate::error::Result<SolveResult>;
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vocabulary::{Predicate, SortTable};

    fn sym(name: &str, arity: usize) -> Symbol {
        let sort = Sort::new("N", SortTable::IntRange(1, 3));
        Symbol::Predicate(Rc::new(Predicate::new(name, vec![sort; arity])))
    }

    #[test]
    fn translate_reduced_is_idempotent() {
        let mut t = GroundTranslator::new();
        let p = sym("p", 1);
        let args = vec![DomainElement::Int(1)];
        let l1 = t.translate_reduced(&p, &args);
        let l2 = t.translate_reduced(&p, &args);
        assert_eq!(l1, l2);
    }

    #[test]
    fn distinct_atoms_get_distinct_literals() {
        let mut t = GroundTranslator::new();
        let p = sym("p", 1);
        let l1 = t.translate_reduced(&p, &[DomainElement::Int(1)]);
        let l2 = t.translate_reduced(&p, &[DomainElement::Int(2)]);
        assert_ne!(l1, l2);
    }

    #[test]
    fn tseitin_literals_never_collide_with_atom_literals() {
        let mut t = GroundTranslator::new();
        let p = sym("p", 1);
        let atom_lit = t.translate_reduced(&p, &[DomainElement::Int(1)]);
        let ts_lit = t.new_tseitin(TsBody::Bool { kind: BoolKind::Conj, lits: vec![atom_lit] });
        assert!(!t.is_input_atom(ts_lit));
        assert!(t.is_input_atom(atom_lit));
    }

    #[test]
    fn notifications_drain_once() {
        let mut t = GroundTranslator::new();
        let p = sym("p", 1);
        t.translate_reduced(&p, &[DomainElement::Int(1)]);
        let first = t.take_notifications();
        assert_eq!(first.len(), 1);
        assert!(t.take_notifications().is_empty());
    }
}
