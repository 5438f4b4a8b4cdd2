//! Three-valued structures (§3 "Structure").
//!
//! A [`Structure`] is a total map from every symbol of its vocabulary to an
//! interpretation. A predicate interpretation holds the four tables
//! (ct/cf/pt/pf); a function interpretation is a graph predicate
//! interpretation plus, when two-valued, an explicit lookup table.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{GroundingError, Result};
use crate::vocabulary::{DomainElement, Sort, Symbol};

/// A tuple of domain elements, the unit of membership in every predicate
/// table and generator pattern throughout the crate.
pub type Tuple = Vec<DomainElement>;

/// The four tables of a three-valued predicate interpretation (§3). `ct`
/// and `cf` are authoritative; `pt`/`pf` are their complements within the
/// declared universe and are recomputed on demand rather than stored twice,
/// which would risk the `ct ∩ cf = ∅` invariant drifting out of sync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredicateInterpretation {
    ct: BTreeSet<Tuple>,
    cf: BTreeSet<Tuple>,
}

impl PredicateInterpretation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ct(&self) -> &BTreeSet<Tuple> {
        &self.ct
    }

    pub fn cf(&self) -> &BTreeSet<Tuple> {
        &self.cf
    }

    /// `pt = ¬cf`: true for every tuple of the (caller-supplied) universe
    /// that is not certainly false.
    pub fn pt<'a>(&'a self, universe: impl Iterator<Item = &'a Tuple>) -> BTreeSet<Tuple> {
        universe.filter(|t| !self.cf.contains(*t)).cloned().collect()
    }

    /// `pf = ¬ct`.
    pub fn pf<'a>(&'a self, universe: impl Iterator<Item = &'a Tuple>) -> BTreeSet<Tuple> {
        universe.filter(|t| !self.ct.contains(*t)).cloned().collect()
    }

    pub fn is_ct(&self, tuple: &Tuple) -> bool {
        self.ct.contains(tuple)
    }

    pub fn is_cf(&self, tuple: &Tuple) -> bool {
        self.cf.contains(tuple)
    }

    /// `None` (unknown), `Some(true)` (ct), `Some(false)` (cf).
    pub fn truth_value(&self, tuple: &Tuple) -> Option<bool> {
        if self.ct.contains(tuple) {
            Some(true)
        } else if self.cf.contains(tuple) {
            Some(false)
        } else {
            None
        }
    }

    /// Two-valued relative to `universe`: every tuple of the universe is
    /// either ct or cf.
    pub fn is_two_valued<'a>(&self, universe: impl Iterator<Item = &'a Tuple>) -> bool {
        universe.all(|t| self.ct.contains(t) || self.cf.contains(t))
    }

    pub fn make_true(&mut self, tuple: Tuple) -> Result<()> {
        if self.cf.contains(&tuple) {
            return Err(GroundingError::InvariantViolation(format!(
                "tuple {tuple:?} is already certainly false; cannot also make it certainly true"
            )));
        }
        self.ct.insert(tuple);
        Ok(())
    }

    pub fn make_false(&mut self, tuple: Tuple) -> Result<()> {
        if self.ct.contains(&tuple) {
            return Err(GroundingError::InvariantViolation(format!(
                "tuple {tuple:?} is already certainly true; cannot also make it certainly false"
            )));
        }
        self.cf.insert(tuple);
        Ok(())
    }

    /// Tighten `self` with the bounds coming from another (presumably more
    /// precise) interpretation, failing if this would violate
    /// `ct ∩ cf = ∅`.
    pub fn tighten_with(&mut self, ct: &BTreeSet<Tuple>, cf: &BTreeSet<Tuple>) -> Result<()> {
        for t in ct {
            if self.cf.contains(t) {
                return Err(GroundingError::InvariantViolation(
                    "propagation bound contradicts the current structure".into(),
                ));
            }
        }
        for t in cf {
            if self.ct.contains(t) {
                return Err(GroundingError::InvariantViolation(
                    "propagation bound contradicts the current structure".into(),
                ));
            }
        }
        self.ct.extend(ct.iter().cloned());
        self.cf.extend(cf.iter().cloned());
        Ok(())
    }
}

/// A function interpretation: the graph predicate interpretation plus,
/// once two-valued, an explicit value table for O(1) lookup (the grounder's
/// hot path; see `AtomGrounder`/`ComparisonGrounder`, §4.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionInterpretation {
    graph: PredicateInterpretation,
    #[serde(with = "crate::util::vectorize")]
    table: BTreeMap<Tuple, DomainElement>,
}

impl FunctionInterpretation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &PredicateInterpretation {
        &self.graph
    }

    /// Two-valued lookup: `args` maps to exactly one value.
    pub fn value(&self, args: &[DomainElement]) -> Option<&DomainElement> {
        self.table.get(args)
    }

    pub fn set(&mut self, args: Tuple, value: DomainElement) -> Result<()> {
        let mut graph_tuple = args.clone();
        graph_tuple.push(value.clone());
        self.graph.make_true(graph_tuple)?;
        self.table.insert(args, value);
        Ok(())
    }

    pub fn is_two_valued(&self, input_universe: &[Tuple]) -> bool {
        input_universe.iter().all(|t| self.table.contains_key(t))
    }
}

/// Interpretation attached to one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Interpretation {
    Predicate(PredicateInterpretation),
    Function(FunctionInterpretation),
}

impl Interpretation {
    pub fn as_predicate(&self) -> Option<&PredicateInterpretation> {
        match self {
            Interpretation::Predicate(p) => Some(p),
            Interpretation::Function(_) => None,
        }
    }

    pub fn as_predicate_mut(&mut self) -> Option<&mut PredicateInterpretation> {
        match self {
            Interpretation::Predicate(p) => Some(p),
            Interpretation::Function(_) => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionInterpretation> {
        match self {
            Interpretation::Function(f) => Some(f),
            Interpretation::Predicate(_) => None,
        }
    }

    pub fn as_function_mut(&mut self) -> Option<&mut FunctionInterpretation> {
        match self {
            Interpretation::Function(f) => Some(f),
            Interpretation::Predicate(_) => None,
        }
    }

    /// The predicate view of any interpretation: a function's graph for a
    /// `Function`, the table itself for a `Predicate`. Used throughout the
    /// generator framework (§4.4), which only ever reasons about predicate
    /// tables.
    pub fn predicate_view(&self) -> &PredicateInterpretation {
        match self {
            Interpretation::Predicate(p) => p,
            Interpretation::Function(f) => &f.graph,
        }
    }
}

/// A total map from symbol name to sort, plus symbol declarations; shared
/// between a [`Structure`] and the [`crate::theory::Theory`] it interprets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vocabulary {
    sorts: BTreeMap<String, Rc<Sort>>,
    symbols: BTreeMap<String, Symbol>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_sort(&mut self, sort: Rc<Sort>) {
        self.sorts.insert(sort.name.clone(), sort);
    }

    pub fn declare_symbol(&mut self, symbol: Symbol) {
        self.symbols.insert(symbol.name().to_string(), symbol);
    }

    pub fn sort(&self, name: &str) -> Option<&Rc<Sort>> {
        self.sorts.get(name)
    }

    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn sorts(&self) -> impl Iterator<Item = &Rc<Sort>> {
        self.sorts.values()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }
}

/// A three-valued interpretation over a [`Vocabulary`] (§3 "Structure").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Structure {
    vocabulary: Vocabulary,
    interpretations: BTreeMap<String, Interpretation>,
}

impl Default for Structure {
    fn default() -> Self {
        Self::new()
    }
}

impl Structure {
    pub fn new() -> Self {
        Self { vocabulary: Vocabulary::new(), interpretations: BTreeMap::new() }
    }

    pub fn with_vocabulary(vocabulary: Vocabulary) -> Self {
        let mut interpretations = BTreeMap::new();
        for symbol in vocabulary.symbols() {
            if symbol.is_builtin() {
                continue;
            }
            let interp = match symbol {
                Symbol::Predicate(_) => Interpretation::Predicate(PredicateInterpretation::new()),
                Symbol::Function(_) => Interpretation::Function(FunctionInterpretation::new()),
            };
            interpretations.insert(symbol.name().to_string(), interp);
        }
        Self { vocabulary, interpretations }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn vocabulary_mut(&mut self) -> &mut Vocabulary {
        &mut self.vocabulary
    }

    pub fn declare_sort(&mut self, sort: Rc<Sort>) {
        self.vocabulary.declare_sort(sort);
    }

    pub fn sorts(&self) -> impl Iterator<Item = &Rc<Sort>> {
        self.vocabulary.sorts()
    }

    pub fn declare_symbol(&mut self, symbol: Symbol) {
        if !symbol.is_builtin() && !self.interpretations.contains_key(symbol.name()) {
            let interp = match &symbol {
                Symbol::Predicate(_) => Interpretation::Predicate(PredicateInterpretation::new()),
                Symbol::Function(_) => Interpretation::Function(FunctionInterpretation::new()),
            };
            self.interpretations.insert(symbol.name().to_string(), interp);
        }
        self.vocabulary.declare_symbol(symbol);
    }

    pub fn interpretation(&self, name: &str) -> Option<&Interpretation> {
        self.interpretations.get(name)
    }

    pub fn interpretation_mut(&mut self, name: &str) -> Option<&mut Interpretation> {
        self.interpretations.get_mut(name)
    }

    pub fn interpretations(&self) -> impl Iterator<Item = (&String, &Interpretation)> {
        self.interpretations.iter()
    }

    /// Re-checks `ct ∩ cf = ∅` for every declared predicate (§5 "commit"
    /// invariant re-check), returning the first violation found.
    pub fn check_consistency(&self) -> Result<()> {
        for (name, interp) in &self.interpretations {
            let pred = interp.predicate_view();
            if let Some(bad) = pred.ct().intersection(pred.cf()).next() {
                return Err(GroundingError::InvariantViolation(format!(
                    "symbol {name}: tuple {bad:?} is both certainly true and certainly false"
                )));
            }
        }
        Ok(())
    }

    /// `true` iff every declared, non-builtin symbol is two-valued over its
    /// full (finite) universe. Infinite-universe symbols are treated as
    /// "as two-valued as they can be checked"; a missing element cannot be
    /// enumerated, so totality there is the caller's responsibility
    /// (mirrors the source, which never fully checks infinite universes
    /// either).
    pub fn is_two_valued(&self) -> bool {
        for symbol in self.vocabulary.symbols() {
            if symbol.is_builtin() {
                continue;
            }
            let Some(interp) = self.interpretations.get(symbol.name()) else { continue };
            let sorts = symbol.sort_tuple();
            let Some(universe) = cartesian_universe(&sorts) else { continue };
            if !interp.predicate_view().is_two_valued(universe.iter()) {
                return false;
            }
        }
        true
    }
}

/// Cartesian product of each sort's finite element list; `None` if any
/// factor is infinite (the caller then skips the totality check for that
/// symbol rather than attempting to enumerate an infinite universe).
pub fn cartesian_universe(sorts: &[Rc<Sort>]) -> Option<Vec<Tuple>> {
    let mut acc: Vec<Tuple> = vec![Vec::new()];
    for sort in sorts {
        let elems = sort.table.iter_finite()?;
        let mut next = Vec::with_capacity(acc.len() * elems.len());
        for prefix in &acc {
            for e in &elems {
                let mut t = prefix.clone();
                t.push(e.clone());
                next.push(t);
            }
        }
        acc = next;
    }
    Some(acc)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vocabulary::SortTable;

    #[test]
    fn ct_cf_disjoint_invariant() {
        let mut p = PredicateInterpretation::new();
        p.make_true(vec![DomainElement::Int(1)]).unwrap();
        assert!(p.make_false(vec![DomainElement::Int(1)]).is_err());
    }

    #[test]
    fn two_valued_relative_to_universe() {
        let mut p = PredicateInterpretation::new();
        let universe = vec![vec![DomainElement::Int(1)], vec![DomainElement::Int(2)]];
        assert!(!p.is_two_valued(universe.iter()));
        p.make_true(vec![DomainElement::Int(1)]).unwrap();
        p.make_false(vec![DomainElement::Int(2)]).unwrap();
        assert!(p.is_two_valued(universe.iter()));
    }

    #[test]
    fn cartesian_universe_of_two_finite_sorts() {
        let a = Sort::new("A", SortTable::IntRange(1, 2));
        let b = Sort::new("B", SortTable::IntRange(1, 2));
        let universe = cartesian_universe(&[a, b]).unwrap();
        assert_eq!(universe.len(), 4);
    }

    #[test]
    fn infinite_sort_yields_no_universe() {
        let a = Sort::new("Z", SortTable::Int);
        assert!(cartesian_universe(&[a]).is_none());
    }

    #[test]
    fn structure_consistency_check_catches_violation() {
        let mut s = Structure::new();
        let sort = Sort::new("N", SortTable::IntRange(1, 2));
        s.declare_sort(sort.clone());
        let p = Symbol::Predicate(Rc::new(crate::vocabulary::Predicate::new("P", vec![sort])));
        s.declare_symbol(p);
        if let Some(Interpretation::Predicate(pred)) = s.interpretation_mut("P") {
            pred.make_true(vec![DomainElement::Int(1)]).unwrap();
        }
        assert!(s.check_consistency().is_ok());
    }
}
