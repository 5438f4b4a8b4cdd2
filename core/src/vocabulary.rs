//! Sorts and symbols (§3 "Sort (S)" / "Symbol (P)").
//!
//! A [`Sort`] carries its own interpretation (a [`SortTable`]); a [`Symbol`]
//! is either a [`Predicate`] or a [`Function`], built-in or user-defined.
//! Symbols are shared by [`std::rc::Rc`], the same pattern `adf.rs`'s
//! `VarContainer` dictionaries use: one owning allocation, cheap clones
//! everywhere a symbol is referenced from a formula, a structure entry,
//! or a grounder.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// A single value in some sort's domain. Kept as a small closed enum rather
/// than a trait object since the built-in sorts (§3) are a fixed, closed set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainElement {
    Int(i64),
    Float(OrdFloat),
    Char(char),
    Str(String),
}

impl fmt::Display for DomainElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainElement::Int(i) => write!(f, "{i}"),
            DomainElement::Float(v) => write!(f, "{}", v.0),
            DomainElement::Char(c) => write!(f, "{c}"),
            DomainElement::Str(s) => write!(f, "{s}"),
        }
    }
}

impl PartialEq for DomainElement {
    fn eq(&self, other: &Self) -> bool {
        use DomainElement::*;
        match (self, other) {
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for DomainElement {}

impl PartialOrd for DomainElement {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DomainElement {
    fn cmp(&self, other: &Self) -> Ordering {
        use DomainElement::*;
        match (self, other) {
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.cmp(b),
            (Char(a), Char(b)) => a.cmp(b),
            (Str(a), Str(b)) => a.cmp(b),
            // cross-kind comparisons only arise from malformed theories; order
            // by a fixed discriminant so BTreeSet/sort routines stay total.
            _ => self.discriminant().cmp(&other.discriminant()),
        }
    }
}
impl Hash for DomainElement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            DomainElement::Int(i) => i.hash(state),
            DomainElement::Float(v) => v.hash(state),
            DomainElement::Char(c) => c.hash(state),
            DomainElement::Str(s) => s.hash(state),
        }
    }
}
impl DomainElement {
    fn discriminant(&self) -> u8 {
        match self {
            DomainElement::Int(_) => 0,
            DomainElement::Float(_) => 1,
            DomainElement::Char(_) => 2,
            DomainElement::Str(_) => 3,
        }
    }

    /// Numeric value, for the arithmetic built-ins; `None` for non-numeric
    /// domain elements.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DomainElement::Int(i) => Some(*i as f64),
            DomainElement::Float(v) => Some(v.0),
            _ => None,
        }
    }
}

/// `f64` wrapper with a total order, so floats can live in the same
/// [`BTreeSet`]/[`std::collections::HashMap`] keys as the rest of
/// [`DomainElement`]. NaN sorts after every other float (it should never
/// occur in a domain table; this just keeps the order total instead of
/// panicking).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrdFloat(pub f64);
impl PartialEq for OrdFloat {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}
impl Eq for OrdFloat {}
impl PartialOrd for OrdFloat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OrdFloat {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or_else(|| {
            if self.0.is_nan() && other.0.is_nan() {
                Ordering::Equal
            } else if self.0.is_nan() {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        })
    }
}
impl Hash for OrdFloat {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// The interpretation carried by a [`Sort`] (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SortTable {
    /// Explicit enumeration of domain elements.
    Enumeration(BTreeSet<DomainElement>),
    /// Inclusive integer range `[lo, hi]`.
    IntRange(i64, i64),
    /// Built-in naturals (approximated finite by the caller-chosen cap used
    /// for iteration; see [`SortTable::approx_size`]).
    Nat,
    /// Built-in (unbounded) integers.
    Int,
    /// Built-in floats.
    Float,
    /// Built-in characters.
    Char,
    /// Built-in strings.
    String,
    /// Union of several tables (possibly overlapping; membership is the
    /// union, iteration de-duplicates by construction order).
    Union(Vec<SortTable>),
    /// A constructed sort: each constructor has a name and an argument sort
    /// tuple; nullary constructors are just enumeration elements in
    /// disguise. Only finite when every constructor's arguments are finite
    /// and there is no recursive constructor (not checked here; the
    /// grounder treats a non-terminating size computation as infinite).
    Constructed(Vec<(String, Vec<Rc<Sort>>)>),
}

impl SortTable {
    /// True iff the table is guaranteed finite. Per §3 this may be
    /// approximate: built-in `Int`/`Float`/`String` report `false` even
    /// though a concrete machine representation is technically bounded.
    pub fn is_finite(&self) -> bool {
        match self {
            SortTable::Enumeration(_) => true,
            SortTable::IntRange(_, _) => true,
            SortTable::Nat | SortTable::Int | SortTable::Float | SortTable::String => false,
            SortTable::Char => true,
            SortTable::Union(parts) => parts.iter().all(SortTable::is_finite),
            SortTable::Constructed(ctors) => ctors
                .iter()
                .all(|(_, args)| args.iter().all(|s| s.table.is_finite())),
        }
    }

    /// Exact cardinality when finite, `None` otherwise. Used by the cost
    /// estimator (§4.2) and by [`crate::generators::SortGenerator`].
    pub fn size(&self) -> Option<usize> {
        if !self.is_finite() {
            return None;
        }
        match self {
            SortTable::Enumeration(set) => Some(set.len()),
            SortTable::IntRange(lo, hi) => Some((hi - lo + 1).max(0) as usize),
            SortTable::Char => Some(u32::from(char::MAX) as usize + 1),
            SortTable::Union(parts) => parts.iter().map(SortTable::size).sum(),
            SortTable::Constructed(ctors) => ctors
                .iter()
                .map(|(_, args)| args.iter().try_fold(1usize, |acc, s| Some(acc * s.table.size()?)))
                .sum(),
            SortTable::Nat | SortTable::Int | SortTable::Float | SortTable::String => None,
        }
    }

    /// Membership test, used by sort checkers (§4.4 `SortChecker`).
    pub fn contains(&self, elem: &DomainElement) -> bool {
        match (self, elem) {
            (SortTable::Enumeration(set), _) => set.contains(elem),
            (SortTable::IntRange(lo, hi), DomainElement::Int(v)) => v >= lo && v <= hi,
            (SortTable::Nat, DomainElement::Int(v)) => *v >= 0,
            (SortTable::Int, DomainElement::Int(_)) => true,
            (SortTable::Float, DomainElement::Float(_) | DomainElement::Int(_)) => true,
            (SortTable::Char, DomainElement::Char(_)) => true,
            (SortTable::String, DomainElement::Str(_)) => true,
            (SortTable::Union(parts), _) => parts.iter().any(|p| p.contains(elem)),
            (SortTable::Constructed(_), _) => false,
            _ => false,
        }
    }

    /// Iterate all elements, when finite. Order is the table's natural
    /// iteration order per §4.4 `SortGenerator`.
    pub fn iter_finite(&self) -> Option<Vec<DomainElement>> {
        if !self.is_finite() {
            return None;
        }
        match self {
            SortTable::Enumeration(set) => Some(set.iter().cloned().collect()),
            SortTable::IntRange(lo, hi) => Some((*lo..=*hi).map(DomainElement::Int).collect()),
            SortTable::Union(parts) => {
                let mut seen = BTreeSet::new();
                let mut out = Vec::new();
                for part in parts {
                    for elem in part.iter_finite()? {
                        if seen.insert(elem.clone()) {
                            out.push(elem);
                        }
                    }
                }
                Some(out)
            }
            SortTable::Char => Some((0u32..=0x10FFFF).filter_map(char::from_u32).map(DomainElement::Char).collect()),
            SortTable::Constructed(_) => None,
            SortTable::Nat | SortTable::Int | SortTable::Float | SortTable::String => None,
        }
    }
}

/// A type, carrying its own [`SortTable`]. Identity is by name: two `Sort`
/// values with the same name are the same sort even if constructed
/// separately (mirrors how the vocabulary parser would intern them; this
/// crate does not own a parser, so the theory/structure builders are
/// responsible for sharing one `Rc<Sort>` per name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sort {
    pub name: String,
    pub table: SortTable,
}

impl PartialEq for Sort {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Sort {}
impl Hash for Sort {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}
impl PartialOrd for Sort {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Sort {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl Sort {
    pub fn new(name: impl Into<String>, table: SortTable) -> Rc<Sort> {
        Rc::new(Sort { name: name.into(), table })
    }

    pub fn is_finite(&self) -> bool {
        self.table.is_finite()
    }

    /// `true` iff `self` is a parent of `other` in the sort hierarchy used
    /// by §4.4's variable-classification step (EQUAL/PARENT/CHILD/UNKNOWN).
    /// This crate has no explicit sub-sorting declaration, so the only
    /// parent/child relation recognised structurally is "one table is a
    /// `Union` that lists the other"; anything else is UNKNOWN and treated
    /// conservatively (a sort checker is inserted).
    pub fn is_parent_of(&self, other: &Sort) -> bool {
        if self == other {
            return false;
        }
        matches!(&self.table, SortTable::Union(parts) if parts.iter().any(|p| {
            matches!(p, SortTable::Enumeration(_) | SortTable::IntRange(..)) && table_subsumes(p, &other.table)
        }))
    }
}

fn table_subsumes(_parent_part: &SortTable, _child: &SortTable) -> bool {
    // Conservative: without named sub-sort declarations we cannot prove
    // subsumption structurally, so this always reports false and callers
    // fall back to the UNKNOWN classification (§4.4 step 2), which is safe.
    false
}

/// Relation between a generator variable's declared sort and a symbol
/// argument's declared sort (§4.4 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortRelation {
    Equal,
    Parent,
    Child,
    Unknown,
}

pub fn classify_sort(var_sort: &Sort, symbol_sort: &Sort) -> SortRelation {
    if var_sort == symbol_sort {
        SortRelation::Equal
    } else if var_sort.is_parent_of(symbol_sort) {
        SortRelation::Parent
    } else if symbol_sort.is_parent_of(var_sort) {
        SortRelation::Child
    } else {
        SortRelation::Unknown
    }
}

/// Built-in predicates (§3); arithmetic comparisons double as the
/// comparison operators inside equivalence-chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinPredicate {
    Eq,
    Neq,
    Lt,
    Gt,
    Leq,
    Geq,
}

impl BuiltinPredicate {
    pub fn flip(self) -> Self {
        match self {
            BuiltinPredicate::Eq => BuiltinPredicate::Eq,
            BuiltinPredicate::Neq => BuiltinPredicate::Neq,
            BuiltinPredicate::Lt => BuiltinPredicate::Gt,
            BuiltinPredicate::Gt => BuiltinPredicate::Lt,
            BuiltinPredicate::Leq => BuiltinPredicate::Geq,
            BuiltinPredicate::Geq => BuiltinPredicate::Leq,
        }
    }

    pub fn negate(self) -> Self {
        match self {
            BuiltinPredicate::Eq => BuiltinPredicate::Neq,
            BuiltinPredicate::Neq => BuiltinPredicate::Eq,
            BuiltinPredicate::Lt => BuiltinPredicate::Geq,
            BuiltinPredicate::Gt => BuiltinPredicate::Leq,
            BuiltinPredicate::Leq => BuiltinPredicate::Gt,
            BuiltinPredicate::Geq => BuiltinPredicate::Lt,
        }
    }

    pub fn eval(self, lhs: f64, rhs: f64) -> bool {
        match self {
            BuiltinPredicate::Eq => lhs == rhs,
            BuiltinPredicate::Neq => lhs != rhs,
            BuiltinPredicate::Lt => lhs < rhs,
            BuiltinPredicate::Gt => lhs > rhs,
            BuiltinPredicate::Leq => lhs <= rhs,
            BuiltinPredicate::Geq => lhs >= rhs,
        }
    }
}

/// Built-in functions (§3): arithmetic and aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinFunction {
    Plus,
    Minus,
    Times,
    Div,
    UnaryMinus,
    Abs,
    Mod,
    Exp,
    Card,
    Min,
    Max,
    Sum,
    Prod,
}

impl BuiltinFunction {
    /// Arity, excluding the output argument.
    pub fn arity(self) -> usize {
        use BuiltinFunction::*;
        match self {
            UnaryMinus | Abs | Card | Min | Max | Sum | Prod => 1,
            Plus | Minus | Times | Div | Mod | Exp => 2,
        }
    }

    pub fn is_aggregate(self) -> bool {
        matches!(self, BuiltinFunction::Card | BuiltinFunction::Min | BuiltinFunction::Max | BuiltinFunction::Sum | BuiltinFunction::Prod)
    }
}

/// Derived-kind tag (§3): links a propagation leaf connector's ct/cf/pt/pf
/// projection back to the symbol it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DerivedKind {
    #[default]
    None,
    Ct,
    Cf,
    Pt,
    Pf,
}

/// A predicate symbol: name plus argument sort tuple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Predicate {
    pub name: String,
    pub sorts: Vec<Rc<Sort>>,
    pub builtin: Option<BuiltinPredicate>,
    pub derived: DerivedKind,
    pub parent: Option<String>,
}

impl Predicate {
    pub fn new(name: impl Into<String>, sorts: Vec<Rc<Sort>>) -> Self {
        Self { name: name.into(), sorts, builtin: None, derived: DerivedKind::None, parent: None }
    }

    pub fn arity(&self) -> usize {
        self.sorts.len()
    }

    pub fn is_builtin(&self) -> bool {
        self.builtin.is_some()
    }
}
impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.sorts.len() == other.sorts.len()
    }
}
impl Eq for Predicate {}
impl Hash for Predicate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.sorts.len().hash(state);
    }
}

/// A function symbol: name, input sorts, output sort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub input: Vec<Rc<Sort>>,
    pub output: Rc<Sort>,
    pub builtin: Option<BuiltinFunction>,
    /// True when some input tuple has no image (partial function); a
    /// two-valued *total* function has `partial == false` and an explicit
    /// function table (§3 "Structure").
    pub partial: bool,
}

impl Function {
    pub fn new(name: impl Into<String>, input: Vec<Rc<Sort>>, output: Rc<Sort>) -> Self {
        Self { name: name.into(), input, output, builtin: None, partial: true }
    }

    pub fn arity(&self) -> usize {
        self.input.len()
    }

    pub fn is_builtin(&self) -> bool {
        self.builtin.is_some()
    }

    /// The graph predicate's sort tuple: `input ++ [output]`, used whenever
    /// a function is "graphed" (§4.3 `graphFunctions`, §4.6 denotation).
    pub fn graph_sorts(&self) -> Vec<Rc<Sort>> {
        let mut v = self.input.clone();
        v.push(self.output.clone());
        v
    }
}
impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.input.len() == other.input.len()
    }
}
impl Eq for Function {}
impl Hash for Function {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.input.len().hash(state);
    }
}

/// Either kind of symbol (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Symbol {
    Predicate(Rc<Predicate>),
    Function(Rc<Function>),
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Predicate(p) => write!(f, "{}", p.name),
            Symbol::Function(fun) => write!(f, "{}", fun.name),
        }
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Symbol::Predicate(a), Symbol::Predicate(b)) => a == b,
            (Symbol::Function(a), Symbol::Function(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for Symbol {}
impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Symbol::Predicate(p) => {
                0u8.hash(state);
                p.hash(state);
            }
            Symbol::Function(fun) => {
                1u8.hash(state);
                fun.hash(state);
            }
        }
    }
}

impl Symbol {
    pub fn name(&self) -> &str {
        match self {
            Symbol::Predicate(p) => &p.name,
            Symbol::Function(f) => &f.name,
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Symbol::Predicate(p) => p.arity(),
            Symbol::Function(f) => f.arity(),
        }
    }

    pub fn is_builtin(&self) -> bool {
        match self {
            Symbol::Predicate(p) => p.is_builtin(),
            Symbol::Function(f) => f.is_builtin(),
        }
    }

    /// The predicate's (or function graph's) full sort tuple, used to
    /// declare the backing table's universe.
    pub fn sort_tuple(&self) -> Vec<Rc<Sort>> {
        match self {
            Symbol::Predicate(p) => p.sorts.clone(),
            Symbol::Function(f) => f.graph_sorts(),
        }
    }

    /// The builtin `=/2` predicate over `sort`, as used by totality axioms
    /// and leaf connector side conditions (§4.3).
    pub fn eq_for(sort: &Rc<Sort>) -> Symbol {
        let mut p = Predicate::new("=", vec![sort.clone(), sort.clone()]);
        p.builtin = Some(BuiltinPredicate::Eq);
        Symbol::Predicate(Rc::new(p))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn int_range_size_and_membership() {
        let sort = Sort::new("N", SortTable::IntRange(1, 3));
        assert_eq!(sort.table.size(), Some(3));
        assert!(sort.table.contains(&DomainElement::Int(2)));
        assert!(!sort.table.contains(&DomainElement::Int(4)));
    }

    #[test]
    fn infinite_tables_report_no_size() {
        assert!(!SortTable::Int.is_finite());
        assert_eq!(SortTable::Int.size(), None);
    }

    #[test]
    fn union_size_sums_parts() {
        let table = SortTable::Union(vec![SortTable::IntRange(1, 2), SortTable::IntRange(5, 5)]);
        assert_eq!(table.size(), Some(3));
    }

    #[test]
    fn symbol_equality_by_name_and_arity() {
        let s = Sort::new("N", SortTable::IntRange(1, 3));
        let p1 = Predicate::new("P", vec![s.clone()]);
        let p2 = Predicate::new("P", vec![s]);
        assert_eq!(p1, p2);
    }

    #[test]
    fn builtin_predicate_flip_and_negate() {
        assert_eq!(BuiltinPredicate::Lt.flip(), BuiltinPredicate::Gt);
        assert_eq!(BuiltinPredicate::Lt.negate(), BuiltinPredicate::Geq);
        assert!(BuiltinPredicate::Lt.eval(1.0, 2.0));
    }
}
