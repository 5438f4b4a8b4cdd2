//! The FOBDD manager (§4.1, L1): hash-consed factory and algebra of
//! first-order ordered binary decision diagrams.
//!
//! Built as an arena of nodes plus a hash-cons cache (`node`/
//! `if_then_else`/`restrict`), generalised to first-order kernels: a kernel
//! is an atomic first-order formula (an atom,
//! a quantification, or an aggregate comparison) rather than a bare
//! propositional variable, and leaf terms carry De Bruijn indices for bound
//! variables (§3 "FOBDDManager-owned entities").
//!
//! Per §9's "Manager-owned hash-cons" design note, every entity is reached
//! through a stable, non-owning, index-based handle (`TermId`/`KernelId`/
//! `BddId`) into one of the manager's arenas rather than a shared pointer;
//! a second manager spawned for [`crate::cost::optimize_query`] is a
//! legitimate second arena, and moving a BDD between managers is the
//! explicit `get_bdd_from` deep copy.

pub mod order;
pub mod visitors;

use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{GroundingError, Result};
use crate::vocabulary::{BuiltinFunction, BuiltinPredicate, DomainElement, Sort, Symbol};
use order::{KernelCategory, KernelOrder};

/// Handle to a term owned by a [`FobddManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TermId(pub usize);

/// Handle to a kernel owned by a [`FobddManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KernelId(pub usize);

/// Handle to a BDD node owned by a [`FobddManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BddId(pub usize);

impl BddId {
    pub const BOT: BddId = BddId(0);
    pub const TOP: BddId = BddId(1);

    pub fn is_truth_value(self) -> bool {
        self == BddId::BOT || self == BddId::TOP
    }
}

/// A first-order term leaf/function application (§3 FOBDDManager-owned
/// entities). Quantified-set terms live in [`EnumSetExpr`] rather than
/// here, since they always appear under an `Agg` term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FobddTerm {
    Variable(crate::theory::Variable),
    DeBruijn { sort: Rc<Sort>, depth: usize },
    Domain(DomainElement, Rc<Sort>),
    Func(Symbol, Vec<TermId>),
    Agg(BuiltinFunction, EnumSetExpr),
}

/// One quantified subset of an aggregate's enum-set (§3 `QuantSetExpr`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantSetExpr {
    pub vars: Vec<crate::theory::Variable>,
    pub condition: BddId,
    pub weight: TermId,
}

/// The set-comprehension form an aggregate term ranges over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumSetExpr {
    pub subsets: Vec<QuantSetExpr>,
}

/// What an atom kernel asserts about its backing table (§4.1
/// `getAtomKernel`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AtomKernelKind {
    Ct,
    Cf,
    TwoVal,
}

/// A BDD kernel (§3 "Kernel").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KernelKind {
    Atom { symbol: Symbol, kind: AtomKernelKind, args: Vec<TermId> },
    Quant { sort: Rc<Sort>, body: BddId },
    Agg { lhs: TermId, comp: BuiltinPredicate, aggterm: TermId },
    True,
    False,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kernel {
    pub kind: KernelKind,
    pub order: KernelOrder,
}

/// A BDD node: `(kernel, false-branch, true-branch)`, or a leaf when
/// `kernel` is `None` (§3 "Canonical BDD invariants").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
struct BddNode {
    kernel: Option<KernelId>,
    lo: BddId,
    hi: BddId,
}

/// Hash-cons key for a function term: identity is `(symbol, ordered arg
/// list)` (§3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FuncKey(Symbol, Vec<TermId>);

/// Hash-cons key for an atom kernel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AtomKey(Symbol, AtomKernelKindKey, Vec<TermId>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum AtomKernelKindKey {
    Ct,
    Cf,
    TwoVal,
}

impl From<AtomKernelKind> for AtomKernelKindKey {
    fn from(k: AtomKernelKind) -> Self {
        match k {
            AtomKernelKind::Ct => AtomKernelKindKey::Ct,
            AtomKernelKind::Cf => AtomKernelKindKey::Cf,
            AtomKernelKind::TwoVal => AtomKernelKindKey::TwoVal,
        }
    }
}

/// The hash-consed factory and algebra of FOBDDs (§4.1). Owns every term,
/// kernel and BDD node it has ever constructed; nothing is ever deleted
/// from the arenas; garbage collection of unreachable nodes is left as
/// future work.
#[derive(Debug, Serialize, Deserialize)]
pub struct FobddManager {
    terms: Vec<FobddTerm>,
    #[serde(skip)]
    term_cache: HashMap<FobddTerm, TermId>,
    kernels: Vec<Kernel>,
    #[serde(skip)]
    atom_cache: HashMap<AtomKey, KernelId>,
    #[serde(skip)]
    quant_cache: HashMap<(Rc<Sort>, BddId), KernelId>,
    #[serde(skip)]
    agg_kernel_cache: HashMap<(TermId, BuiltinPredicate, TermId), KernelId>,
    nodes: Vec<BddNode>,
    #[serde(skip)]
    node_cache: HashMap<BddNode, BddId>,
    #[serde(skip)]
    neg_cache: HashMap<BddId, BddId>,
    #[serde(skip)]
    conj_cache: HashMap<(BddId, BddId), BddId>,
    next_standard: u64,
    next_debruijn: u64,
    /// Whether `getFuncTerm`/`getAtomKernel` run the arithmetic rewriting
    /// layer (§4.1 "Arithmetic kernel rewrites" / "FuncTerm arithmetic
    /// rewrites"), gated behind a configuration flag as in the source.
    pub arithmetic_rewriting: bool,
}

// `FobddTerm`/`FuncKey` derive `Hash` via floats wrapped in `OrdFloat`
// (vocabulary::DomainElement), so this is sound despite containing f64.
impl std::hash::Hash for FobddTerm {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            FobddTerm::Variable(v) => {
                0u8.hash(state);
                v.hash(state);
            }
            FobddTerm::DeBruijn { sort, depth } => {
                1u8.hash(state);
                sort.hash(state);
                depth.hash(state);
            }
            FobddTerm::Domain(d, s) => {
                2u8.hash(state);
                d.hash(state);
                s.hash(state);
            }
            FobddTerm::Func(sym, args) => {
                3u8.hash(state);
                sym.hash(state);
                args.hash(state);
            }
            FobddTerm::Agg(agg, set) => {
                4u8.hash(state);
                agg.hash(state);
                set.subsets.len().hash(state);
                for s in &set.subsets {
                    s.vars.len().hash(state);
                    s.condition.hash(state);
                    s.weight.hash(state);
                }
            }
        }
    }
}
impl Eq for FobddTerm {}

impl Default for FobddManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FobddManager {
    pub fn new() -> Self {
        let mut mgr = Self {
            terms: Vec::new(),
            term_cache: HashMap::new(),
            kernels: vec![Kernel { kind: KernelKind::False, order: KernelOrder::TRUE_FALSE }, Kernel {
                kind: KernelKind::True,
                order: KernelOrder::TRUE_FALSE,
            }],
            atom_cache: HashMap::new(),
            quant_cache: HashMap::new(),
            agg_kernel_cache: HashMap::new(),
            nodes: vec![
                BddNode { kernel: None, lo: BddId::BOT, hi: BddId::BOT },
                BddNode { kernel: None, lo: BddId::TOP, hi: BddId::TOP },
            ],
            node_cache: HashMap::new(),
            neg_cache: HashMap::new(),
            conj_cache: HashMap::new(),
            next_standard: 0,
            next_debruijn: 0,
            arithmetic_rewriting: true,
        };
        mgr.node_cache.insert(mgr.nodes[0], BddId::BOT);
        mgr.node_cache.insert(mgr.nodes[1], BddId::TOP);
        mgr
    }

    pub fn truebdd(&self) -> BddId {
        BddId::TOP
    }

    pub fn falsebdd(&self) -> BddId {
        BddId::BOT
    }

    pub fn false_kernel_id(&self) -> KernelId {
        KernelId(0)
    }

    pub fn true_kernel_id(&self) -> KernelId {
        KernelId(1)
    }

    pub fn term(&self, id: TermId) -> &FobddTerm {
        &self.terms[id.0]
    }

    pub fn kernel(&self, id: KernelId) -> &Kernel {
        &self.kernels[id.0]
    }

    fn node(&self, id: BddId) -> BddNode {
        self.nodes[id.0]
    }

    /// The BDD's kernel, or `None` for a leaf.
    pub fn bdd_kernel(&self, id: BddId) -> Option<KernelId> {
        self.node(id).kernel
    }

    pub fn bdd_lo(&self, id: BddId) -> BddId {
        self.node(id).lo
    }

    pub fn bdd_hi(&self, id: BddId) -> BddId {
        self.node(id).hi
    }

    // ---- term constructors ----------------------------------------

    fn intern_term(&mut self, t: FobddTerm) -> TermId {
        if let Some(id) = self.term_cache.get(&t) {
            return *id;
        }
        let id = TermId(self.terms.len());
        self.terms.push(t.clone());
        self.term_cache.insert(t, id);
        id
    }

    pub fn get_variable(&mut self, var: crate::theory::Variable) -> TermId {
        self.intern_term(FobddTerm::Variable(var))
    }

    pub fn get_de_bruijn_index(&mut self, sort: Rc<Sort>, depth: usize) -> TermId {
        self.intern_term(FobddTerm::DeBruijn { sort, depth })
    }

    pub fn get_domain_term(&mut self, value: DomainElement, sort: Rc<Sort>) -> TermId {
        self.intern_term(FobddTerm::Domain(value, sort))
    }

    /// Builds a function term, running the arithmetic rewriting layer
    /// (§4.1 "FuncTerm arithmetic rewrites") when enabled and `f` is one of
    /// the arithmetic built-ins.
    pub fn get_func_term(&mut self, f: Symbol, args: Vec<TermId>) -> Result<TermId> {
        if let Symbol::Function(func) = &f {
            if self.arithmetic_rewriting {
                if let Some(builtin) = func.builtin {
                    if let Some(rewritten) = visitors::rewrite_arithmetic(self, builtin, &args)? {
                        return Ok(rewritten);
                    }
                }
            }
        }
        Ok(self.intern_term(FobddTerm::Func(f, args)))
    }

    pub fn get_agg_term(&mut self, agg: BuiltinFunction, set: EnumSetExpr) -> TermId {
        self.intern_term(FobddTerm::Agg(agg, set))
    }

    // ---- kernel constructors ----------------------------------------

    fn next_standard_order(&mut self) -> KernelOrder {
        let n = self.next_standard;
        self.next_standard += 1;
        KernelOrder::standard(n)
    }

    fn next_debruijn_order(&mut self) -> KernelOrder {
        let n = self.next_debruijn;
        self.next_debruijn += 1;
        KernelOrder::de_bruijn(n)
    }

    fn push_kernel(&mut self, kind: KernelKind, order: KernelOrder) -> KernelId {
        let id = KernelId(self.kernels.len());
        self.kernels.push(Kernel { kind, order });
        id
    }

    /// `getAtomKernel` (§4.1). Applies the arithmetic kernel rewrites (§4.1
    /// item 1-2) when `arithmetic_rewriting` is set and the symbol is a
    /// built-in comparison/sort predicate; otherwise hash-conses a plain
    /// atom kernel.
    pub fn get_atom_kernel(&mut self, symbol: Symbol, kind: AtomKernelKind, args: Vec<TermId>) -> Result<KernelId> {
        if self.arithmetic_rewriting {
            if let Some(rewritten) = visitors::rewrite_atom_kernel(self, &symbol, kind, &args)? {
                return Ok(rewritten);
            }
        }
        let key = AtomKey(symbol.clone(), kind.into(), args.clone());
        if let Some(id) = self.atom_cache.get(&key) {
            return Ok(*id);
        }
        let order = self.next_standard_order();
        let id = self.push_kernel(KernelKind::Atom { symbol, kind, args }, order);
        self.atom_cache.insert(key, id);
        Ok(id)
    }

    /// `getQuantKernel` (§4.1). `body` must be a BDD over De Bruijn depth 0
    /// relative to this quantifier (i.e. already shifted by the caller,
    /// per "Every quant-kernel introduces a De Bruijn depth of 1").
    pub fn get_quant_kernel(&mut self, sort: Rc<Sort>, body: BddId) -> KernelId {
        let key = (sort.clone(), body);
        if let Some(id) = self.quant_cache.get(&key) {
            return *id;
        }
        let order = self.next_debruijn_order();
        let id = self.push_kernel(KernelKind::Quant { sort, body }, order);
        self.quant_cache.insert(key, id);
        id
    }

    pub fn get_agg_kernel(&mut self, lhs: TermId, comp: BuiltinPredicate, aggterm: TermId) -> KernelId {
        let key = (lhs, comp, aggterm);
        if let Some(id) = self.agg_kernel_cache.get(&key) {
            return *id;
        }
        let order = self.next_standard_order();
        let id = self.push_kernel(KernelKind::Agg { lhs, comp, aggterm }, order);
        self.agg_kernel_cache.insert(key, id);
        id
    }

    // ---- BDD node constructors ----------------------------------------

    fn intern_node(&mut self, node: BddNode) -> BddId {
        if node.lo == node.hi {
            return node.lo;
        }
        if let Some(id) = self.node_cache.get(&node) {
            return *id;
        }
        let id = BddId(self.nodes.len());
        self.nodes.push(node);
        self.node_cache.insert(node, id);
        id
    }

    /// `getBDD`: internal-only constructor used when the caller already
    /// guarantees `k`'s order is strictly above both branches' kernels
    /// (§4.1 "canonical invariants"). External callers must use
    /// [`FobddManager::ifthenelse`].
    fn get_bdd_unchecked(&mut self, k: KernelId, t: BddId, f: BddId) -> BddId {
        if k == self.false_kernel_id() {
            return f;
        }
        if k == self.true_kernel_id() {
            return t;
        }
        self.intern_node(BddNode { kernel: Some(k), lo: f, hi: t })
    }

    fn kernel_order_of(&self, bdd: BddId) -> KernelOrder {
        match self.node(bdd).kernel {
            Some(k) => self.kernels[k.0].order,
            None => KernelOrder::TRUE_FALSE,
        }
    }

    /// `ifthenelse(k, t, f)` (§4.1): the only constructor that respects the
    /// canonical kernel order, pulling the smallest-ordered kernel among
    /// `{k, t.kernel, f.kernel}` to the top and recursively reassembling.
    pub fn ifthenelse(&mut self, k: KernelId, t: BddId, f: BddId) -> BddId {
        if t == f {
            return t;
        }
        if k == self.false_kernel_id() {
            return f;
        }
        if k == self.true_kernel_id() {
            return t;
        }
        let k_order = self.kernels[k.0].order;
        let t_order = self.kernel_order_of(t);
        let f_order = self.kernel_order_of(f);
        if k_order < t_order && k_order < f_order {
            return self.get_bdd_unchecked(k, t, f);
        }
        // The smallest kernel among the three must be pulled to the top.
        if t_order <= k_order && t_order <= f_order {
            // t's kernel dominates; split on it.
            let tk = self.node(t).kernel.expect("t_order is not TRUE_FALSE");
            let (t_lo, t_hi) = (self.node(t).lo, self.node(t).hi);
            let new_t = self.ifthenelse(k, t_hi, if f_order == t_order { self.node(f).hi } else { f });
            let new_f = self.ifthenelse(k, t_lo, if f_order == t_order { self.node(f).lo } else { f });
            self.get_bdd_unchecked(tk, new_t, new_f)
        } else {
            let fk = self.node(f).kernel.expect("f_order is not TRUE_FALSE");
            let (f_lo, f_hi) = (self.node(f).lo, self.node(f).hi);
            let new_t = self.ifthenelse(k, t, f_hi);
            let new_f = self.ifthenelse(k, t, f_lo);
            self.get_bdd_unchecked(fk, new_t, new_f)
        }
    }

    // ---- Boolean algebra ----------------------------------------

    pub fn negation(&mut self, b: BddId) -> BddId {
        if b == BddId::TOP {
            return BddId::BOT;
        }
        if b == BddId::BOT {
            return BddId::TOP;
        }
        if let Some(cached) = self.neg_cache.get(&b) {
            return *cached;
        }
        let node = self.node(b);
        let k = node.kernel.expect("non-leaf");
        let lo = self.negation(node.lo);
        let hi = self.negation(node.hi);
        let result = self.get_bdd_unchecked(k, hi, lo);
        self.neg_cache.insert(b, result);
        result
    }

    fn canonical_pair(a: BddId, b: BddId) -> (BddId, BddId) {
        if a.0 <= b.0 {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn conjunction(&mut self, a: BddId, b: BddId) -> BddId {
        if a == BddId::BOT || b == BddId::BOT {
            return BddId::BOT;
        }
        if a == BddId::TOP {
            return b;
        }
        if b == BddId::TOP || a == b {
            return if b == BddId::TOP { a } else { a };
        }
        let key = Self::canonical_pair(a, b);
        if let Some(cached) = self.conj_cache.get(&key) {
            return *cached;
        }
        let a_order = self.kernel_order_of(a);
        let b_order = self.kernel_order_of(b);
        let result = if a_order == b_order {
            // Shared top kernel: cofactor both operands on it, not just `a`,
            // or the kernel survives unreduced down one branch (canonical
            // invariant 4).
            let a_node = self.node(a);
            let b_node = self.node(b);
            let k = a_node.kernel.expect("non-leaf");
            let hi = self.conjunction(a_node.hi, b_node.hi);
            let lo = self.conjunction(a_node.lo, b_node.lo);
            self.ifthenelse(k, hi, lo)
        } else if a_order < b_order {
            let node = self.node(a);
            let k = node.kernel.expect("non-leaf");
            let hi = self.conjunction(node.hi, b);
            let lo = self.conjunction(node.lo, b);
            self.ifthenelse(k, hi, lo)
        } else {
            let node = self.node(b);
            let k = node.kernel.expect("non-leaf");
            let hi = self.conjunction(a, node.hi);
            let lo = self.conjunction(a, node.lo);
            self.ifthenelse(k, hi, lo)
        };
        self.conj_cache.insert(key, result);
        result
    }

    pub fn disjunction(&mut self, a: BddId, b: BddId) -> BddId {
        let na = self.negation(a);
        let nb = self.negation(b);
        let conj = self.conjunction(na, nb);
        self.negation(conj)
    }

    /// Re-derives `b` through the canonicalizing constructors so every atom
    /// kernel and arithmetic term reflects the current rewrite rules (§4.1
    /// `simplify`). Useful after [`FobddManager::get_bdd_from`]-ing a BDD built
    /// with `arithmetic_rewriting` disabled, or after changing that flag.
    pub fn simplify(&mut self, b: BddId) -> Result<BddId> {
        visitors::simplify_bdd(self, b)
    }

    /// `univquantify(var, b) = ¬∃v.¬b`; universal quantification is defined
    /// in terms of existential, so existential is the primitive built on
    /// [`FobddManager::quantify`].
    pub fn existsquantify(&mut self, sort: Rc<Sort>, var: crate::theory::Variable, b: BddId) -> BddId {
        let var_term = self.get_variable(var);
        let index_term = self.get_de_bruijn_index(sort.clone(), 0);
        let shifted = visitors::substitute_var_to_index(self, b, var_term, index_term);
        self.quantify(sort, shifted)
    }

    pub fn univquantify(&mut self, sort: Rc<Sort>, var: crate::theory::Variable, b: BddId) -> BddId {
        let nb = self.negation(b);
        let exists = self.existsquantify(sort, var, nb);
        self.negation(exists)
    }

    /// `quantify(sort, b)` (§4.1): the body is already shifted to depth 0.
    pub fn quantify(&mut self, sort: Rc<Sort>, b: BddId) -> BddId {
        if b == BddId::BOT {
            return BddId::BOT;
        }
        let contains0 = visitors::contains_de_bruijn(self, b, 0);
        if b == BddId::TOP || !contains0 {
            // The quantifier vanishes, but the result still asserts the
            // sort's non-emptiness for user sorts (built-in sorts are
            // assumed inhabited and skip this conjunct).
            let shifted = if contains0 { b } else { visitors::shift_de_bruijn(self, b, 0, -1) };
            if sort.table.is_finite() && matches!(sort.table.size(), Some(0)) {
                return BddId::BOT;
            }
            return shifted;
        }
        let kernel_is_standard = match self.node(b).kernel {
            Some(k) => self.kernels[k.0].order.category == KernelCategory::Standard,
            None => true,
        };
        if kernel_is_standard {
            // STANDARD kernels are variable-disjoint from the quantified
            // variable (it only ever appears via DeBruijn-category
            // kernels/terms), so the quantifier pushes into each branch.
            let node = self.node(b);
            let k = node.kernel.expect("non-leaf, non-de-bruijn-root");
            let hi = self.quantify(sort.clone(), node.hi);
            let lo = self.quantify(sort, node.lo);
            self.ifthenelse(k, hi, lo)
        } else {
            let qk = self.get_quant_kernel(sort, b);
            self.get_bdd_unchecked(qk, BddId::TOP, BddId::BOT)
        }
    }

    // ---- queries ----------------------------------------

    pub fn contains_variable(&mut self, b: BddId, var: &crate::theory::Variable) -> bool {
        visitors::contains_variable(self, b, var)
    }

    pub fn longestbranch(&self, b: BddId) -> usize {
        if b.is_truth_value() {
            return 0;
        }
        let node = self.node(b);
        1 + self.longestbranch(node.lo).max(self.longestbranch(node.hi))
    }

    /// Number of root-to-leaf paths ending in `false`, used by the cost
    /// estimator (§4.2).
    pub fn paths_to_false(&self, b: BddId) -> usize {
        if b == BddId::BOT {
            return 1;
        }
        if b == BddId::TOP {
            return 0;
        }
        let node = self.node(b);
        self.paths_to_false(node.lo) + self.paths_to_false(node.hi)
    }

    /// Copies `b`, built by `other`, into `self` (§4.1 cross-manager
    /// `getBDD`); used by [`crate::cost::optimize_query`]'s temporary
    /// manager.
    pub fn get_bdd_from(&mut self, other: &FobddManager, b: BddId) -> Result<BddId> {
        visitors::copy_bdd(self, other, b)
    }

    /// Swaps `kernel` with the neighbour immediately above it in its
    /// category (§4.1 "Ordering maintenance"), rewiring every BDD node that
    /// referenced either kernel at the top. A best-effort pass: the caller
    /// (the cost-driven `optimize_query`) repeatedly calls this and
    /// measures, rather than this method searching for the optimum itself.
    pub fn move_up(&mut self, kernel: KernelId) -> Result<()> {
        visitors::move_kernel(self, kernel, true)
    }

    pub fn move_down(&mut self, kernel: KernelId) -> Result<()> {
        visitors::move_kernel(self, kernel, false)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::theory::Variable;
    use crate::vocabulary::{Predicate, Sort, SortTable};
    use quickcheck_macros::quickcheck;
    use test_log::test;

    fn sort() -> Rc<Sort> {
        Sort::new("N", SortTable::IntRange(1, 3))
    }

    fn atom(mgr: &mut FobddManager, name: &str, var: &Variable) -> KernelId {
        let s = sort();
        let symbol = Symbol::Predicate(Rc::new(Predicate::new(name, vec![s])));
        let vt = mgr.get_variable(var.clone());
        mgr.get_atom_kernel(symbol, AtomKernelKind::TwoVal, vec![vt]).unwrap()
    }

    #[test]
    fn hash_consing_returns_same_handle_for_equal_terms() {
        let mut mgr = FobddManager::new();
        let v = Variable::new("x", sort());
        let t1 = mgr.get_variable(v.clone());
        let t2 = mgr.get_variable(v);
        assert_eq!(t1, t2);
    }

    #[test]
    fn conjunction_with_true_is_identity() {
        let mut mgr = FobddManager::new();
        let v = Variable::new("x", sort());
        let k = atom(&mut mgr, "P", &v);
        let b = mgr.get_bdd_unchecked(k, BddId::TOP, BddId::BOT);
        let conj = mgr.conjunction(b, BddId::TOP);
        assert_eq!(conj, b);
    }

    #[test]
    fn conjunction_with_false_is_false() {
        let mut mgr = FobddManager::new();
        let v = Variable::new("x", sort());
        let k = atom(&mut mgr, "P", &v);
        let b = mgr.get_bdd_unchecked(k, BddId::TOP, BddId::BOT);
        let conj = mgr.conjunction(b, BddId::BOT);
        assert_eq!(conj, BddId::BOT);
    }

    #[test]
    fn double_negation_is_identity() {
        let mut mgr = FobddManager::new();
        let v = Variable::new("x", sort());
        let k = atom(&mut mgr, "P", &v);
        let b = mgr.get_bdd_unchecked(k, BddId::TOP, BddId::BOT);
        let nn = mgr.negation(mgr.negation(b));
        assert_eq!(nn, b);
    }

    #[test]
    fn conjunction_is_commutative_by_pointer_equality() {
        let mut mgr = FobddManager::new();
        let v1 = Variable::new("x", sort());
        let v2 = Variable::new("y", sort());
        let ka = atom(&mut mgr, "P", &v1);
        let kb = atom(&mut mgr, "Q", &v2);
        let a = mgr.get_bdd_unchecked(ka, BddId::TOP, BddId::BOT);
        let b = mgr.get_bdd_unchecked(kb, BddId::TOP, BddId::BOT);
        assert_eq!(mgr.conjunction(a, b), mgr.conjunction(b, a));
    }

    #[test]
    fn ifthenelse_collapses_equal_branches() {
        let mut mgr = FobddManager::new();
        let v = Variable::new("x", sort());
        let k = atom(&mut mgr, "P", &v);
        let b = mgr.ifthenelse(k, BddId::TOP, BddId::TOP);
        assert_eq!(b, BddId::TOP);
    }

    #[quickcheck]
    fn bdd_id_is_truth_value_iff_bot_or_top(n: usize) -> bool {
        BddId(n).is_truth_value() == (n == BddId::BOT.0 || n == BddId::TOP.0)
    }

    #[quickcheck]
    fn conjunction_is_idempotent(a_is_top: bool) -> bool {
        let mut mgr = FobddManager::new();
        let v = Variable::new("x", sort());
        let k = atom(&mut mgr, "P", &v);
        let b = if a_is_top { BddId::TOP } else { mgr.get_bdd_unchecked(k, BddId::TOP, BddId::BOT) };
        mgr.conjunction(b, b) == b
    }
}
