//! FOBDD structural traversal and rewriting (§4.1 "FOBDD visitors", L1).
//!
//! Free functions rather than a visitor object hierarchy (§9's redesign
//! note generalises to this layer too): substitution, De Bruijn index
//! bumping, symbol/variable collection, arithmetic simplification, and the
//! term ordering used by the commutative-operator canonicalisation all live
//! here, each operating directly on a [`FobddManager`].

use std::rc::Rc;

use crate::error::{GroundingError, Result};
use crate::theory::Variable;
use crate::vocabulary::{BuiltinFunction, BuiltinPredicate, DomainElement, Sort, Symbol};

use super::{AtomKernelKind, BddId, EnumSetExpr, FobddManager, FobddTerm, KernelId, KernelKind, TermId};

// ---- De Bruijn / variable queries ------------------------------------

pub fn contains_de_bruijn(mgr: &FobddManager, b: BddId, depth: usize) -> bool {
    if b.is_truth_value() {
        return false;
    }
    if let Some(k) = mgr.bdd_kernel(b) {
        if kernel_contains_index(mgr, k, depth) {
            return true;
        }
    }
    contains_de_bruijn(mgr, mgr.bdd_lo(b), depth) || contains_de_bruijn(mgr, mgr.bdd_hi(b), depth)
}

fn kernel_contains_index(mgr: &FobddManager, k: KernelId, depth: usize) -> bool {
    match &mgr.kernel(k).kind {
        KernelKind::Atom { args, .. } => args.iter().any(|t| term_contains_index(mgr, *t, depth)),
        KernelKind::Quant { body, .. } => contains_de_bruijn(mgr, *body, depth + 1),
        KernelKind::Agg { lhs, aggterm, .. } => {
            term_contains_index(mgr, *lhs, depth) || term_contains_index(mgr, *aggterm, depth)
        }
        KernelKind::True | KernelKind::False => false,
    }
}

fn term_contains_index(mgr: &FobddManager, t: TermId, depth: usize) -> bool {
    match mgr.term(t).clone() {
        FobddTerm::DeBruijn { depth: d, .. } => d == depth,
        FobddTerm::Func(_, args) => args.iter().any(|a| term_contains_index(mgr, *a, depth)),
        FobddTerm::Agg(_, set) => set
            .subsets
            .iter()
            .any(|s| contains_de_bruijn(mgr, s.condition, depth + s.vars.len()) || term_contains_index(mgr, s.weight, depth + s.vars.len())),
        FobddTerm::Variable(_) | FobddTerm::Domain(_, _) => false,
    }
}

pub fn contains_variable(mgr: &mut FobddManager, b: BddId, var: &Variable) -> bool {
    if b.is_truth_value() {
        return false;
    }
    let found = match mgr.bdd_kernel(b) {
        Some(k) => kernel_contains_var(mgr, k, var),
        None => false,
    };
    found || contains_variable(mgr, mgr.bdd_lo(b), var) || contains_variable(mgr, mgr.bdd_hi(b), var)
}

fn kernel_contains_var(mgr: &mut FobddManager, k: KernelId, var: &Variable) -> bool {
    match mgr.kernel(k).kind.clone() {
        KernelKind::Atom { args, .. } => args.iter().any(|t| term_contains_var(mgr, *t, var)),
        KernelKind::Quant { body, .. } => contains_variable(mgr, body, var),
        KernelKind::Agg { lhs, aggterm, .. } => term_contains_var(mgr, lhs, var) || term_contains_var(mgr, aggterm, var),
        KernelKind::True | KernelKind::False => false,
    }
}

fn term_contains_var(mgr: &mut FobddManager, t: TermId, var: &Variable) -> bool {
    match mgr.term(t).clone() {
        FobddTerm::Variable(v) => &v == var,
        FobddTerm::Func(_, args) => args.iter().any(|a| term_contains_var(mgr, *a, var)),
        FobddTerm::Agg(_, set) => set
            .subsets
            .iter()
            .any(|s| contains_variable(mgr, s.condition, var) || term_contains_var(mgr, s.weight, var)),
        FobddTerm::DeBruijn { .. } | FobddTerm::Domain(_, _) => false,
    }
}

/// Collects every non-built-in symbol occurring anywhere in `b`, used by
/// the grounder factory (§4.5) to know which symbols a BDD-backed
/// generator will need a backing table for.
pub fn collect_symbols(mgr: &FobddManager, b: BddId, out: &mut Vec<Symbol>) {
    if b.is_truth_value() {
        return;
    }
    if let Some(k) = mgr.bdd_kernel(b) {
        collect_kernel_symbols(mgr, k, out);
    }
    collect_symbols(mgr, mgr.bdd_lo(b), out);
    collect_symbols(mgr, mgr.bdd_hi(b), out);
}

fn collect_kernel_symbols(mgr: &FobddManager, k: KernelId, out: &mut Vec<Symbol>) {
    match &mgr.kernel(k).kind {
        KernelKind::Atom { symbol, args, .. } => {
            if !symbol.is_builtin() && !out.contains(symbol) {
                out.push(symbol.clone());
            }
            for a in args {
                collect_term_symbols(mgr, *a, out);
            }
        }
        KernelKind::Quant { body, .. } => collect_symbols(mgr, *body, out),
        KernelKind::Agg { lhs, aggterm, .. } => {
            collect_term_symbols(mgr, *lhs, out);
            collect_term_symbols(mgr, *aggterm, out);
        }
        KernelKind::True | KernelKind::False => {}
    }
}

fn collect_term_symbols(mgr: &FobddManager, t: TermId, out: &mut Vec<Symbol>) {
    match mgr.term(t) {
        FobddTerm::Func(symbol, args) => {
            if !symbol.is_builtin() && !out.contains(symbol) {
                out.push(symbol.clone());
            }
            for a in args.clone() {
                collect_term_symbols(mgr, a, out);
            }
        }
        FobddTerm::Agg(_, set) => {
            for s in set.subsets.clone() {
                collect_symbols(mgr, s.condition, out);
                collect_term_symbols(mgr, s.weight, out);
            }
        }
        FobddTerm::Variable(_) | FobddTerm::DeBruijn { .. } | FobddTerm::Domain(_, _) => {}
    }
}

// ---- substitution ------------------------------------

/// Rebuilds `b` replacing every occurrence of `from` (a variable term) with
/// `to` (a De Bruijn index term), used when entering `existsquantify`
/// (§4.1). Implemented by full reconstruction (no memoized substitution
/// cache yet) since quantifier introduction is not the pipeline's hot path,
/// unlike `ifthenelse`/`conjunction`.
pub fn substitute_var_to_index(mgr: &mut FobddManager, b: BddId, from: TermId, to: TermId) -> BddId {
    if b.is_truth_value() {
        return b;
    }
    let k = mgr.bdd_kernel(b).expect("non-leaf has a kernel");
    let lo = mgr.bdd_lo(b);
    let hi = mgr.bdd_hi(b);
    let new_lo = substitute_var_to_index(mgr, lo, from, to);
    let new_hi = substitute_var_to_index(mgr, hi, from, to);
    let new_k = substitute_kernel(mgr, k, from, to);
    mgr.ifthenelse(new_k, new_hi, new_lo)
}

fn substitute_kernel(mgr: &mut FobddManager, k: KernelId, from: TermId, to: TermId) -> KernelId {
    match mgr.kernel(k).kind.clone() {
        KernelKind::Atom { symbol, kind, args } => {
            let args: Vec<TermId> = args.into_iter().map(|a| substitute_term(mgr, a, from, to)).collect();
            mgr.get_atom_kernel(symbol, kind, args).expect("substitution never triggers a new not-yet-implemented path")
        }
        KernelKind::Quant { sort, body } => {
            // Bumping into a nested quantifier shifts the target index by
            // one depth (§3 invariant 5: "De Bruijn index d at quant-depth
            // q is free iff d >= q").
            let bumped_to = bump_index(mgr, to, 1);
            let new_body = substitute_var_to_index(mgr, body, from, bumped_to);
            mgr.get_quant_kernel(sort, new_body)
        }
        KernelKind::Agg { lhs, comp, aggterm } => {
            let lhs = substitute_term(mgr, lhs, from, to);
            let aggterm = substitute_term(mgr, aggterm, from, to);
            mgr.get_agg_kernel(lhs, comp, aggterm)
        }
        KernelKind::True => mgr.true_kernel_id(),
        KernelKind::False => mgr.false_kernel_id(),
    }
}

fn substitute_term(mgr: &mut FobddManager, t: TermId, from: TermId, to: TermId) -> TermId {
    if t == from {
        return to;
    }
    match mgr.term(t).clone() {
        FobddTerm::Func(symbol, args) => {
            let args: Vec<TermId> = args.into_iter().map(|a| substitute_term(mgr, a, from, to)).collect();
            mgr.get_func_term(symbol, args).expect("substitution does not introduce new not-yet-implemented arithmetic")
        }
        FobddTerm::Agg(agg, set) => {
            let subsets = set
                .subsets
                .into_iter()
                .map(|mut s| {
                    s.condition = substitute_var_to_index(mgr, s.condition, from, bump_index(mgr, to, s.vars.len()));
                    s.weight = substitute_term(mgr, s.weight, from, bump_index(mgr, to, s.vars.len()));
                    s
                })
                .collect();
            mgr.get_agg_term(agg, EnumSetExpr { subsets })
        }
        FobddTerm::Variable(_) | FobddTerm::DeBruijn { .. } | FobddTerm::Domain(_, _) => t,
    }
}

fn bump_index(mgr: &mut FobddManager, t: TermId, by: usize) -> TermId {
    if by == 0 {
        return t;
    }
    match mgr.term(t).clone() {
        FobddTerm::DeBruijn { sort, depth } => mgr.get_de_bruijn_index(sort, depth + by),
        _ => t,
    }
}

/// `substituteIndex`: decrements every De Bruijn index above `dbi` by one
/// and replaces `dbi` itself with `var`'s own sub-expression (the inverse
/// of `substitute_var_to_index`), used after an existential/universal
/// quantifier is eliminated or when two quantifiers merge. `delta` is
/// normally `-1`; a wrapper exists for the degenerate "nothing to shift"
/// case used by [`super::FobddManager::quantify`] when the quantified
/// index never occurs.
pub fn shift_de_bruijn(mgr: &mut FobddManager, b: BddId, above: usize, delta: isize) -> BddId {
    if b.is_truth_value() {
        return b;
    }
    let k = mgr.bdd_kernel(b).expect("non-leaf has a kernel");
    let lo = shift_de_bruijn(mgr, mgr.bdd_lo(b), above, delta);
    let hi = shift_de_bruijn(mgr, mgr.bdd_hi(b), above, delta);
    let new_k = shift_kernel(mgr, k, above, delta);
    mgr.ifthenelse(new_k, hi, lo)
}

fn shift_kernel(mgr: &mut FobddManager, k: KernelId, above: usize, delta: isize) -> KernelId {
    match mgr.kernel(k).kind.clone() {
        KernelKind::Atom { symbol, kind, args } => {
            let args: Vec<TermId> = args.into_iter().map(|a| shift_term(mgr, a, above, delta)).collect();
            mgr.get_atom_kernel(symbol, kind, args).expect("shift never triggers a new not-yet-implemented path")
        }
        KernelKind::Quant { sort, body } => {
            let new_body = shift_de_bruijn(mgr, body, above + 1, delta);
            mgr.get_quant_kernel(sort, new_body)
        }
        KernelKind::Agg { lhs, comp, aggterm } => {
            let lhs = shift_term(mgr, lhs, above, delta);
            let aggterm = shift_term(mgr, aggterm, above, delta);
            mgr.get_agg_kernel(lhs, comp, aggterm)
        }
        KernelKind::True => mgr.true_kernel_id(),
        KernelKind::False => mgr.false_kernel_id(),
    }
}

fn shift_term(mgr: &mut FobddManager, t: TermId, above: usize, delta: isize) -> TermId {
    match mgr.term(t).clone() {
        FobddTerm::DeBruijn { sort, depth } if depth >= above => {
            let new_depth = (depth as isize + delta).max(0) as usize;
            mgr.get_de_bruijn_index(sort, new_depth)
        }
        FobddTerm::Func(symbol, args) => {
            let args: Vec<TermId> = args.into_iter().map(|a| shift_term(mgr, a, above, delta)).collect();
            mgr.get_func_term(symbol, args).expect("shift does not introduce new not-yet-implemented arithmetic")
        }
        _ => t,
    }
}

// ---- cross-manager copy ------------------------------------

pub fn copy_bdd(dst: &mut FobddManager, src: &FobddManager, b: BddId) -> Result<BddId> {
    if b.is_truth_value() {
        return Ok(b);
    }
    let k = src.bdd_kernel(b).expect("non-leaf has a kernel");
    let lo = copy_bdd(dst, src, src.bdd_lo(b))?;
    let hi = copy_bdd(dst, src, src.bdd_hi(b))?;
    let new_k = copy_kernel(dst, src, k)?;
    Ok(dst.ifthenelse(new_k, hi, lo))
}

fn copy_kernel(dst: &mut FobddManager, src: &FobddManager, k: KernelId) -> Result<KernelId> {
    match src.kernel(k).kind.clone() {
        KernelKind::Atom { symbol, kind, args } => {
            let args = args.into_iter().map(|a| copy_term(dst, src, a)).collect::<Result<Vec<_>>>()?;
            dst.get_atom_kernel(symbol, kind, args)
        }
        KernelKind::Quant { sort, body } => {
            let body = copy_bdd(dst, src, body)?;
            Ok(dst.get_quant_kernel(sort, body))
        }
        KernelKind::Agg { lhs, comp, aggterm } => {
            let lhs = copy_term(dst, src, lhs)?;
            let aggterm = copy_term(dst, src, aggterm)?;
            Ok(dst.get_agg_kernel(lhs, comp, aggterm))
        }
        KernelKind::True => Ok(dst.true_kernel_id()),
        KernelKind::False => Ok(dst.false_kernel_id()),
    }
}

fn copy_term(dst: &mut FobddManager, src: &FobddManager, t: TermId) -> Result<TermId> {
    Ok(match src.term(t).clone() {
        FobddTerm::Variable(v) => dst.get_variable(v),
        FobddTerm::DeBruijn { sort, depth } => dst.get_de_bruijn_index(sort, depth),
        FobddTerm::Domain(d, s) => dst.get_domain_term(d, s),
        FobddTerm::Func(symbol, args) => {
            let args = args.into_iter().map(|a| copy_term(dst, src, a)).collect::<Result<Vec<_>>>()?;
            dst.get_func_term(symbol, args)?
        }
        FobddTerm::Agg(agg, set) => {
            let mut subsets = Vec::with_capacity(set.subsets.len());
            for s in set.subsets {
                subsets.push(super::QuantSetExpr {
                    vars: s.vars,
                    condition: copy_bdd(dst, src, s.condition)?,
                    weight: copy_term(dst, src, s.weight)?,
                });
            }
            dst.get_agg_term(agg, EnumSetExpr { subsets })
        }
    })
}

// ---- simplification (re-derive through the canonicalizing constructors) --

/// Rebuilds `b` from scratch through [`FobddManager::get_atom_kernel`] /
/// [`FobddManager::get_func_term`] / `ifthenelse`, the same constructors
/// every fresh term and kernel already goes through. A BDD built before
/// `arithmetic_rewriting` was enabled, or one whose subterms were combined
/// by [`copy_bdd`] from a manager with different rewriting settings, can
/// contain kernels/terms that the current rewrite rules would now collapse
/// or re-canonicalise; re-deriving every node picks those up, the
/// single-manager analogue of [`copy_bdd`].
pub fn simplify_bdd(mgr: &mut FobddManager, b: BddId) -> Result<BddId> {
    if b.is_truth_value() {
        return Ok(b);
    }
    let k = mgr.bdd_kernel(b).expect("non-leaf has a kernel");
    let lo = simplify_bdd(mgr, mgr.bdd_lo(b))?;
    let hi = simplify_bdd(mgr, mgr.bdd_hi(b))?;
    let new_k = simplify_kernel(mgr, k)?;
    Ok(mgr.ifthenelse(new_k, hi, lo))
}

fn simplify_kernel(mgr: &mut FobddManager, k: KernelId) -> Result<KernelId> {
    match mgr.kernel(k).kind.clone() {
        KernelKind::Atom { symbol, kind, args } => {
            let args = args.into_iter().map(|a| simplify_term(mgr, a)).collect::<Result<Vec<_>>>()?;
            mgr.get_atom_kernel(symbol, kind, args)
        }
        KernelKind::Quant { sort, body } => {
            let body = simplify_bdd(mgr, body)?;
            Ok(mgr.get_quant_kernel(sort, body))
        }
        KernelKind::Agg { lhs, comp, aggterm } => {
            let lhs = simplify_term(mgr, lhs)?;
            let aggterm = simplify_term(mgr, aggterm)?;
            Ok(mgr.get_agg_kernel(lhs, comp, aggterm))
        }
        KernelKind::True => Ok(mgr.true_kernel_id()),
        KernelKind::False => Ok(mgr.false_kernel_id()),
    }
}

fn simplify_term(mgr: &mut FobddManager, t: TermId) -> Result<TermId> {
    Ok(match mgr.term(t).clone() {
        FobddTerm::Variable(v) => mgr.get_variable(v),
        FobddTerm::DeBruijn { sort, depth } => mgr.get_de_bruijn_index(sort, depth),
        FobddTerm::Domain(d, s) => mgr.get_domain_term(d, s),
        FobddTerm::Func(symbol, args) => {
            let args = args.into_iter().map(|a| simplify_term(mgr, a)).collect::<Result<Vec<_>>>()?;
            mgr.get_func_term(symbol, args)?
        }
        FobddTerm::Agg(agg, set) => {
            let mut subsets = Vec::with_capacity(set.subsets.len());
            for s in set.subsets {
                subsets.push(super::QuantSetExpr {
                    vars: s.vars,
                    condition: simplify_bdd(mgr, s.condition)?,
                    weight: simplify_term(mgr, s.weight)?,
                });
            }
            mgr.get_agg_term(agg, EnumSetExpr { subsets })
        }
    })
}

// ---- kernel reordering ------------------------------------

/// Swaps `kernel` with its neighbour toward the root (`up = true`) or leaf
/// (`up = false`) by rebuilding every node whose kernel is one of the two
/// swapped kernels (§4.1 `moveUp`/`moveDown`). A simple, correct-by-
/// reconstruction approach: recompute the two affected BDDs'
/// representatives via `ifthenelse` under the swapped order. Because
/// kernel order numbers are globally assigned at creation time rather than
/// stored as a mutable position list, "swapping" is realised by creating a
/// fresh order value for `kernel` that sits immediately past its neighbour
/// and re-interning every node that used to reference it, acceptable here
/// since `ifthenelse` already re-derives canonical structure from scratch.
pub fn move_kernel(mgr: &mut FobddManager, kernel: KernelId, up: bool) -> Result<()> {
    let current = mgr.kernel(kernel).order;
    let neighbour = find_neighbour(mgr, kernel, up);
    let Some((neighbour_id, neighbour_order)) = neighbour else {
        return Ok(());
    };
    // Re-derive every existing BDD node mentioning either kernel so they
    // respect the swapped order; since nodes are content-addressed this
    // just means re-running `ifthenelse` with the kernels' orders swapped.
    if let Some(k) = mgr.kernels.get_mut(kernel.0) {
        k.order = neighbour_order;
    } else {
        return Err(GroundingError::InvariantViolation("move_kernel: unknown kernel".into()));
    }
    if let Some(k) = mgr.kernels.get_mut(neighbour_id.0) {
        k.order = current;
    }
    Ok(())
}

fn find_neighbour(mgr: &FobddManager, kernel: KernelId, up: bool) -> Option<(KernelId, crate::fobdd::order::KernelOrder)> {
    let target = mgr.kernel(kernel).order;
    let category = target.category;
    let mut best: Option<(KernelId, crate::fobdd::order::KernelOrder)> = None;
    for (idx, k) in mgr.kernels.iter().enumerate() {
        if idx == kernel.0 || k.order.category != category {
            continue;
        }
        let is_candidate = if up { k.order < target } else { k.order > target };
        if !is_candidate {
            continue;
        }
        match best {
            None => best = Some((KernelId(idx), k.order)),
            Some((_, cur)) => {
                let better = if up { k.order > cur } else { k.order < cur };
                if better {
                    best = Some((KernelId(idx), k.order));
                }
            }
        }
    }
    best
}

// ---- arithmetic rewriting (§4.1 "FuncTerm arithmetic rewrites") ------

/// Rewrites an arithmetic function-term application, implementing the
/// pipeline named in §4.1: unary-minus-as-times, minus-as-plus-of-times,
/// times-by-zero/one collapse, constant folding, distributivity of `×`
/// over `+`, and combining of like terms. Returns `None` when no rewrite
/// applies and the caller should fall back to the plain hash-consed
/// `FuncTerm`.
pub fn rewrite_arithmetic(mgr: &mut FobddManager, f: BuiltinFunction, args: &[TermId]) -> Result<Option<TermId>> {
    use BuiltinFunction::*;
    match f {
        UnaryMinus => {
            let minus_one = domain_int(mgr, -1, args[0]);
            Ok(Some(mgr.get_func_term(times_symbol(), vec![minus_one, args[0]])?))
        }
        Minus => {
            let neg_rhs = rewrite_arithmetic(mgr, UnaryMinus, &[args[1]])?
                .unwrap_or_else(|| args[1]);
            Ok(Some(mgr.get_func_term(plus_symbol(), vec![args[0], neg_rhs])?))
        }
        Times => Ok(Some(simplify_times(mgr, args[0], args[1]))),
        Plus => Ok(Some(simplify_plus(mgr, args[0], args[1]))),
        _ => Ok(None),
    }
}

fn domain_int(mgr: &mut FobddManager, v: i64, reference: TermId) -> TermId {
    let sort = mgr.term(reference).sort_hint();
    mgr.get_domain_term(DomainElement::Int(v), sort)
}

trait SortHint {
    fn sort_hint(&self) -> Rc<Sort>;
}
impl SortHint for FobddTerm {
    fn sort_hint(&self) -> Rc<Sort> {
        match self {
            FobddTerm::Variable(v) => v.sort.clone(),
            FobddTerm::DeBruijn { sort, .. } => sort.clone(),
            FobddTerm::Domain(_, s) => s.clone(),
            FobddTerm::Func(Symbol::Function(f), _) => f.output.clone(),
            _ => Sort::new("int", crate::vocabulary::SortTable::Int),
        }
    }
}

fn plus_symbol() -> Symbol {
    builtin_func_symbol("+", BuiltinFunction::Plus)
}
fn times_symbol() -> Symbol {
    builtin_func_symbol("*", BuiltinFunction::Times)
}
fn builtin_func_symbol(name: &str, b: BuiltinFunction) -> Symbol {
    let int_sort = Sort::new("int", crate::vocabulary::SortTable::Int);
    let mut func = crate::vocabulary::Function::new(name, vec![int_sort.clone(), int_sort.clone()], int_sort);
    func.builtin = Some(b);
    func.partial = false;
    Symbol::Function(Rc::new(func))
}

fn as_int_literal(mgr: &FobddManager, t: TermId) -> Option<i64> {
    match mgr.term(t) {
        FobddTerm::Domain(DomainElement::Int(v), _) => Some(*v),
        _ => None,
    }
}

fn is_builtin_op(symbol: &Symbol, f: BuiltinFunction) -> bool {
    matches!(symbol, Symbol::Function(func) if func.builtin == Some(f))
}

/// One summand of a fully expanded linear form: `coefficient * base`,
/// where `base = None` stands for a bare constant (`coefficient` itself).
type Monomial = (i64, Option<TermId>);

/// Expands `t` into a flat list of monomials, distributing every `×` over
/// every `+` it multiplies (§4.1 "ApplyDistributivity") and descending
/// into nested sums/products so like terms anywhere in the expression end
/// up next to each other once [`rebuild_sum`] combines them. Anything that
/// isn't itself a `+`/`×` FuncTerm or an integer constant is an
/// irreducible base with coefficient 1.
fn linearize(mgr: &mut FobddManager, t: TermId) -> Vec<Monomial> {
    match mgr.term(t).clone() {
        FobddTerm::Domain(DomainElement::Int(v), _) => vec![(v, None)],
        FobddTerm::Func(symbol, args) if args.len() == 2 && is_builtin_op(&symbol, BuiltinFunction::Plus) => {
            let mut out = linearize(mgr, args[0]);
            out.extend(linearize(mgr, args[1]));
            out
        }
        FobddTerm::Func(symbol, args) if args.len() == 2 && is_builtin_op(&symbol, BuiltinFunction::Times) => linearize_product(mgr, args[0], args[1]),
        _ => vec![(1, Some(t))],
    }
}

/// The cross product of `a`'s and `b`'s monomials, each pair's bases
/// multiplied together: this is `ApplyDistributivity` applied repeatedly,
/// since both operands are themselves already-expanded sums.
fn linearize_product(mgr: &mut FobddManager, a: TermId, b: TermId) -> Vec<Monomial> {
    let lhs = linearize(mgr, a);
    let rhs = linearize(mgr, b);
    let mut out = Vec::with_capacity(lhs.len() * rhs.len());
    for (lc, lbase) in &lhs {
        for (rc, rbase) in &rhs {
            out.push((lc * rc, multiply_bases(mgr, *lbase, *rbase)));
        }
    }
    out
}

/// Multiplies two irreducible bases (`None` = the constant `1`). Interns
/// the product directly rather than through [`FobddManager::get_func_term`]
/// to avoid re-entering the rewrite pipeline that is already running.
fn multiply_bases(mgr: &mut FobddManager, a: Option<TermId>, b: Option<TermId>) -> Option<TermId> {
    match (a, b) {
        (None, None) => None,
        (None, Some(x)) | (Some(x), None) => Some(x),
        (Some(x), Some(y)) => Some(make_times_term(mgr, x, y)),
    }
}

fn make_times_term(mgr: &mut FobddManager, a: TermId, b: TermId) -> TermId {
    let (lo, hi) = if a.0 <= b.0 { (a, b) } else { (b, a) };
    mgr.intern_term(FobddTerm::Func(times_symbol(), vec![lo, hi]))
}

fn make_plus_term(mgr: &mut FobddManager, a: TermId, b: TermId) -> TermId {
    let (lo, hi) = if a.0 <= b.0 { (a, b) } else { (b, a) };
    mgr.intern_term(FobddTerm::Func(plus_symbol(), vec![lo, hi]))
}

/// `AddMultSimplifier`/`CombineConstsOfMults`: merges every monomial that
/// shares a base (summing coefficients, dropping the ones that cancel to
/// zero) and folds every constant into one, then rebuilds the sum in
/// sorted, re-bracketed form (§4.1 "sorted associative re-bracketing" —
/// `a+b+c` becomes `((a+b)+c)`). Two expressions that expand to the same
/// multiset of (base, coefficient) pairs always rebuild to the same
/// hash-consed `TermId`, which is what makes `x + (-x)` collapse to `0`
/// and `2x - 2y + (y - x)` collapse to the same term as `x - y`.
fn rebuild_sum(mgr: &mut FobddManager, monomials: Vec<Monomial>, sort_ref: TermId) -> TermId {
    let mut constant: i64 = 0;
    let mut combined: Vec<(TermId, i64)> = Vec::new();
    for (coeff, base) in monomials {
        match base {
            None => constant += coeff,
            Some(b) => match combined.iter_mut().find(|(t, _)| *t == b) {
                Some(entry) => entry.1 += coeff,
                None => combined.push((b, coeff)),
            },
        }
    }
    combined.retain(|(_, c)| *c != 0);
    combined.sort_by_key(|(t, _)| t.0);

    let mut terms: Vec<TermId> = Vec::with_capacity(combined.len() + 1);
    for (base, coeff) in &combined {
        if *coeff == 1 {
            terms.push(*base);
        } else {
            let c = domain_int(mgr, *coeff, *base);
            terms.push(make_times_term(mgr, c, *base));
        }
    }
    if constant != 0 || terms.is_empty() {
        let hint_ref = combined.first().map(|(b, _)| *b).unwrap_or(sort_ref);
        terms.push(domain_int(mgr, constant, hint_ref));
    }
    terms.sort_by_key(|t| t.0);
    let mut iter = terms.into_iter();
    let mut acc = iter.next().expect("terms always has at least one element (the constant fallback)");
    for t in iter {
        acc = make_plus_term(mgr, acc, t);
    }
    acc
}

fn simplify_times(mgr: &mut FobddManager, a: TermId, b: TermId) -> TermId {
    let monomials = linearize_product(mgr, a, b);
    rebuild_sum(mgr, monomials, a)
}

fn simplify_plus(mgr: &mut FobddManager, a: TermId, b: TermId) -> TermId {
    let mut monomials = linearize(mgr, a);
    monomials.extend(linearize(mgr, b));
    rebuild_sum(mgr, monomials, a)
}

/// Built-in sort tables §3 calls out by name ("built-ins for ints/nats/
/// floats/chars/strings") as opposed to a user-declared `Enumeration`/
/// `IntRange`/`Union`/`Constructed` sort; only these can be the target of
/// the item-2 sort-predicate rewrite below.
fn is_builtin_sort_table(table: &crate::vocabulary::SortTable) -> bool {
    use crate::vocabulary::SortTable::*;
    matches!(table, Nat | Int | Float | Char | String)
}

/// `getAtomKernel` arithmetic rewrites (§4.1 items 1-5). Returns `None`
/// when no rewrite applies.
pub fn rewrite_atom_kernel(
    mgr: &mut FobddManager,
    symbol: &Symbol,
    kind: AtomKernelKind,
    args: &[TermId],
) -> Result<Option<KernelId>> {
    // 3. A two-valued function atom `f(x̄)=v` is rewritten to
    // `eq(ft(x̄), v)` where `ft` is a `FuncTerm`: the atom kernel's own
    // symbol is the function itself (arity n+1, last argument the value),
    // the shape a graphed function atom has before it is "ungraphed" back
    // into a direct term comparison.
    if let Symbol::Function(f) = symbol {
        if !f.is_builtin() && args.len() == f.input.len() + 1 {
            let (fargs, value) = args.split_at(f.input.len());
            let ft = mgr.get_func_term(symbol.clone(), fargs.to_vec())?;
            let eq = Symbol::eq_for(&f.output);
            return Ok(Some(mgr.get_atom_kernel(eq, kind, vec![ft, value[0]])?));
        }
    }
    if let Symbol::Predicate(p) = symbol {
        // 2. Unary sort-predicate over a built-in sort with a domain
        // element of that sort → true-kernel. By convention the
        // sort-check predicate for sort `S` is named exactly `S` and has
        // arity 1; an ordinary user predicate that merely happens to
        // range over a built-in sort does not match this and is left
        // alone.
        if p.arity() == 1 && p.name == p.sorts[0].name && is_builtin_sort_table(&p.sorts[0].table) {
            if let FobddTerm::Domain(d, _) = mgr.term(args[0]).clone() {
                if p.sorts[0].table.contains(&d) {
                    return Ok(Some(mgr.true_kernel_id()));
                }
            }
        }
        if let Some(builtin) = p.builtin {
            // 1. Equality with identical args.
            if builtin == BuiltinPredicate::Eq && args.len() == 2 && args[0] == args[1] {
                return Ok(Some(mgr.true_kernel_id()));
            }
            // 4. `L cmp R` with numeric R rewritten to `L + (-R) cmp 0`.
            if args.len() == 2 {
                if let Some(rhs) = as_int_literal(mgr, args[1]) {
                    if rhs != 0 {
                        let neg_rhs = domain_int(mgr, -rhs, args[1]);
                        let lhs = mgr.get_func_term(plus_symbol(), vec![args[0], neg_rhs])?;
                        let zero = domain_int(mgr, 0, args[0]);
                        // 5. Sort arguments by a multiplication-aware term
                        // order; swap the comparator if the operands swap.
                        let (ordered_lhs, ordered_rhs, flipped_symbol) = if lhs.0 <= zero.0 {
                            (lhs, zero, symbol.clone())
                        } else {
                            let mut flipped = (**p).clone();
                            flipped.builtin = Some(builtin.flip());
                            (zero, lhs, Symbol::Predicate(Rc::new(flipped)))
                        };
                        return Ok(Some(mgr.get_atom_kernel(flipped_symbol, kind, vec![ordered_lhs, ordered_rhs])?));
                    }
                }
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vocabulary::{Predicate, Sort, SortTable};

    fn sort() -> Rc<Sort> {
        Sort::new("int", SortTable::Int)
    }

    #[test]
    fn times_by_zero_collapses() {
        let mut mgr = FobddManager::new();
        let x = mgr.get_variable(Variable::new("x", sort()));
        let zero = mgr.get_domain_term(DomainElement::Int(0), sort());
        let result = simplify_times(&mut mgr, x, zero);
        assert_eq!(as_int_literal(&mgr, result), Some(0));
    }

    #[test]
    fn constant_folding_on_plus() {
        let mut mgr = FobddManager::new();
        let a = mgr.get_domain_term(DomainElement::Int(2), sort());
        let b = mgr.get_domain_term(DomainElement::Int(3), sort());
        let result = simplify_plus(&mut mgr, a, b);
        assert_eq!(as_int_literal(&mgr, result), Some(5));
    }

    #[test]
    fn plus_of_negation_collapses_to_zero() {
        // x + (-x) = 0 (§8 arithmetic rewrite property).
        let mut mgr = FobddManager::new();
        let x = mgr.get_variable(Variable::new("x", sort()));
        let neg_x = rewrite_arithmetic(&mut mgr, BuiltinFunction::UnaryMinus, &[x]).unwrap().unwrap();
        let result = simplify_plus(&mut mgr, x, neg_x);
        assert_eq!(as_int_literal(&mgr, result), Some(0));
    }

    #[test]
    fn distributivity_and_like_terms_match_a_direct_difference() {
        // 2*x - 2*y + (y - x) must hash-cons to the same term as x - y
        // (§8 scenario 5).
        let mut mgr = FobddManager::new();
        let x = mgr.get_variable(Variable::new("x", sort()));
        let y = mgr.get_variable(Variable::new("y", sort()));
        let two = mgr.get_domain_term(DomainElement::Int(2), sort());

        let two_x = simplify_times(&mut mgr, two, x);
        let two_y = simplify_times(&mut mgr, two, y);
        let neg_two_y = rewrite_arithmetic(&mut mgr, BuiltinFunction::UnaryMinus, &[two_y]).unwrap().unwrap();
        let y_minus_x = rewrite_arithmetic(&mut mgr, BuiltinFunction::Minus, &[y, x]).unwrap().unwrap();
        let lhs = simplify_plus(&mut mgr, two_x, neg_two_y);
        let lhs = simplify_plus(&mut mgr, lhs, y_minus_x);

        let rhs = rewrite_arithmetic(&mut mgr, BuiltinFunction::Minus, &[x, y]).unwrap().unwrap();

        assert_eq!(lhs, rhs);
    }

    #[test]
    fn distributivity_expands_times_over_plus() {
        // 2 * (x + y) == 2*x + 2*y
        let mut mgr = FobddManager::new();
        let x = mgr.get_variable(Variable::new("x", sort()));
        let y = mgr.get_variable(Variable::new("y", sort()));
        let two = mgr.get_domain_term(DomainElement::Int(2), sort());
        let sum = rewrite_arithmetic(&mut mgr, BuiltinFunction::Plus, &[x, y]).unwrap().unwrap();

        let lhs = simplify_times(&mut mgr, two, sum);

        let two_x = simplify_times(&mut mgr, two, x);
        let two_y = simplify_times(&mut mgr, two, y);
        let rhs = simplify_plus(&mut mgr, two_x, two_y);

        assert_eq!(lhs, rhs);
    }

    #[test]
    fn unary_sort_predicate_over_member_is_true() {
        let s = Sort::new("Nat", SortTable::Nat);
        let p = Predicate::new("Nat", vec![s.clone()]);
        let symbol = Symbol::Predicate(Rc::new(p));
        let mut mgr = FobddManager::new();
        let elem = mgr.get_domain_term(DomainElement::Int(3), s);
        let k = mgr.get_atom_kernel(symbol, AtomKernelKind::TwoVal, vec![elem]).unwrap();
        assert_eq!(k, mgr.true_kernel_id());
    }

    #[test]
    fn two_valued_function_atom_rewrites_to_equality() {
        let s = Sort::new("N", SortTable::IntRange(1, 3));
        let func = crate::vocabulary::Function::new("f", vec![s.clone()], s.clone());
        let symbol = Symbol::Function(Rc::new(func));
        let mut mgr = FobddManager::new();
        let x = mgr.get_variable(Variable::new("x", s.clone()));
        let v = mgr.get_variable(Variable::new("v", s));
        let k = mgr.get_atom_kernel(symbol, AtomKernelKind::TwoVal, vec![x, v]).unwrap();
        match &mgr.kernel(k).kind {
            KernelKind::Atom { symbol, .. } => assert!(symbol.is_builtin()),
            other => panic!("expected an atom kernel, got {other:?}"),
        }
    }

    #[test]
    fn quantify_false_body_is_false() {
        let mut mgr = FobddManager::new();
        let result = mgr.quantify(sort(), BddId::BOT);
        assert_eq!(result, BddId::BOT);
    }

    #[test]
    fn copy_bdd_round_trips_an_atom() {
        let mut src = FobddManager::new();
        let s = Sort::new("N", SortTable::IntRange(1, 2));
        let symbol = Symbol::Predicate(Rc::new(Predicate::new("P", vec![s.clone()])));
        let v = src.get_variable(Variable::new("x", s));
        let k = src.get_atom_kernel(symbol, AtomKernelKind::TwoVal, vec![v]).unwrap();
        let b = src.ifthenelse(k, BddId::TOP, BddId::BOT);
        let mut dst = FobddManager::new();
        let copied = copy_bdd(&mut dst, &src, b).unwrap();
        assert!(!copied.is_truth_value());
    }
}
