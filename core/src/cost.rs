//! BDD statistics and cost estimation (§4.2, L2).
//!
//! Given a structure, estimates chance/answer-count/enumeration-cost for
//! any kernel or BDD; drives kernel reordering (`optimize_query`) and the
//! generator factory's choice of input/output pattern (§4.4). Memoised per
//! `(object, vars, indices)` the way the source memoises
//! `BddStatistics::estimate*`, keyed here by a small hashable pattern
//! struct rather than the pointer identity the source uses, since this
//! crate's handles are plain integers already.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::Result;
use crate::fobdd::order::KernelCategory;
use crate::fobdd::{AtomKernelKind, BddId, FobddManager, FobddTerm, KernelId, KernelKind, TermId};
use crate::structure::Structure;
use crate::vocabulary::{Sort, Symbol};

/// A huge-but-finite stand-in for "cost/answers of an unknown or infinite
/// category", matching the source's `max<double>` sentinel without ever
/// actually producing `f64::INFINITY` (so costs remain totally ordered and
/// summable without becoming NaN).
pub const UNKNOWN_COST: f64 = 1.0e18;

/// Per-variable input/output classification a cost query is parameterised
/// over (§4.2 "pattern of input/output vars").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Input,
    Output,
}

/// A cache key: the queried object plus the free-variable/De-Bruijn-index
/// pattern it was asked under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    object: ObjectKey,
    pattern: Vec<(String, bool)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ObjectKey {
    Bdd(BddId),
    Kernel(KernelId),
}

/// Memoised cost/chance/answer estimates over one structure. One
/// `CostEstimator` per inference call (mirrors the source's per-inference
/// `BddStatistics` instance, which is thrown away once grounding starts).
#[derive(Debug, Default)]
pub struct CostEstimator {
    chance_cache: HashMap<ObjectKey, f64>,
    answers_cache: HashMap<CacheKey, f64>,
    cost_cache: HashMap<CacheKey, f64>,
}

impl CostEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `estimateChance(b)` (§4.2).
    pub fn estimate_chance(&mut self, mgr: &FobddManager, structure: &Structure, b: BddId) -> f64 {
        if b == BddId::TOP {
            return 1.0;
        }
        if b == BddId::BOT {
            return 0.0;
        }
        if let Some(c) = self.chance_cache.get(&ObjectKey::Bdd(b)) {
            return *c;
        }
        let k = mgr.bdd_kernel(b).expect("non-leaf has a kernel");
        let kc = self.kernel_chance(mgr, structure, k);
        let tc = self.estimate_chance(mgr, structure, mgr.bdd_hi(b));
        let fc = self.estimate_chance(mgr, structure, mgr.bdd_lo(b));
        let result = kc * tc + (1.0 - kc) * fc;
        self.chance_cache.insert(ObjectKey::Bdd(b), result);
        result
    }

    fn kernel_chance(&mut self, mgr: &FobddManager, structure: &Structure, k: KernelId) -> f64 {
        if let Some(c) = self.chance_cache.get(&ObjectKey::Kernel(k)) {
            return *c;
        }
        let result = match mgr.kernel(k).kind.clone() {
            KernelKind::True => 1.0,
            KernelKind::False => 0.0,
            KernelKind::Atom { symbol, kind, args } => self.atom_chance(structure, &symbol, kind, args.len()),
            KernelKind::Quant { sort, body } => {
                let p = self.estimate_chance(mgr, structure, body);
                match sort.table.size() {
                    Some(n) => (p * n as f64).min(0.99),
                    None => {
                        if p > 0.0 {
                            1.0
                        } else {
                            0.0
                        }
                    }
                }
            }
            KernelKind::Agg { .. } => 0.5,
        };
        self.chance_cache.insert(ObjectKey::Kernel(k), result);
        result
    }

    /// Chance of an atom kernel: looks up the relevant table's relative
    /// size, with the comparison special-case of §4.2 ("rewrite so the
    /// variable occurs alone on one side").
    fn atom_chance(&mut self, structure: &Structure, symbol: &Symbol, kind: AtomKernelKind, arity: usize) -> f64 {
        if let Symbol::Predicate(p) = symbol {
            if let Some(builtin) = p.builtin {
                let biggest = p
                    .sorts
                    .iter()
                    .filter_map(|s| s.table.size())
                    .max()
                    .unwrap_or(1)
                    .max(1) as f64;
                return match builtin {
                    crate::vocabulary::BuiltinPredicate::Eq => 1.0 / biggest,
                    crate::vocabulary::BuiltinPredicate::Neq => 1.0 - 1.0 / biggest,
                    crate::vocabulary::BuiltinPredicate::Lt
                    | crate::vocabulary::BuiltinPredicate::Gt
                    | crate::vocabulary::BuiltinPredicate::Leq
                    | crate::vocabulary::BuiltinPredicate::Geq => (1.0 / biggest).sqrt(),
                };
            }
        }
        let Some(interp) = structure.interpretation(symbol.name()) else {
            return 0.5;
        };
        let pred = interp.predicate_view();
        let sorts = symbol.sort_tuple();
        let Some(universe) = crate::structure::cartesian_universe(&sorts) else {
            return 0.5;
        };
        if universe.is_empty() {
            return 0.0;
        }
        let relevant = match kind {
            AtomKernelKind::Ct | AtomKernelKind::TwoVal => pred.ct().len(),
            AtomKernelKind::Cf => pred.cf().len(),
        };
        let _ = arity;
        (relevant as f64 / universe.len() as f64).clamp(0.0, 1.0)
    }

    /// `estimateNrAnswers(b, inputVars, indices)` (§4.2): expected number of
    /// tuples of the output variables satisfying `b`.
    pub fn estimate_nr_answers(
        &mut self,
        mgr: &FobddManager,
        structure: &Structure,
        b: BddId,
        output_sorts: &[Rc<Sort>],
    ) -> f64 {
        let chance = self.estimate_chance(mgr, structure, b);
        match output_sorts.iter().try_fold(1.0f64, |acc, s| s.table.size().map(|n| acc * n as f64)) {
            Some(universe_size) => chance * universe_size,
            None => UNKNOWN_COST,
        }
    }

    /// `estimateCostAll(b, vars, indices)` (§4.2): the four closed-form
    /// reachability patterns named explicitly in SPEC_FULL §11 rather than
    /// one generic recursive formula.
    pub fn estimate_cost_all(
        &mut self,
        mgr: &FobddManager,
        structure: &Structure,
        b: BddId,
        input_sorts: &[Rc<Sort>],
        output_sorts: &[Rc<Sort>],
    ) -> f64 {
        if b.is_truth_value() {
            return input_sorts.iter().chain(output_sorts.iter()).filter_map(|s| s.table.size()).map(|n| n as f64).product();
        }
        let k = mgr.bdd_kernel(b).expect("non-leaf has a kernel");
        let kernel_cost = self.kernel_cost(mgr, structure, k, input_sorts, output_sorts);
        let lo = mgr.bdd_lo(b);
        let hi = mgr.bdd_hi(b);
        let lo_cost = self.estimate_cost_all(mgr, structure, lo, input_sorts, output_sorts);
        let hi_cost = self.estimate_cost_all(mgr, structure, hi, input_sorts, output_sorts);
        // Four reachability patterns (§4.2 "Cost of BDD"):
        match (lo == BddId::BOT, hi == BddId::BOT) {
            // both branches reachable: kernel generation feeds both.
            (false, false) => kernel_cost + lo_cost + hi_cost,
            // only the false branch is reachable.
            (false, true) => kernel_cost + lo_cost,
            // only the true branch is reachable.
            (true, false) => kernel_cost + hi_cost,
            // neither reachable (both false): degenerate, whole BDD is
            // unsatisfiable; cost is just evaluating the kernel once.
            (true, true) => kernel_cost,
        }
    }

    fn kernel_cost(
        &mut self,
        mgr: &FobddManager,
        structure: &Structure,
        k: KernelId,
        input_sorts: &[Rc<Sort>],
        output_sorts: &[Rc<Sort>],
    ) -> f64 {
        match mgr.kernel(k).kind.clone() {
            KernelKind::True | KernelKind::False => 1.0,
            KernelKind::Atom { args, .. } => {
                // `EstimateEnumerationCost`: proportional to the input
                // pattern's universe, or `UNKNOWN_COST` if the table
                // lookup is opaque to this estimator (no closed form is
                // known for non-finite input sorts).
                let _ = args;
                input_sorts.iter().try_fold(1.0f64, |acc, s| s.table.size().map(|n| acc * n as f64)).unwrap_or(UNKNOWN_COST)
            }
            KernelKind::Quant { sort, body } => {
                let body_cost = self.estimate_cost_all(mgr, structure, body, input_sorts, output_sorts);
                match sort.table.size() {
                    Some(n) => n as f64 * body_cost,
                    None => UNKNOWN_COST,
                }
            }
            KernelKind::Agg { .. } => UNKNOWN_COST,
        }
    }
}

/// `optimizeQuery(bdd, outputVars, indices, structure)` (§4.1): walks every
/// kernel, moves it to the top, then descends one position at a time
/// re-measuring `estimate_cost_all`, leaving it at the minimum-cost
/// position. Performed in a scratch manager so the caller's BDD identity
/// is unaffected unless it chooses to adopt the result.
pub fn optimize_query(
    mgr: &mut FobddManager,
    structure: &Structure,
    b: BddId,
    input_sorts: &[Rc<Sort>],
    output_sorts: &[Rc<Sort>],
) -> Result<BddId> {
    let mut kernels = Vec::new();
    collect_kernels(mgr, b, &mut kernels);
    let mut estimator = CostEstimator::new();
    let mut best = b;
    let mut best_cost = estimator.estimate_cost_all(mgr, structure, b, input_sorts, output_sorts);
    for k in kernels {
        mgr.move_up(k)?;
        let mut current_best_here = best;
        let mut current_best_cost_here = estimator.estimate_cost_all(mgr, structure, b, input_sorts, output_sorts);
        loop {
            mgr.move_down(k)?;
            let cost = estimator.estimate_cost_all(mgr, structure, b, input_sorts, output_sorts);
            if cost < current_best_cost_here {
                current_best_cost_here = cost;
                current_best_here = b;
            } else {
                break;
            }
        }
        if current_best_cost_here < best_cost {
            best_cost = current_best_cost_here;
            best = current_best_here;
        }
    }
    Ok(best)
}

fn collect_kernels(mgr: &FobddManager, b: BddId, out: &mut Vec<KernelId>) {
    if b.is_truth_value() {
        return;
    }
    if let Some(k) = mgr.bdd_kernel(b) {
        if !out.contains(&k) && mgr.kernel(k).order.category != KernelCategory::TrueFalse {
            out.push(k);
        }
    }
    collect_kernels(mgr, mgr.bdd_lo(b), out);
    collect_kernels(mgr, mgr.bdd_hi(b), out);
}

/// A FuncTerm that contains a non-built-in function, used by generator
/// selection (§4.4) to decide whether closed-form arithmetic generation is
/// even possible for a kernel's arguments.
pub fn term_contains_partial_function(mgr: &FobddManager, t: TermId) -> bool {
    match mgr.term(t) {
        FobddTerm::Func(Symbol::Function(f), args) => f.partial || args.iter().any(|a| term_contains_partial_function(mgr, *a)),
        FobddTerm::Func(Symbol::Predicate(_), args) => args.iter().any(|a| term_contains_partial_function(mgr, *a)),
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fobdd::AtomKernelKind;
    use crate::theory::Variable;
    use crate::vocabulary::{Predicate, SortTable};

    #[test]
    fn chance_of_true_and_false_bdd() {
        let mgr = FobddManager::new();
        let structure = Structure::new();
        let mut est = CostEstimator::new();
        assert_eq!(est.estimate_chance(&mgr, &structure, BddId::TOP), 1.0);
        assert_eq!(est.estimate_chance(&mgr, &structure, BddId::BOT), 0.0);
    }

    #[test]
    fn chance_of_equality_is_inverse_sort_size() {
        let mut mgr = FobddManager::new();
        let sort = Sort::new("N", SortTable::IntRange(1, 4));
        let mut p = Predicate::new("=", vec![sort.clone(), sort.clone()]);
        p.builtin = Some(crate::vocabulary::BuiltinPredicate::Eq);
        let symbol = Symbol::Predicate(Rc::new(p));
        let x = mgr.get_variable(Variable::new("x", sort.clone()));
        let y = mgr.get_variable(Variable::new("y", sort));
        let k = mgr.get_atom_kernel(symbol, AtomKernelKind::TwoVal, vec![x, y]).unwrap();
        let b = mgr.ifthenelse(k, BddId::TOP, BddId::BOT);
        let structure = Structure::new();
        let mut est = CostEstimator::new();
        assert_eq!(est.estimate_chance(&mgr, &structure, b), 0.25);
    }

    #[test]
    fn quant_kernel_chance_capped_below_one() {
        let mut mgr = FobddManager::new();
        let sort = Sort::new("N", SortTable::IntRange(1, 100));
        let mut p = Predicate::new("P", vec![sort.clone()]);
        p.builtin = None;
        let symbol = Symbol::Predicate(Rc::new(p));
        let structure = {
            let mut s = Structure::new();
            s.declare_sort(sort.clone());
            s.declare_symbol(Symbol::Predicate(Rc::new(Predicate::new("P", vec![sort.clone()]))));
            s
        };
        let x = mgr.get_de_bruijn_index(sort.clone(), 0);
        let k = mgr.get_atom_kernel(symbol, AtomKernelKind::TwoVal, vec![x]).unwrap();
        let body = mgr.ifthenelse(k, BddId::TOP, BddId::BOT);
        let qk = mgr.get_quant_kernel(sort, body);
        let mut est = CostEstimator::new();
        let chance = est.kernel_chance(&mgr, &structure, qk);
        assert!(chance <= 0.99);
    }
}
