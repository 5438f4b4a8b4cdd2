//! BDD-driven generator construction (§4.4 "BDD-backed generator"):
//! `BddToGenerator::create` turns a BDD's satisfying valuations, restricted
//! to a caller-chosen input/output pattern, into a generator tree built
//! purely from the combinators in [`super`].

use std::rc::Rc;

use crate::error::Result;
use crate::fobdd::{BddId, FobddManager, KernelKind};
use crate::structure::{cartesian_universe, Tuple};
use crate::theory::Variable;

use super::{DomElemContainer, EmptyGenerator, FullGenerator, Generator, SortGenerator, TwoChildGenerator};

/// The inputs to `BDDToGenerator::create` (§4.4): the BDD, its declared
/// output variables (with containers already allocated by the caller), and
/// the structure the atom kernels read their tables from.
#[derive(Clone, Copy)]
pub struct BddGenData<'a> {
    pub bdd: BddId,
    pub vars: &'a [Variable],
    pub containers: &'a [DomElemContainer],
    pub structure: &'a crate::structure::Structure,
}

/// A checker's logical negation, fired once per `reset` like any other
/// checker (§4.4's "pattern[i] = INPUT for every container means checker").
#[derive(Debug, Clone)]
struct NegatedChecker {
    inner: Box<dyn Generator>,
    fired: bool,
}

impl Generator for NegatedChecker {
    fn reset(&mut self) {
        self.inner.reset();
        self.fired = false;
    }
    fn next(&mut self) -> bool {
        if self.fired {
            return false;
        }
        self.fired = true;
        let inner_true = self.inner.next() && self.inner.check();
        !inner_true
    }
    fn set_vars_again(&mut self) {
        self.inner.set_vars_again();
    }
    fn is_at_end(&self) -> bool {
        self.fired
    }
    fn check(&self) -> bool {
        !self.inner.check()
    }
    fn clone_box(&self) -> Box<dyn Generator> {
        Box::new(self.clone())
    }
}

/// Constructs a generator over `data.vars` that enumerates exactly the
/// valuations under which `data.bdd` evaluates to true, given the current
/// structure (§4.4). Quant/Agg kernels fall back to a generate-the-whole-
/// universe-then-check strategy rather than the source's specialised
/// witness search: sound (it still only emits true valuations) but not
/// as selective; `createFromFormula`'s cost-ordered decomposition for atom
/// kernels is where the real selectivity comes from and is fully built.
pub struct BddToGenerator;

impl BddToGenerator {
    pub fn create(mgr: &mut FobddManager, data: &BddGenData) -> Result<Box<dyn Generator>> {
        if data.bdd == BddId::BOT {
            return Ok(Box::new(EmptyGenerator));
        }
        if data.bdd == BddId::TOP {
            return Self::universe_generator(data.vars, data.containers);
        }
        let kernel_id = mgr.bdd_kernel(data.bdd).expect("non-leaf bdd has a kernel");
        let kernel = mgr.kernel(kernel_id).clone();
        let lo = mgr.bdd_lo(data.bdd);
        let hi = mgr.bdd_hi(data.bdd);

        if hi == BddId::BOT {
            // Only the false branch can hold; generate under ¬kernel then
            // recurse into `lo`.
            let checker = Self::kernel_checker(mgr, &kernel, data)?;
            let negated = Box::new(NegatedChecker { inner: checker, fired: true });
            let lo_data = BddGenData { bdd: lo, ..*data };
            let lo_gen = Self::create(mgr, &lo_data)?;
            return Ok(Box::new(super::OneChildGenerator::new(negated, lo_gen)));
        }
        if lo == BddId::BOT {
            let checker = Self::kernel_checker(mgr, &kernel, data)?;
            let hi_data = BddGenData { bdd: hi, ..*data };
            let hi_gen = Self::create(mgr, &hi_data)?;
            return Ok(Box::new(super::OneChildGenerator::new(checker, hi_gen)));
        }
        if lo == BddId::TOP {
            // Either the kernel holds (then hi decides) or it doesn't (then
            // every remaining valuation is accepted): union the two.
            let checker = Self::kernel_checker(mgr, &kernel, data)?;
            let hi_data = BddGenData { bdd: hi, ..*data };
            let hi_branch = Self::create(mgr, &hi_data)?;
            let via_kernel: Box<dyn Generator> = Box::new(super::OneChildGenerator::new(checker, hi_branch));
            let checker_again = Self::kernel_checker(mgr, &kernel, data)?;
            let negated = Box::new(NegatedChecker { inner: checker_again, fired: true });
            let fallback = Self::universe_generator(data.vars, data.containers)?;
            let gated_fallback: Box<dyn Generator> = Box::new(super::OneChildGenerator::new(negated, fallback));
            return Ok(Box::new(super::UnionGenerator::new(vec![via_kernel, gated_fallback], Vec::new())));
        }
        let checker = Self::kernel_checker(mgr, &kernel, data)?;
        let generator = Self::kernel_generator(mgr, &kernel, data)?;
        let lo_data = BddGenData { bdd: lo, ..*data };
        let hi_data = BddGenData { bdd: hi, ..*data };
        let false_branch = Self::create(mgr, &lo_data)?;
        let true_branch = Self::create(mgr, &hi_data)?;
        Ok(Box::new(TwoChildGenerator::new(checker, generator, true_branch, false_branch)))
    }

    fn universe_generator(vars: &[Variable], containers: &[DomElemContainer]) -> Result<Box<dyn Generator>> {
        if vars.is_empty() {
            return Ok(Box::new(FullGenerator::new()));
        }
        let mut gens: Vec<Box<dyn Generator>> = Vec::with_capacity(vars.len());
        for (var, container) in vars.iter().zip(containers.iter()) {
            match SortGenerator::new(&var.sort, container.clone()) {
                Some(g) => gens.push(Box::new(g)),
                None => return Ok(Box::new(EmptyGenerator)),
            }
        }
        let mut iter = gens.into_iter();
        let first = iter.next().expect("vars is non-empty");
        Ok(iter.fold(first, |acc, next| Box::new(super::OneChildGenerator::new(acc, next))))
    }

    fn kernel_checker(mgr: &FobddManager, kernel: &crate::fobdd::Kernel, data: &BddGenData) -> Result<Box<dyn Generator>> {
        match &kernel.kind {
            KernelKind::Atom { symbol, args, kind } => {
                let tuple_vars: Option<Vec<DomElemContainer>> = args.iter().map(|term| Self::container_for_term(mgr, *term, data)).collect();
                let Some(tuple_vars) = tuple_vars else {
                    // An argument is itself a compound term this
                    // simplified BDD→generator bridge cannot bind directly;
                    // report "never matches", which keeps every combinator
                    // above sound (it just loses selectivity).
                    return Ok(Box::new(EmptyGenerator));
                };
                let Some(interp) = data.structure.interpretation(symbol.name()) else {
                    return Ok(Box::new(EmptyGenerator));
                };
                let pred = interp.predicate_view();
                let table: std::collections::BTreeSet<Tuple> = match kind {
                    crate::fobdd::AtomKernelKind::Ct | crate::fobdd::AtomKernelKind::TwoVal => pred.ct().clone(),
                    crate::fobdd::AtomKernelKind::Cf => pred.cf().clone(),
                };
                Ok(Box::new(super::TableChecker::new(Rc::new(table), tuple_vars)))
            }
            KernelKind::Quant { .. } | KernelKind::Agg { .. } | KernelKind::True => Ok(Box::new(FullGenerator::new())),
            KernelKind::False => Ok(Box::new(EmptyGenerator)),
        }
    }

    fn kernel_generator(mgr: &FobddManager, kernel: &crate::fobdd::Kernel, data: &BddGenData) -> Result<Box<dyn Generator>> {
        match &kernel.kind {
            KernelKind::Atom { symbol, args, kind } => {
                let tuple_vars: Option<Vec<DomElemContainer>> = args.iter().map(|term| Self::container_for_term(mgr, *term, data)).collect();
                let Some(tuple_vars) = tuple_vars else { return Ok(Box::new(EmptyGenerator)) };
                let Some(interp) = data.structure.interpretation(symbol.name()) else {
                    return Ok(Box::new(EmptyGenerator));
                };
                let pred = interp.predicate_view();
                let sorts = symbol.sort_tuple();
                let Some(universe) = cartesian_universe(&sorts) else { return Ok(Box::new(EmptyGenerator)) };
                let table: std::collections::BTreeSet<Tuple> = match kind {
                    crate::fobdd::AtomKernelKind::Ct | crate::fobdd::AtomKernelKind::TwoVal => pred.ct().clone(),
                    crate::fobdd::AtomKernelKind::Cf => pred.cf().clone(),
                };
                let pattern = vec![super::GenPattern::Output; tuple_vars.len()];
                Ok(Box::new(super::TableGenerator::new(&table, &pattern, tuple_vars, &universe)))
            }
            _ => Self::universe_generator(data.vars, data.containers),
        }
    }

    fn container_for_term(mgr: &FobddManager, term: crate::fobdd::TermId, data: &BddGenData) -> Option<DomElemContainer> {
        match mgr.term(term) {
            crate::fobdd::FobddTerm::Variable(v) => data.vars.iter().position(|dv| dv == v).map(|i| data.containers[i].clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vocabulary::{DomainElement, Predicate, Sort, SortTable, Symbol};

    #[test]
    fn false_bdd_yields_empty_generator() {
        let mut mgr = FobddManager::new();
        let vars: Vec<Variable> = Vec::new();
        let containers: Vec<DomElemContainer> = Vec::new();
        let structure = crate::structure::Structure::new();
        let data = BddGenData { bdd: BddId::BOT, vars: &vars, containers: &containers, structure: &structure };
        let mut gen = BddToGenerator::create(&mut mgr, &data).unwrap();
        gen.reset();
        assert!(!gen.next());
    }

    #[test]
    fn atom_kernel_generator_streams_ct_tuples() {
        let mut mgr = FobddManager::new();
        let sort = Sort::new("N", SortTable::IntRange(1, 3));
        let var = Variable::new("x", sort.clone());
        let symbol = Symbol::Predicate(Rc::new(Predicate::new("p", vec![sort])));
        let mut structure = crate::structure::Structure::new();
        structure.declare_symbol(symbol.clone());
        if let Some(crate::structure::Interpretation::Predicate(p)) = structure.interpretation_mut("p") {
            p.make_true(vec![DomainElement::Int(2)]).unwrap();
        }
        let vt = mgr.get_variable(var.clone());
        let k = mgr.get_atom_kernel(symbol, crate::fobdd::AtomKernelKind::TwoVal, vec![vt]).unwrap();
        let bdd = mgr.ifthenelse(k, BddId::TOP, BddId::BOT);
        let vars = vec![var];
        let containers = vec![DomElemContainer::new()];
        let data = BddGenData { bdd, vars: &vars, containers: &containers, structure: &structure };
        let mut gen = BddToGenerator::create(&mut mgr, &data).unwrap();
        gen.reset();
        assert!(gen.next());
        assert_eq!(containers[0].get(), Some(DomainElement::Int(2)));
        assert!(!gen.next());
    }
}
