//! `GeneratorFactory::create` (§4.4): picks the right concrete generator
//! for one symbol occurrence given its declared sorts, the occurrence's
//! input/output pattern, and whether the caller wants the symbol's table
//! or its complement (`invert`).

use std::collections::BTreeSet;
use std::rc::Rc;

use crate::structure::{Structure, Tuple};
use crate::theory::Variable;
use crate::vocabulary::{classify_sort, Sort, SortRelation, Symbol};

use super::{DomElemContainer, EmptyGenerator, GenPattern, Generator, OneChildGenerator, SortChecker, TableChecker, TableGenerator, UnionGenerator};

pub struct GeneratorFactory;

impl GeneratorFactory {
    /// §4.4 "Generator factory" algorithm, steps 1-6. `universe` is the
    /// full Cartesian universe of `symbol`'s declared sorts; callers that
    /// already restricted it (e.g. to a leaf connector's known finite
    /// slice) may pass a narrower one.
    pub fn create(symbol: &Symbol, structure: &Structure, invert: bool, pattern: &[GenPattern], vars: &[Variable], containers: Vec<DomElemContainer>, universe: &[Tuple]) -> Box<dyn Generator> {
        let Some(interp) = structure.interpretation(symbol.name()) else {
            return Box::new(EmptyGenerator);
        };
        let pred = interp.predicate_view();

        // Step 1: ct table for the ordinary case, cf table (the
        // complement witnesses) for the inverted case.
        let table: BTreeSet<Tuple> = if invert { pred.cf().clone() } else { pred.ct().clone() };

        // Step 2: classify each variable's sort against the symbol's
        // declared sort at that position.
        let symbol_sorts = symbol.sort_tuple();
        let relations: Vec<SortRelation> = vars.iter().zip(symbol_sorts.iter()).map(|(v, s)| classify_sort(&v.sort, s)).collect();

        // Step 4 (general case): the base generator/checker over the table.
        let all_input = pattern.iter().all(|p| *p == GenPattern::Input);
        let base: Box<dyn Generator> = if all_input {
            Box::new(TableChecker::new(Rc::new(table.clone()), containers.clone()))
        } else {
            Box::new(TableGenerator::new(&table, pattern, containers.clone(), universe))
        };

        // Step 5: for every variable whose sort is a parent of (or
        // unrelated to) the symbol's declared sort, a generated value
        // might fall outside that variable's own sort, guard it with an
        // explicit sort checker composed as a post-filter.
        let mut guarded = base;
        if !invert {
            for ((var, relation), container) in vars.iter().zip(relations.iter()).zip(containers.iter()) {
                if matches!(relation, SortRelation::Parent | SortRelation::Unknown) {
                    let checker = SortChecker::new(var.sort.clone(), container.clone());
                    guarded = Box::new(OneChildGenerator::new(guarded, Box::new(checker)));
                }
            }
            return guarded;
        }

        // Step 6 (inverted case): additionally stream the "out of bounds"
        // tuples (every combination of the output variables' own sorts
        // that does not even belong to the symbol's declared universe),
        // unioned with the main (in-universe) complement generator.
        let mut oob_gens: Vec<Box<dyn Generator>> = Vec::new();
        for (var, container) in vars.iter().zip(containers.iter()) {
            if let Some(g) = super::SortGenerator::new(&var.sort, container.clone()) {
                oob_gens.push(Box::new(g));
            }
        }
        if oob_gens.is_empty() {
            return guarded;
        }
        let oob_checker = TableChecker::new(Rc::new(universe.iter().cloned().collect()), containers);
        let mut oob_stream = oob_gens.into_iter().reduce(|acc, next| Box::new(OneChildGenerator::new(acc, next))).expect("non-empty");
        oob_stream = Box::new(OneChildGenerator::new(oob_stream, Box::new(negate(oob_checker))));
        Box::new(UnionGenerator::new(vec![guarded, oob_stream], Vec::new()))
    }
}

fn negate(checker: TableChecker) -> impl Generator {
    NotChecker { inner: checker, fired: true }
}

#[derive(Debug, Clone)]
struct NotChecker {
    inner: TableChecker,
    fired: bool,
}
impl Generator for NotChecker {
    fn reset(&mut self) {
        self.inner.reset();
        self.fired = false;
    }
    fn next(&mut self) -> bool {
        if self.fired {
            return false;
        }
        self.fired = true;
        !self.inner.check()
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

/// Sort-relation classification entry point re-exported for the grounder
/// tree, which needs it outside generator construction too (§4.5 funccontext
/// checks on partial-function arguments read the same classification).
pub fn classify(var_sort: &Sort, symbol_sort: &Sort) -> SortRelation {
    classify_sort(var_sort, symbol_sort)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vocabulary::{DomainElement, Predicate, SortTable};

    #[test]
    fn factory_builds_table_generator_for_output_pattern() {
        let sort = Sort::new("N", SortTable::IntRange(1, 3));
        let symbol = Symbol::Predicate(Rc::new(Predicate::new("p", vec![sort.clone()])));
        let mut structure = Structure::new();
        structure.declare_symbol(symbol.clone());
        if let Some(crate::structure::Interpretation::Predicate(p)) = structure.interpretation_mut("p") {
            p.make_true(vec![DomainElement::Int(2)]).unwrap();
        }
        let var = Variable::new("x", sort.clone());
        let container = DomElemContainer::new();
        let universe = vec![vec![DomainElement::Int(1)], vec![DomainElement::Int(2)], vec![DomainElement::Int(3)]];
        let mut gen = GeneratorFactory::create(&symbol, &structure, false, &[GenPattern::Output], &[var], vec![container.clone()], &universe);
        gen.reset();
        assert!(gen.next());
        assert_eq!(container.get(), Some(DomainElement::Int(2)));
        assert!(!gen.next());
    }
}
