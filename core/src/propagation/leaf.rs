//! Leaf connectors (§4.3 "Leaf connectors"): for every non-built-in symbol
//! `P` a fresh atom `P(x1, ..., xn)` with distinct connector variables is
//! introduced, and every real occurrence of `P` in the theory is wired to
//! it through the variable mapping and equality side conditions recorded
//! here. This lets the propagator treat every leaf uniformly by its own
//! fresh variables instead of whatever terms the original occurrence used.

use std::rc::Rc;

use crate::theory::Variable;
use crate::vocabulary::{Sort, Symbol};

/// Connector variables and sort-equality bookkeeping for a single symbol.
#[derive(Debug, Clone)]
pub struct LeafConnectData {
    name: String,
    sorts: Vec<Rc<Sort>>,
}

impl LeafConnectData {
    pub fn new(symbol: &Symbol) -> Self {
        Self { name: symbol.name().to_string(), sorts: symbol.sort_tuple() }
    }

    /// Fresh connector variables `P!1, ..., P!arity`, one per real argument
    /// position, named after the symbol so two symbols never collide.
    pub fn connector_vars(&self, arity: usize) -> Vec<Variable> {
        (0..arity)
            .map(|i| {
                let sort = self.sorts.get(i).cloned().unwrap_or_else(|| self.sorts.last().expect("leaf symbol has no sorts").clone());
                Variable::new(format!("{}!{}", self.name, i + 1), sort)
            })
            .collect()
    }

    /// The builtin equality symbol over `sort`, used to assert that an
    /// occurrence's actual argument term coincides with its connector
    /// variable when the occurrence reuses a variable or a smaller sort.
    pub fn equality_symbol(&self, sort: Rc<Sort>) -> Symbol {
        Symbol::eq_for(&sort)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.sorts.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vocabulary::{Predicate, SortTable};

    #[test]
    fn connector_vars_are_distinct_and_sorted() {
        let sort = Sort::new("Nat", SortTable::IntRange(0, 10));
        let symbol = Symbol::Predicate(Rc::new(Predicate::new("p", vec![sort.clone(), sort.clone()])));
        let leaf = LeafConnectData::new(&symbol);
        let vars = leaf.connector_vars(2);
        assert_eq!(vars.len(), 2);
        assert_ne!(vars[0].name, vars[1].name);
        assert_eq!(vars[0].sort, sort);
    }

    #[test]
    fn equality_symbol_is_builtin() {
        let sort = Sort::new("Nat", SortTable::IntRange(0, 10));
        let symbol = Symbol::Predicate(Rc::new(Predicate::new("p", vec![sort.clone()])));
        let leaf = LeafConnectData::new(&symbol);
        assert!(leaf.equality_symbol(sort).is_builtin());
    }
}
