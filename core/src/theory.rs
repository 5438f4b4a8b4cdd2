//! The minimal Term/Formula AST this crate consumes (§3, §9, SPEC_FULL
//! §12).
//!
//! The concrete `Theory/Formula/Term` AST is an external collaborator (§1
//! Non-goals); this module defines the smallest tagged-variant AST that
//! satisfies the visitor contract, so the rest of the pipeline (bounds
//! propagation, the grounder factory) has something concrete to traverse.
//! Two traits replace the source's double `TheoryVisitor`/
//! `TheoryMutatingVisitor` RTTI hierarchy (§9 "Cyclic ownership and the AST
//! visitor"): [`FormulaVisitor`] borrows, [`FormulaTransform`] consumes and
//! rebuilds.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::vocabulary::{BuiltinFunction, BuiltinPredicate, DomainElement, Sort, Symbol};

/// A logical variable, identified by name within one formula's scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub sort: Rc<Sort>,
}

impl Variable {
    pub fn new(name: impl Into<String>, sort: Rc<Sort>) -> Self {
        Self { name: name.into(), sort }
    }
}

/// An aggregate function applied to a quantified set (§3 "aggregate-term").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantSetExpr {
    /// Variables bound by the set comprehension.
    pub vars: Vec<Variable>,
    /// The condition selecting tuples of `vars`.
    pub condition: Box<Formula>,
    /// The weight term evaluated for each selected tuple (for `#{x : P(x)}`
    /// this is the constant `1`).
    pub weight: Box<Term>,
}

/// A term (§3 "Term and Formula AST").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Term {
    Variable(Variable),
    Domain(DomainElement, Rc<Sort>),
    Func(Symbol, Vec<Term>),
    Agg(BuiltinFunction, QuantSetExpr),
}

impl Term {
    pub fn sort(&self) -> Option<Rc<Sort>> {
        match self {
            Term::Variable(v) => Some(v.sort.clone()),
            Term::Domain(_, s) => Some(s.clone()),
            Term::Func(Symbol::Function(f), _) => Some(f.output.clone()),
            Term::Func(Symbol::Predicate(_), _) => None,
            Term::Agg(_, _) => None,
        }
    }

    pub fn free_vars(&self, out: &mut Vec<Variable>) {
        match self {
            Term::Variable(v) => {
                if !out.contains(v) {
                    out.push(v.clone());
                }
            }
            Term::Domain(_, _) => {}
            Term::Func(_, args) => args.iter().for_each(|a| a.free_vars(out)),
            Term::Agg(_, set) => {
                let mut inner = Vec::new();
                set.condition.free_vars(&mut inner);
                set.weight.free_vars(&mut inner);
                for v in inner {
                    if !set.vars.contains(&v) && !out.contains(&v) {
                        out.push(v);
                    }
                }
            }
        }
    }
}

/// Sign of a formula or literal (§3: "negation is syntactic").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sign {
    Pos,
    Neg,
}

impl Sign {
    pub fn flip(self) -> Self {
        match self {
            Sign::Pos => Sign::Neg,
            Sign::Neg => Sign::Pos,
        }
    }

    pub fn apply(self, other: Sign) -> Sign {
        if self == Sign::Pos {
            other
        } else {
            other.flip()
        }
    }
}

/// Boolean connective kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolKind {
    Conj,
    Disj,
}

impl BoolKind {
    pub fn flip(self) -> Self {
        match self {
            BoolKind::Conj => BoolKind::Disj,
            BoolKind::Disj => BoolKind::Conj,
        }
    }
}

/// Quantifier kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantifier {
    Forall,
    Exists,
}

impl Quantifier {
    pub fn flip(self) -> Self {
        match self {
            Quantifier::Forall => Quantifier::Exists,
            Quantifier::Exists => Quantifier::Forall,
        }
    }
}

/// A formula (§3 "Term and Formula AST"); every variant carries its own
/// [`Sign`] so negation stays syntactic all the way down, per spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Formula {
    /// A predicate atom `P(t1,...,tn)`.
    Atom { sign: Sign, symbol: Symbol, args: Vec<Term> },
    /// An equivalence-chain of comparison operators: `t0 op0 t1 op1 t2 ...`.
    /// The common two-term case is `ops.len() == 1`.
    Compare { sign: Sign, terms: Vec<Term>, ops: Vec<BuiltinPredicate> },
    /// A Boolean combination with a sign and a connective.
    Bool { sign: Sign, kind: BoolKind, subs: Vec<Formula> },
    /// A quantified formula.
    Quant { sign: Sign, quant: Quantifier, var: Variable, body: Box<Formula> },
    /// An equivalence `lhs ↔ rhs`.
    Equiv { sign: Sign, lhs: Box<Formula>, rhs: Box<Formula> },
    /// An aggregate comparison `term ⟂ agg{set}`.
    AggCompare { sign: Sign, term: Box<Term>, comp: BuiltinPredicate, agg: BuiltinFunction, set: QuantSetExpr },
    /// The constant `true`/`false`, produced by simplification and by
    /// grounder short-circuits; not expected from a hand-authored theory
    /// but valid input everywhere a `Formula` is.
    Bool0 { value: bool },
}

impl Formula {
    pub fn sign(&self) -> Sign {
        match self {
            Formula::Atom { sign, .. }
            | Formula::Compare { sign, .. }
            | Formula::Bool { sign, .. }
            | Formula::Quant { sign, .. }
            | Formula::Equiv { sign, .. }
            | Formula::AggCompare { sign, .. } => *sign,
            Formula::Bool0 { .. } => Sign::Pos,
        }
    }

    pub fn negate(self) -> Formula {
        match self {
            Formula::Atom { sign, symbol, args } => Formula::Atom { sign: sign.flip(), symbol, args },
            Formula::Compare { sign, terms, ops } => Formula::Compare { sign: sign.flip(), terms, ops },
            Formula::Bool { sign, kind, subs } => Formula::Bool { sign: sign.flip(), kind, subs },
            Formula::Quant { sign, quant, var, body } => Formula::Quant { sign: sign.flip(), quant, var, body },
            Formula::Equiv { sign, lhs, rhs } => Formula::Equiv { sign: sign.flip(), lhs, rhs },
            Formula::AggCompare { sign, term, comp, agg, set } => {
                Formula::AggCompare { sign: sign.flip(), term, comp, agg, set }
            }
            Formula::Bool0 { value } => Formula::Bool0 { value: !value },
        }
    }

    pub fn conj(subs: Vec<Formula>) -> Formula {
        Formula::Bool { sign: Sign::Pos, kind: BoolKind::Conj, subs }
    }

    pub fn disj(subs: Vec<Formula>) -> Formula {
        Formula::Bool { sign: Sign::Pos, kind: BoolKind::Disj, subs }
    }

    pub fn free_vars(&self) -> Vec<Variable> {
        let mut out = Vec::new();
        self.free_vars_into(&mut out);
        out
    }

    fn free_vars_into(&self, out: &mut Vec<Variable>) {
        match self {
            Formula::Atom { args, .. } => args.iter().for_each(|a| a.free_vars(out)),
            Formula::Compare { terms, .. } => terms.iter().for_each(|t| t.free_vars(out)),
            Formula::Bool { subs, .. } => subs.iter().for_each(|s| s.free_vars_into(out)),
            Formula::Quant { var, body, .. } => {
                let mut inner = Vec::new();
                body.free_vars_into(&mut inner);
                for v in inner {
                    if &v != var && !out.contains(&v) {
                        out.push(v);
                    }
                }
            }
            Formula::Equiv { lhs, rhs, .. } => {
                lhs.free_vars_into(out);
                rhs.free_vars_into(out);
            }
            Formula::AggCompare { term, set, .. } => {
                term.free_vars(out);
                let mut inner = Vec::new();
                set.condition.free_vars_into(&mut inner);
                set.weight.free_vars(&mut inner);
                for v in inner {
                    if !set.vars.contains(&v) && !out.contains(&v) {
                        out.push(v);
                    }
                }
            }
            Formula::Bool0 { .. } => {}
        }
    }
}

/// A rule `∀x̄: H(ȳ) ← B(x̄)` of an inductive definition (§4.6
/// `RuleGrounder`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub vars: Vec<Variable>,
    pub head_symbol: Symbol,
    pub head_args: Vec<Term>,
    pub body: Formula,
}

/// A well-founded (or, under `STABLESEMANTICS`, stable) inductive
/// definition: a set of rules sharing one identifier, jointly defining the
/// symbols appearing as some rule's head (§4.6, §4.7 `CalculateDefinitions`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub id: usize,
    pub rules: Vec<Rule>,
}

impl Definition {
    /// The symbols this definition defines (the "opens" of §4.7 become
    /// two-valued before the definition is eligible for evaluation).
    pub fn defined_symbols(&self) -> Vec<Symbol> {
        let mut out: Vec<Symbol> = Vec::new();
        for rule in &self.rules {
            if !out.contains(&rule.head_symbol) {
                out.push(rule.head_symbol.clone());
            }
        }
        out
    }

    /// Every symbol occurring in a rule body but not defined by this
    /// definition: the "open" symbols that must be two-valued before
    /// `CalculateDefinitions` may evaluate it in isolation.
    pub fn open_symbols(&self) -> Vec<Symbol> {
        let defined = self.defined_symbols();
        let mut out: Vec<Symbol> = Vec::new();
        for rule in &self.rules {
            collect_symbols(&rule.body, &mut out);
        }
        out.retain(|s| !defined.contains(s));
        out
    }
}

fn collect_symbols(f: &Formula, out: &mut Vec<Symbol>) {
    match f {
        Formula::Atom { symbol, args, .. } => {
            if !symbol.is_builtin() && !out.contains(symbol) {
                out.push(symbol.clone());
            }
            args.iter().for_each(|t| collect_term_symbols(t, out));
        }
        Formula::Compare { terms, .. } => terms.iter().for_each(|t| collect_term_symbols(t, out)),
        Formula::Bool { subs, .. } => subs.iter().for_each(|s| collect_symbols(s, out)),
        Formula::Quant { body, .. } => collect_symbols(body, out),
        Formula::Equiv { lhs, rhs, .. } => {
            collect_symbols(lhs, out);
            collect_symbols(rhs, out);
        }
        Formula::AggCompare { term, set, .. } => {
            collect_term_symbols(term, out);
            collect_symbols(&set.condition, out);
            collect_term_symbols(&set.weight, out);
        }
        Formula::Bool0 { .. } => {}
    }
}

fn collect_term_symbols(t: &Term, out: &mut Vec<Symbol>) {
    match t {
        Term::Variable(_) | Term::Domain(_, _) => {}
        Term::Func(symbol, args) => {
            if !symbol.is_builtin() && !out.contains(symbol) {
                out.push(symbol.clone());
            }
            args.iter().for_each(|a| collect_term_symbols(a, out));
        }
        Term::Agg(_, set) => {
            collect_symbols(&set.condition, out);
            collect_term_symbols(&set.weight, out);
        }
    }
}

/// A theory: a conjunction of closed sentences plus a set of definitions
/// (§3). Model expansion/propagation consume a `Theory` alongside a
/// [`crate::structure::Structure`] over the same vocabulary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Theory {
    pub sentences: Vec<Formula>,
    pub definitions: Vec<Definition>,
}

impl Theory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all_symbols(&self) -> Vec<Symbol> {
        let mut out = Vec::new();
        for s in &self.sentences {
            collect_symbols(s, &mut out);
        }
        for d in &self.definitions {
            for rule in &d.rules {
                if !out.contains(&rule.head_symbol) {
                    out.push(rule.head_symbol.clone());
                }
                collect_symbols(&rule.body, &mut out);
            }
        }
        out
    }

    /// Every subformula of every sentence and rule body, used by the bounds
    /// propagation scheduler (§4.3) to build its fixed subformula set.
    pub fn subformulas(&self) -> Vec<Formula> {
        let mut out = Vec::new();
        for s in &self.sentences {
            collect_subformulas(s, &mut out);
        }
        for d in &self.definitions {
            for rule in &d.rules {
                collect_subformulas(&rule.body, &mut out);
            }
        }
        out
    }
}

fn collect_subformulas(f: &Formula, out: &mut Vec<Formula>) {
    out.push(f.clone());
    match f {
        Formula::Bool { subs, .. } => subs.iter().for_each(|s| collect_subformulas(s, out)),
        Formula::Quant { body, .. } => collect_subformulas(body, out),
        Formula::Equiv { lhs, rhs, .. } => {
            collect_subformulas(lhs, out);
            collect_subformulas(rhs, out);
        }
        Formula::AggCompare { set, .. } => collect_subformulas(&set.condition, out),
        Formula::Atom { .. } | Formula::Compare { .. } | Formula::Bool0 { .. } => {}
    }
}

/// Read-only formula traversal (replaces `TheoryVisitor`, §9/SPEC_FULL §12).
pub trait FormulaVisitor<R> {
    fn visit(&mut self, f: &Formula) -> R;
}

/// Owning formula rewrite (replaces `TheoryMutatingVisitor`).
pub trait FormulaTransform {
    fn transform(&mut self, f: Formula) -> Formula;
}

/// Read-only term traversal.
pub trait TermVisitor<R> {
    fn visit_term(&mut self, t: &Term) -> R;
}

/// Owning term rewrite.
pub trait TermTransform {
    fn transform_term(&mut self, t: Term) -> Term;
}

pub mod normalize;

#[cfg(test)]
mod test {
    use super::*;
    use crate::vocabulary::{Predicate, Sort, SortTable};

    fn bool_sort() -> Rc<Sort> {
        Sort::new("N", SortTable::IntRange(1, 1))
    }

    #[test]
    fn negate_is_involutive() {
        let sort = bool_sort();
        let p = Symbol::Predicate(Rc::new(Predicate::new("P", vec![sort.clone()])));
        let v = Variable::new("x", sort);
        let atom = Formula::Atom { sign: Sign::Pos, symbol: p, args: vec![Term::Variable(v)] };
        assert_eq!(atom.clone().negate().negate(), atom);
    }

    #[test]
    fn free_vars_of_quantifier_excludes_bound_var() {
        let sort = bool_sort();
        let p = Symbol::Predicate(Rc::new(Predicate::new("P", vec![sort.clone(), sort.clone()])));
        let x = Variable::new("x", sort.clone());
        let y = Variable::new("y", sort.clone());
        let atom = Formula::Atom {
            sign: Sign::Pos,
            symbol: p,
            args: vec![Term::Variable(x.clone()), Term::Variable(y.clone())],
        };
        let quant = Formula::Quant { sign: Sign::Pos, quant: Quantifier::Forall, var: x, body: Box::new(atom) };
        assert_eq!(quant.free_vars(), vec![y]);
    }

    #[test]
    fn definition_opens_excludes_head_symbols() {
        let sort = bool_sort();
        let e = Symbol::Predicate(Rc::new(Predicate::new("E", vec![sort.clone(), sort.clone()])));
        let t = Symbol::Predicate(Rc::new(Predicate::new("T", vec![sort.clone(), sort.clone()])));
        let x = Variable::new("x", sort.clone());
        let y = Variable::new("y", sort);
        let body = Formula::Atom {
            sign: Sign::Pos,
            symbol: e.clone(),
            args: vec![Term::Variable(x.clone()), Term::Variable(y.clone())],
        };
        let rule = Rule { vars: vec![x, y], head_symbol: t.clone(), head_args: vec![], body };
        let def = Definition { id: 0, rules: vec![rule] };
        assert_eq!(def.defined_symbols(), vec![t]);
        assert_eq!(def.open_symbols(), vec![e]);
    }
}
