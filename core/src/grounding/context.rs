//! Grounding context (§4.5/§4.6): the small bundle of state threaded down
//! through the grounder tree as it descends into a formula, plus
//! [`ConjOrDisj`], the intermediate result every formula-level grounder
//! hands back to its parent, reified into a defining Tseitin clause only
//! once a parent of a different connective shape actually needs one literal
//! (see [`to_literal`]).

use crate::solver::ecnf::GroundTheory;
use crate::solver::{GroundTranslator, Lit, TsBody, TsType, FALSE_LIT, TRUE_LIT};
use crate::theory::{BoolKind, Sign};

/// Which polarity a function's arguments are being grounded under (§4.5
/// "function context"): determines whether a partial function's undefined
/// case needs to be reasoned about as certainly-true, certainly-false, or
/// both, mirroring the source's `POS`/`NEG`/`BOTH` context lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncContext {
    Positive,
    Negative,
    Both,
}

impl FuncContext {
    pub fn flip(self) -> Self {
        match self {
            FuncContext::Positive => FuncContext::Negative,
            FuncContext::Negative => FuncContext::Positive,
            FuncContext::Both => FuncContext::Both,
        }
    }
}

/// The state threaded down the grounder tree (§4.5 "Grounding context").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroundingContext {
    pub func_context: FuncContext,
    /// Whether the path from the theory root to here crosses an even
    /// number of negations (monotone) or an odd one.
    pub monotone: bool,
    pub tseitin: TsType,
    /// Whether every Boolean ancestor on the path here is a conjunction
    /// (used by `TheoryGrounder`/`RuleGrounder` to decide whether a
    /// subformula may be split directly into unit clauses, §4.6).
    pub conjunctive_path: bool,
    /// The enclosing definition, if grounding is currently inside one rule
    /// body of an inductive definition (§4.7).
    pub definition: Option<usize>,
}

impl GroundingContext {
    pub fn root() -> Self {
        Self { func_context: FuncContext::Positive, monotone: true, tseitin: TsType::Eq, conjunctive_path: true, definition: None }
    }

    /// Descend across one [`Sign`]: negation flips monotonicity, the
    /// function context, and (per §6 "Tseitin semantics") the Tseitin type.
    pub fn descend_sign(self, sign: Sign) -> Self {
        if sign == Sign::Neg {
            Self { monotone: !self.monotone, func_context: self.func_context.flip(), tseitin: self.tseitin.negate(), ..self }
        } else {
            self
        }
    }

    /// Descend into one child of a Boolean connective (§4.6 "conjunctive
    /// path"): stays conjunctive only while every connective on the path,
    /// under the current sign, behaves as a conjunction.
    pub fn descend_bool(self, kind: BoolKind) -> Self {
        let effective = if self.monotone { kind } else { kind.flip() };
        Self { conjunctive_path: self.conjunctive_path && effective == BoolKind::Conj, ..self }
    }

    pub fn enter_definition(self, id: usize) -> Self {
        Self { definition: Some(id), conjunctive_path: true, ..self }
    }
}

/// The "a conjunction or a disjunction of literals, or a known constant"
/// result every grounder hands back to its caller (§4.6 `ConjOrDisj`),
/// deferring the decision of whether/how to reify it into its own Tseitin
/// literal to whichever parent actually needs one.
#[derive(Debug, Clone, PartialEq)]
pub enum ConjOrDisj {
    True,
    False,
    Literals(BoolKind, Vec<Lit>),
}

impl ConjOrDisj {
    pub fn literal(lit: Lit) -> Self {
        ConjOrDisj::Literals(BoolKind::Disj, vec![lit])
    }

    /// De Morgan negation (§6): `Conj`/`Disj` swap and every literal flips
    /// sign; the constants swap directly.
    pub fn negate(self) -> Self {
        match self {
            ConjOrDisj::True => ConjOrDisj::False,
            ConjOrDisj::False => ConjOrDisj::True,
            ConjOrDisj::Literals(kind, lits) => ConjOrDisj::Literals(kind.flip(), lits.into_iter().map(|l| -l).collect()),
        }
    }

    pub fn apply_sign(self, sign: Sign) -> Self {
        if sign == Sign::Neg {
            self.negate()
        } else {
            self
        }
    }
}

/// Combines `children` under `kind`, short-circuiting on the absorbing
/// constant and flattening same-kind children directly (§4.6
/// `BoolGrounder`). Children of a different shape are reified into a
/// single literal first via [`to_literal`].
pub fn conjoin(children: Vec<ConjOrDisj>, kind: BoolKind, translator: &mut GroundTranslator, theory: &mut GroundTheory) -> ConjOrDisj {
    let mut lits = Vec::with_capacity(children.len());
    for child in children {
        match child {
            ConjOrDisj::True => {
                if kind == BoolKind::Disj {
                    return ConjOrDisj::True;
                }
            }
            ConjOrDisj::False => {
                if kind == BoolKind::Conj {
                    return ConjOrDisj::False;
                }
            }
            ConjOrDisj::Literals(k, ls) if k == kind => lits.extend(ls),
            other => lits.push(to_literal(other, translator, theory)),
        }
    }
    if lits.is_empty() {
        return match kind {
            BoolKind::Conj => ConjOrDisj::True,
            BoolKind::Disj => ConjOrDisj::False,
        };
    }
    ConjOrDisj::Literals(kind, lits)
}

/// Reifies `c` into a single literal (§6 "Tseitin semantics"), allocating a
/// fresh Tseitin atom only when `c` actually carries more than one literal
/// and writing the clauses that define it (`t <-> OR(lits)` for a
/// disjunction, `t <-> AND(lits)` for a conjunction) so the literal actually
/// constrains the ground theory instead of floating free. `True`/`False`
/// map onto the two sentinel literals so a caller that genuinely needs a
/// `Lit` handle (e.g. a rule body, or a set member) never has to
/// special-case the constant case itself.
pub fn to_literal(c: ConjOrDisj, translator: &mut GroundTranslator, theory: &mut GroundTheory) -> Lit {
    match c {
        ConjOrDisj::True => TRUE_LIT,
        ConjOrDisj::False => FALSE_LIT,
        ConjOrDisj::Literals(_, lits) if lits.len() == 1 => lits[0],
        ConjOrDisj::Literals(kind, lits) => {
            let t = translator.new_tseitin(TsBody::Bool { kind, lits: lits.clone() });
            match kind {
                BoolKind::Disj => {
                    for l in &lits {
                        theory.add_clause(vec![-l, t]);
                    }
                    let mut whole = vec![-t];
                    whole.extend(lits);
                    theory.add_clause(whole);
                }
                BoolKind::Conj => {
                    for l in &lits {
                        theory.add_clause(vec![-t, *l]);
                    }
                    let mut whole: Vec<Lit> = lits.iter().map(|l| -l).collect();
                    whole.push(t);
                    theory.add_clause(whole);
                }
            }
            t
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn conjoin_short_circuits_on_false_in_conjunction() {
        let mut t = GroundTranslator::new();
        let mut theory = GroundTheory::new();
        let result = conjoin(vec![ConjOrDisj::literal(1), ConjOrDisj::False, ConjOrDisj::literal(2)], BoolKind::Conj, &mut t, &mut theory);
        assert_eq!(result, ConjOrDisj::False);
    }

    #[test]
    fn conjoin_flattens_same_kind_children() {
        let mut t = GroundTranslator::new();
        let mut theory = GroundTheory::new();
        let result = conjoin(vec![ConjOrDisj::literal(1), ConjOrDisj::Literals(BoolKind::Conj, vec![2, 3])], BoolKind::Conj, &mut t, &mut theory);
        assert_eq!(result, ConjOrDisj::Literals(BoolKind::Conj, vec![1, 2, 3]));
    }

    #[test]
    fn conjoin_of_empty_conjunction_is_true() {
        let mut t = GroundTranslator::new();
        let mut theory = GroundTheory::new();
        assert_eq!(conjoin(vec![], BoolKind::Conj, &mut t, &mut theory), ConjOrDisj::True);
    }

    #[test]
    fn to_literal_of_a_disjunction_defines_the_tseitin() {
        let mut t = GroundTranslator::new();
        let mut theory = GroundTheory::new();
        let lit = to_literal(ConjOrDisj::Literals(BoolKind::Disj, vec![1, 2]), &mut t, &mut theory);
        assert!(theory.clauses.contains(&vec![-1, lit]));
        assert!(theory.clauses.contains(&vec![-2, lit]));
        assert!(theory.clauses.contains(&vec![-lit, 1, 2]));
    }

    #[test]
    fn to_literal_of_a_conjunction_defines_the_tseitin() {
        let mut t = GroundTranslator::new();
        let mut theory = GroundTheory::new();
        let lit = to_literal(ConjOrDisj::Literals(BoolKind::Conj, vec![1, 2]), &mut t, &mut theory);
        assert!(theory.clauses.contains(&vec![-lit, 1]));
        assert!(theory.clauses.contains(&vec![-lit, 2]));
        assert!(theory.clauses.contains(&vec![-1, -2, lit]));
    }

    #[test]
    fn negate_swaps_kind_and_literal_signs() {
        let c = ConjOrDisj::Literals(BoolKind::Disj, vec![1, -2]);
        assert_eq!(c.negate(), ConjOrDisj::Literals(BoolKind::Conj, vec![-1, 2]));
    }

    #[test]
    fn descend_sign_flips_monotone_and_tseitin() {
        let root = GroundingContext::root();
        let flipped = root.descend_sign(Sign::Neg);
        assert!(!flipped.monotone);
        assert_eq!(flipped.tseitin, TsType::Rimpl);
    }
}
