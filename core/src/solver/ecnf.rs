//! The ECNF wire format (§6): the flat, line-oriented theory a
//! [`super::GroundSolver`] consumes. Every grounder in
//! [`crate::grounding`] appends into a [`GroundTheory`]; [`EcnfWriter`]
//! serializes one out in the original `ecnfprinter.hpp` field order
//! (SPEC_FULL §11), which is handy for golden-file tests and for handing a
//! ground theory to an out-of-process solver.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::theory::Sign;
use crate::vocabulary::{BuiltinFunction, BuiltinPredicate};

use super::{CpBound, CpTerm, DefId, Lit, SetId, VarId};

/// One `Rule` line (§6): a defined atom's head literal, the disjuncts (for
/// a disjunctive-normal-form body) or conjuncts depending on `conjunctive`,
/// and which definition it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleLine {
    pub head: Lit,
    pub body: Vec<Lit>,
    pub conjunctive: bool,
    pub definition: DefId,
}

/// One `Agg` line (§6): a reified aggregate comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggLine {
    pub head: Lit,
    pub set: SetId,
    pub agg_type: BuiltinFunction,
    pub comp: BuiltinPredicate,
    pub sign: Sign,
    pub bound: f64,
}

/// One `CP` line (§6): a reified CP comparison between a variable term and
/// a bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpLine {
    pub head: Lit,
    pub term: CpTerm,
    pub comp: BuiltinPredicate,
    pub bound: CpBound,
}

/// An integer CP variable's domain, given either as a contiguous range or
/// an explicit enumeration (§6 `IntVarRange`/`IntVarEnum`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IntVarLine {
    Range { var: VarId, lo: i64, hi: i64 },
    Enum { var: VarId, values: Vec<i64> },
}

/// A lazily-grounded clause stand-in (§6 `LazyImpl`/`LazyLit`/`LazyAtom`):
/// the solver is told a literal exists and under which condition it would
/// be asked to notify the grounder back, without the body being expanded
/// yet (§4.7 "Delay discovery").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LazyLine {
    /// A not-yet-grounded implication; `watched` are the literals whose
    /// assignment should trigger `notify_new_literal` callbacks back into
    /// the lazy grounding manager.
    Impl { head: Lit, watched: Vec<Lit> },
    /// A bare not-yet-grounded literal.
    Lit { lit: Lit },
    /// A not-yet-grounded input atom (watched so the solver can ask for it
    /// to be grounded on demand, §4.7).
    Atom { lit: Lit },
}

/// A minimized weighted-set objective (§6 `MinimizeAgg`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimizeAggLine {
    pub set: SetId,
    pub agg_type: BuiltinFunction,
}

/// A minimized CP variable objective (§6 `OptimizeVar`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeVarLine {
    pub var: VarId,
}

/// A symmetry-breaking line (§6): kept opaque, out of scope for this
/// pipeline (§1 Non-goals), but preserved in the wire format so a theory
/// round-trips through [`EcnfWriter`] even when a future symmetry-detection
/// pass starts populating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymmetryLine {
    pub generator: Vec<(Lit, Lit)>,
}

/// A weighted set line, written out verbatim from the translator's set
/// table (§6 `Set` line).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetLine {
    pub id: SetId,
    pub literals: Vec<(Lit, f64)>,
}

/// The full ECNF theory (§6 table): one `Vec` per line kind, emitted by the
/// grounder tree and consumed by a [`super::GroundSolver`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundTheory {
    pub clauses: Vec<Vec<Lit>>,
    pub sets: Vec<SetLine>,
    pub aggs: Vec<AggLine>,
    pub rules: Vec<RuleLine>,
    pub cps: Vec<CpLine>,
    pub int_vars: Vec<IntVarLine>,
    pub lazy: Vec<LazyLine>,
    pub symmetry: Vec<SymmetryLine>,
    pub minimize_agg: Option<MinimizeAggLine>,
    pub optimize_var: Option<OptimizeVarLine>,
}

impl GroundTheory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_clause(&mut self, clause: Vec<Lit>) {
        self.clauses.push(clause);
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
            && self.sets.is_empty()
            && self.aggs.is_empty()
            && self.rules.is_empty()
            && self.cps.is_empty()
            && self.int_vars.is_empty()
            && self.lazy.is_empty()
    }
}

/// Line-oriented text serializer matching the original `ecnfprinter.hpp`
/// field order (SPEC_FULL §11): one tagged line per entry, space-separated
/// fields, clauses terminated by `0` in the usual DIMACS style.
pub struct EcnfWriter;

impl EcnfWriter {
    pub fn write(theory: &GroundTheory) -> String {
        let mut out = String::new();
        for clause in &theory.clauses {
            for lit in clause {
                let _ = write!(out, "{} ", lit);
            }
            out.push_str("0\n");
        }
        for set in &theory.sets {
            let _ = write!(out, "Set {}", set.id.0);
            for (lit, weight) in &set.literals {
                let _ = write!(out, " {} {}", lit, weight);
            }
            out.push('\n');
        }
        for agg in &theory.aggs {
            let _ = writeln!(out, "Agg {} {} {:?} {:?} {:?} {}", agg.head, agg.set.0, agg.agg_type, agg.comp, agg.sign, agg.bound);
        }
        for rule in &theory.rules {
            let _ = write!(out, "Rule {} {} {}", rule.head, if rule.conjunctive { "C" } else { "D" }, rule.definition);
            for lit in &rule.body {
                let _ = write!(out, " {}", lit);
            }
            out.push('\n');
        }
        for cp in &theory.cps {
            let _ = writeln!(out, "CP {} {:?} {:?} {:?}", cp.head, cp.term, cp.comp, cp.bound);
        }
        for iv in &theory.int_vars {
            match iv {
                IntVarLine::Range { var, lo, hi } => {
                    let _ = writeln!(out, "IntVarRange {} {} {}", var.0, lo, hi);
                }
                IntVarLine::Enum { var, values } => {
                    let _ = write!(out, "IntVarEnum {}", var.0);
                    for v in values {
                        let _ = write!(out, " {}", v);
                    }
                    out.push('\n');
                }
            }
        }
        for lazy in &theory.lazy {
            match lazy {
                LazyLine::Impl { head, watched } => {
                    let _ = write!(out, "LazyImpl {}", head);
                    for w in watched {
                        let _ = write!(out, " {}", w);
                    }
                    out.push('\n');
                }
                LazyLine::Lit { lit } => {
                    let _ = writeln!(out, "LazyLit {}", lit);
                }
                LazyLine::Atom { lit } => {
                    let _ = writeln!(out, "LazyAtom {}", lit);
                }
            }
        }
        for sym in &theory.symmetry {
            let _ = write!(out, "Symmetry");
            for (a, b) in &sym.generator {
                let _ = write!(out, " {}/{}", a, b);
            }
            out.push('\n');
        }
        if let Some(min) = &theory.minimize_agg {
            let _ = writeln!(out, "MinimizeAgg {} {:?}", min.set.0, min.agg_type);
        }
        if let Some(opt) = &theory.optimize_var {
            let _ = writeln!(out, "OptimizeVar {}", opt.var.0);
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn writer_emits_dimacs_style_clauses() {
        let mut theory = GroundTheory::new();
        theory.add_clause(vec![1, -2, 3]);
        let text = EcnfWriter::write(&theory);
        assert_eq!(text, "1 -2 3 0\n");
    }

    #[test]
    fn empty_theory_is_empty() {
        assert!(GroundTheory::new().is_empty());
    }

    #[test]
    fn writer_emits_rule_lines_with_definition_id() {
        let mut theory = GroundTheory::new();
        theory.rules.push(RuleLine { head: 5, body: vec![1, 2], conjunctive: true, definition: 0 });
        let text = EcnfWriter::write(&theory);
        assert_eq!(text, "Rule 5 C 0 1 2\n");
    }
}
