//! Arithmetic generators (§4.4): closed-form instance generators/checkers
//! for the built-in arithmetic functions. Each one is selected by the
//! factory from the input/output pattern of the call it is grounding;
//! every generator here refuses to iterate an unbounded domain, producing
//! at most the single closed-form witness the pattern pins down.

use super::{DomElemContainer, Generator};
use crate::vocabulary::DomainElement;

fn as_int(elem: &DomainElement) -> Option<i64> {
    match elem {
        DomainElement::Int(i) => Some(*i),
        DomainElement::Float(f) if f.0.fract() == 0.0 => Some(f.0 as i64),
        _ => None,
    }
}

/// Checks `a + b = c` given all three bound (§4.4 `PlusChecker`).
#[derive(Debug, Clone)]
pub struct PlusChecker {
    a: DomElemContainer,
    b: DomElemContainer,
    c: DomElemContainer,
    fired: bool,
}

impl PlusChecker {
    pub fn new(a: DomElemContainer, b: DomElemContainer, c: DomElemContainer) -> Self {
        Self { a, b, c, fired: true }
    }
}
impl Generator for PlusChecker {
    fn reset(&mut self) {
        self.fired = false;
    }
    fn next(&mut self) -> bool {
        if self.fired {
            return false;
        }
        self.fired = true;
        self.check()
    }
    fn set_vars_again(&mut self) {}
    fn is_at_end(&self) -> bool {
        self.fired
    }
    fn check(&self) -> bool {
        match (self.a.get().and_then(|v| as_int(&v)), self.b.get().and_then(|v| as_int(&v)), self.c.get().and_then(|v| as_int(&v))) {
            (Some(a), Some(b), Some(c)) => a + b == c,
            _ => false,
        }
    }
    fn clone_box(&self) -> Box<dyn Generator> {
        Box::new(self.clone())
    }
}

/// One free variable among `{a, b, c}` of `a - b = c`: the factory binds
/// the remaining two, this generator produces the single closed-form value
/// for the third (§4.4 `MinusGenerator`, also doubling as the "Plus" solve
/// when the missing slot is `a` or `b`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    A,
    B,
    C,
}

#[derive(Debug, Clone)]
pub struct MinusGenerator {
    a: DomElemContainer,
    b: DomElemContainer,
    c: DomElemContainer,
    missing: Missing,
    fired: bool,
}

impl MinusGenerator {
    pub fn new(a: DomElemContainer, b: DomElemContainer, c: DomElemContainer, missing: Missing) -> Self {
        Self { a, b, c, missing, fired: true }
    }

    fn solve(&self) -> Option<i64> {
        match self.missing {
            Missing::A => Some(as_int(&self.b.get()?)? + as_int(&self.c.get()?)?),
            Missing::B => Some(as_int(&self.a.get()?)? - as_int(&self.c.get()?)?),
            Missing::C => Some(as_int(&self.a.get()?)? - as_int(&self.b.get()?)?),
        }
    }
}
impl Generator for MinusGenerator {
    fn reset(&mut self) {
        self.fired = false;
    }
    fn next(&mut self) -> bool {
        if self.fired {
            return false;
        }
        self.fired = true;
        let Some(value) = self.solve() else { return false };
        match self.missing {
            Missing::A => self.a.set(DomainElement::Int(value)),
            Missing::B => self.b.set(DomainElement::Int(value)),
            Missing::C => self.c.set(DomainElement::Int(value)),
        }
        true
    }
    fn set_vars_again(&mut self) {}
    fn is_at_end(&self) -> bool {
        self.fired
    }
    fn check(&self) -> bool {
        match (self.a.get().and_then(|v| as_int(&v)), self.b.get().and_then(|v| as_int(&v)), self.c.get().and_then(|v| as_int(&v))) {
            (Some(a), Some(b), Some(c)) => a - b == c,
            _ => false,
        }
    }
    fn clone_box(&self) -> Box<dyn Generator> {
        Box::new(self.clone())
    }
}

/// `a / b = c` with exactly one slot missing; refuses to generate when
/// `b = 0` would be required or when the division is not exact.
#[derive(Debug, Clone)]
pub struct DivGenerator {
    a: DomElemContainer,
    b: DomElemContainer,
    c: DomElemContainer,
    missing: Missing,
    fired: bool,
}

impl DivGenerator {
    pub fn new(a: DomElemContainer, b: DomElemContainer, c: DomElemContainer, missing: Missing) -> Self {
        Self { a, b, c, missing, fired: true }
    }

    fn solve(&self) -> Option<i64> {
        match self.missing {
            Missing::A => {
                let b = as_int(&self.b.get()?)?;
                let c = as_int(&self.c.get()?)?;
                b.checked_mul(c)
            }
            Missing::B => {
                let a = as_int(&self.a.get()?)?;
                let c = as_int(&self.c.get()?)?;
                if c == 0 || a % c != 0 {
                    None
                } else {
                    Some(a / c)
                }
            }
            Missing::C => {
                let a = as_int(&self.a.get()?)?;
                let b = as_int(&self.b.get()?)?;
                if b == 0 || a % b != 0 {
                    None
                } else {
                    Some(a / b)
                }
            }
        }
    }
}
impl Generator for DivGenerator {
    fn reset(&mut self) {
        self.fired = false;
    }
    fn next(&mut self) -> bool {
        if self.fired {
            return false;
        }
        self.fired = true;
        let Some(value) = self.solve() else { return false };
        match self.missing {
            Missing::A => self.a.set(DomainElement::Int(value)),
            Missing::B => self.b.set(DomainElement::Int(value)),
            Missing::C => self.c.set(DomainElement::Int(value)),
        }
        true
    }
    fn set_vars_again(&mut self) {}
    fn is_at_end(&self) -> bool {
        self.fired
    }
    fn check(&self) -> bool {
        match (self.a.get().and_then(|v| as_int(&v)), self.b.get().and_then(|v| as_int(&v)), self.c.get().and_then(|v| as_int(&v))) {
            (Some(a), Some(b), Some(c)) if b != 0 => a / b == c && a % b == 0,
            _ => false,
        }
    }
    fn clone_box(&self) -> Box<dyn Generator> {
        Box::new(self.clone())
    }
}

/// `a * b = c` given all three bound.
#[derive(Debug, Clone)]
pub struct TimesChecker {
    a: DomElemContainer,
    b: DomElemContainer,
    c: DomElemContainer,
    fired: bool,
}

impl TimesChecker {
    pub fn new(a: DomElemContainer, b: DomElemContainer, c: DomElemContainer) -> Self {
        Self { a, b, c, fired: true }
    }
}
impl Generator for TimesChecker {
    fn reset(&mut self) {
        self.fired = false;
    }
    fn next(&mut self) -> bool {
        if self.fired {
            return false;
        }
        self.fired = true;
        self.check()
    }
    fn set_vars_again(&mut self) {}
    fn is_at_end(&self) -> bool {
        self.fired
    }
    fn check(&self) -> bool {
        match (self.a.get().and_then(|v| as_int(&v)), self.b.get().and_then(|v| as_int(&v)), self.c.get().and_then(|v| as_int(&v))) {
            (Some(a), Some(b), Some(c)) => a * b == c,
            _ => false,
        }
    }
    fn clone_box(&self) -> Box<dyn Generator> {
        Box::new(self.clone())
    }
}

/// `a mod b = c` given all three bound.
#[derive(Debug, Clone)]
pub struct ModChecker {
    a: DomElemContainer,
    b: DomElemContainer,
    c: DomElemContainer,
    fired: bool,
}

impl ModChecker {
    pub fn new(a: DomElemContainer, b: DomElemContainer, c: DomElemContainer) -> Self {
        Self { a, b, c, fired: true }
    }
}
impl Generator for ModChecker {
    fn reset(&mut self) {
        self.fired = false;
    }
    fn next(&mut self) -> bool {
        if self.fired {
            return false;
        }
        self.fired = true;
        self.check()
    }
    fn set_vars_again(&mut self) {}
    fn is_at_end(&self) -> bool {
        self.fired
    }
    fn check(&self) -> bool {
        match (self.a.get().and_then(|v| as_int(&v)), self.b.get().and_then(|v| as_int(&v)), self.c.get().and_then(|v| as_int(&v))) {
            (Some(a), Some(b), Some(c)) if b != 0 => a.rem_euclid(b) == c,
            _ => false,
        }
    }
    fn clone_box(&self) -> Box<dyn Generator> {
        Box::new(self.clone())
    }
}

/// Given `|a| = b`, generates the (up to two) candidates for `a` from `b`.
#[derive(Debug, Clone)]
pub struct InverseAbsValueGenerator {
    a: DomElemContainer,
    b: DomElemContainer,
    candidates: Vec<i64>,
    pos: usize,
}

impl InverseAbsValueGenerator {
    pub fn new(a: DomElemContainer, b: DomElemContainer) -> Self {
        Self { a, b, candidates: Vec::new(), pos: 0 }
    }
}
impl Generator for InverseAbsValueGenerator {
    fn reset(&mut self) {
        self.pos = 0;
        self.candidates = match self.b.get().and_then(|v| as_int(&v)) {
            Some(v) if v > 0 => vec![v, -v],
            Some(0) => vec![0],
            _ => Vec::new(),
        };
    }
    fn next(&mut self) -> bool {
        if self.pos >= self.candidates.len() {
            return false;
        }
        self.a.set(DomainElement::Int(self.candidates[self.pos]));
        self.pos += 1;
        true
    }
    fn set_vars_again(&mut self) {
        if self.pos > 0 {
            self.a.set(DomainElement::Int(self.candidates[self.pos - 1]));
        }
    }
    fn is_at_end(&self) -> bool {
        self.pos >= self.candidates.len()
    }
    fn check(&self) -> bool {
        match (self.a.get().and_then(|v| as_int(&v)), self.b.get().and_then(|v| as_int(&v))) {
            (Some(a), Some(b)) => a.abs() == b,
            _ => false,
        }
    }
    fn clone_box(&self) -> Box<dyn Generator> {
        Box::new(self.clone())
    }
}

/// `-a = b`, invertible in either direction.
#[derive(Debug, Clone)]
pub struct UnaryMinusGenerator {
    a: DomElemContainer,
    b: DomElemContainer,
    output_is_a: bool,
    fired: bool,
}

impl UnaryMinusGenerator {
    pub fn new(a: DomElemContainer, b: DomElemContainer, output_is_a: bool) -> Self {
        Self { a, b, output_is_a, fired: true }
    }
}
impl Generator for UnaryMinusGenerator {
    fn reset(&mut self) {
        self.fired = false;
    }
    fn next(&mut self) -> bool {
        if self.fired {
            return false;
        }
        self.fired = true;
        if self.output_is_a {
            let Some(b) = self.b.get().and_then(|v| as_int(&v)) else { return false };
            self.a.set(DomainElement::Int(-b));
        } else {
            let Some(a) = self.a.get().and_then(|v| as_int(&v)) else { return false };
            self.b.set(DomainElement::Int(-a));
        }
        true
    }
    fn set_vars_again(&mut self) {}
    fn is_at_end(&self) -> bool {
        self.fired
    }
    fn check(&self) -> bool {
        match (self.a.get().and_then(|v| as_int(&v)), self.b.get().and_then(|v| as_int(&v))) {
            (Some(a), Some(b)) => -a == b,
            _ => false,
        }
    }
    fn clone_box(&self) -> Box<dyn Generator> {
        Box::new(self.clone())
    }
}

/// Fallback for a unary non-arithmetic function `f(a) = b` with no closed
/// form: given `b`, scans `candidates` (the declared input sort, made
/// finite by the caller) and checks `f` via `eval`, refusing to run when
/// `candidates` is absent (i.e. the sort is infinite and unsolvable) per
/// §4.4's "refuse infinite generation" rule.
#[derive(Debug, Clone)]
pub struct InverseUnaFuncGenerator {
    a: DomElemContainer,
    candidates: Vec<DomainElement>,
    eval: std::rc::Rc<dyn Fn(&DomainElement) -> Option<DomainElement>>,
    target: Option<DomainElement>,
    pos: usize,
}

impl InverseUnaFuncGenerator {
    pub fn new(a: DomElemContainer, candidates: Vec<DomainElement>, eval: std::rc::Rc<dyn Fn(&DomainElement) -> Option<DomainElement>>, target: Option<DomainElement>) -> Self {
        Self { a, candidates, eval, target, pos: 0 }
    }
}
impl Generator for InverseUnaFuncGenerator {
    fn reset(&mut self) {
        self.pos = 0;
    }
    fn next(&mut self) -> bool {
        let Some(target) = &self.target else { return false };
        while self.pos < self.candidates.len() {
            let candidate = self.candidates[self.pos].clone();
            self.pos += 1;
            if (self.eval)(&candidate).as_ref() == Some(target) {
                self.a.set(candidate);
                return true;
            }
        }
        false
    }
    fn set_vars_again(&mut self) {
        if self.pos > 0 {
            self.a.set(self.candidates[self.pos - 1].clone());
        }
    }
    fn is_at_end(&self) -> bool {
        self.pos >= self.candidates.len()
    }
    fn check(&self) -> bool {
        match (self.a.get(), &self.target) {
            (Some(a), Some(target)) => (self.eval)(&a).as_ref() == Some(target),
            _ => false,
        }
    }
    fn clone_box(&self) -> Box<dyn Generator> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn bound(v: i64) -> DomElemContainer {
        let c = DomElemContainer::new();
        c.set(DomainElement::Int(v));
        c
    }

    #[test]
    fn plus_checker_accepts_and_rejects() {
        let mut ok = PlusChecker::new(bound(2), bound(3), bound(5));
        ok.reset();
        assert!(ok.next());
        let mut bad = PlusChecker::new(bound(2), bound(3), bound(6));
        bad.reset();
        assert!(!bad.next());
    }

    #[test]
    fn minus_generator_solves_missing_c() {
        let c = DomElemContainer::new();
        let mut gen = MinusGenerator::new(bound(10), bound(4), c.clone(), Missing::C);
        gen.reset();
        assert!(gen.next());
        assert_eq!(c.get(), Some(DomainElement::Int(6)));
    }

    #[test]
    fn div_generator_refuses_inexact_division() {
        let c = DomElemContainer::new();
        let mut gen = DivGenerator::new(bound(7), bound(2), c, Missing::C);
        gen.reset();
        assert!(!gen.next());
    }

    #[test]
    fn inverse_abs_value_yields_both_roots() {
        let a = DomElemContainer::new();
        let mut gen = InverseAbsValueGenerator::new(a.clone(), bound(3));
        gen.reset();
        let mut seen = Vec::new();
        while gen.next() {
            seen.push(a.get().unwrap());
        }
        assert_eq!(seen, vec![DomainElement::Int(3), DomainElement::Int(-3)]);
    }
}
