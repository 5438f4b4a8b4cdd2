//! Kernel order (§3 "KernelOrder"): the total order deciding how close to
//! the root of any BDD a kernel may appear.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Lower category sorts closer to the root. `TrueFalse` only ever labels
/// the (empty) kernel of a leaf BDD and never dominates anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KernelCategory {
    Standard = 0,
    DeBruijn = 1,
    TrueFalse = 2,
}

/// `(category, number)`. Within a category, a *higher* number is closer to
/// the root (reverse insertion order: freshly created intermediate
/// kernels default to the bottom rather than displacing the whole BDD).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KernelOrder {
    pub category: KernelCategory,
    pub number: u64,
}

impl KernelOrder {
    pub const TRUE_FALSE: KernelOrder = KernelOrder { category: KernelCategory::TrueFalse, number: 0 };

    pub fn standard(number: u64) -> Self {
        Self { category: KernelCategory::Standard, number }
    }

    pub fn de_bruijn(number: u64) -> Self {
        Self { category: KernelCategory::DeBruijn, number }
    }
}

/// Ordered so that `a < b` iff `a` belongs strictly closer to the root than
/// `b`, i.e. the order used directly by `ifthenelse`'s "pull the smallest
/// kernel to the top" rule (§4.1).
impl PartialOrd for KernelOrder {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for KernelOrder {
    fn cmp(&self, other: &Self) -> Ordering {
        self.category.cmp(&other.category).then_with(|| other.number.cmp(&self.number))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn standard_always_above_debruijn() {
        assert!(KernelOrder::standard(0) < KernelOrder::de_bruijn(1_000_000));
    }

    #[test]
    fn within_category_higher_number_is_closer_to_root() {
        assert!(KernelOrder::standard(5) < KernelOrder::standard(3));
    }

    #[test]
    fn true_false_never_above_anything() {
        assert!(KernelOrder::standard(0) < KernelOrder::TRUE_FALSE);
    }
}
