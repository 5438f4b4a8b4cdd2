/*!
This crate grounds a first-order theory extended with inductive
definitions, aggregates, and arithmetic constraint terms against a
three-valued structure, producing the propositional ECNF a SAT/SMT-style
solver consumes.

# Pipeline

A caller picks one of three public inferences ([`inference::propagate`],
[`inference::modelexpand`], or [`inference::definitions::calculate_definitions`]).
Internally every one of them is built on the same four layers:

- [`fobdd`] — a hash-consed, ordered first-order binary decision diagram
  (FOBDD) manager: the shared canonical representation every other layer
  builds on.
- [`cost`] — chance/answer-count/enumeration-cost estimation over a FOBDD,
  used to drive kernel reordering and generator-pattern selection.
- [`propagation`] — bottom-up bounds propagation that tightens a
  [`structure::Structure`] to a fixpoint before grounding.
- [`generators`] and [`grounding`] — the generator/checker framework and
  the grounder tree that together turn a theory into ground clauses,
  aggregate sets, CP reifications and definitional rules.

# Example

```rust
use fobdd_ground_core::vocabulary::{Sort, SortTable};
use fobdd_ground_core::structure::Structure;

let sort = Sort::new("N", SortTable::IntRange(1, 3));
let mut structure = Structure::new();
structure.declare_sort(sort);
assert_eq!(structure.sorts().count(), 1);
```
*/
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![warn(
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    variant_size_differences
)]

pub mod config;
pub mod cost;
pub mod error;
pub mod fobdd;
pub mod generators;
pub mod grounding;
pub mod inference;
pub mod propagation;
pub mod solver;
pub mod structure;
pub mod termination;
pub mod theory;
pub mod util;
pub mod vocabulary;
