//! The grounder factory and grounder tree (§4.5-§4.7, L4): turns a
//! [`crate::theory::Theory`] plus a [`crate::structure::Structure`] into a
//! [`crate::solver::ecnf::GroundTheory`].
//!
//! - [`context`] — the polarity/conjunctive-path/Tseitin-semantics state
//!   threaded through every grounder, and the `ConjOrDisj` intermediate
//!   result type.
//! - [`grounders`] — one small struct per `Formula`/`Term` shape.
//! - [`factory`] — builds a grounder tree from a `Theory`.
//! - [`lazy`] — delays a subset of that tree behind solver-discovered
//!   literal creation instead of running it eagerly.

pub mod context;
pub mod factory;
pub mod grounders;
pub mod lazy;

pub use context::{conjoin, to_literal, ConjOrDisj, FuncContext, GroundingContext};
pub use factory::build;
pub use grounders::{
    AggGrounder, AtomGrounder, Bindings, BoolGrounder, ComparisonGrounder, ConstGrounder, DefinitionGrounder, DenotationGrounder, EquivGrounder, Grounder, QuantGrounder, RuleGrounder, TermGrounder, TheoryGrounder,
};
pub use lazy::{find_delay, ContainerAtom, Delay, LazyGroundingManager};
