//! DataFlow SSA IR, built from the source expression tree.
//!
//! The DataFlow IR represents a function's integer computation as a directed
//! acyclic graph of value-producing nodes with explicit control-merge
//! structure (Block/Cond/Phi), designed to be easy to hand to a Souper-style
//! superoptimizer. Anything outside the supported integer fragment degrades
//! to the Bad sentinel or an opaque Var rather than failing the build.
//!
//! | Module | Responsibility |
//! |-----------|--------------------------------------------------------|
//! | [`node`]  | Node model, arena, predicates, structural equality     |
//! | `builder` | The structural walk over a function body               |
//! | `merge`   | Merge/phi engine for control joins                     |
//! | [`verify`] | Graph well-formedness checks                          |
//!
//! Loops deliberately never introduce cycles: loop-carried locals resolve to
//! either a fresh opaque Var or a direct reuse of the pre-loop value, so a
//! trace through the graph never has to reason about a previous iteration.

mod builder;
mod merge;
pub mod node;
pub mod verify;

pub use builder::Builder;
pub use node::{ExprOp, Graph, Node, NodeId, NodeKind};
