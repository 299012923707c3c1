//! rhoe — DataFlow SSA lifting and binary emission for WebAssembly functions.
//!
//! This crate takes one function in a structured, tree-shaped WebAssembly
//! IR and derives two secondary representations from it:
//!
//! - A **DataFlow SSA graph** ([`dataflow`]) over the function's integer
//!   computation, with explicit Block/Cond/Phi control-merge structure and
//!   a Bad-node escape hatch for everything the analysis does not track.
//!   Built to be handed to a Souper-style superoptimizer: loops never
//!   introduce cycles, redundant comparison flavors are normalized away,
//!   and one-bit predicates are explicit.
//! - A **Stack IR** ([`stack`]) and a **binary encoding** ([`writer`]) of
//!   the function body, mirroring the WebAssembly binary format version 1.
//!
//! Parsing WebAssembly into the source tree, pass orchestration, and the
//! Souper text export are deliberately outside this crate.

pub mod dataflow;
pub mod ir;
pub mod stack;
pub mod writer;

// Re-export key types for convenience
pub use anyhow::{Context, Result};
pub use dataflow::Builder;
pub use ir::Function;

/// Build the DataFlow SSA graph for a function.
///
/// Unsupported constructs never fail the build; they surface as Bad or
/// opaque Var nodes in the result.
///
/// # Example
/// ```
/// use rhoe::ir::{BinaryOp, Function, Literal, Type};
///
/// let mut func = Function::new("add1", vec![Type::I32], vec![], Type::I32);
/// let x = func.local_get(0);
/// let one = func.const_(Literal::I32(1));
/// let add = func.binary(BinaryOp::I32Add, x, one);
/// func.set_body(add);
///
/// let built = rhoe::lift_function(&func);
/// // Bad, the parameter's Var, the constant, and the add.
/// assert_eq!(built.graph.len(), 4);
/// ```
pub fn lift_function(func: &Function) -> Builder<'_> {
    Builder::build(func)
}

/// Encode a function body (locals declaration, instructions, terminating
/// `end`) in the WebAssembly binary format version 1.
///
/// Fails only on a structurally malformed tree: a branch to a label that
/// is not in scope, or a local of non-value type.
pub fn emit_function(func: &Function) -> Result<Vec<u8>> {
    writer::write_function(func)
}
