//! Source intermediate representation.
//!
//! This module defines the structured, tree-shaped function IR the rest of
//! the crate consumes:
//!
//! - **Value vocabulary** ([`Type`], [`Literal`], [`UnaryOp`], [`BinaryOp`]):
//!   the WebAssembly operator set, including the float families the DataFlow
//!   side treats as opaque.
//! - **Expression tree** ([`Expr`], [`ExprId`], [`Function`]): one arena of
//!   expressions per function, with typed constructor methods.
//!
//! Expressions reference their children by [`ExprId`] index into the owning
//! [`Function`]'s arena, so side tables (set registry, parent map, condition
//! map) can use plain copyable keys.

mod expr;
mod types;

pub use expr::*;
pub use types::*;
