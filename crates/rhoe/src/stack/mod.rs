//! Stack IR: a flat, near-binary view of a function body.
//!
//! The tree IR nests operands inside their consumers; the binary format
//! wants them in evaluation order. This IR is the halfway point: a single
//! flat vector where each item is either
//!
//! - a reference to a source expression (emitted at that position),
//! - a structural marker closing a construct the expression slot opened
//!   ([`StackItem::BlockEnd`], [`StackItem::IfElse`], [`StackItem::IfEnd`]), or
//! - a hole ([`StackItem::Deleted`]), so removing an item is O(1).
//!
//! For example, `(block $b (i32.add (i32.const 10) (local.get 0)))`
//! linearizes to `[block $b, i32.const 10, local.get 0, i32.add, end]`.
//!
//! The binary writer consumes the source tree directly; this IR exists for
//! late structural edits between lifting and emission.

use crate::ir::{Expr, ExprId, Function};

/// One slot of the flat sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackItem {
    /// Emit this source expression here (for control flow, its opener).
    Expr(ExprId),
    /// End of a block or loop.
    BlockEnd,
    /// Start of an if's false arm.
    IfElse,
    /// End of an if.
    IfEnd,
    /// Nothing; skipped on iteration.
    Deleted,
}

/// The flat sequence for one function body.
pub struct StackIr {
    items: Vec<StackItem>,
}

impl StackIr {
    /// Linearize a function body into binary order: operands before their
    /// consumer, control openers before their contents.
    pub fn build(func: &Function) -> StackIr {
        let mut ir = StackIr { items: Vec::new() };
        ir.linearize(func, func.body());
        ir
    }

    /// All slots, holes included.
    pub fn items(&self) -> &[StackItem] {
        &self.items
    }

    /// Iterate the live slots.
    pub fn iter(&self) -> impl Iterator<Item = StackItem> + '_ {
        self.items
            .iter()
            .copied()
            .filter(|item| *item != StackItem::Deleted)
    }

    /// Punch a hole at `index`.
    pub fn delete(&mut self, index: usize) {
        self.items[index] = StackItem::Deleted;
    }

    fn push(&mut self, item: StackItem) {
        self.items.push(item);
    }

    fn linearize(&mut self, func: &Function, id: ExprId) {
        match func.expr(id) {
            Expr::Block { list, .. } => {
                self.push(StackItem::Expr(id));
                for &child in list {
                    self.linearize(func, child);
                }
                self.push(StackItem::BlockEnd);
            }
            Expr::Loop { body, .. } => {
                self.push(StackItem::Expr(id));
                self.linearize(func, *body);
                self.push(StackItem::BlockEnd);
            }
            Expr::If {
                condition,
                if_true,
                if_false,
            } => {
                self.linearize(func, *condition);
                self.push(StackItem::Expr(id));
                self.linearize(func, *if_true);
                if let Some(if_false) = if_false {
                    self.push(StackItem::IfElse);
                    self.linearize(func, *if_false);
                }
                self.push(StackItem::IfEnd);
            }
            Expr::Break {
                value, condition, ..
            } => {
                if let Some(value) = value {
                    self.linearize(func, *value);
                }
                if let Some(condition) = condition {
                    self.linearize(func, *condition);
                }
                self.push(StackItem::Expr(id));
            }
            Expr::Switch {
                value, condition, ..
            } => {
                if let Some(value) = value {
                    self.linearize(func, *value);
                }
                self.linearize(func, *condition);
                self.push(StackItem::Expr(id));
            }
            Expr::Call { operands, .. }
            | Expr::CallImport { operands, .. }
            | Expr::Host { operands, .. } => {
                for &operand in operands {
                    self.linearize(func, operand);
                }
                self.push(StackItem::Expr(id));
            }
            Expr::CallIndirect {
                target, operands, ..
            } => {
                for &operand in operands {
                    self.linearize(func, operand);
                }
                self.linearize(func, *target);
                self.push(StackItem::Expr(id));
            }
            Expr::LocalSet { value, .. } | Expr::GlobalSet { value, .. } => {
                self.linearize(func, *value);
                self.push(StackItem::Expr(id));
            }
            Expr::Load { ptr, .. } => {
                self.linearize(func, *ptr);
                self.push(StackItem::Expr(id));
            }
            Expr::Store { ptr, value, .. } | Expr::AtomicRmw { ptr, value, .. } => {
                self.linearize(func, *ptr);
                self.linearize(func, *value);
                self.push(StackItem::Expr(id));
            }
            Expr::AtomicCmpxchg {
                ptr,
                expected,
                replacement,
                ..
            } => {
                self.linearize(func, *ptr);
                self.linearize(func, *expected);
                self.linearize(func, *replacement);
                self.push(StackItem::Expr(id));
            }
            Expr::AtomicWait {
                ptr,
                expected,
                timeout,
                ..
            } => {
                self.linearize(func, *ptr);
                self.linearize(func, *expected);
                self.linearize(func, *timeout);
                self.push(StackItem::Expr(id));
            }
            Expr::AtomicWake { ptr, wake_count } => {
                self.linearize(func, *ptr);
                self.linearize(func, *wake_count);
                self.push(StackItem::Expr(id));
            }
            Expr::Unary { value, .. } | Expr::Drop { value } => {
                self.linearize(func, *value);
                self.push(StackItem::Expr(id));
            }
            Expr::Binary { left, right, .. } => {
                self.linearize(func, *left);
                self.linearize(func, *right);
                self.push(StackItem::Expr(id));
            }
            Expr::Select {
                condition,
                if_true,
                if_false,
            } => {
                self.linearize(func, *if_true);
                self.linearize(func, *if_false);
                self.linearize(func, *condition);
                self.push(StackItem::Expr(id));
            }
            Expr::Return { value } => {
                if let Some(value) = value {
                    self.linearize(func, *value);
                }
                self.push(StackItem::Expr(id));
            }
            Expr::Const { .. }
            | Expr::LocalGet { .. }
            | Expr::GlobalGet { .. }
            | Expr::Nop
            | Expr::Unreachable => {
                self.push(StackItem::Expr(id));
            }
        }
    }
}
