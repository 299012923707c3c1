//! WebAssembly binary emission.
//!
//! Walks the source tree and produces the function body as a binary-format
//! v1 instruction stream. The interesting part is unreachability: when a
//! subtree's static type is `unreachable`, later code cannot actually run,
//! but the binary validator still requires stack coherence — so the writer
//! strategically inserts `unreachable` opcodes inside and after structured
//! constructs, and drops instructions whose operands cannot complete.
//!
//! Branch targets resolve through a break stack of the labels currently in
//! scope; a branch to a name not on the stack means the source tree is
//! structurally malformed, which surfaces as an error from the entry
//! points (there is nothing useful to emit for such a function).

mod instruction;

use anyhow::{bail, Context, Result};
use std::borrow::Cow;
use tracing::debug;
use wasm_encoder::{Encode, Instruction};

use crate::ir::{Expr, ExprId, Function, HostOp, Literal, Name, Type};
use instruction::*;

/// Emit the complete function body: locals declaration, instruction
/// stream, and the terminating `end`.
pub fn write_function(func: &Function) -> Result<Vec<u8>> {
    debug!(function = %func.name, "emitting function body");
    let mut out = Vec::new();

    // Locals are declared as runs of (count, type); parameters are not
    // declared, they are implied by the signature.
    let mut runs: Vec<(u32, Type)> = Vec::new();
    for &ty in &func.locals {
        match runs.last_mut() {
            Some((count, last)) if *last == ty => *count += 1,
            _ => runs.push((1, ty)),
        }
    }
    (runs.len() as u32).encode(&mut out);
    for (count, ty) in runs {
        count.encode(&mut out);
        val_type(ty)
            .with_context(|| format!("invalid local type in function {}", func.name))?
            .encode(&mut out);
    }

    let body = write_expr(func, func.body())?;
    out.extend_from_slice(&body);
    Instruction::End.encode(&mut out);
    Ok(out)
}

/// Emit the instruction stream for one expression tree.
pub fn write_expr(func: &Function, id: ExprId) -> Result<Vec<u8>> {
    let mut writer = Writer {
        func,
        out: Vec::new(),
        break_stack: Vec::new(),
    };
    writer
        .visit(id)
        .with_context(|| format!("emitting function {}", func.name))?;
    Ok(writer.out)
}

struct Writer<'f> {
    func: &'f Function,
    out: Vec<u8>,
    /// Labels currently in scope, innermost last. `None` entries are the
    /// unnameable frames the binary format requires for if arms.
    break_stack: Vec<Option<Name>>,
}

impl<'f> Writer<'f> {
    fn emit(&mut self, instr: Instruction<'_>) {
        instr.encode(&mut self.out);
    }

    fn ty(&self, id: ExprId) -> Type {
        self.func.ty(id)
    }

    /// Wire-level branch index: distance from the top of the break stack.
    fn break_index(&self, name: &str) -> Result<u32> {
        for (distance, entry) in self.break_stack.iter().rev().enumerate() {
            if entry.as_deref() == Some(name) {
                return Ok(distance as u32);
            }
        }
        bail!(
            "branch target {:?} is not in scope in function {}",
            name,
            self.func.name
        );
    }

    /// Emit a node, but if it is a block that is never branched to by
    /// name, emit its contents in place: the binary format allows a plain
    /// list where if arms and loop bodies go.
    fn visit_possible_block_contents(&mut self, id: ExprId) -> Result<()> {
        let (list, inline) = match self.func.expr(id) {
            Expr::Block { name, list } => {
                let branched_to = name
                    .as_ref()
                    .is_some_and(|name| subtree_branches_to(self.func, id, name));
                (list.clone(), !branched_to)
            }
            _ => (Vec::new(), false),
        };
        if !inline {
            return self.visit(id);
        }
        for &child in &list {
            self.visit(child)?;
        }
        if self.ty(id) == Type::Unreachable
            && list.last().map_or(true, |&last| self.ty(last) != Type::Unreachable)
        {
            // We skipped the block itself, but its contents must still end
            // in something that cannot be fallen out of.
            self.emit(Instruction::Unreachable);
        }
        Ok(())
    }

    fn visit(&mut self, id: ExprId) -> Result<()> {
        let func = self.func;
        let ty = self.ty(id);
        match func.expr(id) {
            Expr::Block { name, list } => {
                self.emit(Instruction::Block(block_type(ty)));
                self.break_stack.push(name.clone());
                for &child in list {
                    self.visit(child)?;
                }
                self.break_stack.pop();
                if ty == Type::Unreachable {
                    // A block that cannot be exited has no valid result
                    // type byte, so it was encoded as `none`; ending it
                    // with `unreachable` keeps that valid.
                    self.emit(Instruction::Unreachable);
                }
                self.emit(Instruction::End);
                if ty == Type::Unreachable {
                    // And one outside the block, so whatever follows may
                    // pop anything.
                    self.emit(Instruction::Unreachable);
                }
            }

            Expr::If {
                condition,
                if_true,
                if_false,
            } => {
                if self.ty(*condition) == Type::Unreachable {
                    // The condition never completes; consume it and don't
                    // emit the if at all.
                    self.visit(*condition)?;
                    self.emit(Instruction::Unreachable);
                    return Ok(());
                }
                self.visit(*condition)?;
                self.emit(Instruction::If(block_type(ty)));
                self.break_stack.push(None);
                self.visit_possible_block_contents(*if_true)?;
                self.break_stack.pop();
                if let Some(if_false) = if_false {
                    self.emit(Instruction::Else);
                    self.break_stack.push(None);
                    self.visit_possible_block_contents(*if_false)?;
                    self.break_stack.pop();
                }
                self.emit(Instruction::End);
                if ty == Type::Unreachable && if_false.is_some() {
                    // Both arms diverge; the if was encoded as `none`, so
                    // it must not be consumed itself.
                    self.emit(Instruction::Unreachable);
                }
            }

            Expr::Loop { name, body } => {
                self.emit(Instruction::Loop(block_type(ty)));
                self.break_stack.push(name.clone());
                self.visit_possible_block_contents(*body)?;
                self.break_stack.pop();
                self.emit(Instruction::End);
                if ty == Type::Unreachable {
                    self.emit(Instruction::Unreachable);
                }
            }

            Expr::Break {
                name,
                value,
                condition,
            } => {
                if let Some(value) = value {
                    self.visit(*value)?;
                }
                let index = self.break_index(name)?;
                match condition {
                    Some(condition) => {
                        self.visit(*condition)?;
                        self.emit(Instruction::BrIf(index));
                        if ty == Type::Unreachable {
                            // The value or condition diverged, so this
                            // br_if does not produce what the target
                            // expects; keep the stack polymorphic.
                            self.emit(Instruction::Unreachable);
                        }
                    }
                    None => self.emit(Instruction::Br(index)),
                }
            }

            Expr::Switch {
                targets,
                default,
                condition,
                value,
            } => {
                if let Some(value) = value {
                    self.visit(*value)?;
                }
                self.visit(*condition)?;
                let statically_unreachable = value.map_or(false, |v| {
                    self.ty(v) == Type::Unreachable
                }) || self.ty(*condition) == Type::Unreachable;
                if statically_unreachable {
                    // Type-checking rules differ in unreachable code;
                    // don't emit the table at all.
                    self.emit(Instruction::Unreachable);
                    return Ok(());
                }
                let mut indices = Vec::with_capacity(targets.len());
                for target in targets {
                    indices.push(self.break_index(target)?);
                }
                let default = self.break_index(default)?;
                self.emit(Instruction::BrTable(Cow::from(indices), default));
            }

            Expr::Call { target, operands } => {
                for &operand in operands {
                    self.visit(operand)?;
                }
                self.emit(Instruction::Call(*target));
                if ty == Type::Unreachable {
                    self.emit(Instruction::Unreachable);
                }
            }

            Expr::CallImport { target, operands } => {
                for &operand in operands {
                    self.visit(operand)?;
                }
                self.emit(Instruction::Call(*target));
                if ty == Type::Unreachable {
                    self.emit(Instruction::Unreachable);
                }
            }

            Expr::CallIndirect {
                type_index,
                target,
                operands,
            } => {
                for &operand in operands {
                    self.visit(operand)?;
                }
                self.visit(*target)?;
                self.emit(Instruction::CallIndirect {
                    type_index: *type_index,
                    table_index: 0,
                });
                if ty == Type::Unreachable {
                    self.emit(Instruction::Unreachable);
                }
            }

            Expr::LocalGet { index } => self.emit(Instruction::LocalGet(*index)),

            Expr::LocalSet {
                index,
                value,
                is_tee,
            } => {
                self.visit(*value)?;
                if *is_tee {
                    self.emit(Instruction::LocalTee(*index));
                } else {
                    self.emit(Instruction::LocalSet(*index));
                }
                if ty == Type::Unreachable {
                    self.emit(Instruction::Unreachable);
                }
            }

            Expr::GlobalGet { index } => self.emit(Instruction::GlobalGet(*index)),

            Expr::GlobalSet { index, value } => {
                self.visit(*value)?;
                self.emit(Instruction::GlobalSet(*index));
            }

            Expr::Load {
                bytes,
                signed,
                offset,
                align,
                atomic,
                ptr,
            } => {
                self.visit(*ptr)?;
                if ty == Type::Unreachable {
                    if *atomic {
                        // We don't know the right opcode; keep validity.
                        self.emit(Instruction::Unreachable);
                    }
                    // The pointer never completes, so a plain load is
                    // simply never reached; don't emit it.
                    return Ok(());
                }
                let memarg = mem_arg(*align, *bytes, *offset);
                self.emit(load_instruction(ty, *bytes, *signed, *atomic, memarg)?);
            }

            Expr::Store {
                bytes,
                offset,
                align,
                atomic,
                ptr,
                value,
                value_type,
            } => {
                self.visit(*ptr)?;
                self.visit(*value)?;
                if *atomic && ty == Type::Unreachable {
                    self.emit(Instruction::Unreachable);
                    return Ok(());
                }
                let memarg = mem_arg(*align, *bytes, *offset);
                self.emit(store_instruction(*value_type, *bytes, *atomic, memarg)?);
            }

            Expr::AtomicRmw {
                op,
                bytes,
                offset,
                ptr,
                value,
            } => {
                self.visit(*ptr)?;
                if self.ty(*ptr) == Type::Unreachable {
                    return Ok(());
                }
                self.visit(*value)?;
                if self.ty(*value) == Type::Unreachable {
                    return Ok(());
                }
                if ty == Type::Unreachable {
                    self.emit(Instruction::Unreachable);
                    return Ok(());
                }
                let memarg = mem_arg(*bytes as u32, *bytes, *offset);
                self.emit(rmw_instruction(*op, ty, *bytes, memarg)?);
            }

            Expr::AtomicCmpxchg {
                bytes,
                offset,
                ptr,
                expected,
                replacement,
            } => {
                self.visit(*ptr)?;
                if self.ty(*ptr) == Type::Unreachable {
                    return Ok(());
                }
                self.visit(*expected)?;
                if self.ty(*expected) == Type::Unreachable {
                    return Ok(());
                }
                self.visit(*replacement)?;
                if self.ty(*replacement) == Type::Unreachable {
                    return Ok(());
                }
                if ty == Type::Unreachable {
                    self.emit(Instruction::Unreachable);
                    return Ok(());
                }
                let memarg = mem_arg(*bytes as u32, *bytes, *offset);
                self.emit(cmpxchg_instruction(ty, *bytes, memarg)?);
            }

            Expr::AtomicWait {
                ptr,
                expected,
                timeout,
                expected_type,
            } => {
                self.visit(*ptr)?;
                if self.ty(*ptr) == Type::Unreachable {
                    return Ok(());
                }
                self.visit(*expected)?;
                if self.ty(*expected) == Type::Unreachable {
                    return Ok(());
                }
                self.visit(*timeout)?;
                if self.ty(*timeout) == Type::Unreachable {
                    return Ok(());
                }
                match expected_type {
                    Type::I32 => self.emit(Instruction::MemoryAtomicWait32(mem_arg(4, 4, 0))),
                    Type::I64 => self.emit(Instruction::MemoryAtomicWait64(mem_arg(8, 8, 0))),
                    other => bail!("invalid atomic wait type {}", other),
                }
            }

            Expr::AtomicWake { ptr, wake_count } => {
                self.visit(*ptr)?;
                if self.ty(*ptr) == Type::Unreachable {
                    return Ok(());
                }
                self.visit(*wake_count)?;
                if self.ty(*wake_count) == Type::Unreachable {
                    return Ok(());
                }
                self.emit(Instruction::MemoryAtomicNotify(mem_arg(4, 4, 0)));
            }

            Expr::Const { value } => match *value {
                Literal::I32(v) => self.emit(Instruction::I32Const(v)),
                Literal::I64(v) => self.emit(Instruction::I64Const(v)),
                Literal::F32(v) => self.emit(Instruction::F32Const(v.into())),
                Literal::F64(v) => self.emit(Instruction::F64Const(v.into())),
            },

            Expr::Unary { op, value } => {
                self.visit(*value)?;
                self.emit(unary_instruction(*op));
                if ty == Type::Unreachable {
                    self.emit(Instruction::Unreachable);
                }
            }

            Expr::Binary { op, left, right } => {
                self.visit(*left)?;
                self.visit(*right)?;
                self.emit(binary_instruction(*op));
                if ty == Type::Unreachable {
                    self.emit(Instruction::Unreachable);
                }
            }

            Expr::Select {
                condition,
                if_true,
                if_false,
            } => {
                self.visit(*if_true)?;
                self.visit(*if_false)?;
                self.visit(*condition)?;
                self.emit(Instruction::Select);
                if ty == Type::Unreachable {
                    self.emit(Instruction::Unreachable);
                }
            }

            Expr::Drop { value } => {
                self.visit(*value)?;
                self.emit(Instruction::Drop);
            }

            Expr::Return { value } => {
                if let Some(value) = value {
                    self.visit(*value)?;
                }
                self.emit(Instruction::Return);
            }

            Expr::Host { op, operands } => {
                match op {
                    HostOp::CurrentMemory => self.emit(Instruction::MemorySize(0)),
                    HostOp::GrowMemory => {
                        self.visit(operands[0])?;
                        self.emit(Instruction::MemoryGrow(0));
                    }
                }
            }

            Expr::Nop => self.emit(Instruction::Nop),
            Expr::Unreachable => self.emit(Instruction::Unreachable),
        }
        Ok(())
    }
}

/// Does any branch inside the subtree rooted at `id` target `name`?
fn subtree_branches_to(func: &Function, id: ExprId, name: &str) -> bool {
    let mut stack = vec![id];
    while let Some(id) = stack.pop() {
        match func.expr(id) {
            Expr::Break { name: n, .. } if n == name => return true,
            Expr::Switch {
                targets, default, ..
            } if default == name || targets.iter().any(|t| t == name) => return true,
            expr => stack.extend(expr.children()),
        }
    }
    false
}
