//! The source expression tree and its owning function.
//!
//! Expressions live in a per-function arena and reference children by
//! [`ExprId`]. The constructor methods on [`Function`] compute each
//! expression's static type where the operator determines it and propagate
//! `Unreachable` upward from children, matching the typing the front end
//! produces. Control-flow constructors take their type explicitly: block
//! typing depends on branch analysis that belongs to the (out-of-scope)
//! producer of this IR.

use super::types::*;

/// Label name for blocks, loops, and branches.
pub type Name = String;

/// Index of an expression in its function's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single source-IR expression.
///
/// Children are [`ExprId`] references into the owning [`Function`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Block {
        name: Option<Name>,
        list: Vec<ExprId>,
    },
    If {
        condition: ExprId,
        if_true: ExprId,
        if_false: Option<ExprId>,
    },
    Loop {
        name: Option<Name>,
        body: ExprId,
    },
    Break {
        name: Name,
        value: Option<ExprId>,
        condition: Option<ExprId>,
    },
    Switch {
        targets: Vec<Name>,
        default: Name,
        condition: ExprId,
        value: Option<ExprId>,
    },
    Call {
        target: u32,
        operands: Vec<ExprId>,
    },
    CallImport {
        target: u32,
        operands: Vec<ExprId>,
    },
    CallIndirect {
        type_index: u32,
        target: ExprId,
        operands: Vec<ExprId>,
    },
    LocalGet {
        index: u32,
    },
    /// `local.set` or, when `is_tee`, `local.tee`.
    LocalSet {
        index: u32,
        value: ExprId,
        is_tee: bool,
    },
    GlobalGet {
        index: u32,
    },
    GlobalSet {
        index: u32,
        value: ExprId,
    },
    Load {
        bytes: u8,
        signed: bool,
        offset: u32,
        align: u32,
        atomic: bool,
        ptr: ExprId,
    },
    Store {
        bytes: u8,
        offset: u32,
        align: u32,
        atomic: bool,
        ptr: ExprId,
        value: ExprId,
        value_type: Type,
    },
    AtomicRmw {
        op: AtomicRmwOp,
        bytes: u8,
        offset: u32,
        ptr: ExprId,
        value: ExprId,
    },
    AtomicCmpxchg {
        bytes: u8,
        offset: u32,
        ptr: ExprId,
        expected: ExprId,
        replacement: ExprId,
    },
    AtomicWait {
        ptr: ExprId,
        expected: ExprId,
        timeout: ExprId,
        expected_type: Type,
    },
    AtomicWake {
        ptr: ExprId,
        wake_count: ExprId,
    },
    Const {
        value: Literal,
    },
    Unary {
        op: UnaryOp,
        value: ExprId,
    },
    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },
    Select {
        condition: ExprId,
        if_true: ExprId,
        if_false: ExprId,
    },
    Drop {
        value: ExprId,
    },
    Return {
        value: Option<ExprId>,
    },
    Host {
        op: HostOp,
        operands: Vec<ExprId>,
    },
    Nop,
    Unreachable,
}

impl Expr {
    /// Immediate children, in evaluation order.
    pub fn children(&self) -> Vec<ExprId> {
        match self {
            Expr::Block { list, .. } => list.clone(),
            Expr::If {
                condition,
                if_true,
                if_false,
            } => {
                let mut out = vec![*condition, *if_true];
                out.extend(*if_false);
                out
            }
            Expr::Loop { body, .. } => vec![*body],
            Expr::Break {
                value, condition, ..
            } => value.iter().chain(condition.iter()).copied().collect(),
            Expr::Switch {
                condition, value, ..
            } => value.iter().copied().chain([*condition]).collect(),
            Expr::Call { operands, .. }
            | Expr::CallImport { operands, .. }
            | Expr::Host { operands, .. } => operands.clone(),
            Expr::CallIndirect {
                target, operands, ..
            } => operands.iter().copied().chain([*target]).collect(),
            Expr::LocalSet { value, .. }
            | Expr::GlobalSet { value, .. }
            | Expr::Unary { value, .. }
            | Expr::Drop { value } => vec![*value],
            Expr::Load { ptr, .. } => vec![*ptr],
            Expr::Store { ptr, value, .. } | Expr::AtomicRmw { ptr, value, .. } => {
                vec![*ptr, *value]
            }
            Expr::AtomicCmpxchg {
                ptr,
                expected,
                replacement,
                ..
            } => vec![*ptr, *expected, *replacement],
            Expr::AtomicWait {
                ptr,
                expected,
                timeout,
                ..
            } => vec![*ptr, *expected, *timeout],
            Expr::AtomicWake { ptr, wake_count } => vec![*ptr, *wake_count],
            Expr::Binary { left, right, .. } => vec![*left, *right],
            Expr::Select {
                condition,
                if_true,
                if_false,
            } => vec![*if_true, *if_false, *condition],
            Expr::Return { value } => value.iter().copied().collect(),
            Expr::Const { .. }
            | Expr::LocalGet { .. }
            | Expr::GlobalGet { .. }
            | Expr::Nop
            | Expr::Unreachable => Vec::new(),
        }
    }
}

struct ExprSlot {
    expr: Expr,
    ty: Type,
}

/// A function: signature, locals, and the expression arena holding its body.
pub struct Function {
    pub name: String,
    /// Parameter types. Parameters occupy local indices `0..params.len()`.
    pub params: Vec<Type>,
    /// Non-parameter locals; WebAssembly zero-initializes these.
    pub locals: Vec<Type>,
    /// Result type (`Type::None` for void functions).
    pub result: Type,
    slots: Vec<ExprSlot>,
    body: Option<ExprId>,
}

impl Function {
    pub fn new(
        name: impl Into<String>,
        params: Vec<Type>,
        locals: Vec<Type>,
        result: Type,
    ) -> Self {
        debug_assert!(params.iter().chain(locals.iter()).all(Type::is_concrete));
        Function {
            name: name.into(),
            params,
            locals,
            result,
            slots: Vec::new(),
            body: None,
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    /// Total number of locals (parameters included).
    pub fn num_locals(&self) -> usize {
        self.params.len() + self.locals.len()
    }

    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    pub fn is_param(&self, index: usize) -> bool {
        index < self.params.len()
    }

    /// Declared type of a local (parameters first).
    pub fn local_type(&self, index: usize) -> Type {
        if index < self.params.len() {
            self.params[index]
        } else {
            self.locals[index - self.params.len()]
        }
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.slots[id.index()].expr
    }

    /// Static type of an expression.
    pub fn ty(&self, id: ExprId) -> Type {
        self.slots[id.index()].ty
    }

    /// The body expression. Panics if no body was set.
    pub fn body(&self) -> ExprId {
        self.body.expect("function has no body")
    }

    pub fn set_body(&mut self, body: ExprId) {
        self.body = Some(body);
    }

    fn add(&mut self, expr: Expr, ty: Type) -> ExprId {
        let id = ExprId(self.slots.len() as u32);
        self.slots.push(ExprSlot { expr, ty });
        id
    }

    fn unreachable_child(&self, children: &[ExprId]) -> bool {
        children.iter().any(|&c| self.ty(c) == Type::Unreachable)
    }

    // ─── Constructors: values ────────────────────────────────────────────

    pub fn const_(&mut self, value: Literal) -> ExprId {
        let ty = value.ty();
        self.add(Expr::Const { value }, ty)
    }

    pub fn local_get(&mut self, index: u32) -> ExprId {
        let ty = self.local_type(index as usize);
        self.add(Expr::LocalGet { index }, ty)
    }

    pub fn local_set(&mut self, index: u32, value: ExprId) -> ExprId {
        let ty = if self.unreachable_child(&[value]) {
            Type::Unreachable
        } else {
            Type::None
        };
        self.add(
            Expr::LocalSet {
                index,
                value,
                is_tee: false,
            },
            ty,
        )
    }

    pub fn local_tee(&mut self, index: u32, value: ExprId) -> ExprId {
        let ty = if self.unreachable_child(&[value]) {
            Type::Unreachable
        } else {
            self.local_type(index as usize)
        };
        self.add(
            Expr::LocalSet {
                index,
                value,
                is_tee: true,
            },
            ty,
        )
    }

    /// Global types are module-level information this IR does not carry, so
    /// the producer supplies the type.
    pub fn global_get(&mut self, index: u32, ty: Type) -> ExprId {
        self.add(Expr::GlobalGet { index }, ty)
    }

    pub fn global_set(&mut self, index: u32, value: ExprId) -> ExprId {
        let ty = if self.unreachable_child(&[value]) {
            Type::Unreachable
        } else {
            Type::None
        };
        self.add(Expr::GlobalSet { index, value }, ty)
    }

    pub fn unary(&mut self, op: UnaryOp, value: ExprId) -> ExprId {
        let ty = if self.unreachable_child(&[value]) {
            Type::Unreachable
        } else {
            op.result_type()
        };
        self.add(Expr::Unary { op, value }, ty)
    }

    pub fn binary(&mut self, op: BinaryOp, left: ExprId, right: ExprId) -> ExprId {
        let ty = if self.unreachable_child(&[left, right]) {
            Type::Unreachable
        } else {
            op.result_type()
        };
        self.add(Expr::Binary { op, left, right }, ty)
    }

    pub fn select(&mut self, condition: ExprId, if_true: ExprId, if_false: ExprId) -> ExprId {
        let ty = if self.unreachable_child(&[condition, if_true, if_false]) {
            Type::Unreachable
        } else {
            self.ty(if_true)
        };
        self.add(
            Expr::Select {
                condition,
                if_true,
                if_false,
            },
            ty,
        )
    }

    pub fn drop_(&mut self, value: ExprId) -> ExprId {
        let ty = if self.unreachable_child(&[value]) {
            Type::Unreachable
        } else {
            Type::None
        };
        self.add(Expr::Drop { value }, ty)
    }

    // ─── Constructors: memory ────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub fn load(
        &mut self,
        ty: Type,
        bytes: u8,
        signed: bool,
        offset: u32,
        align: u32,
        atomic: bool,
        ptr: ExprId,
    ) -> ExprId {
        let ty = if self.unreachable_child(&[ptr]) {
            Type::Unreachable
        } else {
            ty
        };
        self.add(
            Expr::Load {
                bytes,
                signed,
                offset,
                align,
                atomic,
                ptr,
            },
            ty,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn store(
        &mut self,
        value_type: Type,
        bytes: u8,
        offset: u32,
        align: u32,
        atomic: bool,
        ptr: ExprId,
        value: ExprId,
    ) -> ExprId {
        let ty = if self.unreachable_child(&[ptr, value]) {
            Type::Unreachable
        } else {
            Type::None
        };
        self.add(
            Expr::Store {
                bytes,
                offset,
                align,
                atomic,
                ptr,
                value,
                value_type,
            },
            ty,
        )
    }

    pub fn atomic_rmw(
        &mut self,
        op: AtomicRmwOp,
        ty: Type,
        bytes: u8,
        offset: u32,
        ptr: ExprId,
        value: ExprId,
    ) -> ExprId {
        let ty = if self.unreachable_child(&[ptr, value]) {
            Type::Unreachable
        } else {
            ty
        };
        self.add(
            Expr::AtomicRmw {
                op,
                bytes,
                offset,
                ptr,
                value,
            },
            ty,
        )
    }

    pub fn atomic_cmpxchg(
        &mut self,
        ty: Type,
        bytes: u8,
        offset: u32,
        ptr: ExprId,
        expected: ExprId,
        replacement: ExprId,
    ) -> ExprId {
        let ty = if self.unreachable_child(&[ptr, expected, replacement]) {
            Type::Unreachable
        } else {
            ty
        };
        self.add(
            Expr::AtomicCmpxchg {
                bytes,
                offset,
                ptr,
                expected,
                replacement,
            },
            ty,
        )
    }

    pub fn atomic_wait(
        &mut self,
        expected_type: Type,
        ptr: ExprId,
        expected: ExprId,
        timeout: ExprId,
    ) -> ExprId {
        let ty = if self.unreachable_child(&[ptr, expected, timeout]) {
            Type::Unreachable
        } else {
            Type::I32
        };
        self.add(
            Expr::AtomicWait {
                ptr,
                expected,
                timeout,
                expected_type,
            },
            ty,
        )
    }

    pub fn atomic_wake(&mut self, ptr: ExprId, wake_count: ExprId) -> ExprId {
        let ty = if self.unreachable_child(&[ptr, wake_count]) {
            Type::Unreachable
        } else {
            Type::I32
        };
        self.add(Expr::AtomicWake { ptr, wake_count }, ty)
    }

    // ─── Constructors: calls ─────────────────────────────────────────────

    pub fn call(&mut self, target: u32, operands: Vec<ExprId>, result: Type) -> ExprId {
        let ty = if self.unreachable_child(&operands) {
            Type::Unreachable
        } else {
            result
        };
        self.add(Expr::Call { target, operands }, ty)
    }

    pub fn call_import(&mut self, target: u32, operands: Vec<ExprId>, result: Type) -> ExprId {
        let ty = if self.unreachable_child(&operands) {
            Type::Unreachable
        } else {
            result
        };
        self.add(Expr::CallImport { target, operands }, ty)
    }

    pub fn call_indirect(
        &mut self,
        type_index: u32,
        target: ExprId,
        operands: Vec<ExprId>,
        result: Type,
    ) -> ExprId {
        let ty = if self.unreachable_child(&operands) || self.unreachable_child(&[target]) {
            Type::Unreachable
        } else {
            result
        };
        self.add(
            Expr::CallIndirect {
                type_index,
                target,
                operands,
            },
            ty,
        )
    }

    pub fn host(&mut self, op: HostOp, operands: Vec<ExprId>) -> ExprId {
        let ty = if self.unreachable_child(&operands) {
            Type::Unreachable
        } else {
            Type::I32
        };
        self.add(Expr::Host { op, operands }, ty)
    }

    // ─── Constructors: control flow ──────────────────────────────────────

    /// Blocks, ifs, and loops take their structural type explicitly; see the
    /// module docs.
    pub fn block(&mut self, name: Option<Name>, list: Vec<ExprId>, ty: Type) -> ExprId {
        self.add(Expr::Block { name, list }, ty)
    }

    pub fn if_(
        &mut self,
        condition: ExprId,
        if_true: ExprId,
        if_false: Option<ExprId>,
        ty: Type,
    ) -> ExprId {
        self.add(
            Expr::If {
                condition,
                if_true,
                if_false,
            },
            ty,
        )
    }

    pub fn loop_(&mut self, name: Option<Name>, body: ExprId, ty: Type) -> ExprId {
        self.add(Expr::Loop { name, body }, ty)
    }

    pub fn break_(
        &mut self,
        name: impl Into<Name>,
        value: Option<ExprId>,
        condition: Option<ExprId>,
    ) -> ExprId {
        let mut children: Vec<ExprId> = Vec::new();
        children.extend(value);
        children.extend(condition);
        let ty = if self.unreachable_child(&children) || condition.is_none() {
            Type::Unreachable
        } else if let Some(value) = value {
            // An untaken br_if passes its value through.
            self.ty(value)
        } else {
            Type::None
        };
        self.add(
            Expr::Break {
                name: name.into(),
                value,
                condition,
            },
            ty,
        )
    }

    pub fn switch(
        &mut self,
        targets: Vec<Name>,
        default: impl Into<Name>,
        condition: ExprId,
        value: Option<ExprId>,
    ) -> ExprId {
        self.add(
            Expr::Switch {
                targets,
                default: default.into(),
                condition,
                value,
            },
            Type::Unreachable,
        )
    }

    pub fn return_(&mut self, value: Option<ExprId>) -> ExprId {
        self.add(Expr::Return { value }, Type::Unreachable)
    }

    pub fn nop(&mut self) -> ExprId {
        self.add(Expr::Nop, Type::None)
    }

    pub fn unreachable_(&mut self) -> ExprId {
        self.add(Expr::Unreachable, Type::Unreachable)
    }
}
