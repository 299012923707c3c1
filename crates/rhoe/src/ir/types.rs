//! Value types, literals, and the operator tables.
//!
//! These enums mirror the WebAssembly instruction set of the binary format
//! version 1, plus the sign-extension operators. Comparison operators carry
//! an `operand_type` alongside the usual `result_type` because the DataFlow
//! side types comparisons by their operand width (the semantic one-bit
//! result is tracked separately).

use std::fmt;

/// Static type of an expression.
///
/// `None` is the type of expressions that produce no value (stores, drops,
/// most control flow). `Unreachable` marks a subtree whose execution cannot
/// complete; the binary writer adapts its emission around such subtrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    I32,
    I64,
    F32,
    F64,
    None,
    Unreachable,
}

impl Type {
    /// True for the two integer value types the DataFlow IR tracks.
    pub fn is_integer(&self) -> bool {
        matches!(self, Type::I32 | Type::I64)
    }

    /// True for the four value types (anything a local or operand can have).
    pub fn is_concrete(&self) -> bool {
        matches!(self, Type::I32 | Type::I64 | Type::F32 | Type::F64)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::I32 => write!(f, "i32"),
            Type::I64 => write!(f, "i64"),
            Type::F32 => write!(f, "f32"),
            Type::F64 => write!(f, "f64"),
            Type::None => write!(f, "none"),
            Type::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Constant value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Literal {
    /// Returns the value type of this constant.
    pub fn ty(&self) -> Type {
        match self {
            Literal::I32(_) => Type::I32,
            Literal::I64(_) => Type::I64,
            Literal::F32(_) => Type::F32,
            Literal::F64(_) => Type::F64,
        }
    }

    /// The zero value of a concrete type.
    ///
    /// Panics on `None`/`Unreachable`; those are not value types and can
    /// never be the declared type of a local.
    pub fn zero(ty: Type) -> Literal {
        match ty {
            Type::I32 => Literal::I32(0),
            Type::I64 => Literal::I64(0),
            Type::F32 => Literal::F32(0.0),
            Type::F64 => Literal::F64(0.0),
            Type::None | Type::Unreachable => panic!("no zero literal for type {}", ty),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::I32(v) => write!(f, "i32.const {}", v),
            Literal::I64(v) => write!(f, "i64.const {}", v),
            Literal::F32(v) => write!(f, "f32.const {}", v),
            Literal::F64(v) => write!(f, "f64.const {}", v),
        }
    }
}

/// Unary operations, including conversions and sign extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    // i32 unary
    I32Clz,
    I32Ctz,
    I32Popcnt,
    I32Eqz,

    // i64 unary
    I64Clz,
    I64Ctz,
    I64Popcnt,
    I64Eqz,

    // f32 unary
    F32Abs,
    F32Neg,
    F32Ceil,
    F32Floor,
    F32Trunc,
    F32Nearest,
    F32Sqrt,

    // f64 unary
    F64Abs,
    F64Neg,
    F64Ceil,
    F64Floor,
    F64Trunc,
    F64Nearest,
    F64Sqrt,

    // Sign extension within a width
    I32Extend8S,
    I32Extend16S,
    I64Extend8S,
    I64Extend16S,
    I64Extend32S,

    // Conversions: integer truncation/extension
    I32WrapI64,
    I64ExtendI32S,
    I64ExtendI32U,

    // Conversions: float → integer (trapping on NaN/overflow)
    I32TruncF32S,
    I32TruncF32U,
    I32TruncF64S,
    I32TruncF64U,
    I64TruncF32S,
    I64TruncF32U,
    I64TruncF64S,
    I64TruncF64U,

    // Conversions: integer → float
    F32ConvertI32S,
    F32ConvertI32U,
    F32ConvertI64S,
    F32ConvertI64U,
    F64ConvertI32S,
    F64ConvertI32U,
    F64ConvertI64S,
    F64ConvertI64U,

    // Conversions: float precision
    F32DemoteF64,
    F64PromoteF32,

    // Reinterpretations (bitcast)
    I32ReinterpretF32,
    I64ReinterpretF64,
    F32ReinterpretI32,
    F64ReinterpretI64,
}

impl UnaryOp {
    /// Returns the value type produced by this operation.
    ///
    /// Note: `I64Eqz` returns i32 (0 or 1), not i64.
    pub fn result_type(&self) -> Type {
        use UnaryOp::*;
        match self {
            I32Clz | I32Ctz | I32Popcnt | I32Eqz | I64Eqz => Type::I32,
            I64Clz | I64Ctz | I64Popcnt => Type::I64,

            F32Abs | F32Neg | F32Ceil | F32Floor | F32Trunc | F32Nearest | F32Sqrt => Type::F32,
            F64Abs | F64Neg | F64Ceil | F64Floor | F64Trunc | F64Nearest | F64Sqrt => Type::F64,

            I32Extend8S | I32Extend16S => Type::I32,
            I64Extend8S | I64Extend16S | I64Extend32S => Type::I64,

            I32WrapI64 | I32TruncF32S | I32TruncF32U | I32TruncF64S | I32TruncF64U
            | I32ReinterpretF32 => Type::I32,

            I64ExtendI32S | I64ExtendI32U | I64TruncF32S | I64TruncF32U | I64TruncF64S
            | I64TruncF64U | I64ReinterpretF64 => Type::I64,

            F32ConvertI32S | F32ConvertI32U | F32ConvertI64S | F32ConvertI64U | F32DemoteF64
            | F32ReinterpretI32 => Type::F32,

            F64ConvertI32S | F64ConvertI32U | F64ConvertI64S | F64ConvertI64U | F64PromoteF32
            | F64ReinterpretI64 => Type::F64,
        }
    }
}

/// Binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // i32 operations
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32DivU,
    I32RemS,
    I32RemU,
    I32And,
    I32Or,
    I32Xor,
    I32Shl,
    I32ShrS,
    I32ShrU,
    I32Rotl,
    I32Rotr,

    // i32 comparisons
    I32Eq,
    I32Ne,
    I32LtS,
    I32LtU,
    I32GtS,
    I32GtU,
    I32LeS,
    I32LeU,
    I32GeS,
    I32GeU,

    // i64 operations
    I64Add,
    I64Sub,
    I64Mul,
    I64DivS,
    I64DivU,
    I64RemS,
    I64RemU,
    I64And,
    I64Or,
    I64Xor,
    I64Shl,
    I64ShrS,
    I64ShrU,
    I64Rotl,
    I64Rotr,

    // i64 comparisons
    I64Eq,
    I64Ne,
    I64LtS,
    I64LtU,
    I64GtS,
    I64GtU,
    I64LeS,
    I64LeU,
    I64GeS,
    I64GeU,

    // f32 operations
    F32Add,
    F32Sub,
    F32Mul,
    F32Div,
    F32Min,
    F32Max,
    F32Copysign,

    // f32 comparisons
    F32Eq,
    F32Ne,
    F32Lt,
    F32Gt,
    F32Le,
    F32Ge,

    // f64 operations
    F64Add,
    F64Sub,
    F64Mul,
    F64Div,
    F64Min,
    F64Max,
    F64Copysign,

    // f64 comparisons
    F64Eq,
    F64Ne,
    F64Lt,
    F64Gt,
    F64Le,
    F64Ge,
}

impl BinaryOp {
    /// Returns the value type produced by this operation.
    ///
    /// All comparisons return i32 (0 or 1), even over i64/f32/f64 operands.
    pub fn result_type(&self) -> Type {
        use BinaryOp::*;
        match self {
            I32Add | I32Sub | I32Mul | I32DivS | I32DivU | I32RemS | I32RemU | I32And | I32Or
            | I32Xor | I32Shl | I32ShrS | I32ShrU | I32Rotl | I32Rotr => Type::I32,

            I64Add | I64Sub | I64Mul | I64DivS | I64DivU | I64RemS | I64RemU | I64And | I64Or
            | I64Xor | I64Shl | I64ShrS | I64ShrU | I64Rotl | I64Rotr => Type::I64,

            F32Add | F32Sub | F32Mul | F32Div | F32Min | F32Max | F32Copysign => Type::F32,
            F64Add | F64Sub | F64Mul | F64Div | F64Min | F64Max | F64Copysign => Type::F64,

            // Every comparison produces an i32
            I32Eq | I32Ne | I32LtS | I32LtU | I32GtS | I32GtU | I32LeS | I32LeU | I32GeS
            | I32GeU | I64Eq | I64Ne | I64LtS | I64LtU | I64GtS | I64GtU | I64LeS | I64LeU
            | I64GeS | I64GeU | F32Eq | F32Ne | F32Lt | F32Gt | F32Le | F32Ge | F64Eq | F64Ne
            | F64Lt | F64Gt | F64Le | F64Ge => Type::I32,
        }
    }

    /// Returns the value type this operation consumes.
    ///
    /// Differs from [`result_type`](Self::result_type) only for comparisons.
    pub fn operand_type(&self) -> Type {
        use BinaryOp::*;
        match self {
            I32Eq | I32Ne | I32LtS | I32LtU | I32GtS | I32GtU | I32LeS | I32LeU | I32GeS
            | I32GeU => Type::I32,
            I64Eq | I64Ne | I64LtS | I64LtU | I64GtS | I64GtU | I64LeS | I64LeU | I64GeS
            | I64GeU => Type::I64,
            F32Eq | F32Ne | F32Lt | F32Gt | F32Le | F32Ge => Type::F32,
            F64Eq | F64Ne | F64Lt | F64Gt | F64Le | F64Ge => Type::F64,
            _ => self.result_type(),
        }
    }

    /// True for the integer comparisons that survive Gt/Ge normalization:
    /// `Eq, Ne, LtS, LtU, LeS, LeU` over i32 or i64.
    pub fn is_normalized_int_comparison(&self) -> bool {
        use BinaryOp::*;
        matches!(
            self,
            I32Eq
                | I32Ne
                | I32LtS
                | I32LtU
                | I32LeS
                | I32LeU
                | I64Eq
                | I64Ne
                | I64LtS
                | I64LtU
                | I64LeS
                | I64LeU
        )
    }

    /// For the redundant greater-than flavors, the opposite comparison with
    /// the same signedness: `a Gt b` becomes `b Lt a` and `a Ge b` becomes
    /// `b Le a`. Returns `None` for every other operator.
    pub fn swapped_comparison(&self) -> Option<BinaryOp> {
        use BinaryOp::*;
        match self {
            I32GtS => Some(I32LtS),
            I32GtU => Some(I32LtU),
            I32GeS => Some(I32LeS),
            I32GeU => Some(I32LeU),
            I64GtS => Some(I64LtS),
            I64GtU => Some(I64LtU),
            I64GeS => Some(I64LeS),
            I64GeU => Some(I64LeU),
            _ => None,
        }
    }
}

/// Atomic read-modify-write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicRmwOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Xchg,
}

/// Host environment operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOp {
    CurrentMemory,
    GrowMemory,
}
