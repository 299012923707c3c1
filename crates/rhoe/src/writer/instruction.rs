//! Opcode selection: source operators to `wasm_encoder` instructions.
//!
//! Loads, stores, and atomics pick their opcode from the cross product of
//! value type, access byte width, sign flavor, and atomic prefixing; the
//! plain unary/binary tables are one-to-one. Anything outside the binary
//! format's cross product (an f32 store of 2 bytes, say) is a malformed
//! tree and surfaces as an error.

use anyhow::{bail, Result};
use wasm_encoder::{BlockType, Instruction, MemArg, ValType};

use crate::ir::{AtomicRmwOp, BinaryOp, Type, UnaryOp};

/// Concrete value type for locals and block results.
pub(super) fn val_type(ty: Type) -> Result<ValType> {
    match ty {
        Type::I32 => Ok(ValType::I32),
        Type::I64 => Ok(ValType::I64),
        Type::F32 => Ok(ValType::F32),
        Type::F64 => Ok(ValType::F64),
        Type::None | Type::Unreachable => bail!("no value type for {}", ty),
    }
}

/// Binary type byte for a structured construct. An unreachable-typed
/// construct is encoded as `none`; the writer compensates with explicit
/// `unreachable` opcodes around it.
pub(super) fn block_type(ty: Type) -> BlockType {
    match ty {
        Type::I32 => BlockType::Result(ValType::I32),
        Type::I64 => BlockType::Result(ValType::I64),
        Type::F32 => BlockType::Result(ValType::F32),
        Type::F64 => BlockType::Result(ValType::F64),
        Type::None | Type::Unreachable => BlockType::Empty,
    }
}

/// Memory immediates: alignment log2 (the access width is the default when
/// no alignment was given) and byte offset.
pub(super) fn mem_arg(align: u32, bytes: u8, offset: u32) -> MemArg {
    let align = if align > 0 { align } else { bytes as u32 };
    MemArg {
        offset: offset as u64,
        align: align.trailing_zeros(),
        memory_index: 0,
    }
}

pub(super) fn unary_instruction(op: UnaryOp) -> Instruction<'static> {
    use Instruction as I;
    match op {
        UnaryOp::I32Clz => I::I32Clz,
        UnaryOp::I32Ctz => I::I32Ctz,
        UnaryOp::I32Popcnt => I::I32Popcnt,
        UnaryOp::I32Eqz => I::I32Eqz,
        UnaryOp::I64Clz => I::I64Clz,
        UnaryOp::I64Ctz => I::I64Ctz,
        UnaryOp::I64Popcnt => I::I64Popcnt,
        UnaryOp::I64Eqz => I::I64Eqz,

        UnaryOp::F32Abs => I::F32Abs,
        UnaryOp::F32Neg => I::F32Neg,
        UnaryOp::F32Ceil => I::F32Ceil,
        UnaryOp::F32Floor => I::F32Floor,
        UnaryOp::F32Trunc => I::F32Trunc,
        UnaryOp::F32Nearest => I::F32Nearest,
        UnaryOp::F32Sqrt => I::F32Sqrt,
        UnaryOp::F64Abs => I::F64Abs,
        UnaryOp::F64Neg => I::F64Neg,
        UnaryOp::F64Ceil => I::F64Ceil,
        UnaryOp::F64Floor => I::F64Floor,
        UnaryOp::F64Trunc => I::F64Trunc,
        UnaryOp::F64Nearest => I::F64Nearest,
        UnaryOp::F64Sqrt => I::F64Sqrt,

        UnaryOp::I32Extend8S => I::I32Extend8S,
        UnaryOp::I32Extend16S => I::I32Extend16S,
        UnaryOp::I64Extend8S => I::I64Extend8S,
        UnaryOp::I64Extend16S => I::I64Extend16S,
        UnaryOp::I64Extend32S => I::I64Extend32S,

        UnaryOp::I32WrapI64 => I::I32WrapI64,
        UnaryOp::I64ExtendI32S => I::I64ExtendI32S,
        UnaryOp::I64ExtendI32U => I::I64ExtendI32U,

        UnaryOp::I32TruncF32S => I::I32TruncF32S,
        UnaryOp::I32TruncF32U => I::I32TruncF32U,
        UnaryOp::I32TruncF64S => I::I32TruncF64S,
        UnaryOp::I32TruncF64U => I::I32TruncF64U,
        UnaryOp::I64TruncF32S => I::I64TruncF32S,
        UnaryOp::I64TruncF32U => I::I64TruncF32U,
        UnaryOp::I64TruncF64S => I::I64TruncF64S,
        UnaryOp::I64TruncF64U => I::I64TruncF64U,

        UnaryOp::F32ConvertI32S => I::F32ConvertI32S,
        UnaryOp::F32ConvertI32U => I::F32ConvertI32U,
        UnaryOp::F32ConvertI64S => I::F32ConvertI64S,
        UnaryOp::F32ConvertI64U => I::F32ConvertI64U,
        UnaryOp::F64ConvertI32S => I::F64ConvertI32S,
        UnaryOp::F64ConvertI32U => I::F64ConvertI32U,
        UnaryOp::F64ConvertI64S => I::F64ConvertI64S,
        UnaryOp::F64ConvertI64U => I::F64ConvertI64U,

        UnaryOp::F32DemoteF64 => I::F32DemoteF64,
        UnaryOp::F64PromoteF32 => I::F64PromoteF32,

        UnaryOp::I32ReinterpretF32 => I::I32ReinterpretF32,
        UnaryOp::I64ReinterpretF64 => I::I64ReinterpretF64,
        UnaryOp::F32ReinterpretI32 => I::F32ReinterpretI32,
        UnaryOp::F64ReinterpretI64 => I::F64ReinterpretI64,
    }
}

pub(super) fn binary_instruction(op: BinaryOp) -> Instruction<'static> {
    use Instruction as I;
    match op {
        BinaryOp::I32Add => I::I32Add,
        BinaryOp::I32Sub => I::I32Sub,
        BinaryOp::I32Mul => I::I32Mul,
        BinaryOp::I32DivS => I::I32DivS,
        BinaryOp::I32DivU => I::I32DivU,
        BinaryOp::I32RemS => I::I32RemS,
        BinaryOp::I32RemU => I::I32RemU,
        BinaryOp::I32And => I::I32And,
        BinaryOp::I32Or => I::I32Or,
        BinaryOp::I32Xor => I::I32Xor,
        BinaryOp::I32Shl => I::I32Shl,
        BinaryOp::I32ShrS => I::I32ShrS,
        BinaryOp::I32ShrU => I::I32ShrU,
        BinaryOp::I32Rotl => I::I32Rotl,
        BinaryOp::I32Rotr => I::I32Rotr,
        BinaryOp::I32Eq => I::I32Eq,
        BinaryOp::I32Ne => I::I32Ne,
        BinaryOp::I32LtS => I::I32LtS,
        BinaryOp::I32LtU => I::I32LtU,
        BinaryOp::I32GtS => I::I32GtS,
        BinaryOp::I32GtU => I::I32GtU,
        BinaryOp::I32LeS => I::I32LeS,
        BinaryOp::I32LeU => I::I32LeU,
        BinaryOp::I32GeS => I::I32GeS,
        BinaryOp::I32GeU => I::I32GeU,

        BinaryOp::I64Add => I::I64Add,
        BinaryOp::I64Sub => I::I64Sub,
        BinaryOp::I64Mul => I::I64Mul,
        BinaryOp::I64DivS => I::I64DivS,
        BinaryOp::I64DivU => I::I64DivU,
        BinaryOp::I64RemS => I::I64RemS,
        BinaryOp::I64RemU => I::I64RemU,
        BinaryOp::I64And => I::I64And,
        BinaryOp::I64Or => I::I64Or,
        BinaryOp::I64Xor => I::I64Xor,
        BinaryOp::I64Shl => I::I64Shl,
        BinaryOp::I64ShrS => I::I64ShrS,
        BinaryOp::I64ShrU => I::I64ShrU,
        BinaryOp::I64Rotl => I::I64Rotl,
        BinaryOp::I64Rotr => I::I64Rotr,
        BinaryOp::I64Eq => I::I64Eq,
        BinaryOp::I64Ne => I::I64Ne,
        BinaryOp::I64LtS => I::I64LtS,
        BinaryOp::I64LtU => I::I64LtU,
        BinaryOp::I64GtS => I::I64GtS,
        BinaryOp::I64GtU => I::I64GtU,
        BinaryOp::I64LeS => I::I64LeS,
        BinaryOp::I64LeU => I::I64LeU,
        BinaryOp::I64GeS => I::I64GeS,
        BinaryOp::I64GeU => I::I64GeU,

        BinaryOp::F32Add => I::F32Add,
        BinaryOp::F32Sub => I::F32Sub,
        BinaryOp::F32Mul => I::F32Mul,
        BinaryOp::F32Div => I::F32Div,
        BinaryOp::F32Min => I::F32Min,
        BinaryOp::F32Max => I::F32Max,
        BinaryOp::F32Copysign => I::F32Copysign,
        BinaryOp::F32Eq => I::F32Eq,
        BinaryOp::F32Ne => I::F32Ne,
        BinaryOp::F32Lt => I::F32Lt,
        BinaryOp::F32Gt => I::F32Gt,
        BinaryOp::F32Le => I::F32Le,
        BinaryOp::F32Ge => I::F32Ge,

        BinaryOp::F64Add => I::F64Add,
        BinaryOp::F64Sub => I::F64Sub,
        BinaryOp::F64Mul => I::F64Mul,
        BinaryOp::F64Div => I::F64Div,
        BinaryOp::F64Min => I::F64Min,
        BinaryOp::F64Max => I::F64Max,
        BinaryOp::F64Copysign => I::F64Copysign,
        BinaryOp::F64Eq => I::F64Eq,
        BinaryOp::F64Ne => I::F64Ne,
        BinaryOp::F64Lt => I::F64Lt,
        BinaryOp::F64Gt => I::F64Gt,
        BinaryOp::F64Le => I::F64Le,
        BinaryOp::F64Ge => I::F64Ge,
    }
}

pub(super) fn load_instruction(
    ty: Type,
    bytes: u8,
    signed: bool,
    atomic: bool,
    memarg: MemArg,
) -> Result<Instruction<'static>> {
    use Instruction as I;
    if !atomic {
        return Ok(match (ty, bytes) {
            (Type::I32, 1) if signed => I::I32Load8S(memarg),
            (Type::I32, 1) => I::I32Load8U(memarg),
            (Type::I32, 2) if signed => I::I32Load16S(memarg),
            (Type::I32, 2) => I::I32Load16U(memarg),
            (Type::I32, 4) => I::I32Load(memarg),
            (Type::I64, 1) if signed => I::I64Load8S(memarg),
            (Type::I64, 1) => I::I64Load8U(memarg),
            (Type::I64, 2) if signed => I::I64Load16S(memarg),
            (Type::I64, 2) => I::I64Load16U(memarg),
            (Type::I64, 4) if signed => I::I64Load32S(memarg),
            (Type::I64, 4) => I::I64Load32U(memarg),
            (Type::I64, 8) => I::I64Load(memarg),
            (Type::F32, _) => I::F32Load(memarg),
            (Type::F64, _) => I::F64Load(memarg),
            _ => bail!("invalid load: {} bytes as {}", bytes, ty),
        });
    }
    Ok(match (ty, bytes) {
        (Type::I32, 1) => I::I32AtomicLoad8U(memarg),
        (Type::I32, 2) => I::I32AtomicLoad16U(memarg),
        (Type::I32, 4) => I::I32AtomicLoad(memarg),
        (Type::I64, 1) => I::I64AtomicLoad8U(memarg),
        (Type::I64, 2) => I::I64AtomicLoad16U(memarg),
        (Type::I64, 4) => I::I64AtomicLoad32U(memarg),
        (Type::I64, 8) => I::I64AtomicLoad(memarg),
        _ => bail!("invalid atomic load: {} bytes as {}", bytes, ty),
    })
}

pub(super) fn store_instruction(
    value_type: Type,
    bytes: u8,
    atomic: bool,
    memarg: MemArg,
) -> Result<Instruction<'static>> {
    use Instruction as I;
    if !atomic {
        return Ok(match (value_type, bytes) {
            (Type::I32, 1) => I::I32Store8(memarg),
            (Type::I32, 2) => I::I32Store16(memarg),
            (Type::I32, 4) => I::I32Store(memarg),
            (Type::I64, 1) => I::I64Store8(memarg),
            (Type::I64, 2) => I::I64Store16(memarg),
            (Type::I64, 4) => I::I64Store32(memarg),
            (Type::I64, 8) => I::I64Store(memarg),
            (Type::F32, _) => I::F32Store(memarg),
            (Type::F64, _) => I::F64Store(memarg),
            _ => bail!("invalid store: {} bytes of {}", bytes, value_type),
        });
    }
    Ok(match (value_type, bytes) {
        (Type::I32, 1) => I::I32AtomicStore8(memarg),
        (Type::I32, 2) => I::I32AtomicStore16(memarg),
        (Type::I32, 4) => I::I32AtomicStore(memarg),
        (Type::I64, 1) => I::I64AtomicStore8(memarg),
        (Type::I64, 2) => I::I64AtomicStore16(memarg),
        (Type::I64, 4) => I::I64AtomicStore32(memarg),
        (Type::I64, 8) => I::I64AtomicStore(memarg),
        _ => bail!("invalid atomic store: {} bytes of {}", bytes, value_type),
    })
}

pub(super) fn rmw_instruction(
    op: AtomicRmwOp,
    ty: Type,
    bytes: u8,
    memarg: MemArg,
) -> Result<Instruction<'static>> {
    use Instruction as I;
    Ok(match (op, ty, bytes) {
        (AtomicRmwOp::Add, Type::I32, 1) => I::I32AtomicRmw8AddU(memarg),
        (AtomicRmwOp::Add, Type::I32, 2) => I::I32AtomicRmw16AddU(memarg),
        (AtomicRmwOp::Add, Type::I32, 4) => I::I32AtomicRmwAdd(memarg),
        (AtomicRmwOp::Add, Type::I64, 1) => I::I64AtomicRmw8AddU(memarg),
        (AtomicRmwOp::Add, Type::I64, 2) => I::I64AtomicRmw16AddU(memarg),
        (AtomicRmwOp::Add, Type::I64, 4) => I::I64AtomicRmw32AddU(memarg),
        (AtomicRmwOp::Add, Type::I64, 8) => I::I64AtomicRmwAdd(memarg),

        (AtomicRmwOp::Sub, Type::I32, 1) => I::I32AtomicRmw8SubU(memarg),
        (AtomicRmwOp::Sub, Type::I32, 2) => I::I32AtomicRmw16SubU(memarg),
        (AtomicRmwOp::Sub, Type::I32, 4) => I::I32AtomicRmwSub(memarg),
        (AtomicRmwOp::Sub, Type::I64, 1) => I::I64AtomicRmw8SubU(memarg),
        (AtomicRmwOp::Sub, Type::I64, 2) => I::I64AtomicRmw16SubU(memarg),
        (AtomicRmwOp::Sub, Type::I64, 4) => I::I64AtomicRmw32SubU(memarg),
        (AtomicRmwOp::Sub, Type::I64, 8) => I::I64AtomicRmwSub(memarg),

        (AtomicRmwOp::And, Type::I32, 1) => I::I32AtomicRmw8AndU(memarg),
        (AtomicRmwOp::And, Type::I32, 2) => I::I32AtomicRmw16AndU(memarg),
        (AtomicRmwOp::And, Type::I32, 4) => I::I32AtomicRmwAnd(memarg),
        (AtomicRmwOp::And, Type::I64, 1) => I::I64AtomicRmw8AndU(memarg),
        (AtomicRmwOp::And, Type::I64, 2) => I::I64AtomicRmw16AndU(memarg),
        (AtomicRmwOp::And, Type::I64, 4) => I::I64AtomicRmw32AndU(memarg),
        (AtomicRmwOp::And, Type::I64, 8) => I::I64AtomicRmwAnd(memarg),

        (AtomicRmwOp::Or, Type::I32, 1) => I::I32AtomicRmw8OrU(memarg),
        (AtomicRmwOp::Or, Type::I32, 2) => I::I32AtomicRmw16OrU(memarg),
        (AtomicRmwOp::Or, Type::I32, 4) => I::I32AtomicRmwOr(memarg),
        (AtomicRmwOp::Or, Type::I64, 1) => I::I64AtomicRmw8OrU(memarg),
        (AtomicRmwOp::Or, Type::I64, 2) => I::I64AtomicRmw16OrU(memarg),
        (AtomicRmwOp::Or, Type::I64, 4) => I::I64AtomicRmw32OrU(memarg),
        (AtomicRmwOp::Or, Type::I64, 8) => I::I64AtomicRmwOr(memarg),

        (AtomicRmwOp::Xor, Type::I32, 1) => I::I32AtomicRmw8XorU(memarg),
        (AtomicRmwOp::Xor, Type::I32, 2) => I::I32AtomicRmw16XorU(memarg),
        (AtomicRmwOp::Xor, Type::I32, 4) => I::I32AtomicRmwXor(memarg),
        (AtomicRmwOp::Xor, Type::I64, 1) => I::I64AtomicRmw8XorU(memarg),
        (AtomicRmwOp::Xor, Type::I64, 2) => I::I64AtomicRmw16XorU(memarg),
        (AtomicRmwOp::Xor, Type::I64, 4) => I::I64AtomicRmw32XorU(memarg),
        (AtomicRmwOp::Xor, Type::I64, 8) => I::I64AtomicRmwXor(memarg),

        (AtomicRmwOp::Xchg, Type::I32, 1) => I::I32AtomicRmw8XchgU(memarg),
        (AtomicRmwOp::Xchg, Type::I32, 2) => I::I32AtomicRmw16XchgU(memarg),
        (AtomicRmwOp::Xchg, Type::I32, 4) => I::I32AtomicRmwXchg(memarg),
        (AtomicRmwOp::Xchg, Type::I64, 1) => I::I64AtomicRmw8XchgU(memarg),
        (AtomicRmwOp::Xchg, Type::I64, 2) => I::I64AtomicRmw16XchgU(memarg),
        (AtomicRmwOp::Xchg, Type::I64, 4) => I::I64AtomicRmw32XchgU(memarg),
        (AtomicRmwOp::Xchg, Type::I64, 8) => I::I64AtomicRmwXchg(memarg),

        _ => bail!("invalid atomic rmw: {:?} over {} bytes as {}", op, bytes, ty),
    })
}

pub(super) fn cmpxchg_instruction(
    ty: Type,
    bytes: u8,
    memarg: MemArg,
) -> Result<Instruction<'static>> {
    use Instruction as I;
    Ok(match (ty, bytes) {
        (Type::I32, 1) => I::I32AtomicRmw8CmpxchgU(memarg),
        (Type::I32, 2) => I::I32AtomicRmw16CmpxchgU(memarg),
        (Type::I32, 4) => I::I32AtomicRmwCmpxchg(memarg),
        (Type::I64, 1) => I::I64AtomicRmw8CmpxchgU(memarg),
        (Type::I64, 2) => I::I64AtomicRmw16CmpxchgU(memarg),
        (Type::I64, 4) => I::I64AtomicRmw32CmpxchgU(memarg),
        (Type::I64, 8) => I::I64AtomicRmwCmpxchg(memarg),
        _ => bail!("invalid atomic cmpxchg: {} bytes as {}", bytes, ty),
    })
}
