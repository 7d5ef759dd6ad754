//! A typed representation of the WebAssembly instructions this crate emits.
//!
//! Rather than an arena-indexed expression/statement split (useful when the output requires
//! naming shared subexpressions), this models a WebAssembly instruction *stream* directly as
//! one flat, linear instruction enum: an ordered `Vec<Instr>` is the right shape for that.

use crate::types::{Intrinsic, MachineType};

/// Index of a function-local variable (parameter, declared local, or compiler temporary) within
/// a function's local list.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(transparent)]
pub struct LocalId(pub u32);

impl std::fmt::Display for LocalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "$l{}", self.0)
    }
}

/// Index of a module-level global variable.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(transparent)]
pub struct GlobalId(pub u32);

impl std::fmt::Display for GlobalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "$g{}", self.0)
    }
}

/// A branch target label, assigned in source order as blocks are entered. Labels `br`/`br_if`
/// targets directly rather than indexing into a separate results table.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(transparent)]
pub struct Label(pub u32);

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "$L{}", self.0)
    }
}

/// The signed/unsigned variant of a comparison, division, remainder, or right-shift instruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Signedness {
    Signed,
    Unsigned,
    /// Neither operand ordering matters (float comparisons, `==`/`!=`).
    NotApplicable,
}

/// Unary numeric operators.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnOp {
    Eqz,
    Clz,
    Ctz,
    Popcnt,
    Abs,
    Neg,
    Floor,
    Ceil,
    Trunc,
    Nearest,
    Sqrt,
}

/// Binary numeric operators shared by the arithmetic, bitwise, shift, and comparison families.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div(Signedness),
    Rem(Signedness),
    And,
    Or,
    Xor,
    Shl,
    /// Right shift: signed for `>>` on a signed operand, unsigned for `>>>` or `>>` on
    /// unsigned operands.
    Shr(Signedness),
    Eq,
    Ne,
    Lt(Signedness),
    Le(Signedness),
    Gt(Signedness),
    Ge(Signedness),
    /// Two-argument `min`/`max` built-ins, float-only.
    Min,
    Max,
    CopySign,
}

/// A numeric conversion instruction (the canonical cast table).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CvtOp {
    /// `i64` -> `i32`, dropping the high bits.
    Wrap64,
    /// `i32` -> `i64`.
    Extend32 { signed: bool },
    /// integer -> float, from the given source machine type.
    Convert { from: MachineType, signed: bool },
    /// float -> integer, trapping on overflow (no `trunc_sat` saturation variants are modeled).
    Trunc { signed: bool },
    /// `f32` -> `f64`.
    Promote32,
    /// `f64` -> `f32`.
    Demote64,
}

/// The byte width and sign-extension behavior of a typed memory load.
///
/// No 64-bit-wide sub-word variant (`I64_8`/`I64_16`/`I64_32`) is modeled: every `Intrinsic`
/// that rides on `MachineType::I64` (`i64`/`u64`) is a full 64-bit value (`types::Intrinsic::
/// bit_width`), so `cast::load_kind_for` never needs one -- the sub-word intrinsics (`i8`/`u8`/
/// `i16`/`u16`) all ride on `MachineType::I32` instead.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadKind {
    I32,
    I64,
    F32,
    F64,
    /// Loads a sub-word value and zero/sign-extends it into an `i32`.
    I32_8 { signed: bool },
    I32_16 { signed: bool },
}

/// The byte width of a typed memory store. See [`LoadKind`] for why there is no 64-bit-wide
/// sub-word variant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StoreKind {
    I32,
    I64,
    F32,
    F64,
    I32_8,
    I32_16,
}

/// One instruction in a function body's emitted instruction list.
///
/// `If`/`Block`/`Loop` carry nested instruction lists directly, rather than a flat stream with
/// implicit matching `End` markers -- this makes the peephole optimizer's recursive descent
/// a straightforward tree walk.
#[derive(Clone, Debug)]
pub enum Instr {
    I32Const(i32),
    I64Const(i64),
    F32Const(f32),
    F64Const(f64),
    UnOp(UnOp, MachineType),
    BinOp(BinOp, MachineType),
    Cvt(CvtOp),
    /// Masks a 32-bit value down to 8 or 16 bits (the "tighten" step); `bits` is `8` or `16`.
    AndMask { bits: u32 },
    /// Sign-extends a tightened 8/16-bit value back out to 32 bits via `shl n; shr_s n`.
    SignExtendNarrow { bits: u32 },
    LocalGet(LocalId),
    LocalSet(LocalId),
    LocalTee(LocalId),
    GlobalGet(GlobalId),
    GlobalSet(GlobalId),
    Load {
        kind: LoadKind,
        offset: u32,
    },
    Store {
        kind: StoreKind,
        offset: u32,
    },
    Select,
    Drop,
    Br(Label),
    BrIf(Label),
    Return,
    Unreachable,
    If {
        then_branch: Vec<Instr>,
        else_branch: Vec<Instr>,
    },
    Block {
        label: Label,
        body: Vec<Instr>,
    },
    Loop {
        label: Label,
        body: Vec<Instr>,
    },
}

impl Instr {
    /// `true` for instructions that unconditionally transfer control and make everything
    /// syntactically following them in the same block dead.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Self::Return | Self::Br(_) | Self::Unreachable)
    }
}

/// Convenience constructor for an `Intrinsic`-typed constant, used by the emitter.
pub fn const_for_machine_type(ty: MachineType, value_i64: i64, value_f64: f64) -> Instr {
    match ty {
        MachineType::I32 => Instr::I32Const(value_i64 as i32),
        MachineType::I64 => Instr::I64Const(value_i64),
        MachineType::F32 => Instr::F32Const(value_f64 as f32),
        MachineType::F64 => Instr::F64Const(value_f64),
    }
}

pub(crate) fn signedness(intrinsic: Intrinsic) -> Signedness {
    if intrinsic.is_signed() {
        Signedness::Signed
    } else {
        Signedness::Unsigned
    }
}
