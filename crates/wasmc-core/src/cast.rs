//! The canonical type cast / storage cast table and typed memory access.

use crate::builder::FunctionBuilder;
use crate::instr::{self, CvtOp, Instr, LoadKind, StoreKind};
use crate::literal::Literal;
use crate::types::{Intrinsic, MachineType, StorageType};

/// Emits the instruction sequence that converts a value already on the stack from `from` to
/// `to`.
///
/// Assumes a value of machine type `from.machine_type()` is on top of the operand stack;
/// leaves a value of machine type `to.machine_type()` in its place.
pub fn cast_value(builder: &mut FunctionBuilder, from: Intrinsic, to: Intrinsic) {
    if from == to {
        return;
    }

    let from_machine = from.machine_type();
    let to_machine = to.machine_type();

    // Same machine shape with only signedness differing (`i32<->u32`, `i64<->u64`) falls
    // straight through to `tighten_if_needed` below, which is a no-op unless `to` is an 8/16-bit
    // intrinsic -- that also covers `i8<->u8`/`i16<->u16`, where only the sign-extension
    // decision differs.
    match (from_machine, to_machine) {
        (MachineType::I64, MachineType::I32) => builder.push(Instr::Cvt(CvtOp::Wrap64)),
        (MachineType::I32, MachineType::I64) if from.is_integer() && to.is_integer() => {
            builder.push(Instr::Cvt(CvtOp::Extend32 {
                signed: to.is_signed(),
            }))
        }
        (from_m, MachineType::F32) if from.is_integer() && to.is_float() => {
            builder.push(Instr::Cvt(CvtOp::Convert {
                from: from_m,
                signed: from.is_signed(),
            }));
            return;
        }
        (from_m, MachineType::F64) if from.is_integer() && to.is_float() => {
            builder.push(Instr::Cvt(CvtOp::Convert {
                from: from_m,
                signed: from.is_signed(),
            }));
            return;
        }
        (MachineType::F32, to_m) | (MachineType::F64, to_m)
            if from.is_float() && to.is_integer() =>
        {
            let _ = to_m;
            builder.push(Instr::Cvt(CvtOp::Trunc {
                signed: to.is_signed(),
            }));
        }
        (MachineType::F32, MachineType::F64) => builder.push(Instr::Cvt(CvtOp::Promote32)),
        (MachineType::F64, MachineType::F32) => builder.push(Instr::Cvt(CvtOp::Demote64)),
        _ => {}
    }

    tighten_if_needed(builder, to);
}

/// Produces a 32-bit value by the rules above, then tightens it to an 8/16-bit representation
/// by masking and, if the target is signed, sign-extending.
fn tighten_if_needed(builder: &mut FunctionBuilder, to: Intrinsic) {
    if !to.is_sub_word() {
        return;
    }
    let bits = to.bit_width();
    builder.push(Instr::AndMask { bits });
    if to.is_signed() {
        builder.push(Instr::SignExtendNarrow { bits });
    }
}

/// `true` when `value` is a literal provably within `target`'s representable range, letting the
/// tightening pass be skipped at compile time.
pub fn literal_fits(value: &Literal, target: Intrinsic) -> bool {
    let Literal::Int(i) = value else { return false };
    let bits = target.bit_width();
    if target.is_signed() {
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << (bits - 1)) - 1;
        *i >= min && *i <= max
    } else {
        let max = (1i64 << bits) - 1;
        *i >= 0 && *i <= max
    }
}

/// The storage-cast variant used for initializers and assignments: additionally accepts a pointer or any non-float intrinsic when storing to a pointer,
/// and narrows 64-bit integers via `wrap64` before storage.
///
/// `false` means the source and target shapes are incompatible (a float value stored to a
/// pointer, or a target with no machine representation); the caller reports `Code::W141` and
/// leaves the declaration out rather than emitting a cast that can't be expressed.
pub fn storage_cast(builder: &mut FunctionBuilder, from: Intrinsic, to: &StorageType) -> bool {
    match to.as_intrinsic() {
        Some(to) => {
            cast_value(builder, from, to);
            true
        }
        None if to.is_pointer() => {
            if from.is_float() {
                return false;
            }
            if from.machine_type() == MachineType::I64 {
                builder.push(Instr::Cvt(CvtOp::Wrap64));
            }
            true
        }
        None => false,
    }
}

/// Determines the [`LoadKind`] for reading a memory variable of the given intrinsic type.
pub fn load_kind_for(intrinsic: Intrinsic) -> LoadKind {
    match intrinsic {
        Intrinsic::I32 | Intrinsic::U32 => LoadKind::I32,
        Intrinsic::I64 | Intrinsic::U64 => LoadKind::I64,
        Intrinsic::F32 => LoadKind::F32,
        Intrinsic::F64 => LoadKind::F64,
        Intrinsic::I8 | Intrinsic::U8 => LoadKind::I32_8 {
            signed: intrinsic.is_signed(),
        },
        Intrinsic::I16 | Intrinsic::U16 => LoadKind::I32_16 {
            signed: intrinsic.is_signed(),
        },
    }
}

/// Determines the [`StoreKind`] for writing a memory variable of the given intrinsic type.
pub fn store_kind_for(intrinsic: Intrinsic) -> StoreKind {
    match intrinsic {
        Intrinsic::I32 | Intrinsic::U32 => StoreKind::I32,
        Intrinsic::I64 | Intrinsic::U64 => StoreKind::I64,
        Intrinsic::F32 => StoreKind::F32,
        Intrinsic::F64 => StoreKind::F64,
        Intrinsic::I8 | Intrinsic::U8 => StoreKind::I32_8,
        Intrinsic::I16 | Intrinsic::U16 => StoreKind::I32_16,
    }
}

/// Applies the canonical cast to a literal value at simplify-time.
///
/// Returns `None` when the cast would trap (float-to-integer out of range) so the caller leaves
/// the `TypeCast` node intact and defers to a runtime cast.
pub fn fold_cast(lit: &Literal, target: Intrinsic) -> Option<Literal> {
    if target.is_float() {
        return Some(Literal::Real(lit.as_f64()));
    }

    // Integer target.
    match lit {
        Literal::Real(r) => {
            if !r.is_finite() || r.trunc() != *r {
                return None;
            }
            fold_int_from_i128(*r as i128, target)
        }
        Literal::Int(i) => fold_int_from_i128(*i as i128, target),
        Literal::BigInt(b) => {
            if target.bit_width() == 64 {
                Some(if target.is_signed() {
                    Literal::Int(Literal::narrow_bigint_signed64(b))
                } else {
                    // Unsigned 64-bit values that don't fit in `i64`'s positive range are kept
                    // tagged `BigInt`.
                    Literal::BigInt(num_bigint::BigInt::from(Literal::narrow_bigint_unsigned64(
                        b,
                    )))
                })
            } else {
                let narrowed = Literal::narrow_bigint_signed64(b);
                fold_int_from_i128(narrowed as i128, target)
            }
        }
    }
}

fn fold_int_from_i128(value: i128, target: Intrinsic) -> Option<Literal> {
    let bits = target.bit_width();
    let mask: i128 = if bits == 64 { -1 } else { (1i128 << bits) - 1 };
    let truncated = value & mask;
    let result = if target.is_signed() && bits < 64 {
        let sign_bit = 1i128 << (bits - 1);
        if truncated & sign_bit != 0 {
            truncated - (1i128 << bits)
        } else {
            truncated
        }
    } else {
        truncated
    };

    if bits == 64 {
        Some(Literal::Int(value as i64))
    } else {
        Some(Literal::Int(result as i64))
    }
}

pub(crate) fn signedness(intrinsic: Intrinsic) -> instr::Signedness {
    instr::signedness(intrinsic)
}
