//! Peephole rules 5-8: instruction-level constant folding and identity removal.

use crate::instr::{BinOp, CvtOp, Instr, StoreKind, UnOp};
use crate::types::MachineType;

/// Rule 5: folds `const a; <cvt>` and `const a; const b; <binop>` sequences into a single
/// constant, and fuses `const a; +/-; const b; +/-` additive chains into one constant plus one
/// operator, the same way [`crate::simplify`]'s rule 3 re-associates at the tree level.
///
/// Instruction-level constants are already fixed-width (`i32`/`i64`), so folding here uses plain
/// wrapping arithmetic -- matching WebAssembly's own wraparound semantics -- rather than the
/// arbitrary-precision path the tree-level literal folder needs for unbounded source literals.
pub fn fold_instruction_arithmetic(instrs: &mut Vec<Instr>) -> bool {
    let mut changed = false;
    changed |= fold_unary_cvt(instrs);
    changed |= fold_binary_pair(instrs);
    changed |= fuse_additive_chain(instrs);
    changed
}

fn fold_unary_cvt(instrs: &mut Vec<Instr>) -> bool {
    let mut i = 0;
    let mut changed = false;
    while i + 1 < instrs.len() {
        let folded = match (&instrs[i], &instrs[i + 1]) {
            (Instr::I32Const(v), Instr::Cvt(CvtOp::Extend32 { signed })) => Some(if *signed {
                Instr::I64Const(*v as i64)
            } else {
                Instr::I64Const(*v as u32 as i64)
            }),
            (Instr::F64Const(v), Instr::Cvt(CvtOp::Demote64)) => Some(Instr::F32Const(*v as f32)),
            _ => None,
        };
        if let Some(folded) = folded {
            instrs.splice(i..i + 2, [folded]);
            changed = true;
            continue;
        }
        i += 1;
    }
    changed
}

fn int_value(instr: &Instr) -> Option<i64> {
    match instr {
        Instr::I32Const(v) => Some(*v as i64),
        Instr::I64Const(v) => Some(*v),
        _ => None,
    }
}

fn rebuild_const(machine: MachineType, value: i64) -> Instr {
    match machine {
        MachineType::I32 => Instr::I32Const(value as i32),
        MachineType::I64 => Instr::I64Const(value),
        MachineType::F32 | MachineType::F64 => unreachable!("integer binop never targets a float machine type"),
    }
}

fn eval_int_binop(op: BinOp, machine: MachineType, a: i64, b: i64) -> Option<i64> {
    Some(match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::And => a & b,
        BinOp::Or => a | b,
        BinOp::Xor => a ^ b,
        BinOp::Shl => {
            let bits = machine.bit_width();
            a.wrapping_shl((b as u32) % bits)
        }
        BinOp::Shr(signedness) => {
            let bits = machine.bit_width();
            let amount = (b as u32) % bits;
            match signedness {
                crate::instr::Signedness::Signed => a.wrapping_shr(amount),
                _ => {
                    if bits == 32 {
                        ((a as u32).wrapping_shr(amount)) as i64
                    } else {
                        ((a as u64).wrapping_shr(amount)) as i64
                    }
                }
            }
        }
        _ => return None,
    })
}

/// `const a; const b; <binop>` folds to a single constant for the recognized integer binary
/// operators.
fn fold_binary_pair(instrs: &mut Vec<Instr>) -> bool {
    let mut i = 0;
    let mut changed = false;
    while i + 2 < instrs.len() {
        if let Instr::BinOp(op, machine) = &instrs[i + 2] {
            let (op, machine) = (*op, *machine);
            if let (Some(a), Some(b)) = (int_value(&instrs[i]), int_value(&instrs[i + 1])) {
                if let Some(folded) = eval_int_binop(op, machine, a, b) {
                    instrs.splice(i..i + 3, [rebuild_const(machine, folded)]);
                    changed = true;
                    continue;
                }
            }
        }
        i += 1;
    }
    changed
}

/// `const a; +/-; const b; +/-` fuses the two constants, mirroring [`crate::simplify`]'s
/// additive re-association at the instruction level.
fn fuse_additive_chain(instrs: &mut Vec<Instr>) -> bool {
    let mut i = 0;
    let mut changed = false;
    while i + 3 < instrs.len() {
        let pattern = (&instrs[i], &instrs[i + 1], &instrs[i + 2], &instrs[i + 3]);
        if let (
            first_const,
            Instr::BinOp(op_a @ (BinOp::Add | BinOp::Sub), machine_a),
            second_const,
            Instr::BinOp(op_b @ (BinOp::Add | BinOp::Sub), machine_b),
        ) = pattern
        {
            if machine_a == machine_b {
                if let (Some(a), Some(b)) = (int_value(first_const), int_value(second_const)) {
                    let combine_op = if op_a == op_b { BinOp::Add } else { BinOp::Sub };
                    let folded = match combine_op {
                        BinOp::Add => a.wrapping_add(b),
                        _ => a.wrapping_sub(b),
                    };
                    instrs.splice(
                        i..i + 4,
                        [rebuild_const(*machine_a, folded), Instr::BinOp(*op_a, *machine_a)],
                    );
                    changed = true;
                    continue;
                }
            }
        }
        i += 1;
    }
    changed
}

/// Rule 6: `const 0; add/sub` and `const 1; mul/div` are removed (the operation is a no-op given
/// the value already on the stack beneath the constant).
pub fn identity_removal(instrs: &mut Vec<Instr>) -> bool {
    let mut i = 0;
    let mut changed = false;
    while i + 1 < instrs.len() {
        let remove = match (&instrs[i], &instrs[i + 1]) {
            (c, Instr::BinOp(BinOp::Add | BinOp::Sub, _)) => is_const_value(c, 0),
            (c, Instr::BinOp(BinOp::Mul, _)) => is_const_value(c, 1),
            (c, Instr::BinOp(BinOp::Div(_), _)) => is_const_value(c, 1),
            _ => false,
        };
        if remove {
            instrs.splice(i..i + 2, []);
            changed = true;
            continue;
        }
        i += 1;
    }
    changed
}

fn is_const_value(instr: &Instr, value: i64) -> bool {
    match instr {
        Instr::I32Const(v) => *v as i64 == value,
        Instr::I64Const(v) => *v == value,
        Instr::F32Const(v) => *v as f64 == value as f64,
        Instr::F64Const(v) => *v == value as f64,
        _ => false,
    }
}

/// Rule 7: `const c; eqz; eqz` reduces to `const (c != 0 ? 1 : 0)`.
pub fn double_eqz(instrs: &mut Vec<Instr>) -> bool {
    let mut i = 0;
    let mut changed = false;
    while i + 2 < instrs.len() {
        if let (c, Instr::UnOp(UnOp::Eqz, _), Instr::UnOp(UnOp::Eqz, _)) =
            (&instrs[i], &instrs[i + 1], &instrs[i + 2])
        {
            let nonzero = !is_const_value(c, 0);
            instrs.splice(i..i + 3, [Instr::I32Const(nonzero as i32)]);
            changed = true;
            continue;
        }
        i += 1;
    }
    changed
}

/// Rule 8: `const 0xff; and; store8` / `const 0xffff; and; store16` drop the mask pair; the
/// narrow store already truncates to the same width.
pub fn integer_cast_absorption(instrs: &mut Vec<Instr>) -> bool {
    let mut i = 0;
    let mut changed = false;
    while i + 2 < instrs.len() {
        let mask = int_value(&instrs[i]);
        let is_and = matches!(instrs[i + 1], Instr::BinOp(BinOp::And, _));
        let drop = match (&instrs[i + 2], mask) {
            (Instr::Store { kind: StoreKind::I32_8, .. }, Some(0xFF)) => is_and,
            (Instr::Store { kind: StoreKind::I32_16, .. }, Some(0xFFFF)) => is_and,
            _ => false,
        };
        if drop {
            instrs.splice(i..i + 2, []);
            changed = true;
            continue;
        }
        i += 1;
    }
    changed
}
