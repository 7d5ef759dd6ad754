//! Peephole rule 11: address-offset absorption into `load`/`store`.
//!
//! The `store` shape is `const k; add; (local_get|global_get); store`, folding the preceding
//! address arithmetic into the store's offset. A bare `load` that consumes the computed address
//! directly gets the same treatment: `i32.const 100; i32.const 8; i32.add; f64.load` folds to
//! `i32.const 100; f64.load offset=8`, with no intervening `local_get`/`global_get` since a load
//! has no value operand to push after the address. Both shapes are handled here.

use crate::instr::{BinOp, Instr};
use crate::types::MachineType;

/// Only unconditional, non-negative integer-constant offsets are absorbable; a negative `k` is left alone
/// rather than wrapped into a huge unsigned offset.
fn absorbable_offset(instrs: &[Instr], i: usize) -> Option<u32> {
    match (&instrs[i], &instrs[i + 1]) {
        (Instr::I32Const(k), Instr::BinOp(BinOp::Add, MachineType::I32)) if *k >= 0 => {
            Some(*k as u32)
        }
        _ => None,
    }
}

pub fn address_offset_absorption(instrs: &mut Vec<Instr>) -> bool {
    let mut changed = false;
    changed |= absorb_into_load(instrs);
    changed |= absorb_into_store(instrs);
    changed
}

/// `const k; add; load` becomes `load offset=k`.
fn absorb_into_load(instrs: &mut Vec<Instr>) -> bool {
    let mut i = 0;
    let mut changed = false;
    while i + 2 < instrs.len() {
        let Some(offset) = absorbable_offset(instrs, i) else {
            i += 1;
            continue;
        };
        if let Instr::Load {
            offset: existing, ..
        } = &mut instrs[i + 2]
        {
            *existing += offset;
            instrs.splice(i..i + 2, []);
            changed = true;
            continue;
        }
        i += 1;
    }
    changed
}

/// `const k; add; (local_get|global_get); store` becomes the same sequence without the
/// `const k; add` pair, with `k` installed into the `store`'s `offset` field.
fn absorb_into_store(instrs: &mut Vec<Instr>) -> bool {
    let mut i = 0;
    let mut changed = false;
    while i + 3 < instrs.len() {
        let Some(offset) = absorbable_offset(instrs, i) else {
            i += 1;
            continue;
        };

        let is_value_producer = matches!(instrs[i + 2], Instr::LocalGet(_) | Instr::GlobalGet(_));
        if !is_value_producer {
            i += 1;
            continue;
        }

        if let Instr::Store {
            offset: existing, ..
        } = &mut instrs[i + 3]
        {
            *existing += offset;
            let value_producer = instrs[i + 2].clone();
            instrs.splice(i..i + 3, [value_producer]);
            changed = true;
            continue;
        }

        i += 1;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::LoadKind;

    #[test]
    fn offset_absorbs_into_a_bare_load() {
        let mut instrs = vec![
            Instr::I32Const(100),
            Instr::I32Const(8),
            Instr::BinOp(BinOp::Add, MachineType::I32),
            Instr::Load { kind: LoadKind::F64, offset: 0 },
        ];
        assert!(address_offset_absorption(&mut instrs));
        assert!(matches!(
            instrs.as_slice(),
            [
                Instr::I32Const(100),
                Instr::Load { kind: LoadKind::F64, offset: 8 }
            ]
        ));
    }

    #[test]
    fn offset_absorbs_into_a_store_through_its_value_producer() {
        let mut instrs = vec![
            Instr::I32Const(100),
            Instr::I32Const(8),
            Instr::BinOp(BinOp::Add, MachineType::I32),
            Instr::LocalGet(crate::instr::LocalId(0)),
            Instr::Store { kind: crate::instr::StoreKind::F64, offset: 0 },
        ];
        assert!(address_offset_absorption(&mut instrs));
        assert!(matches!(
            instrs.as_slice(),
            [
                Instr::I32Const(100),
                Instr::LocalGet(crate::instr::LocalId(0)),
                Instr::Store { kind: crate::instr::StoreKind::F64, offset: 8 }
            ]
        ));
    }

    #[test]
    fn negative_offset_is_never_absorbed() {
        let mut instrs = vec![
            Instr::I32Const(-4),
            Instr::BinOp(BinOp::Add, MachineType::I32),
            Instr::Load { kind: LoadKind::I32, offset: 0 },
        ];
        assert!(!address_offset_absorption(&mut instrs));
    }
}
