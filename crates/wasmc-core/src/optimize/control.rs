//! Peephole rules 1-4 and 13-15: terminator dead-code elimination, branch fusion,
//! and block/loop shape collapsing.

use crate::instr::Instr;

/// Rule 1: drop everything following the first terminator (`return`, unconditional `br`, or
/// `unreachable`) in a straight-line instruction list; the terminator itself is kept.
pub fn dead_code_after_terminators(instrs: &mut Vec<Instr>) -> bool {
    if let Some(idx) = instrs.iter().position(Instr::is_terminator) {
        if instrs.len() > idx + 1 {
            instrs.truncate(idx + 1);
            return true;
        }
    }
    false
}

/// Rule 2: `if (...) { br L } else { }` with a single-instruction then-arm and an empty else-arm
/// becomes `br_if L`.
pub fn if_to_br_if(instrs: &mut [Instr]) -> bool {
    let mut changed = false;
    for instr in instrs.iter_mut() {
        if let Instr::If {
            then_branch,
            else_branch,
        } = instr
        {
            if else_branch.is_empty() {
                if let [Instr::Br(label)] = then_branch.as_slice() {
                    let label = *label;
                    *instr = Instr::BrIf(label);
                    changed = true;
                }
            }
        }
    }
    changed
}

/// Rule 3: `i32.const c; br_if L` becomes `br L` when `c != 0`, or is removed entirely when
/// `c == 0`.
pub fn constant_br_if(instrs: &mut Vec<Instr>) -> bool {
    let mut i = 0;
    let mut changed = false;
    while i + 1 < instrs.len() {
        if let (Instr::I32Const(c), Instr::BrIf(label)) = (&instrs[i], &instrs[i + 1]) {
            let c = *c;
            let label = *label;
            if c != 0 {
                instrs.splice(i..i + 2, [Instr::Br(label)]);
            } else {
                instrs.splice(i..i + 2, []);
            }
            changed = true;
            continue;
        }
        i += 1;
    }
    changed
}

/// Rule 4: two consecutive unconditional branches to the same label; the second is unreachable
/// and is removed.
pub fn redundant_branch_pair(instrs: &mut Vec<Instr>) -> bool {
    let mut i = 0;
    let mut changed = false;
    while i + 1 < instrs.len() {
        if let (Instr::Br(a), Instr::Br(b)) = (&instrs[i], &instrs[i + 1]) {
            if a == b {
                instrs.remove(i + 1);
                changed = true;
                continue;
            }
        }
        i += 1;
    }
    changed
}

/// Rule 13: `loop L { }` / `block L { }` are removed outright; `loop L { br L' }` (or `br_if L'`)
/// with `L' != L` collapses to the bare branch, since the loop wrapper contributes nothing once
/// its own label is unreachable from inside; `block L { br L }` is removed entirely, since
/// branching to a block's own label is just falling through to the instruction after it.
///
/// A `loop L { br L }`/`{ br_if L }` is left alone: unlike a block's label, a loop's own label
/// names its *start*, so branching to it is a real backward jump (`continue`), not a no-op.
pub fn empty_or_branch_only_block_loop(instrs: &mut Vec<Instr>) -> bool {
    let mut i = 0;
    let mut changed = false;
    while i < instrs.len() {
        let collapse = match &instrs[i] {
            Instr::Loop { label, body } => {
                if body.is_empty() {
                    Some(None)
                } else if let [single] = body.as_slice() {
                    match single {
                        Instr::Br(l) if *l != *label => Some(Some(Instr::Br(*l))),
                        Instr::BrIf(l) if *l != *label => Some(Some(Instr::BrIf(*l))),
                        _ => None,
                    }
                } else {
                    None
                }
            }
            Instr::Block { label, body } => {
                if body.is_empty() {
                    Some(None)
                } else if let [single] = body.as_slice() {
                    match single {
                        Instr::Br(l) if *l == *label => Some(None),
                        Instr::Br(l) => Some(Some(Instr::Br(*l))),
                        Instr::BrIf(l) if *l != *label => Some(Some(Instr::BrIf(*l))),
                        _ => None,
                    }
                } else {
                    None
                }
            }
            _ => None,
        };

        match collapse {
            Some(Some(replacement)) => {
                instrs[i] = replacement;
                changed = true;
            }
            Some(None) => {
                instrs.remove(i);
                changed = true;
                continue;
            }
            None => {}
        }
        i += 1;
    }
    changed
}

/// Rule 14: a `loop L` whose body never branches to `L` (directly or from a nested construct)
/// never actually loops, so it is inlined in place.
pub fn loop_peel(instrs: &mut Vec<Instr>) -> bool {
    let mut i = 0;
    let mut changed = false;
    while i < instrs.len() {
        if let Instr::Loop { label, body } = &instrs[i] {
            if !super::references_label(body, *label) {
                let body = body.clone();
                instrs.splice(i..i + 1, body);
                changed = true;
                continue;
            }
        }
        i += 1;
    }
    changed
}

/// Rule 15: a `block L` with no `br_if` anywhere in its body and no `br L` except possibly a
/// single trailing top-level one (which would just fall through to the same place) is inlined.
pub fn block_peel(instrs: &mut Vec<Instr>) -> bool {
    let mut i = 0;
    let mut changed = false;
    while i < instrs.len() {
        if let Instr::Block { label, body } = &instrs[i] {
            if can_peel(*label, body) {
                let mut body = body.clone();
                if matches!(body.last(), Some(Instr::Br(l)) if *l == *label) {
                    body.pop();
                }
                instrs.splice(i..i + 1, body);
                changed = true;
                continue;
            }
        }
        i += 1;
    }
    changed
}


fn can_peel(label: crate::instr::Label, body: &[Instr]) -> bool {
    if super::contains_any_br_if(body) {
        return false;
    }
    for (idx, instr) in body.iter().enumerate() {
        match instr {
            Instr::Br(l) if *l == label => {
                if idx != body.len() - 1 {
                    return false;
                }
            }
            Instr::If {
                then_branch,
                else_branch,
            } => {
                if super::references_label(then_branch, label)
                    || super::references_label(else_branch, label)
                {
                    return false;
                }
            }
            Instr::Block { body: b, .. } | Instr::Loop { body: b, .. } => {
                if super::references_label(b, label) {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}
