//! The peephole optimizer: ~15 independent local rewrites run to a fixed point
//! over the emitted instruction tree, followed by the local-usage sweep.
//!
//! Split into a directory of focused submodules by concern: `control` holds the
//! terminator/branch/block-shape rules, `arith` the constant-folding and identity rules,
//! `locals` the tee-formation and local-lifetime rules, `memory` the address-offset absorption
//! rule.

mod arith;
mod control;
mod locals;
mod memory;

use crate::builder::CompiledFunction;
use crate::context::CompileOptions;
use crate::instr::{Instr, Label};

/// Runs the peephole optimizer to a fixed point, then removes any declared local
/// left with no remaining reference.
///
/// Exceeding `options`'s pass cap is an internal-invariant violation -- a non-terminating
/// rewrite sequence is a bug in one of the rules below, not a recoverable source-level condition
/// -- so it surfaces as an `Err` rather than a [`crate::diagnostics::Code`].
pub fn optimize(function: &mut CompiledFunction, options: &CompileOptions) -> anyhow::Result<()> {
    let limit = options.get_max_optimizer_passes();
    for _ in 0..limit {
        if !rewrite_pass(&mut function.instructions, options) {
            locals::sweep_unused(function);
            return Ok(());
        }
    }
    anyhow::bail!("peephole optimizer did not reach a fixed point within {limit} passes");
}

/// Applies every rule once across the instruction list, then recurses into nested
/// `if`/`block`/`loop` bodies, reporting whether anything changed anywhere in the tree.
fn rewrite_pass(instrs: &mut Vec<Instr>, options: &CompileOptions) -> bool {
    let mut changed = false;

    changed |= control::dead_code_after_terminators(instrs);
    changed |= control::if_to_br_if(instrs);
    changed |= control::constant_br_if(instrs);
    changed |= control::redundant_branch_pair(instrs);
    changed |= arith::fold_instruction_arithmetic(instrs);
    changed |= arith::identity_removal(instrs);
    changed |= arith::double_eqz(instrs);
    changed |= arith::integer_cast_absorption(instrs);
    changed |= locals::tee_formation(instrs);
    changed |= locals::single_use_tee_removal(instrs);
    if options.is_absorb_offsets_enabled() {
        changed |= memory::address_offset_absorption(instrs);
    }
    changed |= locals::constant_duplication(instrs);
    changed |= control::empty_or_branch_only_block_loop(instrs);
    changed |= control::loop_peel(instrs);
    changed |= control::block_peel(instrs);
    changed |= locals::inline_parameter_shortcut(instrs);

    for instr in instrs.iter_mut() {
        match instr {
            Instr::If {
                then_branch,
                else_branch,
            } => {
                changed |= rewrite_pass(then_branch, options);
                changed |= rewrite_pass(else_branch, options);
            }
            Instr::Block { body, .. } | Instr::Loop { body, .. } => {
                changed |= rewrite_pass(body, options);
            }
            _ => {}
        }
    }

    changed
}

/// `true` if any `br`/`br_if` anywhere in `instrs`, including inside nested control bodies,
/// targets `label`. Shared by rules 13-15, which need to know whether a loop/block's label is
/// still referenced before collapsing it.
fn references_label(instrs: &[Instr], label: Label) -> bool {
    instrs.iter().any(|instr| match instr {
        Instr::Br(l) | Instr::BrIf(l) => *l == label,
        Instr::If {
            then_branch,
            else_branch,
        } => references_label(then_branch, label) || references_label(else_branch, label),
        Instr::Block { body, .. } | Instr::Loop { body, .. } => references_label(body, label),
        _ => false,
    })
}

/// `true` if any `br_if` occurs anywhere in `instrs`, including inside nested control bodies.
fn contains_any_br_if(instrs: &[Instr]) -> bool {
    instrs.iter().any(|instr| match instr {
        Instr::BrIf(_) => true,
        Instr::If {
            then_branch,
            else_branch,
        } => contains_any_br_if(then_branch) || contains_any_br_if(else_branch),
        Instr::Block { body, .. } | Instr::Loop { body, .. } => contains_any_br_if(body),
        _ => false,
    })
}
