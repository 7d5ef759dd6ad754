//! The per-function instruction builder.
//!
//! Unlike a builder that tracks a Rust-operand stack of arena expression ids plus a statement
//! buffer, this one is simpler: the output instruction stream has no shared-subexpression
//! concerns, so it is just the ordered instruction list plus the local table and label counter.

use crate::instr::{Instr, Label, LocalId};
use crate::locals::{LocalTable, Temporaries};
use crate::types::{MachineType, StorageType};

/// Accumulates a function body's instructions and declared locals during emission.
#[must_use]
pub struct FunctionBuilder {
    instructions: Vec<Instr>,
    pub locals: LocalTable,
    pub temporaries: Temporaries,
    result_type: Option<MachineType>,
    next_label: u32,
}

impl FunctionBuilder {
    pub fn new() -> Self {
        Self {
            instructions: Vec::new(),
            locals: LocalTable::new(),
            temporaries: Temporaries::new(),
            result_type: None,
            next_label: 0,
        }
    }

    /// Declares a function parameter or `LocalVariable` statement's local.
    pub fn declare_local(
        &mut self,
        name: &str,
        source_type: StorageType,
        machine_type: MachineType,
    ) -> Result<LocalId, ()> {
        self.locals.declare(name, source_type, machine_type)
    }

    pub fn set_result_type(&mut self, ty: Option<MachineType>) {
        self.result_type = ty;
    }

    pub fn result_type(&self) -> Option<MachineType> {
        self.result_type
    }

    pub fn push(&mut self, instr: Instr) {
        self.instructions.push(instr);
    }

    pub fn extend(&mut self, instrs: impl IntoIterator<Item = Instr>) {
        self.instructions.extend(instrs);
    }

    /// Allocates a fresh, function-unique branch target label.
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    /// Gets or allocates the single temporary local reserved for `ty` in this function.
    pub fn temporary(&mut self, ty: MachineType) -> LocalId {
        let mut locals = std::mem::take(&mut self.locals);
        let next_id = locals.next_real_id();
        let id = self.temporaries.get_or_alloc(ty, || LocalId(next_id));
        if id.0 == next_id {
            locals.reserve_ids(1);
        }
        self.locals = locals;
        id
    }

    pub fn instructions(&self) -> &[Instr] {
        &self.instructions
    }

    pub fn instructions_mut(&mut self) -> &mut Vec<Instr> {
        &mut self.instructions
    }

    /// Consumes the builder, producing the final [`CompiledFunction`].
    pub fn finish(self) -> CompiledFunction {
        CompiledFunction {
            instructions: self.instructions,
            locals: self.locals,
            temporaries: self.temporaries,
            result_type: self.result_type,
        }
    }
}

impl Default for FunctionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The final emitted function body: instructions, declared locals, and result type, ready to
/// hand to the peephole optimizer and then the external text renderer.
#[must_use]
pub struct CompiledFunction {
    pub instructions: Vec<Instr>,
    pub locals: LocalTable,
    /// The (at most four) compiler-generated temporary locals allocated during emission.
    /// Kept separate from `locals` since they have no source-visible name; an external
    /// renderer still needs their machine types to emit `(local ...)` declarations for them.
    pub temporaries: Temporaries,
    pub result_type: Option<MachineType>,
}
