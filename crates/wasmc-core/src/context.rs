//! External collaborator contracts and the compile-time options surface.

use crate::diagnostics::{Diagnostics, Trace, TraceCategory};
use crate::instr::GlobalId;
use crate::literal::Literal;
use crate::types::StorageType;

/// A lookup result from the external declaration table.
///
/// `FunctionDeclaration` and `TypeAlias` are represented only as empty marker variants: function
/// invocation is out of scope for this crate, and type aliases are resolved by the
/// semantic-analysis pass before this crate ever sees a [`crate::expr::TypeSpec`].
#[derive(Clone, Debug)]
pub enum Declaration {
    ConstDeclaration(Literal),
    GlobalDeclaration(GlobalId, StorageType),
    VariableDeclaration { address: u32, spec: StorageType },
    FunctionDeclaration,
    TypeAlias,
}

/// Lookup-by-name access to the enclosing compilation's resolved globals, constants, types, and
/// memory variables.
///
/// Read-only during function compilation.
pub trait Declarations {
    fn lookup(&self, name: &str) -> Option<Declaration>;

    /// Resolves a struct field by [`crate::types::StructRef`] and name, returning its type and
    /// byte offset.
    fn struct_field(&self, s: crate::types::StructRef, name: &str) -> Option<crate::types::StructField>;
}

/// `sizeof(typeSpec) -> non-negative integer bytes`, defined for all fully-resolved type specs.
pub trait SizeOracle {
    fn size_of(&self, ty: &StorageType) -> u32;
}

/// Fluent compile-time configuration, following the builder pattern common for optional
/// codegen toggles.
#[derive(Debug)]
pub struct CompileOptions {
    /// Whether peephole rule 11 (address-offset absorption into `load`/`store`) may fire.
    /// Defaults to `true`.
    absorb_offsets: bool,
    /// Upper bound on peephole fixed-point iterations, guarding against a non-terminating
    /// rewrite sequence. Defaults to `64`.
    max_optimizer_passes: u32,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            absorb_offsets: true,
            max_optimizer_passes: 64,
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables peephole rule 11 (address-offset absorption). Defaults to `true`.
    pub fn absorb_offsets(&mut self, enabled: bool) -> &mut Self {
        self.absorb_offsets = enabled;
        self
    }

    pub fn is_absorb_offsets_enabled(&self) -> bool {
        self.absorb_offsets
    }

    /// Sets the fixed-point iteration cap for the peephole optimizer. Defaults to `64`.
    pub fn max_optimizer_passes(&mut self, limit: u32) -> &mut Self {
        self.max_optimizer_passes = limit;
        self
    }

    pub fn get_max_optimizer_passes(&self) -> u32 {
        self.max_optimizer_passes
    }
}

/// Bundles everything a function-body compile needs from its enclosing compilation: the
/// read-only declaration table and size oracle, the append-only error sink, the optional trace
/// sink, and the fluent [`CompileOptions`].
///
/// Threaded through `compile_function` as a single bundle rather than as separate parameters.
pub struct CompileContext<'a> {
    pub declarations: &'a dyn Declarations,
    pub size_oracle: &'a dyn SizeOracle,
    pub diagnostics: &'a mut dyn Diagnostics,
    pub trace: Option<&'a mut dyn Trace>,
    pub options: &'a CompileOptions,
}

impl CompileContext<'_> {
    /// Forwards one `(category, depth, payload)` triple to the optional [`Trace`] sink.
    /// A no-op when no sink was configured.
    pub fn trace(&mut self, category: TraceCategory, depth: u32, payload: &dyn std::fmt::Display) {
        if let Some(sink) = self.trace.as_deref_mut() {
            sink.event(category, depth, payload);
        }
    }
}
