//! Expression/type-lowering engine and peephole optimizer for a small C-like systems language
//! targeting [WebAssembly text format].
//!
//! This crate covers the hardest part of such a transpiler: a typed expression
//! compiler that mirrors WebAssembly's numeric semantics across a richer source type lattice, an
//! algebraic simplifier over the source expression tree, and a multi-pass peephole rewriter over
//! the emitted instruction stream. The lexer, parser, semantic-analysis pass, statement codegen
//! for control flow, and text renderer are external collaborators whose contracts this crate
//! states as traits (see [`context`]) but does not implement.
//!
//! [WebAssembly text format]: https://webassembly.github.io/spec/core/text/index.html

#![deny(unsafe_code)]

pub mod address;
pub mod builder;
pub mod cast;
pub mod context;
pub mod diagnostics;
pub mod emit;
pub mod expr;
pub mod function;
pub mod instr;
pub mod literal;
pub mod locals;
pub mod optimize;
pub mod simplify;
pub mod types;

#[doc(no_inline)]
pub use anyhow::{Error, Result};

pub use function::compile_function;
