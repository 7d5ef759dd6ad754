//! The function body compiler: header processing, statement dispatch, and the
//! top-level `compile_function` entry point.

use crate::builder::{CompiledFunction, FunctionBuilder};
use crate::cast::storage_cast;
use crate::context::CompileContext;
use crate::diagnostics::{Code, Diagnostics, TraceCategory};
use crate::emit::emit;
use crate::expr::Expr;
use crate::optimize::optimize;
use crate::simplify::{simplify, SimplifyContext};
use crate::types::StorageType;
use anyhow::Context;

/// A function parameter, as delivered by the parser: a source name and declared storage type.
#[derive(Clone, Debug)]
pub struct Parameter {
    pub name: Box<str>,
    pub storage_type: StorageType,
}

/// A function declaration, as delivered by the parser: parameters, an
/// optional result intrinsic type, and body statements.
#[derive(Clone, Debug)]
pub struct FunctionDecl {
    pub name: Box<str>,
    pub parameters: Vec<Parameter>,
    pub result_type: Option<StorageType>,
    pub body: Vec<Statement>,
}

/// A source statement. Only [`Statement::LocalVariable`] and [`Statement::Expression`] are
/// implemented; the rest exist so the dispatch match is
/// exhaustive and name the forms this core does not compile.
#[derive(Clone, Debug)]
pub enum Statement {
    LocalVariable {
        name: Box<str>,
        storage_type: StorageType,
        initializer: Option<Expr>,
    },
    Expression(Expr),
    Assignment,
    Break,
    Continue,
    Do,
    If,
    LocalFunctionInvocation,
    Return,
    While,
}

/// Compiles one function body.
///
/// Definition and type errors encountered along the way are reported through
/// `ctx.diagnostics` and cause the offending statement to be skipped, not the whole function to
/// abort; only a genuine internal-invariant violation (e.g. the optimizer's fixed point not
/// converging) surfaces as an `Err`.
pub fn compile_function(
    decl: &FunctionDecl,
    ctx: &mut CompileContext<'_>,
) -> anyhow::Result<CompiledFunction> {
    let mut builder = FunctionBuilder::new();

    for param in &decl.parameters {
        let machine_type = param
            .storage_type
            .machine_type()
            .context("parameter has a non-scalar storage type with no machine representation")?;
        if builder
            .declare_local(&param.name, param.storage_type.clone(), machine_type)
            .is_err()
        {
            ctx.diagnostics.report(Code::W140, None);
        } else {
            ctx.trace(TraceCategory::Local, 0, &param.name);
        }
    }

    builder.set_result_type(
        decl.result_type
            .as_ref()
            .and_then(StorageType::machine_type),
    );

    for statement in &decl.body {
        compile_statement(statement, ctx, &mut builder);
    }

    let mut compiled = builder.finish();
    optimize(&mut compiled, ctx.options)
        .context("peephole optimizer failed to converge on the emitted instruction stream")?;

    for (depth, instr) in compiled.instructions.iter().enumerate() {
        ctx.trace(TraceCategory::Inject, depth as u32, &format_args!("{instr:?}"));
    }

    Ok(compiled)
}

fn compile_statement(
    statement: &Statement,
    ctx: &mut CompileContext<'_>,
    builder: &mut FunctionBuilder,
) {
    match statement {
        Statement::LocalVariable {
            name,
            storage_type,
            initializer,
        } => compile_local_variable(name, storage_type, initializer.as_ref(), ctx, builder),
        Statement::Expression(expr) => {
            let expr = simplify_traced(expr, ctx);
            // A bare expression statement is evaluated for side effects; any value it leaves
            // on the stack must be discarded to keep sequential statements balanced.
            if emit(&expr, ctx, builder).is_some() {
                builder.push(crate::instr::Instr::Drop);
            }
        }
        Statement::Assignment
        | Statement::Break
        | Statement::Continue
        | Statement::Do
        | Statement::If
        | Statement::LocalFunctionInvocation
        | Statement::Return
        | Statement::While => {
            // Deliberately out of scope.
        }
    }
}

fn compile_local_variable(
    name: &str,
    storage_type: &StorageType,
    initializer: Option<&Expr>,
    ctx: &mut CompileContext<'_>,
    builder: &mut FunctionBuilder,
) {
    if builder.locals.contains(name) {
        ctx.diagnostics.report(Code::W140, None);
        return;
    }

    let Some(machine_type) = storage_type.machine_type() else {
        ctx.diagnostics.report(Code::W143, None);
        return;
    };

    if let Some(initializer) = initializer {
        let expr = simplify_traced(initializer, ctx);
        let Some(initializer_type) = emit(&expr, ctx, builder) else {
            return;
        };
        if !storage_cast(builder, initializer_type, storage_type) {
            ctx.diagnostics.report(Code::W141, None);
            return;
        }
    }

    let Ok(id) = builder.declare_local(name, storage_type.clone(), machine_type) else {
        ctx.diagnostics.report(Code::W140, None);
        return;
    };
    ctx.trace(TraceCategory::Local, 0, &name);

    if initializer.is_some() {
        builder.push(crate::instr::Instr::LocalSet(id));
    }
}

/// Simplifies a clone of `expr` to a fixed point, emitting the `pExpr` trace before and after.
fn simplify_traced(expr: &Expr, ctx: &mut CompileContext<'_>) -> Expr {
    ctx.trace(TraceCategory::PExpr, 0, expr);
    let mut expr = expr.clone();
    simplify(
        &mut expr,
        SimplifyContext {
            declarations: ctx.declarations,
            size_oracle: ctx.size_oracle,
        },
    );
    ctx.trace(TraceCategory::PExpr, 0, &expr);
    expr
}
