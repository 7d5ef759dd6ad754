//! The type-directed expression emitter.
//!
//! Two-pass pattern: [`probe_type`] computes an expression's result type without emitting
//! anything (used to pick an operation's result type before its operands are known to be
//! castable), then [`emit`] walks the (already-simplified) tree for real, casting each operand
//! to the chosen common representation and appending instructions to the [`FunctionBuilder`].

use crate::address::compute_address;
use crate::builder::FunctionBuilder;
use crate::context::{CompileContext, Declaration};
use crate::diagnostics::{Code, Diagnostics};
use crate::expr::{BinaryOp, BuiltIn, Expr, UnaryOp};
use crate::instr::{self, Instr, Signedness};
use crate::literal::{Literal, LiteralSource};
use crate::types::{Intrinsic, MachineType, StorageType};

/// The result of emitting an expression: either an [`Intrinsic`] value left on the stack, or
/// (for a struct/array lvalue mid-indexing) the address of an aggregate left on the stack, to be
/// indexed further by an enclosing `MemberAccess`/`ItemAccess`.
#[derive(Clone, Debug)]
pub enum EmitType {
    Intrinsic(Intrinsic),
    Aggregate(StorageType),
}

impl EmitType {
    pub fn as_intrinsic(&self) -> Option<Intrinsic> {
        match self {
            Self::Intrinsic(i) => Some(*i),
            Self::Aggregate(_) => None,
        }
    }
}

/// Computes an expression's result type without emitting any instructions. Used to select an
/// operation's result type before its operands are actually compiled.
pub fn probe_type(expr: &Expr, ctx: &CompileContext<'_>, builder: &FunctionBuilder) -> Option<EmitType> {
    match expr {
        Expr::Literal(lit) => Some(EmitType::Intrinsic(literal_intrinsic(lit))),
        Expr::Identifier(name) => {
            if let Some(entry) = builder.locals.get(name) {
                return entry
                    .source_type
                    .as_intrinsic()
                    .map(EmitType::Intrinsic)
                    .or_else(|| Some(EmitType::Aggregate(entry.source_type.clone())));
            }
            match ctx.declarations.lookup(name) {
                Some(Declaration::GlobalDeclaration(_, ty)) => ty
                    .as_intrinsic()
                    .map(EmitType::Intrinsic)
                    .or(Some(EmitType::Aggregate(ty))),
                Some(Declaration::VariableDeclaration { spec, .. }) => spec
                    .as_intrinsic()
                    .map(EmitType::Intrinsic)
                    .or(Some(EmitType::Aggregate(spec))),
                _ => None,
            }
        }
        Expr::UnaryExpression { op, operand } => match op {
            UnaryOp::Plus => Some(EmitType::Intrinsic(Intrinsic::I32)),
            UnaryOp::Not => Some(EmitType::Intrinsic(Intrinsic::I32)),
            UnaryOp::AddressOf => Some(EmitType::Intrinsic(Intrinsic::I32)),
            UnaryOp::Neg | UnaryOp::BitNot => probe_type(operand, ctx, builder),
        },
        Expr::BinaryExpression { op, left, right } => {
            if op.is_comparison() {
                return Some(EmitType::Intrinsic(Intrinsic::I32));
            }
            let l = probe_type(left, ctx, builder)?.as_intrinsic()?;
            let r = probe_type(right, ctx, builder)?.as_intrinsic()?;
            Some(EmitType::Intrinsic(lattice_result(l, r)))
        }
        Expr::ConditionalExpression {
            then_branch,
            else_branch,
            ..
        } => {
            let t = probe_type(then_branch, ctx, builder)?.as_intrinsic()?;
            let e = probe_type(else_branch, ctx, builder)?.as_intrinsic()?;
            Some(EmitType::Intrinsic(lattice_result(t, e)))
        }
        Expr::TypeCast { target_name, .. } => {
            Intrinsic::from_name(target_name).map(EmitType::Intrinsic)
        }
        Expr::SizeOfExpression(_) => Some(EmitType::Intrinsic(Intrinsic::I32)),
        Expr::DereferenceExpression(inner) => match probe_type(inner, ctx, builder)? {
            EmitType::Aggregate(StorageType::Pointer(pointee)) => pointee
                .as_intrinsic()
                .map(EmitType::Intrinsic)
                .or(Some(EmitType::Aggregate(*pointee))),
            _ => None,
        },
        Expr::MemberAccess { .. } | Expr::ItemAccess { .. } => {
            // Requires walking the declaration table the same way `compute_address` does;
            // probing re-derives it structurally rather than duplicating that recursion here.
            probe_lvalue_type(expr, ctx, builder)
        }
        Expr::BuiltInFunctionInvocation { name, args } => match name {
            BuiltIn::Clz | BuiltIn::Ctz | BuiltIn::Popcnt => {
                probe_type(args.first()?, ctx, builder)
            }
            BuiltIn::Min | BuiltIn::Max => {
                let any_f64 = args.iter().any(|a| {
                    matches!(
                        probe_type(a, ctx, builder),
                        Some(EmitType::Intrinsic(Intrinsic::F64))
                    )
                });
                Some(EmitType::Intrinsic(if any_f64 {
                    Intrinsic::F64
                } else {
                    Intrinsic::F32
                }))
            }
            _ => probe_type(args.first()?, ctx, builder),
        },
        Expr::FunctionInvocation { .. } => None,
    }
}

fn probe_lvalue_type(
    expr: &Expr,
    ctx: &CompileContext<'_>,
    builder: &FunctionBuilder,
) -> Option<EmitType> {
    match expr {
        Expr::MemberAccess {
            object,
            member_name,
        } => {
            let EmitType::Aggregate(StorageType::Struct(s)) = probe_lvalue_type(object, ctx, builder)? else {
                return None;
            };
            let field = ctx.declarations.struct_field(s, member_name)?;
            field
                .ty
                .as_intrinsic()
                .map(EmitType::Intrinsic)
                .or(Some(EmitType::Aggregate(field.ty)))
        }
        Expr::ItemAccess { array, .. } => {
            let EmitType::Aggregate(StorageType::Array { element, .. }) =
                probe_lvalue_type(array, ctx, builder)?
            else {
                return None;
            };
            element
                .as_intrinsic()
                .map(EmitType::Intrinsic)
                .or(Some(EmitType::Aggregate(*element)))
        }
        _ => probe_type(expr, ctx, builder),
    }
}

fn literal_intrinsic(lit: &Literal) -> Intrinsic {
    match lit.source() {
        LiteralSource::Int => Intrinsic::I32,
        LiteralSource::Real => Intrinsic::F64,
        LiteralSource::BigInt => Intrinsic::I64,
    }
}

/// The type lattice used for binary operators and conditionals: float beats
/// 64-bit beats 32-bit; signedness of the winning width follows "signed if either operand's
/// underlying name starts with `i`".
fn lattice_result(left: Intrinsic, right: Intrinsic) -> Intrinsic {
    if left.is_float() || right.is_float() {
        return Intrinsic::F64;
    }
    let either_signed = left.is_signed() || right.is_signed();
    if left.machine_type() == MachineType::I64 || right.machine_type() == MachineType::I64 {
        if either_signed {
            Intrinsic::I64
        } else {
            Intrinsic::U64
        }
    } else if either_signed {
        Intrinsic::I32
    } else {
        Intrinsic::U32
    }
}

/// Walks the simplified tree, appending instructions to `builder` and returning the expression's
/// result type, or `None` if a definition/type error occurred (already reported to
/// `ctx.diagnostics`); a `None` here must stop the caller from emitting further but not prevent
/// sibling expressions from being attempted.
pub fn emit(
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
    builder: &mut FunctionBuilder,
) -> Option<Intrinsic> {
    emit_any(expr, ctx, builder)?.as_intrinsic().or_else(|| {
        ctx.diagnostics.report(Code::W143, None);
        None
    })
}

/// Like [`emit`], but permits returning an [`EmitType::Aggregate`] for indirect-access chains
/// still being indexed.
pub fn emit_any(
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
    builder: &mut FunctionBuilder,
) -> Option<EmitType> {
    match expr {
        Expr::Literal(lit) => {
            let ty = literal_intrinsic(lit);
            builder.push(instr::const_for_machine_type(
                ty.machine_type(),
                match lit {
                    Literal::Int(i) => *i,
                    Literal::BigInt(b) => Literal::narrow_bigint_signed64(b),
                    Literal::Real(_) => 0,
                },
                lit.as_f64(),
            ));
            Some(EmitType::Intrinsic(ty))
        }
        Expr::Identifier(name) => emit_identifier(name, ctx, builder),
        Expr::UnaryExpression { op, operand } => emit_unary(*op, operand, ctx, builder),
        Expr::BinaryExpression { op, left, right } => emit_binary(*op, left, right, ctx, builder),
        Expr::ConditionalExpression {
            condition,
            then_branch,
            else_branch,
        } => emit_conditional(condition, then_branch, else_branch, ctx, builder),
        Expr::TypeCast {
            target_name,
            operand,
        } => emit_cast(target_name, operand, ctx, builder),
        Expr::MemberAccess { .. } | Expr::ItemAccess { .. } | Expr::DereferenceExpression(_) => {
            emit_indirect(expr, ctx, builder)
        }
        Expr::BuiltInFunctionInvocation { name, args } => {
            emit_builtin(*name, args, ctx, builder)
        }
        Expr::SizeOfExpression(_) => {
            // Already resolved to a `Literal` by the simplifier in any reachable program; a
            // `SizeOfExpression` surviving to emission means the size oracle or declaration
            // table could not resolve it.
            ctx.diagnostics.report(Code::W142, None);
            None
        }
        Expr::FunctionInvocation { .. } => {
            // Not implemented in the source; out of scope for this core.
            ctx.diagnostics.report(Code::W143, None);
            None
        }
    }
}

fn emit_identifier(
    name: &str,
    ctx: &mut CompileContext<'_>,
    builder: &mut FunctionBuilder,
) -> Option<EmitType> {
    if let Some(entry) = builder.locals.get(name) {
        let id = entry.machine_name;
        let source_type = entry.source_type.clone();
        builder.push(Instr::LocalGet(id));
        return Some(match source_type.as_intrinsic() {
            Some(i) => EmitType::Intrinsic(i),
            None => EmitType::Aggregate(source_type),
        });
    }

    match ctx.declarations.lookup(name) {
        Some(Declaration::GlobalDeclaration(id, ty)) => {
            if let Some(intrinsic) = ty.as_intrinsic() {
                builder.push(Instr::GlobalGet(id));
                Some(EmitType::Intrinsic(intrinsic))
            } else {
                Some(EmitType::Aggregate(ty))
            }
        }
        Some(Declaration::VariableDeclaration { address, spec }) => {
            builder.push(Instr::I32Const(address as i32));
            if let Some(intrinsic) = spec.as_intrinsic() {
                builder.push(Instr::Load {
                    kind: crate::cast::load_kind_for(intrinsic),
                    offset: 0,
                });
                Some(EmitType::Intrinsic(intrinsic))
            } else {
                Some(EmitType::Aggregate(spec))
            }
        }
        _ => {
            ctx.diagnostics.report(Code::W142, None);
            None
        }
    }
}

fn emit_unary(
    op: UnaryOp,
    operand: &Expr,
    ctx: &mut CompileContext<'_>,
    builder: &mut FunctionBuilder,
) -> Option<EmitType> {
    if op == UnaryOp::AddressOf {
        compute_address(operand, ctx, builder).ok()?;
        return Some(EmitType::Intrinsic(Intrinsic::I32));
    }

    let operand_ty = emit(operand, ctx, builder)?;

    match op {
        UnaryOp::Plus => {
            crate::cast::cast_value(builder, operand_ty, Intrinsic::I32);
            Some(EmitType::Intrinsic(Intrinsic::I32))
        }
        UnaryOp::Neg => {
            let machine = operand_ty.machine_type();
            builder.push(instr::const_for_machine_type(machine, -1, -1.0));
            builder.push(Instr::BinOp(instr::BinOp::Mul, machine));
            Some(EmitType::Intrinsic(operand_ty))
        }
        UnaryOp::Not => {
            if operand_ty.is_float() {
                ctx.diagnostics.report(Code::W145, None);
                return None;
            }
            builder.push(Instr::UnOp(instr::UnOp::Eqz, operand_ty.machine_type()));
            Some(EmitType::Intrinsic(Intrinsic::I32))
        }
        UnaryOp::BitNot => {
            if operand_ty.is_float() {
                ctx.diagnostics.report(Code::W145, None);
                return None;
            }
            let machine = operand_ty.machine_type();
            builder.push(instr::const_for_machine_type(
                machine,
                operand_ty.all_ones_mask() as i64,
                0.0,
            ));
            builder.push(Instr::BinOp(instr::BinOp::Xor, machine));
            Some(EmitType::Intrinsic(operand_ty))
        }
        UnaryOp::AddressOf => unreachable!(),
    }
}

fn emit_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    ctx: &mut CompileContext<'_>,
    builder: &mut FunctionBuilder,
) -> Option<EmitType> {
    let left_ty = probe_type(left, ctx, builder)?.as_intrinsic();
    let right_ty = probe_type(right, ctx, builder)?.as_intrinsic();
    let (Some(left_ty), Some(right_ty)) = (left_ty, right_ty) else {
        ctx.diagnostics.report(Code::W144, None);
        return None;
    };

    let result = lattice_result(left_ty, right_ty);
    if op.is_integer_only() && result.is_float() {
        ctx.diagnostics.report(Code::W145, None);
        return None;
    }

    let actual_left = emit(left, ctx, builder)?;
    crate::cast::cast_value(builder, actual_left, result);
    let actual_right = emit(right, ctx, builder)?;
    crate::cast::cast_value(builder, actual_right, result);

    let machine = result.machine_type();
    let signed = if result.is_signed() {
        Signedness::Signed
    } else {
        Signedness::Unsigned
    };

    let wasm_op = match op {
        BinaryOp::Add => instr::BinOp::Add,
        BinaryOp::Sub => instr::BinOp::Sub,
        BinaryOp::Mul => instr::BinOp::Mul,
        BinaryOp::Div => instr::BinOp::Div(signed),
        BinaryOp::Rem => instr::BinOp::Rem(signed),
        BinaryOp::BitAnd => instr::BinOp::And,
        BinaryOp::BitOr => instr::BinOp::Or,
        BinaryOp::BitXor => instr::BinOp::Xor,
        BinaryOp::Shl => instr::BinOp::Shl,
        BinaryOp::Shr => instr::BinOp::Shr(signed),
        BinaryOp::UShr => instr::BinOp::Shr(Signedness::Unsigned),
        BinaryOp::Eq => instr::BinOp::Eq,
        BinaryOp::Ne => instr::BinOp::Ne,
        BinaryOp::Lt => instr::BinOp::Lt(signed),
        BinaryOp::Le => instr::BinOp::Le(signed),
        BinaryOp::Gt => instr::BinOp::Gt(signed),
        BinaryOp::Ge => instr::BinOp::Ge(signed),
    };
    builder.push(Instr::BinOp(wasm_op, machine));

    Some(EmitType::Intrinsic(if op.is_comparison() {
        Intrinsic::I32
    } else {
        result
    }))
}

fn emit_conditional(
    condition: &Expr,
    then_branch: &Expr,
    else_branch: &Expr,
    ctx: &mut CompileContext<'_>,
    builder: &mut FunctionBuilder,
) -> Option<EmitType> {
    let then_ty = probe_type(then_branch, ctx, builder)?.as_intrinsic()?;
    let else_ty = probe_type(else_branch, ctx, builder)?.as_intrinsic()?;
    let result = lattice_result(then_ty, else_ty);

    // WebAssembly's `select` consumes `(value1, value2, condition)`; push in that order.
    let actual_then = emit(then_branch, ctx, builder)?;
    crate::cast::cast_value(builder, actual_then, result);
    let actual_else = emit(else_branch, ctx, builder)?;
    crate::cast::cast_value(builder, actual_else, result);
    let cond_ty = emit(condition, ctx, builder)?;
    crate::cast::cast_value(builder, cond_ty, Intrinsic::I32);

    builder.push(Instr::Select);
    Some(EmitType::Intrinsic(result))
}

fn emit_cast(
    target_name: &str,
    operand: &Expr,
    ctx: &mut CompileContext<'_>,
    builder: &mut FunctionBuilder,
) -> Option<EmitType> {
    let Some(target) = Intrinsic::from_name(target_name) else {
        ctx.diagnostics.report(Code::W143, None);
        return None;
    };
    let operand_ty = emit(operand, ctx, builder)?;
    crate::cast::cast_value(builder, operand_ty, target);
    Some(EmitType::Intrinsic(target))
}

fn emit_indirect(
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
    builder: &mut FunctionBuilder,
) -> Option<EmitType> {
    let result = compute_address(expr, ctx, builder).ok()?;
    match result.storage_type.as_intrinsic() {
        Some(intrinsic) => {
            builder.push(Instr::Load {
                kind: crate::cast::load_kind_for(intrinsic),
                offset: 0,
            });
            Some(EmitType::Intrinsic(intrinsic))
        }
        None => Some(EmitType::Aggregate(result.storage_type)),
    }
}

fn emit_builtin(
    name: BuiltIn,
    args: &[Expr],
    ctx: &mut CompileContext<'_>,
    builder: &mut FunctionBuilder,
) -> Option<EmitType> {
    let arg_types: Option<Vec<Intrinsic>> = args
        .iter()
        .map(|a| probe_type(a, ctx, builder).and_then(|t| t.as_intrinsic()))
        .collect();
    let Some(arg_types) = arg_types else {
        ctx.diagnostics.report(Code::W144, None);
        return None;
    };

    if name.is_float_only() && arg_types.iter().any(|t| !t.is_float()) {
        ctx.diagnostics.report(Code::W150, None);
        return None;
    }
    if name.is_integer_only() && arg_types.iter().any(|t| t.is_float()) {
        ctx.diagnostics.report(Code::W151, None);
        return None;
    }

    match name {
        BuiltIn::Min | BuiltIn::Max => emit_min_max(name, args, &arg_types, ctx, builder),
        BuiltIn::Abs => emit_abs(&args[0], arg_types[0], ctx, builder),
        BuiltIn::CopySign => {
            let ty = arg_types[0];
            let a = emit(&args[0], ctx, builder)?;
            crate::cast::cast_value(builder, a, ty);
            let b = emit(&args[1], ctx, builder)?;
            crate::cast::cast_value(builder, b, ty);
            builder.push(Instr::BinOp(instr::BinOp::CopySign, ty.machine_type()));
            Some(EmitType::Intrinsic(ty))
        }
        BuiltIn::Floor | BuiltIn::Ceil | BuiltIn::Trunc | BuiltIn::Nearest | BuiltIn::Sqrt => {
            let ty = arg_types[0];
            emit(&args[0], ctx, builder)?;
            let op = match name {
                BuiltIn::Floor => instr::UnOp::Floor,
                BuiltIn::Ceil => instr::UnOp::Ceil,
                BuiltIn::Trunc => instr::UnOp::Trunc,
                BuiltIn::Nearest => instr::UnOp::Nearest,
                BuiltIn::Sqrt => instr::UnOp::Sqrt,
                _ => unreachable!(),
            };
            builder.push(Instr::UnOp(op, ty.machine_type()));
            Some(EmitType::Intrinsic(ty))
        }
        BuiltIn::Clz | BuiltIn::Ctz | BuiltIn::Popcnt => {
            let ty = arg_types[0];
            emit(&args[0], ctx, builder)?;
            let op = match name {
                BuiltIn::Clz => instr::UnOp::Clz,
                BuiltIn::Ctz => instr::UnOp::Ctz,
                BuiltIn::Popcnt => instr::UnOp::Popcnt,
                _ => unreachable!(),
            };
            builder.push(Instr::UnOp(op, ty.machine_type()));
            Some(EmitType::Intrinsic(ty))
        }
        BuiltIn::Neg => {
            // Float-only; integer negation goes through the unary `-` operator
            // instead, which expands to a multiply by -1.
            let ty = arg_types[0];
            emit(&args[0], ctx, builder)?;
            builder.push(Instr::UnOp(instr::UnOp::Neg, ty.machine_type()));
            Some(EmitType::Intrinsic(ty))
        }
    }
}

fn emit_min_max(
    name: BuiltIn,
    args: &[Expr],
    arg_types: &[Intrinsic],
    ctx: &mut CompileContext<'_>,
    builder: &mut FunctionBuilder,
) -> Option<EmitType> {
    let promoted = if arg_types.iter().any(|t| *t == Intrinsic::F64) {
        Intrinsic::F64
    } else {
        Intrinsic::F32
    };
    let op = if name == BuiltIn::Min {
        instr::BinOp::Min
    } else {
        instr::BinOp::Max
    };

    let first = emit(&args[0], ctx, builder)?;
    crate::cast::cast_value(builder, first, promoted);
    for arg in &args[1..] {
        let next = emit(arg, ctx, builder)?;
        crate::cast::cast_value(builder, next, promoted);
        builder.push(Instr::BinOp(op, promoted.machine_type()));
    }
    Some(EmitType::Intrinsic(promoted))
}

fn emit_abs(
    operand: &Expr,
    ty: Intrinsic,
    ctx: &mut CompileContext<'_>,
    builder: &mut FunctionBuilder,
) -> Option<EmitType> {
    if ty.is_float() {
        emit(operand, ctx, builder)?;
        builder.push(Instr::UnOp(instr::UnOp::Abs, ty.machine_type()));
        return Some(EmitType::Intrinsic(ty));
    }

    // Integer `abs` expands to `tee local; if local < 0 then local * -1 else local`.
    let machine = ty.machine_type();
    let temp = builder.temporary(machine);
    emit(operand, ctx, builder)?;
    builder.push(Instr::LocalTee(temp));
    builder.push(Instr::LocalGet(temp));
    builder.push(instr::const_for_machine_type(machine, 0, 0.0));
    builder.push(Instr::BinOp(instr::BinOp::Lt(Signedness::Signed), machine));
    builder.push(Instr::If {
        then_branch: vec![
            Instr::LocalGet(temp),
            instr::const_for_machine_type(machine, -1, -1.0),
            Instr::BinOp(instr::BinOp::Mul, machine),
        ],
        else_branch: vec![Instr::LocalGet(temp)],
    });
    Some(EmitType::Intrinsic(ty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::{TestDeclarations, TestSizeOracle};
    use crate::context::CompileOptions;
    use crate::diagnostics::VecDiagnostics;

    fn ctx_with<'a>(
        declarations: &'a TestDeclarations,
        size_oracle: &'a TestSizeOracle,
        diagnostics: &'a mut VecDiagnostics,
        options: &'a CompileOptions,
    ) -> CompileContext<'a> {
        CompileContext {
            declarations,
            size_oracle,
            diagnostics,
            trace: None,
            options,
        }
    }

    #[test]
    fn lattice_prefers_float_over_everything() {
        assert_eq!(lattice_result(Intrinsic::F32, Intrinsic::I64), Intrinsic::F64);
        assert_eq!(lattice_result(Intrinsic::I32, Intrinsic::F64), Intrinsic::F64);
    }

    #[test]
    fn lattice_widens_to_64_bit_and_follows_signedness() {
        assert_eq!(lattice_result(Intrinsic::I32, Intrinsic::U64), Intrinsic::U64);
        assert_eq!(lattice_result(Intrinsic::I64, Intrinsic::U32), Intrinsic::I64);
        assert_eq!(lattice_result(Intrinsic::U32, Intrinsic::U32), Intrinsic::U32);
        assert_eq!(lattice_result(Intrinsic::I32, Intrinsic::U32), Intrinsic::I32);
    }

    #[test]
    fn emitting_an_int_literal_pushes_an_i32_const() {
        let declarations = TestDeclarations::default();
        let size_oracle = TestSizeOracle;
        let mut diagnostics = VecDiagnostics::new();
        let options = CompileOptions::new();
        let mut ctx = ctx_with(&declarations, &size_oracle, &mut diagnostics, &options);
        let mut builder = FunctionBuilder::new();

        let ty = emit(&Expr::int(7), &mut ctx, &mut builder).unwrap();
        assert_eq!(ty, Intrinsic::I32);
        assert!(matches!(builder.instructions(), [Instr::I32Const(7)]));
    }

    #[test]
    fn emitting_a_bigint_literal_pushes_an_i64_const() {
        let declarations = TestDeclarations::default();
        let size_oracle = TestSizeOracle;
        let mut diagnostics = VecDiagnostics::new();
        let options = CompileOptions::new();
        let mut ctx = ctx_with(&declarations, &size_oracle, &mut diagnostics, &options);
        let mut builder = FunctionBuilder::new();

        let expr = Expr::Literal(Literal::BigInt(num_bigint::BigInt::from(9)));
        let ty = emit(&expr, &mut ctx, &mut builder).unwrap();
        assert_eq!(ty, Intrinsic::I64);
        assert!(matches!(builder.instructions(), [Instr::I64Const(9)]));
    }

    #[test]
    fn emitting_a_local_identifier_pushes_local_get() {
        let declarations = TestDeclarations::default();
        let size_oracle = TestSizeOracle;
        let mut diagnostics = VecDiagnostics::new();
        let options = CompileOptions::new();
        let mut ctx = ctx_with(&declarations, &size_oracle, &mut diagnostics, &options);
        let mut builder = FunctionBuilder::new();
        builder
            .declare_local("x", StorageType::Intrinsic(Intrinsic::I32), MachineType::I32)
            .unwrap();

        let ty = emit(&Expr::Identifier("x".into()), &mut ctx, &mut builder).unwrap();
        assert_eq!(ty, Intrinsic::I32);
        assert!(matches!(builder.instructions(), [Instr::LocalGet(_)]));
    }

    #[test]
    fn emitting_a_memory_variable_loads_through_its_address() {
        let mut declarations = TestDeclarations::default();
        declarations
            .variables
            .insert("g".into(), (40, StorageType::Intrinsic(Intrinsic::F64)));
        let size_oracle = TestSizeOracle;
        let mut diagnostics = VecDiagnostics::new();
        let options = CompileOptions::new();
        let mut ctx = ctx_with(&declarations, &size_oracle, &mut diagnostics, &options);
        let mut builder = FunctionBuilder::new();

        let ty = emit(&Expr::Identifier("g".into()), &mut ctx, &mut builder).unwrap();
        assert_eq!(ty, Intrinsic::F64);
        assert!(matches!(
            builder.instructions(),
            [Instr::I32Const(40), Instr::Load { kind: crate::instr::LoadKind::F64, offset: 0 }]
        ));
    }

    #[test]
    fn unresolved_identifier_reports_w142() {
        let declarations = TestDeclarations::default();
        let size_oracle = TestSizeOracle;
        let mut diagnostics = VecDiagnostics::new();
        let options = CompileOptions::new();
        let mut ctx = ctx_with(&declarations, &size_oracle, &mut diagnostics, &options);
        let mut builder = FunctionBuilder::new();

        assert!(emit(&Expr::Identifier("nope".into()), &mut ctx, &mut builder).is_none());
        assert_eq!(diagnostics.reports[0].0, crate::diagnostics::Code::W142);
    }

    #[test]
    fn binary_add_casts_both_operands_to_the_lattice_result() {
        let declarations = TestDeclarations::default();
        let size_oracle = TestSizeOracle;
        let mut diagnostics = VecDiagnostics::new();
        let options = CompileOptions::new();
        let mut ctx = ctx_with(&declarations, &size_oracle, &mut diagnostics, &options);
        let mut builder = FunctionBuilder::new();

        let expr = Expr::BinaryExpression {
            op: BinaryOp::Add,
            left: Box::new(Expr::int(1)),
            right: Box::new(Expr::Literal(Literal::Real(2.0))),
        };
        let ty = emit(&expr, &mut ctx, &mut builder).unwrap();
        assert_eq!(ty, Intrinsic::F64);
        // i32 1 gets converted to f64, f64 2.0 is emitted directly, then add.
        assert!(matches!(
            builder.instructions(),
            [
                Instr::I32Const(1),
                Instr::Cvt(_),
                Instr::F64Const(_),
                Instr::BinOp(instr::BinOp::Add, MachineType::F64)
            ]
        ));
    }

    #[test]
    fn comparison_always_yields_i32_regardless_of_operand_type() {
        let declarations = TestDeclarations::default();
        let size_oracle = TestSizeOracle;
        let mut diagnostics = VecDiagnostics::new();
        let options = CompileOptions::new();
        let mut ctx = ctx_with(&declarations, &size_oracle, &mut diagnostics, &options);
        let mut builder = FunctionBuilder::new();

        let expr = Expr::BinaryExpression {
            op: BinaryOp::Lt,
            left: Box::new(Expr::Literal(Literal::Real(1.0))),
            right: Box::new(Expr::Literal(Literal::Real(2.0))),
        };
        assert_eq!(emit(&expr, &mut ctx, &mut builder).unwrap(), Intrinsic::I32);
    }

    #[test]
    fn integer_only_operator_on_float_operands_reports_w145() {
        let declarations = TestDeclarations::default();
        let size_oracle = TestSizeOracle;
        let mut diagnostics = VecDiagnostics::new();
        let options = CompileOptions::new();
        let mut ctx = ctx_with(&declarations, &size_oracle, &mut diagnostics, &options);
        let mut builder = FunctionBuilder::new();

        let expr = Expr::BinaryExpression {
            op: BinaryOp::BitAnd,
            left: Box::new(Expr::Literal(Literal::Real(1.0))),
            right: Box::new(Expr::Literal(Literal::Real(2.0))),
        };
        assert!(emit(&expr, &mut ctx, &mut builder).is_none());
        assert_eq!(diagnostics.reports[0].0, crate::diagnostics::Code::W145);
    }

    #[test]
    fn conditional_pushes_both_values_before_the_condition_for_select() {
        let declarations = TestDeclarations::default();
        let size_oracle = TestSizeOracle;
        let mut diagnostics = VecDiagnostics::new();
        let options = CompileOptions::new();
        let mut ctx = ctx_with(&declarations, &size_oracle, &mut diagnostics, &options);
        let mut builder = FunctionBuilder::new();

        let expr = Expr::ConditionalExpression {
            condition: Box::new(Expr::int(1)),
            then_branch: Box::new(Expr::int(10)),
            else_branch: Box::new(Expr::int(20)),
        };
        let ty = emit(&expr, &mut ctx, &mut builder).unwrap();
        assert_eq!(ty, Intrinsic::I32);
        assert!(matches!(
            builder.instructions(),
            [
                Instr::I32Const(10),
                Instr::I32Const(20),
                Instr::I32Const(1),
                Instr::Select,
            ]
        ));
    }

    #[test]
    fn integer_abs_expands_to_tee_and_conditional_negate() {
        let declarations = TestDeclarations::default();
        let size_oracle = TestSizeOracle;
        let mut diagnostics = VecDiagnostics::new();
        let options = CompileOptions::new();
        let mut ctx = ctx_with(&declarations, &size_oracle, &mut diagnostics, &options);
        let mut builder = FunctionBuilder::new();

        let expr = Expr::BuiltInFunctionInvocation {
            name: BuiltIn::Abs,
            args: vec![Expr::int(-5)],
        };
        let ty = emit(&expr, &mut ctx, &mut builder).unwrap();
        assert_eq!(ty, Intrinsic::I32);
        match builder.instructions() {
            [
                Instr::I32Const(-5),
                Instr::LocalTee(_),
                Instr::LocalGet(_),
                Instr::I32Const(0),
                Instr::BinOp(instr::BinOp::Lt(Signedness::Signed), MachineType::I32),
                Instr::If { then_branch, else_branch },
            ] => {
                assert_eq!(then_branch.len(), 3);
                assert_eq!(else_branch.len(), 1);
            }
            other => panic!("unexpected instruction sequence: {other:?}"),
        }
    }

    #[test]
    fn float_abs_emits_a_single_unop() {
        let declarations = TestDeclarations::default();
        let size_oracle = TestSizeOracle;
        let mut diagnostics = VecDiagnostics::new();
        let options = CompileOptions::new();
        let mut ctx = ctx_with(&declarations, &size_oracle, &mut diagnostics, &options);
        let mut builder = FunctionBuilder::new();

        let expr = Expr::BuiltInFunctionInvocation {
            name: BuiltIn::Abs,
            args: vec![Expr::Literal(Literal::Real(-2.5))],
        };
        emit(&expr, &mut ctx, &mut builder).unwrap();
        assert!(matches!(
            builder.instructions(),
            [Instr::F64Const(_), Instr::UnOp(instr::UnOp::Abs, MachineType::F64)]
        ));
    }

    #[test]
    fn float_only_builtin_on_integer_argument_reports_w150() {
        let declarations = TestDeclarations::default();
        let size_oracle = TestSizeOracle;
        let mut diagnostics = VecDiagnostics::new();
        let options = CompileOptions::new();
        let mut ctx = ctx_with(&declarations, &size_oracle, &mut diagnostics, &options);
        let mut builder = FunctionBuilder::new();

        let expr = Expr::BuiltInFunctionInvocation {
            name: BuiltIn::Sqrt,
            args: vec![Expr::int(4)],
        };
        assert!(emit(&expr, &mut ctx, &mut builder).is_none());
        assert_eq!(diagnostics.reports[0].0, crate::diagnostics::Code::W150);
    }

    #[test]
    fn cast_to_named_intrinsic_narrows_the_operand() {
        let declarations = TestDeclarations::default();
        let size_oracle = TestSizeOracle;
        let mut diagnostics = VecDiagnostics::new();
        let options = CompileOptions::new();
        let mut ctx = ctx_with(&declarations, &size_oracle, &mut diagnostics, &options);
        let mut builder = FunctionBuilder::new();

        let expr = Expr::TypeCast {
            target_name: "u8".into(),
            operand: Box::new(Expr::int(300)),
        };
        let ty = emit(&expr, &mut ctx, &mut builder).unwrap();
        assert_eq!(ty, Intrinsic::U8);
        assert!(matches!(
            builder.instructions(),
            [Instr::I32Const(300), Instr::AndMask { bits: 8 }]
        ));
    }
}
