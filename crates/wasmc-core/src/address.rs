//! Effective address computation for lvalue expressions.

use crate::builder::FunctionBuilder;
use crate::context::{CompileContext, Declaration};
use crate::diagnostics::{Code, Diagnostics};
use crate::expr::Expr;
use crate::instr::Instr;
use crate::types::StorageType;

/// The result of computing an lvalue's address: by the time this returns, the address itself
/// has already been emitted onto the builder's instruction stream, so only the resolved storage
/// type needs to be carried back up.
pub struct AddressResult {
    pub storage_type: StorageType,
}

/// Recursively computes the effective byte address of an lvalue expression, emitting the
/// arithmetic as it recurses.
///
/// Returns `Err(())` on any shape mismatch (member access on non-struct, dereference on
/// non-pointer, index on non-array, address-of on a non-addressable expression); the
/// corresponding [`Code`] has already been reported to `ctx.diagnostics`.
pub fn compute_address(
    expr: &Expr,
    ctx: &mut CompileContext<'_>,
    builder: &mut FunctionBuilder,
) -> Result<AddressResult, ()> {
    match expr {
        Expr::Identifier(name) => {
            if let Some(entry) = builder.locals.get(name) {
                // Function-locals do not have a byte address in linear memory; callers that
                // need an address (unary `&`) only reach here for memory variables. `&local`
                // is a non-addressable expression, so it fails with W146.
                let _ = entry;
                ctx.diagnostics.report(Code::W146, None);
                return Err(());
            }

            match ctx.declarations.lookup(name) {
                Some(Declaration::VariableDeclaration { address, spec }) => {
                    builder.push(Instr::I32Const(address as i32));
                    Ok(AddressResult { storage_type: spec })
                }
                Some(_) | None => {
                    ctx.diagnostics.report(Code::W142, None);
                    Err(())
                }
            }
        }
        Expr::DereferenceExpression(inner) => {
            let inner_result = compute_address(inner, ctx, builder)?;
            let StorageType::Pointer(pointee) = inner_result.storage_type else {
                ctx.diagnostics.report(Code::W152, None);
                return Err(());
            };
            builder.push(Instr::Load {
                kind: crate::instr::LoadKind::I32,
                offset: 0,
            });
            Ok(AddressResult {
                storage_type: *pointee,
            })
        }
        Expr::MemberAccess {
            object,
            member_name,
        } => {
            let object_result = compute_address(object, ctx, builder)?;
            let StorageType::Struct(s) = object_result.storage_type else {
                ctx.diagnostics.report(Code::W147, None);
                return Err(());
            };
            let Some(field) = ctx.declarations.struct_field(s, member_name) else {
                ctx.diagnostics.report(Code::W147, None);
                return Err(());
            };
            if field.offset != 0 {
                builder.push(Instr::I32Const(field.offset as i32));
                builder.push(Instr::BinOp(crate::instr::BinOp::Add, crate::types::MachineType::I32));
            }
            Ok(AddressResult {
                storage_type: field.ty,
            })
        }
        Expr::ItemAccess { array, index } => {
            let array_result = compute_address(array, ctx, builder)?;
            let StorageType::Array { element, .. } = array_result.storage_type else {
                ctx.diagnostics.report(Code::W149, None);
                return Err(());
            };
            let Some(index_type) = crate::emit::emit(index, ctx, builder) else {
                return Err(());
            };
            crate::cast::cast_value(builder, index_type, crate::types::Intrinsic::I32);
            let item_size = ctx.size_oracle.size_of(&element);
            builder.push(Instr::I32Const(item_size as i32));
            builder.push(Instr::BinOp(crate::instr::BinOp::Mul, crate::types::MachineType::I32));
            builder.push(Instr::BinOp(crate::instr::BinOp::Add, crate::types::MachineType::I32));
            Ok(AddressResult {
                storage_type: *element,
            })
        }
        _ => {
            ctx.diagnostics.report(Code::W146, None);
            Err(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::{TestDeclarations, TestSizeOracle};
    use crate::context::CompileOptions;
    use crate::diagnostics::VecDiagnostics;
    use crate::types::{Intrinsic, StructField, StructRef};

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
    fn memory_variable_pushes_its_address_constant() {
        let mut declarations = TestDeclarations::default();
        declarations.variables.insert(
            "g".into(),
            (100, StorageType::Intrinsic(Intrinsic::I32)),
        );
        let size_oracle = TestSizeOracle;
        let mut diagnostics = VecDiagnostics::new();
        let options = CompileOptions::new();
        let mut ctx = ctx_with(&declarations, &size_oracle, &mut diagnostics, &options);
        let mut builder = FunctionBuilder::new();

        let result = compute_address(&Expr::Identifier("g".into()), &mut ctx, &mut builder).unwrap();
        assert!(matches!(result.storage_type, StorageType::Intrinsic(Intrinsic::I32)));
        assert!(matches!(builder.instructions(), [Instr::I32Const(100)]));
    }

    #[test]
    fn address_of_a_local_fails_with_w146() {
        let declarations = TestDeclarations::default();
        let size_oracle = TestSizeOracle;
        let mut diagnostics = VecDiagnostics::new();
        let options = CompileOptions::new();
        let mut ctx = ctx_with(&declarations, &size_oracle, &mut diagnostics, &options);
        let mut builder = FunctionBuilder::new();
        builder
            .declare_local("local_var", StorageType::Intrinsic(Intrinsic::I32), MachineType::I32)
            .unwrap();

        let result = compute_address(&Expr::Identifier("local_var".into()), &mut ctx, &mut builder);
        assert!(result.is_err());
        assert_eq!(diagnostics.reports.len(), 1);
        assert_eq!(diagnostics.reports[0].0, crate::diagnostics::Code::W146);
    }

    #[test]
    fn member_access_adds_nonzero_offset() {
        let mut declarations = TestDeclarations::default();
        let s = StructRef(0);
        declarations.variables.insert(
            "obj".into(),
            (200, StorageType::Struct(s)),
        );
        declarations.struct_fields.insert(
            (s, "y".to_string()),
            StructField {
                name: "y".into(),
                ty: StorageType::Intrinsic(Intrinsic::F64),
                offset: 8,
            },
        );
        let size_oracle = TestSizeOracle;
        let mut diagnostics = VecDiagnostics::new();
        let options = CompileOptions::new();
        let mut ctx = ctx_with(&declarations, &size_oracle, &mut diagnostics, &options);
        let mut builder = FunctionBuilder::new();

        let expr = Expr::MemberAccess {
            object: Box::new(Expr::Identifier("obj".into())),
            member_name: "y".into(),
        };
        let result = compute_address(&expr, &mut ctx, &mut builder).unwrap();
        assert!(matches!(result.storage_type, StorageType::Intrinsic(Intrinsic::F64)));
        assert!(matches!(
            builder.instructions(),
            [
                Instr::I32Const(200),
                Instr::I32Const(8),
                Instr::BinOp(crate::instr::BinOp::Add, crate::types::MachineType::I32)
            ]
        ));
    }

    #[test]
    fn member_access_at_offset_zero_skips_the_add() {
        let mut declarations = TestDeclarations::default();
        let s = StructRef(0);
        declarations.variables.insert("obj".into(), (200, StorageType::Struct(s)));
        declarations.struct_fields.insert(
            (s, "x".to_string()),
            StructField {
                name: "x".into(),
                ty: StorageType::Intrinsic(Intrinsic::I32),
                offset: 0,
            },
        );
        let size_oracle = TestSizeOracle;
        let mut diagnostics = VecDiagnostics::new();
        let options = CompileOptions::new();
        let mut ctx = ctx_with(&declarations, &size_oracle, &mut diagnostics, &options);
        let mut builder = FunctionBuilder::new();

        let expr = Expr::MemberAccess {
            object: Box::new(Expr::Identifier("obj".into())),
            member_name: "x".into(),
        };
        compute_address(&expr, &mut ctx, &mut builder).unwrap();
        assert!(matches!(builder.instructions(), [Instr::I32Const(200)]));
    }

    #[test]
    fn dereference_of_non_pointer_fails_with_w152() {
        let mut declarations = TestDeclarations::default();
        declarations.variables.insert(
            "n".into(),
            (4, StorageType::Intrinsic(Intrinsic::I32)),
        );
        let size_oracle = TestSizeOracle;
        let mut diagnostics = VecDiagnostics::new();
        let options = CompileOptions::new();
        let mut ctx = ctx_with(&declarations, &size_oracle, &mut diagnostics, &options);
        let mut builder = FunctionBuilder::new();

        let expr = Expr::DereferenceExpression(Box::new(Expr::Identifier("n".into())));
        assert!(compute_address(&expr, &mut ctx, &mut builder).is_err());
        assert_eq!(diagnostics.reports[0].0, crate::diagnostics::Code::W152);
    }

    #[test]
    fn item_access_scales_index_by_element_size() {
        let mut declarations = TestDeclarations::default();
        declarations.variables.insert(
            "arr".into(),
            (
                0,
                StorageType::Array {
                    element: Box::new(StorageType::Intrinsic(Intrinsic::F64)),
                    count: 10,
                },
            ),
        );
        let size_oracle = TestSizeOracle;
        let mut diagnostics = VecDiagnostics::new();
        let options = CompileOptions::new();
        let mut ctx = ctx_with(&declarations, &size_oracle, &mut diagnostics, &options);
        let mut builder = FunctionBuilder::new();

        let expr = Expr::ItemAccess {
            array: Box::new(Expr::Identifier("arr".into())),
            index: Box::new(Expr::int(3)),
        };
        let result = compute_address(&expr, &mut ctx, &mut builder).unwrap();
        assert!(matches!(result.storage_type, StorageType::Intrinsic(Intrinsic::F64)));
        assert!(matches!(
            builder.instructions(),
            [
                Instr::I32Const(0),
                Instr::I32Const(3),
                Instr::I32Const(8),
                Instr::BinOp(crate::instr::BinOp::Mul, crate::types::MachineType::I32),
                Instr::BinOp(crate::instr::BinOp::Add, crate::types::MachineType::I32),
            ]
        ));
    }
}
