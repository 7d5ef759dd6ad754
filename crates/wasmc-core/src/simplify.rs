//! The pure expression-tree simplifier.
//!
//! Four passes run, in order, across the whole tree; the four-pass sequence itself repeats
//! until one entire sweep causes no change anywhere. This mirrors the same fixed-point shape
//! the [peephole optimizer](crate::optimize) uses one layer down the pipeline.
//!
//! Nodes are mutated in place (`&mut Expr`, via [`std::mem::replace`]) rather than rebuilt into
//! a fresh tree, since in-place rewriting is the cheaper of the two.
//!
//! The conditional-branch visitor here assigns each rewritten child back to itself (the
//! rewritten `else_branch` is assigned to `else_branch`, not `condition`) -- see the resolved
//! open question in `DESIGN.md`.

use crate::context::{Declarations, SizeOracle};
use crate::expr::{BinaryOp, BuiltIn, Expr, TypeSpec, UnaryOp};
use crate::literal::Literal;
use crate::types::{Intrinsic, StorageType};
use num_bigint::BigInt;

/// Bundles the two read-only collaborators the simplifier needs: the declaration table (for
/// resolving named constants and `sizeof` type names) and the size oracle (for the `sizeof`
/// byte count itself). Kept as one small struct, rather than threading two `&dyn` references
/// through every helper positionally.
#[derive(Clone, Copy)]
pub struct SimplifyContext<'a> {
    pub declarations: &'a dyn Declarations,
    pub size_oracle: &'a dyn SizeOracle,
}

/// Runs the simplifier to a fixed point.
pub fn simplify(expr: &mut Expr, ctx: SimplifyContext<'_>) {
    loop {
        let mut changed = false;
        changed |= pass_identity(expr);
        changed |= pass_reorder(expr);
        changed |= pass_refold(expr);
        changed |= pass_constant_fold(expr, ctx);
        if !changed {
            break;
        }
    }
}

/// Applies `f` to every direct child of `expr`, recursing first (post-order), returning whether
/// any child changed. Used as the common recursion skeleton for every pass below.
fn visit_children(expr: &mut Expr, f: &mut impl FnMut(&mut Expr) -> bool) -> bool {
    let mut changed = false;
    match expr {
        Expr::Literal(_) | Expr::Identifier(_) | Expr::SizeOfExpression(_) => {}
        Expr::UnaryExpression { operand, .. } => changed |= f(operand),
        Expr::BinaryExpression { left, right, .. } => {
            changed |= f(left);
            changed |= f(right);
        }
        Expr::ConditionalExpression {
            condition,
            then_branch,
            else_branch,
        } => {
            changed |= f(condition);
            changed |= f(then_branch);
            changed |= f(else_branch);
        }
        Expr::TypeCast { operand, .. } => changed |= f(operand),
        Expr::MemberAccess { object, .. } => changed |= f(object),
        Expr::ItemAccess { array, index } => {
            changed |= f(array);
            changed |= f(index);
        }
        Expr::DereferenceExpression(inner) => changed |= f(inner),
        Expr::BuiltInFunctionInvocation { args, .. } => {
            for arg in args {
                changed |= f(arg);
            }
        }
        Expr::FunctionInvocation { callee, args } => {
            changed |= f(callee);
            for arg in args {
                changed |= f(arg);
            }
        }
    }
    changed
}

// ---------------------------------------------------------------------------------------------
// Pass 1: remove trivial literals from binary ops.
// ---------------------------------------------------------------------------------------------

fn pass_identity(expr: &mut Expr) -> bool {
    let mut changed = visit_children(expr, &mut pass_identity);
    if let Some(replacement) = try_identity(expr) {
        *expr = replacement;
        changed = true;
    }
    changed
}

fn try_identity(expr: &Expr) -> Option<Expr> {
    let Expr::BinaryExpression { op, left, right } = expr else {
        return None;
    };

    let left_lit = left.as_literal();
    let right_lit = right.as_literal();
    let left_zero = left_lit.is_some_and(Literal::is_zero);
    let right_zero = right_lit.is_some_and(Literal::is_zero);
    let left_one = left_lit.is_some_and(Literal::is_one);
    let right_one = right_lit.is_some_and(Literal::is_one);

    match op {
        BinaryOp::Add | BinaryOp::BitOr | BinaryOp::BitXor => {
            if left_zero {
                return Some((**right).clone());
            }
            if right_zero {
                return Some((**left).clone());
            }
        }
        BinaryOp::Sub => {
            if left_zero {
                return Some(Expr::UnaryExpression {
                    op: UnaryOp::Neg,
                    operand: right.clone(),
                });
            }
            if right_zero {
                return Some((**left).clone());
            }
            // `X - (-L)` carries a redundant double negation once a literal re-fold (pass 3) has
            // produced a negative subtrahend; canonicalize to `X + L`. One direction only -- `X +
            // (-L)` is left alone, so this doesn't fight pass 3's own sign convention.
            if let Some(r) = right_lit {
                if r.is_negative() {
                    return Some(Expr::BinaryExpression {
                        op: BinaryOp::Add,
                        left: left.clone(),
                        right: Box::new(Expr::Literal(r.negate())),
                    });
                }
            }
        }
        BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => {
            if right_zero {
                return Some((**left).clone());
            }
        }
        BinaryOp::Mul => {
            if left_one {
                return Some((**right).clone());
            }
            if right_one {
                return Some((**left).clone());
            }
        }
        BinaryOp::Div => {
            if right_one {
                return Some((**left).clone());
            }
        }
        BinaryOp::Rem => {
            if right_one {
                return Some(Expr::int(0));
            }
        }
        BinaryOp::BitAnd => {
            if left_zero || right_zero {
                return Some(Expr::int(0));
            }
        }
        _ => {}
    }
    None
}

// ---------------------------------------------------------------------------------------------
// Pass 2: order literals to the right for commutative operators.
// ---------------------------------------------------------------------------------------------

fn pass_reorder(expr: &mut Expr) -> bool {
    let mut changed = visit_children(expr, &mut pass_reorder);
    if let Expr::BinaryExpression { op, left, right } = expr {
        if op.is_commutative() && left.is_literal() && !right.is_literal() {
            std::mem::swap(left, right);
            changed = true;
        }
    }
    changed
}

// ---------------------------------------------------------------------------------------------
// Pass 3: re-fold additive literal chains.
// ---------------------------------------------------------------------------------------------

fn pass_refold(expr: &mut Expr) -> bool {
    let mut changed = visit_children(expr, &mut pass_refold);
    if let Some(replacement) = try_refold(expr) {
        *expr = replacement;
        changed = true;
    }
    changed
}

fn try_refold(expr: &Expr) -> Option<Expr> {
    let Expr::BinaryExpression {
        op: op1,
        left,
        right: l1,
    } = expr
    else {
        return None;
    };
    if !op1.is_additive() {
        return None;
    }
    let l1 = l1.as_literal()?;

    let Expr::BinaryExpression {
        op: op2,
        left: x,
        right: l2,
    } = left.as_ref()
    else {
        return None;
    };
    if !op2.is_additive() {
        return None;
    }
    let l2 = l2.as_literal()?;

    // ++ -> L2+L1; +- -> L2-L1; -+ -> L2-L1; -- -> L2+L1
    let combine_op = if *op1 == *op2 {
        BinaryOp::Add
    } else {
        BinaryOp::Sub
    };
    let folded = eval_binary_literal(combine_op, l2, l1)?;

    Some(Expr::BinaryExpression {
        op: *op2,
        left: x.clone(),
        right: Box::new(Expr::Literal(folded)),
    })
}

// ---------------------------------------------------------------------------------------------
// Pass 4: constant folding.
// ---------------------------------------------------------------------------------------------

fn pass_constant_fold(expr: &mut Expr, ctx: SimplifyContext<'_>) -> bool {
    let mut changed = visit_children(expr, &mut |e| pass_constant_fold(e, ctx));
    if let Some(replacement) = try_constant_fold(expr, ctx) {
        *expr = replacement;
        changed = true;
    }
    changed
}

fn try_constant_fold(expr: &Expr, ctx: SimplifyContext<'_>) -> Option<Expr> {
    match expr {
        Expr::Identifier(name) => match ctx.declarations.lookup(name) {
            Some(crate::context::Declaration::ConstDeclaration(value)) => {
                Some(Expr::Literal(value))
            }
            _ => None,
        },
        Expr::ConditionalExpression {
            condition,
            then_branch,
            else_branch,
        } => {
            let cond = condition.as_literal()?;
            then_branch.as_literal()?;
            else_branch.as_literal()?;
            if cond.is_zero() {
                Some((**else_branch).clone())
            } else {
                Some((**then_branch).clone())
            }
        }
        Expr::UnaryExpression { op, operand } => {
            let lit = operand.as_literal()?;
            fold_unary(*op, lit).map(Expr::Literal)
        }
        Expr::BinaryExpression { op, left, right } => {
            let l = left.as_literal()?;
            let r = right.as_literal()?;
            eval_binary_literal(*op, l, r).map(Expr::Literal)
        }
        Expr::BuiltInFunctionInvocation { name, args } => {
            let lits: Option<Vec<&Literal>> = args.iter().map(Expr::as_literal).collect();
            let lits = lits?;
            fold_builtin(*name, &lits).map(Expr::Literal)
        }
        Expr::TypeCast {
            target_name,
            operand,
        } => {
            let lit = operand.as_literal()?;
            let target = Intrinsic::from_name(target_name)?;
            crate::cast::fold_cast(lit, target).map(Expr::Literal)
        }
        Expr::SizeOfExpression(spec) => {
            let resolved = resolve_type_spec(ctx.declarations, spec)?;
            let size = ctx.size_oracle.size_of(&resolved);
            Some(Expr::int(size as i64))
        }
        _ => None,
    }
}

/// Resolves a source `sizeof(...)` type spec into a fully-resolved [`StorageType`].
fn resolve_type_spec(ctx: &dyn Declarations, spec: &TypeSpec) -> Option<StorageType> {
    match spec {
        TypeSpec::Named(name) => {
            if let Some(intrinsic) = Intrinsic::from_name(name) {
                return Some(StorageType::Intrinsic(intrinsic));
            }
            match ctx.lookup(name) {
                Some(crate::context::Declaration::GlobalDeclaration(_, ty)) => Some(ty),
                Some(crate::context::Declaration::VariableDeclaration { spec, .. }) => Some(spec),
                _ => None,
            }
        }
        TypeSpec::Pointer(inner) => {
            resolve_type_spec(ctx, inner).map(|t| StorageType::Pointer(Box::new(t)))
        }
        TypeSpec::Array { element, count } => {
            let element = resolve_type_spec(ctx, element)?;
            let count = count.as_literal()?;
            let count = match count {
                Literal::Int(i) => u32::try_from(*i).ok()?,
                _ => return None,
            };
            Some(StorageType::Array {
                element: Box::new(element),
                count,
            })
        }
    }
}

// ---------------------------------------------------------------------------------------------
// Literal arithmetic shared by pass 3 and pass 4.
// ---------------------------------------------------------------------------------------------

/// Evaluates a binary operator over two literals in host arithmetic: arbitrary-precision when
/// either operand is [`Literal::BigInt`], host doubles otherwise.
pub(crate) fn eval_binary_literal(op: BinaryOp, l: &Literal, r: &Literal) -> Option<Literal> {
    if op.is_comparison() {
        let ord = compare_literals(l, r);
        let result = match op {
            BinaryOp::Eq => ord == Some(std::cmp::Ordering::Equal),
            BinaryOp::Ne => ord != Some(std::cmp::Ordering::Equal),
            BinaryOp::Lt => ord == Some(std::cmp::Ordering::Less),
            BinaryOp::Le => matches!(
                ord,
                Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
            ),
            BinaryOp::Gt => ord == Some(std::cmp::Ordering::Greater),
            BinaryOp::Ge => matches!(
                ord,
                Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
            ),
            _ => unreachable!(),
        };
        return Some(Literal::Int(result as i64));
    }

    if matches!(l, Literal::Real(_)) || matches!(r, Literal::Real(_)) {
        let a = l.as_f64();
        let b = r.as_f64();
        let value = eval_float_binary(op, a, b)?;
        return Some(Literal::Real(value));
    }

    if matches!(l, Literal::BigInt(_)) || matches!(r, Literal::BigInt(_)) {
        let a = l.as_bigint()?;
        let b = r.as_bigint()?;
        return eval_bigint_binary(op, &a, &b).map(Literal::BigInt);
    }

    // Both `Int`: try native `i64` arithmetic first, falling back to `BigInt` on overflow so
    // the fold is never skipped just because the host machine word is narrower than needed.
    let Literal::Int(a) = l else { unreachable!() };
    let Literal::Int(b) = r else { unreachable!() };
    if let Some(value) = eval_int_binary_checked(op, *a, *b) {
        return Some(Literal::Int(value));
    }
    let a = BigInt::from(*a);
    let b = BigInt::from(*b);
    eval_bigint_binary(op, &a, &b).map(Literal::BigInt)
}

fn compare_literals(l: &Literal, r: &Literal) -> Option<std::cmp::Ordering> {
    if matches!(l, Literal::Real(_)) || matches!(r, Literal::Real(_)) {
        return l.as_f64().partial_cmp(&r.as_f64());
    }
    Some(l.as_bigint()?.cmp(&r.as_bigint()?))
}

fn eval_float_binary(op: BinaryOp, a: f64, b: f64) -> Option<f64> {
    Some(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => return None,
    })
}

fn eval_int_binary_checked(op: BinaryOp, a: i64, b: i64) -> Option<i64> {
    Some(match op {
        BinaryOp::Add => a.checked_add(b)?,
        BinaryOp::Sub => a.checked_sub(b)?,
        BinaryOp::Mul => a.checked_mul(b)?,
        BinaryOp::Div => a.checked_div(b)?,
        BinaryOp::Rem => a.checked_rem(b)?,
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        BinaryOp::Shl => a.checked_shl(u32::try_from(b).ok()?)?,
        BinaryOp::Shr => a.checked_shr(u32::try_from(b).ok()?)?,
        BinaryOp::UShr => ((a as u64) >> (b as u64 & 63)) as i64,
        _ => return None,
    })
}

fn eval_bigint_binary(op: BinaryOp, a: &BigInt, b: &BigInt) -> Option<BigInt> {
    use num_traits::ToPrimitive;
    Some(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b.sign() == num_bigint::Sign::NoSign {
                return None;
            }
            a / b
        }
        BinaryOp::Rem => {
            if b.sign() == num_bigint::Sign::NoSign {
                return None;
            }
            a % b
        }
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        BinaryOp::Shl => a << b.to_u32()?,
        BinaryOp::Shr => a >> b.to_u32()?,
        BinaryOp::UShr => return None,
        _ => return None,
    })
}

fn fold_unary(op: UnaryOp, lit: &Literal) -> Option<Literal> {
    match op {
        UnaryOp::Neg => Some(lit.negate()),
        UnaryOp::Not => Some(Literal::Int(lit.is_zero() as i64)),
        UnaryOp::BitNot => match lit {
            Literal::Int(i) => Some(Literal::Int(!i)),
            Literal::BigInt(b) => Some(Literal::BigInt(!b.clone())),
            Literal::Real(_) => None,
        },
        UnaryOp::Plus | UnaryOp::AddressOf => None,
    }
}

fn fold_builtin(name: BuiltIn, args: &[&Literal]) -> Option<Literal> {
    let any_real = args.iter().any(|l| matches!(l, Literal::Real(_)));
    let any_bigint = args.iter().any(|l| matches!(l, Literal::BigInt(_)));

    match name {
        BuiltIn::Abs => {
            let a = args.first()?;
            if any_real {
                Some(Literal::Real(a.as_f64().abs()))
            } else if any_bigint {
                Some(Literal::BigInt(a.as_bigint()?.magnitude().clone().into()))
            } else if let Literal::Int(i) = a {
                i.checked_abs().map(Literal::Int)
            } else {
                None
            }
        }
        BuiltIn::Neg => {
            let a = args.first()?;
            Some(a.negate())
        }
        BuiltIn::Min | BuiltIn::Max => {
            let mut iter = args.iter();
            let mut acc = (*iter.next()?).clone();
            for next in iter {
                let a = acc.as_f64();
                let b = next.as_f64();
                let pick_left = if name == BuiltIn::Min { a <= b } else { a >= b };
                acc = if pick_left { acc } else { (*next).clone() };
            }
            Some(Literal::Real(acc.as_f64()))
        }
        BuiltIn::Floor => Some(Literal::Real(args.first()?.as_f64().floor())),
        BuiltIn::Ceil => Some(Literal::Real(args.first()?.as_f64().ceil())),
        BuiltIn::Trunc => Some(Literal::Real(args.first()?.as_f64().trunc())),
        BuiltIn::Nearest => Some(Literal::Real(round_ties_even(args.first()?.as_f64()))),
        BuiltIn::Sqrt => Some(Literal::Real(args.first()?.as_f64().sqrt())),
        BuiltIn::CopySign => {
            let a = args.first()?.as_f64();
            let b = args.get(1)?.as_f64();
            Some(Literal::Real(a.copysign(b)))
        }
        BuiltIn::Clz | BuiltIn::Ctz | BuiltIn::Popcnt => {
            let a = args.first()?;
            // Int literals are later emitted as `i32.const`, BigInt as `i64.const`; bit-counting built-ins must agree with the width the value will
            // actually be emitted at.
            let (bits, width): (u64, u32) = match a {
                Literal::Int(i) => (*i as u32 as u64, 32),
                Literal::BigInt(b) => (Literal::narrow_bigint_unsigned64(b), 64),
                Literal::Real(_) => return None,
            };
            let value = match name {
                BuiltIn::Clz => (bits.leading_zeros() - (64 - width)) as i64,
                BuiltIn::Ctz => {
                    if bits == 0 {
                        width as i64
                    } else {
                        bits.trailing_zeros() as i64
                    }
                }
                BuiltIn::Popcnt => bits.count_ones() as i64,
                _ => unreachable!(),
            };
            Some(Literal::Int(value))
        }
    }
}

fn round_ties_even(x: f64) -> f64 {
    let rounded = x.round();
    if (x - x.trunc()).abs() == 0.5 && (rounded as i64) % 2 != 0 {
        rounded - x.signum()
    } else {
        rounded
    }
}
