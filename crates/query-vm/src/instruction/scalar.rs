use super::{ArithmeticOp, CompareOp};
use crate::context::ExecutionContext;
use crate::error::{VmError, VmResult};
use crate::register::Register;
use crate::value::{Value, ValueKind};
use bigdecimal::Zero;
use std::cmp::Ordering;

pub(super) fn push(ctx: &mut ExecutionContext, kind: ValueKind, value: &Value) -> VmResult<()> {
    ctx.stacks
        .push(kind, value.clone())
        .map_err(|found| VmError::TypeMismatch {
            what: format!("literal {value}"),
            expected: kind,
            found,
        })?;
    ctx.registers.advance();
    Ok(())
}

pub(super) fn pop(ctx: &mut ExecutionContext, kind: ValueKind) -> VmResult<()> {
    match kind {
        ValueKind::Bool => {
            ctx.stacks.pop_bool();
        }
        ValueKind::Int => {
            ctx.stacks.pop_int();
        }
        ValueKind::Decimal => {
            ctx.stacks.pop_decimal();
        }
        ValueKind::Text => {
            ctx.stacks.pop_text();
        }
        ValueKind::Object => {
            ctx.stacks.pop_object();
        }
    }
    ctx.registers.advance();
    Ok(())
}

pub(super) fn set_register(
    ctx: &mut ExecutionContext,
    register: Register,
    value: i64,
) -> VmResult<()> {
    ctx.registers[register] = value;
    if register != Register::Ip {
        ctx.registers.advance();
    }
    Ok(())
}

pub(super) fn and(ctx: &mut ExecutionContext) -> VmResult<()> {
    let right = ctx.stacks.pop_bool();
    let left = ctx.stacks.pop_bool();
    ctx.stacks.push_bool(left && right);
    ctx.registers.advance();
    Ok(())
}

pub(super) fn or(ctx: &mut ExecutionContext) -> VmResult<()> {
    let right = ctx.stacks.pop_bool();
    let left = ctx.stacks.pop_bool();
    ctx.stacks.push_bool(left || right);
    ctx.registers.advance();
    Ok(())
}

pub(super) fn not(ctx: &mut ExecutionContext) -> VmResult<()> {
    let value = ctx.stacks.pop_bool();
    ctx.stacks.push_bool(!value);
    ctx.registers.advance();
    Ok(())
}

fn holds(op: CompareOp, ordering: Ordering) -> bool {
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
    }
}

/// Ordering between two values of the same primitive kind.
fn order_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
        (Value::Decimal(l), Value::Decimal(r)) => Some(l.cmp(r)),
        (Value::Text(l), Value::Text(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

pub(super) fn compare(ctx: &mut ExecutionContext, kind: ValueKind, op: CompareOp) -> VmResult<()> {
    let result = match kind {
        ValueKind::Bool => {
            let right = ctx.stacks.pop_bool();
            let left = ctx.stacks.pop_bool();
            holds(op, left.cmp(&right))
        }
        ValueKind::Int => {
            let right = ctx.stacks.pop_int();
            let left = ctx.stacks.pop_int();
            holds(op, left.cmp(&right))
        }
        ValueKind::Decimal => {
            let right = ctx.stacks.pop_decimal();
            let left = ctx.stacks.pop_decimal();
            holds(op, left.cmp(&right))
        }
        ValueKind::Text => {
            let right = ctx.stacks.pop_text();
            let left = ctx.stacks.pop_text();
            holds(op, left.cmp(&right))
        }
        ValueKind::Object => {
            let right = ctx.stacks.pop(ValueKind::Object)?;
            let left = ctx.stacks.pop(ValueKind::Object)?;
            match op {
                CompareOp::Eq => left == right,
                CompareOp::Ne => left != right,
                _ => {
                    let ordering = order_values(&left, &right).ok_or(
                        VmError::UnsupportedOperation {
                            op: op.as_str(),
                            kind: ValueKind::Object,
                        },
                    )?;
                    holds(op, ordering)
                }
            }
        }
    };
    ctx.stacks.push_bool(result);
    ctx.registers.advance();
    Ok(())
}

fn int_op(op: ArithmeticOp, left: i64, right: i64) -> VmResult<i64> {
    if matches!(op, ArithmeticOp::Div | ArithmeticOp::Mod) && right == 0 {
        return Err(VmError::DivisionByZero);
    }
    let result = match op {
        ArithmeticOp::Add => left.checked_add(right),
        ArithmeticOp::Sub => left.checked_sub(right),
        ArithmeticOp::Mul => left.checked_mul(right),
        ArithmeticOp::Div => left.checked_div(right),
        ArithmeticOp::Mod => left.checked_rem(right),
    };
    result.ok_or(VmError::Overflow(op.as_str()))
}

pub(super) fn arithmetic(
    ctx: &mut ExecutionContext,
    kind: ValueKind,
    op: ArithmeticOp,
) -> VmResult<()> {
    match kind {
        ValueKind::Int => {
            let right = ctx.stacks.pop_int();
            let left = ctx.stacks.pop_int();
            ctx.stacks.push_int(int_op(op, left, right)?);
        }
        ValueKind::Decimal => {
            let right = ctx.stacks.pop_decimal();
            let left = ctx.stacks.pop_decimal();
            let result = match op {
                ArithmeticOp::Add => left + right,
                ArithmeticOp::Sub => left - right,
                ArithmeticOp::Mul => left * right,
                ArithmeticOp::Div | ArithmeticOp::Mod if right.is_zero() => {
                    return Err(VmError::DivisionByZero)
                }
                ArithmeticOp::Div => left / right,
                ArithmeticOp::Mod => left % right,
            };
            ctx.stacks.push_decimal(result);
        }
        ValueKind::Text if op == ArithmeticOp::Add => {
            let right = ctx.stacks.pop_text();
            let mut left = ctx.stacks.pop_text();
            left.push_str(&right);
            ctx.stacks.push_text(left);
        }
        kind => {
            return Err(VmError::UnsupportedOperation {
                op: op.as_str(),
                kind,
            })
        }
    }
    ctx.registers.advance();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    #[test]
    fn int_arithmetic_reports_overflow_and_division_by_zero() {
        assert_eq!(int_op(ArithmeticOp::Add, 2, 3).unwrap(), 5);
        assert_eq!(int_op(ArithmeticOp::Mod, 7, 3).unwrap(), 1);
        assert!(matches!(
            int_op(ArithmeticOp::Div, 1, 0),
            Err(VmError::DivisionByZero)
        ));
        assert!(matches!(
            int_op(ArithmeticOp::Mul, i64::MAX, 2),
            Err(VmError::Overflow("MUL"))
        ));
    }

    #[test]
    fn decimal_division() {
        let mut ctx = ExecutionContext::default();
        ctx.stacks.push_decimal(BigDecimal::from(1));
        ctx.stacks.push_decimal(BigDecimal::from(4));
        arithmetic(&mut ctx, ValueKind::Decimal, ArithmeticOp::Div).unwrap();
        assert_eq!(ctx.stacks.pop_decimal(), BigDecimal::from_str("0.25").unwrap());
        assert_eq!(ctx.registers.ip(), 1);
    }

    #[test]
    fn object_ordering_requires_matching_kinds() {
        let mut ctx = ExecutionContext::default();
        ctx.stacks.push(ValueKind::Object, Value::Int(1)).unwrap();
        ctx.stacks.push(ValueKind::Object, Value::from("1")).unwrap();
        assert!(matches!(
            compare(&mut ctx, ValueKind::Object, CompareOp::Lt),
            Err(VmError::UnsupportedOperation { op: "LT", .. })
        ));

        ctx.stacks.push(ValueKind::Object, Value::Null).unwrap();
        ctx.stacks.push(ValueKind::Object, Value::Null).unwrap();
        compare(&mut ctx, ValueKind::Object, CompareOp::Eq).unwrap();
        assert!(ctx.stacks.pop_bool());
    }
}
