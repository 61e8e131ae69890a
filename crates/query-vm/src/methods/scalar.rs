use super::{Invocation, MethodSpec, Param};
use crate::error::MethodError;
use crate::value::{Value, ValueKind};
use bigdecimal::BigDecimal;

const TEXT: &[Param] = &[Param::Value(ValueKind::Text)];

inventory::submit! {
    MethodSpec {
        name: "Upper",
        params: TEXT,
        returns: Some(ValueKind::Text),
        implementation: upper_fn,
    }
}

fn upper_fn(call: &mut Invocation<'_>) -> Result<Value, MethodError> {
    Ok(Value::Text(call.text(0)?.to_uppercase()))
}

inventory::submit! {
    MethodSpec {
        name: "Lower",
        params: TEXT,
        returns: Some(ValueKind::Text),
        implementation: lower_fn,
    }
}

fn lower_fn(call: &mut Invocation<'_>) -> Result<Value, MethodError> {
    Ok(Value::Text(call.text(0)?.to_lowercase()))
}

inventory::submit! {
    MethodSpec {
        name: "Length",
        params: TEXT,
        returns: Some(ValueKind::Int),
        implementation: length_fn,
    }
}

fn length_fn(call: &mut Invocation<'_>) -> Result<Value, MethodError> {
    let len = call.text(0)?.chars().count();
    i64::try_from(len)
        .map(Value::Int)
        .map_err(|_| MethodError::new("length overflow"))
}

inventory::submit! {
    MethodSpec {
        name: "Substring",
        params: &[
            Param::Value(ValueKind::Text),
            Param::Value(ValueKind::Int),
            Param::Value(ValueKind::Int),
        ],
        returns: Some(ValueKind::Text),
        implementation: substring_fn,
    }
}

/// `Substring(text, start, length)` with a zero-based character index. Ranges past the end are
/// clamped.
fn substring_fn(call: &mut Invocation<'_>) -> Result<Value, MethodError> {
    let text = call.text(0)?;
    let start = call.int(1)?;
    let len = call.int(2)?;
    if start < 0 || len < 0 {
        return Err(MethodError::new(format!(
            "invalid substring range (start {start}, length {len})"
        )));
    }
    let start = usize::try_from(start).unwrap_or(usize::MAX);
    let len = usize::try_from(len).unwrap_or(usize::MAX);
    Ok(Value::Text(text.chars().skip(start).take(len).collect()))
}

inventory::submit! {
    MethodSpec {
        name: "Concat",
        params: &[Param::Value(ValueKind::Text), Param::Value(ValueKind::Text)],
        returns: Some(ValueKind::Text),
        implementation: concat_fn,
    }
}

fn concat_fn(call: &mut Invocation<'_>) -> Result<Value, MethodError> {
    Ok(Value::Text(format!("{}{}", call.text(0)?, call.text(1)?)))
}

inventory::submit! {
    MethodSpec {
        name: "Abs",
        params: &[Param::Value(ValueKind::Decimal)],
        returns: Some(ValueKind::Decimal),
        implementation: abs_fn,
    }
}

fn abs_fn(call: &mut Invocation<'_>) -> Result<Value, MethodError> {
    Ok(Value::Decimal(call.decimal(0)?.abs()))
}

inventory::submit! {
    MethodSpec {
        name: "ToDecimal",
        params: &[Param::Value(ValueKind::Int)],
        returns: Some(ValueKind::Decimal),
        implementation: to_decimal_fn,
    }
}

fn to_decimal_fn(call: &mut Invocation<'_>) -> Result<Value, MethodError> {
    Ok(Value::Decimal(BigDecimal::from(call.int(0)?)))
}

inventory::submit! {
    MethodSpec {
        name: "Field",
        params: &[Param::InjectSource, Param::Value(ValueKind::Text)],
        returns: Some(ValueKind::Object),
        implementation: field_fn,
    }
}

fn field_fn(call: &mut Invocation<'_>) -> Result<Value, MethodError> {
    let name = call.text(1)?;
    call.row(0)?
        .get(name, call.groups())
        .ok_or_else(|| MethodError::new(format!("the current row has no field `{name}`")))
}
