//! Per-group aggregates.
//!
//! `SetX` methods fold the current row into the aggregate stored on the injected group under
//! the injected group-access name; `X` methods read it back. Because the aggregate lives in the
//! group, a group row can also resolve it directly by that name.
use super::{Invocation, MethodSpec, Param};
use crate::error::MethodError;
use crate::value::{Value, ValueKind};
use bigdecimal::{BigDecimal, Zero};

const GROUP_AND_NAME: &[Param] = &[Param::InjectGroup, Param::InjectGroupName];
const GROUP_NAME_AND_DECIMAL: &[Param] = &[
    Param::InjectGroup,
    Param::InjectGroupName,
    Param::Value(ValueKind::Decimal),
];

fn sum_key(name: &str) -> String {
    format!("{name}#sum")
}

fn count_key(name: &str) -> String {
    format!("{name}#count")
}

inventory::submit! {
    MethodSpec {
        name: "Count",
        params: GROUP_AND_NAME,
        returns: Some(ValueKind::Int),
        implementation: count_fn,
    }
}

fn count_fn(call: &mut Invocation<'_>) -> Result<Value, MethodError> {
    let (group, name) = call.aggregate_target(0, 1)?;
    Ok(group.aggregate(&name).cloned().unwrap_or(Value::Int(0)))
}

inventory::submit! {
    MethodSpec {
        name: "SetCount",
        params: GROUP_AND_NAME,
        returns: None,
        implementation: set_count_fn,
    }
}

fn set_count_fn(call: &mut Invocation<'_>) -> Result<Value, MethodError> {
    let (group, name) = call.aggregate_target(0, 1)?;
    let current = group.aggregate(&name).and_then(Value::as_int).unwrap_or(0);
    let next = current
        .checked_add(1)
        .ok_or_else(|| MethodError::new("count overflow"))?;
    group.set_aggregate(name, Value::Int(next));
    Ok(Value::Null)
}

inventory::submit! {
    MethodSpec {
        name: "Sum",
        params: GROUP_AND_NAME,
        returns: Some(ValueKind::Decimal),
        implementation: sum_fn,
    }
}

fn sum_fn(call: &mut Invocation<'_>) -> Result<Value, MethodError> {
    let (group, name) = call.aggregate_target(0, 1)?;
    Ok(group
        .aggregate(&name)
        .cloned()
        .unwrap_or_else(|| Value::Decimal(BigDecimal::zero())))
}

inventory::submit! {
    MethodSpec {
        name: "SetSum",
        params: GROUP_NAME_AND_DECIMAL,
        returns: None,
        implementation: set_sum_fn,
    }
}

fn set_sum_fn(call: &mut Invocation<'_>) -> Result<Value, MethodError> {
    let value = call.decimal(2)?.clone();
    let (group, name) = call.aggregate_target(0, 1)?;
    let total = match group.aggregate(&name).and_then(Value::as_decimal) {
        Some(current) => current + &value,
        None => value,
    };
    group.set_aggregate(name, Value::Decimal(total));
    Ok(Value::Null)
}

inventory::submit! {
    MethodSpec {
        name: "Avg",
        params: GROUP_AND_NAME,
        returns: Some(ValueKind::Decimal),
        implementation: avg_fn,
    }
}

fn avg_fn(call: &mut Invocation<'_>) -> Result<Value, MethodError> {
    let (group, name) = call.aggregate_target(0, 1)?;
    Ok(group
        .aggregate(&name)
        .cloned()
        .unwrap_or_else(|| Value::Decimal(BigDecimal::zero())))
}

inventory::submit! {
    MethodSpec {
        name: "SetAvg",
        params: GROUP_NAME_AND_DECIMAL,
        returns: None,
        implementation: set_avg_fn,
    }
}

fn set_avg_fn(call: &mut Invocation<'_>) -> Result<Value, MethodError> {
    let value = call.decimal(2)?.clone();
    let (group, name) = call.aggregate_target(0, 1)?;

    let (sum_key, count_key) = (sum_key(&name), count_key(&name));
    let sum = match group.aggregate(&sum_key).and_then(Value::as_decimal) {
        Some(current) => current + &value,
        None => value,
    };
    let count = group.aggregate(&count_key).and_then(Value::as_int).unwrap_or(0) + 1;
    let avg = &sum / &BigDecimal::from(count);

    group.set_aggregate(sum_key, Value::Decimal(sum));
    group.set_aggregate(count_key, Value::Int(count));
    group.set_aggregate(name, Value::Decimal(avg));
    Ok(Value::Null)
}

inventory::submit! {
    MethodSpec {
        name: "Min",
        params: GROUP_AND_NAME,
        returns: Some(ValueKind::Object),
        implementation: read_aggregate_fn,
    }
}

inventory::submit! {
    MethodSpec {
        name: "Max",
        params: GROUP_AND_NAME,
        returns: Some(ValueKind::Object),
        implementation: read_aggregate_fn,
    }
}

/// Reads an aggregate that may not exist yet (`null` before the first row).
fn read_aggregate_fn(call: &mut Invocation<'_>) -> Result<Value, MethodError> {
    let (group, name) = call.aggregate_target(0, 1)?;
    Ok(group.aggregate(&name).cloned().unwrap_or_default())
}

inventory::submit! {
    MethodSpec {
        name: "SetMin",
        params: GROUP_NAME_AND_DECIMAL,
        returns: None,
        implementation: set_min_fn,
    }
}

fn set_min_fn(call: &mut Invocation<'_>) -> Result<Value, MethodError> {
    fold_extreme(call, |candidate, current| candidate < current)
}

inventory::submit! {
    MethodSpec {
        name: "SetMax",
        params: GROUP_NAME_AND_DECIMAL,
        returns: None,
        implementation: set_max_fn,
    }
}

fn set_max_fn(call: &mut Invocation<'_>) -> Result<Value, MethodError> {
    fold_extreme(call, |candidate, current| candidate > current)
}

fn fold_extreme(
    call: &mut Invocation<'_>,
    replaces: fn(&BigDecimal, &BigDecimal) -> bool,
) -> Result<Value, MethodError> {
    let value = call.decimal(2)?.clone();
    let (group, name) = call.aggregate_target(0, 1)?;
    let keep_current = group
        .aggregate(&name)
        .and_then(Value::as_decimal)
        .is_some_and(|current| !replaces(&value, current));
    if !keep_current {
        group.set_aggregate(name, Value::Decimal(value));
    }
    Ok(Value::Null)
}

inventory::submit! {
    MethodSpec {
        name: "Hits",
        params: &[Param::InjectGroup],
        returns: Some(ValueKind::Int),
        implementation: hits_fn,
    }
}

fn hits_fn(call: &mut Invocation<'_>) -> Result<Value, MethodError> {
    let id = call.group(0)?;
    let hits = call.groups().get(id).hits();
    i64::try_from(hits)
        .map(Value::Int)
        .map_err(|_| MethodError::new("hit counter overflow"))
}
