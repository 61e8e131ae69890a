//! Call marshalling.
//!
//! `PrepareMethodCall` lays out every parameter on its stack in declaration order, substituting
//! injected context values for injected parameters, and pushes the callee marker last. `Call`
//! pops the marker and the parameters and invokes the bound function pointer.
use crate::assembler::MethodId;
use crate::context::ExecutionContext;
use crate::error::{VmError, VmResult};
use crate::group::GroupId;
use crate::methods::{Arg, Invocation, MethodSpec, Param};
use crate::stack::{unexpected, Object};
use crate::value::{Value, ValueKind};

fn push_typed(
    ctx: &mut ExecutionContext,
    kind: ValueKind,
    value: Value,
    method: &str,
) -> VmResult<()> {
    ctx.stacks
        .push(kind, value)
        .map_err(|found| VmError::TypeMismatch {
            what: format!("argument of {method}"),
            expected: kind,
            found,
        })
}

/// Stack on entry: `[group name]` (when a parameter injects it) below the stack-supplied
/// arguments, last argument on top.
pub(super) fn prepare_method_call(
    ctx: &mut ExecutionContext,
    id: MethodId,
    spec: &'static MethodSpec,
) -> VmResult<()> {
    let mut supplied = Vec::new();
    for param in spec.params.iter().rev() {
        if let Param::Value(kind) = param {
            supplied.push(ctx.stacks.pop(*kind)?);
        }
    }
    supplied.reverse();
    let group_name = if spec.params.contains(&Param::InjectGroupName) {
        Some(ctx.stacks.pop_text())
    } else {
        None
    };

    let mut supplied = supplied.into_iter();
    for param in spec.params {
        match param {
            Param::Value(kind) => {
                if let Some(value) = supplied.next() {
                    push_typed(ctx, *kind, value, spec.name)?;
                }
            }
            Param::InjectSource => {
                let row = ctx
                    .current_row()
                    .map_err(|_| VmError::MissingInjection("source row"))?
                    .clone();
                ctx.stacks.push_object(Object::Row(row));
            }
            Param::InjectGroup => {
                let group = ctx.current_group.unwrap_or(GroupId::ROOT);
                ctx.stacks.push_object(Object::Group(group));
            }
            Param::InjectGroupName => {
                let name = group_name
                    .clone()
                    .ok_or(VmError::MissingInjection("group name"))?;
                ctx.stacks.push_text(name);
            }
        }
    }

    ctx.stacks.push_object(Object::Method(id));
    ctx.registers.advance();
    Ok(())
}

pub(super) fn call(
    ctx: &mut ExecutionContext,
    id: MethodId,
    spec: &'static MethodSpec,
    arg_count: usize,
) -> VmResult<()> {
    match ctx.stacks.pop_object() {
        Object::Method(callee) => {
            debug_assert_eq!(callee, id, "call does not match the prepared method");
        }
        other => return Err(unexpected("method", &other)),
    }
    debug_assert_eq!(arg_count, spec.params.len());

    let mut args = Vec::with_capacity(spec.params.len());
    for param in spec.params.iter().rev() {
        let arg = match param {
            Param::Value(kind) => Arg::Value(ctx.stacks.pop(*kind)?),
            Param::InjectSource => match ctx.stacks.pop_object() {
                Object::Row(row) => Arg::Row(row),
                other => return Err(unexpected("source row", &other)),
            },
            Param::InjectGroup => match ctx.stacks.pop_object() {
                Object::Group(group) => Arg::Group(group),
                other => return Err(unexpected("group", &other)),
            },
            Param::InjectGroupName => Arg::GroupName(ctx.stacks.pop_text()),
        };
        args.push(arg);
    }
    args.reverse();

    let mut invocation = Invocation::new(spec.name, args, &mut ctx.groups);
    let result = (spec.implementation)(&mut invocation).map_err(|source| VmError::Method {
        method: spec.name,
        source,
    })?;
    if let Some(kind) = spec.returns {
        ctx.stacks
            .push(kind, result)
            .map_err(|found| VmError::TypeMismatch {
                what: format!("result of {}", spec.name),
                expected: kind,
                found,
            })?;
    }
    ctx.registers.advance();
    Ok(())
}
