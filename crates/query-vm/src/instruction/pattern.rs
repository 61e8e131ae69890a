use crate::context::ExecutionContext;
use crate::error::VmResult;
use crate::register::Register;
use crate::value::ValueKind;

/// `IN (...)`: the tested value sits on top, above the candidates; `register` holds how many
/// candidates to consume.
pub(super) fn contains(
    ctx: &mut ExecutionContext,
    register: Register,
    kind: ValueKind,
) -> VmResult<()> {
    let needle = ctx.stacks.pop(kind)?;
    let count = usize::try_from(ctx.registers[register]).unwrap_or(0);
    let candidates = ctx.stacks.pop_many(kind, count)?;
    let found = candidates.iter().any(|candidate| *candidate == needle);
    ctx.stacks.push_bool(found);
    ctx.registers.advance();
    Ok(())
}

/// Stack: subject, then pattern on top.
pub(super) fn like(ctx: &mut ExecutionContext) -> VmResult<()> {
    let pattern = ctx.stacks.pop_text();
    let subject = ctx.stacks.pop_text();
    let matched = ctx.like_cache.is_match(&subject, &pattern)?;
    ctx.stacks.push_bool(matched);
    ctx.registers.advance();
    Ok(())
}
