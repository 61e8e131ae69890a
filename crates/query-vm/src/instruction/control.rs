use crate::assembler::Target;
use crate::context::ExecutionContext;
use crate::error::VmResult;
use crate::register::Register;

pub(super) fn jmp(ctx: &mut ExecutionContext, target: Target) -> VmResult<()> {
    ctx.registers.jump(target.index());
    Ok(())
}

/// Pops a bool and jumps when it equals `expected`.
pub(super) fn jmp_state(
    ctx: &mut ExecutionContext,
    target: Target,
    expected: bool,
) -> VmResult<()> {
    if ctx.stacks.pop_bool() == expected {
        ctx.registers.jump(target.index());
    } else {
        ctx.registers.advance();
    }
    Ok(())
}

pub(super) fn go_to(ctx: &mut ExecutionContext, index: usize) -> VmResult<()> {
    ctx.registers.jump(index);
    Ok(())
}

/// Relative jump from the current instruction.
pub(super) fn skip(ctx: &mut ExecutionContext, offset: i64) -> VmResult<()> {
    ctx.registers[Register::Ip] += offset;
    Ok(())
}

pub(super) fn skip_state(
    ctx: &mut ExecutionContext,
    offset: i64,
    expected: bool,
) -> VmResult<()> {
    if ctx.stacks.pop_bool() == expected {
        skip(ctx, offset)
    } else {
        ctx.registers.advance();
        Ok(())
    }
}

/// `LIMIT`: lets `limit` passes through this instruction, then jumps to `end` on every later one.
pub(super) fn check_table_rows_amount(
    ctx: &mut ExecutionContext,
    limit: u64,
    end: Target,
) -> VmResult<()> {
    let ip = ctx.registers.ip() as usize;
    let passes = ctx.visits.entry(ip).or_insert(0);
    if *passes >= limit {
        ctx.registers.jump(end.index());
    } else {
        *passes += 1;
        ctx.registers.advance();
    }
    Ok(())
}

/// `OFFSET`: advances the top source `count` times; an early end of rows jumps to `end`.
pub(super) fn skip_rows(ctx: &mut ExecutionContext, count: u64, end: Target) -> VmResult<()> {
    for _ in 0..count {
        if !ctx.advance_source()? {
            ctx.registers.jump(end.index());
            return Ok(());
        }
    }
    ctx.registers.advance();
    Ok(())
}

pub(super) fn exit(ctx: &mut ExecutionContext) -> VmResult<()> {
    ctx.registers.halt();
    Ok(())
}
