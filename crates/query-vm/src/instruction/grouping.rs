use super::GroupField;
use crate::context::ExecutionContext;
use crate::error::{VmError, VmResult};
use crate::group::{group_identifiers, ROOT_GROUP};
use crate::table::GroupRow;
use crate::value::{Value, ValueKind};
use std::sync::Arc;

/// Pops one value per kind (last kind on top) and returns them in declaration order.
fn pop_typed(
    ctx: &mut ExecutionContext,
    kinds: impl DoubleEndedIterator<Item = ValueKind>,
) -> VmResult<Vec<Value>> {
    let mut values = kinds
        .rev()
        .map(|kind| ctx.stacks.pop(kind))
        .collect::<VmResult<Vec<_>>>()?;
    values.reverse();
    Ok(values)
}

/// Stack: `value_0 .. value_n-1` (typed), then `id_0 .. id_n-1` on the text stack.
pub(super) fn access_group(ctx: &mut ExecutionContext, fields: &[GroupField]) -> VmResult<()> {
    let mut identifiers: Vec<String> = (0..fields.len()).map(|_| ctx.stacks.pop_text()).collect();
    identifiers.reverse();
    let values = pop_typed(ctx, fields.iter().map(|f| f.kind))?;
    let names: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();

    let mut innermost = None;
    for (level, identifier) in identifiers.iter().enumerate() {
        let parent = match level {
            0 => ROOT_GROUP,
            _ => identifiers[level - 1].as_str(),
        };
        let id = ctx.groups.get_or_create(
            identifier,
            parent,
            &names[..=level],
            &values[..=level],
        );
        ctx.groups.get_mut(id).hit();
        innermost = Some(id);
    }

    if innermost.is_some() {
        ctx.current_group = innermost;
    }
    ctx.registers.advance();
    Ok(())
}

/// Leaves the values in place and pushes one identifier per grouping level, outermost first.
pub(super) fn create_group_identifier(
    ctx: &mut ExecutionContext,
    kinds: &[ValueKind],
) -> VmResult<()> {
    let values = pop_typed(ctx, kinds.iter().copied())?;
    let identifiers = group_identifiers(kinds, &values);

    for (kind, value) in kinds.iter().zip(values) {
        ctx.stacks
            .push(*kind, value)
            .map_err(|found| VmError::TypeMismatch {
                what: "group key".to_string(),
                expected: *kind,
                found,
            })?;
    }
    for identifier in identifiers {
        ctx.stacks.push_text(identifier);
    }
    ctx.registers.advance();
    Ok(())
}

pub(super) fn add_new_group(
    ctx: &mut ExecutionContext,
    table: &str,
    columns: &Arc<[(usize, String)]>,
) -> VmResult<()> {
    let group = ctx
        .current_group
        .ok_or(VmError::MissingInjection("current group"))?;
    let added = ctx.table_mut(table)?.push_group_row(GroupRow {
        group,
        columns: Arc::clone(columns),
    });
    if added {
        ctx.stats.rows_added += 1;
    }
    ctx.registers.advance();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::GroupId;
    use pretty_assertions::assert_eq;

    fn fields() -> Vec<GroupField> {
        vec![
            GroupField::new("Country", ValueKind::Text),
            GroupField::new("City", ValueKind::Text),
        ]
    }

    fn touch(ctx: &mut ExecutionContext, country: &str, city: &str) {
        let kinds = [ValueKind::Text, ValueKind::Text];
        ctx.stacks.push_text(country.to_string());
        ctx.stacks.push_text(city.to_string());
        create_group_identifier(ctx, &kinds).unwrap();
        access_group(ctx, &fields()).unwrap();
    }

    #[test]
    fn identifiers_follow_the_values() {
        let mut ctx = ExecutionContext::default();
        ctx.stacks.push_text("PL".into());
        ctx.stacks.push_int(3);
        create_group_identifier(&mut ctx, &[ValueKind::Text, ValueKind::Int]).unwrap();

        assert_eq!(ctx.stacks.pop_text(), "String:PL,Int64:3");
        assert_eq!(ctx.stacks.pop_text(), "String:PL");
        assert_eq!(ctx.stacks.pop_int(), 3);
        assert_eq!(ctx.stacks.pop_text(), "PL");
        assert!(ctx.stacks.is_empty());
    }

    #[test]
    fn access_group_builds_one_node_per_level() {
        let mut ctx = ExecutionContext::default();
        touch(&mut ctx, "PL", "WARSAW");
        touch(&mut ctx, "PL", "WARSAW");
        touch(&mut ctx, "PL", "KRAKOW");

        assert!(ctx.stacks.is_empty());
        let pl = ctx.groups.lookup("String:PL").unwrap();
        let warsaw = ctx.groups.lookup("String:PL,String:WARSAW").unwrap();
        let krakow = ctx.groups.lookup("String:PL,String:KRAKOW").unwrap();

        assert_eq!(ctx.groups.get(pl).hits(), 3);
        assert_eq!(ctx.groups.get(pl).parent(), Some(GroupId::ROOT));
        assert_eq!(ctx.groups.get(warsaw).hits(), 2);
        assert_eq!(ctx.groups.get(warsaw).parent(), Some(pl));
        assert_eq!(
            ctx.groups.get(warsaw).field_names(),
            &["Country".to_string(), "City".to_string()]
        );
        assert_eq!(ctx.current_group(), Some(krakow));
    }

    #[test]
    fn add_new_group_requires_a_current_group() {
        let mut ctx = ExecutionContext::default();
        let columns: Arc<[(usize, String)]> = Arc::from(Vec::new());
        assert!(matches!(
            add_new_group(&mut ctx, "t", &columns),
            Err(VmError::MissingInjection(_))
        ));
    }
}
