//! Library methods callable from programs.
//!
//! Built-in methods register themselves with [`inventory`] and are indexed once, by upper-cased
//! name, the first time a program is assembled. Hosts can add their own `&'static MethodSpec`
//! values to a [`MethodRegistry`] and hand it to the assembler.
use crate::error::MethodError;
use crate::group::{Group, GroupForest, GroupId};
use crate::source::CurrentRow;
use crate::value::{Value, ValueKind};
use ahash::AHashMap;
use bigdecimal::BigDecimal;
use std::fmt;
use std::sync::OnceLock;

mod aggregates;
mod scalar;

/// How a method parameter receives its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    /// Popped from the stack of the given kind.
    Value(ValueKind),
    /// The row the current source points at.
    InjectSource,
    /// The current group (the root group before any grouping happened).
    InjectGroup,
    /// The group-access name pushed by the program ahead of the arguments.
    InjectGroupName,
}

impl Param {
    pub fn is_injected(self) -> bool {
        !matches!(self, Param::Value(_))
    }
}

pub type MethodFn = fn(&mut Invocation<'_>) -> Result<Value, MethodError>;

pub struct MethodSpec {
    pub name: &'static str,
    pub params: &'static [Param],
    /// Kind of the pushed result; `None` for methods that push nothing.
    pub returns: Option<ValueKind>,
    pub implementation: MethodFn,
}

impl fmt::Debug for MethodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSpec")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

inventory::collect!(MethodSpec);

pub fn iter_method_specs() -> impl Iterator<Item = &'static MethodSpec> {
    inventory::iter::<MethodSpec>.into_iter()
}

fn registry() -> &'static AHashMap<String, &'static MethodSpec> {
    static REGISTRY: OnceLock<AHashMap<String, &'static MethodSpec>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = AHashMap::new();
        for spec in inventory::iter::<MethodSpec> {
            map.insert(spec.name.to_ascii_uppercase(), spec);
        }
        map
    })
}

/// Looks up a built-in method, ignoring case.
pub fn lookup_method(name: &str) -> Option<&'static MethodSpec> {
    registry().get(&name.to_ascii_uppercase()).copied()
}

/// Methods visible to one assembler.
#[derive(Debug, Clone)]
pub struct MethodRegistry {
    methods: AHashMap<String, &'static MethodSpec>,
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MethodRegistry {
    /// Registry holding every built-in method.
    pub fn builtin() -> Self {
        Self {
            methods: registry().clone(),
        }
    }

    pub fn empty() -> Self {
        Self {
            methods: AHashMap::new(),
        }
    }

    /// Adds `spec`, replacing a method of the same name.
    pub fn register(&mut self, spec: &'static MethodSpec) -> &mut Self {
        self.methods.insert(spec.name.to_ascii_uppercase(), spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&'static MethodSpec> {
        self.methods.get(&name.to_ascii_uppercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// A marshalled argument.
#[derive(Debug, Clone)]
pub enum Arg {
    Value(Value),
    Row(CurrentRow),
    Group(GroupId),
    GroupName(String),
}

/// Arguments of one call, in declaration order, plus access to the group forest.
pub struct Invocation<'a> {
    name: &'static str,
    args: Vec<Arg>,
    groups: &'a mut GroupForest,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(name: &'static str, args: Vec<Arg>, groups: &'a mut GroupForest) -> Self {
        Self { name, args, groups }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    fn get(&self, idx: usize) -> Result<&Arg, MethodError> {
        self.args
            .get(idx)
            .ok_or_else(|| MethodError::new(format!("missing argument {idx}")))
    }

    fn mismatch(&self, idx: usize, expected: &str) -> MethodError {
        MethodError::new(format!("argument {idx} is not {expected}"))
    }

    pub fn value(&self, idx: usize) -> Result<&Value, MethodError> {
        match self.get(idx)? {
            Arg::Value(value) => Ok(value),
            _ => Err(self.mismatch(idx, "a value")),
        }
    }

    pub fn int(&self, idx: usize) -> Result<i64, MethodError> {
        self.value(idx)?
            .as_int()
            .ok_or_else(|| self.mismatch(idx, "an Int64"))
    }

    pub fn decimal(&self, idx: usize) -> Result<&BigDecimal, MethodError> {
        self.value(idx)?
            .as_decimal()
            .ok_or_else(|| self.mismatch(idx, "a Decimal"))
    }

    pub fn text(&self, idx: usize) -> Result<&str, MethodError> {
        self.value(idx)?
            .as_text()
            .ok_or_else(|| self.mismatch(idx, "a String"))
    }

    pub fn row(&self, idx: usize) -> Result<&CurrentRow, MethodError> {
        match self.get(idx)? {
            Arg::Row(row) => Ok(row),
            _ => Err(self.mismatch(idx, "a source row")),
        }
    }

    pub fn group(&self, idx: usize) -> Result<GroupId, MethodError> {
        match self.get(idx)? {
            Arg::Group(group) => Ok(*group),
            _ => Err(self.mismatch(idx, "a group")),
        }
    }

    pub fn group_name(&self, idx: usize) -> Result<&str, MethodError> {
        match self.get(idx)? {
            Arg::GroupName(name) => Ok(name),
            _ => Err(self.mismatch(idx, "a group name")),
        }
    }

    pub fn groups(&self) -> &GroupForest {
        self.groups
    }

    /// The group passed as argument `idx`, mutably.
    pub fn group_mut(&mut self, idx: usize) -> Result<&mut Group, MethodError> {
        let id = self.group(idx)?;
        Ok(self.groups.get_mut(id))
    }

    /// Splits out the group (`group_idx`) and group-access name (`name_idx`) an aggregate
    /// updates.
    pub fn aggregate_target(
        &mut self,
        group_idx: usize,
        name_idx: usize,
    ) -> Result<(&mut Group, String), MethodError> {
        let name = self.group_name(name_idx)?.to_string();
        Ok((self.group_mut(group_idx)?, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static SHOUT: MethodSpec = MethodSpec {
        name: "Shout",
        params: &[Param::Value(ValueKind::Text)],
        returns: Some(ValueKind::Text),
        implementation: |call| Ok(Value::from(format!("{}!", call.text(0)?))),
    };

    #[test]
    fn builtins_are_found_case_insensitively() {
        assert_eq!(lookup_method("count").map(|m| m.name), Some("Count"));
        assert_eq!(lookup_method("SETSUM").map(|m| m.name), Some("SetSum"));
        assert!(lookup_method("NoSuchMethod").is_none());
    }

    #[test]
    fn registry_accepts_host_methods() {
        let mut registry = MethodRegistry::builtin();
        let before = registry.len();
        registry.register(&SHOUT);
        assert_eq!(registry.len(), before + 1);
        assert!(registry.get("shout").is_some());
        assert!(MethodRegistry::empty().get("Count").is_none());
    }

    #[test]
    fn invocation_reports_argument_kind_mismatches() {
        let mut groups = GroupForest::new();
        let call = Invocation::new("Test", vec![Arg::Value(Value::Int(1))], &mut groups);
        assert_eq!(call.int(0), Ok(1));
        assert!(call.text(0).is_err());
        assert!(call.int(1).is_err());
        assert!(call.group(0).is_err());
    }
}
