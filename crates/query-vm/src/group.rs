//! GROUP BY identity.
//!
//! Groups form a forest rooted at the `"root"` sentinel. Each row touches one node per grouping
//! level: level `i` is keyed by the first `i + 1` field values, so nested GROUP BY behaves like a
//! trie of partial keys. Nodes live in an arena owned by [`GroupForest`] and refer to their parent
//! through a [`GroupId`] handle.
use crate::value::{Value, ValueKind};
use ahash::AHashMap;
use std::fmt::Write as _;

pub const ROOT_GROUP: &str = "root";

/// Handle into a [`GroupForest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(usize);

impl GroupId {
    pub const ROOT: GroupId = GroupId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Group {
    identifier: String,
    parent: Option<GroupId>,
    field_names: Vec<String>,
    values: Vec<Value>,
    hits: u64,
    aggregates: AHashMap<String, Value>,
}

impl Group {
    fn new(
        identifier: String,
        parent: Option<GroupId>,
        field_names: Vec<String>,
        values: Vec<Value>,
    ) -> Self {
        Self {
            identifier,
            parent,
            field_names,
            values,
            hits: 0,
            aggregates: AHashMap::new(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn parent(&self) -> Option<GroupId> {
        self.parent
    }

    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn hit(&mut self) {
        self.hits += 1;
    }

    /// Grouping field value by name, falling back to aggregate storage.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.field_names
            .iter()
            .position(|n| n == name)
            .and_then(|idx| self.values.get(idx))
            .or_else(|| self.aggregates.get(name))
    }

    pub fn aggregate(&self, name: &str) -> Option<&Value> {
        self.aggregates.get(name)
    }

    pub fn set_aggregate(&mut self, name: impl Into<String>, value: Value) {
        self.aggregates.insert(name.into(), value);
    }
}

#[derive(Debug, Clone)]
pub struct GroupForest {
    nodes: Vec<Group>,
    by_identifier: AHashMap<String, GroupId>,
}

impl Default for GroupForest {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupForest {
    pub fn new() -> Self {
        let root = Group::new(ROOT_GROUP.to_string(), None, Vec::new(), Vec::new());
        let mut by_identifier = AHashMap::new();
        by_identifier.insert(ROOT_GROUP.to_string(), GroupId::ROOT);
        Self {
            nodes: vec![root],
            by_identifier,
        }
    }

    /// Number of groups, the root sentinel included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn get(&self, id: GroupId) -> &Group {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: GroupId) -> &mut Group {
        &mut self.nodes[id.0]
    }

    pub fn lookup(&self, identifier: &str) -> Option<GroupId> {
        self.by_identifier.get(identifier).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GroupId, &Group)> {
        self.nodes.iter().enumerate().map(|(idx, g)| (GroupId(idx), g))
    }

    /// Groups that sit `level` steps below the root (level 0 is the outermost grouping field).
    pub fn at_level(&self, level: usize) -> impl Iterator<Item = (GroupId, &Group)> {
        self.iter()
            .filter(move |(id, g)| *id != GroupId::ROOT && g.field_names.len() == level + 1)
    }

    /// Returns the group for `identifier`, creating it under `parent` when it does not exist.
    ///
    /// A parent identifier that is not present in the forest falls back to the root sentinel.
    pub fn get_or_create(
        &mut self,
        identifier: &str,
        parent: &str,
        field_names: &[String],
        values: &[Value],
    ) -> GroupId {
        if let Some(id) = self.lookup(identifier) {
            return id;
        }

        let parent_id = match self.lookup(parent) {
            Some(id) => id,
            None => {
                log::debug!(
                    "parent group `{parent}` of `{identifier}` not found, attaching to root"
                );
                GroupId::ROOT
            }
        };

        let id = GroupId(self.nodes.len());
        self.nodes.push(Group::new(
            identifier.to_string(),
            Some(parent_id),
            field_names.to_vec(),
            values.to_vec(),
        ));
        self.by_identifier.insert(identifier.to_string(), id);
        id
    }
}

/// Builds one identifier per grouping level.
///
/// The identifier for level `i` encodes the first `i + 1` fields as
/// `TypeName:Value[,TypeName:Value]*`, iterating fields in declaration order. `\`, `,` and `:`
/// inside a rendered value are escaped with `\`, so two identifiers are equal only when every
/// field's kind and value are.
pub fn group_identifiers(kinds: &[ValueKind], values: &[Value]) -> Vec<String> {
    debug_assert_eq!(kinds.len(), values.len());

    let mut identifiers = Vec::with_capacity(values.len());
    let mut prefix = String::new();
    let mut rendered = String::new();
    for (idx, (kind, value)) in kinds.iter().zip(values).enumerate() {
        if idx > 0 {
            prefix.push(',');
        }
        prefix.push_str(kind.type_name());
        prefix.push(':');

        rendered.clear();
        render_key(*kind, value, &mut rendered);
        for ch in rendered.chars() {
            if matches!(ch, '\\' | ',' | ':') {
                prefix.push('\\');
            }
            prefix.push(ch);
        }
        identifiers.push(prefix.clone());
    }
    identifiers
}

/// Renders a value declared with `kind`. Primitive kinds print the bare value; `Object` values
/// are tagged with their own kind since one `Object` field can hold values of any kind.
fn render_key(kind: ValueKind, value: &Value, out: &mut String) {
    match (kind, value) {
        (ValueKind::Bool, Value::Bool(b)) => {
            let _ = write!(out, "{b}");
        }
        (ValueKind::Int, Value::Int(i)) => {
            let _ = write!(out, "{i}");
        }
        (ValueKind::Decimal, Value::Decimal(d)) => {
            let _ = write!(out, "{}", d.normalized());
        }
        (ValueKind::Text, Value::Text(s)) => out.push_str(s),
        (_, value) => render_tagged(value, out),
    }
}

fn render_tagged(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => {
            let _ = write!(out, "Boolean({b})");
        }
        Value::Int(i) => {
            let _ = write!(out, "Int64({i})");
        }
        Value::Decimal(d) => {
            let _ = write!(out, "Decimal({})", d.normalized());
        }
        Value::Text(s) => {
            let _ = write!(out, "{s:?}");
        }
        Value::List(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                render_tagged(item, out);
            }
            out.push(']');
        }
        Value::Record(fields) => {
            out.push('{');
            for (idx, (name, field)) in fields.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{name:?}:");
                render_tagged(field, out);
            }
            out.push('}');
        }
    }
}
