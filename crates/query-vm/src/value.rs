use bigdecimal::BigDecimal;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Semantic kind of a value.
///
/// Every instruction that produces or consumes a value knows its kind when the program is
/// assembled, and the kind selects which typed stack the value travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int,
    Decimal,
    Text,
    Object,
}

impl ValueKind {
    pub const ALL: [ValueKind; 5] = [
        ValueKind::Bool,
        ValueKind::Int,
        ValueKind::Decimal,
        ValueKind::Text,
        ValueKind::Object,
    ];

    /// Canonical type name used when encoding group identifiers.
    pub fn type_name(self) -> &'static str {
        match self {
            ValueKind::Bool => "Boolean",
            ValueKind::Int => "Int64",
            ValueKind::Decimal => "Decimal",
            ValueKind::Text => "String",
            ValueKind::Object => "Object",
        }
    }

    /// Whether a runtime value may be stored in a slot declared with this kind.
    ///
    /// `Object` accepts everything, including `Null`; every other kind requires an exact
    /// match.
    pub fn accepts(self, value: &Value) -> bool {
        self == ValueKind::Object || value.kind() == self
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Decimal(BigDecimal),
    Text(String),
    List(Arc<[Value]>),
    Record(Arc<BTreeMap<String, Value>>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::Text(_) => ValueKind::Text,
            Value::Null | Value::List(_) | Value::Record(_) => ValueKind::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn list(values: impl IntoIterator<Item = Value>) -> Self {
        Value::List(values.into_iter().collect())
    }

    pub fn record<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Record(Arc::new(
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn decimal(value: impl Into<BigDecimal>) -> Self {
        Value::Decimal(value.into())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<&BigDecimal> {
        match self {
            Value::Decimal(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Text(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Record(fields) => {
                f.write_str("{")?;
                for (idx, (name, value)) in fields.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<BigDecimal> for Value {
    fn from(value: BigDecimal) -> Self {
        Value::Decimal(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_kind_accepts_anything_including_null() {
        for value in [
            Value::Null,
            Value::from(1),
            Value::from("x"),
            Value::list([Value::from(true)]),
        ] {
            assert!(ValueKind::Object.accepts(&value), "{value:?}");
        }
    }

    #[test]
    fn primitive_kinds_reject_null_and_other_kinds() {
        assert!(ValueKind::Int.accepts(&Value::Int(3)));
        assert!(!ValueKind::Int.accepts(&Value::Null));
        assert!(!ValueKind::Int.accepts(&Value::from("3")));
        assert!(!ValueKind::Text.accepts(&Value::Bool(true)));
    }

    #[test]
    fn display_renders_nested_values() {
        let value = Value::record([("a", Value::list([Value::Int(1), Value::Null]))]);
        assert_eq!(value.to_string(), "{a: [1, null]}");
    }
}
