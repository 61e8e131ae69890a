//! Typed operand stacks.
//!
//! Primitive values travel on stacks dedicated to their kind so the hot loop never boxes a
//! boolean or an integer. Everything else (rows under construction, injected rows, groups and
//! callee markers) travels on the object stack as an [`Object`].
//!
//! Popping an empty stack is an invariant breach of the instruction stream and panics.
use crate::assembler::MethodId;
use crate::error::{VmError, VmResult};
use crate::group::GroupId;
use crate::source::CurrentRow;
use crate::value::{Value, ValueKind};
use bigdecimal::BigDecimal;

/// Entry on the object stack.
#[derive(Debug, Clone)]
pub enum Object {
    Value(Value),
    /// A row being assembled by `GrabRow`.
    Values(Vec<Value>),
    Row(CurrentRow),
    Group(GroupId),
    /// Callee marker pushed by `PrepareMethodCall`.
    Method(MethodId),
}

impl Object {
    pub fn variant_name(&self) -> &'static str {
        match self {
            Object::Value(_) => "value",
            Object::Values(_) => "row values",
            Object::Row(_) => "source row",
            Object::Group(_) => "group",
            Object::Method(_) => "method",
        }
    }

    /// Converts a value-like entry into a [`Value`]; row tuples become lists.
    pub fn into_value(self) -> VmResult<Value> {
        match self {
            Object::Value(value) => Ok(value),
            Object::Values(values) => Ok(Value::list(values)),
            other => Err(unexpected("value", &other)),
        }
    }
}

impl From<Value> for Object {
    fn from(value: Value) -> Self {
        Object::Value(value)
    }
}

pub(crate) fn unexpected(expected: &'static str, found: &Object) -> VmError {
    debug_assert!(
        false,
        "object stack holds {} where {expected} was expected",
        found.variant_name()
    );
    VmError::UnexpectedObject {
        expected,
        found: found.variant_name(),
    }
}

#[cold]
#[inline(never)]
#[track_caller]
fn underflow(stack: &str) -> ! {
    panic!("{stack} stack underflow: instruction stream is unbalanced")
}

#[derive(Debug, Clone, Default)]
pub struct ValueStacks {
    bools: Vec<bool>,
    ints: Vec<i64>,
    decimals: Vec<BigDecimal>,
    texts: Vec<String>,
    objects: Vec<Object>,
}

impl ValueStacks {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bools: Vec::with_capacity(capacity),
            ints: Vec::with_capacity(capacity),
            decimals: Vec::with_capacity(capacity),
            texts: Vec::with_capacity(capacity),
            objects: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn push_bool(&mut self, value: bool) {
        self.bools.push(value);
    }

    #[inline]
    #[track_caller]
    pub fn pop_bool(&mut self) -> bool {
        self.bools.pop().unwrap_or_else(|| underflow("boolean"))
    }

    #[inline]
    pub fn push_int(&mut self, value: i64) {
        self.ints.push(value);
    }

    #[inline]
    #[track_caller]
    pub fn pop_int(&mut self) -> i64 {
        self.ints.pop().unwrap_or_else(|| underflow("integer"))
    }

    #[inline]
    pub fn push_decimal(&mut self, value: BigDecimal) {
        self.decimals.push(value);
    }

    #[inline]
    #[track_caller]
    pub fn pop_decimal(&mut self) -> BigDecimal {
        self.decimals.pop().unwrap_or_else(|| underflow("decimal"))
    }

    #[inline]
    pub fn push_text(&mut self, value: String) {
        self.texts.push(value);
    }

    #[inline]
    #[track_caller]
    pub fn pop_text(&mut self) -> String {
        self.texts.pop().unwrap_or_else(|| underflow("text"))
    }

    #[inline]
    pub fn push_object(&mut self, value: Object) {
        self.objects.push(value);
    }

    #[inline]
    #[track_caller]
    pub fn pop_object(&mut self) -> Object {
        self.objects.pop().unwrap_or_else(|| underflow("object"))
    }

    #[track_caller]
    pub fn peek_object(&self) -> &Object {
        self.objects.last().unwrap_or_else(|| underflow("object"))
    }

    /// Routes `value` to the stack for `kind`.
    ///
    /// Returns the value's own kind as the error when it is not assignable to `kind`.
    pub fn push(&mut self, kind: ValueKind, value: Value) -> Result<(), ValueKind> {
        match (kind, value) {
            (ValueKind::Bool, Value::Bool(b)) => self.push_bool(b),
            (ValueKind::Int, Value::Int(i)) => self.push_int(i),
            (ValueKind::Decimal, Value::Decimal(d)) => self.push_decimal(d),
            (ValueKind::Text, Value::Text(s)) => self.push_text(s),
            (ValueKind::Object, value) => self.push_object(Object::Value(value)),
            (_, value) => return Err(value.kind()),
        }
        Ok(())
    }

    /// Pops one value from the stack for `kind`.
    #[track_caller]
    pub fn pop(&mut self, kind: ValueKind) -> VmResult<Value> {
        Ok(match kind {
            ValueKind::Bool => Value::Bool(self.pop_bool()),
            ValueKind::Int => Value::Int(self.pop_int()),
            ValueKind::Decimal => Value::Decimal(self.pop_decimal()),
            ValueKind::Text => Value::Text(self.pop_text()),
            ValueKind::Object => self.pop_object().into_value()?,
        })
    }

    /// Pops `count` values of `kind`, returned in push order.
    #[track_caller]
    pub fn pop_many(&mut self, kind: ValueKind, count: usize) -> VmResult<Vec<Value>> {
        let mut values = (0..count)
            .map(|_| self.pop(kind))
            .collect::<VmResult<Vec<_>>>()?;
        values.reverse();
        Ok(values)
    }

    pub fn depth(&self, kind: ValueKind) -> usize {
        match kind {
            ValueKind::Bool => self.bools.len(),
            ValueKind::Int => self.ints.len(),
            ValueKind::Decimal => self.decimals.len(),
            ValueKind::Text => self.texts.len(),
            ValueKind::Object => self.objects.len(),
        }
    }

    /// Depth of every stack, ordered as [`ValueKind::ALL`].
    pub fn depths(&self) -> [usize; 5] {
        ValueKind::ALL.map(|kind| self.depth(kind))
    }

    pub fn is_empty(&self) -> bool {
        self.depths().iter().all(|d| *d == 0)
    }

    pub fn clear(&mut self) {
        self.bools.clear();
        self.ints.clear();
        self.decimals.clear();
        self.texts.clear();
        self.objects.clear();
    }
}
