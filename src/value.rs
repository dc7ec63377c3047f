//! Dynamic values used both as keys and as stored values.
//!
//! Plain data (`Null` through `Record`) compares and hashes by content.
//! `Object`, `Function` and `Map` are shared handles: clones point at the
//! same allocation, and equality and key identity follow the allocation,
//! never its contents.

use crate::collection::Collection;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Record(BTreeMap<String, Value>),
    Object(Object),
    Function(Function),
    Map(MapRef),
}

impl Value {
    /// Name of the value's category, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Map(_) => "map",
        }
    }

    /// Pass rule: everything passes except the exact boolean `false`.
    ///
    /// `0`, `""` and `null` all pass; only an explicit rejection does not.
    #[inline]
    pub fn passes(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    /// Conventional truthiness, used by the expression language's logical
    /// operators. Unrelated to [`Value::passes`].
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Record(r) => !r.is_empty(),
            Value::Object(_) | Value::Function(_) | Value::Map(_) => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
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

    /// Numeric view of ints, floats and bools.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Address of the shared allocation behind a reference-identity value.
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            Value::Object(o) => Some(Rc::as_ptr(&o.0) as *const () as usize),
            Value::Function(f) => Some(Rc::as_ptr(&f.0) as *const () as usize),
            Value::Map(m) => Some(Rc::as_ptr(&m.0) as *const () as usize),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Record(fields) => {
                f.write_str("{")?;
                for (i, (name, item)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {item}")?;
                }
                f.write_str("}")
            }
            Value::Object(_) => f.write_str("[object]"),
            Value::Function(_) => f.write_str("[function]"),
            Value::Map(_) => f.write_str("[map]"),
        }
    }
}

// Also the canonical form behind content-addressed key tokens, so it must be
// deterministic: records are ordered maps and nested maps keep entry order.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Record(fields) => fields.serialize(serializer),
            Value::Object(o) => {
                let fields = o
                    .0
                    .try_borrow()
                    .map_err(|_| S::Error::custom("object is mutably borrowed"))?;
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, item) in fields.iter() {
                    map.serialize_entry(name, item)?;
                }
                map.end()
            }
            Value::Function(_) => Err(S::Error::custom("function values cannot be serialized")),
            Value::Map(m) => {
                let map = m
                    .0
                    .try_borrow()
                    .map_err(|_| S::Error::custom("map is mutably borrowed"))?;
                let mut seq = serializer.serialize_seq(Some(map.len()))?;
                for pair in map.iter() {
                    seq.serialize_element(&pair)?;
                }
                seq.end()
            }
        }
    }
}

/// Injective encoding behind content-addressed keys.
///
/// Unlike the export form, every non-JSON category carries its own tag:
/// floats are written by bit pattern, and records, objects and nested maps
/// are wrapped so none of them can be mistaken for another or for a list.
pub(crate) struct Canonical<'a>(pub(crate) &'a Value);

struct CanonicalFields<'a>(&'a BTreeMap<String, Value>);

struct CanonicalEntries<'a>(&'a Collection);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_newtype_variant("Key", 0, "Float", &x.to_bits()),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&Canonical(item))?;
                }
                seq.end()
            }
            Value::Record(fields) => {
                serializer.serialize_newtype_variant("Key", 1, "Record", &CanonicalFields(fields))
            }
            Value::Object(o) => {
                let fields = o
                    .0
                    .try_borrow()
                    .map_err(|_| S::Error::custom("object is mutably borrowed"))?;
                serializer.serialize_newtype_variant("Key", 2, "Object", &CanonicalFields(&fields))
            }
            Value::Function(_) => Err(S::Error::custom("function values cannot be serialized")),
            Value::Map(m) => {
                let map = m
                    .0
                    .try_borrow()
                    .map_err(|_| S::Error::custom("map is mutably borrowed"))?;
                serializer.serialize_newtype_variant("Key", 3, "Map", &CanonicalEntries(&map))
            }
        }
    }
}

impl Serialize for CanonicalFields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, item) in self.0 {
            map.serialize_entry(name, &Canonical(item))?;
        }
        map.end()
    }
}

impl Serialize for CanonicalEntries<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for (key, item) in self.0.iter() {
            seq.serialize_element(&(Canonical(key), Canonical(item)))?;
        }
        seq.end()
    }
}

/// Shared, mutable bag of named fields compared by identity.
#[derive(Clone, Default)]
pub struct Object(Rc<RefCell<BTreeMap<String, Value>>>);

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Object(Rc::new(RefCell::new(fields)))
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.borrow().get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.borrow_mut().insert(name.into(), value.into())
    }

    pub fn fields(&self) -> Ref<'_, BTreeMap<String, Value>> {
        self.0.borrow()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(fields) => f.debug_tuple("Object").field(&*fields).finish(),
            Err(_) => f.write_str("Object(<borrowed>)"),
        }
    }
}

/// A callable value. Only ever compared and keyed by identity.
#[derive(Clone)]
pub struct Function(Rc<dyn Fn(&[Value]) -> Value>);

impl Function {
    pub fn new(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Function(Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Shared handle to a nested [`Collection`], e.g. the groups produced by
/// `partition`.
#[derive(Clone)]
pub struct MapRef(Rc<RefCell<Collection>>);

impl MapRef {
    pub fn new(map: Collection) -> Self {
        MapRef(Rc::new(RefCell::new(map)))
    }

    pub fn borrow(&self) -> Ref<'_, Collection> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Collection> {
        self.0.borrow_mut()
    }

    /// `None` while the map is mutably borrowed.
    pub fn try_borrow(&self) -> Option<Ref<'_, Collection>> {
        self.0.try_borrow().ok()
    }

    pub fn ptr_eq(&self, other: &MapRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for MapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(map) => f.debug_tuple("Map").field(&*map).finish(),
            Err(_) => f.write_str("Map(<borrowed>)"),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(v as i64)
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32, usize, isize);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Record(v)
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self {
        Value::Object(v)
    }
}

impl From<Function> for Value {
    fn from(v: Function) -> Self {
        Value::Function(v)
    }
}

impl From<MapRef> for Value {
    fn from(v: MapRef) -> Self {
        Value::Map(v)
    }
}

impl From<Collection> for Value {
    fn from(v: Collection) -> Self {
        Value::Map(MapRef::new(v))
    }
}
