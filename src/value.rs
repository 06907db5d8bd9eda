//! Decoded value model.
//!
//! Scalars, strings and tuples are held inline in [`Value`]. Everything the
//! pickle format treats as a mutable object (lists, dicts, sets, arrays,
//! class instances) lives in a [`Heap`] arena and is referenced by
//! [`ObjectId`]. Shared references and cycles are therefore plain id copies:
//! a list that contains itself is `List(#0)` stored inside object `#0`.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::array::TypedArray;
use crate::error::ShapeError;
use crate::known_types::{Complex, Date, DateTime, Decimal, Time, TimeDelta};

/// Index of an object in a [`Heap`]. Two values referring to the same id
/// are the same object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) usize);

impl ObjectId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A `module.name` pair as written by the GLOBAL opcode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualName {
    pub module: String,
    pub name: String,
}

impl QualName {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for QualName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Tuple(Vec<Value>),
    /// A class reference pushed by GLOBAL, awaiting REDUCE/NEWOBJ
    Global(QualName),
    List(ObjectId),
    Dict(ObjectId),
    Set(ObjectId),
    Array(ObjectId),
    Instance(ObjectId),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::Tuple(_) => "tuple",
            Value::Global(_) => "global",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Set(_) => "set",
            Value::Array(_) => "array",
            Value::Instance(_) => "instance",
        }
    }

    /// Heap id if this value refers to a heap object.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Value::List(id)
            | Value::Dict(id)
            | Value::Set(id)
            | Value::Array(id)
            | Value::Instance(id) => Some(*id),
            _ => None,
        }
    }

    /// Whether the value may be used as a dict key or set member.
    /// Mutable containers may not; instances hash by identity.
    pub fn is_hashable(&self) -> bool {
        match self {
            Value::List(_) | Value::Dict(_) | Value::Set(_) | Value::Array(_) => false,
            Value::Tuple(items) => items.iter().all(Value::is_hashable),
            _ => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(items) => Some(items),
            _ => None,
        }
    }
}

// Floats compare by value except that NaN equals NaN, so `Value` can be
// `Eq` and serve as a map key. `0.0` and `-0.0` stay equal and hash alike.
fn float_eq(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

fn float_hash_bits(f: f64) -> u64 {
    if f == 0.0 {
        0
    } else if f.is_nan() {
        f64::NAN.to_bits()
    } else {
        f.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => float_eq(*a, *b),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Global(a), Value::Global(b)) => a == b,
            (Value::List(a), Value::List(b))
            | (Value::Dict(a), Value::Dict(b))
            | (Value::Set(a), Value::Set(b))
            | (Value::Array(a), Value::Array(b))
            | (Value::Instance(a), Value::Instance(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::None => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => float_hash_bits(*f).hash(state),
            Value::Str(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Tuple(items) => items.hash(state),
            Value::Global(q) => q.hash(state),
            Value::List(id)
            | Value::Dict(id)
            | Value::Set(id)
            | Value::Array(id)
            | Value::Instance(id) => id.hash(state),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Capability for caller-defined objects produced by registered constructors.
///
/// `set_state` is the hook BUILD consults; returning `None` means the type
/// has no state-setter and the state is merged into the instance attributes.
pub trait CustomObject: fmt::Debug + Send + Any {
    /// `this` is the id of the instance being built. The instance is checked
    /// out of `heap` for the duration of the call, so `heap.get(this)` is
    /// `None`; state values that refer back to the object carry `this`.
    fn set_state(
        &mut self,
        _this: ObjectId,
        _state: &Value,
        _heap: &Heap,
    ) -> Option<Result<(), ShapeError>> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// The typed payload of an instance.
#[derive(Debug)]
pub enum Native {
    /// No payload; the instance is just its attributes
    Plain,
    Decimal(Decimal),
    Date(Date),
    Time(Time),
    DateTime(DateTime),
    TimeDelta(TimeDelta),
    Complex(Complex),
    Custom(Box<dyn CustomObject>),
}

impl PartialEq for Native {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Native::Plain, Native::Plain) => true,
            (Native::Decimal(a), Native::Decimal(b)) => a == b,
            (Native::Date(a), Native::Date(b)) => a == b,
            (Native::Time(a), Native::Time(b)) => a == b,
            (Native::DateTime(a), Native::DateTime(b)) => a == b,
            (Native::TimeDelta(a), Native::TimeDelta(b)) => a == b,
            (Native::Complex(a), Native::Complex(b)) => a == b,
            // custom payloads have no structural equality
            _ => false,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Instance {
    pub class: QualName,
    pub native: Native,
    pub attrs: HashMap<String, Value>,
}

impl Instance {
    pub fn new(class: QualName, native: Native) -> Self {
        Self {
            class,
            native,
            attrs: HashMap::new(),
        }
    }

    /// Downcast a custom payload to its concrete type.
    pub fn custom<T: CustomObject>(&self) -> Option<&T> {
        match &self.native {
            Native::Custom(obj) => obj.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Object {
    List(Vec<Value>),
    Dict(HashMap<Value, Value>),
    Set(HashSet<Value>),
    Array(TypedArray),
    Instance(Instance),
}

impl Object {
    pub fn kind(&self) -> &'static str {
        match self {
            Object::List(_) => "list",
            Object::Dict(_) => "dict",
            Object::Set(_) => "set",
            Object::Array(_) => "array",
            Object::Instance(_) => "instance",
        }
    }
}

/// Arena owning every mutable object produced by one decode.
#[derive(Debug, Default)]
pub struct Heap {
    // a slot is `None` only while its object is checked out by `take`
    objects: Vec<Option<Object>>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Move an object into the heap and return the value referring to it.
    pub fn alloc(&mut self, obj: Object) -> Value {
        let id = ObjectId(self.objects.len());
        let value = match &obj {
            Object::List(_) => Value::List(id),
            Object::Dict(_) => Value::Dict(id),
            Object::Set(_) => Value::Set(id),
            Object::Array(_) => Value::Array(id),
            Object::Instance(_) => Value::Instance(id),
        };
        self.objects.push(Some(obj));
        value
    }

    pub fn alloc_list(&mut self, items: Vec<Value>) -> Value {
        self.alloc(Object::List(items))
    }

    pub fn alloc_instance(&mut self, instance: Instance) -> Value {
        self.alloc(Object::Instance(instance))
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn list(&self, id: ObjectId) -> Option<&[Value]> {
        match self.get(id)? {
            Object::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn list_mut(&mut self, id: ObjectId) -> Option<&mut Vec<Value>> {
        match self.get_mut(id)? {
            Object::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn dict(&self, id: ObjectId) -> Option<&HashMap<Value, Value>> {
        match self.get(id)? {
            Object::Dict(map) => Some(map),
            _ => None,
        }
    }

    pub fn dict_mut(&mut self, id: ObjectId) -> Option<&mut HashMap<Value, Value>> {
        match self.get_mut(id)? {
            Object::Dict(map) => Some(map),
            _ => None,
        }
    }

    pub fn set(&self, id: ObjectId) -> Option<&HashSet<Value>> {
        match self.get(id)? {
            Object::Set(set) => Some(set),
            _ => None,
        }
    }

    pub fn array(&self, id: ObjectId) -> Option<&TypedArray> {
        match self.get(id)? {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn instance(&self, id: ObjectId) -> Option<&Instance> {
        match self.get(id)? {
            Object::Instance(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn instance_mut(&mut self, id: ObjectId) -> Option<&mut Instance> {
        match self.get_mut(id)? {
            Object::Instance(inst) => Some(inst),
            _ => None,
        }
    }

    /// Check an object out of its slot so it can be mutated while the rest
    /// of the heap is borrowed. Must be paired with [`Heap::restore`].
    pub(crate) fn take(&mut self, id: ObjectId) -> Option<Object> {
        self.objects.get_mut(id.0).and_then(Option::take)
    }

    pub(crate) fn restore(&mut self, id: ObjectId, obj: Object) {
        if let Some(slot) = self.objects.get_mut(id.0) {
            *slot = Some(obj);
        }
    }
}

/// Result of a decode: the root value plus the heap its references point into.
#[derive(Debug)]
pub struct Graph {
    root: Value,
    heap: Heap,
}

impl Graph {
    pub fn new(root: Value, heap: Heap) -> Self {
        Self { root, heap }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn into_parts(self) -> (Value, Heap) {
        (self.root, self.heap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_returns_matching_variant() {
        let mut heap = Heap::new();
        let l = heap.alloc_list(vec![Value::Int(1)]);
        let d = heap.alloc(Object::Dict(HashMap::new()));
        assert_eq!(l, Value::List(ObjectId(0)));
        assert_eq!(d, Value::Dict(ObjectId(1)));
        assert_eq!(heap.list(ObjectId(0)).unwrap(), &[Value::Int(1)]);
        assert!(heap.list(ObjectId(1)).is_none());
        assert_eq!(heap.len(), 2);
    }

    #[test]
    fn test_self_reference_is_an_id() {
        let mut heap = Heap::new();
        let l = heap.alloc_list(Vec::new());
        let id = l.object_id().unwrap();
        heap.list_mut(id).unwrap().push(l.clone());
        assert_eq!(heap.list(id).unwrap()[0], Value::List(id));
    }

    #[test]
    fn test_float_keys() {
        let mut set = HashSet::new();
        set.insert(Value::Float(f64::NAN));
        set.insert(Value::Float(f64::NAN));
        set.insert(Value::Float(0.0));
        set.insert(Value::Float(-0.0));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_hashability() {
        assert!(Value::Tuple(vec![Value::Int(1), Value::Str("a".into())]).is_hashable());
        assert!(!Value::Tuple(vec![Value::List(ObjectId(0))]).is_hashable());
        assert!(Value::Instance(ObjectId(3)).is_hashable());
        assert!(!Value::Dict(ObjectId(3)).is_hashable());
    }

    #[test]
    fn test_take_and_restore() {
        let mut heap = Heap::new();
        let v = heap.alloc_list(vec![Value::None]);
        let id = v.object_id().unwrap();
        let obj = heap.take(id).unwrap();
        assert!(heap.get(id).is_none());
        heap.restore(id, obj);
        assert_eq!(heap.list(id).unwrap().len(), 1);
    }

    #[test]
    fn test_qualname_display() {
        assert_eq!(QualName::new("datetime", "date").to_string(), "datetime.date");
    }
}
