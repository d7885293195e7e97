//! The dynamic value tree that dump and restore operate on.
//!
//! Plain JSON shapes (null, booleans, numbers, strings, arrays, keyed
//! objects) are represented directly. Anything richer — a date, a compiled
//! regular expression, a user-defined type — travels as a [`Foreign`] leaf
//! wrapping a host value behind the [`Exotic`] trait.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Error;

/// Keyed-object payload. Ordered so dumped output is deterministic.
pub type Map = BTreeMap<String, Value>;

/// A dynamic value: plain JSON shapes plus foreign leaves for rich values.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Map),
    Foreign(Foreign),
}

impl Value {
    /// Wrap a host value as a foreign leaf.
    pub fn wrap<T: Exotic>(value: T) -> Value {
        Value::Foreign(Foreign::new(value))
    }

    /// Build an object value from key/value entries.
    pub fn object<K, V, I>(entries: I) -> Value
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build an array value from items.
    pub fn array<V, I>(items: I) -> Value
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Value::Array(items.into_iter().map(Into::into).collect())
    }

    /// Returns a human-readable type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Foreign(f) => f.name(),
        }
    }

    /// True for null, booleans, numbers and strings.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
        )
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_foreign(&self) -> Option<&Foreign> {
        match self {
            Value::Foreign(f) => Some(f),
            _ => None,
        }
    }

    /// Downcast a foreign leaf to a concrete host type.
    pub fn downcast_ref<T: Exotic>(&self) -> Option<&T> {
        self.as_foreign().and_then(Foreign::downcast_ref)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Foreign(a), Value::Foreign(b)) => a.eq_foreign(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Array(items) => f.debug_list().entries(items).finish(),
            Value::Object(map) => f.debug_map().entries(map).finish(),
            Value::Foreign(fo) => fo.fmt(f),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Value {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Value {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Value {
        Value::Array(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Value {
        Value::Object(map)
    }
}

impl From<Foreign> for Value {
    fn from(f: Foreign) -> Value {
        Value::Foreign(f)
    }
}

// ── Exotic host values ──────────────────────────────────────────────

/// A host value that can appear inside a [`Value`] tree.
///
/// The trait is the seam between the conversion engine and concrete rich
/// types. Every hook has a do-nothing default, so a minimal implementation
/// is empty; rules then have to supply explicit dump/restore closures.
pub trait Exotic: Any + fmt::Debug + Send + Sync {
    /// Type ids of this type and its declared ancestors, most specific
    /// first, inclusive of the type itself. Declaring an ancestor makes
    /// the type match rules registered for that ancestor, and makes rules
    /// for this type sort ahead of them during dispatch.
    fn ancestry() -> Vec<TypeId>
    where
        Self: Sized,
    {
        vec![TypeId::of::<Self>()]
    }

    /// Canonical plain form of the value, if it has one. Serves as the
    /// default dump of class rules. Dispatched through the trait object,
    /// so an ancestor's rule dumps a descendant through the descendant's
    /// own implementation.
    fn to_plain(&self) -> Option<Value> {
        None
    }

    /// Whether this type implements [`Exotic::to_plain`]. Checked when a
    /// class rule without an explicit dump is constructed; types overriding
    /// `to_plain` must override this to return `true`.
    fn provides_plain() -> bool
    where
        Self: Sized,
    {
        false
    }

    /// Named zero-argument dump methods, for rules that select their dump
    /// by method name.
    fn invoke(&self, method: &str) -> Option<Value> {
        let _ = method;
        None
    }

    /// Structural equality against another exotic value. Backs both
    /// [`Value`] equality and sentinel matching of equality rules.
    fn eq_exotic(&self, other: &dyn Exotic) -> bool {
        let _ = other;
        false
    }
}

/// Last path segment of a type's name, generics included.
pub(crate) fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let head = full.split('<').next().unwrap_or(full);
    let start = head.rfind("::").map(|i| i + 2).unwrap_or(0);
    &full[start..]
}

/// A type-erased rich value plus the type chain captured when it was
/// wrapped. The chain is what class and proto rules match against.
#[derive(Clone)]
pub struct Foreign {
    name: &'static str,
    chain: Arc<[TypeId]>,
    data: Arc<dyn Exotic>,
}

impl Foreign {
    /// Wrap a host value, capturing its declared ancestry.
    pub fn new<T: Exotic>(value: T) -> Foreign {
        Foreign {
            name: short_type_name::<T>(),
            chain: T::ancestry().into(),
            data: Arc::new(value),
        }
    }

    /// Wrap a host value with an explicit chain. Used where the chain is
    /// per-instance rather than per-type, as with [`ProtoObject`].
    pub fn with_chain<T: Exotic>(value: T, chain: Vec<TypeId>) -> Foreign {
        Foreign {
            name: short_type_name::<T>(),
            chain: chain.into(),
            data: Arc::new(value),
        }
    }

    /// Short name of the wrapped type, for error messages.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The captured type chain, most specific first.
    pub fn chain(&self) -> &[TypeId] {
        &self.chain
    }

    /// Whether `id` appears anywhere in the chain — the instance-of test.
    pub fn is_instance(&self, id: TypeId) -> bool {
        self.chain.contains(&id)
    }

    pub fn downcast_ref<T: Exotic>(&self) -> Option<&T> {
        let any: &dyn Any = self.data.as_ref();
        any.downcast_ref::<T>()
    }

    pub fn to_plain(&self) -> Option<Value> {
        self.data.to_plain()
    }

    pub fn invoke(&self, method: &str) -> Option<Value> {
        self.data.invoke(method)
    }

    pub(crate) fn eq_foreign(&self, other: &Foreign) -> bool {
        Arc::ptr_eq(&self.data, &other.data) || self.data.eq_exotic(other.data.as_ref())
    }
}

impl fmt::Debug for Foreign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Foreign({}: {:?})", self.name, self.data)
    }
}

// ── Proto objects ───────────────────────────────────────────────────

/// A property bag attached to a marker lineage: the dynamic analogue of an
/// object created straight off a prototype, without a named constructor.
///
/// Proto rules with no explicit conversions dump one of these by copying
/// its properties into a plain object, and restore by rebuilding the bag
/// with the rule's marker chain attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoObject {
    chain: Vec<TypeId>,
    props: Map,
}

impl ProtoObject {
    /// A property bag carrying marker `M`'s lineage.
    pub fn new<M: Exotic>(props: Map) -> ProtoObject {
        ProtoObject {
            chain: M::ancestry(),
            props,
        }
    }

    /// A property bag with an explicit chain.
    pub fn from_chain(chain: Vec<TypeId>, props: Map) -> ProtoObject {
        ProtoObject { chain, props }
    }

    pub fn props(&self) -> &Map {
        &self.props
    }

    pub fn into_props(self) -> Map {
        self.props
    }

    /// Whether marker `M` appears in this bag's lineage.
    pub fn has_marker<M: Exotic>(&self) -> bool {
        self.chain.contains(&TypeId::of::<M>())
    }

    /// Wrap into a [`Value`], carrying the bag's own chain.
    pub fn into_value(self) -> Value {
        let chain = self.chain.clone();
        Value::Foreign(Foreign::with_chain(self, chain))
    }
}

impl Exotic for ProtoObject {
    fn to_plain(&self) -> Option<Value> {
        Some(Value::Object(self.props.clone()))
    }

    fn provides_plain() -> bool {
        true
    }

    fn eq_exotic(&self, other: &dyn Exotic) -> bool {
        let any: &dyn Any = other;
        any.downcast_ref::<ProtoObject>() == Some(self)
    }
}

/// Fallible construction from a restored plain payload: the default
/// restore of class rules, the analogue of invoking a constructor with
/// the dumped value as sole argument.
pub trait FromPlain: Exotic + Sized {
    fn from_plain(plain: Value) -> Result<Self, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Point {
        x: f64,
        y: f64,
    }

    impl Exotic for Point {
        fn eq_exotic(&self, other: &dyn Exotic) -> bool {
            let any: &dyn Any = other;
            any.downcast_ref::<Point>() == Some(self)
        }
    }

    #[test]
    fn wrap_and_downcast() {
        let v = Value::wrap(Point { x: 1.0, y: 2.0 });
        let p = v.downcast_ref::<Point>().unwrap();
        assert_eq!(p, &Point { x: 1.0, y: 2.0 });
        assert!(v.downcast_ref::<ProtoObject>().is_none());
    }

    #[test]
    fn foreign_equality_is_structural() {
        let a = Value::wrap(Point { x: 1.0, y: 2.0 });
        let b = Value::wrap(Point { x: 1.0, y: 2.0 });
        let c = Value::wrap(Point { x: 3.0, y: 4.0 });
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn chain_defaults_to_own_type_id() {
        let f = Foreign::new(Point { x: 0.0, y: 0.0 });
        assert_eq!(f.chain(), &[TypeId::of::<Point>()]);
        assert!(f.is_instance(TypeId::of::<Point>()));
        assert!(!f.is_instance(TypeId::of::<ProtoObject>()));
    }

    #[test]
    fn short_name_strips_path() {
        assert_eq!(short_type_name::<Point>(), "Point");
        assert_eq!(short_type_name::<Vec<Point>>(), "Vec<tagson_core::value::tests::Point>");
    }

    #[test]
    fn value_conversions() {
        assert_eq!(Value::from(1i64), Value::Number(1.0));
        assert_eq!(Value::from("x"), Value::String("x".to_owned()));
        let obj = Value::object([("a", Value::Null)]);
        assert_eq!(obj.as_object().unwrap().len(), 1);
        assert_eq!(Value::array([1i64, 2]), Value::Array(vec![Value::Number(1.0), Value::Number(2.0)]));
    }

    #[test]
    fn proto_object_marker_lookup() {
        struct Marker;
        impl fmt::Debug for Marker {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("Marker")
            }
        }
        impl Exotic for Marker {}

        let bag = ProtoObject::new::<Marker>(Map::new());
        assert!(bag.has_marker::<Marker>());
        assert!(!bag.has_marker::<ProtoObject>());

        let v = bag.clone().into_value();
        let f = v.as_foreign().unwrap();
        assert!(f.is_instance(TypeId::of::<Marker>()));
        assert_eq!(v.downcast_ref::<ProtoObject>(), Some(&bag));
    }
}
