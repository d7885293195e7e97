//! Rule specifications: the user-authored description of one conversion
//! rule, before validation and normalization into a [`UnitConverter`].
//!
//! Four variants exist, discriminated by how a value is recognized:
//! by type ([`ClassSpec`]), by structural marker ([`ProtoSpec`]), by
//! predicate ([`PredSpec`]) and by sentinel equality ([`EqualSpec`]).

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Error;
use crate::unit::UnitConverter;
use crate::value::{short_type_name, Exotic, Foreign, FromPlain, Value};

/// Converts a matched value into its plain representable form.
pub type DumpFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Reconstructs the original value from its restored plain form.
pub type RestoreFn = Arc<dyn Fn(Value) -> Result<Value, Error> + Send + Sync>;

/// Recognition test of a predicate rule.
pub type PredFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

static IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier regex"));

/// Token syntax: one identifier.
pub(crate) fn is_valid_name(s: &str) -> bool {
    IDENT.is_match(s)
}

/// Namespace syntax: dot-separated identifiers.
pub(crate) fn is_valid_namespace(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_valid_name)
}

/// How a rule dumps, resolved once at converter construction.
#[derive(Clone)]
pub enum DumpSpec {
    /// Explicit conversion closure.
    Fn(DumpFn),
    /// Invoke a named zero-argument method via [`Exotic::invoke`].
    Method(String),
    /// Use the variant's default: [`Exotic::to_plain`] for class rules,
    /// property copying for proto rules.
    Default,
}

impl fmt::Debug for DumpSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpSpec::Fn(_) => f.write_str("DumpSpec::Fn"),
            DumpSpec::Method(name) => write!(f, "DumpSpec::Method({:?})", name),
            DumpSpec::Default => f.write_str("DumpSpec::Default"),
        }
    }
}

/// How a rule restores, resolved once at converter construction.
#[derive(Clone)]
pub enum RestoreSpec {
    /// Explicit reconstruction closure.
    Fn(RestoreFn),
    /// Use the variant's default: [`FromPlain`] for class rules, property
    /// bag rebuilding for proto rules.
    Default,
}

impl fmt::Debug for RestoreSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreSpec::Fn(_) => f.write_str("RestoreSpec::Fn"),
            RestoreSpec::Default => f.write_str("RestoreSpec::Default"),
        }
    }
}

/// One rule specification of any variant.
#[derive(Debug, Clone)]
pub enum Spec {
    Class(ClassSpec),
    Proto(ProtoSpec),
    Pred(PredSpec),
    Equal(EqualSpec),
    /// An already-constructed converter, passed through unmodified.
    Unit(UnitConverter),
}

impl From<ClassSpec> for Spec {
    fn from(s: ClassSpec) -> Spec {
        Spec::Class(s)
    }
}

impl From<ProtoSpec> for Spec {
    fn from(s: ProtoSpec) -> Spec {
        Spec::Proto(s)
    }
}

impl From<PredSpec> for Spec {
    fn from(s: PredSpec) -> Spec {
        Spec::Pred(s)
    }
}

impl From<EqualSpec> for Spec {
    fn from(s: EqualSpec) -> Spec {
        Spec::Equal(s)
    }
}

impl From<UnitConverter> for Spec {
    fn from(u: UnitConverter) -> Spec {
        Spec::Unit(u)
    }
}

// ── Type references ─────────────────────────────────────────────────

/// Registration-time identity of a host type: its id, display name,
/// declared ancestry and whether it carries a canonical plain form.
#[derive(Debug, Clone)]
pub struct ClassRef {
    pub(crate) id: TypeId,
    pub(crate) name: &'static str,
    pub(crate) chain: Vec<TypeId>,
    pub(crate) has_plain: bool,
}

impl ClassRef {
    pub fn of<T: Exotic>() -> ClassRef {
        ClassRef {
            id: TypeId::of::<T>(),
            name: short_type_name::<T>(),
            chain: T::ancestry(),
            has_plain: T::provides_plain(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Registration-time identity of a structural marker.
#[derive(Debug, Clone)]
pub struct ProtoRef {
    pub(crate) id: TypeId,
    pub(crate) chain: Vec<TypeId>,
}

impl ProtoRef {
    pub fn of<M: Exotic>() -> ProtoRef {
        ProtoRef {
            id: TypeId::of::<M>(),
            chain: M::ancestry(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }
}

// ── Class rules ─────────────────────────────────────────────────────

/// A rule matching values by their type chain: a value matches when the
/// rule's type id appears anywhere in its ancestry, so a rule for a base
/// type also catches declared descendants.
#[derive(Clone)]
pub struct ClassSpec {
    pub(crate) class: ClassRef,
    pub(crate) token: Option<String>,
    pub(crate) namespace: Option<String>,
    pub(crate) dump: DumpSpec,
    pub(crate) restore: RestoreSpec,
    pub(crate) default_restore: Option<RestoreFn>,
}

impl fmt::Debug for ClassSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassSpec")
            .field("class", &self.class)
            .field("token", &self.token)
            .field("namespace", &self.namespace)
            .field("dump", &self.dump)
            .field("restore", &self.restore)
            .finish_non_exhaustive()
    }
}

impl ClassSpec {
    /// Rule with both defaults wired: dump through [`Exotic::to_plain`],
    /// restore through [`FromPlain`].
    pub fn new<T: Exotic + FromPlain>() -> ClassSpec {
        ClassSpec {
            class: ClassRef::of::<T>(),
            token: None,
            namespace: None,
            dump: DumpSpec::Default,
            restore: RestoreSpec::Default,
            default_restore: Some(Arc::new(|plain| {
                T::from_plain(plain).map(|v| Value::Foreign(Foreign::new(v)))
            })),
        }
    }

    /// Bare rule: dump and restore must be supplied explicitly (or the
    /// type must provide a plain form for the dump side).
    pub fn of<T: Exotic>() -> ClassSpec {
        ClassSpec {
            class: ClassRef::of::<T>(),
            token: None,
            namespace: None,
            dump: DumpSpec::Default,
            restore: RestoreSpec::Default,
            default_restore: None,
        }
    }

    /// Rule with explicit conversions for `T`, both typed.
    pub fn with<T, D, P, R>(dump: D, restore: R) -> ClassSpec
    where
        T: Exotic,
        D: Fn(&T) -> P + Send + Sync + 'static,
        P: Into<Value>,
        R: Fn(Value) -> Result<T, Error> + Send + Sync + 'static,
    {
        ClassSpec::of::<T>().dump_with(dump).restore_with(restore)
    }

    pub fn token(mut self, token: impl Into<String>) -> ClassSpec {
        self.token = Some(token.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> ClassSpec {
        self.namespace = Some(namespace.into());
        self
    }

    /// Explicit dump typed on the concrete host type. When dispatch lands
    /// here with a descendant instance that fails the downcast, the value's
    /// own [`Exotic::to_plain`] is used instead.
    pub fn dump_with<T, D, P>(mut self, dump: D) -> ClassSpec
    where
        T: Exotic,
        D: Fn(&T) -> P + Send + Sync + 'static,
        P: Into<Value>,
    {
        self.dump = DumpSpec::Fn(typed_dump::<T, _, _>(dump));
        self
    }

    /// Select the dump by method name, resolved at dump time through
    /// [`Exotic::invoke`].
    pub fn dump_method(mut self, name: impl Into<String>) -> ClassSpec {
        self.dump = DumpSpec::Method(name.into());
        self
    }

    pub fn restore_with<T, R>(mut self, restore: R) -> ClassSpec
    where
        T: Exotic,
        R: Fn(Value) -> Result<T, Error> + Send + Sync + 'static,
    {
        self.restore = RestoreSpec::Fn(Arc::new(move |plain| {
            restore(plain).map(|v| Value::Foreign(Foreign::new(v)))
        }));
        self
    }
}

/// Wrap a typed dump closure into the erased [`DumpFn`] shape.
pub(crate) fn typed_dump<T, D, P>(dump: D) -> DumpFn
where
    T: Exotic,
    D: Fn(&T) -> P + Send + Sync + 'static,
    P: Into<Value>,
{
    Arc::new(move |value| match value.downcast_ref::<T>() {
        Some(concrete) => dump(concrete).into(),
        None => value
            .as_foreign()
            .and_then(Foreign::to_plain)
            .unwrap_or(Value::Null),
    })
}

// ── Proto rules ─────────────────────────────────────────────────────

/// A rule matching values by a structural marker in their chain rather
/// than by concrete type: duck-typed inheritance without a constructor.
#[derive(Debug, Clone)]
pub struct ProtoSpec {
    pub(crate) proto: ProtoRef,
    pub(crate) token: String,
    pub(crate) namespace: Option<String>,
    pub(crate) dump: DumpSpec,
    pub(crate) restore: RestoreSpec,
}

impl ProtoSpec {
    pub fn new<M: Exotic>(token: impl Into<String>) -> ProtoSpec {
        ProtoSpec {
            proto: ProtoRef::of::<M>(),
            token: token.into(),
            namespace: None,
            dump: DumpSpec::Default,
            restore: RestoreSpec::Default,
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> ProtoSpec {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn dump_fn<D>(mut self, dump: D) -> ProtoSpec
    where
        D: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.dump = DumpSpec::Fn(Arc::new(dump));
        self
    }

    pub fn dump_method(mut self, name: impl Into<String>) -> ProtoSpec {
        self.dump = DumpSpec::Method(name.into());
        self
    }

    pub fn restore_fn<R>(mut self, restore: R) -> ProtoSpec
    where
        R: Fn(Value) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.restore = RestoreSpec::Fn(Arc::new(restore));
        self
    }
}

// ── Predicate rules ─────────────────────────────────────────────────

/// A rule matching values by an arbitrary boolean test. Dump and restore
/// carry no defaults: with no type to infer behavior from, both are
/// required at construction.
#[derive(Clone)]
pub struct PredSpec {
    pub(crate) token: String,
    pub(crate) namespace: Option<String>,
    pub(crate) pred: PredFn,
    pub(crate) dump: DumpFn,
    pub(crate) restore: RestoreFn,
}

impl PredSpec {
    pub fn new<P, D, R>(token: impl Into<String>, pred: P, dump: D, restore: R) -> PredSpec
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
        D: Fn(&Value) -> Value + Send + Sync + 'static,
        R: Fn(Value) -> Result<Value, Error> + Send + Sync + 'static,
    {
        PredSpec {
            token: token.into(),
            namespace: None,
            pred: Arc::new(pred),
            dump: Arc::new(dump),
            restore: Arc::new(restore),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> PredSpec {
        self.namespace = Some(namespace.into());
        self
    }
}

impl fmt::Debug for PredSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredSpec")
            .field("token", &self.token)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

// ── Equality rules ──────────────────────────────────────────────────

/// A degenerate rule recognizing a single sentinel value by structural
/// equality. Dispatches in the predicate bucket.
#[derive(Clone)]
pub struct EqualSpec {
    pub(crate) token: String,
    pub(crate) namespace: Option<String>,
    pub(crate) value: Value,
    pub(crate) dump: DumpFn,
    pub(crate) restore: RestoreFn,
}

impl EqualSpec {
    pub fn new<D, R>(
        token: impl Into<String>,
        sentinel: impl Into<Value>,
        dump: D,
        restore: R,
    ) -> EqualSpec
    where
        D: Fn(&Value) -> Value + Send + Sync + 'static,
        R: Fn(Value) -> Result<Value, Error> + Send + Sync + 'static,
    {
        EqualSpec {
            token: token.into(),
            namespace: None,
            value: sentinel.into(),
            dump: Arc::new(dump),
            restore: Arc::new(restore),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> EqualSpec {
        self.namespace = Some(namespace.into());
        self
    }
}

impl fmt::Debug for EqualSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EqualSpec")
            .field("token", &self.token)
            .field("namespace", &self.namespace)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_syntax() {
        assert!(is_valid_name("Foo"));
        assert!(is_valid_name("_x$1"));
        assert!(is_valid_name("$"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("1x"));
        assert!(!is_valid_name("a-b"));
        assert!(!is_valid_name("a.b"));
    }

    #[test]
    fn specs_format_for_debugging() {
        #[derive(Debug)]
        struct Marker;
        impl Exotic for Marker {}

        // Callable fields are elided, everything else prints.
        let spec = ClassSpec::of::<Marker>().token("M").dump_method("plain");
        let repr = format!("{:?}", spec);
        assert!(repr.contains("ClassSpec"));
        assert!(repr.contains("DumpSpec::Method(\"plain\")"));

        let repr = format!("{:?}", Spec::from(spec));
        assert!(repr.contains("ClassSpec"));
    }

    #[test]
    fn namespace_syntax() {
        assert!(is_valid_namespace("foo"));
        assert!(is_valid_namespace("foo.bar.baz"));
        assert!(!is_valid_namespace(""));
        assert!(!is_valid_namespace(".foo"));
        assert!(!is_valid_namespace("foo..bar"));
        assert!(!is_valid_namespace("foo.1bar"));
    }
}
