//! The composite conversion engine: an ordered, validated set of unit
//! converters plus prefix/codec configuration.
//!
//! Dispatch during dump follows a fixed precedence: predicate and equality
//! rules first (so ad hoc predicates can intercept primitives before any
//! structural matching), then class rules most-specific-first, then proto
//! rules most-specific-first. Values no rule recognizes recurse if they
//! are arrays or plain objects and pass through opaquely otherwise.
//!
//! Composites are immutable after construction; every composition
//! operation returns a new instance.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use crate::codec::{JsonCodec, TextCodec};
use crate::error::Error;
use crate::spec::{ClassSpec, EqualSpec, PredSpec, ProtoSpec, Spec};
use crate::unit::{Matcher, RuleKind, UnitConverter};
use crate::value::{Exotic, Foreign, Map, Value};

/// Engine configuration: the tag prefix and the text codec.
#[derive(Clone)]
pub struct Options {
    pub prefix: String,
    pub codec: Arc<dyn TextCodec>,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            prefix: "$".to_owned(),
            codec: Arc::new(JsonCodec),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Partial configuration for [`CompositeConv::with_options`]: omitted
/// fields keep their current values.
#[derive(Clone, Default)]
pub struct OptionsPatch {
    pub prefix: Option<String>,
    pub codec: Option<Arc<dyn TextCodec>>,
}

impl OptionsPatch {
    pub fn prefix(mut self, prefix: impl Into<String>) -> OptionsPatch {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn codec(mut self, codec: Arc<dyn TextCodec>) -> OptionsPatch {
        self.codec = Some(codec);
        self
    }
}

/// A polymorphic source of rule specs: a vec of specs, a single spec, or
/// another composite (flattened into its converters, order preserved).
pub struct SpecList(Vec<Spec>);

impl SpecList {
    pub fn into_vec(self) -> Vec<Spec> {
        self.0
    }
}

impl From<Vec<Spec>> for SpecList {
    fn from(specs: Vec<Spec>) -> SpecList {
        SpecList(specs)
    }
}

impl From<Spec> for SpecList {
    fn from(spec: Spec) -> SpecList {
        SpecList(vec![spec])
    }
}

impl From<ClassSpec> for SpecList {
    fn from(spec: ClassSpec) -> SpecList {
        SpecList(vec![spec.into()])
    }
}

impl From<ProtoSpec> for SpecList {
    fn from(spec: ProtoSpec) -> SpecList {
        SpecList(vec![spec.into()])
    }
}

impl From<PredSpec> for SpecList {
    fn from(spec: PredSpec) -> SpecList {
        SpecList(vec![spec.into()])
    }
}

impl From<EqualSpec> for SpecList {
    fn from(spec: EqualSpec) -> SpecList {
        SpecList(vec![spec.into()])
    }
}

impl From<UnitConverter> for SpecList {
    fn from(unit: UnitConverter) -> SpecList {
        SpecList(vec![Spec::Unit(unit)])
    }
}

impl From<&CompositeConv> for SpecList {
    fn from(composite: &CompositeConv) -> SpecList {
        SpecList(
            composite
                .units
                .iter()
                .cloned()
                .map(Spec::Unit)
                .collect(),
        )
    }
}

impl From<CompositeConv> for SpecList {
    fn from(composite: CompositeConv) -> SpecList {
        SpecList(composite.units.into_iter().map(Spec::Unit).collect())
    }
}

impl FromIterator<Spec> for SpecList {
    fn from_iter<I: IntoIterator<Item = Spec>>(iter: I) -> SpecList {
        SpecList(iter.into_iter().collect())
    }
}

/// Selector for [`CompositeConv::exclude`]: exactly one criterion.
#[derive(Debug, Clone)]
pub enum Exclude {
    /// Converters registered for this host type.
    Class(TypeId),
    /// Converters registered for this structural marker.
    Proto(TypeId),
    /// The converter with this (namespace, token) pair.
    Token {
        namespace: Option<String>,
        token: String,
    },
    /// Every converter in this namespace.
    Namespace(String),
}

impl Exclude {
    pub fn class<T: Exotic>() -> Exclude {
        Exclude::Class(TypeId::of::<T>())
    }

    pub fn proto<M: Exotic>() -> Exclude {
        Exclude::Proto(TypeId::of::<M>())
    }

    pub fn token(namespace: Option<&str>, token: &str) -> Exclude {
        Exclude::Token {
            namespace: namespace.map(str::to_owned),
            token: token.to_owned(),
        }
    }

    pub fn namespace(namespace: impl Into<String>) -> Exclude {
        Exclude::Namespace(namespace.into())
    }

    fn matches(&self, unit: &UnitConverter) -> bool {
        match self {
            Exclude::Class(id) => {
                matches!(unit.matcher(), Matcher::Class(c) if c.id() == *id)
            }
            Exclude::Proto(id) => {
                matches!(unit.matcher(), Matcher::Proto(p) if p.id() == *id)
            }
            Exclude::Token { namespace, token } => {
                unit.namespace() == namespace.as_deref() && unit.token() == token
            }
            Exclude::Namespace(ns) => unit.namespace() == Some(ns.as_str()),
        }
    }
}

/// The dispatcher: owns the converters, the dispatch buckets and the
/// configuration. See the module docs for dispatch precedence.
#[derive(Clone)]
pub struct CompositeConv {
    units: Vec<UnitConverter>,
    preds: Vec<UnitConverter>,
    classes: Vec<UnitConverter>,
    protos: Vec<UnitConverter>,
    options: Options,
}

impl CompositeConv {
    /// Build a composite from specs with default options.
    pub fn new(specs: impl Into<SpecList>) -> Result<CompositeConv, Error> {
        Self::new_with_options(specs, Options::default())
    }

    /// Build a composite from specs with explicit options.
    pub fn new_with_options(
        specs: impl Into<SpecList>,
        options: Options,
    ) -> Result<CompositeConv, Error> {
        let units = specs
            .into()
            .into_vec()
            .into_iter()
            .map(UnitConverter::from_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_units(units, options)
    }

    /// Internal constructor over already-built converters. Re-runs bucket
    /// partitioning and the consistency checks, so construction stays
    /// atomic on every path.
    fn from_units(units: Vec<UnitConverter>, options: Options) -> Result<CompositeConv, Error> {
        if options.prefix.is_empty() {
            return Err(Error::InvalidConfig("prefix must be non-empty".to_owned()));
        }

        let preds = units
            .iter()
            .filter(|u| matches!(u.kind(), RuleKind::Predicate | RuleKind::Equality))
            .cloned()
            .collect();
        let mut classes: Vec<UnitConverter> = units
            .iter()
            .filter(|u| u.kind() == RuleKind::Class)
            .cloned()
            .collect();
        classes.sort_by(|a, b| b.specificity().cmp(&a.specificity()));
        let mut protos: Vec<UnitConverter> = units
            .iter()
            .filter(|u| u.kind() == RuleKind::Proto)
            .cloned()
            .collect();
        protos.sort_by(|a, b| b.specificity().cmp(&a.specificity()));

        if let Some(reason) = Self::validate_consistency(&units) {
            return Err(Error::InconsistentRules(reason));
        }

        Ok(CompositeConv {
            units,
            preds,
            classes,
            protos,
            options,
        })
    }

    /// Every distinct (namespace, token) pair must be claimed by exactly
    /// one converter; class and proto identities must be claimed at most
    /// once across the whole set regardless of namespace.
    fn validate_consistency(units: &[UnitConverter]) -> Option<String> {
        for unit in units {
            let same_token = units
                .iter()
                .filter(|o| o.namespace() == unit.namespace() && o.token() == unit.token())
                .count();
            if same_token > 1 {
                return Some(format!(
                    "{} converters for token {}",
                    same_token,
                    unit.token()
                ));
            }
            if let Matcher::Class(class) = unit.matcher() {
                let same_class = units
                    .iter()
                    .filter(|o| matches!(o.matcher(), Matcher::Class(c) if c.id() == class.id()))
                    .count();
                if same_class > 1 {
                    return Some(format!(
                        "{} converters for class {}",
                        same_class,
                        class.name()
                    ));
                }
            }
            if let Matcher::Proto(proto) = unit.matcher() {
                let same_proto = units
                    .iter()
                    .filter(|o| matches!(o.matcher(), Matcher::Proto(p) if p.id() == proto.id()))
                    .count();
                if same_proto > 1 {
                    return Some(format!(
                        "{} converters for proto {}",
                        same_proto,
                        unit.token()
                    ));
                }
            }
        }
        None
    }

    // ── Read-only access ────────────────────────────────────────────

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// All converters, in registration order.
    pub fn converters(&self) -> &[UnitConverter] {
        &self.units
    }

    /// Predicate and equality converters, in registration order.
    pub fn pred_converters(&self) -> &[UnitConverter] {
        &self.preds
    }

    /// Class converters, most specific first.
    pub fn class_converters(&self) -> &[UnitConverter] {
        &self.classes
    }

    /// Proto converters, most specific first.
    pub fn proto_converters(&self) -> &[UnitConverter] {
        &self.protos
    }

    // ── Dump ────────────────────────────────────────────────────────

    /// Convert a value tree into tagged plain data. The input is never
    /// mutated; every recognized value is replaced by a single-key object
    /// `{prefix + path: dumped payload}`.
    pub fn dump(&self, value: &Value) -> Value {
        self.dump_borrowed(value)
    }

    /// Dump over borrowed input: produces fresh copies.
    fn dump_borrowed(&self, value: &Value) -> Value {
        if let Some(unit) = self.find_pred(value) {
            return self.wrap_tag(unit, unit.dump(value));
        }
        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
            Value::Foreign(foreign) => match self.find_foreign(foreign) {
                Some(unit) => self.wrap_tag(unit, unit.dump(value)),
                // No rule knows how to decompose it: pass through opaquely
                // and let the text boundary surface the problem, if any.
                None => value.clone(),
            },
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.dump_borrowed(item)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, item)| (key.clone(), self.dump_borrowed(item)))
                    .collect(),
            ),
        }
    }

    /// Dump over owned input: rule outputs and freshly-built containers
    /// are consumed in place instead of being copied a second time.
    fn dump_owned(&self, value: Value) -> Value {
        if let Some(unit) = self.find_pred(&value) {
            return self.wrap_tag(unit, unit.dump(&value));
        }
        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => value,
            Value::Foreign(ref foreign) => match self.find_foreign(foreign) {
                Some(unit) => self.wrap_tag(unit, unit.dump(&value)),
                None => value,
            },
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|item| self.dump_owned(item)).collect())
            }
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, item)| (key, self.dump_owned(item)))
                    .collect(),
            ),
        }
    }

    fn wrap_tag(&self, unit: &UnitConverter, inner: Value) -> Value {
        let mut tagged = Map::new();
        tagged.insert(
            format!("{}{}", self.options.prefix, unit.path()),
            self.dump_owned(inner),
        );
        Value::Object(tagged)
    }

    fn find_pred(&self, value: &Value) -> Option<&UnitConverter> {
        self.preds.iter().find(|unit| match unit.matcher() {
            Matcher::Pred(pred) => pred(value),
            Matcher::Equal(sentinel) => value == sentinel,
            _ => false,
        })
    }

    fn find_foreign(&self, foreign: &Foreign) -> Option<&UnitConverter> {
        self.classes
            .iter()
            .find(|unit| matches!(unit.matcher(), Matcher::Class(c) if foreign.is_instance(c.id())))
            .or_else(|| {
                self.protos.iter().find(
                    |unit| matches!(unit.matcher(), Matcher::Proto(p) if foreign.is_instance(p.id())),
                )
            })
    }

    // ── Restore ─────────────────────────────────────────────────────

    /// Reconstruct rich values from tagged plain data, leaving the input
    /// untouched.
    pub fn restore(&self, value: &Value) -> Result<Value, Error> {
        self.restore_owned(value.clone())
    }

    /// Restore consuming the input: for freshly-allocated trees (e.g. just
    /// parsed) where no copy is needed.
    pub fn restore_owned(&self, value: Value) -> Result<Value, Error> {
        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => Ok(value),
            Value::Foreign(_) => Ok(value),
            Value::Array(items) => Ok(Value::Array(
                items
                    .into_iter()
                    .map(|item| self.restore_owned(item))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Value::Object(map) => {
                // A single-key object whose key starts with the prefix is a
                // tag candidate; an unregistered path falls through to
                // ordinary object treatment.
                let path = if map.len() == 1 {
                    map.keys()
                        .next()
                        .and_then(|key| key.strip_prefix(&self.options.prefix))
                        .map(str::to_owned)
                } else {
                    None
                };
                if let Some(path) = path {
                    if let Some(unit) = self.units.iter().find(|u| u.path() == path) {
                        let inner = map.into_values().next().unwrap_or(Value::Null);
                        let restored = self.restore_owned(inner)?;
                        return unit.restore(restored);
                    }
                }
                let mut restored = Map::new();
                for (key, item) in map {
                    restored.insert(key, self.restore_owned(item)?);
                }
                Ok(Value::Object(restored))
            }
        }
    }

    // ── Text boundary ───────────────────────────────────────────────

    /// Dump, then hand the plain tree to the codec.
    pub fn serialize(&self, value: &Value) -> Result<String, Error> {
        let dumped = self.dump(value);
        self.options.codec.serialize(&dumped, None)
    }

    /// Like [`CompositeConv::serialize`], with an indentation width
    /// forwarded to the codec.
    pub fn serialize_indented(&self, value: &Value, indent: usize) -> Result<String, Error> {
        let dumped = self.dump(value);
        self.options.codec.serialize(&dumped, Some(indent))
    }

    /// Parse text through the codec, then restore in place: the parsed
    /// tree is freshly allocated, so no defensive copy is needed.
    pub fn parse(&self, text: &str) -> Result<Value, Error> {
        let parsed = self.options.codec.parse(text)?;
        self.restore_owned(parsed)
    }

    // ── Composition algebra ─────────────────────────────────────────

    /// New composite from this one's converters followed by the given
    /// specs, fully revalidated: collisions fail with
    /// [`Error::InconsistentRules`].
    pub fn extend_with(&self, specs: impl Into<SpecList>) -> Result<CompositeConv, Error> {
        let mut merged: Vec<Spec> = self.units.iter().cloned().map(Spec::Unit).collect();
        merged.extend(specs.into().into_vec());
        Self::new_with_options(merged, self.options.clone())
    }

    /// Like [`CompositeConv::extend_with`], but later entries silently
    /// evict earlier ones they collide with: the concatenation is walked
    /// in reverse, prepending each survivor and discarding any candidate
    /// that would make the running result inconsistent.
    ///
    /// The receiver's options always win; the argument contributes
    /// converters only, even when it is another composite. Use
    /// [`CompositeConv::with_options`] to change prefix or codec.
    pub fn override_by(&self, specs: impl Into<SpecList>) -> Result<CompositeConv, Error> {
        let mut candidates: Vec<UnitConverter> =
            self.units.clone();
        for spec in specs.into().into_vec() {
            candidates.push(UnitConverter::from_spec(spec)?);
        }
        let mut survivors: Vec<UnitConverter> = Vec::with_capacity(candidates.len());
        for unit in candidates.into_iter().rev() {
            survivors.insert(0, unit);
            if Self::validate_consistency(&survivors).is_some() {
                survivors.remove(0);
            }
        }
        Self::from_units(survivors, self.options.clone())
    }

    /// New composite with the same converters and selectively replaced
    /// options.
    pub fn with_options(&self, patch: OptionsPatch) -> Result<CompositeConv, Error> {
        let options = Options {
            prefix: patch
                .prefix
                .unwrap_or_else(|| self.options.prefix.clone()),
            codec: patch.codec.unwrap_or_else(|| self.options.codec.clone()),
        };
        Self::from_units(self.units.clone(), options)
    }

    /// New composite without the converters matched by the selector.
    pub fn exclude(&self, selector: &Exclude) -> Result<CompositeConv, Error> {
        let retained = self
            .units
            .iter()
            .filter(|unit| !selector.matches(unit))
            .cloned()
            .collect();
        Self::from_units(retained, self.options.clone())
    }
}

impl fmt::Debug for CompositeConv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeConv")
            .field("units", &self.units)
            .field("options", &self.options)
            .finish()
    }
}
