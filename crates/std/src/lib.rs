//! tagson-std: the standard rule set for the tagson conversion engine.
//!
//! Covers the intrinsic types plain JSON cannot carry, with wire tags
//! compatible across implementations:
//!
//! | token      | host type         | plain form               |
//! |------------|-------------------|--------------------------|
//! | `Infinity` | non-finite number | `1` / `-1`               |
//! | `Date`     | [`Date`]          | RFC 3339 string          |
//! | `RegExp`   | [`Pattern`]       | pattern source string    |
//! | `Buffer`   | [`Blob`]          | standard base64 string   |
//! | `Map`      | [`ValueMap`]      | array of `[key, value]`  |
//! | `Set`      | [`ValueSet`]      | array of members         |
//!
//! Map keys and set members may themselves be rich values; the engine
//! dumps and restores them recursively.

use std::any::Any;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::Regex;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use tagson_core::{
    ClassSpec, CompositeConv, Error, Exotic, FromPlain, PredSpec, Spec, Value,
};

/// The standard composite: all built-in rules, default options.
pub fn standard() -> Result<CompositeConv, Error> {
    CompositeConv::new(specs())
}

/// The built-in rule specs, for callers composing their own rule set.
pub fn specs() -> Vec<Spec> {
    vec![
        PredSpec::new(
            "Infinity",
            |v| matches!(v, Value::Number(n) if n.is_infinite()),
            |v| match v.as_f64() {
                Some(n) if n == f64::INFINITY => Value::Number(1.0),
                _ => Value::Number(-1.0),
            },
            |plain| match plain.as_f64() {
                Some(n) if n == 1.0 => Ok(Value::Number(f64::INFINITY)),
                Some(n) if n == -1.0 => Ok(Value::Number(f64::NEG_INFINITY)),
                other => Err(Error::restore(
                    "Infinity",
                    format!("expected 1 or -1, got {:?}", other),
                )),
            },
        )
        .into(),
        ClassSpec::new::<Date>().into(),
        ClassSpec::new::<Pattern>().token("RegExp").into(),
        ClassSpec::new::<Blob>().token("Buffer").into(),
        ClassSpec::new::<ValueMap>().token("Map").into(),
        ClassSpec::new::<ValueSet>().token("Set").into(),
    ]
}

// ── Date ────────────────────────────────────────────────────────────

/// A point in time, transported as an RFC 3339 string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Date(OffsetDateTime);

impl Date {
    pub fn new(instant: OffsetDateTime) -> Date {
        Date(instant)
    }

    pub fn instant(&self) -> OffsetDateTime {
        self.0
    }
}

impl From<OffsetDateTime> for Date {
    fn from(instant: OffsetDateTime) -> Date {
        Date(instant)
    }
}

impl Exotic for Date {
    fn to_plain(&self) -> Option<Value> {
        self.0.format(&Rfc3339).ok().map(Value::String)
    }

    fn provides_plain() -> bool {
        true
    }

    fn eq_exotic(&self, other: &dyn Exotic) -> bool {
        let any: &dyn Any = other;
        any.downcast_ref::<Date>() == Some(self)
    }
}

impl FromPlain for Date {
    fn from_plain(plain: Value) -> Result<Date, Error> {
        let text = plain
            .as_str()
            .ok_or_else(|| Error::restore("Date", "expected an RFC 3339 string"))?;
        OffsetDateTime::parse(text, &Rfc3339)
            .map(Date)
            .map_err(|e| Error::restore("Date", e.to_string()))
    }
}

// ── RegExp ──────────────────────────────────────────────────────────

/// A compiled regular expression, transported as its source string.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(source: &str) -> Result<Pattern, Error> {
        Regex::new(source)
            .map(Pattern)
            .map_err(|e| Error::restore("RegExp", e.to_string()))
    }

    pub fn regex(&self) -> &Regex {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<Regex> for Pattern {
    fn from(regex: Regex) -> Pattern {
        Pattern(regex)
    }
}

/// Patterns compare by source text, not by match behavior.
impl PartialEq for Pattern {
    fn eq(&self, other: &Pattern) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Exotic for Pattern {
    fn to_plain(&self) -> Option<Value> {
        Some(Value::String(self.as_str().to_owned()))
    }

    fn provides_plain() -> bool {
        true
    }

    fn eq_exotic(&self, other: &dyn Exotic) -> bool {
        let any: &dyn Any = other;
        any.downcast_ref::<Pattern>() == Some(self)
    }
}

impl FromPlain for Pattern {
    fn from_plain(plain: Value) -> Result<Pattern, Error> {
        let source = plain
            .as_str()
            .ok_or_else(|| Error::restore("RegExp", "expected a pattern string"))?;
        Pattern::new(source)
    }
}

// ── Buffer ──────────────────────────────────────────────────────────

/// An owned binary blob, transported as standard base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob(Vec<u8>);

impl Blob {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Blob {
        Blob(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Blob {
        Blob(bytes)
    }
}

impl Exotic for Blob {
    fn to_plain(&self) -> Option<Value> {
        Some(Value::String(BASE64.encode(&self.0)))
    }

    fn provides_plain() -> bool {
        true
    }

    fn eq_exotic(&self, other: &dyn Exotic) -> bool {
        let any: &dyn Any = other;
        any.downcast_ref::<Blob>() == Some(self)
    }
}

impl FromPlain for Blob {
    fn from_plain(plain: Value) -> Result<Blob, Error> {
        let text = plain
            .as_str()
            .ok_or_else(|| Error::restore("Buffer", "expected a base64 string"))?;
        BASE64
            .decode(text)
            .map(Blob)
            .map_err(|e| Error::restore("Buffer", e.to_string()))
    }
}

// ── Map ─────────────────────────────────────────────────────────────

/// An ordered map with arbitrary value keys, transported as an array of
/// `[key, value]` pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueMap(Vec<(Value, Value)>);

impl ValueMap {
    pub fn new() -> ValueMap {
        ValueMap::default()
    }

    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn pairs(&self) -> &[(Value, Value)] {
        &self.0
    }

    pub fn into_pairs(self) -> Vec<(Value, Value)> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<(Value, Value)>> for ValueMap {
    fn from(pairs: Vec<(Value, Value)>) -> ValueMap {
        ValueMap(pairs)
    }
}

impl Exotic for ValueMap {
    fn to_plain(&self) -> Option<Value> {
        Some(Value::Array(
            self.0
                .iter()
                .map(|(k, v)| Value::Array(vec![k.clone(), v.clone()]))
                .collect(),
        ))
    }

    fn provides_plain() -> bool {
        true
    }

    fn eq_exotic(&self, other: &dyn Exotic) -> bool {
        let any: &dyn Any = other;
        any.downcast_ref::<ValueMap>() == Some(self)
    }
}

impl FromPlain for ValueMap {
    fn from_plain(plain: Value) -> Result<ValueMap, Error> {
        let items = match plain {
            Value::Array(items) => items,
            other => {
                return Err(Error::restore(
                    "Map",
                    format!("expected an array of pairs, got {}", other.type_name()),
                ))
            }
        };
        let mut pairs = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Array(pair) if pair.len() == 2 => {
                    let mut pair = pair.into_iter();
                    let key = pair.next().unwrap_or(Value::Null);
                    let value = pair.next().unwrap_or(Value::Null);
                    pairs.push((key, value));
                }
                other => {
                    return Err(Error::restore(
                        "Map",
                        format!("expected a [key, value] pair, got {}", other.type_name()),
                    ))
                }
            }
        }
        Ok(ValueMap(pairs))
    }
}

// ── Set ─────────────────────────────────────────────────────────────

/// An ordered set, transported as an array of members.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueSet(Vec<Value>);

impl ValueSet {
    pub fn new() -> ValueSet {
        ValueSet::default()
    }

    /// Append a member unless an equal one is already present.
    pub fn add(&mut self, member: impl Into<Value>) {
        let member = member.into();
        if !self.0.contains(&member) {
            self.0.push(member);
        }
    }

    pub fn members(&self) -> &[Value] {
        &self.0
    }

    pub fn into_members(self) -> Vec<Value> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Value>> for ValueSet {
    fn from(members: Vec<Value>) -> ValueSet {
        ValueSet(members)
    }
}

impl Exotic for ValueSet {
    fn to_plain(&self) -> Option<Value> {
        Some(Value::Array(self.0.clone()))
    }

    fn provides_plain() -> bool {
        true
    }

    fn eq_exotic(&self, other: &dyn Exotic) -> bool {
        let any: &dyn Any = other;
        any.downcast_ref::<ValueSet>() == Some(self)
    }
}

impl FromPlain for ValueSet {
    fn from_plain(plain: Value) -> Result<ValueSet, Error> {
        match plain {
            // Rebuild through add so duplicate wire members collapse.
            Value::Array(members) => {
                let mut set = ValueSet::new();
                for member in members {
                    set.add(member);
                }
                Ok(set)
            }
            other => Err(Error::restore(
                "Set",
                format!("expected an array of members, got {}", other.type_name()),
            )),
        }
    }
}
