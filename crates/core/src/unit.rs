//! Validated, normalized runtime form of one conversion rule.
//!
//! Construction runs the layered spec checks (token syntax, namespace
//! syntax, presence of the required conversions) and resolves the
//! dump/restore sums into single callables. Checks short-circuit on the
//! first defect; the defect message ends up in [`Error::InvalidRule`].

use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::spec::{
    is_valid_name, is_valid_namespace, ClassRef, ClassSpec, DumpFn, DumpSpec, EqualSpec, PredFn,
    PredSpec, ProtoRef, ProtoSpec, RestoreFn, RestoreSpec, Spec,
};
use crate::value::{ProtoObject, Value};

/// Which rule variant a converter was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Class,
    Proto,
    Predicate,
    Equality,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RuleKind::Class => "class",
            RuleKind::Proto => "proto",
            RuleKind::Predicate => "predicate",
            RuleKind::Equality => "equality",
        })
    }
}

/// Recognition half of a converter, one variant per rule kind.
#[derive(Clone)]
pub(crate) enum Matcher {
    Class(ClassRef),
    Proto(ProtoRef),
    Pred(PredFn),
    Equal(Value),
}

/// One registered conversion rule in its runtime form.
#[derive(Clone)]
pub struct UnitConverter {
    kind: RuleKind,
    matcher: Matcher,
    token: String,
    namespace: Option<String>,
    path: String,
    dump: DumpFn,
    restore: RestoreFn,
    specificity: usize,
}

impl UnitConverter {
    /// Build a converter from a spec. Existing converters pass through
    /// without re-validation.
    pub fn from_spec(spec: Spec) -> Result<UnitConverter, Error> {
        match spec {
            Spec::Unit(unit) => Ok(unit),
            Spec::Class(s) => Self::from_class(s),
            Spec::Proto(s) => Self::from_proto(s),
            Spec::Pred(s) => Self::from_pred(s),
            Spec::Equal(s) => Self::from_equal(s),
        }
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// `namespace.token`, or the bare token: the uniqueness key within a
    /// composite, and the tag name after the prefix.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Declared chain length for class and proto rules; zero otherwise.
    /// Deeper chains dispatch first, so the most specific rule wins.
    pub fn specificity(&self) -> usize {
        self.specificity
    }

    /// Convert a matched value to its plain form.
    pub fn dump(&self, value: &Value) -> Value {
        (self.dump)(value)
    }

    /// Reconstruct the original value from its restored plain form.
    pub fn restore(&self, plain: Value) -> Result<Value, Error> {
        (self.restore)(plain)
    }

    pub(crate) fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    // ── Per-variant construction ────────────────────────────────────

    fn from_class(spec: ClassSpec) -> Result<UnitConverter, Error> {
        let fail = |reason: String| Error::invalid_rule(RuleKind::Class, reason);

        let token = match spec.token {
            Some(token) if is_valid_name(&token) => token,
            Some(_) if is_valid_name(spec.class.name) => {
                return Err(fail(format!("invalid token for {}", spec.class.name)))
            }
            Some(_) => return Err(fail("invalid token".to_owned())),
            None if is_valid_name(spec.class.name) => spec.class.name.to_owned(),
            None => return Err(fail("missing token and no class name".to_owned())),
        };
        let namespace = validate_namespace(spec.namespace, &token)
            .map_err(|reason| fail(reason))?;

        let dump = match spec.dump {
            DumpSpec::Fn(dump) => dump,
            DumpSpec::Method(name) => method_dump(name),
            DumpSpec::Default if spec.class.has_plain => plain_dump(),
            DumpSpec::Default => {
                return Err(fail(format!("missing dump method for {}", token)));
            }
        };
        let restore = match spec.restore {
            RestoreSpec::Fn(restore) => restore,
            RestoreSpec::Default => match spec.default_restore {
                Some(restore) => restore,
                None => return Err(fail(format!("missing restore method for {}", token))),
            },
        };

        let specificity = spec.class.chain.len();
        Ok(UnitConverter {
            kind: RuleKind::Class,
            matcher: Matcher::Class(spec.class),
            path: join_path(namespace.as_deref(), &token),
            token,
            namespace,
            dump,
            restore,
            specificity,
        })
    }

    fn from_proto(spec: ProtoSpec) -> Result<UnitConverter, Error> {
        let fail = |reason: String| Error::invalid_rule(RuleKind::Proto, reason);

        if !is_valid_name(&spec.token) {
            return Err(fail("invalid token".to_owned()));
        }
        let token = spec.token;
        let namespace = validate_namespace(spec.namespace, &token)
            .map_err(|reason| fail(reason))?;

        let dump = match spec.dump {
            DumpSpec::Fn(dump) => dump,
            DumpSpec::Method(name) => method_dump(name),
            DumpSpec::Default => proto_default_dump(),
        };
        let restore = match spec.restore {
            RestoreSpec::Fn(restore) => restore,
            RestoreSpec::Default => proto_default_restore(&spec.proto, &token),
        };

        let specificity = spec.proto.chain.len();
        Ok(UnitConverter {
            kind: RuleKind::Proto,
            matcher: Matcher::Proto(spec.proto),
            path: join_path(namespace.as_deref(), &token),
            token,
            namespace,
            dump,
            restore,
            specificity,
        })
    }

    fn from_pred(spec: PredSpec) -> Result<UnitConverter, Error> {
        let fail = |reason: String| Error::invalid_rule(RuleKind::Predicate, reason);

        if !is_valid_name(&spec.token) {
            return Err(fail("invalid token".to_owned()));
        }
        let token = spec.token;
        let namespace = validate_namespace(spec.namespace, &token)
            .map_err(|reason| fail(reason))?;

        Ok(UnitConverter {
            kind: RuleKind::Predicate,
            matcher: Matcher::Pred(spec.pred),
            path: join_path(namespace.as_deref(), &token),
            token,
            namespace,
            dump: spec.dump,
            restore: spec.restore,
            specificity: 0,
        })
    }

    fn from_equal(spec: EqualSpec) -> Result<UnitConverter, Error> {
        let fail = |reason: String| Error::invalid_rule(RuleKind::Equality, reason);

        if !is_valid_name(&spec.token) {
            return Err(fail("invalid token".to_owned()));
        }
        let token = spec.token;
        let namespace = validate_namespace(spec.namespace, &token)
            .map_err(|reason| fail(reason))?;

        Ok(UnitConverter {
            kind: RuleKind::Equality,
            matcher: Matcher::Equal(spec.value),
            path: join_path(namespace.as_deref(), &token),
            token,
            namespace,
            dump: spec.dump,
            restore: spec.restore,
            specificity: 0,
        })
    }
}

impl fmt::Debug for UnitConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitConverter")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("specificity", &self.specificity)
            .finish_non_exhaustive()
    }
}

fn join_path(namespace: Option<&str>, token: &str) -> String {
    match namespace {
        Some(ns) => format!("{}.{}", ns, token),
        None => token.to_owned(),
    }
}

fn validate_namespace(
    namespace: Option<String>,
    token: &str,
) -> Result<Option<String>, String> {
    match namespace {
        None => Ok(None),
        Some(ns) if is_valid_namespace(&ns) => Ok(Some(ns)),
        Some(_) => Err(format!("invalid namespace for {}", token)),
    }
}

/// Default class dump: the value's own plain form.
fn plain_dump() -> DumpFn {
    Arc::new(|value| match value.as_foreign() {
        Some(foreign) => foreign.to_plain().unwrap_or(Value::Null),
        None => value.clone(),
    })
}

/// Dump through a named zero-argument method.
fn method_dump(name: String) -> DumpFn {
    Arc::new(move |value| {
        value
            .as_foreign()
            .and_then(|foreign| foreign.invoke(&name))
            .unwrap_or(Value::Null)
    })
}

/// Default proto dump: copy the property bag into a plain object. Other
/// foreign values matched through the marker fall back to their own plain
/// form.
fn proto_default_dump() -> DumpFn {
    Arc::new(|value| match value.as_foreign() {
        Some(foreign) => match foreign.downcast_ref::<ProtoObject>() {
            Some(bag) => Value::Object(bag.props().clone()),
            None => foreign.to_plain().unwrap_or(Value::Null),
        },
        None => value.clone(),
    })
}

/// Default proto restore: rebuild a property bag carrying the rule's
/// marker chain.
fn proto_default_restore(proto: &ProtoRef, token: &str) -> RestoreFn {
    let chain = proto.chain.clone();
    let token = token.to_owned();
    Arc::new(move |plain| match plain {
        Value::Object(props) => Ok(ProtoObject::from_chain(chain.clone(), props).into_value()),
        other => Err(Error::restore(
            token.clone(),
            format!("expected object payload, got {}", other.type_name()),
        )),
    })
}
