//! Shared fixture types for the integration tests.
#![allow(dead_code)]

use std::any::{Any, TypeId};

use tagson_core::{ClassSpec, Error, Exotic, FromPlain, Value};

/// A type with no plain form of its own; rules must dump it explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct Foo;

impl Exotic for Foo {
    fn eq_exotic(&self, other: &dyn Exotic) -> bool {
        let any: &dyn Any = other;
        any.downcast_ref::<Foo>() == Some(self)
    }
}

pub fn foo_spec() -> ClassSpec {
    ClassSpec::with::<Foo, _, _, _>(|_| Value::Null, |_| Ok(Foo))
}

/// A type with a canonical plain form (always 42) and a named dump
/// method (`bar`, yielding 24).
#[derive(Debug, Clone, PartialEq)]
pub struct Bar;

impl Exotic for Bar {
    fn to_plain(&self) -> Option<Value> {
        Some(Value::Number(42.0))
    }

    fn provides_plain() -> bool {
        true
    }

    fn invoke(&self, method: &str) -> Option<Value> {
        (method == "bar").then(|| Value::Number(24.0))
    }

    fn eq_exotic(&self, other: &dyn Exotic) -> bool {
        let any: &dyn Any = other;
        any.downcast_ref::<Bar>() == Some(self)
    }
}

impl FromPlain for Bar {
    fn from_plain(_: Value) -> Result<Bar, Error> {
        Ok(Bar)
    }
}

pub fn bar_spec() -> ClassSpec {
    ClassSpec::new::<Bar>()
}

/// Two-level pseudo-inheritance: `Derived` declares `Base` as ancestor.
#[derive(Debug, Clone, PartialEq)]
pub struct Base(pub i64);

impl Exotic for Base {
    fn to_plain(&self) -> Option<Value> {
        Some(Value::Number(self.0 as f64))
    }

    fn provides_plain() -> bool {
        true
    }

    fn eq_exotic(&self, other: &dyn Exotic) -> bool {
        let any: &dyn Any = other;
        any.downcast_ref::<Base>() == Some(self)
    }
}

impl FromPlain for Base {
    fn from_plain(plain: Value) -> Result<Base, Error> {
        match plain.as_f64() {
            Some(n) => Ok(Base(n as i64)),
            None => Err(Error::restore("Base", "expected a number")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Derived(pub i64);

impl Exotic for Derived {
    fn ancestry() -> Vec<TypeId> {
        vec![TypeId::of::<Derived>(), TypeId::of::<Base>()]
    }

    fn to_plain(&self) -> Option<Value> {
        Some(Value::Number(self.0 as f64))
    }

    fn provides_plain() -> bool {
        true
    }

    fn eq_exotic(&self, other: &dyn Exotic) -> bool {
        let any: &dyn Any = other;
        any.downcast_ref::<Derived>() == Some(self)
    }
}

impl FromPlain for Derived {
    fn from_plain(plain: Value) -> Result<Derived, Error> {
        match plain.as_f64() {
            Some(n) => Ok(Derived(n as i64)),
            None => Err(Error::restore("Derived", "expected a number")),
        }
    }
}

/// Three-level chain end for bucket-sorting tests.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf(pub i64);

impl Exotic for Leaf {
    fn ancestry() -> Vec<TypeId> {
        vec![
            TypeId::of::<Leaf>(),
            TypeId::of::<Derived>(),
            TypeId::of::<Base>(),
        ]
    }

    fn to_plain(&self) -> Option<Value> {
        Some(Value::Number(self.0 as f64))
    }

    fn provides_plain() -> bool {
        true
    }

    fn eq_exotic(&self, other: &dyn Exotic) -> bool {
        let any: &dyn Any = other;
        any.downcast_ref::<Leaf>() == Some(self)
    }
}

impl FromPlain for Leaf {
    fn from_plain(plain: Value) -> Result<Leaf, Error> {
        match plain.as_f64() {
            Some(n) => Ok(Leaf(n as i64)),
            None => Err(Error::restore("Leaf", "expected a number")),
        }
    }
}

/// A recursive container: its dump output holds more foreign values, so
/// the engine has to keep recursing through rule output.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub val: Value,
    pub children: Vec<Tree>,
}

impl Tree {
    pub fn new(val: impl Into<Value>, children: Vec<Tree>) -> Tree {
        Tree {
            val: val.into(),
            children,
        }
    }
}

impl Exotic for Tree {
    fn eq_exotic(&self, other: &dyn Exotic) -> bool {
        let any: &dyn Any = other;
        any.downcast_ref::<Tree>() == Some(self)
    }
}

pub fn tree_spec() -> ClassSpec {
    ClassSpec::with::<Tree, _, _, _>(
        |tree| {
            Value::object([
                ("val", tree.val.clone()),
                (
                    "children",
                    Value::Array(
                        tree.children
                            .iter()
                            .map(|child| Value::wrap(child.clone()))
                            .collect(),
                    ),
                ),
            ])
        },
        |plain| {
            let map = plain
                .as_object()
                .ok_or_else(|| Error::restore("Tree", "expected an object"))?;
            let val = map.get("val").cloned().unwrap_or(Value::Null);
            let children = map
                .get("children")
                .and_then(Value::as_array)
                .unwrap_or(&[])
                .iter()
                .map(|child| {
                    child
                        .downcast_ref::<Tree>()
                        .cloned()
                        .ok_or_else(|| Error::restore("Tree", "expected a tree child"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Tree { val, children })
        },
    )
}
