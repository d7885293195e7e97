//! Construction and validation of composites.

mod common;

use common::{bar_spec, foo_spec, Bar, Base, Derived, Foo, Leaf};
use tagson_core::{
    ClassSpec, CompositeConv, Error, Exotic, Options, PredSpec, ProtoSpec, RuleKind, Spec,
    UnitConverter, Value,
};

#[test]
fn builds_from_mixed_specs() {
    let conv = CompositeConv::new(vec![
        Spec::from(bar_spec()),
        PredSpec::new(
            "IsFoo",
            |v| v.downcast_ref::<Foo>().is_some(),
            |_| Value::Null,
            |_| Ok(Value::wrap(Foo)),
        )
        .into(),
    ])
    .unwrap();
    assert_eq!(conv.converters().len(), 2);
    assert_eq!(conv.converters()[0].kind(), RuleKind::Class);
    assert_eq!(conv.converters()[1].kind(), RuleKind::Predicate);
}

#[test]
fn existing_converters_pass_through() {
    let unit = UnitConverter::from_spec(bar_spec().into()).unwrap();
    let conv = CompositeConv::new(Spec::Unit(unit)).unwrap();
    assert_eq!(conv.converters().len(), 1);
    assert_eq!(conv.converters()[0].token(), "Bar");
}

#[test]
fn invalid_spec_fails_construction() {
    let err = CompositeConv::new(
        PredSpec::new("not valid", |_| true, |v| v.clone(), Ok),
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "failed to create predicate converter: invalid token"
    );
}

#[test]
fn duplicate_token_fails() {
    let err = CompositeConv::new(vec![
        Spec::from(foo_spec().token("Foo")),
        Spec::from(bar_spec().token("Foo")),
    ])
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "inconsistent converters: 2 converters for token Foo"
    );
}

#[test]
fn duplicate_class_fails() {
    let err = CompositeConv::new(vec![
        Spec::from(foo_spec().token("Foo")),
        Spec::from(foo_spec().token("AlsoFoo")),
    ])
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "inconsistent converters: 2 converters for class Foo"
    );
}

#[test]
fn duplicate_proto_fails() {
    #[derive(Debug)]
    struct Marker;
    impl Exotic for Marker {}

    let err = CompositeConv::new(vec![
        Spec::from(ProtoSpec::new::<Marker>("Foo")),
        Spec::from(ProtoSpec::new::<Marker>("Bar")),
    ])
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "inconsistent converters: 2 converters for proto Foo"
    );
}

#[test]
fn same_token_in_different_namespaces_is_consistent() {
    let conv = CompositeConv::new(vec![
        Spec::from(foo_spec().token("Thing").namespace("one")),
        Spec::from(bar_spec().token("Thing").namespace("two")),
    ])
    .unwrap();
    assert_eq!(conv.converters()[0].path(), "one.Thing");
    assert_eq!(conv.converters()[1].path(), "two.Thing");
}

#[test]
fn class_bucket_is_sorted_most_specific_first() {
    // Registered shallow-first; the bucket must come out deepest-first.
    let conv = CompositeConv::new(vec![
        Spec::from(ClassSpec::new::<Base>()),
        Spec::from(ClassSpec::new::<Leaf>()),
        Spec::from(ClassSpec::new::<Derived>()),
    ])
    .unwrap();
    let tokens: Vec<_> = conv
        .class_converters()
        .iter()
        .map(|u| u.token())
        .collect();
    assert_eq!(tokens, ["Leaf", "Derived", "Base"]);
    // The master list keeps registration order.
    let registered: Vec<_> = conv.converters().iter().map(|u| u.token()).collect();
    assert_eq!(registered, ["Base", "Leaf", "Derived"]);
}

#[test]
fn empty_prefix_is_invalid_config() {
    let err = CompositeConv::new_with_options(
        Vec::<Spec>::new(),
        Options {
            prefix: String::new(),
            ..Options::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn construction_failure_is_atomic() {
    // One bad spec poisons the whole construction; nothing half-built
    // leaks out because nothing is returned at all.
    let result = CompositeConv::new(vec![
        Spec::from(bar_spec()),
        Spec::from(ClassSpec::of::<Bar>().token("Other")),
    ]);
    assert!(result.is_err());
}
