//! tagson-core: a composite conversion engine for round-tripping rich
//! values through plain JSON.
//!
//! Plain JSON cannot carry dates, regular expressions, binary blobs or
//! user-defined types. This crate augments it by tagging such values on
//! the way out and recognizing the tags on the way back: a registry of
//! per-type conversion rules is combined into one dispatcher
//! ([`CompositeConv`]) that recursively walks arbitrary nested data,
//! replaces recognized values with single-key wrapper objects
//! (`{"$Date": "2024-01-01T00:00:00Z"}`) during [`CompositeConv::dump`],
//! and reverses the process during [`CompositeConv::restore`].
//!
//! Rules come in four variants — by type ([`ClassSpec`]), by structural
//! marker ([`ProtoSpec`]), by predicate ([`PredSpec`]) and by sentinel
//! ([`EqualSpec`]) — and rule sets compose: [`CompositeConv::extend_with`]
//! merges with full validation, [`CompositeConv::override_by`] lets later
//! rules evict colliding earlier ones, [`CompositeConv::exclude`] removes
//! rules by selector.
//!
//! ```
//! use tagson_core::{ClassSpec, CompositeConv, Error, Value};
//!
//! #[derive(Debug)]
//! struct Celsius(f64);
//! impl tagson_core::Exotic for Celsius {}
//!
//! # fn main() -> Result<(), Error> {
//! let conv = CompositeConv::new(ClassSpec::with::<Celsius, _, _, _>(
//!     |c| c.0,
//!     |plain| match plain.as_f64() {
//!         Some(n) => Ok(Celsius(n)),
//!         None => Err(Error::restore("Celsius", "expected a number")),
//!     },
//! ))?;
//!
//! let text = conv.serialize(&Value::wrap(Celsius(21.5)))?;
//! assert_eq!(text, r#"{"$Celsius":21.5}"#);
//! let back = conv.parse(&text)?;
//! assert_eq!(back.downcast_ref::<Celsius>().unwrap().0, 21.5);
//! # Ok(())
//! # }
//! ```
//!
//! Cyclic input is not detected: dumping a cyclic graph recurses until
//! the stack overflows. Acyclic input is the caller's contract.

pub mod codec;
pub mod composite;
pub mod error;
pub mod spec;
pub mod unit;
pub mod value;

pub use codec::{JsonCodec, TextCodec};
pub use composite::{CompositeConv, Exclude, Options, OptionsPatch, SpecList};
pub use error::Error;
pub use spec::{
    ClassRef, ClassSpec, DumpFn, DumpSpec, EqualSpec, PredFn, PredSpec, ProtoRef, ProtoSpec,
    RestoreFn, RestoreSpec, Spec,
};
pub use unit::{RuleKind, UnitConverter};
pub use value::{Exotic, Foreign, FromPlain, Map, ProtoObject, Value};
