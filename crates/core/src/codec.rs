//! The text boundary: a minimal codec seam plus the default JSON binding.
//!
//! The engine only ever needs two operations from its codec — value to
//! text and text to value — so the seam is exactly that. The default
//! implementation binds serde_json through manual `Serialize` and
//! `Deserialize` impls on [`Value`].
//!
//! A [`Value::Foreign`] or a non-finite number surviving all the way to
//! serialization is reported here, not at dump time: unrecognized values
//! pass through the dump opaquely by design.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;
use crate::value::Value;

/// Two-method text codec seam. Implementations must not interpret tags;
/// they translate between plain trees and text only.
pub trait TextCodec: Send + Sync {
    /// Encode a plain tree as text. `indent` is a formatting hint codecs
    /// may honor or ignore.
    fn serialize(&self, value: &Value, indent: Option<usize>) -> Result<String, Error>;

    /// Decode text into a plain tree.
    fn parse(&self, text: &str) -> Result<Value, Error>;
}

/// The default codec: serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl TextCodec for JsonCodec {
    fn serialize(&self, value: &Value, indent: Option<usize>) -> Result<String, Error> {
        match indent {
            None => serde_json::to_string(value).map_err(Error::from),
            Some(width) => {
                let indent = " ".repeat(width);
                let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
                let mut buf = Vec::new();
                let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
                value.serialize(&mut ser).map_err(Error::from)?;
                String::from_utf8(buf).map_err(|e| Error::Codec(e.to_string()))
            }
        }
    }

    fn parse(&self, text: &str) -> Result<Value, Error> {
        serde_json::from_str(text).map_err(Error::from)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error as _;
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.is_finite() => {
                // Keep integral numbers integral on the wire.
                if n.fract() == 0.0 && n.abs() < (i64::MAX as f64) {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::Number(_) => Err(S::Error::custom(
                "non-finite number is not representable as JSON",
            )),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, item) in map {
                    out.serialize_entry(key, item)?;
                }
                out.end()
            }
            Value::Foreign(f) => Err(S::Error::custom(format!(
                "value of type {} is not representable as JSON",
                f.name()
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("any JSON value")
            }

            fn visit_unit<E>(self) -> Result<Value, E> {
                Ok(Value::Null)
            }

            fn visit_none<E>(self) -> Result<Value, E> {
                Ok(Value::Null)
            }

            fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Value, D::Error> {
                d.deserialize_any(ValueVisitor)
            }

            fn visit_bool<E>(self, b: bool) -> Result<Value, E> {
                Ok(Value::Bool(b))
            }

            fn visit_i64<E>(self, n: i64) -> Result<Value, E> {
                Ok(Value::Number(n as f64))
            }

            fn visit_u64<E>(self, n: u64) -> Result<Value, E> {
                Ok(Value::Number(n as f64))
            }

            fn visit_f64<E>(self, n: f64) -> Result<Value, E> {
                Ok(Value::Number(n))
            }

            fn visit_str<E>(self, s: &str) -> Result<Value, E> {
                Ok(Value::String(s.to_owned()))
            }

            fn visit_string<E>(self, s: String) -> Result<Value, E> {
                Ok(Value::String(s))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element()? {
                    items.push(item);
                }
                Ok(Value::Array(items))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
                let mut map = BTreeMap::new();
                while let Some((key, item)) = access.next_entry::<String, Value>()? {
                    map.insert(key, item);
                }
                Ok(Value::Object(map))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Exotic, Map};

    #[test]
    fn round_trips_plain_shapes() {
        let codec = JsonCodec;
        let value = Value::object([
            ("a", Value::array([1i64, 2, 3])),
            ("b", Value::String("x".to_owned())),
            ("c", Value::Null),
            ("d", Value::Bool(true)),
        ]);
        let text = codec.serialize(&value, None).unwrap();
        assert_eq!(text, r#"{"a":[1,2,3],"b":"x","c":null,"d":true}"#);
        assert_eq!(codec.parse(&text).unwrap(), value);
    }

    #[test]
    fn integral_numbers_stay_integral() {
        let codec = JsonCodec;
        assert_eq!(codec.serialize(&Value::Number(1.0), None).unwrap(), "1");
        assert_eq!(codec.serialize(&Value::Number(1.5), None).unwrap(), "1.5");
    }

    #[test]
    fn indented_output() {
        let codec = JsonCodec;
        let value = Value::object([("a", Value::Number(1.0))]);
        let text = codec.serialize(&value, Some(4)).unwrap();
        assert_eq!(text, "{\n    \"a\": 1\n}");
    }

    #[test]
    fn foreign_leaf_is_a_codec_error() {
        #[derive(Debug)]
        struct Opaque;
        impl Exotic for Opaque {}

        let codec = JsonCodec;
        let err = codec.serialize(&Value::wrap(Opaque), None).unwrap_err();
        assert!(err.to_string().contains("Opaque"));
    }

    #[test]
    fn non_finite_number_is_a_codec_error() {
        let codec = JsonCodec;
        assert!(codec.serialize(&Value::Number(f64::INFINITY), None).is_err());
    }

    #[test]
    fn parse_rejects_malformed_text() {
        let codec = JsonCodec;
        assert!(matches!(codec.parse("{oops"), Err(Error::Codec(_))));
    }

    #[test]
    fn parse_builds_ordered_maps() {
        let codec = JsonCodec;
        let value = codec.parse(r#"{"z":1,"a":2}"#).unwrap();
        let map: &Map = value.as_object().unwrap();
        let keys: Vec<_> = map.keys().collect();
        assert_eq!(keys, ["a", "z"]);
    }
}
