// iocsweep - core/lenient.rs
//
// Lenient conversion of module records into JSON values.
//
// `serde_json::to_value` rejects a whole value when any part of it cannot be
// represented, e.g. a map keyed by tuples or a `Serialize` impl that errors.
// The serializer here keeps every representable part and replaces only the
// offending piece with its string form: non-string map keys become their
// JSON text, and a nested value that fails becomes its error message.
// Leaves are delegated to `serde_json::value::Serializer` so representable
// values come out exactly as `to_value` would produce them.

use serde::ser::{self, Serialize};
use serde_json::value::Serializer as ValueSerializer;
use serde_json::{Map, Value};

type Error = serde_json::Error;

/// Convert `value` to JSON, coercing unrepresentable parts to strings.
///
/// Fails only when `value`'s own `Serialize` impl fails at the top level.
pub fn to_value<T: ?Sized + Serialize>(value: &T) -> Result<Value, Error> {
    value.serialize(Lenient)
}

/// Convert a nested value; a failure is replaced by its message.
fn nested<T: ?Sized + Serialize>(value: &T) -> Value {
    match value.serialize(Lenient) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "Coercing unserialisable field to string");
            Value::String(e.to_string())
        }
    }
}

/// Object key for a map entry: strings as-is, anything else as JSON text.
fn key_string<T: ?Sized + Serialize>(key: &T) -> String {
    match nested(key) {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn single_entry(name: &'static str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(name.to_owned(), value);
    Value::Object(map)
}

// =============================================================================
// Serializer
// =============================================================================

#[derive(Clone, Copy)]
struct Lenient;

macro_rules! delegate_leaf {
    ($($method:ident($ty:ty)),* $(,)?) => {
        $(
            fn $method(self, v: $ty) -> Result<Value, Error> {
                ValueSerializer.$method(v)
            }
        )*
    };
}

impl ser::Serializer for Lenient {
    type Ok = Value;
    type Error = Error;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = TupleVariantBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = StructVariantBuilder;

    delegate_leaf!(
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_i128(i128),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_u128(u128),
        serialize_f32(f32),
        serialize_f64(f64),
        serialize_char(char),
        serialize_str(&str),
        serialize_bytes(&[u8]),
    );

    fn serialize_none(self) -> Result<Value, Error> {
        Ok(Value::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value, Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, Error> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, Error> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Value, Error> {
        Ok(Value::String(variant.to_owned()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, Error> {
        Ok(single_entry(variant, nested(value)))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, Error> {
        Ok(SeqBuilder {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<TupleVariantBuilder, Error> {
        Ok(TupleVariantBuilder {
            variant,
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapBuilder, Error> {
        Ok(MapBuilder {
            map: Map::new(),
            next_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<MapBuilder, Error> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<StructVariantBuilder, Error> {
        Ok(StructVariantBuilder {
            variant,
            map: Map::new(),
        })
    }
}

// =============================================================================
// Compound builders
// =============================================================================

struct SeqBuilder {
    items: Vec<Value>,
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        self.items.push(nested(value));
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, Error> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, Error> {
        ser::SerializeSeq::end(self)
    }
}

struct TupleVariantBuilder {
    variant: &'static str,
    items: Vec<Value>,
}

impl ser::SerializeTupleVariant for TupleVariantBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        self.items.push(nested(value));
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(single_entry(self.variant, Value::Array(self.items)))
    }
}

struct MapBuilder {
    map: Map<String, Value>,
    next_key: Option<String>,
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Error> {
        self.next_key = Some(key_string(key));
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        let key = self.next_key.take().unwrap_or_default();
        self.map.insert(key, nested(value));
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(Value::Object(self.map))
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        self.map.insert(key.to_owned(), nested(value));
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(Value::Object(self.map))
    }
}

struct StructVariantBuilder {
    variant: &'static str,
    map: Map<String, Value>,
}

impl ser::SerializeStructVariant for StructVariantBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        self.map.insert(key.to_owned(), nested(value));
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(single_entry(self.variant, Value::Object(self.map)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serializer;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(Debug)]
    struct Refuses;

    impl Serialize for Refuses {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(ser::Error::custom("opaque handle"))
        }
    }

    #[derive(serde::Serialize)]
    enum Event {
        Boot,
        Login { user: String, uid: u32 },
        Pair(u8, u8),
    }

    #[test]
    fn test_representable_values_match_serde_json() {
        let value = json!({"a": [1, 2.5, null], "b": {"c": "d"}, "e": true});
        assert_eq!(to_value(&value).unwrap(), value);

        let events = vec![
            Event::Boot,
            Event::Login {
                user: "root".into(),
                uid: 0,
            },
            Event::Pair(1, 2),
        ];
        assert_eq!(
            to_value(&events).unwrap(),
            serde_json::to_value(&events).unwrap()
        );
    }

    #[test]
    fn test_non_string_keys_become_json_text() {
        let mut map = BTreeMap::new();
        map.insert((1u8, 2u8), "x");
        map.insert((3u8, 4u8), "y");
        let value = to_value(&map).unwrap();
        assert_eq!(value, json!({"[1,2]": "x", "[3,4]": "y"}));
    }

    #[test]
    fn test_failing_leaf_is_replaced_in_place() {
        let value = to_value(&vec![json!(1), json!(2)]).unwrap();
        assert_eq!(value, json!([1, 2]));

        let mut map = BTreeMap::new();
        map.insert("ok", None);
        map.insert("bad", Some(Refuses));
        let value = to_value(&map).unwrap();
        assert_eq!(value["ok"], Value::Null);
        assert_eq!(value["bad"], "opaque handle");
    }

    #[test]
    fn test_top_level_failure_is_reported() {
        assert!(to_value(&Refuses).is_err());
    }
}
