//! Hand-bridged Thrift↔JSON codec. The `thrift` crate ships no JSON protocol, so this module
//! implements `TInputProtocol`/`TOutputProtocol` adapters over a `serde_json::Value` tree instead
//! of a byte transport: JSON encode drives a concrete `TSerializable`'s own
//! `write_to_out_protocol` through the adapter, and JSON decode feeds a parsed `Value` back
//! through `read_from_in_protocol`. Struct fields are keyed by Thrift field id (not name), mirroring
//! the encoding Apache Thrift's own `TJSONProtocol` uses, since on read a struct only has its field
//! id to dispatch on — the field name is optional on the wire and not reliably available.

use std::collections::VecDeque;

use base64::Engine;
use serde_json::{Map, Value};
use thrift::protocol::{
    TFieldIdentifier, TInputProtocol, TListIdentifier, TMapIdentifier, TMessageIdentifier,
    TOutputProtocol, TSerializable, TSetIdentifier, TStructIdentifier, TType,
};
use thrift::{Error as TError, ProtocolError, ProtocolErrorKind};

use crate::{Error, Result};

fn proto_err(message: impl Into<String>) -> TError {
    TError::Protocol(ProtocolError {
        kind: ProtocolErrorKind::InvalidData,
        message: message.into(),
    })
}

fn type_tag(t: TType) -> &'static str {
    match t {
        TType::Stop => "stop",
        TType::Void => "void",
        TType::Bool => "tf",
        TType::I08 => "i8",
        TType::Double => "dbl",
        TType::I16 => "i16",
        TType::I32 => "i32",
        TType::I64 => "i64",
        TType::String => "str",
        TType::Struct => "rec",
        TType::Map => "map",
        TType::Set => "set",
        TType::List => "lst",
        TType::Utf7 => "str",
        TType::Utf8 => "str",
        TType::Utf16 => "str",
    }
}

fn tag_type(tag: &str) -> std::result::Result<TType, TError> {
    Ok(match tag {
        "stop" => TType::Stop,
        "void" => TType::Void,
        "tf" => TType::Bool,
        "i8" => TType::I08,
        "dbl" => TType::Double,
        "i16" => TType::I16,
        "i32" => TType::I32,
        "i64" => TType::I64,
        "str" => TType::String,
        "rec" => TType::Struct,
        "map" => TType::Map,
        "set" => TType::Set,
        "lst" => TType::List,
        other => return Err(proto_err(format!("unknown JSON type tag {other:?}"))),
    })
}

// ---------------------------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------------------------

enum WFrame {
    Struct {
        map: Map<String, Value>,
        pending_field: Option<(i16, TType)>,
    },
    List {
        items: Vec<Value>,
        elem_type: TType,
    },
    Map {
        entries: Vec<Value>,
        key_type: TType,
        value_type: TType,
        pending_key: Option<Value>,
    },
}

/// Builds a `serde_json::Value` tree by recording a `TSerializable`'s own write calls.
pub struct ThriftJsonWriter {
    stack: Vec<WFrame>,
    root: Option<Value>,
}

impl ThriftJsonWriter {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            root: None,
        }
    }

    pub fn finish(mut self) -> std::result::Result<Value, TError> {
        if !self.stack.is_empty() {
            return Err(proto_err("unterminated struct/list/map at end of write"));
        }
        self.root
            .take()
            .ok_or_else(|| proto_err("no value written"))
    }

    fn emit(&mut self, v: Value) -> std::result::Result<(), TError> {
        match self.stack.last_mut() {
            Some(WFrame::Struct { map, pending_field }) => {
                let (id, ty) = pending_field
                    .take()
                    .ok_or_else(|| proto_err("value written outside a field"))?;
                map.insert(id.to_string(), serde_json::json!({"t": type_tag(ty), "v": v}));
            }
            Some(WFrame::List { items, .. }) => items.push(v),
            Some(WFrame::Map {
                entries,
                pending_key,
                ..
            }) => {
                if let Some(k) = pending_key.take() {
                    entries.push(Value::Array(vec![k, v]));
                } else {
                    *pending_key = Some(v);
                }
            }
            None => self.root = Some(v),
        }
        Ok(())
    }
}

impl Default for ThriftJsonWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TOutputProtocol for ThriftJsonWriter {
    fn write_message_begin(&mut self, _identifier: &TMessageIdentifier) -> thrift::Result<()> {
        Err(proto_err("ThriftJsonWriter bridges payload structs, not messages"))
    }

    fn write_message_end(&mut self) -> thrift::Result<()> {
        Ok(())
    }

    fn write_struct_begin(&mut self, _identifier: &TStructIdentifier) -> thrift::Result<()> {
        self.stack.push(WFrame::Struct {
            map: Map::new(),
            pending_field: None,
        });
        Ok(())
    }

    fn write_struct_end(&mut self) -> thrift::Result<()> {
        match self.stack.pop() {
            Some(WFrame::Struct { map, .. }) => {
                self.emit(serde_json::json!({"t": "rec", "v": Value::Object(map)}))
            }
            _ => Err(proto_err("write_struct_end without matching struct_begin")),
        }
    }

    fn write_field_begin(&mut self, identifier: &TFieldIdentifier) -> thrift::Result<()> {
        let id = identifier
            .id
            .ok_or_else(|| proto_err("field written without an id"))?;
        match self.stack.last_mut() {
            Some(WFrame::Struct { pending_field, .. }) => {
                *pending_field = Some((id, identifier.field_type));
                Ok(())
            }
            _ => Err(proto_err("write_field_begin outside a struct")),
        }
    }

    fn write_field_end(&mut self) -> thrift::Result<()> {
        Ok(())
    }

    fn write_field_stop(&mut self) -> thrift::Result<()> {
        Ok(())
    }

    fn write_bool(&mut self, b: bool) -> thrift::Result<()> {
        self.emit(Value::from(b))
    }

    fn write_bytes(&mut self, b: &[u8]) -> thrift::Result<()> {
        self.emit(Value::from(base64::engine::general_purpose::STANDARD.encode(b)))
    }

    fn write_i8(&mut self, i: i8) -> thrift::Result<()> {
        self.emit(Value::from(i))
    }

    fn write_i16(&mut self, i: i16) -> thrift::Result<()> {
        self.emit(Value::from(i))
    }

    fn write_i32(&mut self, i: i32) -> thrift::Result<()> {
        self.emit(Value::from(i))
    }

    fn write_i64(&mut self, i: i64) -> thrift::Result<()> {
        self.emit(Value::from(i))
    }

    fn write_double(&mut self, d: f64) -> thrift::Result<()> {
        self.emit(serde_json::Number::from_f64(d).map(Value::Number).unwrap_or(Value::Null))
    }

    fn write_string(&mut self, s: &str) -> thrift::Result<()> {
        self.emit(Value::from(s))
    }

    fn write_list_begin(&mut self, identifier: &TListIdentifier) -> thrift::Result<()> {
        self.stack.push(WFrame::List {
            items: Vec::new(),
            elem_type: identifier.element_type,
        });
        Ok(())
    }

    fn write_list_end(&mut self) -> thrift::Result<()> {
        match self.stack.pop() {
            Some(WFrame::List { items, elem_type }) => self.emit(
                serde_json::json!({"t": "lst", "et": type_tag(elem_type), "v": items}),
            ),
            _ => Err(proto_err("write_list_end without matching list_begin")),
        }
    }

    fn write_set_begin(&mut self, identifier: &TSetIdentifier) -> thrift::Result<()> {
        self.stack.push(WFrame::List {
            items: Vec::new(),
            elem_type: identifier.element_type,
        });
        Ok(())
    }

    fn write_set_end(&mut self) -> thrift::Result<()> {
        match self.stack.pop() {
            Some(WFrame::List { items, elem_type }) => {
                self.emit(serde_json::json!({"t": "set", "et": type_tag(elem_type), "v": items}))
            }
            _ => Err(proto_err("write_set_end without matching set_begin")),
        }
    }

    fn write_map_begin(&mut self, identifier: &TMapIdentifier) -> thrift::Result<()> {
        self.stack.push(WFrame::Map {
            entries: Vec::new(),
            key_type: identifier.key_type.unwrap_or(TType::Void),
            value_type: identifier.value_type.unwrap_or(TType::Void),
            pending_key: None,
        });
        Ok(())
    }

    fn write_map_end(&mut self) -> thrift::Result<()> {
        match self.stack.pop() {
            Some(WFrame::Map {
                entries,
                key_type,
                value_type,
                pending_key: None,
            }) => self.emit(serde_json::json!({
                "t": "map", "kt": type_tag(key_type), "vt": type_tag(value_type), "v": entries
            })),
            Some(WFrame::Map { .. }) => Err(proto_err("map ended with a dangling key")),
            _ => Err(proto_err("write_map_end without matching map_begin")),
        }
    }

    fn flush(&mut self) -> thrift::Result<()> {
        Ok(())
    }

    fn write_byte(&mut self, _b: u8) -> thrift::Result<()> {
        Err(proto_err("write_byte is not used by generated code"))
    }
}

// ---------------------------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------------------------

enum RFrame {
    Struct {
        fields: VecDeque<(i16, TType, Value)>,
        pending: Option<(TType, Value)>,
    },
    List {
        items: VecDeque<Value>,
    },
    Map {
        entries: VecDeque<(Value, Value)>,
        pending_value: Option<Value>,
    },
}

/// Replays a previously-built `serde_json::Value` tree through a `TSerializable`'s own read calls.
pub struct ThriftJsonReader {
    stack: Vec<RFrame>,
    root: Option<Value>,
}

impl ThriftJsonReader {
    pub fn new(value: Value) -> Self {
        Self {
            stack: Vec::new(),
            root: Some(value),
        }
    }

    fn take_next(&mut self) -> std::result::Result<Value, TError> {
        match self.stack.last_mut() {
            Some(RFrame::Struct { pending, .. }) => pending
                .take()
                .map(|(_, v)| v)
                .ok_or_else(|| proto_err("read past end of struct field")),
            Some(RFrame::List { items }) => {
                items.pop_front().ok_or_else(|| proto_err("read past end of list"))
            }
            Some(RFrame::Map {
                entries,
                pending_value,
            }) => {
                if let Some(v) = pending_value.take() {
                    Ok(v)
                } else {
                    let (k, v) = entries
                        .pop_front()
                        .ok_or_else(|| proto_err("read past end of map"))?;
                    *pending_value = Some(v);
                    Ok(k)
                }
            }
            None => self.root.take().ok_or_else(|| proto_err("no value to read")),
        }
    }

    fn expect_object(v: Value) -> std::result::Result<Map<String, Value>, TError> {
        match v {
            Value::Object(m) => Ok(m),
            other => Err(proto_err(format!("expected a JSON object, got {other}"))),
        }
    }

    fn expect_array(v: Value) -> std::result::Result<Vec<Value>, TError> {
        match v {
            Value::Array(a) => Ok(a),
            other => Err(proto_err(format!("expected a JSON array, got {other}"))),
        }
    }

    fn tagged(v: Value) -> std::result::Result<(String, Value), TError> {
        let mut obj = Self::expect_object(v)?;
        let tag = obj
            .remove("t")
            .and_then(|t| t.as_str().map(str::to_string))
            .ok_or_else(|| proto_err("tagged value missing \"t\""))?;
        let inner = obj.remove("v").ok_or_else(|| proto_err("tagged value missing \"v\""))?;
        Ok((tag, inner))
    }
}

impl TInputProtocol for ThriftJsonReader {
    fn read_message_begin(&mut self) -> thrift::Result<TMessageIdentifier> {
        Err(proto_err("ThriftJsonReader bridges payload structs, not messages"))
    }

    fn read_message_end(&mut self) -> thrift::Result<()> {
        Ok(())
    }

    fn read_struct_begin(&mut self) -> thrift::Result<Option<TStructIdentifier>> {
        let (tag, inner) = Self::tagged(self.take_next()?)?;
        if tag_type(&tag)? != TType::Struct {
            return Err(proto_err(format!("expected a struct, got tag {tag:?}")));
        }
        let obj = Self::expect_object(inner)?;
        let mut fields = VecDeque::with_capacity(obj.len());
        for (key, value) in obj {
            let id: i16 = key
                .parse()
                .map_err(|_| proto_err(format!("non-numeric field id {key:?}")))?;
            let (field_tag, field_value) = Self::tagged(value)?;
            fields.push_back((id, tag_type(&field_tag)?, field_value));
        }
        self.stack.push(RFrame::Struct {
            fields,
            pending: None,
        });
        Ok(Some(TStructIdentifier::new("")))
    }

    fn read_struct_end(&mut self) -> thrift::Result<()> {
        match self.stack.pop() {
            Some(RFrame::Struct { .. }) => Ok(()),
            _ => Err(proto_err("read_struct_end without matching struct_begin")),
        }
    }

    fn read_field_begin(&mut self) -> thrift::Result<TFieldIdentifier> {
        match self.stack.last_mut() {
            Some(RFrame::Struct { fields, pending }) => match fields.pop_front() {
                Some((id, ty, value)) => {
                    *pending = Some((ty, value));
                    Ok(TFieldIdentifier::new::<Option<String>, String, Option<i16>>(None, ty, Some(id)))
                }
                None => Ok(TFieldIdentifier::new::<Option<String>, String, Option<i16>>(None, TType::Stop, None)),
            },
            _ => Err(proto_err("read_field_begin outside a struct")),
        }
    }

    fn read_field_end(&mut self) -> thrift::Result<()> {
        Ok(())
    }

    fn read_bool(&mut self) -> thrift::Result<bool> {
        self.take_next()?
            .as_bool()
            .ok_or_else(|| proto_err("expected a bool"))
    }

    fn read_bytes(&mut self) -> thrift::Result<Vec<u8>> {
        let s = self
            .take_next()?
            .as_str()
            .ok_or_else(|| proto_err("expected a base64 string"))?
            .to_string();
        base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(|e| proto_err(e.to_string()))
    }

    fn read_i8(&mut self) -> thrift::Result<i8> {
        Ok(self.read_i64()? as i8)
    }

    fn read_i16(&mut self) -> thrift::Result<i16> {
        Ok(self.read_i64()? as i16)
    }

    fn read_i32(&mut self) -> thrift::Result<i32> {
        Ok(self.read_i64()? as i32)
    }

    fn read_i64(&mut self) -> thrift::Result<i64> {
        self.take_next()?
            .as_i64()
            .ok_or_else(|| proto_err("expected an integer"))
    }

    fn read_double(&mut self) -> thrift::Result<f64> {
        self.take_next()?
            .as_f64()
            .ok_or_else(|| proto_err("expected a number"))
    }

    fn read_string(&mut self) -> thrift::Result<String> {
        self.take_next()?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| proto_err("expected a string"))
    }

    fn read_list_begin(&mut self) -> thrift::Result<TListIdentifier> {
        let (tag, inner) = Self::tagged(self.take_next()?)?;
        if tag_type(&tag)? != TType::List {
            return Err(proto_err(format!("expected a list, got tag {tag:?}")));
        }
        let mut obj = Self::expect_object(Value::Object({
            let mut m = Map::new();
            m.insert("et".into(), Value::Null);
            m.insert("v".into(), inner);
            m
        }))?;
        let items: VecDeque<Value> = Self::expect_array(obj.remove("v").unwrap())?.into();
        let size = items.len() as i32;
        self.stack.push(RFrame::List { items });
        Ok(TListIdentifier::new(TType::Void, size))
    }

    fn read_list_end(&mut self) -> thrift::Result<()> {
        match self.stack.pop() {
            Some(RFrame::List { .. }) => Ok(()),
            _ => Err(proto_err("read_list_end without matching list_begin")),
        }
    }

    fn read_set_begin(&mut self) -> thrift::Result<TSetIdentifier> {
        let (tag, inner) = Self::tagged(self.take_next()?)?;
        if tag_type(&tag)? != TType::Set {
            return Err(proto_err(format!("expected a set, got tag {tag:?}")));
        }
        let mut obj = Self::expect_object(Value::Object({
            let mut m = Map::new();
            m.insert("v".into(), inner);
            m
        }))?;
        let items: VecDeque<Value> = Self::expect_array(obj.remove("v").unwrap())?.into();
        let size = items.len() as i32;
        self.stack.push(RFrame::List { items });
        Ok(TSetIdentifier::new(TType::Void, size))
    }

    fn read_set_end(&mut self) -> thrift::Result<()> {
        match self.stack.pop() {
            Some(RFrame::List { .. }) => Ok(()),
            _ => Err(proto_err("read_set_end without matching set_begin")),
        }
    }

    fn read_map_begin(&mut self) -> thrift::Result<TMapIdentifier> {
        let (tag, inner) = Self::tagged(self.take_next()?)?;
        if tag_type(&tag)? != TType::Map {
            return Err(proto_err(format!("expected a map, got tag {tag:?}")));
        }
        let arr = Self::expect_array(inner)?;
        let mut entries = VecDeque::with_capacity(arr.len());
        for pair in arr {
            let mut pair = Self::expect_array(pair)?;
            if pair.len() != 2 {
                return Err(proto_err("map entry must be a [key, value] pair"));
            }
            let v = pair.pop().unwrap();
            let k = pair.pop().unwrap();
            entries.push_back((k, v));
        }
        let size = entries.len() as i32;
        self.stack.push(RFrame::Map {
            entries,
            pending_value: None,
        });
        Ok(TMapIdentifier::new(Some(TType::Void), Some(TType::Void), size))
    }

    fn read_map_end(&mut self) -> thrift::Result<()> {
        match self.stack.pop() {
            Some(RFrame::Map { .. }) => Ok(()),
            _ => Err(proto_err("read_map_end without matching map_begin")),
        }
    }

    fn read_byte(&mut self) -> thrift::Result<u8> {
        Err(proto_err("read_byte is not used by generated code"))
    }
}

/// Serializes `msg` into a JSON value via its own `write_to_out_protocol`.
pub fn thrift_to_json<T: TSerializable>(msg: &T) -> Result<Value> {
    let mut out = ThriftJsonWriter::new();
    msg.write_to_out_protocol(&mut out)
        .map_err(|e| Error::Serialize(e.to_string()))?;
    out.finish().map_err(|e| Error::Serialize(e.to_string()))
}

/// Deserializes `value` into `T` via its own `read_from_in_protocol`.
pub fn json_to_thrift<T: TSerializable>(value: Value) -> Result<T> {
    let mut input = ThriftJsonReader::new(value);
    T::read_from_in_protocol(&mut input).map_err(|e| Error::Deserialize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use thrift::protocol::{TFieldIdentifier, TStructIdentifier, TType};

    struct Example {
        name: String,
        count: i32,
        tags: Vec<String>,
    }

    impl TSerializable for Example {
        fn write_to_out_protocol(&self, o: &mut dyn TOutputProtocol) -> thrift::Result<()> {
            o.write_struct_begin(&TStructIdentifier::new("Example"))?;
            o.write_field_begin(&TFieldIdentifier::new("name", TType::String, 1))?;
            o.write_string(&self.name)?;
            o.write_field_end()?;
            o.write_field_begin(&TFieldIdentifier::new("count", TType::I32, 2))?;
            o.write_i32(self.count)?;
            o.write_field_end()?;
            o.write_field_begin(&TFieldIdentifier::new("tags", TType::List, 3))?;
            o.write_list_begin(&TListIdentifier::new(TType::String, self.tags.len() as i32))?;
            for t in &self.tags {
                o.write_string(t)?;
            }
            o.write_list_end()?;
            o.write_field_end()?;
            o.write_field_stop()?;
            o.write_struct_end()
        }

        fn read_from_in_protocol(i: &mut dyn TInputProtocol) -> thrift::Result<Self> {
            i.read_struct_begin()?;
            let mut name = String::new();
            let mut count = 0;
            let mut tags = Vec::new();
            loop {
                let field = i.read_field_begin()?;
                if field.field_type == TType::Stop {
                    break;
                }
                match field.id {
                    Some(1) => name = i.read_string()?,
                    Some(2) => count = i.read_i32()?,
                    Some(3) => {
                        let list = i.read_list_begin()?;
                        for _ in 0..list.size {
                            tags.push(i.read_string()?);
                        }
                        i.read_list_end()?;
                    }
                    _ => i.skip(field.field_type)?,
                }
                i.read_field_end()?;
            }
            i.read_struct_end()?;
            Ok(Example { name, count, tags })
        }
    }

    #[test]
    fn struct_with_list_round_trips_through_json() {
        let original = Example {
            name: "widget".into(),
            count: 7,
            tags: vec!["a".into(), "b".into()],
        };
        let json = thrift_to_json(&original).unwrap();
        let restored: Example = json_to_thrift(json).unwrap();
        assert_eq!(restored.name, "widget");
        assert_eq!(restored.count, 7);
        assert_eq!(restored.tags, vec!["a", "b"]);
    }

    #[test]
    fn json_shape_keys_fields_by_id() {
        let original = Example {
            name: "x".into(),
            count: 1,
            tags: vec![],
        };
        let json = thrift_to_json(&original).unwrap();
        let rec = json.get("v").unwrap();
        assert_eq!(rec.get("1").unwrap()["v"], Value::from("x"));
        assert_eq!(rec.get("2").unwrap()["v"], Value::from(1));
    }
}
