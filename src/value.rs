use crate::entity::{AttrValue, Document, EntityId, Slot};
use crate::schema::AttrKind;
use crate::statics;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, de};

/// Keeps integers and floats apart so `1` and `1.0` survive a round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum DocNumber {
    I64(i64),
    F64(f64),
}

impl DocNumber {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DocNumber::I64(v) => Some(*v),
            DocNumber::F64(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            DocNumber::I64(v) => *v as f64,
            DocNumber::F64(v) => *v,
        }
    }
}

/// Plain JSON5 value: settings files, CLI property literals and element dumps.
#[derive(Debug, Clone, PartialEq)]
pub enum DocValue {
    Null,
    Bool(bool),
    Number(DocNumber),
    String(String),
    Array(Vec<DocValue>),
    Object(IndexMap<String, DocValue>),
}

impl DocValue {
    pub fn as_object(&self) -> Option<&IndexMap<String, DocValue>> {
        match self {
            DocValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[DocValue]> {
        match self {
            DocValue::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DocValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&DocValue> {
        self.as_object().and_then(|m| m.get(key))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            DocValue::Null => "null",
            DocValue::Bool(_) => "bool",
            DocValue::Number(_) => "number",
            DocValue::String(_) => "string",
            DocValue::Array(_) => "array",
            DocValue::Object(_) => "object",
        }
    }

    pub fn parse_json5(text: &str) -> anyhow::Result<DocValue> {
        Ok(json5::from_str::<DocValue>(text)?)
    }

    /// Convert a scalar literal into an attribute of the given kind.
    pub fn to_attr(&self, kind: AttrKind) -> Option<AttrValue> {
        match (kind, self) {
            (_, DocValue::Null) => Some(AttrValue::Null),
            (AttrKind::Text, DocValue::String(s)) => Some(AttrValue::Text(s.clone())),
            (AttrKind::Bool, DocValue::Bool(b)) => Some(AttrValue::Bool(*b)),
            (AttrKind::Int, DocValue::Number(n)) => n.as_i64().map(AttrValue::Int),
            (AttrKind::Reference, DocValue::Number(n)) => n.as_i64().map(AttrValue::Ref),
            (AttrKind::Float, DocValue::Number(n)) => Some(AttrValue::Float(n.as_f64())),
            _ => None,
        }
    }

    pub fn from_attr(value: &AttrValue) -> DocValue {
        match value {
            AttrValue::Null => DocValue::Null,
            AttrValue::Bool(b) => DocValue::Bool(*b),
            AttrValue::Int(v) | AttrValue::Ref(v) => DocValue::Number(DocNumber::I64(*v)),
            AttrValue::Float(v) => DocValue::Number(DocNumber::F64(*v)),
            AttrValue::Text(s) => DocValue::String(s.clone()),
            AttrValue::Blob(bytes) => {
                DocValue::String(format!(
                    "{} ({} bytes)",
                    statics::EN_LITERAL_BLOB,
                    bytes.len()
                ))
            }
        }
    }

    /// Render an entity subtree as an object keyed by slot name, with the
    /// variant under `$type`. Read-only view used for dumps.
    pub fn from_entity(document: &Document, id: EntityId) -> DocValue {
        let Some(entity) = document.get(id) else {
            return DocValue::Null;
        };
        let mut map = IndexMap::with_capacity(entity.slots().len() + 1);
        map.insert(
            "$type".to_string(),
            DocValue::String(entity.variant().to_string()),
        );
        for (name, slot) in entity.slots() {
            let value = match slot {
                Slot::Attr(v) => DocValue::from_attr(v),
                Slot::Nested(None) => DocValue::Null,
                Slot::Nested(Some(child)) => DocValue::from_entity(document, *child),
                Slot::List(items) => DocValue::Array(
                    items
                        .iter()
                        .map(|child| DocValue::from_entity(document, *child))
                        .collect(),
                ),
                Slot::Values(values) => {
                    DocValue::Array(values.iter().map(DocValue::from_attr).collect())
                }
            };
            map.insert(name.clone(), value);
        }
        DocValue::Object(map)
    }

    pub fn to_json5_pretty(&self) -> String {
        let mut out = String::new();
        self.write_json5(&mut out, 0, true);
        out.push('\n');
        out
    }

    pub fn to_json5_compact(&self) -> String {
        let mut out = String::new();
        self.write_json5(&mut out, 0, false);
        out
    }

    fn write_json5(&self, out: &mut String, indent: usize, pretty: bool) {
        match self {
            DocValue::Null => out.push_str(statics::EN_LITERAL_NULL),
            DocValue::Bool(v) => out.push_str(if *v { "true" } else { "false" }),
            DocValue::Number(n) => n.write_json5(out),
            DocValue::String(s) => write_escaped_string(out, s),
            DocValue::Array(values) => {
                out.push('[');
                if pretty && !values.is_empty() {
                    out.push('\n');
                }
                for (i, v) in values.iter().enumerate() {
                    if pretty {
                        out.push_str(&" ".repeat(indent + 4));
                    } else if i > 0 {
                        out.push(' ');
                    }
                    v.write_json5(out, indent + 4, pretty);
                    if i + 1 != values.len() {
                        out.push(',');
                    }
                    if pretty {
                        out.push('\n');
                    }
                }
                if pretty && !values.is_empty() {
                    out.push_str(&" ".repeat(indent));
                }
                out.push(']');
            }
            DocValue::Object(map) => {
                out.push('{');
                if pretty && !map.is_empty() {
                    out.push('\n');
                }
                for (i, (k, v)) in map.iter().enumerate() {
                    if pretty {
                        out.push_str(&" ".repeat(indent + 4));
                    } else if i > 0 {
                        out.push(' ');
                    }
                    write_escaped_string(out, k);
                    out.push(':');
                    if pretty {
                        out.push(' ');
                    }
                    v.write_json5(out, indent + 4, pretty);
                    if i + 1 != map.len() {
                        out.push(',');
                    }
                    if pretty {
                        out.push('\n');
                    }
                }
                if pretty && !map.is_empty() {
                    out.push_str(&" ".repeat(indent));
                }
                out.push('}');
            }
        }
    }
}

impl DocNumber {
    fn write_json5(&self, out: &mut String) {
        match self {
            DocNumber::I64(v) => out.push_str(&v.to_string()),
            DocNumber::F64(v) => {
                if v.is_nan() {
                    out.push_str("NaN");
                } else if v.is_infinite() {
                    if v.is_sign_negative() {
                        out.push_str("-Infinity");
                    } else {
                        out.push_str("Infinity");
                    }
                } else {
                    let mut buf = ryu::Buffer::new();
                    out.push_str(buf.format(*v));
                }
            }
        }
    }
}

fn write_escaped_string(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write as _;
                write!(out, "\\u{:04X}", c as u32).ok();
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

impl<'de> Deserialize<'de> for DocValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ValueVisitor;

        impl<'de> de::Visitor<'de> for ValueVisitor {
            type Value = DocValue;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a JSON5 value")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(DocValue::Null)
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(DocValue::Null)
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(DocValue::Bool(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(DocValue::Number(DocNumber::I64(v)))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(DocValue::Number(match i64::try_from(v) {
                    Ok(v) => DocNumber::I64(v),
                    Err(_) => DocNumber::F64(v as f64),
                }))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(DocValue::Number(DocNumber::F64(v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(DocValue::String(v.to_owned()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(DocValue::String(v))
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut values = Vec::new();
                while let Some(value) = seq.next_element::<DocValue>()? {
                    values.push(value);
                }
                Ok(DocValue::Array(values))
            }

            fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut values = IndexMap::new();
                while let Some((key, value)) = map.next_entry::<String, DocValue>()? {
                    values.insert(key, value);
                }
                Ok(DocValue::Object(values))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}
