use crate::entity::{AttrValue, Document, Entity, EntityId, Slot};
use crate::error::{CodecError, EditorError, EditorResult};
use crate::schema::{Schema, SlotKind};
use crate::statics;
use std::io::{self, Read, Write};
use std::sync::Arc;
use tracing::debug;

/// Reads and writes whole documents.
pub trait Codec {
    fn read(&self, schema: &Arc<Schema>, input: &mut dyn Read) -> Result<Document, CodecError>;
    fn write(&self, document: &Document, output: &mut dyn Write) -> Result<(), CodecError>;
}

/// Little-endian, length-prefixed encoding:
///
/// ```text
/// document := "XDOC" u32:version entity
/// entity   := str:variant u32:slot_count (str:name u8:tag payload)*
/// payload  := value | u8:present entity? | u32:n entity* | u32:n value*
/// value    := u8:tag (bool u8 | i64 | f64 | str | ref i64 | u32:n bytes)?
/// str      := u32:n utf8
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl Codec for BinaryCodec {
    fn read(&self, schema: &Arc<Schema>, input: &mut dyn Read) -> Result<Document, CodecError> {
        let mut reader = Reader::new(input);
        let magic = reader.bytes(4)?;
        if magic != statics::DOC_MAGIC {
            return Err(CodecError::new(0, "not an XDOC document"));
        }
        let version = reader.u32()?;
        if version > statics::DOC_FORMAT_VERSION {
            return Err(CodecError::new(
                4,
                format!("unsupported document version {version}"),
            ));
        }

        let mut entities = Vec::new();
        let root_offset = reader.offset;
        let root = decode_entity(&mut reader, schema, &mut entities, 0)?;
        if entities[root.index()].variant() != schema.root_variant() {
            return Err(CodecError::new(
                root_offset,
                format!(
                    "root entity is {}, expected {}",
                    entities[root.index()].variant(),
                    schema.root_variant()
                ),
            ));
        }
        reader.expect_end()?;
        debug!(
            entities = entities.len(),
            bytes = reader.offset,
            "decoded document"
        );
        Ok(Document::from_parts(Arc::clone(schema), entities, root))
    }

    fn write(&self, document: &Document, output: &mut dyn Write) -> Result<(), CodecError> {
        let mut writer = Writer::new(output);
        writer.raw(&statics::DOC_MAGIC)?;
        writer.u32(statics::DOC_FORMAT_VERSION)?;
        encode_entity(&mut writer, document, document.root())?;
        writer.flush()
    }
}

/// Write one entity subtree as a standalone window file.
pub fn export_window(
    document: &Document,
    entity: EntityId,
    output: &mut dyn Write,
) -> Result<(), CodecError> {
    let mut writer = Writer::new(output);
    writer.u32(statics::WINDOW_MAGIC)?;
    writer.u32(statics::WINDOW_FORMAT_VERSION)?;
    encode_entity(&mut writer, document, entity)?;
    writer.flush()
}

/// Read a window file into `document` as a new detached entity. Nothing is
/// added to the document if decoding fails.
pub fn import_window(document: &mut Document, input: &mut dyn Read) -> EditorResult<EntityId> {
    let mut reader = Reader::new(input);
    let magic = reader.u32()?;
    if magic != statics::WINDOW_MAGIC {
        return Err(CodecError::new(0, "not a window export file").into());
    }
    let version = reader.u32()?;
    if version > statics::WINDOW_FORMAT_VERSION {
        return Err(CodecError::new(
            4,
            format!(
                "window file version {version} is newer than supported {}",
                statics::WINDOW_FORMAT_VERSION
            ),
        )
        .into());
    }

    let schema = Arc::clone(document.schema());
    let mark = document.len();
    let result = decode_entity(&mut reader, &schema, document.entities_mut(), 0)
        .and_then(|id| reader.expect_end().map(|()| id));
    match result {
        Ok(id) => Ok(id),
        Err(err) => {
            document.truncate(mark);
            Err(EditorError::Codec(err))
        }
    }
}

fn decode_entity(
    reader: &mut Reader<'_>,
    schema: &Schema,
    entities: &mut Vec<Entity>,
    depth: usize,
) -> Result<EntityId, CodecError> {
    if depth > statics::CODEC_MAX_DEPTH {
        return Err(CodecError::new(reader.offset, "entities nested too deeply"));
    }
    let variant_offset = reader.offset;
    let variant = reader.string()?;
    let mut entity = schema
        .instantiate(&variant)
        .map_err(|err| CodecError::new(variant_offset, err.to_string()))?;

    let slot_count = reader.u32()?;
    for _ in 0..slot_count {
        let name_offset = reader.offset;
        let name = reader.string()?;
        let kind = schema
            .slot(&variant, &name)
            .map(|s| s.kind.clone())
            .ok_or_else(|| CodecError::new(name_offset, format!("{variant} has no slot {name}")))?;
        let tag_offset = reader.offset;
        let tag = reader.u8()?;

        let slot = match (tag, &kind) {
            (0, SlotKind::Attribute(attr)) => {
                let value = read_value(reader)?;
                if !attr.accepts(&value) {
                    return Err(CodecError::new(
                        tag_offset,
                        format!("{variant}.{name} does not accept {value:?}"),
                    ));
                }
                Slot::Attr(value)
            }
            (1, SlotKind::Nested { variant: required }) => {
                if reader.u8()? == 0 {
                    Slot::Nested(None)
                } else {
                    let child_offset = reader.offset;
                    let child = decode_entity(reader, schema, entities, depth + 1)?;
                    let child_variant = entities[child.index()].variant();
                    if !schema.is_assignable(required, child_variant) {
                        return Err(CodecError::new(
                            child_offset,
                            format!("{variant}.{name} cannot hold {child_variant}"),
                        ));
                    }
                    Slot::Nested(Some(child))
                }
            }
            (2, SlotKind::List { element }) => {
                let count = reader.len()?;
                let mut items = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    let child_offset = reader.offset;
                    let child = decode_entity(reader, schema, entities, depth + 1)?;
                    let child_variant = entities[child.index()].variant();
                    if let Some(element) = element {
                        if !schema.is_assignable(element, child_variant) {
                            return Err(CodecError::new(
                                child_offset,
                                format!("{variant}.{name} cannot hold {child_variant}"),
                            ));
                        }
                    }
                    items.push(child);
                }
                Slot::List(items)
            }
            (3, SlotKind::Values(attr)) => {
                let count = reader.len()?;
                let mut values = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    let value_offset = reader.offset;
                    let value = read_value(reader)?;
                    if !attr.accepts(&value) {
                        return Err(CodecError::new(
                            value_offset,
                            format!("{variant}.{name} does not accept {value:?}"),
                        ));
                    }
                    values.push(value);
                }
                Slot::Values(values)
            }
            _ => {
                return Err(CodecError::new(
                    tag_offset,
                    format!("slot tag {tag} does not fit {variant}.{name}"),
                ));
            }
        };
        if let Some(target) = entity.slot_mut(&name) {
            *target = slot;
        }
    }

    entities.push(entity);
    Ok(EntityId::from_index(entities.len() - 1))
}

fn read_value(reader: &mut Reader<'_>) -> Result<AttrValue, CodecError> {
    let offset = reader.offset;
    Ok(match reader.u8()? {
        0 => AttrValue::Null,
        1 => AttrValue::Bool(reader.u8()? != 0),
        2 => AttrValue::Int(reader.i64()?),
        3 => AttrValue::Float(f64::from_bits(reader.u64()?)),
        4 => AttrValue::Text(reader.string()?),
        5 => AttrValue::Ref(reader.i64()?),
        6 => {
            let len = reader.len()?;
            AttrValue::Blob(Arc::from(reader.bytes(len)?))
        }
        other => {
            return Err(CodecError::new(
                offset,
                format!("unknown value tag {other}"),
            ));
        }
    })
}

fn encode_entity(
    writer: &mut Writer<'_>,
    document: &Document,
    id: EntityId,
) -> Result<(), CodecError> {
    let entity = document
        .get(id)
        .ok_or_else(|| CodecError::new(writer.offset, format!("dangling entity {id}")))?;
    writer.string(entity.variant())?;
    writer.len(entity.slots().len())?;
    for (name, slot) in entity.slots() {
        writer.string(name)?;
        match slot {
            Slot::Attr(value) => {
                writer.u8(0)?;
                write_value(writer, value)?;
            }
            Slot::Nested(child) => {
                writer.u8(1)?;
                match child {
                    None => writer.u8(0)?,
                    Some(child) => {
                        writer.u8(1)?;
                        encode_entity(writer, document, *child)?;
                    }
                }
            }
            Slot::List(items) => {
                writer.u8(2)?;
                writer.len(items.len())?;
                for item in items {
                    encode_entity(writer, document, *item)?;
                }
            }
            Slot::Values(values) => {
                writer.u8(3)?;
                writer.len(values.len())?;
                for value in values {
                    write_value(writer, value)?;
                }
            }
        }
    }
    Ok(())
}

fn write_value(writer: &mut Writer<'_>, value: &AttrValue) -> Result<(), CodecError> {
    match value {
        AttrValue::Null => writer.u8(0),
        AttrValue::Bool(v) => {
            writer.u8(1)?;
            writer.u8(u8::from(*v))
        }
        AttrValue::Int(v) => {
            writer.u8(2)?;
            writer.raw(&v.to_le_bytes())
        }
        AttrValue::Float(v) => {
            writer.u8(3)?;
            writer.raw(&v.to_bits().to_le_bytes())
        }
        AttrValue::Text(s) => {
            writer.u8(4)?;
            writer.string(s)
        }
        AttrValue::Ref(v) => {
            writer.u8(5)?;
            writer.raw(&v.to_le_bytes())
        }
        AttrValue::Blob(bytes) => {
            writer.u8(6)?;
            writer.len(bytes.len())?;
            writer.raw(bytes)
        }
    }
}

/// Byte-counting reader so errors can name the offending offset.
struct Reader<'a> {
    inner: &'a mut dyn Read,
    offset: u64,
}

impl<'a> Reader<'a> {
    fn new(inner: &'a mut dyn Read) -> Self {
        Self { inner, offset: 0 }
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<(), CodecError> {
        self.inner.read_exact(buf).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => CodecError::new(self.offset, "unexpected end of data"),
            _ => CodecError::new(self.offset, err.to_string()),
        })?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    fn bytes(&mut self, len: usize) -> Result<Vec<u8>, CodecError> {
        let mut buf = vec![0; len];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        let mut buf = [0; 1];
        self.fill(&mut buf)?;
        Ok(buf[0])
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        let mut buf = [0; 4];
        self.fill(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn u64(&mut self) -> Result<u64, CodecError> {
        let mut buf = [0; 8];
        self.fill(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn i64(&mut self) -> Result<i64, CodecError> {
        let mut buf = [0; 8];
        self.fill(&mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }

    /// Length prefix, bounded so corrupt input cannot request huge buffers.
    fn len(&mut self) -> Result<usize, CodecError> {
        let offset = self.offset;
        let len = self.u32()?;
        if len > statics::CODEC_MAX_LEN {
            return Err(CodecError::new(
                offset,
                format!("length {len} is too large"),
            ));
        }
        Ok(len as usize)
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let len = self.len()?;
        let offset = self.offset;
        let bytes = self.bytes(len)?;
        String::from_utf8(bytes).map_err(|_| CodecError::new(offset, "string is not valid UTF-8"))
    }

    fn expect_end(&mut self) -> Result<(), CodecError> {
        let mut extra = [0; 1];
        match self.inner.read(&mut extra) {
            Ok(0) => Ok(()),
            Ok(_) => Err(CodecError::new(self.offset, "trailing data after document")),
            Err(err) => Err(CodecError::new(self.offset, err.to_string())),
        }
    }
}

struct Writer<'a> {
    inner: &'a mut dyn Write,
    offset: u64,
}

impl<'a> Writer<'a> {
    fn new(inner: &'a mut dyn Write) -> Self {
        Self { inner, offset: 0 }
    }

    fn raw(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.inner
            .write_all(bytes)
            .map_err(|err| CodecError::new(self.offset, err.to_string()))?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    fn u8(&mut self, v: u8) -> Result<(), CodecError> {
        self.raw(&[v])
    }

    fn u32(&mut self, v: u32) -> Result<(), CodecError> {
        self.raw(&v.to_le_bytes())
    }

    fn len(&mut self, len: usize) -> Result<(), CodecError> {
        let len = u32::try_from(len)
            .ok()
            .filter(|l| *l <= statics::CODEC_MAX_LEN)
            .ok_or_else(|| CodecError::new(self.offset, format!("length {len} is too large")))?;
        self.u32(len)
    }

    fn string(&mut self, s: &str) -> Result<(), CodecError> {
        self.len(s.len())?;
        self.raw(s.as_bytes())
    }

    fn flush(&mut self) -> Result<(), CodecError> {
        self.inner
            .flush()
            .map_err(|err| CodecError::new(self.offset, err.to_string()))
    }
}
