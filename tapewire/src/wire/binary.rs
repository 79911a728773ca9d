//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! The compact binary dialect.
//!
//! Every value is a single-byte type tag followed by its payload. The tag
//! stream is stateless, mappings and sequences are self-delimited by an
//! end tag, and any unknown value can be skipped by length or structure.
//!
//! | Tag | Meaning |
//! |-----|---------|
//! | `0x00..=0x7F` | small non-negative integer (the tag is the value) |
//! | `0x80` | null |
//! | `0x81` / `0x82` | false / true |
//! | `0x83` | text: stop-bit length + UTF-8 |
//! | `0x84` | blob: stop-bit length + raw bytes |
//! | `0x85` | timestamp: i64 LE nanoseconds |
//! | `0xA0 + n` | short UTF-8 string of `n <= 15` bytes |
//! | `0xB0` | mapping start, entries until `0xBF` |
//! | `0xB1` | sequence start, values until `0xBF` |
//! | `0xB4 + w` | fixed int, `w` ∈ {0: i8, 1: i16, 2: i32, 3: i64}, LE |
//! | `0xBA` | event-id entry: zigzag stop-bit id, then value |
//! | `0xBC` | field-name entry: stop-bit length + name, then value |
//! | `0xBF` | end of mapping / sequence |
//! | `0xC0` / `0xC1` | f32 / f64, LE |
//! | `0xE0` | typed object: alias string, then mapping |

use crate::buffer::ElasticBytes;
use crate::document::FramerState;
use crate::error::{ProtocolError, WireResult};
use crate::marshal::{ClassLookup, LongConverter, Marshallable};
use crate::value::{IntWidth, MapKey, WireValue};
use crate::wire::input::DocPayload;
use crate::wire::{Dialect, MappingOut, ValueIn, ValueOut, Wire};
use std::sync::Arc;

const NULL: u8 = 0x80;
const FALSE: u8 = 0x81;
const TRUE: u8 = 0x82;
const TEXT: u8 = 0x83;
const BLOB: u8 = 0x84;
const TIMESTAMP: u8 = 0x85;
const SHORT_TEXT: u8 = 0xA0;
const SHORT_TEXT_MAX: usize = 15;
const MAP_START: u8 = 0xB0;
const SEQ_START: u8 = 0xB1;
const INT_BASE: u8 = 0xB4;
const EVENT_ID: u8 = 0xBA;
const FIELD_NAME: u8 = 0xBC;
const END: u8 = 0xBF;
const F32: u8 = 0xC0;
const F64: u8 = 0xC1;
const TYPED: u8 = 0xE0;

/// Binary dialect wire.
pub struct BinaryWire {
    bytes: ElasticBytes,
    framer: FramerState,
    lookup: Arc<ClassLookup>,
    input: ValueIn,
    pending_type: Option<String>,
}

impl Default for BinaryWire {
    fn default() -> Self {
        Self::with_bytes(ElasticBytes::new())
    }
}

impl BinaryWire {
    /// A binary wire over the given buffer.
    #[must_use]
    pub fn with_bytes(bytes: ElasticBytes) -> Self {
        Self {
            bytes,
            framer: FramerState::default(),
            lookup: ClassLookup::global(),
            input: ValueIn::default(),
            pending_type: None,
        }
    }

    fn write_text_raw(&mut self, text: &str) {
        let len = text.len();
        if len <= SHORT_TEXT_MAX {
            self.bytes.write_u8(SHORT_TEXT + len as u8);
        } else {
            self.bytes.write_u8(TEXT);
            self.bytes.write_stop_bit(len as u64);
        }
        self.bytes.append(text);
    }

    fn write_int(&mut self, value: i64, width: IntWidth) {
        if (0..=0x7F).contains(&value) {
            self.bytes.write_u8(value as u8);
            return;
        }
        match width {
            IntWidth::I8 => {
                self.bytes.write_u8(INT_BASE);
                self.bytes.write_i8(value as i8);
            }
            IntWidth::I16 => {
                self.bytes.write_u8(INT_BASE + 1);
                self.bytes.write_i16(value as i16);
            }
            IntWidth::I32 => {
                self.bytes.write_u8(INT_BASE + 2);
                self.bytes.write_i32(value as i32);
            }
            IntWidth::I64 => {
                self.bytes.write_u8(INT_BASE + 3);
                self.bytes.write_i64(value);
            }
        }
    }

    fn write_field_name(&mut self, name: &str) {
        self.bytes.write_u8(FIELD_NAME);
        self.bytes.write_stop_bit(name.len() as u64);
        self.bytes.append(name);
    }

    fn parse_payload(&self, start: u64, len: u64) -> WireResult<DocPayload> {
        let slice = &self.bytes.as_slice()[start as usize..(start + len) as usize];
        decode_payload(slice, start)
    }
}

/// Decodes one binary document payload; also used by the dumper.
pub(crate) fn decode_payload(slice: &[u8], base: u64) -> WireResult<DocPayload> {
    let mut decoder = Decoder {
        bytes: slice,
        pos: 0,
        base,
    };
    if decoder.at_end() {
        return Ok(DocPayload::Events(Vec::new()));
    }
    match decoder.peek()? {
        FIELD_NAME | EVENT_ID => {
            let mut entries = Vec::new();
            while !decoder.at_end() {
                match decoder.peek()? {
                    FIELD_NAME => {
                        decoder.take()?;
                        let name = decoder.read_name()?;
                        let value = decoder.read_value()?;
                        entries.push((MapKey::Name(name), value));
                    }
                    EVENT_ID => {
                        decoder.take()?;
                        let id = decoder.read_zigzag()?;
                        let value = decoder.read_value()?;
                        entries.push((MapKey::Id(id), value));
                    }
                    // A zero tag at the top level is padding.
                    0x00 => {
                        decoder.take()?;
                    }
                    tag => {
                        return Err(ProtocolError::UnknownTag {
                            tag,
                            position: decoder.position(),
                        }
                        .into())
                    }
                }
            }
            Ok(DocPayload::Events(entries))
        }
        _ => {
            let value = decoder.read_value()?;
            Ok(DocPayload::Scalar(value))
        }
    }
}

struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    base: u64,
}

impl Decoder<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn position(&self) -> u64 {
        self.base + self.pos as u64
    }

    fn peek(&self) -> WireResult<u8> {
        self.bytes.get(self.pos).copied().ok_or_else(|| {
            ProtocolError::UnexpectedEnd {
                needed: 1,
                remaining: 0,
            }
            .into()
        })
    }

    fn take(&mut self) -> WireResult<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Ok(b)
    }

    fn take_slice(&mut self, len: usize) -> WireResult<&[u8]> {
        let remaining = self.bytes.len() - self.pos;
        if len > remaining {
            return Err(ProtocolError::UnexpectedEnd {
                needed: len as u64,
                remaining: remaining as u64,
            }
            .into());
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_stop_bit(&mut self) -> WireResult<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let b = self.take()?;
            value |= u64::from(b & 0x7F) << shift;
            if b & 0x80 != 0 {
                return Ok(value);
            }
            shift += 7;
            if shift >= 64 {
                return Err(ProtocolError::MalformedHeader {
                    header: 0,
                    position: self.position(),
                }
                .into());
            }
        }
    }

    fn read_zigzag(&mut self) -> WireResult<i64> {
        let z = self.read_stop_bit()?;
        Ok(((z >> 1) as i64) ^ -((z & 1) as i64))
    }

    fn read_utf8(&mut self, len: usize) -> WireResult<String> {
        let slice = self.take_slice(len)?;
        Ok(std::str::from_utf8(slice)
            .map_err(ProtocolError::Utf8)?
            .to_owned())
    }

    fn read_name(&mut self) -> WireResult<String> {
        let len = self.read_stop_bit()? as usize;
        self.read_utf8(len)
    }

    fn read_array<const N: usize>(&mut self) -> WireResult<[u8; N]> {
        let slice = self.take_slice(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn read_text_value(&mut self) -> WireResult<String> {
        let tag = self.take()?;
        match tag {
            TEXT => {
                let len = self.read_stop_bit()? as usize;
                self.read_utf8(len)
            }
            t if (SHORT_TEXT..=SHORT_TEXT + SHORT_TEXT_MAX as u8).contains(&t) => {
                self.read_utf8((t - SHORT_TEXT) as usize)
            }
            tag => Err(ProtocolError::UnknownTag {
                tag,
                position: self.position(),
            }
            .into()),
        }
    }

    fn read_entries(&mut self) -> WireResult<Vec<(MapKey, WireValue)>> {
        let mut entries = Vec::new();
        loop {
            match self.take()? {
                END => return Ok(entries),
                FIELD_NAME => {
                    let name = self.read_name()?;
                    entries.push((MapKey::Name(name), self.read_value()?));
                }
                EVENT_ID => {
                    let id = self.read_zigzag()?;
                    entries.push((MapKey::Id(id), self.read_value()?));
                }
                tag => {
                    return Err(ProtocolError::UnknownTag {
                        tag,
                        position: self.position(),
                    }
                    .into())
                }
            }
        }
    }

    fn read_value(&mut self) -> WireResult<WireValue> {
        let tag = self.take()?;
        Ok(match tag {
            0x00..=0x7F => WireValue::Int {
                value: i64::from(tag),
                width: IntWidth::I8,
            },
            NULL => WireValue::Null,
            FALSE => WireValue::Bool(false),
            TRUE => WireValue::Bool(true),
            TEXT => {
                let len = self.read_stop_bit()? as usize;
                WireValue::Text(self.read_utf8(len)?)
            }
            BLOB => {
                let len = self.read_stop_bit()? as usize;
                WireValue::Bytes(self.take_slice(len)?.to_vec())
            }
            TIMESTAMP => WireValue::TimestampNanos(i64::from_le_bytes(self.read_array()?)),
            t if (SHORT_TEXT..=SHORT_TEXT + SHORT_TEXT_MAX as u8).contains(&t) => {
                WireValue::Text(self.read_utf8((t - SHORT_TEXT) as usize)?)
            }
            MAP_START => WireValue::Mapping(self.read_entries()?),
            SEQ_START => {
                let mut elements = Vec::new();
                while self.peek()? != END {
                    elements.push(self.read_value()?);
                }
                self.take()?;
                WireValue::Sequence(elements)
            }
            t if t == INT_BASE => WireValue::Int {
                value: i64::from(i8::from_le_bytes(self.read_array()?)),
                width: IntWidth::I8,
            },
            t if t == INT_BASE + 1 => WireValue::Int {
                value: i64::from(i16::from_le_bytes(self.read_array()?)),
                width: IntWidth::I16,
            },
            t if t == INT_BASE + 2 => WireValue::Int {
                value: i64::from(i32::from_le_bytes(self.read_array()?)),
                width: IntWidth::I32,
            },
            t if t == INT_BASE + 3 => WireValue::Int {
                value: i64::from_le_bytes(self.read_array()?),
                width: IntWidth::I64,
            },
            F32 => WireValue::F32(f32::from_le_bytes(self.read_array()?)),
            F64 => WireValue::F64(f64::from_le_bytes(self.read_array()?)),
            TYPED => {
                let alias = self.read_text_value()?;
                match self.read_value()? {
                    WireValue::Mapping(fields) => WireValue::TypedObject { alias, fields },
                    other => {
                        return Err(ProtocolError::TypeMismatch {
                            expected: "mapping after type tag",
                            found: other.kind().to_owned(),
                        }
                        .into())
                    }
                }
            }
            tag => {
                return Err(ProtocolError::UnknownTag {
                    tag,
                    position: self.position(),
                }
                .into())
            }
        })
    }
}

impl ValueOut for BinaryWire {
    fn is_binary(&self) -> bool {
        true
    }

    fn write_null(&mut self) -> WireResult<()> {
        self.bytes.write_u8(NULL);
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> WireResult<()> {
        self.bytes.write_u8(if value { TRUE } else { FALSE });
        Ok(())
    }

    fn write_i8(&mut self, value: i8) -> WireResult<()> {
        self.write_int(i64::from(value), IntWidth::I8);
        Ok(())
    }

    fn write_i16(&mut self, value: i16) -> WireResult<()> {
        self.write_int(i64::from(value), IntWidth::I16);
        Ok(())
    }

    fn write_i32(&mut self, value: i32) -> WireResult<()> {
        self.write_int(i64::from(value), IntWidth::I32);
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> WireResult<()> {
        self.write_int(value, IntWidth::I64);
        Ok(())
    }

    fn write_f32(&mut self, value: f32) -> WireResult<()> {
        self.bytes.write_u8(F32);
        self.bytes.write_f32(value);
        Ok(())
    }

    fn write_f64(&mut self, value: f64) -> WireResult<()> {
        self.bytes.write_u8(F64);
        self.bytes.write_f64(value);
        Ok(())
    }

    fn write_text(&mut self, text: &str) -> WireResult<()> {
        self.write_text_raw(text);
        Ok(())
    }

    fn write_raw_text(&mut self, text: &str) -> WireResult<()> {
        // Raw text has no meaning in binary; it lands as ordinary text.
        self.write_text_raw(text);
        Ok(())
    }

    fn write_bytes_blob(&mut self, bytes: &[u8]) -> WireResult<()> {
        self.bytes.write_u8(BLOB);
        self.bytes.write_stop_bit(bytes.len() as u64);
        self.bytes.write_slice(bytes);
        Ok(())
    }

    fn write_timestamp_nanos(&mut self, nanos: i64) -> WireResult<()> {
        self.bytes.write_u8(TIMESTAMP);
        self.bytes.write_i64(nanos);
        Ok(())
    }

    fn write_type_prefix(&mut self, alias: &str) -> WireResult<()> {
        self.pending_type = Some(alias.to_owned());
        Ok(())
    }

    fn write_marshallable(&mut self, value: &dyn Marshallable) -> WireResult<()> {
        if let Some(alias) = self.pending_type.take() {
            self.bytes.write_u8(TYPED);
            self.write_text_raw(&alias);
        }
        self.bytes.write_u8(MAP_START);
        value.write_fields(self)?;
        self.bytes.write_u8(END);
        Ok(())
    }

    fn write_object(&mut self, value: &dyn Marshallable, verbose: bool) -> WireResult<()> {
        if verbose {
            if let Some(alias) = self.lookup.alias_for(value.type_name()) {
                self.write_type_prefix(&alias)?;
            }
        }
        self.write_marshallable(value)
    }

    fn write_converted(
        &mut self,
        value: i64,
        _converter: &dyn LongConverter,
    ) -> WireResult<()> {
        // The textual alphabet is a character-dialect economy; binary
        // keeps the raw 64-bit value.
        self.write_int(value, IntWidth::I64);
        Ok(())
    }

    fn write_sequence(
        &mut self,
        items: &mut dyn FnMut(&mut dyn ValueOut) -> WireResult<()>,
    ) -> WireResult<()> {
        self.bytes.write_u8(SEQ_START);
        items(self)?;
        self.bytes.write_u8(END);
        Ok(())
    }

    fn write_value(&mut self, value: &WireValue) -> WireResult<()> {
        match value {
            WireValue::Null => self.write_null(),
            WireValue::Bool(b) => self.write_bool(*b),
            WireValue::Int { value, width } => {
                self.write_int(*value, *width);
                Ok(())
            }
            WireValue::F32(f) => self.write_f32(*f),
            WireValue::F64(f) => self.write_f64(*f),
            WireValue::Text(s) | WireValue::RawText(s) => self.write_text(s),
            WireValue::Bytes(b) => self.write_bytes_blob(b),
            WireValue::TimestampNanos(n) => self.write_timestamp_nanos(*n),
            WireValue::Sequence(elements) => {
                let elements = elements.clone();
                self.write_sequence(&mut |out| {
                    for element in &elements {
                        out.write_value(element)?;
                    }
                    Ok(())
                })
            }
            WireValue::Mapping(entries) => {
                self.bytes.write_u8(MAP_START);
                self.write_map_entries(entries)?;
                self.bytes.write_u8(END);
                Ok(())
            }
            WireValue::TypedObject { alias, fields } => {
                self.bytes.write_u8(TYPED);
                self.write_text_raw(alias);
                self.bytes.write_u8(MAP_START);
                self.write_map_entries(fields)?;
                self.bytes.write_u8(END);
                Ok(())
            }
        }
    }
}

impl BinaryWire {
    fn write_map_entries(&mut self, entries: &[(MapKey, WireValue)]) -> WireResult<()> {
        for (key, value) in entries {
            match key {
                MapKey::Name(name) => self.write_field_name(name),
                MapKey::Id(id) => {
                    self.bytes.write_u8(EVENT_ID);
                    self.bytes.write_stop_bit_signed(*id);
                }
            }
            self.write_value(value)?;
        }
        Ok(())
    }
}

impl MappingOut for BinaryWire {
    fn field(&mut self, name: &str) -> WireResult<&mut dyn ValueOut> {
        self.write_field_name(name);
        Ok(self)
    }
}

impl Wire for BinaryWire {
    fn dialect(&self) -> Dialect {
        Dialect::Binary
    }

    fn bytes(&mut self) -> &mut ElasticBytes {
        &mut self.bytes
    }

    fn bytes_ref(&self) -> &ElasticBytes {
        &self.bytes
    }

    fn framer(&mut self) -> &mut FramerState {
        &mut self.framer
    }

    fn framer_ref(&self) -> &FramerState {
        &self.framer
    }

    fn class_lookup(&self) -> Arc<ClassLookup> {
        Arc::clone(&self.lookup)
    }

    fn set_class_lookup(&mut self, lookup: Arc<ClassLookup>) {
        self.lookup = lookup;
    }

    fn use_padding(&mut self, on: bool) {
        self.framer.padding = on;
    }

    fn write_event_name(&mut self, name: &str) -> WireResult<&mut dyn ValueOut> {
        self.write_field_name(name);
        Ok(self)
    }

    fn write_event_id(&mut self, id: i64, _name: &str) -> WireResult<&mut dyn ValueOut> {
        self.bytes.write_u8(EVENT_ID);
        self.bytes.write_stop_bit_signed(id);
        Ok(self)
    }

    fn begin_write_document(&mut self) {
        self.pending_type = None;
    }

    fn end_write_document(&mut self) {
        self.pending_type = None;
    }

    fn begin_read_document(&mut self, start: u64, len: u64) -> WireResult<()> {
        let payload = self.parse_payload(start, len)?;
        self.input.load(payload);
        Ok(())
    }

    fn end_read_document(&mut self) {
        self.input.clear();
    }

    fn value_in(&mut self) -> &mut ValueIn {
        &mut self.input
    }

    fn reset(&mut self) {
        self.bytes.clear();
        let padding = self.framer.padding;
        self.framer = FramerState::default();
        self.framer.padding = padding;
        self.input.clear();
        self.pending_type = None;
    }

    fn reset_read(&mut self) {
        self.bytes.set_read_position(0);
        self.bytes.clear_read_limit();
        self.input.clear();
        self.framer.read_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ReadingDocument, WritingDocument};
    use crate::wire::EventKey;

    #[test]
    fn test_small_int_is_one_byte() {
        let mut wire = BinaryWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        doc.wire().write_i32(17).unwrap();
        doc.close().unwrap();

        // 4-byte header, then the value as its own tag.
        assert_eq!(wire.bytes_ref().as_slice().len(), 5);
        assert_eq!(wire.bytes_ref().as_slice()[4], 0x11);
    }

    #[test]
    fn test_fixed_width_ints() {
        let mut wire = BinaryWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        doc.wire().write_i64(-5).unwrap();
        doc.close().unwrap();

        wire.reset_read();
        let mut doc = ReadingDocument::next(&mut wire).unwrap();
        assert_eq!(doc.wire().value_in().read_i64().unwrap(), -5);
    }

    #[test]
    fn test_event_id_key() {
        let mut wire = BinaryWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        doc.wire()
            .write_event_id(42, "ignored")
            .unwrap()
            .write_text("payload")
            .unwrap();
        doc.close().unwrap();

        wire.reset_read();
        let mut doc = ReadingDocument::next(&mut wire).unwrap();
        assert_eq!(doc.wire().read_event(), Some(EventKey::Id(42)));
        assert_eq!(doc.wire().value_in().read_text().unwrap(), "payload");
    }

    #[test]
    fn test_long_text_roundtrip() {
        let long = "x".repeat(100);
        let mut wire = BinaryWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        doc.wire().write_text(&long).unwrap();
        doc.close().unwrap();

        wire.reset_read();
        let mut doc = ReadingDocument::next(&mut wire).unwrap();
        assert_eq!(doc.wire().value_in().read_text().unwrap(), long);
    }

    #[test]
    fn test_nested_value_roundtrip() {
        let original = WireValue::Mapping(vec![
            (MapKey::from("id"), WireValue::int(7)),
            (
                MapKey::from("tags"),
                WireValue::Sequence(vec![
                    WireValue::text("alpha"),
                    WireValue::Bool(false),
                    WireValue::Null,
                ]),
            ),
            (
                MapKey::from("pos"),
                WireValue::TypedObject {
                    alias: "Point".into(),
                    fields: vec![
                        (MapKey::from("x"), WireValue::F64(1.5)),
                        (MapKey::from("y"), WireValue::int(-300)),
                    ],
                },
            ),
        ]);

        let mut wire = BinaryWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        doc.wire().write_value(&original).unwrap();
        doc.close().unwrap();

        wire.reset_read();
        let mut doc = ReadingDocument::next(&mut wire).unwrap();
        let mut entries = Vec::new();
        loop {
            match doc.wire().read_event() {
                Some(EventKey::Name(name)) => {
                    let value = doc.wire().value_in().read_value().unwrap();
                    entries.push((MapKey::Name(name), value));
                }
                Some(EventKey::Id(id)) => {
                    let value = doc.wire().value_in().read_value().unwrap();
                    entries.push((MapKey::Id(id), value));
                }
                None => break,
            }
        }
        assert_eq!(WireValue::Mapping(entries), original);
    }

    #[test]
    fn test_unknown_tag_is_protocol_error() {
        let mut wire = BinaryWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        doc.wire().write_i32(1).unwrap();
        doc.close().unwrap();
        // Corrupt the payload tag.
        let end = wire.bytes_ref().write_position();
        wire.bytes().truncate_writes(end - 1);
        wire.bytes().write_u8(0xEE);

        wire.reset_read();
        let err = match ReadingDocument::next(&mut wire) {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert!(err.is_protocol());
    }

    #[test]
    fn test_timestamp_native() {
        let mut wire = BinaryWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        doc.wire().write_timestamp_nanos(123_456_789).unwrap();
        doc.close().unwrap();

        wire.reset_read();
        let mut doc = ReadingDocument::next(&mut wire).unwrap();
        assert_eq!(
            doc.wire().value_in().read_timestamp_nanos().unwrap(),
            123_456_789
        );
    }
}
