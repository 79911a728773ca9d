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

//! The canonical JSON dialect.
//!
//! Strictly valid JSON: keys always quoted, raw text requoted, one
//! document per line when dumped to characters. Type tags appear as an
//! `"@type"` member when verbose types are on. Byte blobs use the same
//! `!!binary <base64>` token as the text dialect, carried in a JSON
//! string. Parsing goes through `serde_json` with key order preserved,
//! because mappings are ordered.

use crate::buffer::ElasticBytes;
use crate::document::FramerState;
use crate::error::{ProtocolError, WireResult};
use crate::marshal::{format_timestamp_nanos, ClassLookup, LongConverter, Marshallable};
use crate::value::{IntWidth, MapKey, WireValue};
use crate::wire::input::DocPayload;
use crate::wire::{Dialect, MappingOut, ValueIn, ValueOut, Wire};
use base64::Engine;
use std::sync::Arc;

const TYPE_MEMBER: &str = "@type";
const BINARY_PREFIX: &str = "!!binary ";

#[derive(Debug, Clone, Copy)]
enum Ctx {
    /// Inside an object; tracks member separators.
    Object { first: bool },
    /// Inside an array; tracks element separators.
    Array { first: bool },
}

/// JSON dialect wire.
pub struct JsonWire {
    bytes: ElasticBytes,
    framer: FramerState,
    lookup: Arc<ClassLookup>,
    input: ValueIn,
    ctx: Vec<Ctx>,
    /// `Some(first)` once the implicit event object has opened.
    root: Option<bool>,
    pending_type: Option<String>,
}

impl Default for JsonWire {
    fn default() -> Self {
        Self::with_bytes(ElasticBytes::new())
    }
}

impl JsonWire {
    /// A JSON wire over the given buffer.
    #[must_use]
    pub fn with_bytes(bytes: ElasticBytes) -> Self {
        Self {
            bytes,
            framer: FramerState::default(),
            lookup: ClassLookup::global(),
            input: ValueIn::default(),
            ctx: Vec::new(),
            root: None,
            pending_type: None,
        }
    }

    /// Emits the element separator when inside an array.
    fn begin_token(&mut self) {
        if let Some(Ctx::Array { first }) = self.ctx.last_mut() {
            if *first {
                *first = false;
            } else {
                self.bytes.append(",");
            }
        }
    }

    fn append_quoted(&mut self, text: &str) {
        let mut quoted = String::with_capacity(text.len() + 2);
        quote_json_into(text, &mut quoted);
        self.bytes.append(&quoted);
    }

    fn scalar(&mut self, token: &str) -> WireResult<()> {
        self.begin_token();
        self.bytes.append(token);
        Ok(())
    }

    fn member_separator(&mut self) {
        match self.ctx.last_mut() {
            Some(Ctx::Object { first }) => {
                if *first {
                    *first = false;
                } else {
                    self.bytes.append(",");
                }
            }
            _ => {
                if let Some(first) = self.root.as_mut() {
                    if *first {
                        *first = false;
                    } else {
                        self.bytes.append(",");
                    }
                }
            }
        }
    }

    fn write_entries(&mut self, entries: &[(MapKey, WireValue)]) -> WireResult<()> {
        for (key, value) in entries {
            let name = match key {
                MapKey::Name(name) => name.clone(),
                MapKey::Id(id) => id.to_string(),
            };
            self.field(&name)?;
            self.write_value(value)?;
        }
        Ok(())
    }

    fn parse_payload(&self, start: u64, len: u64) -> WireResult<DocPayload> {
        let slice = &self.bytes.as_slice()[start as usize..(start + len) as usize];
        let text = std::str::from_utf8(slice).map_err(ProtocolError::Utf8)?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(DocPayload::Events(Vec::new()));
        }
        let json: serde_json::Value = serde_json::from_str(trimmed)?;
        Ok(match from_json(json)? {
            // A plain object is an event mapping; a typed object (the
            // @type member) is one value spanning the whole document.
            WireValue::Mapping(entries) => DocPayload::Events(entries),
            other => DocPayload::Scalar(other),
        })
    }
}

fn from_json(json: serde_json::Value) -> WireResult<WireValue> {
    Ok(match json {
        serde_json::Value::Null => WireValue::Null,
        serde_json::Value::Bool(b) => WireValue::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(value) = n.as_i64() {
                WireValue::Int {
                    value,
                    width: IntWidth::fitting(value),
                }
            } else if let Some(value) = n.as_f64() {
                WireValue::F64(value)
            } else {
                return Err(ProtocolError::TypeMismatch {
                    expected: "representable number",
                    found: n.to_string(),
                }
                .into());
            }
        }
        serde_json::Value::String(s) => {
            if let Some(encoded) = s.strip_prefix(BINARY_PREFIX) {
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|e| ProtocolError::TypeMismatch {
                        expected: "base64 blob",
                        found: e.to_string(),
                    })?;
                WireValue::Bytes(decoded)
            } else {
                WireValue::Text(s)
            }
        }
        serde_json::Value::Array(elements) => {
            let mut sequence = Vec::with_capacity(elements.len());
            for element in elements {
                sequence.push(from_json(element)?);
            }
            WireValue::Sequence(sequence)
        }
        serde_json::Value::Object(members) => {
            let mut alias = None;
            let mut entries = Vec::with_capacity(members.len());
            for (name, value) in members {
                if name == TYPE_MEMBER {
                    if let serde_json::Value::String(tag) = value {
                        alias = Some(tag);
                        continue;
                    }
                }
                entries.push((MapKey::Name(name), from_json(value)?));
            }
            match alias {
                Some(alias) => WireValue::TypedObject {
                    alias,
                    fields: entries,
                },
                None => WireValue::Mapping(entries),
            }
        }
    })
}

fn float_token(value: f64) -> String {
    // JSON has no NaN/Infinity literal; null is the conventional spill.
    if value.is_nan() || value.is_infinite() {
        return "null".to_owned();
    }
    let mut token = format!("{}", value);
    if !token.contains('.') && !token.contains('e') && !token.contains('E') {
        token.push_str(".0");
    }
    token
}

impl ValueOut for JsonWire {
    fn write_null(&mut self) -> WireResult<()> {
        self.scalar("null")
    }

    fn write_bool(&mut self, value: bool) -> WireResult<()> {
        self.scalar(if value { "true" } else { "false" })
    }

    fn write_i8(&mut self, value: i8) -> WireResult<()> {
        self.scalar(&value.to_string())
    }

    fn write_i16(&mut self, value: i16) -> WireResult<()> {
        self.scalar(&value.to_string())
    }

    fn write_i32(&mut self, value: i32) -> WireResult<()> {
        self.scalar(&value.to_string())
    }

    fn write_i64(&mut self, value: i64) -> WireResult<()> {
        self.scalar(&value.to_string())
    }

    fn write_f32(&mut self, value: f32) -> WireResult<()> {
        self.scalar(&float_token(f64::from(value)))
    }

    fn write_f64(&mut self, value: f64) -> WireResult<()> {
        self.scalar(&float_token(value))
    }

    fn write_text(&mut self, text: &str) -> WireResult<()> {
        self.begin_token();
        self.append_quoted(text);
        Ok(())
    }

    fn write_raw_text(&mut self, text: &str) -> WireResult<()> {
        // Raw text is requoted: the output must stay valid JSON.
        self.write_text(text)
    }

    fn write_bytes_blob(&mut self, bytes: &[u8]) -> WireResult<()> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        self.write_text(&format!("{}{}", BINARY_PREFIX, encoded))
    }

    fn write_timestamp_nanos(&mut self, nanos: i64) -> WireResult<()> {
        let token = format_timestamp_nanos(nanos)?;
        self.write_text(&token)
    }

    fn write_type_prefix(&mut self, alias: &str) -> WireResult<()> {
        self.pending_type = Some(alias.to_owned());
        Ok(())
    }

    fn write_marshallable(&mut self, value: &dyn Marshallable) -> WireResult<()> {
        let alias = self.pending_type.take();
        self.begin_token();
        self.bytes.append("{");
        self.ctx.push(Ctx::Object { first: true });
        if let Some(alias) = alias {
            self.member_separator();
            self.append_quoted(TYPE_MEMBER);
            self.bytes.append(":");
            self.append_quoted(&alias);
        }
        value.write_fields(self)?;
        self.ctx.pop();
        self.bytes.append("}");
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
        converter: &dyn LongConverter,
    ) -> WireResult<()> {
        let mut token = String::new();
        converter.append(value, &mut token)?;
        self.write_text(&token)
    }

    fn write_sequence(
        &mut self,
        items: &mut dyn FnMut(&mut dyn ValueOut) -> WireResult<()>,
    ) -> WireResult<()> {
        self.begin_token();
        self.bytes.append("[");
        self.ctx.push(Ctx::Array { first: true });
        items(self)?;
        self.ctx.pop();
        self.bytes.append("]");
        Ok(())
    }

    fn write_value(&mut self, value: &WireValue) -> WireResult<()> {
        match value {
            WireValue::Null => self.write_null(),
            WireValue::Bool(b) => self.write_bool(*b),
            WireValue::Int { value, .. } => self.write_i64(*value),
            WireValue::F32(f) => self.write_f32(*f),
            WireValue::F64(f) => self.write_f64(*f),
            WireValue::Text(s) => self.write_text(s),
            WireValue::RawText(s) => self.write_raw_text(s),
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
                let entries = entries.clone();
                self.begin_token();
                self.bytes.append("{");
                self.ctx.push(Ctx::Object { first: true });
                self.write_entries(&entries)?;
                self.ctx.pop();
                self.bytes.append("}");
                Ok(())
            }
            WireValue::TypedObject { alias, fields } => {
                let alias = alias.clone();
                let fields = fields.clone();
                self.begin_token();
                self.bytes.append("{");
                self.ctx.push(Ctx::Object { first: true });
                self.member_separator();
                self.append_quoted(TYPE_MEMBER);
                self.bytes.append(":");
                self.append_quoted(&alias);
                self.write_entries(&fields)?;
                self.ctx.pop();
                self.bytes.append("}");
                Ok(())
            }
        }
    }
}

impl MappingOut for JsonWire {
    fn field(&mut self, name: &str) -> WireResult<&mut dyn ValueOut> {
        self.member_separator();
        self.append_quoted(name);
        self.bytes.append(":");
        Ok(self)
    }
}

impl Wire for JsonWire {
    fn dialect(&self) -> Dialect {
        Dialect::Json
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

    fn padding_byte(&self) -> u8 {
        b'\n'
    }

    fn write_event_name(&mut self, name: &str) -> WireResult<&mut dyn ValueOut> {
        if self.root.is_none() {
            self.bytes.append("{");
            self.root = Some(true);
        }
        self.member_separator();
        self.append_quoted(name);
        self.bytes.append(":");
        Ok(self)
    }

    fn write_event_id(&mut self, _id: i64, name: &str) -> WireResult<&mut dyn ValueOut> {
        self.write_event_name(name)
    }

    fn begin_write_document(&mut self) {
        self.ctx.clear();
        self.root = None;
        self.pending_type = None;
    }

    fn end_write_document(&mut self) {
        if self.root.take().is_some() {
            self.bytes.append("}");
        }
        self.ctx.clear();
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
        self.ctx.clear();
        self.root = None;
        self.pending_type = None;
    }

    fn reset_read(&mut self) {
        self.bytes.set_read_position(0);
        self.bytes.clear_read_limit();
        self.input.clear();
        self.framer.read_index = 0;
    }
}

pub(crate) fn quote_json_into(text: &str, out: &mut String) {
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ReadingDocument, WritingDocument};
    use crate::wire::EventKey;

    fn payload_text(wire: &JsonWire) -> String {
        String::from_utf8_lossy(&wire.bytes_ref().as_slice()[4..]).into_owned()
    }

    #[test]
    fn test_event_object_shape() {
        let mut wire = JsonWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        doc.wire()
            .write_event_name("say")
            .unwrap()
            .write_text("hello")
            .unwrap();
        doc.wire()
            .write_event_name("count")
            .unwrap()
            .write_i32(3)
            .unwrap();
        doc.close().unwrap();

        assert_eq!(payload_text(&wire), "{\"say\":\"hello\",\"count\":3}");
    }

    #[test]
    fn test_event_roundtrip() {
        let mut wire = JsonWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        doc.wire()
            .write_event_name("say")
            .unwrap()
            .write_text("hello")
            .unwrap();
        doc.close().unwrap();

        wire.reset_read();
        let mut doc = ReadingDocument::next(&mut wire).unwrap();
        assert!(doc.is_present());
        assert_eq!(doc.wire().read_event(), Some(EventKey::Name("say".into())));
        assert_eq!(doc.wire().value_in().read_text().unwrap(), "hello");
    }

    #[test]
    fn test_raw_text_is_requoted() {
        let mut wire = JsonWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        doc.wire()
            .write_event_name("raw")
            .unwrap()
            .write_raw_text("not \"json\"")
            .unwrap();
        doc.close().unwrap();

        assert_eq!(payload_text(&wire), "{\"raw\":\"not \\\"json\\\"\"}");
    }

    #[test]
    fn test_blob_roundtrip() {
        let mut wire = JsonWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        doc.wire()
            .write_event_name("blob")
            .unwrap()
            .write_bytes_blob(&[1, 2, 3, 255])
            .unwrap();
        doc.close().unwrap();

        wire.reset_read();
        let mut doc = ReadingDocument::next(&mut wire).unwrap();
        doc.wire().read_event();
        assert_eq!(
            doc.wire().value_in().read_bytes_blob().unwrap(),
            vec![1, 2, 3, 255]
        );
    }

    #[test]
    fn test_typed_object_member() {
        let value = WireValue::TypedObject {
            alias: "Point".into(),
            fields: vec![
                (MapKey::from("x"), WireValue::int(1)),
                (MapKey::from("y"), WireValue::int(2)),
            ],
        };
        let mut wire = JsonWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        doc.wire().write_value(&value).unwrap();
        doc.close().unwrap();

        assert_eq!(
            payload_text(&wire),
            "{\"@type\":\"Point\",\"x\":1,\"y\":2}"
        );

        wire.reset_read();
        let mut doc = ReadingDocument::next(&mut wire).unwrap();
        // A typed object payload reads back as a scalar typed value, not
        // as events: the @type member marks the whole document.
        assert!(doc.is_present());
        let read = doc.wire().value_in().read_value().unwrap();
        assert_eq!(read, value);
    }

    #[test]
    fn test_key_order_preserved() {
        let mut wire = JsonWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        for key in ["zulu", "alpha", "mike"] {
            doc.wire().write_event_name(key).unwrap().write_i32(1).unwrap();
        }
        doc.close().unwrap();

        wire.reset_read();
        let mut doc = ReadingDocument::next(&mut wire).unwrap();
        let mut keys = Vec::new();
        while let Some(EventKey::Name(name)) = doc.wire().read_event() {
            keys.push(name);
            doc.wire().value_in().skip_value().unwrap();
        }
        assert_eq!(keys, vec!["zulu", "alpha", "mike"]);
    }
}
