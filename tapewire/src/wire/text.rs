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

//! The human-readable text dialect.
//!
//! Mapping entries are `key: value` lines with two-space indented block
//! nesting. Sequences use the flow form `[a, b, c]`, falling back to
//! `- item` block lines when an element is itself a mapping. Strings stay
//! unquoted when identifier-like, otherwise double-quoted with `\\`,
//! `\"`, `\n`, `\t` and `\u00NN` escapes. Type-prefixed objects render as
//! `!Alias { field: value }`. Comments run from `#` to end of line and
//! are stripped when parsing. Blobs render as `!!binary <base64>`.
//!
//! Documents are padded to 4-byte boundaries with trailing newlines by
//! default, which every text reader ignores.

use crate::buffer::ElasticBytes;
use crate::document::FramerState;
use crate::error::{ProtocolError, WireResult};
use crate::marshal::{format_timestamp_nanos, ClassLookup, LongConverter, Marshallable};
use crate::value::{IntWidth, MapKey, WireValue};
use crate::wire::input::DocPayload;
use crate::wire::{Dialect, MappingOut, ValueIn, ValueOut, Wire};
use base64::Engine;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
enum Ctx {
    /// Document top level: values sit on their own lines.
    Doc,
    /// A key has been emitted; the value completes the line.
    AfterKey { indent: usize },
    /// Writing block-mapping entries at this indent.
    Block { indent: usize },
    /// A block mapping announced but with no entry emitted yet.
    PendingBlock { indent: usize },
    /// Inside `[...]` or `{...}`.
    Flow { first: bool, map: bool },
    /// A key emitted inside a flow mapping; the value stays inline.
    FlowKey,
}

/// Text dialect wire.
///
/// # Examples
///
/// ```rust
/// use tapewire::document::WritingDocument;
/// use tapewire::wire::{TextWire, Wire};
///
/// # fn example() -> tapewire::WireResult<()> {
/// let mut wire = TextWire::default();
/// let mut doc = WritingDocument::acquire(&mut wire, false)?;
/// doc.wire().write_event_name("say")?.write_text("hello world")?;
/// doc.close()?;
/// # Ok(())
/// # }
/// ```
pub struct TextWire {
    bytes: ElasticBytes,
    framer: FramerState,
    lookup: Arc<ClassLookup>,
    input: ValueIn,
    ctx: Vec<Ctx>,
    pending_type: Option<String>,
}

impl Default for TextWire {
    fn default() -> Self {
        Self::with_bytes(ElasticBytes::new())
    }
}

impl TextWire {
    /// A text wire over the given buffer, padding enabled.
    #[must_use]
    pub fn with_bytes(bytes: ElasticBytes) -> Self {
        let mut framer = FramerState::default();
        framer.padding = true;
        Self {
            bytes,
            framer,
            lookup: ClassLookup::global(),
            input: ValueIn::default(),
            ctx: Vec::new(),
            pending_type: None,
        }
    }

    fn top(&self) -> Ctx {
        self.ctx.last().copied().unwrap_or(Ctx::Doc)
    }

    /// Positions the cursor for an inline value token.
    fn begin_token(&mut self) {
        match self.top() {
            Ctx::Doc | Ctx::Block { .. } | Ctx::PendingBlock { .. } => {}
            Ctx::AfterKey { .. } | Ctx::FlowKey => self.bytes.append(" "),
            Ctx::Flow { first, map } => {
                if first {
                    if map {
                        self.bytes.append(" ");
                    }
                    if let Some(Ctx::Flow { first, .. }) = self.ctx.last_mut() {
                        *first = false;
                    }
                } else {
                    self.bytes.append(", ");
                }
            }
        }
    }

    /// Completes the value: line contexts terminate the line.
    fn end_token(&mut self) {
        match self.top() {
            Ctx::Doc => self.bytes.append("\n"),
            Ctx::AfterKey { .. } => {
                self.bytes.append("\n");
                self.ctx.pop();
            }
            Ctx::FlowKey => {
                self.ctx.pop();
            }
            _ => {}
        }
    }

    fn scalar(&mut self, token: &str) -> WireResult<()> {
        self.begin_token();
        self.bytes.append(token);
        self.end_token();
        Ok(())
    }

    fn write_key(&mut self, name: &str) {
        if needs_quotes(name) {
            let mut quoted = String::with_capacity(name.len() + 2);
            quote_into(name, &mut quoted);
            self.bytes.append(&quoted);
        } else {
            self.bytes.append(name);
        }
        self.bytes.append(":");
    }

    /// `true` while an inline (flow) rendering is required.
    fn in_flow(&self) -> bool {
        matches!(self.top(), Ctx::Flow { .. })
    }

    fn write_flow_mapping(
        &mut self,
        alias: Option<&str>,
        fields: &mut dyn FnMut(&mut TextWire) -> WireResult<()>,
    ) -> WireResult<()> {
        self.begin_token();
        if let Some(alias) = alias {
            self.bytes.append("!");
            self.bytes.append(alias);
            self.bytes.append(" ");
        }
        self.bytes.append("{");
        self.ctx.push(Ctx::Flow {
            first: true,
            map: true,
        });
        fields(self)?;
        let empty = matches!(self.ctx.pop(), Some(Ctx::Flow { first: true, .. }));
        self.bytes.append(if empty { "}" } else { " }" });
        self.end_token();
        Ok(())
    }

    fn write_block_mapping(
        &mut self,
        fields: &mut dyn FnMut(&mut TextWire) -> WireResult<()>,
    ) -> WireResult<()> {
        match self.top() {
            Ctx::Doc => {
                self.ctx.push(Ctx::Block { indent: 0 });
                fields(self)?;
                self.ctx.pop();
            }
            Ctx::AfterKey { indent } => {
                self.ctx.pop();
                self.ctx.push(Ctx::PendingBlock { indent: indent + 1 });
                fields(self)?;
                if matches!(self.ctx.pop(), Some(Ctx::PendingBlock { .. })) {
                    // No entries were written; an empty flow mapping
                    // keeps the entry distinguishable from null.
                    self.bytes.append(" {}\n");
                }
            }
            _ => return self.write_flow_mapping(None, fields),
        }
        Ok(())
    }

    fn write_mapping_value(
        &mut self,
        alias: Option<&str>,
        fields: &mut dyn FnMut(&mut TextWire) -> WireResult<()>,
    ) -> WireResult<()> {
        if alias.is_some() || self.in_flow() {
            self.write_flow_mapping(alias, fields)
        } else {
            self.write_block_mapping(fields)
        }
    }

    fn write_block_sequence(&mut self, elements: &[WireValue]) -> WireResult<()> {
        let indent = match self.top() {
            Ctx::AfterKey { indent } => {
                self.ctx.pop();
                self.bytes.append("\n");
                indent + 1
            }
            _ => 0,
        };
        for element in elements {
            for _ in 0..indent {
                self.bytes.append("  ");
            }
            self.bytes.append("-");
            self.ctx.push(Ctx::AfterKey { indent });
            self.write_element(element)?;
        }
        Ok(())
    }

    /// Writes a sequence element; mappings stay inline so each element
    /// occupies one `- item` line.
    fn write_element(&mut self, element: &WireValue) -> WireResult<()> {
        match element {
            WireValue::Mapping(entries) => {
                let entries = entries.clone();
                self.write_flow_mapping(None, &mut |wire| wire.write_entries(&entries))
            }
            WireValue::TypedObject { alias, fields } => {
                let alias = alias.clone();
                let fields = fields.clone();
                self.write_flow_mapping(Some(&alias), &mut |wire| wire.write_entries(&fields))
            }
            other => self.write_value(other),
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
        parse_document(text)
    }
}

fn float_token(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    let mut token = format!("{}", value);
    if !token.contains('.') && !token.contains('e') && !token.contains('E') {
        token.push_str(".0");
    }
    token
}

impl ValueOut for TextWire {
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
        if needs_quotes(text) {
            let mut quoted = String::with_capacity(text.len() + 2);
            quote_into(text, &mut quoted);
            self.scalar(&quoted)
        } else {
            self.scalar(text)
        }
    }

    fn write_raw_text(&mut self, text: &str) -> WireResult<()> {
        self.scalar(text)
    }

    fn write_bytes_blob(&mut self, bytes: &[u8]) -> WireResult<()> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        self.scalar(&format!("!!binary {}", encoded))
    }

    fn write_timestamp_nanos(&mut self, nanos: i64) -> WireResult<()> {
        let token = format_timestamp_nanos(nanos)?;
        self.scalar(&token)
    }

    fn write_type_prefix(&mut self, alias: &str) -> WireResult<()> {
        self.pending_type = Some(alias.to_owned());
        Ok(())
    }

    fn write_marshallable(&mut self, value: &dyn Marshallable) -> WireResult<()> {
        let alias = self.pending_type.take();
        self.write_mapping_value(alias.as_deref(), &mut |wire| {
            value.write_fields(wire)
        })
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
        self.ctx.push(Ctx::Flow {
            first: true,
            map: false,
        });
        items(self)?;
        self.ctx.pop();
        self.bytes.append("]");
        self.end_token();
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
            WireValue::Mapping(entries) => {
                let entries = entries.clone();
                self.write_mapping_value(None, &mut |wire| wire.write_entries(&entries))
            }
            WireValue::TypedObject { alias, fields } => {
                let alias = alias.clone();
                let fields = fields.clone();
                self.write_mapping_value(Some(&alias), &mut |wire| wire.write_entries(&fields))
            }
            WireValue::Sequence(elements) => {
                let block = !self.in_flow()
                    && elements.iter().any(|e| {
                        matches!(e, WireValue::Mapping(_) | WireValue::TypedObject { .. })
                    });
                if block {
                    self.write_block_sequence(elements)
                } else {
                    let elements = elements.clone();
                    self.write_sequence(&mut |out| {
                        for element in &elements {
                            out.write_value(element)?;
                        }
                        Ok(())
                    })
                }
            }
        }
    }
}

impl MappingOut for TextWire {
    fn field(&mut self, name: &str) -> WireResult<&mut dyn ValueOut> {
        match self.top() {
            Ctx::PendingBlock { indent } => {
                self.ctx.pop();
                self.bytes.append("\n");
                self.ctx.push(Ctx::Block { indent });
                for _ in 0..indent {
                    self.bytes.append("  ");
                }
                self.write_key(name);
                self.ctx.push(Ctx::AfterKey { indent });
            }
            Ctx::Block { indent } => {
                for _ in 0..indent {
                    self.bytes.append("  ");
                }
                self.write_key(name);
                self.ctx.push(Ctx::AfterKey { indent });
            }
            Ctx::Flow { first, .. } => {
                self.bytes.append(if first { " " } else { ", " });
                if let Some(Ctx::Flow { first, .. }) = self.ctx.last_mut() {
                    *first = false;
                }
                self.write_key(name);
                self.ctx.push(Ctx::FlowKey);
            }
            Ctx::Doc | Ctx::AfterKey { .. } | Ctx::FlowKey => {
                self.write_key(name);
                self.ctx.push(Ctx::AfterKey { indent: 0 });
            }
        }
        Ok(self)
    }
}

impl Wire for TextWire {
    fn dialect(&self) -> Dialect {
        Dialect::Text
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
        self.write_key(name);
        self.ctx.push(Ctx::AfterKey { indent: 0 });
        Ok(self)
    }

    fn write_event_id(&mut self, _id: i64, name: &str) -> WireResult<&mut dyn ValueOut> {
        // Ids are a binary-dialect economy; text keeps the name.
        self.write_event_name(name)
    }

    fn begin_write_document(&mut self) {
        self.ctx.clear();
        self.pending_type = None;
    }

    fn end_write_document(&mut self) {
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
        self.framer = {
            let mut framer = FramerState::default();
            framer.padding = self.framer.padding;
            framer
        };
        self.input.clear();
        self.ctx.clear();
        self.pending_type = None;
    }

    fn reset_read(&mut self) {
        self.bytes.set_read_position(0);
        self.bytes.clear_read_limit();
        self.input.clear();
        self.framer.read_index = 0;
    }
}

// ---------------------------------------------------------------------
// Quoting
// ---------------------------------------------------------------------

fn is_identifier_like(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

fn parses_as_non_text(text: &str) -> bool {
    matches!(text, "true" | "false" | "null" | "NaN" | "Infinity")
        || text.parse::<i64>().is_ok()
        || text.parse::<f64>().is_ok()
}

pub(crate) fn needs_quotes(text: &str) -> bool {
    text.is_empty() || !is_identifier_like(text) || parses_as_non_text(text)
}

pub(crate) fn quote_into(text: &str, out: &mut String) {
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

// ---------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------

struct Line<'a> {
    indent: usize,
    content: &'a str,
    number: usize,
}

fn syntax(line: usize, message: impl Into<String>) -> crate::error::WireError {
    ProtocolError::Syntax {
        line,
        message: message.into(),
    }
    .into()
}

fn strip_comment(raw: &str) -> &str {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in raw.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => {
                let head = &raw[..i];
                if head.trim().is_empty() || head.ends_with(' ') {
                    return head;
                }
            }
            _ => {}
        }
    }
    raw
}

fn logical_lines(text: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    for (number, raw) in text.lines().enumerate() {
        let stripped = strip_comment(raw);
        let trimmed = stripped.trim_end();
        let content = trimmed.trim_start();
        if content.is_empty() {
            continue;
        }
        let indent_chars = trimmed.len() - content.len();
        lines.push(Line {
            indent: indent_chars / 2,
            content,
            number: number + 1,
        });
    }
    lines
}

/// Splits a `key:` or `key: value` line. Returns `None` for value lines.
fn split_key(content: &str) -> Option<(String, &str)> {
    if let Some(rest) = content.strip_prefix('"') {
        let (key, after) = take_quoted(rest)?;
        let after = after.strip_prefix(':')?;
        return Some((key, after.trim_start()));
    }
    let colon = content.find(':')?;
    let key = &content[..colon];
    if !is_identifier_like(key) {
        return None;
    }
    let rest = &content[colon + 1..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some((key.to_owned(), rest.trim_start()))
}

/// Parses a quoted string body (after the opening quote); returns the
/// unescaped content and the remainder after the closing quote.
fn take_quoted(body: &str) -> Option<(String, &str)> {
    let mut out = String::new();
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((out, &body[i + 1..])),
            '\\' => match chars.next()?.1 {
                '\\' => out.push('\\'),
                '"' => out.push('"'),
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'u' => {
                    let start = i + 2;
                    let hex = body.get(start..start + 4)?;
                    let code = u32::from_str_radix(hex, 16).ok()?;
                    out.push(char::from_u32(code)?);
                    for _ in 0..4 {
                        chars.next();
                    }
                }
                _ => return None,
            },
            c => out.push(c),
        }
    }
    None
}

pub(crate) fn parse_document(text: &str) -> WireResult<DocPayload> {
    let lines = logical_lines(text);
    if lines.is_empty() {
        return Ok(DocPayload::Events(Vec::new()));
    }
    if split_key(lines[0].content).is_some() && !lines[0].content.starts_with('[') {
        let mut pos = 0;
        let entries = parse_block_mapping(&lines, &mut pos, 0)?;
        return Ok(DocPayload::Events(entries));
    }
    if lines[0].content == "-" || lines[0].content.starts_with("- ") {
        let mut pos = 0;
        let elements = parse_block_sequence(&lines, &mut pos, 0)?;
        return Ok(DocPayload::Scalar(WireValue::Sequence(elements)));
    }
    let value = parse_inline(lines[0].content, lines[0].number)?;
    Ok(DocPayload::Scalar(value))
}

fn parse_block_mapping(
    lines: &[Line<'_>],
    pos: &mut usize,
    indent: usize,
) -> WireResult<Vec<(MapKey, WireValue)>> {
    let mut entries = Vec::new();
    while *pos < lines.len() {
        let line = &lines[*pos];
        if line.indent != indent {
            break;
        }
        let Some((key, rest)) = split_key(line.content) else {
            break;
        };
        *pos += 1;
        let value = if rest.is_empty() {
            parse_nested(lines, pos, indent, line.number)?
        } else {
            parse_inline(rest, line.number)?
        };
        entries.push((MapKey::Name(key), value));
    }
    Ok(entries)
}

/// A key with no inline value: either a deeper block follows, or null.
fn parse_nested(
    lines: &[Line<'_>],
    pos: &mut usize,
    indent: usize,
    number: usize,
) -> WireResult<WireValue> {
    if *pos >= lines.len() || lines[*pos].indent <= indent {
        return Ok(WireValue::Null);
    }
    let child_indent = lines[*pos].indent;
    let first = lines[*pos].content;
    if first == "-" || first.starts_with("- ") {
        let elements = parse_block_sequence(lines, pos, child_indent)?;
        return Ok(WireValue::Sequence(elements));
    }
    if split_key(first).is_some() {
        let entries = parse_block_mapping(lines, pos, child_indent)?;
        return Ok(WireValue::Mapping(entries));
    }
    Err(syntax(number, "expected a nested mapping or sequence"))
}

fn parse_block_sequence(
    lines: &[Line<'_>],
    pos: &mut usize,
    indent: usize,
) -> WireResult<Vec<WireValue>> {
    let mut elements = Vec::new();
    while *pos < lines.len() {
        let line = &lines[*pos];
        if line.indent != indent || !(line.content == "-" || line.content.starts_with("- ")) {
            break;
        }
        *pos += 1;
        let rest = line.content[1..].trim_start();
        if rest.is_empty() {
            elements.push(WireValue::Null);
        } else if let Some((key, value_text)) = split_key(rest) {
            // `- key: value` compact single-entry mapping.
            let value = parse_inline(value_text, line.number)?;
            elements.push(WireValue::Mapping(vec![(MapKey::Name(key), value)]));
        } else {
            elements.push(parse_inline(rest, line.number)?);
        }
    }
    Ok(elements)
}

fn parse_inline(text: &str, number: usize) -> WireResult<WireValue> {
    let text = text.trim();
    if text.is_empty() || text == "null" {
        return Ok(WireValue::Null);
    }
    if let Some(body) = text.strip_prefix('"') {
        let (content, rest) = take_quoted(body)
            .ok_or_else(|| syntax(number, "unterminated quoted string"))?;
        if !rest.trim().is_empty() {
            return Err(syntax(number, "trailing characters after quoted string"));
        }
        return Ok(WireValue::Text(content));
    }
    if text.starts_with('[') {
        return parse_flow_sequence(text, number);
    }
    if text.starts_with('{') {
        return parse_flow_mapping(text, number).map(WireValue::Mapping);
    }
    if let Some(rest) = text.strip_prefix("!!binary") {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(rest.trim())
            .map_err(|e| syntax(number, format!("invalid base64 blob: {}", e)))?;
        return Ok(WireValue::Bytes(decoded));
    }
    if text.starts_with("!!null") {
        return Ok(WireValue::Null);
    }
    if let Some(tagged) = text.strip_prefix('!') {
        let (alias, rest) = match tagged.find(|c: char| c.is_whitespace()) {
            Some(split) => (&tagged[..split], tagged[split..].trim_start()),
            None => (tagged, ""),
        };
        let fields = if rest.is_empty() {
            Vec::new()
        } else {
            parse_flow_mapping(rest, number)?
        };
        return Ok(WireValue::TypedObject {
            alias: alias.to_owned(),
            fields,
        });
    }
    match text {
        "true" => return Ok(WireValue::Bool(true)),
        "false" => return Ok(WireValue::Bool(false)),
        "NaN" => return Ok(WireValue::F64(f64::NAN)),
        "Infinity" => return Ok(WireValue::F64(f64::INFINITY)),
        "-Infinity" => return Ok(WireValue::F64(f64::NEG_INFINITY)),
        _ => {}
    }
    if let Ok(value) = text.parse::<i64>() {
        return Ok(WireValue::Int {
            value,
            width: IntWidth::fitting(value),
        });
    }
    if looks_numeric(text) {
        if let Ok(value) = text.parse::<f64>() {
            return Ok(WireValue::F64(value));
        }
    }
    Ok(WireValue::Text(text.to_owned()))
}

fn looks_numeric(text: &str) -> bool {
    text.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+' || c == '.')
}

/// Splits flow content on top-level commas, respecting nesting and
/// quotes.
fn split_flow(body: &str, number: usize) -> WireResult<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0usize;
    for (i, c) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '[' | '{' if !in_quotes => depth += 1,
            ']' | '}' if !in_quotes => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| syntax(number, "unbalanced brackets"))?;
            }
            ',' if !in_quotes && depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 || in_quotes {
        return Err(syntax(number, "unterminated flow collection"));
    }
    parts.push(&body[start..]);
    Ok(parts)
}

fn parse_flow_sequence(text: &str, number: usize) -> WireResult<WireValue> {
    let body = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| syntax(number, "unterminated flow sequence"))?;
    if body.trim().is_empty() {
        return Ok(WireValue::Sequence(Vec::new()));
    }
    let mut elements = Vec::new();
    for part in split_flow(body, number)? {
        elements.push(parse_inline(part, number)?);
    }
    Ok(WireValue::Sequence(elements))
}

fn parse_flow_mapping(text: &str, number: usize) -> WireResult<Vec<(MapKey, WireValue)>> {
    let body = text
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .ok_or_else(|| syntax(number, "unterminated flow mapping"))?;
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    for part in split_flow(body, number)? {
        let part = part.trim();
        let (key, rest) = split_key(part)
            .ok_or_else(|| syntax(number, format!("expected key: value, found {:?}", part)))?;
        entries.push((MapKey::Name(key), parse_inline(rest, number)?));
    }
    Ok(entries)
}
