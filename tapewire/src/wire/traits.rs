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

//! Trait definitions shared by every wire dialect.
//!
//! A [`Wire`] pairs the logical value model with one physical encoding,
//! bound to an [`ElasticBytes`] buffer it borrows. The writing cursor is
//! the [`ValueOut`] supertrait (dialects implement it directly on the
//! wire struct); the reading cursor is the concrete [`ValueIn`] tree
//! cursor loaded when a document is opened for reading.

use crate::buffer::ElasticBytes;
use crate::document::FramerState;
use crate::error::WireResult;
use crate::marshal::{ClassLookup, LongConverter, Marshallable};
use crate::value::WireValue;
use crate::wire::ValueIn;
use std::sync::Arc;

/// The physical encoding of a wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Human-readable YAML-like text.
    Text,
    /// Strict JSON, one document per line when dumped to characters.
    Json,
    /// Compact tagged binary.
    Binary,
}

/// The key of an event record: a method name, or a numeric method id in
/// the binary dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKey {
    /// Textual event name.
    Name(String),
    /// Numeric event id.
    Id(i64),
}

/// Writing cursor over one wire dialect.
///
/// Object-safe: the method writer and marshallers drive it as
/// `&mut dyn ValueOut`. Every operation appends to the wire's buffer in
/// the dialect's physical form.
pub trait ValueOut {
    /// Writes an explicit null.
    fn write_null(&mut self) -> WireResult<()>;

    /// Writes a boolean.
    fn write_bool(&mut self, value: bool) -> WireResult<()>;

    /// Writes an 8-bit integer.
    fn write_i8(&mut self, value: i8) -> WireResult<()>;

    /// Writes a 16-bit integer.
    fn write_i16(&mut self, value: i16) -> WireResult<()>;

    /// Writes a 32-bit integer.
    fn write_i32(&mut self, value: i32) -> WireResult<()>;

    /// Writes a 64-bit integer.
    fn write_i64(&mut self, value: i64) -> WireResult<()>;

    /// Writes a 32-bit float.
    fn write_f32(&mut self, value: f32) -> WireResult<()>;

    /// Writes a 64-bit float.
    fn write_f64(&mut self, value: f64) -> WireResult<()>;

    /// Writes UTF-8 text, quoted as the dialect requires.
    fn write_text(&mut self, text: &str) -> WireResult<()>;

    /// Writes pre-encoded text verbatim in the character dialects; the
    /// binary dialect re-interprets it as ordinary text.
    fn write_raw_text(&mut self, text: &str) -> WireResult<()>;

    /// Writes a byte blob.
    fn write_bytes_blob(&mut self, bytes: &[u8]) -> WireResult<()>;

    /// Writes a nanosecond timestamp (ISO-8601 in character dialects).
    fn write_timestamp_nanos(&mut self, nanos: i64) -> WireResult<()>;

    /// Writes a type tag ahead of the next mapping.
    fn write_type_prefix(&mut self, alias: &str) -> WireResult<()>;

    /// Writes a marshallable as an untagged mapping of its fields.
    fn write_marshallable(&mut self, value: &dyn Marshallable) -> WireResult<()>;

    /// Writes a marshallable, tagging it with its registered alias when
    /// `verbose` demands self-describing output.
    fn write_object(&mut self, value: &dyn Marshallable, verbose: bool) -> WireResult<()>;

    /// Writes a 64-bit value through a textual converter: text form in
    /// character dialects, raw integer in binary.
    fn write_converted(
        &mut self,
        value: i64,
        converter: &dyn LongConverter,
    ) -> WireResult<()>;

    /// Writes a sequence; the closure writes each element in order.
    fn write_sequence(
        &mut self,
        items: &mut dyn FnMut(&mut dyn ValueOut) -> WireResult<()>,
    ) -> WireResult<()>;

    /// Writes a whole value tree.
    fn write_value(&mut self, value: &WireValue) -> WireResult<()>;

    /// `true` for the binary dialect (drives method-id and raw-text
    /// handling in the method writer).
    fn is_binary(&self) -> bool {
        false
    }
}

/// Writing cursor for the fields of one mapping.
///
/// Passed to [`Marshallable::write_fields`]; the wire itself implements
/// it, so `out.field("name")?.write_i32(v)?` emits one entry.
pub trait MappingOut {
    /// Emits the key of the next entry and returns the cursor for its
    /// value.
    fn field(&mut self, name: &str) -> WireResult<&mut dyn ValueOut>;
}

/// A codec pairing the value model with one physical encoding, bound to
/// a borrowed byte buffer.
///
/// A wire instance is not thread-safe; writers reach it through a
/// per-thread sink. It is reset between documents by the framer.
pub trait Wire: ValueOut + MappingOut {
    /// The physical encoding.
    fn dialect(&self) -> Dialect;

    /// The backing buffer.
    fn bytes(&mut self) -> &mut ElasticBytes;

    /// The backing buffer, read-only.
    fn bytes_ref(&self) -> &ElasticBytes;

    /// Framing bookkeeping (open document, indices, padding flag).
    fn framer(&mut self) -> &mut FramerState;

    /// Framing bookkeeping, read-only.
    fn framer_ref(&self) -> &FramerState;

    /// The alias registry consulted for typed objects.
    fn class_lookup(&self) -> Arc<ClassLookup>;

    /// Replaces the alias registry.
    fn set_class_lookup(&mut self, lookup: Arc<ClassLookup>);

    /// Aligns document ends to 4-byte boundaries when enabled. Padding
    /// bytes are ignorable by any reader of the dialect.
    fn use_padding(&mut self, on: bool);

    /// The ignorable byte used to pad document ends: whitespace in the
    /// character dialects, a zero tag in binary.
    fn padding_byte(&self) -> u8 {
        0
    }

    /// Writes the key of a top-level event and returns the cursor for
    /// its argument value.
    fn write_event_name(&mut self, name: &str) -> WireResult<&mut dyn ValueOut>;

    /// Writes an integer-keyed event in the binary dialect; the other
    /// dialects fall back to the registered `name`.
    fn write_event_id(&mut self, id: i64, name: &str) -> WireResult<&mut dyn ValueOut>;

    /// Resets dialect write state at document open.
    fn begin_write_document(&mut self);

    /// Flushes dialect write state at document commit.
    fn end_write_document(&mut self);

    /// Parses the payload at `[start, start + len)` and loads the read
    /// cursor.
    fn begin_read_document(&mut self, start: u64, len: u64) -> WireResult<()>;

    /// Drops the read cursor at document close.
    fn end_read_document(&mut self);

    /// The reading cursor for the open document.
    fn value_in(&mut self) -> &mut ValueIn;

    /// Reads the next event key of the open document.
    fn read_event(&mut self) -> Option<EventKey> {
        self.value_in().read_event()
    }

    /// Clears the buffer and all codec state.
    fn reset(&mut self);

    /// Rewinds the read cursor to the start of the stream.
    fn reset_read(&mut self);
}
