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

//! Mapping user structs to and from the document tree.
//!
//! A [`Marshallable`] entity declares its serialized shape by enumerating
//! fields in declaration order. Writing iterates the declared fields;
//! reading matches fields by name, skipping unknown fields and leaving
//! missing fields at their defaults. Configuration subtypes
//! ([`Marshallable::reset_on_read`]) are reset to post-construction
//! defaults before population, so a reused destination cannot leak state
//! from a previous decode.
//!
//! `#[derive(Marshallable)]` (from `tapewire-macros`) generates the trait
//! implementation from a struct definition; the hand-written form below
//! is what the derive expands to.
//!
//! Field annotations:
//!
//! - [`LongConverter`] fields are 64-bit integers with a textual
//!   alphabet, emitted as text in the character dialects and as raw
//!   64-bit integers in binary.
//! - Nano-time fields are 64-bit nanosecond timestamps, emitted as
//!   ISO-8601 with nanosecond precision in the character dialects.

mod class_lookup;

pub use class_lookup::ClassLookup;

use crate::error::{WireError, WireResult};
use crate::wire::{MappingOut, ValueIn};

/// A user type whose serialized shape is a mapping of declared fields.
///
/// Object-safe so wires and the method writer can carry `&dyn
/// Marshallable`.
pub trait Marshallable {
    /// Stable type name used for alias registration.
    fn type_name(&self) -> &'static str;

    /// Writes every declared field, in declaration order.
    fn write_fields(&self, out: &mut dyn MappingOut) -> WireResult<()>;

    /// Populates one field from the wire.
    ///
    /// Returns `Ok(false)` when the name is unknown; the caller skips the
    /// value and continues.
    fn read_field(&mut self, name: &str, input: &mut ValueIn) -> WireResult<bool>;

    /// Restores post-construction defaults.
    fn reset_to_default(&mut self);

    /// `true` for configuration subtypes that must be reset before a
    /// read populates them.
    fn reset_on_read(&self) -> bool {
        false
    }
}

/// A value that can stand as one method-event argument on the wire.
///
/// Implemented for the primitive scalars, strings, [`RawText`], and (via
/// `#[derive(Marshallable)]`) every marshallable type. The method writer
/// erases arguments to `&dyn ToWire` so one runtime core serves every
/// generated interface.
pub trait ToWire {
    /// Writes this value as an event argument.
    ///
    /// `verbose` propagates the writer's verbose-types option; scalars
    /// ignore it, marshallables emit their alias tag under it.
    fn to_wire(&self, out: &mut dyn crate::wire::ValueOut, verbose: bool) -> WireResult<()>;
}

/// Pre-encoded text written verbatim by the character dialects.
///
/// The binary dialect re-interprets raw text as ordinary text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawText(pub String);

impl RawText {
    /// Boxes pre-encoded text.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

impl ToWire for RawText {
    fn to_wire(&self, out: &mut dyn crate::wire::ValueOut, _verbose: bool) -> WireResult<()> {
        out.write_raw_text(&self.0)
    }
}

macro_rules! scalar_to_wire {
    ($($ty:ty => $method:ident),* $(,)?) => {
        $(impl ToWire for $ty {
            fn to_wire(
                &self,
                out: &mut dyn crate::wire::ValueOut,
                _verbose: bool,
            ) -> WireResult<()> {
                out.$method(*self)
            }
        })*
    };
}

scalar_to_wire! {
    bool => write_bool,
    i8 => write_i8,
    i16 => write_i16,
    i32 => write_i32,
    i64 => write_i64,
    f32 => write_f32,
    f64 => write_f64,
}

impl ToWire for &str {
    fn to_wire(&self, out: &mut dyn crate::wire::ValueOut, _verbose: bool) -> WireResult<()> {
        out.write_text(self)
    }
}

impl ToWire for String {
    fn to_wire(&self, out: &mut dyn crate::wire::ValueOut, _verbose: bool) -> WireResult<()> {
        out.write_text(self)
    }
}

impl ToWire for crate::value::WireValue {
    fn to_wire(&self, out: &mut dyn crate::wire::ValueOut, _verbose: bool) -> WireResult<()> {
        out.write_value(self)
    }
}

impl ToWire for () {
    fn to_wire(&self, out: &mut dyn crate::wire::ValueOut, _verbose: bool) -> WireResult<()> {
        out.write_text("")
    }
}

impl<T: ToWire> ToWire for Option<T> {
    fn to_wire(&self, out: &mut dyn crate::wire::ValueOut, verbose: bool) -> WireResult<()> {
        match self {
            Some(value) => value.to_wire(out, verbose),
            None => out.write_null(),
        }
    }
}

impl<T: ToWire> ToWire for Vec<T> {
    fn to_wire(&self, out: &mut dyn crate::wire::ValueOut, verbose: bool) -> WireResult<()> {
        out.write_sequence(&mut |seq| {
            for element in self {
                element.to_wire(seq, verbose)?;
            }
            Ok(())
        })
    }
}

/// A value decodable from one staged event argument.
///
/// The dual of [`ToWire`], used by generated method readers.
pub trait FromWire: Sized {
    /// Reads this value from the staged argument.
    fn from_wire(input: &mut ValueIn) -> WireResult<Self>;
}

macro_rules! scalar_from_wire {
    ($($ty:ty => $method:ident),* $(,)?) => {
        $(impl FromWire for $ty {
            fn from_wire(input: &mut ValueIn) -> WireResult<Self> {
                input.$method()
            }
        })*
    };
}

scalar_from_wire! {
    bool => read_bool,
    i8 => read_i8,
    i16 => read_i16,
    i32 => read_i32,
    i64 => read_i64,
    f32 => read_f32,
    f64 => read_f64,
    String => read_text,
}

impl FromWire for crate::value::WireValue {
    fn from_wire(input: &mut ValueIn) -> WireResult<Self> {
        input.read_value()
    }
}

impl<T: FromWire> FromWire for Option<T> {
    fn from_wire(input: &mut ValueIn) -> WireResult<Self> {
        if input.next_is_null() {
            input.skip_value()?;
            return Ok(None);
        }
        T::from_wire(input).map(Some)
    }
}

impl<T: FromWire> FromWire for Vec<T> {
    fn from_wire(input: &mut ValueIn) -> WireResult<Self> {
        let count = input.begin_sequence()?;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(T::from_wire(input)?);
        }
        Ok(out)
    }
}

/// A total bijection between a subdomain of `i64` and a textual alphabet.
///
/// Converter fields render as text in the character dialects and as raw
/// 64-bit integers in binary. Out-of-range input fails the write with
/// [`WireError::InvalidMarshallable`].
pub trait LongConverter: Send + Sync {
    /// Appends the textual form of `value`.
    fn append(&self, value: i64, out: &mut String) -> WireResult<()>;

    /// Parses the textual form back to the value.
    fn parse(&self, text: &str) -> WireResult<i64>;
}

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_.";

/// Six bits per character over a URL-safe alphabet, at most ten
/// characters, so the subdomain is the non-negative values below 2^60.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64LongConverter;

/// The shared converter instance referenced from field annotations.
pub static BASE64: Base64LongConverter = Base64LongConverter;

impl LongConverter for Base64LongConverter {
    fn append(&self, value: i64, out: &mut String) -> WireResult<()> {
        if !(0..1 << 60).contains(&value) {
            return Err(WireError::invalid_marshallable(format!(
                "value {} outside the base64 subdomain [0, 2^60)",
                value
            )));
        }
        if value == 0 {
            out.push(BASE64_ALPHABET[0] as char);
            return Ok(());
        }
        let mut chars = [0u8; 10];
        let mut len = 0;
        let mut rest = value as u64;
        while rest != 0 {
            chars[len] = BASE64_ALPHABET[(rest & 0x3F) as usize];
            rest >>= 6;
            len += 1;
        }
        for i in (0..len).rev() {
            out.push(chars[i] as char);
        }
        Ok(())
    }

    fn parse(&self, text: &str) -> WireResult<i64> {
        if text.is_empty() || text.len() > 10 {
            return Err(WireError::invalid_marshallable(format!(
                "base64 field {:?} must be 1..=10 characters",
                text
            )));
        }
        let mut value = 0u64;
        for ch in text.bytes() {
            let digit = BASE64_ALPHABET
                .iter()
                .position(|&c| c == ch)
                .ok_or_else(|| {
                    WireError::invalid_marshallable(format!(
                        "character {:?} not in the base64 alphabet",
                        ch as char
                    ))
                })?;
            value = (value << 6) | digit as u64;
        }
        Ok(value as i64)
    }
}

/// Renders a nanosecond timestamp as ISO-8601 with full nanosecond
/// precision, e.g. `2023-01-02T03:04:05.000000123Z`.
pub fn format_timestamp_nanos(nanos: i64) -> WireResult<String> {
    let instant = time::OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos))
        .map_err(|e| WireError::invalid_marshallable(format!("timestamp out of range: {}", e)))?;
    let date = instant.date();
    let clock = instant.time();
    Ok(format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:09}Z",
        date.year(),
        u8::from(date.month()),
        date.day(),
        clock.hour(),
        clock.minute(),
        clock.second(),
        clock.nanosecond(),
    ))
}

/// Parses an ISO-8601 timestamp back to nanoseconds.
pub fn parse_timestamp_nanos(text: &str) -> WireResult<i64> {
    let instant =
        time::OffsetDateTime::parse(text, &time::format_description::well_known::Rfc3339)
            .map_err(|e| {
                WireError::invalid_marshallable(format!("invalid timestamp {:?}: {}", text, e))
            })?;
    Ok(instant.unix_timestamp_nanos() as i64)
}
