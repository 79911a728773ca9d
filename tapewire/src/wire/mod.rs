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

//! Wire dialects.
//!
//! One logical document tree, three physical encodings:
//!
//! - [`TextWire`]: human-readable YAML-like text.
//! - [`JsonWire`]: strict, canonical JSON.
//! - [`BinaryWire`]: compact tagged binary preserving field names, type
//!   tags, and primitive widths.
//!
//! All three implement the [`Wire`] contract over the same
//! [`ElasticBytes`](crate::buffer::ElasticBytes) framing, so a document
//! written through one dialect reads back as the same value tree through
//! the matching dialect, and equal trees cross between dialects.
//!
//! # Examples
//!
//! ```rust
//! use tapewire::document::{ReadingDocument, WritingDocument};
//! use tapewire::wire::{BinaryWire, Wire};
//!
//! # fn example() -> tapewire::WireResult<()> {
//! let mut wire = BinaryWire::default();
//!
//! let mut doc = WritingDocument::acquire(&mut wire, false)?;
//! doc.wire().write_event_name("tick")?.write_i64(1)?;
//! doc.close()?;
//!
//! wire.reset_read();
//! let doc = ReadingDocument::next(&mut wire)?;
//! assert!(doc.is_present());
//! # Ok(())
//! # }
//! ```

mod binary;
pub(crate) mod input;
mod json;
mod text;
mod traits;

pub(crate) use binary::decode_payload as binary_decode_payload;
pub use binary::BinaryWire;
pub use input::ValueIn;
pub use json::JsonWire;
pub use text::TextWire;
pub use traits::{Dialect, EventKey, MappingOut, ValueOut, Wire};
