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

//! Annotated text rendering of a framed stream.
//!
//! [`Dumper::dump`] walks a wire's buffer header by header and renders
//! every document in the text dialect:
//!
//! ```text
//! --- !!data
//! 17
//! # position: 8, header: 1
//! --- !!data
//! bark
//! ```
//!
//! Data documents open with `--- !!data`, meta documents with
//! `--- !!meta-data`, each suffixed `#binary` when the stream is binary
//! (payloads are decoded to their text form). Position markers appear
//! between documents. An in-flight document renders as
//! `--- !!not-ready-data` followed by `...` and a remaining-byte
//! comment, and ends the dump: nothing after it is published yet.

use crate::buffer::BytesPool;
use crate::document::{HEADER_SIZE, LENGTH_MASK, META_BIT, READY_BIT};
use crate::error::WireResult;
use crate::value::MapKey;
use crate::wire::input::DocPayload;
use crate::wire::{binary_decode_payload, Dialect, TextWire, ValueOut, Wire};

/// Renders framed streams as annotated text.
pub struct Dumper;

impl Dumper {
    /// Renders every document in `wire`'s buffer, committed or not.
    ///
    /// Corrupt payloads render as an inline `# dump error:` comment
    /// rather than failing the whole dump.
    #[must_use]
    pub fn dump(wire: &dyn Wire) -> String {
        let data = wire.bytes_ref().as_slice();
        let end = wire.bytes_ref().write_position();
        let binary = wire.dialect() == Dialect::Binary;

        let mut out = String::new();
        let mut pos = 0u64;
        let mut header_index = 0u64;
        while pos + HEADER_SIZE <= end {
            if header_index > 0 {
                out.push_str(&format!("# position: {}, header: {}\n", pos, header_index));
            }
            let header = u32::from_le_bytes(
                data[pos as usize..(pos + HEADER_SIZE) as usize]
                    .try_into()
                    .expect("header slice"),
            );
            let length = u64::from(header & LENGTH_MASK);
            let ready = header & READY_BIT != 0 && pos + HEADER_SIZE + length <= end;
            if !ready {
                out.push_str("--- !!not-ready-data\n...\n");
                out.push_str(&format!("# {} bytes remaining\n", end - pos - HEADER_SIZE));
                return out;
            }
            out.push_str(if header & META_BIT != 0 {
                "--- !!meta-data"
            } else {
                "--- !!data"
            });
            if binary {
                out.push_str(" #binary");
            }
            out.push('\n');

            let payload = &data[(pos + HEADER_SIZE) as usize..(pos + HEADER_SIZE + length) as usize];
            let rendered = if binary {
                match render_binary(payload, pos + HEADER_SIZE) {
                    Ok(text) => text,
                    Err(e) => format!("# dump error: {}\n", e),
                }
            } else {
                let text = String::from_utf8_lossy(payload);
                let trimmed = text.trim_end();
                if trimmed.is_empty() {
                    String::new()
                } else {
                    format!("{}\n", trimmed)
                }
            };
            out.push_str(&rendered);

            pos += HEADER_SIZE + length;
            header_index += 1;
        }
        out
    }
}

/// Decodes a binary payload and re-renders it through a pooled text
/// wire.
fn render_binary(payload: &[u8], base: u64) -> WireResult<String> {
    let decoded = binary_decode_payload(payload, base)?;
    let mut scratch = BytesPool::get(payload.len().max(64));
    let mut render = TextWire::with_bytes(std::mem::take(&mut *scratch));
    match decoded {
        DocPayload::Events(entries) => {
            for (key, value) in entries {
                match key {
                    MapKey::Name(name) => render.write_event_name(&name)?,
                    MapKey::Id(id) => render.write_event_id(id, &id.to_string())?,
                }
                .write_value(&value)?;
            }
        }
        DocPayload::Scalar(value) => {
            render.write_value(&value)?;
        }
    }
    let text = String::from_utf8_lossy(render.bytes_ref().as_slice())
        .trim_end()
        .to_owned();
    *scratch = std::mem::take(render.bytes());
    if text.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!("{}\n", text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::WritingDocument;
    use crate::wire::{BinaryWire, ValueOut};

    #[test]
    fn test_text_stream_dump() {
        let mut wire = TextWire::default();
        for token in ["17", "bark"] {
            let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
            doc.wire().write_raw_text(token).unwrap();
            doc.close().unwrap();
        }

        let dump = Dumper::dump(&wire);
        assert_eq!(
            dump,
            "--- !!data\n17\n# position: 8, header: 1\n--- !!data\nbark\n"
        );
    }

    #[test]
    fn test_binary_dump_decodes_payload() {
        let mut wire = BinaryWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        doc.wire()
            .write_event_name("say")
            .unwrap()
            .write_text("meow")
            .unwrap();
        doc.close().unwrap();

        let dump = Dumper::dump(&wire);
        assert_eq!(dump, "--- !!data #binary\nsay: meow\n");
    }

    #[test]
    fn test_meta_document_marker() {
        let mut wire = TextWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, true).unwrap();
        doc.wire()
            .write_event_name("history")
            .unwrap()
            .write_text("x")
            .unwrap();
        doc.close().unwrap();

        assert!(Dumper::dump(&wire).starts_with("--- !!meta-data\n"));
    }

    #[test]
    fn test_not_ready_footer() {
        let mut wire = BinaryWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        doc.wire().write_i32(17).unwrap();
        doc.close().unwrap();

        // Second document left in flight.
        crate::document::open_document(&mut wire, false).unwrap();
        wire.write_text("meow").unwrap();

        let dump = Dumper::dump(&wire);
        assert_eq!(
            dump,
            "--- !!data #binary\n17\n# position: 5, header: 1\n--- !!not-ready-data\n...\n# 5 bytes remaining\n"
        );
    }
}
