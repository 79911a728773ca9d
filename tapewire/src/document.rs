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

//! Document framing.
//!
//! Every document is a framed, self-delimiting region of the stream with
//! a reserved 4-byte little-endian header:
//!
//! ```text
//! +--------------------------------+------------------+
//! | Header (4 bytes)               | Payload (N bytes)|
//! +--------------------------------+------------------+
//!   bits 0..30   payload length (includes padding)
//!   bit  30      meta document
//!   bit  31      ready
//! ```
//!
//! A document opens with a zero placeholder header, so in-flight and
//! rolled-back documents read as not-ready and are invisible. Commit
//! patches the final length and sets the ready bit; rollback retreats the
//! write cursor to the header. Length is fixed at commit. When padding is
//! enabled, document ends align to 4-byte boundaries with bytes every
//! reader of the dialect ignores.
//!
//! The scoped handles [`WritingDocument`] and [`ReadingDocument`] consult
//! a rollback flag on drop instead of unwinding: errors travel the normal
//! `Result` channel and the buffer cursor stays safe for the next
//! attempt.
//!
//! ```text
//! idle ──open──▶ writing ──commit──▶ idle
//!                 │
//!                 └─rollback─▶ idle (write cursor retreats)
//! ```

use crate::error::{WireError, WireResult};
use crate::wire::Wire;
use std::time::Duration;

/// Bytes reserved for a document header.
pub const HEADER_SIZE: u64 = 4;
/// Header bits holding the payload length.
pub const LENGTH_MASK: u32 = 0x3FFF_FFFF;
/// Header bit marking a meta document.
pub const META_BIT: u32 = 1 << 30;
/// Header bit marking a committed document.
pub const READY_BIT: u32 = 1 << 31;

#[derive(Debug, Clone, Copy)]
pub(crate) struct OpenWrite {
    pub(crate) header_pos: u64,
    pub(crate) meta: bool,
}

/// Framing bookkeeping carried by every wire.
///
/// Tracks the in-flight writing document, the monotone document indices,
/// and the padding flag.
#[derive(Debug, Default)]
pub struct FramerState {
    pub(crate) open_write: Option<OpenWrite>,
    pub(crate) write_index: u64,
    pub(crate) read_index: u64,
    pub(crate) padding: bool,
}

impl FramerState {
    /// Ordinal the next committed document will take.
    #[must_use]
    pub fn write_index(&self) -> u64 {
        self.write_index
    }

    /// Ordinal the next present document read will take.
    #[must_use]
    pub fn read_index(&self) -> u64 {
        self.read_index
    }

    /// `true` while a writing document is open on this wire.
    #[must_use]
    pub fn is_writing(&self) -> bool {
        self.open_write.is_some()
    }
}

/// Opens a framed region, reserving the header.
///
/// A wire admits one writing document at a time; a second acquisition
/// fails with [`WireError::UnrecoverableTimeout`] since a single-owner
/// wire can never be released by another caller.
pub(crate) fn open_document(wire: &mut dyn Wire, meta: bool) -> WireResult<u64> {
    if wire.framer_ref().open_write.is_some() {
        return Err(WireError::UnrecoverableTimeout {
            operation: "acquire writing document",
            waited: Duration::ZERO,
        });
    }
    let bytes = wire.bytes();
    let header_pos = bytes.write_position();
    bytes.write_u32(0);
    wire.begin_write_document();
    wire.framer().open_write = Some(OpenWrite { header_pos, meta });
    Ok(header_pos)
}

/// Commits the open document: pads, patches the header, bumps the index.
pub(crate) fn commit_document(wire: &mut dyn Wire) -> WireResult<()> {
    let Some(open) = wire.framer().open_write.take() else {
        return Ok(());
    };
    wire.end_write_document();
    if wire.framer_ref().padding {
        let pad = wire.padding_byte();
        while (wire.bytes().write_position() - open.header_pos - HEADER_SIZE) % 4 != 0 {
            wire.bytes().write_u8(pad);
        }
    }
    let length = wire.bytes().write_position() - open.header_pos - HEADER_SIZE;
    if length > u64::from(LENGTH_MASK) {
        wire.bytes().truncate_writes(open.header_pos);
        return Err(WireError::invalid_marshallable(format!(
            "document payload of {} bytes exceeds the 30-bit frame limit",
            length
        )));
    }
    let mut header = READY_BIT | length as u32;
    if open.meta {
        header |= META_BIT;
    }
    wire.bytes().write_u32_at(open.header_pos, header);
    wire.framer().write_index += 1;
    Ok(())
}

/// Discards the open document, retreating the write cursor.
pub(crate) fn rollback_document(wire: &mut dyn Wire) {
    if let Some(open) = wire.framer().open_write.take() {
        wire.end_write_document();
        wire.bytes().truncate_writes(open.header_pos);
        #[cfg(feature = "observability")]
        tracing::warn!(
            position = open.header_pos,
            "writing document rolled back"
        );
    }
}

/// Scoped handle for one writing document.
///
/// Commits on [`close`](WritingDocument::close) (or best-effort on drop);
/// [`rollback_on_close`](WritingDocument::rollback_on_close) discards the
/// document instead, without publishing it.
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
/// doc.wire().write_event_name("say")?.write_text("hello")?;
/// doc.close()?;
/// # Ok(())
/// # }
/// ```
pub struct WritingDocument<'a> {
    wire: &'a mut dyn Wire,
    rollback: bool,
    done: bool,
}

impl<'a> WritingDocument<'a> {
    /// Opens a document of the given kind on `wire`.
    pub fn acquire(wire: &'a mut dyn Wire, meta: bool) -> WireResult<Self> {
        open_document(wire, meta)?;
        Ok(Self {
            wire,
            rollback: false,
            done: false,
        })
    }

    /// The wire, for writing the payload.
    pub fn wire(&mut self) -> &mut dyn Wire {
        &mut *self.wire
    }

    /// `true` if this is a meta document.
    #[must_use]
    pub fn is_meta_data(&self) -> bool {
        self.wire
            .framer_ref()
            .open_write
            .map(|open| open.meta)
            .unwrap_or(false)
    }

    /// Marks the document to be discarded instead of committed.
    pub fn rollback_on_close(&mut self) {
        self.rollback = true;
    }

    /// Finalizes the document, surfacing any commit failure.
    pub fn close(mut self) -> WireResult<()> {
        self.done = true;
        if self.rollback {
            rollback_document(self.wire);
            Ok(())
        } else {
            commit_document(self.wire)
        }
    }
}

impl Drop for WritingDocument<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if self.rollback {
            rollback_document(self.wire);
        } else {
            // Drop cannot surface errors; close() is the checked path.
            let _ = commit_document(self.wire);
        }
    }
}

/// Scoped handle for one reading document.
///
/// Not-present handles (absent or not-ready header) leave the read
/// cursor untouched; present handles advance it past the payload when
/// the scope closes.
pub struct ReadingDocument<'a> {
    wire: &'a mut dyn Wire,
    present: bool,
    meta: bool,
    index: u64,
    end: u64,
    done: bool,
}

impl<'a> ReadingDocument<'a> {
    /// Examines the stream at the read cursor.
    pub fn next(wire: &'a mut dyn Wire) -> WireResult<Self> {
        let bytes = wire.bytes_ref();
        let pos = bytes.read_position();
        let mut header_bytes = [0u8; HEADER_SIZE as usize];
        let mut available = true;
        for (i, slot) in header_bytes.iter_mut().enumerate() {
            match bytes.peek_unsigned_byte(pos + i as u64) {
                Some(b) => *slot = b,
                None => {
                    available = false;
                    break;
                }
            }
        }
        let header = u32::from_le_bytes(header_bytes);
        let length = u64::from(header & LENGTH_MASK);
        let ready = available
            && header & READY_BIT != 0
            && pos + HEADER_SIZE + length <= bytes.write_position();
        if !ready {
            return Ok(Self {
                wire,
                present: false,
                meta: false,
                index: 0,
                end: pos,
                done: false,
            });
        }
        let meta = header & META_BIT != 0;
        let index = wire.framer_ref().read_index;
        wire.begin_read_document(pos + HEADER_SIZE, length)?;
        let end = pos + HEADER_SIZE + length;
        wire.bytes().set_read_limit(end);
        Ok(Self {
            wire,
            present: true,
            meta,
            index,
            end,
            done: false,
        })
    }

    /// `false` when the next header is absent or not ready.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.present
    }

    /// `true` if the document is a meta document.
    #[must_use]
    pub fn is_meta_data(&self) -> bool {
        self.meta
    }

    /// 0-based ordinal of this document in the stream.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.index
    }

    /// The wire, for reading the payload.
    pub fn wire(&mut self) -> &mut dyn Wire {
        &mut *self.wire
    }

    /// Closes the scope, advancing past a present document.
    pub fn close(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.done || !self.present {
            return;
        }
        self.done = true;
        self.wire.end_read_document();
        self.wire.bytes().clear_read_limit();
        self.wire.bytes().set_read_position(self.end);
        self.wire.framer().read_index += 1;
    }
}

impl Drop for ReadingDocument<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}
