//! Byte-level wire primitives.
//!
//! Every message is a 1-byte opcode followed by opcode-specific fields:
//! fixed-width little-endian integers, booleans, u16-length-prefixed blobs,
//! and the shared item record. The transport supplies framing and ordered
//! delivery; nothing here is self-delimiting, so a receiver that stops
//! reading mid-payload desynchronizes every later message on the stream.
//! Decoding therefore always consumes complete payloads.

use stockpile_core::id::ItemTypeId;
use stockpile_core::item::ItemStack;

/// Upper bound for length-prefixed blobs (u16 prefix).
pub const MAX_BLOB_LEN: usize = u16::MAX as usize;

/// Upper bound for u8-count-prefixed item batches.
pub const MAX_BATCH_LEN: usize = u8::MAX as usize;

/// Errors raised while encoding or decoding wire data.
///
/// [`WireError::UnknownOpcode`] signals corruption or version skew and is
/// fatal for the connection's stream; it must never be swallowed.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("unexpected end of packet")]
    UnexpectedEof,
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),
    #[error("unknown operation discriminant {0}")]
    UnknownOperation(u8),
    #[error("{0} trailing bytes after message payload")]
    TrailingBytes(usize),
    #[error("blob of {0} bytes exceeds the {MAX_BLOB_LEN}-byte limit")]
    BlobTooLarge(usize),
    #[error("batch of {0} items exceeds the {MAX_BATCH_LEN}-entry limit")]
    BatchTooLarge(usize),
    #[error("entity blob encoding failed: {0}")]
    EntityEncode(String),
    #[error("entity blob decoding failed: {0}")]
    EntityDecode(String),
}

// ---------------------------------------------------------------------------
// WireWriter
// ---------------------------------------------------------------------------

/// Append-only packet builder.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// u16-length-prefixed byte blob.
    pub fn write_blob(&mut self, blob: &[u8]) -> Result<(), WireError> {
        if blob.len() > MAX_BLOB_LEN {
            return Err(WireError::BlobTooLarge(blob.len()));
        }
        self.write_u16(blob.len() as u16);
        self.buf.extend_from_slice(blob);
        Ok(())
    }

    /// The shared item record: type, stack, favorite flag, extra blob.
    pub fn write_item(&mut self, item: &ItemStack) -> Result<(), WireError> {
        self.write_u32(item.item_type.0);
        self.write_u32(item.stack);
        self.write_bool(item.favorite);
        self.write_blob(&item.extra)
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

// ---------------------------------------------------------------------------
// WireReader
// ---------------------------------------------------------------------------

/// Cursor over a received packet.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.pos + n > self.buf.len() {
            return Err(WireError::UnexpectedEof);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, WireError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_i16(&mut self) -> Result<i16, WireError> {
        Ok(i16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_blob(&mut self) -> Result<Vec<u8>, WireError> {
        let len = self.read_u16()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_item(&mut self) -> Result<ItemStack, WireError> {
        let item_type = ItemTypeId(self.read_u32()?);
        let stack = self.read_u32()?;
        let favorite = self.read_bool()?;
        let extra = self.read_blob()?;
        Ok(ItemStack {
            item_type,
            stack,
            favorite,
            extra,
        })
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// The payload must be consumed exactly; leftover bytes mean the sender
    /// and receiver disagree about the layout.
    pub fn finish(self) -> Result<(), WireError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(WireError::TrailingBytes(n)),
        }
    }
}
