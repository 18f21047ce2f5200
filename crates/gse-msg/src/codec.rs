//! ---
//! gse_section: "02-messaging-data-model"
//! gse_subsection: "module"
//! gse_type: "source"
//! gse_scope: "code"
//! gse_description: "Item model, transport adapters, and dictionary helpers."
//! gse_version: "v0.1.0"
//! gse_owner: "tbd"
//! ---
//! Length-prefixed string field used in event argument buffers.
//!
//! Layout: big-endian `u16` byte count followed by the UTF-8 payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};

const PREFIX_LEN: usize = std::mem::size_of::<u16>();

/// Failures while encoding or decoding a string field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The buffer ends before the prefix or the declared payload.
    #[error("not enough data to deserialize: needed {needed} bytes, {available} left")]
    Truncated {
        /// Bytes required from the offset.
        needed: usize,
        /// Bytes available from the offset.
        available: usize,
    },
    /// The string is longer than the field allows.
    #[error("string of {len} bytes exceeds the maximum of {max}")]
    TooLong {
        /// Actual length.
        len: usize,
        /// Configured maximum.
        max: usize,
    },
    /// The payload is not valid UTF-8.
    #[error("string payload is not valid utf-8")]
    Utf8,
}

/// Length-prefixed string with an optional maximum length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringField {
    max_len: Option<usize>,
}

impl StringField {
    /// Field without a length limit beyond what the prefix can express.
    pub fn new() -> Self {
        Self::default()
    }

    /// Field limited to `max_len` bytes.
    pub fn bounded(max_len: usize) -> Self {
        Self {
            max_len: Some(max_len),
        }
    }

    fn check_len(&self, len: usize) -> Result<(), CodecError> {
        let max = self.max_len.unwrap_or(u16::MAX as usize).min(u16::MAX as usize);
        if len > max {
            return Err(CodecError::TooLong { len, max });
        }
        Ok(())
    }

    /// Serialize `value` with its length prefix.
    pub fn encode(&self, value: &str) -> Result<Bytes, CodecError> {
        self.check_len(value.len())?;
        let mut buf = BytesMut::with_capacity(Self::encoded_len(value));
        buf.put_u16(value.len() as u16);
        buf.put_slice(value.as_bytes());
        Ok(buf.freeze())
    }

    /// Deserialize a string starting at `offset`, returning it with the
    /// number of bytes consumed.
    pub fn decode(&self, data: &[u8], offset: usize) -> Result<(String, usize), CodecError> {
        let available = data.len().saturating_sub(offset);
        if available < PREFIX_LEN {
            return Err(CodecError::Truncated {
                needed: PREFIX_LEN,
                available,
            });
        }
        let mut cursor = &data[offset..];
        let len = cursor.get_u16() as usize;
        if cursor.remaining() < len {
            return Err(CodecError::Truncated {
                needed: len,
                available: cursor.remaining(),
            });
        }
        self.check_len(len)?;
        let text = std::str::from_utf8(&cursor[..len]).map_err(|_| CodecError::Utf8)?;
        Ok((text.to_owned(), PREFIX_LEN + len))
    }

    /// Size of `value` once encoded.
    pub fn encoded_len(value: &str) -> usize {
        PREFIX_LEN + value.len()
    }
}
