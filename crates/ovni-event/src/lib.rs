//! On-disk event header/payload decoding for a single instrumentation stream.
//!
//! One event is a 16-byte header followed by 0-16 bytes of inline payload,
//! or (when the `JUMBO` flag is set) a 4-byte length prefix followed by that
//! many bytes. The `mcv` triple (`model`, `category`, `value`) is the
//! routing key models dispatch on.

use thiserror::Error;

pub const HEADER_LEN: usize = 16;
pub const MAX_INLINE_PAYLOAD: usize = 16;

/// High bit of `flags`: payload is jumbo-sized (4-byte length prefix).
pub const FLAG_JUMBO: u8 = 0x80;
/// Low nibble of `flags` encodes inline payload length as `len - 1`.
const FLAG_LEN_MASK: u8 = 0x0f;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("truncated event header: need {need} bytes, have {have}")]
    TruncatedHeader { need: usize, have: usize },
    #[error("truncated event payload: need {need} bytes, have {have}")]
    TruncatedPayload { need: usize, have: usize },
    #[error("truncated jumbo length prefix at offset {offset}")]
    TruncatedJumboLen { offset: usize },
}

/// The routing tag `(model, category, value)` an event carries.
pub type Mcv = (u8, u8, u8);

/// A single decoded event, borrowing its payload from the underlying buffer.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    pub flags: u8,
    pub model: u8,
    pub category: u8,
    pub value: u8,
    /// Raw (unsynchronized) clock value carried in the stream, little-endian u64.
    pub clock: u64,
    pub payload: &'a [u8],
}

impl<'a> Event<'a> {
    #[inline]
    pub fn mcv(&self) -> Mcv {
        (self.model, self.category, self.value)
    }

    #[inline]
    pub fn is_jumbo(&self) -> bool {
        self.flags & FLAG_JUMBO != 0
    }

    /// Unknown flag bits beyond `JUMBO` and the length nibble are reserved
    /// for forward compatibility; callers should warn, not reject, when any
    /// are set.
    #[inline]
    pub fn has_unknown_flags(&self) -> bool {
        self.flags & !(FLAG_JUMBO | FLAG_LEN_MASK) != 0
    }

    /// Decodes one event starting at `buf[0]`. Returns the event and the
    /// total number of bytes consumed (header + payload), so the caller can
    /// advance its cursor.
    pub fn decode(buf: &'a [u8]) -> Result<(Event<'a>, usize), DecodeError> {
        if buf.len() < HEADER_LEN {
            return Err(DecodeError::TruncatedHeader {
                need: HEADER_LEN,
                have: buf.len(),
            });
        }

        let flags = buf[0];
        let model = buf[1];
        let category = buf[2];
        let value = buf[3];
        let clock = u64::from_le_bytes(buf[4..12].try_into().unwrap());
        // buf[12..16] is reserved/padding, not interpreted.

        if flags & FLAG_JUMBO != 0 {
            let len_off = HEADER_LEN;
            if buf.len() < len_off + 4 {
                return Err(DecodeError::TruncatedJumboLen { offset: len_off });
            }
            let len = u32::from_le_bytes(buf[len_off..len_off + 4].try_into().unwrap()) as usize;
            let payload_start = len_off + 4;
            let payload_end = payload_start + len;
            if buf.len() < payload_end {
                return Err(DecodeError::TruncatedPayload {
                    need: payload_end,
                    have: buf.len(),
                });
            }
            let event = Event {
                flags,
                model,
                category,
                value,
                clock,
                payload: &buf[payload_start..payload_end],
            };
            Ok((event, payload_end))
        } else {
            let nibble = flags & FLAG_LEN_MASK;
            let len = if nibble == 0 { 0 } else { (nibble + 1) as usize };
            let payload_end = HEADER_LEN + len;
            if buf.len() < payload_end {
                return Err(DecodeError::TruncatedPayload {
                    need: payload_end,
                    have: buf.len(),
                });
            }
            let event = Event {
                flags,
                model,
                category,
                value,
                clock,
                payload: &buf[HEADER_LEN..payload_end],
            };
            Ok((event, payload_end))
        }
    }
}
