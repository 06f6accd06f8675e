//! Binary `frame_update_full` payload.
//!
//! Wire format:
//! ```text
//! [elapsed_ms:i64][jpeg_len:i64][jpeg:N]
//! ```
//! Total header size: 16 bytes.  Both integers are little-endian and signed.
//! `elapsed_ms` counts from the session's `connection_status.timestamp`, so the
//! viewer can measure delivery latency against its own clock.

use crate::protocol::ProtocolError;

/// Size of the fixed header preceding the JPEG bytes.
pub const FRAME_HEADER_SIZE: usize = 16;

/// Decoded header of a frame payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Milliseconds between session start and emission.
    pub elapsed_ms: i64,
    /// Length of the JPEG data that follows.
    pub jpeg_len: i64,
}

/// Builds the binary payload for one encoded frame.
///
/// # Examples
///
/// ```rust
/// use relay_core::protocol::frame::{encode_frame_payload, FRAME_HEADER_SIZE};
///
/// let payload = encode_frame_payload(7, &[0xFF, 0xD8]);
/// assert_eq!(payload.len(), FRAME_HEADER_SIZE + 2);
/// assert_eq!(&payload[..8], &7i64.to_le_bytes());
/// ```
pub fn encode_frame_payload(elapsed_ms: i64, jpeg: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + jpeg.len());
    buf.extend_from_slice(&elapsed_ms.to_le_bytes());
    buf.extend_from_slice(&(jpeg.len() as i64).to_le_bytes());
    buf.extend_from_slice(jpeg);
    buf
}

/// Splits a frame payload into its header and JPEG bytes.
///
/// # Errors
///
/// - [`ProtocolError::InsufficientData`] if fewer than 16 bytes are present.
/// - [`ProtocolError::LengthMismatch`] if the declared length does not equal
///   the number of bytes after the header.
pub fn decode_frame_payload(bytes: &[u8]) -> Result<(FrameHeader, &[u8]), ProtocolError> {
    if bytes.len() < FRAME_HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: FRAME_HEADER_SIZE,
            available: bytes.len(),
        });
    }
    let (head, body) = bytes.split_at(FRAME_HEADER_SIZE);
    let elapsed_ms = i64::from_le_bytes(read_8(&head[0..8]));
    let jpeg_len = i64::from_le_bytes(read_8(&head[8..16]));

    if usize::try_from(jpeg_len).ok() != Some(body.len()) {
        return Err(ProtocolError::LengthMismatch {
            declared: jpeg_len,
            available: body.len(),
        });
    }
    Ok((FrameHeader { elapsed_ms, jpeg_len }, body))
}

fn read_8(slice: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(slice);
    out
}
