//! Frame encoding and decoding
//!
//! Every message on the wire is `int32 length` followed by `length` bytes.
//! Encoding concatenates the header and body behind that prefix. Decoding
//! splits frames off an accumulated read buffer; a socket read may hold a
//! partial frame or several frames at once.

use crate::core::Buffer;
use crate::error::{ProtocolError, Result};

use super::message::{Request, RequestHeaders};

/// Size of the length prefix.
pub const LENGTH_PREFIX: usize = 4;

/// Default cap on a single frame (100 MiB).
pub const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// Length prefix followed by the header and body bytes.
pub fn encode_frame(header: &Buffer, body: &Buffer) -> Result<Vec<u8>> {
    let mut length = Buffer::allocate(LENGTH_PREFIX);
    length.write_int((header.length() + body.length()) as i64)?;

    let mut frame = Vec::with_capacity(LENGTH_PREFIX + header.length() + body.length());
    frame.extend_from_slice(length.bytes());
    frame.extend_from_slice(header.bytes());
    frame.extend_from_slice(body.bytes());
    Ok(frame)
}

/// Encodes `request` with `headers` into one complete frame.
///
/// The body is encoded with the version carried by the headers. Nothing is
/// produced if either part fails validation.
pub fn encode_request(headers: &RequestHeaders, request: &dyn Request) -> Result<Vec<u8>> {
    let header = headers.to_buffer()?;
    let body = request.to_buffer(headers.api_version())?;
    encode_frame(&header, &body)
}

/// Splits length-prefixed frames off the front of a byte stream.
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    max_frame_size: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl Decoder {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Next complete frame in `bytes`, as `(payload, consumed)`.
    ///
    /// Returns `Ok(None)` while the frame is still incomplete. `consumed`
    /// includes the length prefix.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Result<Option<(&'a [u8], usize)>> {
        if bytes.len() < LENGTH_PREFIX {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX];
        prefix.copy_from_slice(&bytes[..LENGTH_PREFIX]);
        let size = i32::from_be_bytes(prefix);

        let length = usize::try_from(size).map_err(|_| ProtocolError::NegativeLength {
            length: i64::from(size),
        })?;
        if length > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: i64::from(size),
                max: self.max_frame_size,
            });
        }

        let end = LENGTH_PREFIX + length;
        if bytes.len() < end {
            return Ok(None);
        }

        Ok(Some((&bytes[LENGTH_PREFIX..end], end)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame_prefix() {
        let header = Buffer::from_content(vec![1, 2, 3]);
        let body = Buffer::from_content(vec![4]);

        assert_eq!(
            encode_frame(&header, &body).unwrap(),
            vec![0, 0, 0, 4, 1, 2, 3, 4]
        );
    }

    #[test]
    fn test_decode_partial_frame() {
        let decoder = Decoder::default();

        assert_eq!(decoder.decode(&[0, 0]).unwrap(), None);
        assert_eq!(decoder.decode(&[0, 0, 0, 3, 9, 9]).unwrap(), None);
    }

    #[test]
    fn test_decode_back_to_back_frames() {
        let decoder = Decoder::default();
        let stream = [0, 0, 0, 1, 7, 0, 0, 0, 2, 8, 9];

        let (first, consumed) = decoder.decode(&stream).unwrap().unwrap();
        assert_eq!(first, &[7]);
        assert_eq!(consumed, 5);

        let (second, consumed) = decoder.decode(&stream[consumed..]).unwrap().unwrap();
        assert_eq!(second, &[8, 9]);
        assert_eq!(consumed, 6);
    }

    #[test]
    fn test_decode_empty_frame() {
        let decoder = Decoder::default();

        assert_eq!(decoder.decode(&[0, 0, 0, 0]).unwrap(), Some((&[][..], 4)));
    }

    #[test]
    fn test_decode_rejects_oversized_and_negative() {
        let decoder = Decoder::new(8);

        assert_eq!(
            decoder.decode(&[0, 0, 0, 9]),
            Err(ProtocolError::FrameTooLarge { size: 9, max: 8 })
        );
        assert_eq!(
            decoder.decode(&[0xff, 0xff, 0xff, 0xff]),
            Err(ProtocolError::NegativeLength { length: -1 })
        );
    }
}
