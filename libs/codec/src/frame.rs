//! # Frame Codec
//!
//! Length-prefixed framing of the connection byte stream:
//!
//! ```text
//! +------------------+-------------------+----------------------+
//! | kind: i32 (BE)   | length: i32 (BE)  | body: length bytes   |
//! +------------------+-------------------+----------------------+
//! ```
//!
//! Kind codes are `REQUEST=0, RESPONSE=1, LOGIN=2, HEARTBEAT=3`. Any other
//! code decodes as [`FrameKind::Unknown`]; rejecting it is the dispatcher's
//! call, not the codec's.
//!
//! Decoding never consumes input while a frame is incomplete, and rejects a
//! negative or over-limit length up front instead of waiting for bytes that
//! will never be accepted.

use crate::error::{FrameError, FrameResult};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use tokio_util::codec::{Decoder, Encoder};

/// `kind` + `length`
pub const HEADER_LEN: usize = 8;

/// Default upper bound for a single frame body
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Routing class of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Request,
    Response,
    Login,
    Heartbeat,
    /// Code outside the protocol table, preserved verbatim
    Unknown(i32),
}

impl FrameKind {
    pub fn code(&self) -> i32 {
        match self {
            FrameKind::Request => 0,
            FrameKind::Response => 1,
            FrameKind::Login => 2,
            FrameKind::Heartbeat => 3,
            FrameKind::Unknown(code) => *code,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => FrameKind::Request,
            1 => FrameKind::Response,
            2 => FrameKind::Login,
            3 => FrameKind::Heartbeat,
            other => FrameKind::Unknown(other),
        }
    }
}

impl From<i32> for FrameKind {
    fn from(code: i32) -> Self {
        Self::from_code(code)
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Request => f.write_str("REQUEST"),
            FrameKind::Response => f.write_str("RESPONSE"),
            FrameKind::Login => f.write_str("LOGIN"),
            FrameKind::Heartbeat => f.write_str("HEARTBEAT"),
            FrameKind::Unknown(code) => write!(f, "UNKNOWN({})", code),
        }
    }
}

/// One unit of the wire stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub body: Bytes,
}

impl Frame {
    pub fn new(kind: FrameKind, body: impl Into<Bytes>) -> Self {
        Self {
            kind,
            body: body.into(),
        }
    }

    /// Encoded size including the header
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.body.len()
    }
}

/// Outcome of [`decode`] over a byte slice
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded<'a> {
    /// A complete frame and the bytes following it
    Frame { frame: Frame, remaining: &'a [u8] },
    /// The input holds only part of a frame; nothing was consumed
    NeedMoreData,
}

fn read_header(input: &[u8], max_frame_len: usize) -> FrameResult<Option<(FrameKind, usize)>> {
    if input.len() < HEADER_LEN {
        return Ok(None);
    }

    let mut header = &input[..HEADER_LEN];
    let code = header.get_i32();
    let length = header.get_i32();

    if length < 0 {
        return Err(FrameError::negative_length(code, length));
    }
    let length = length as usize;
    if length > max_frame_len {
        return Err(FrameError::frame_too_large(code, length, max_frame_len));
    }

    Ok(Some((FrameKind::from_code(code), length)))
}

/// Decode one frame from the front of `input`
pub fn decode(input: &[u8], max_frame_len: usize) -> FrameResult<Decoded<'_>> {
    let Some((kind, length)) = read_header(input, max_frame_len)? else {
        return Ok(Decoded::NeedMoreData);
    };

    let end = HEADER_LEN + length;
    if input.len() < end {
        return Ok(Decoded::NeedMoreData);
    }

    Ok(Decoded::Frame {
        frame: Frame::new(kind, Bytes::copy_from_slice(&input[HEADER_LEN..end])),
        remaining: &input[end..],
    })
}

/// Append the encoded frame to `dst`
pub fn encode_into(frame: &Frame, dst: &mut BytesMut) -> FrameResult<()> {
    let length = i32::try_from(frame.body.len()).map_err(|_| FrameError::BodyOverflow {
        size: frame.body.len(),
    })?;

    dst.reserve(frame.encoded_len());
    dst.put_i32(frame.kind.code());
    dst.put_i32(length);
    dst.put_slice(&frame.body);
    Ok(())
}

/// Encode a frame into a fresh buffer
pub fn encode(frame: &Frame) -> FrameResult<Bytes> {
    let mut dst = BytesMut::with_capacity(frame.encoded_len());
    encode_into(frame, &mut dst)?;
    Ok(dst.freeze())
}

/// `tokio_util` codec applying the same framing rules to a socket
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_len: usize,
}

impl FrameCodec {
    pub fn new(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        let Some((kind, length)) = read_header(&src[..], self.max_frame_len)? else {
            return Ok(None);
        };

        let end = HEADER_LEN + length;
        if src.len() < end {
            src.reserve(end - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let body = src.split_to(length).freeze();
        Ok(Some(Frame { kind, body }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_into(&frame, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(code: i32, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&code.to_be_bytes());
        out.extend_from_slice(&(body.len() as i32).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_wire_layout_is_big_endian() {
        let frame = Frame::new(FrameKind::Login, Bytes::from_static(b"{}"));
        let bytes = encode(&frame).unwrap();
        assert_eq!(&bytes[..], &[0, 0, 0, 2, 0, 0, 0, 2, b'{', b'}']);
    }

    #[test]
    fn test_partial_input_needs_more_data() {
        let bytes = raw(0, b"hello world");
        for cut in 0..bytes.len() {
            assert_eq!(decode(&bytes[..cut], 1024).unwrap(), Decoded::NeedMoreData);
        }
        match decode(&bytes, 1024).unwrap() {
            Decoded::Frame { frame, remaining } => {
                assert_eq!(frame.kind, FrameKind::Request);
                assert_eq!(&frame.body[..], b"hello world");
                assert!(remaining.is_empty());
            }
            Decoded::NeedMoreData => panic!("expected a frame"),
        }
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut bytes = raw(3, b"a");
        bytes.extend(raw(1, b"bc"));

        let Decoded::Frame { frame, remaining } = decode(&bytes, 1024).unwrap() else {
            panic!("expected first frame");
        };
        assert_eq!(frame.kind, FrameKind::Heartbeat);
        let Decoded::Frame { frame, remaining } = decode(remaining, 1024).unwrap() else {
            panic!("expected second frame");
        };
        assert_eq!(frame.kind, FrameKind::Response);
        assert_eq!(&frame.body[..], b"bc");
        assert!(remaining.is_empty());
    }

    #[test]
    fn test_unknown_kind_is_not_a_codec_error() {
        let bytes = raw(42, b"x");
        let Decoded::Frame { frame, .. } = decode(&bytes, 1024).unwrap() else {
            panic!("expected a frame");
        };
        assert_eq!(frame.kind, FrameKind::Unknown(42));
        assert_eq!(frame.kind.code(), 42);
        assert_eq!(frame.kind.to_string(), "UNKNOWN(42)");
    }

    #[test]
    fn test_bad_lengths_rejected_before_body_arrives() {
        let mut negative = Vec::new();
        negative.extend_from_slice(&0i32.to_be_bytes());
        negative.extend_from_slice(&(-5i32).to_be_bytes());
        assert!(matches!(
            decode(&negative, 1024),
            Err(FrameError::NegativeLength { length: -5, .. })
        ));

        // header alone announcing an oversize body
        let mut oversize = Vec::new();
        oversize.extend_from_slice(&1i32.to_be_bytes());
        oversize.extend_from_slice(&4096i32.to_be_bytes());
        assert!(matches!(
            decode(&oversize, 1024),
            Err(FrameError::FrameTooLarge { length: 4096, max: 1024, .. })
        ));
    }

    #[test]
    fn test_tokio_codec_handles_split_reads() {
        let mut codec = FrameCodec::new(1024);
        let bytes = raw(2, b"{\"Type\":\"REQ_LOGIN\"}");
        let mut buf = BytesMut::new();

        buf.extend_from_slice(&bytes[..5]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 5);

        buf.extend_from_slice(&bytes[5..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.kind, FrameKind::Login);
        assert!(buf.is_empty());

        let mut out = BytesMut::new();
        codec.encode(frame, &mut out).unwrap();
        assert_eq!(&out[..], &bytes[..]);
    }
}
