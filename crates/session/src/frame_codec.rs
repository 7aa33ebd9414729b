// Copyright (C) 2026 The Shard Authors. This program is free software: you
// can redistribute it and/or modify it under the terms of the GNU General
// Public License as published by the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General
// Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program. If not, see <https://www.gnu.org/licenses/>.
//

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

const LEN_PREFIX_BYTES: usize = 4;

/// Spec §4.1 "Framing state machine": `NEED_LEN` (have <4 bytes),
/// `NEED_BODY(n)` (know payload length n), `READY` (frame complete).
/// Modeled explicitly rather than left implicit in the decode loop, since
/// the spec calls the states out by name and a reader should be able to
/// match this enum one-to-one against §4.1.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum FrameState {
    NeedLen,
    NeedBody(usize),
}

/// Frames the client wire protocol (spec §4.1, §6): 4-byte big-endian
/// payload length followed by the payload (UTF-8 JSON by default; a
/// legacy deployment may substitute AMF3 — this codec only frames, it
/// never interprets the payload, so either works unchanged). Oversize
/// frames are fatal (spec §4.1 "an oversize frame... is fatal — close
/// with an error"); partial trailing bytes are preserved across reads by
/// construction (`tokio_util::codec::Framed` only ever hands `decode` the
/// bytes that have arrived so far and keeps the rest buffered).
pub struct FrameCodec {
    state: FrameState,
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            state: FrameState::NeedLen,
            max_frame_size,
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Vec<u8>;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                FrameState::NeedLen => {
                    if src.len() < LEN_PREFIX_BYTES {
                        return Ok(None);
                    }
                    let len = u32::from_be_bytes(src[..LEN_PREFIX_BYTES].try_into().unwrap()) as usize;
                    if len > self.max_frame_size {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("frame of {len} bytes exceeds max {}", self.max_frame_size),
                        ));
                    }
                    src.advance(LEN_PREFIX_BYTES);
                    self.state = FrameState::NeedBody(len);
                }
                FrameState::NeedBody(len) => {
                    if src.len() < len {
                        src.reserve(len - src.len());
                        return Ok(None);
                    }
                    let payload = src.split_to(len).to_vec();
                    self.state = FrameState::NeedLen;
                    return Ok(Some(payload));
                }
            }
        }
    }
}

impl Encoder<Vec<u8>> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Vec<u8>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(LEN_PREFIX_BYTES + item.len());
        dst.put_u32(item.len() as u32);
        dst.put_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_frame(payload: &[u8]) -> Vec<u8> {
        let mut codec = FrameCodec::new(1 << 20);
        let mut buf = BytesMut::new();
        codec.encode(payload.to_vec(), &mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn round_trips_a_single_frame() {
        let wire = encode_frame(b"{\"type\":\"ping\"}");
        let mut codec = FrameCodec::new(1 << 20);
        let mut buf = BytesMut::from(&wire[..]);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, b"{\"type\":\"ping\"}");
    }

    #[test]
    fn arbitrary_chunk_sizes_recover_identical_frames_in_order() {
        let mut wire = Vec::new();
        for i in 0..5 {
            let payload = format!("{{\"n\":{i}}}").into_bytes();
            wire.extend(encode_frame(&payload));
        }
        for chunk_size in [1usize, 3, 7, 64] {
            let mut codec = FrameCodec::new(1 << 20);
            let mut buf = BytesMut::new();
            let mut frames = Vec::new();
            for chunk in wire.chunks(chunk_size) {
                buf.extend_from_slice(chunk);
                while let Some(frame) = codec.decode(&mut buf).unwrap() {
                    frames.push(frame);
                }
            }
            assert_eq!(frames.len(), 5, "chunk size {chunk_size}");
            for (i, frame) in frames.iter().enumerate() {
                assert_eq!(*frame, format!("{{\"n\":{i}}}").into_bytes());
            }
        }
    }

    #[test]
    fn preserves_partial_trailing_bytes() {
        let wire = encode_frame(b"hello");
        let mut codec = FrameCodec::new(1 << 20);
        let mut truncated = BytesMut::from(&wire[..wire.len() - 2]);
        assert!(codec.decode(&mut truncated).unwrap().is_none());
        truncated.extend_from_slice(&wire[wire.len() - 2..]);
        assert_eq!(codec.decode(&mut truncated).unwrap().unwrap(), b"hello");
    }

    #[test]
    fn oversize_frame_is_fatal() {
        let wire = encode_frame(&vec![0u8; 100]);
        let mut codec = FrameCodec::new(50);
        let mut buf = BytesMut::from(&wire[..]);
        assert!(codec.decode(&mut buf).is_err());
    }
}
