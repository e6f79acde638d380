//! Frame reader (component C3): turns an arbitrary byte stream into a
//! sequence of candidate packets, resynchronizing on malformed input
//! instead of stalling on it.

use bytes::{Buf, Bytes, BytesMut};

use crate::catalog::HEADER;
use crate::codec::lrc;

/// A framed-but-not-yet-classified packet: header, length and LRC have
/// already been validated by the time one of these comes out of
/// [`FrameReader::try_next`].
#[derive(Debug, Clone)]
pub struct RawPacket {
    /// The wire length byte: `1 (address) + 1 (command) + len(payload) + 1 (lrc)`.
    pub length: u8,
    pub address: u8,
    pub command: u8,
    pub payload: Bytes,
}

impl RawPacket {
    /// Total frame size on the wire, including header and length bytes.
    pub fn frame_len(&self) -> usize {
        self.length as usize + 2
    }
}

/// Minimum `length` byte value for a well-formed frame: address + command +
/// at least one payload-or-lrc byte + lrc.
const MIN_LENGTH: u8 = 4;

/// Accumulates inbound bytes and yields well-formed packets one at a time.
///
/// Never blocks: [`FrameReader::try_next`] returns `None` as soon as there
/// isn't a complete, validated frame sitting at the front of the buffer,
/// and the caller is expected to call it again after feeding more bytes.
pub struct FrameReader {
    buf: BytesMut,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Extracts one validated packet, or `None` if the buffer doesn't yet
    /// hold a complete one. Malformed prefixes (impossible length, LRC
    /// mismatch) are consumed and logged, not returned; call in a loop
    /// until `None` to drain everything currently decodable.
    pub fn try_next(&mut self) -> Option<RawPacket> {
        loop {
            let header_pos = self.buf.iter().position(|&b| b == HEADER)?;
            if header_pos > 0 {
                log::debug!("skipping {header_pos} byte(s) of noise before next header");
                self.buf.advance(header_pos);
            }

            if self.buf.len() < 2 {
                return None;
            }

            let length = self.buf[1];
            if length < MIN_LENGTH {
                log::debug!("dropping frame with impossible length {length}");
                self.buf.advance(1);
                continue;
            }

            let total = length as usize + 2;
            if self.buf.len() < total {
                return None;
            }

            let computed = lrc(&self.buf[..total - 1]);
            let carried = self.buf[total - 1];
            if computed != carried {
                log::debug!(
                    "LRC mismatch (expected {computed:02X}, got {carried:02X}), resyncing"
                );
                self.buf.advance(1);
                continue;
            }

            let frame = self.buf.split_to(total);
            return Some(RawPacket {
                length,
                address: frame[2],
                command: frame[3],
                payload: Bytes::copy_from_slice(&frame[4..total - 1]),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(address: u8, command: u8, payload: &[u8]) -> Vec<u8> {
        let length = (payload.len() + 3) as u8;
        let mut frame = vec![HEADER, length, address, command];
        frame.extend_from_slice(payload);
        let check = lrc(&frame);
        frame.push(check);
        frame
    }

    #[test]
    fn extracts_a_single_well_formed_frame() {
        let mut reader = FrameReader::new();
        reader.feed(&framed(0xFF, 0x70, &[]));
        let pkt = reader.try_next().expect("frame present");
        assert_eq!(pkt.address, 0xFF);
        assert_eq!(pkt.command, 0x70);
        assert!(pkt.payload.is_empty());
        assert!(reader.try_next().is_none());
    }

    #[test]
    fn waits_for_more_bytes_when_frame_is_incomplete() {
        let mut reader = FrameReader::new();
        let frame = framed(0xFF, 0x74, &[0x01]);
        reader.feed(&frame[..3]);
        assert!(reader.try_next().is_none());
        reader.feed(&frame[3..]);
        assert!(reader.try_next().is_some());
    }

    #[test]
    fn resyncs_past_noise_and_bad_lrc() {
        let mut reader = FrameReader::new();
        let mut stream = vec![0x00, 0x11, 0x22]; // noise containing no header byte
        let mut bad = framed(0xFF, 0x70, &[]);
        *bad.last_mut().unwrap() ^= 0xFF; // corrupt the LRC
        stream.extend_from_slice(&bad);
        stream.extend_from_slice(&framed(0xFF, 0x72, &[0x01]));

        reader.feed(&stream);
        let pkt = reader.try_next().expect("resync should find the good frame");
        assert_eq!(pkt.command, 0x72);
        assert!(reader.try_next().is_none());
    }

    #[test]
    fn drops_frames_with_impossible_length() {
        let mut reader = FrameReader::new();
        reader.feed(&[HEADER, 0x02, 0xAA, 0xBB]); // length=2 is below MIN_LENGTH
        reader.feed(&framed(0xFF, 0x72, &[0x10]));
        let pkt = reader.try_next().expect("valid frame after the bad one");
        assert_eq!(pkt.command, 0x72);
    }

    #[test]
    fn never_emits_a_frame_shorter_than_six_bytes() {
        for length in 0..MIN_LENGTH {
            let mut reader = FrameReader::new();
            reader.feed(&[HEADER, length, 0, 0, 0, 0, 0, 0]);
            if let Some(pkt) = reader.try_next() {
                assert!(pkt.frame_len() >= 6);
            }
        }
    }
}
