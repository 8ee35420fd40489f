//! C2 — Stream framer.
//!
//! Re-syncs and de-frames a byte stream into complete [`Frame`]s. Owned
//! per-connection (§4.2, §9): never shared across tasks, so no locking is
//! needed around the internal buffer.

use crate::constants::{MAGIC_DOWNLINK, MAGIC_UPLINK, MIN_DECLARED_LEN};
use crate::frame::Frame;
use tracing::trace;

#[derive(Debug, Default)]
pub struct StreamFramer {
    buf: Vec<u8>,
}

impl StreamFramer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed newly-received bytes and return every complete frame that can
    /// now be extracted. Partial frames are held in the internal buffer
    /// across calls; invalid prefixes are dropped a byte at a time so the
    /// framer always makes forward progress (spec.md §4.2, §8 property 2).
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(bytes);

        let mut frames = Vec::new();
        loop {
            if self.buf.len() < 4 {
                break;
            }

            match self.next_magic_offset() {
                None => {
                    // No magic anywhere in the buffer: keep only the last 3
                    // bytes in case a magic is split across this feed and
                    // the next one, drop the rest as noise.
                    let keep_from = self.buf.len().saturating_sub(1);
                    self.buf.drain(..keep_from);
                    break;
                }
                Some(offset) => {
                    if offset > 0 {
                        self.buf.drain(..offset);
                    }
                }
            }

            if self.buf.len() < 4 {
                break;
            }

            let declared_len = u16::from_be_bytes([self.buf[2], self.buf[3]]) as usize;
            if declared_len < MIN_DECLARED_LEN as usize {
                // Not a plausible length field under this magic; treat the
                // magic byte itself as noise and resync past it.
                self.buf.drain(..1);
                continue;
            }
            let total_len = 4 + declared_len;

            if self.buf.len() < total_len {
                // Split frame: wait for more bytes.
                break;
            }

            match Frame::parse(&self.buf[..total_len]) {
                Ok(frame) => {
                    frames.push(frame);
                    self.buf.drain(..total_len);
                }
                Err(err) => {
                    // Invalid despite a plausible header: advance one byte
                    // and try to resync from the next candidate magic.
                    trace!(%err, "dropping byte and resyncing");
                    self.buf.drain(..1);
                }
            }
        }

        frames
    }

    /// Index of the first byte starting either magic sequence, if any.
    fn next_magic_offset(&self) -> Option<usize> {
        (0..self.buf.len().saturating_sub(1)).find(|&i| {
            let candidate = u16::from_be_bytes([self.buf[i], self.buf[i + 1]]);
            candidate == MAGIC_UPLINK || candidate == MAGIC_DOWNLINK
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Direction;
    use crate::gateway_id::GatewayId;
    use std::str::FromStr;

    fn gw() -> GatewayId {
        GatewayId::from_str("82200520004869").unwrap()
    }

    fn sample_frames(n: usize) -> Vec<bytes::Bytes> {
        (0..n)
            .map(|i| Frame::build(Direction::Uplink, 0x0000, i as u32, gw(), b"payload"))
            .collect()
    }

    #[test]
    fn emits_nothing_until_a_full_frame_arrives() {
        let mut framer = StreamFramer::new();
        let bytes = Frame::build(Direction::Uplink, 0x0000, 1, gw(), b"hi");
        let (a, b) = bytes.split_at(bytes.len() / 2);

        assert!(framer.feed(a).is_empty());
        let frames = framer.feed(b);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].msg_id, 1);
    }

    #[test]
    fn depacks_concatenated_frames_in_order() {
        let frames = sample_frames(18);
        let mut concatenated = Vec::new();
        for f in &frames {
            concatenated.extend_from_slice(f);
        }

        let mut framer = StreamFramer::new();
        let out = framer.feed(&concatenated);
        assert_eq!(out.len(), 18);
        for (i, frame) in out.iter().enumerate() {
            assert_eq!(frame.msg_id, i as u32);
        }
    }

    #[test]
    fn tolerates_noise_between_frames() {
        let frames = sample_frames(3);
        let mut stream = Vec::new();
        stream.extend_from_slice(&frames[0]);
        stream.extend_from_slice(&[0x00, 0x00, 0x00]);
        stream.extend_from_slice(&frames[1]);
        stream.extend_from_slice(&[0x00]);
        stream.extend_from_slice(&frames[2]);

        let mut framer = StreamFramer::new();
        let out = framer.feed(&stream);
        assert_eq!(out.len(), 3);
        assert_eq!(out[2].msg_id, 2);
    }

    #[test]
    fn feeding_whole_or_in_pieces_yields_the_same_frames() {
        let frames = sample_frames(5);
        let mut whole = Vec::new();
        for f in &frames {
            whole.extend_from_slice(f);
        }

        let mut a = StreamFramer::new();
        let from_whole = a.feed(&whole);

        let mut b = StreamFramer::new();
        let mut from_pieces = Vec::new();
        for chunk in whole.chunks(3) {
            from_pieces.extend(b.feed(chunk));
        }

        assert_eq!(from_whole.len(), from_pieces.len());
        for (x, y) in from_whole.iter().zip(from_pieces.iter()) {
            assert_eq!(x, y);
        }
    }

    #[test]
    fn advances_past_an_invalid_prefix() {
        let good = Frame::build(Direction::Uplink, 0x0000, 7, gw(), b"ok");
        let mut stream = vec![0xFC, 0xFE, 0x00, 0x02, 0xFF, 0xFF]; // bogus frame, bad checksum
        stream.extend_from_slice(&good);

        let mut framer = StreamFramer::new();
        let out = framer.feed(&stream);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].msg_id, 7);
    }
}
