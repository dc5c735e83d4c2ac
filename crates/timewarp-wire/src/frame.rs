//! Speed frame encoding and stream reassembly
//!
//! Frame layout (4 bytes):
//! - Bytes 0-3: speed multiplier, `f32`, native endian

use timewarp_core::Speed;

/// Size of one speed frame in bytes
pub const SPEED_FRAME_SIZE: usize = 4;

/// Encode a speed frame
#[inline]
pub fn encode_speed(speed: f32) -> [u8; SPEED_FRAME_SIZE] {
    speed.to_ne_bytes()
}

/// Decode a speed frame
#[inline]
pub fn decode_speed(frame: [u8; SPEED_FRAME_SIZE]) -> f32 {
    f32::from_ne_bytes(frame)
}

/// What the receiver does with a decoded frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SpeedCommand {
    /// Apply the new multiplier
    Apply(Speed),
    /// Negative or non-finite values are dropped without notifying the peer
    Ignore(f32),
}

impl SpeedCommand {
    pub fn from_raw(raw: f32) -> Self {
        match Speed::try_from(raw) {
            Ok(speed) => SpeedCommand::Apply(speed),
            Err(_) => SpeedCommand::Ignore(raw),
        }
    }
}

/// Reassembles frames from a byte stream that may deliver them in arbitrary pieces
#[derive(Clone, Debug, Default)]
pub struct FrameAccumulator {
    buf: [u8; SPEED_FRAME_SIZE],
    filled: usize,
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes buffered towards the next frame
    #[inline]
    pub fn pending(&self) -> usize {
        self.filled
    }

    /// Spare capacity to read into before the next frame completes
    #[inline]
    pub fn spare(&mut self) -> &mut [u8] {
        &mut self.buf[self.filled..]
    }

    /// Mark `n` bytes of [`spare`](Self::spare) as filled.
    /// Returns the decoded command once a full frame is buffered.
    pub fn commit(&mut self, n: usize) -> Option<SpeedCommand> {
        debug_assert!(self.filled + n <= SPEED_FRAME_SIZE);
        self.filled = (self.filled + n).min(SPEED_FRAME_SIZE);
        if self.filled < SPEED_FRAME_SIZE {
            return None;
        }
        self.filled = 0;
        Some(SpeedCommand::from_raw(decode_speed(self.buf)))
    }

    /// Feed an arbitrary chunk, yielding every command it completes
    pub fn feed(&mut self, mut data: &[u8], mut on_command: impl FnMut(SpeedCommand)) {
        while !data.is_empty() {
            let spare = self.spare();
            let n = spare.len().min(data.len());
            spare[..n].copy_from_slice(&data[..n]);
            data = &data[n..];
            if let Some(cmd) = self.commit(n) {
                on_command(cmd);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn collect(acc: &mut FrameAccumulator, data: &[u8]) -> Vec<SpeedCommand> {
        let mut out = Vec::new();
        acc.feed(data, |cmd| out.push(cmd));
        out
    }

    #[test]
    fn test_frame_is_native_endian_f32() {
        assert_eq!(encode_speed(2.5), 2.5f32.to_ne_bytes());
        assert_eq!(decode_speed(encode_speed(0.25)), 0.25);
    }

    #[test]
    fn test_negative_is_ignored() {
        assert_eq!(SpeedCommand::from_raw(-1.0), SpeedCommand::Ignore(-1.0));
        assert!(matches!(SpeedCommand::from_raw(f32::NAN), SpeedCommand::Ignore(_)));
    }

    #[test]
    fn test_infinite_is_ignored() {
        assert_eq!(
            SpeedCommand::from_raw(f32::INFINITY),
            SpeedCommand::Ignore(f32::INFINITY)
        );
        assert_eq!(
            SpeedCommand::from_raw(f32::NEG_INFINITY),
            SpeedCommand::Ignore(f32::NEG_INFINITY)
        );
        assert!(matches!(SpeedCommand::from_raw(f32::MAX), SpeedCommand::Apply(_)));
    }

    #[test]
    fn test_zero_is_applied() {
        assert_eq!(SpeedCommand::from_raw(0.0), SpeedCommand::Apply(Speed::FROZEN));
    }

    #[test]
    fn test_short_reads_accumulate() {
        let mut acc = FrameAccumulator::new();
        let frame = encode_speed(3.0);

        assert!(collect(&mut acc, &frame[..1]).is_empty());
        assert!(collect(&mut acc, &frame[1..3]).is_empty());
        assert_eq!(acc.pending(), 3);

        let cmds = collect(&mut acc, &frame[3..]);
        assert_eq!(cmds, vec![SpeedCommand::Apply(Speed::new(3.0).unwrap())]);
        assert_eq!(acc.pending(), 0);
    }

    #[test]
    fn test_multiple_frames_in_one_read() {
        let mut acc = FrameAccumulator::new();
        let mut data = Vec::new();
        data.extend_from_slice(&encode_speed(2.0));
        data.extend_from_slice(&encode_speed(-1.0));
        data.extend_from_slice(&encode_speed(0.5)[..2]);

        let cmds = collect(&mut acc, &data);
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[1], SpeedCommand::Ignore(-1.0));
        assert_eq!(acc.pending(), 2);
    }

    #[test]
    fn test_spare_commit_path() {
        let mut acc = FrameAccumulator::new();
        let frame = encode_speed(1.5);
        acc.spare()[..2].copy_from_slice(&frame[..2]);
        assert_eq!(acc.commit(2), None);
        assert_eq!(acc.spare().len(), 2);
        acc.spare().copy_from_slice(&frame[2..]);
        assert_eq!(
            acc.commit(2),
            Some(SpeedCommand::Apply(Speed::new(1.5).unwrap()))
        );
    }

    proptest! {
        #[test]
        fn prop_chunking_does_not_change_frames(
            speeds in proptest::collection::vec(0.0f32..1000.0, 1..16),
            cut in 1usize..7,
        ) {
            let stream: Vec<u8> = speeds.iter().flat_map(|s| encode_speed(*s)).collect();
            let mut acc = FrameAccumulator::new();
            let mut out = Vec::new();
            for chunk in stream.chunks(cut) {
                acc.feed(chunk, |cmd| out.push(cmd));
            }
            let expected: Vec<_> = speeds.iter().map(|s| SpeedCommand::from_raw(*s)).collect();
            prop_assert_eq!(out, expected);
        }
    }
}
