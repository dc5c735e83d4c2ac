#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use timewarp_wire::{decode_speed, FrameAccumulator, SpeedCommand, SPEED_FRAME_SIZE};

#[derive(Arbitrary, Debug)]
struct Input {
    stream: Vec<u8>,
    cuts: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let mut acc = FrameAccumulator::new();
    let mut commands = Vec::new();

    let mut rest = input.stream.as_slice();
    for cut in input.cuts.iter().copied() {
        let n = (cut as usize).min(rest.len());
        let (chunk, tail) = rest.split_at(n);
        acc.feed(chunk, |cmd| commands.push(cmd));
        rest = tail;
    }
    acc.feed(rest, |cmd| commands.push(cmd));

    // chunking never changes what is decoded
    let expected: Vec<f32> = input
        .stream
        .chunks_exact(SPEED_FRAME_SIZE)
        .map(|c| decode_speed([c[0], c[1], c[2], c[3]]))
        .collect();
    assert_eq!(commands.len(), expected.len());
    assert_eq!(acc.pending(), input.stream.len() % SPEED_FRAME_SIZE);

    for (cmd, raw) in commands.iter().zip(expected) {
        match cmd {
            SpeedCommand::Apply(speed) => {
                assert!(raw.is_finite() && raw >= 0.0);
                assert_eq!(speed.get(), raw as f64);
            }
            SpeedCommand::Ignore(value) => {
                assert!(!raw.is_finite() || raw < 0.0);
                assert_eq!(value.to_bits(), raw.to_bits());
            }
        }
    }
});
